//! Terminal rendering of pipeline progress.

use repro_core::{Notebook, OutputLayout};

use crate::colors::{self, Tone};
use crate::pipeline::{
    NotebookReport, PipelineObserver, RunOutcome, RunSummary, StageRecord, StageStatus,
};

/// Prints one line per stage as the run progresses.
pub struct TerminalProgress;

impl PipelineObserver for TerminalProgress {
    fn on_run_started(&self, layout: &OutputLayout, total: usize) {
        println!(
            "\n{} {}",
            Tone::Bold.paint("repronotebook"),
            Tone::Dim.paint(format!("notebooks: {}", total))
        );
        println!("{} {}", Tone::Dim.paint("Output:"), layout.root.display());
        println!("{}", "─".repeat(50));
    }

    fn on_notebook_started(&self, index: usize, total: usize, notebook: &Notebook) {
        println!(
            "\n{} {}",
            Tone::Dim.paint(format!("[{}/{}]", index + 1, total)),
            Tone::Accent.paint(notebook.file_name())
        );
        colors::flush_stdout();
    }

    fn on_stage_completed(&self, _notebook: &Notebook, record: &StageRecord) {
        let mark = match record.status {
            StageStatus::Succeeded => Tone::Good.paint("✓"),
            StageStatus::Skipped => Tone::Warn.paint("-"),
            StageStatus::Failed => Tone::Bad.paint("✗"),
        };
        let detail = record
            .detail
            .as_deref()
            .map(|d| format!(" {}", Tone::Dim.paint(d)))
            .unwrap_or_default();
        println!("  {} {:<13}{}", mark, record.stage.label(), detail);
        colors::flush_stdout();
    }

    fn on_notebook_completed(&self, report: &NotebookReport) {
        tracing::debug!(
            "{}: {} stages recorded",
            report.notebook.name(),
            report.stages.len()
        );
    }
}

/// Print the closing summary of a run.
pub fn print_summary(summary: &RunSummary) {
    let failed = summary.reports.iter().filter(|r| r.failed()).count();
    let ok = summary.reports.len() - failed;

    println!("\n{}", "─".repeat(50));
    match &summary.outcome {
        RunOutcome::Completed if failed == 0 => {
            println!("{} {} notebooks", Tone::Good.paint("Completed"), ok)
        }
        RunOutcome::Completed => println!(
            "{} {} ok, {} failed",
            Tone::Warn.paint("Completed with failures"),
            ok,
            failed
        ),
        RunOutcome::StyleAbort { notebook } => println!(
            "{} style issues in {} (--fail-on-style)",
            Tone::Bad.paint("Stopped"),
            notebook
        ),
        RunOutcome::Aborted => println!(
            "{} after {} notebooks",
            Tone::Bad.paint("Aborted"),
            summary.reports.len()
        ),
    }
    println!(
        "{}",
        Tone::Dim.paint(format!("Artifacts in {}", summary.layout.root.display()))
    );
}
