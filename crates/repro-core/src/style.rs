//! Notebook style checking via the external `flakenb` linter.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::process::{CommandRunner, ToolCommand};

/// Environment variable overriding the style checker executable.
pub const FLAKENB_ENV: &str = "REPRONOTEBOOK_FLAKENB";

/// Findings reported by the style checker for one notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleReport {
    /// One entry per reported issue
    pub issues: Vec<String>,
}

impl StyleReport {
    /// Whether the notebook passed without findings.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Render the report as plain text, one issue per line.
    pub fn render(&self) -> String {
        if self.issues.is_empty() {
            return "No style issues found.\n".to_string();
        }
        let mut out = String::new();
        for issue in &self.issues {
            out.push_str(issue);
            out.push('\n');
        }
        out
    }

    /// Write the rendered report to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }
}

/// Runs `flakenb` against notebooks.
pub struct StyleChecker<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> StyleChecker<R> {
    /// Create a checker, honoring the `REPRONOTEBOOK_FLAKENB` override.
    pub fn new(runner: R) -> Self {
        let program = std::env::var(FLAKENB_ENV).unwrap_or_else(|_| "flakenb".to_string());
        Self::with_program(runner, program)
    }

    /// Create a checker that invokes `program`.
    pub fn with_program(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Lint one notebook.
    ///
    /// A zero exit means no findings. A non-zero exit with output yields one
    /// issue per non-empty stdout line. A non-zero exit with empty stdout is
    /// a tool failure.
    pub async fn check(&self, notebook: &Path) -> Result<StyleReport> {
        let command = ToolCommand::new(&self.program).arg(notebook.display().to_string());
        let output = self.runner.run(&command).await?;

        if output.success() {
            return Ok(StyleReport::default());
        }

        let issues: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        if issues.is_empty() {
            return output.into_result(&self.program).map(|_| StyleReport::default());
        }

        tracing::debug!("{} style issues in {}", issues.len(), notebook.display());
        Ok(StyleReport { issues })
    }
}
