//! Per-notebook reproducibility pipeline.
//!
//! ```text
//! discover ─▶ for each notebook:
//!   style ─▶ dependencies ─▶ [environment] ─▶ [archive] ─▶ [publish]
//! ```
//!
//! Stages run strictly in order. A failed stage is recorded and the
//! notebook continues; only a strict style violation or an abort stops the
//! whole run.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use repro_core::{
    AbortHandle, CommandRunner, DependencyManifest, EnvironmentManager, EnvironmentName, Error,
    ManifestForm, Notebook, OutputLayout, Reconciliation, StyleChecker, StyleReport, ToolOutput,
    discover_notebooks, extract_imports, generate,
};
use repro_rocrate::{
    Archive, ArchiveError, ArchiveStrategy, Enrichment, bundle_archive, enrich::find_prefixed,
};
use repro_zenodo::{DepositionMetadata, PublishError, ZenodoClient};
use uuid::Uuid;

/// Invalid flag combinations, reported before any work starts.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("--upload and --publish require --generate-rocrate")]
    PublishWithoutArchive,
}

/// Resolved run configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Stop the whole run on the first notebook with style issues
    pub fail_on_style: bool,

    /// Execute notebooks in an isolated environment
    pub use_conda: bool,

    /// Remove the environment after execution
    pub remove_env: bool,

    /// Archive backend, when archives are requested
    pub archive: Option<ArchiveStrategy>,

    /// Upload the archive
    pub upload: bool,

    /// Publish the upload, minting a DOI
    pub finalize: bool,

    /// Archive and deposition author
    pub author: String,

    /// Fixed environment name instead of a per-run one
    pub env_name: Option<String>,
}

impl PipelineOptions {
    /// Whether publishing was requested.
    pub fn publishes(&self) -> bool {
        self.upload || self.finalize
    }

    /// Reject flag combinations that cannot run.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.publishes() && self.archive.is_none() {
            return Err(UsageError::PublishWithoutArchive);
        }
        Ok(())
    }

    fn enabled_stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::Style, Stage::Dependencies];
        if self.use_conda {
            stages.push(Stage::Environment);
        }
        if self.archive.is_some() {
            stages.push(Stage::Archive);
        }
        if self.publishes() {
            stages.push(Stage::Publish);
        }
        stages
    }
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Style,
    Dependencies,
    Environment,
    Archive,
    Publish,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Dependencies => "dependencies",
            Self::Environment => "environment",
            Self::Archive => "archive",
            Self::Publish => "publish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// What happened in one stage for one notebook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub detail: Option<String>,
}

/// Stage records for one notebook, in execution order.
#[derive(Debug, Clone)]
pub struct NotebookReport {
    pub notebook: Notebook,
    pub stages: Vec<StageRecord>,
}

impl NotebookReport {
    /// Whether any stage failed.
    pub fn failed(&self) -> bool {
        self.stages.iter().any(|s| s.status == StageStatus::Failed)
    }

    /// Record of `stage`, if it ran or was skipped.
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every discovered notebook was processed
    Completed,
    /// `--fail-on-style` stopped the run at this notebook
    StyleAbort { notebook: String },
    /// Interrupted by the user
    Aborted,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub layout: OutputLayout,
    pub reports: Vec<NotebookReport>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    /// Process exit code: 0 ok, 1 a stage failed or style abort, 130 aborted.
    pub fn exit_code(&self) -> u8 {
        match self.outcome {
            RunOutcome::Aborted => 130,
            RunOutcome::StyleAbort { .. } => 1,
            RunOutcome::Completed if self.reports.iter().any(NotebookReport::failed) => 1,
            RunOutcome::Completed => 0,
        }
    }
}

/// Progress reporting for a run.
pub trait PipelineObserver: Send + Sync {
    /// Called once the output tree exists and notebooks are known.
    fn on_run_started(&self, _layout: &OutputLayout, _total: usize) {}

    /// Called before the first stage of a notebook.
    fn on_notebook_started(&self, _index: usize, _total: usize, _notebook: &Notebook) {}

    /// Called after every stage record.
    fn on_stage_completed(&self, notebook: &Notebook, record: &StageRecord);

    /// Called after the last stage of a notebook.
    fn on_notebook_completed(&self, _report: &NotebookReport) {}
}

/// Upload target and whether to publish.
pub struct Publisher {
    pub client: ZenodoClient,
    pub finalize: bool,
}

enum Flow {
    Continue,
    StyleAbort,
    Aborted,
}

/// Dependency analysis results the later stages consume.
struct Dependencies {
    imports: BTreeSet<String>,
    checks: Vec<(DependencyManifest, Reconciliation)>,
    generated: Vec<PathBuf>,
    /// Environment file the environment is created from
    env_spec: PathBuf,
}

impl Dependencies {
    fn summary(&self) -> String {
        let mut parts = vec![format!("{} imports", self.imports.len())];
        for (manifest, result) in &self.checks {
            let name = manifest.form.file_name();
            if result.satisfied {
                parts.push(format!("{} satisfied", name));
            } else {
                let missing: Vec<&str> = result.missing.iter().map(String::as_str).collect();
                parts.push(format!("{} missing {}", name, missing.join(", ")));
            }
        }
        parts.join("; ")
    }
}

struct BuiltArchive {
    archive: Archive,
    bundle: PathBuf,
    title: String,
    description: String,
}

/// Collects stage records for one notebook and forwards them to the observer.
struct Tracker<'a> {
    notebook: &'a Notebook,
    observer: &'a dyn PipelineObserver,
    stages: Vec<StageRecord>,
}

impl<'a> Tracker<'a> {
    fn new(notebook: &'a Notebook, observer: &'a dyn PipelineObserver) -> Self {
        Self {
            notebook,
            observer,
            stages: Vec::new(),
        }
    }

    fn record(&mut self, stage: Stage, status: StageStatus, detail: impl Into<String>) {
        let detail = detail.into();
        let record = StageRecord {
            stage,
            status,
            detail: (!detail.is_empty()).then_some(detail),
        };
        self.observer.on_stage_completed(self.notebook, &record);
        self.stages.push(record);
    }

    fn succeeded(&mut self, stage: Stage, detail: impl Into<String>) {
        self.record(stage, StageStatus::Succeeded, detail);
    }

    fn skipped(&mut self, stage: Stage, detail: impl Into<String>) {
        self.record(stage, StageStatus::Skipped, detail);
    }

    fn failed(&mut self, stage: Stage, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!("{} stage failed for {}: {}", stage.label(), self.notebook.name(), detail);
        self.record(stage, StageStatus::Failed, detail);
    }

    fn is_recorded(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

/// The orchestrator.
pub struct Pipeline<R> {
    options: PipelineOptions,
    style: StyleChecker<R>,
    env: EnvironmentManager<R>,
    publisher: Option<Publisher>,
    enrichment: Enrichment,
    abort: AbortHandle,
}

impl<R: CommandRunner + Clone> Pipeline<R> {
    /// Create a pipeline whose tools run through `runner`.
    pub fn new(
        options: PipelineOptions,
        runner: R,
        publisher: Option<Publisher>,
        abort: AbortHandle,
    ) -> Self {
        Self::with_tools(
            options,
            StyleChecker::new(runner.clone()),
            EnvironmentManager::new(runner),
            publisher,
            abort,
        )
    }
}

impl<R: CommandRunner> Pipeline<R> {
    /// Create a pipeline from prepared tool adapters.
    pub fn with_tools(
        options: PipelineOptions,
        style: StyleChecker<R>,
        env: EnvironmentManager<R>,
        publisher: Option<Publisher>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            options,
            style,
            env,
            publisher,
            enrichment: Enrichment::default(),
            abort,
        }
    }

    /// Process every notebook selected by `input`.
    pub async fn run(
        &self,
        input: &Path,
        observer: &dyn PipelineObserver,
    ) -> anyhow::Result<RunSummary> {
        let input = input
            .canonicalize()
            .map_err(|_| Error::InvalidInput(input.to_path_buf()))?;
        let layout = OutputLayout::for_input(&input);
        let notebooks = discover_notebooks(&input, &layout)?;

        layout.create().with_context(|| {
            format!("failed to create output folders under {}", layout.root.display())
        })?;
        observer.on_run_started(&layout, notebooks.len());

        let run_id = Uuid::new_v4();
        tracing::debug!("Run {} over {} notebooks", run_id, notebooks.len());

        let mut reports = Vec::new();
        let mut outcome = RunOutcome::Completed;

        for (index, notebook) in notebooks.iter().enumerate() {
            if self.abort.is_aborted() {
                outcome = RunOutcome::Aborted;
                break;
            }
            observer.on_notebook_started(index, notebooks.len(), notebook);

            let mut tracker = Tracker::new(notebook, observer);
            let flow = self.run_stages(notebook, &layout, &run_id, &mut tracker).await;

            let reason = match flow {
                Flow::Continue => "not reached",
                Flow::StyleAbort => "run stopped on style issues",
                Flow::Aborted => "aborted",
            };
            for stage in self.options.enabled_stages() {
                if !tracker.is_recorded(stage) {
                    tracker.skipped(stage, reason);
                }
            }

            let report = NotebookReport {
                notebook: notebook.clone(),
                stages: tracker.stages,
            };
            observer.on_notebook_completed(&report);
            reports.push(report);

            match flow {
                Flow::Continue => {}
                Flow::StyleAbort => {
                    outcome = RunOutcome::StyleAbort {
                        notebook: notebook.name(),
                    };
                    break;
                }
                Flow::Aborted => {
                    outcome = RunOutcome::Aborted;
                    break;
                }
            }
        }

        Ok(RunSummary {
            layout,
            reports,
            outcome,
        })
    }

    async fn run_stages(
        &self,
        notebook: &Notebook,
        layout: &OutputLayout,
        run_id: &Uuid,
        tracker: &mut Tracker<'_>,
    ) -> Flow {
        match self.style_stage(notebook, layout, tracker).await {
            Flow::Continue => {}
            other => return other,
        }

        let deps = match self.analyze(notebook, layout) {
            Ok(deps) => {
                tracker.succeeded(Stage::Dependencies, deps.summary());
                Some(deps)
            }
            Err(e) => {
                tracker.failed(Stage::Dependencies, e.with_hint());
                None
            }
        };

        if self.options.use_conda {
            if self.abort.is_aborted() {
                return Flow::Aborted;
            }
            match &deps {
                Some(deps) => {
                    if let Flow::Aborted =
                        self.environment_stage(notebook, layout, deps, run_id, tracker).await
                    {
                        return Flow::Aborted;
                    }
                }
                None => tracker.skipped(Stage::Environment, "no dependency analysis"),
            }
        }

        let built = match self.options.archive {
            Some(strategy) => {
                if self.abort.is_aborted() {
                    return Flow::Aborted;
                }
                match self.build_archive(strategy, notebook, layout, deps.as_ref()) {
                    Ok(built) => {
                        tracker.succeeded(Stage::Archive, built.bundle.display().to_string());
                        Some(built)
                    }
                    Err(e) => {
                        let detail = match e.hint() {
                            Some(hint) => format!("{} (hint: {})", e, hint),
                            None => e.to_string(),
                        };
                        tracker.failed(Stage::Archive, detail);
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(publisher) = &self.publisher {
            if self.abort.is_aborted() {
                return Flow::Aborted;
            }
            return self
                .publish_stage(publisher, notebook, layout, built.as_ref(), tracker)
                .await;
        }

        Flow::Continue
    }

    async fn style_stage(
        &self,
        notebook: &Notebook,
        layout: &OutputLayout,
        tracker: &mut Tracker<'_>,
    ) -> Flow {
        let report = match self.style.check(&notebook.path).await {
            Ok(report) => report,
            Err(Error::Aborted) => return Flow::Aborted,
            Err(e) if e.is_tool_missing() => {
                // Counted as zero findings.
                let path = layout.style_report(&notebook.name());
                if let Err(write) = StyleReport::default().write_to(&path) {
                    tracing::warn!("Failed to write {}: {}", path.display(), write);
                }
                tracker.skipped(Stage::Style, e.with_hint());
                return Flow::Continue;
            }
            Err(e) => {
                tracker.failed(Stage::Style, e.with_hint());
                return Flow::Continue;
            }
        };

        let path = layout.style_report(&notebook.name());
        if let Err(e) = report.write_to(&path) {
            tracker.failed(Stage::Style, e.with_hint());
            return Flow::Continue;
        }

        if report.is_clean() {
            tracker.succeeded(Stage::Style, "no issues");
            return Flow::Continue;
        }

        let detail = format!("{} issues, see {}", report.issues.len(), path.display());
        if self.options.fail_on_style {
            tracker.failed(Stage::Style, detail);
            return Flow::StyleAbort;
        }
        tracker.succeeded(Stage::Style, detail);
        Flow::Continue
    }

    fn analyze(
        &self,
        notebook: &Notebook,
        layout: &OutputLayout,
    ) -> repro_core::Result<Dependencies> {
        let parsed = notebook.read()?;
        let imports = extract_imports(&parsed);

        let mut checks = Vec::new();
        for form in ManifestForm::ALL {
            let manifest = DependencyManifest::load(notebook.dir().join(form.file_name()));
            if !manifest.exists {
                continue;
            }
            let result = manifest.reconcile(&imports);
            if !result.satisfied {
                tracing::warn!(
                    "{} does not declare: {}",
                    manifest.path.display(),
                    result.missing.iter().cloned().collect::<Vec<_>>().join(", ")
                );
            }
            checks.push((manifest, result));
        }

        let out_dir = layout.notebook_dependencies(&notebook.name());
        fs::create_dir_all(&out_dir)?;
        let generated = ManifestForm::ALL
            .iter()
            .map(|form| generate(&parsed, &out_dir, *form))
            .collect::<repro_core::Result<Vec<_>>>()?;

        let env_spec = checks
            .iter()
            .find(|(m, r)| m.form == ManifestForm::Environment && r.satisfied)
            .map(|(m, _)| m.path.clone())
            .unwrap_or_else(|| out_dir.join(ManifestForm::Environment.file_name()));

        Ok(Dependencies {
            imports,
            checks,
            generated,
            env_spec,
        })
    }

    async fn environment_stage(
        &self,
        notebook: &Notebook,
        layout: &OutputLayout,
        deps: &Dependencies,
        run_id: &Uuid,
        tracker: &mut Tracker<'_>,
    ) -> Flow {
        let env_name = match &self.options.env_name {
            Some(name) => EnvironmentName::new(name),
            None => match EnvironmentName::for_run(&deps.env_spec, run_id) {
                Ok(name) => name,
                Err(e) => {
                    tracker.failed(Stage::Environment, e.with_hint());
                    return Flow::Continue;
                }
            },
        };

        if let Err(e) = self.env.create(&deps.env_spec, &env_name).await {
            return environment_error(e, tracker);
        }

        let executed = self.execute_notebook(notebook, layout, &env_name).await;

        let mut removal_note = String::new();
        if self.options.remove_env {
            match self.env.remove(&env_name).await {
                Ok(()) => removal_note = format!(", removed {}", env_name),
                Err(Error::Aborted) => return Flow::Aborted,
                Err(e) => {
                    tracing::warn!("Failed to remove environment {}: {}", env_name, e);
                    removal_note = format!(", could not remove {}", env_name);
                }
            }
        }

        match executed {
            Ok(path) => {
                tracker.succeeded(
                    Stage::Environment,
                    format!("executed in {} → {}{}", env_name, path.display(), removal_note),
                );
                Flow::Continue
            }
            Err(e) => environment_error(e, tracker),
        }
    }

    /// Copy the notebook into `conda_execution/`, run it there, and write
    /// the execution log whatever the outcome.
    async fn execute_notebook(
        &self,
        notebook: &Notebook,
        layout: &OutputLayout,
        env_name: &EnvironmentName,
    ) -> repro_core::Result<PathBuf> {
        let name = notebook.name();
        let executed = layout.executed_notebook(&name);
        fs::copy(&notebook.path, &executed)?;

        let result = self.env.run_notebook_in_place(&executed, env_name).await;
        let transcript = match &result {
            Ok(output) => output.transcript(),
            Err(Error::Subprocess { status, stderr, .. }) => ToolOutput {
                status: *status,
                stdout: String::new(),
                stderr: stderr.clone(),
            }
            .transcript(),
            Err(e) => format!("{}\n", e),
        };
        fs::write(layout.execution_log(&name), transcript)?;

        result.map(|_| executed)
    }

    fn build_archive(
        &self,
        strategy: ArchiveStrategy,
        notebook: &Notebook,
        layout: &OutputLayout,
        deps: Option<&Dependencies>,
    ) -> Result<BuiltArchive, ArchiveError> {
        let name = notebook.name();
        let ro_crates = layout.ro_crates_dir();

        // Staged inside ro_crates/ so the finished crate can be renamed into place.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&ro_crates)?;
        let folder = staging.path().join(&name);
        fs::create_dir_all(&folder)?;

        fs::copy(&notebook.path, folder.join(notebook.file_name()))?;
        for path in deps.map(|d| d.generated.as_slice()).unwrap_or_default() {
            if let Some(file_name) = path.file_name() {
                fs::copy(path, folder.join(file_name))?;
            }
        }
        for path in companion_files(notebook.dir()) {
            if let Some(file_name) = path.file_name() {
                fs::copy(&path, folder.join(file_name))?;
            }
        }

        let summary = self.enrichment.inspect(&folder, &name);
        let archive = strategy
            .backend()
            .build(&folder, &self.options.author, &self.enrichment)?
            .relocate(&ro_crates)?;
        let bundle = bundle_archive(&archive.path)?;

        Ok(BuiltArchive {
            archive,
            bundle,
            title: summary.title,
            description: summary.description,
        })
    }

    async fn publish_stage(
        &self,
        publisher: &Publisher,
        notebook: &Notebook,
        layout: &OutputLayout,
        built: Option<&BuiltArchive>,
        tracker: &mut Tracker<'_>,
    ) -> Flow {
        let Some(built) = built else {
            tracker.skipped(Stage::Publish, "no archive was built in this run");
            return Flow::Continue;
        };
        let name = notebook.name();

        let metadata =
            DepositionMetadata::new(&built.title, &built.description, &self.options.author);
        if let Err(e) = metadata.write_to(&layout.zenodo_metadata(&name)) {
            tracker.failed(Stage::Publish, publish_detail(&e));
            return Flow::Continue;
        }

        tracing::debug!("Publishing {} ({})", built.bundle.display(), built.archive.name());
        let result = tokio::select! {
            result = publisher.client.publish_archive(&built.bundle, &metadata, publisher.finalize) => result,
            _ = self.abort.aborted() => return Flow::Aborted,
        };

        let result = result.and_then(|r| r.write_to(&layout.upload_results(&name)).map(|()| r));
        match result {
            Ok(r) => {
                let detail = match &r.doi {
                    Some(doi) => format!("published, DOI {} ({})", doi, r.url),
                    None => format!("uploaded, review at {}", r.url),
                };
                tracker.succeeded(Stage::Publish, detail);
            }
            Err(e) => tracker.failed(Stage::Publish, publish_detail(&e)),
        }
        Flow::Continue
    }
}

fn environment_error(e: Error, tracker: &mut Tracker<'_>) -> Flow {
    match e {
        Error::Aborted => Flow::Aborted,
        e if e.is_tool_missing() => {
            tracker.skipped(Stage::Environment, e.with_hint());
            Flow::Continue
        }
        e => {
            tracker.failed(Stage::Environment, e.with_hint());
            Flow::Continue
        }
    }
}

fn publish_detail(e: &PublishError) -> String {
    match e.hint() {
        Some(hint) => format!("{} (hint: {})", e, hint),
        None => e.to_string(),
    }
}

/// `README*` and `LICENSE*` files beside the notebook.
fn companion_files(dir: &Path) -> Vec<PathBuf> {
    ["README", "LICENSE"]
        .iter()
        .filter_map(|prefix| find_prefixed(dir, prefix))
        .collect()
}
