//! Core engine for repronotebook.
//!
//! This crate provides:
//! - Jupyter notebook reading
//! - Dependency analysis (import extraction, manifest reconciliation and generation)
//! - Subprocess execution with timeouts and cooperative abort
//! - Style checking and isolated environment lifecycle management
//! - The canonical per-run output layout and notebook discovery

pub mod abort;
pub mod deps;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod notebook;
pub mod paths;
pub mod process;
pub mod style;

pub use abort::AbortHandle;
pub use deps::{
    DependencyManifest, ManifestForm, ManifestRead, Reconciliation, extract_imports, generate,
    imports_from_source, read_manifest, reconcile,
};
pub use discovery::discover_notebooks;
pub use environment::{Creation, EnvironmentManager, EnvironmentName};
pub use error::{Error, Result};
pub use notebook::{JupyterNotebook, Notebook};
pub use paths::OutputLayout;
pub use process::{CommandRunner, RunnerConfig, SystemRunner, ToolCommand, ToolOutput};
pub use style::{StyleChecker, StyleReport};
