//! Error types for repro-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for repro-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in repro-core.
#[derive(Debug, Error)]
pub enum Error {
    /// An external tool is not installed or not on `PATH`.
    #[error("tool not found: {tool}")]
    ToolMissing { tool: String },

    /// An external tool exited with a failure status.
    #[error("{tool} failed{}: {}", status.map(|s| format!(" with exit status {}", s)).unwrap_or_default(), stderr.trim())]
    Subprocess {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// An external tool ran past its deadline and was killed.
    #[error("{tool} timed out after {}s", after.as_secs())]
    Timeout { tool: String, after: Duration },

    /// Execution was aborted by user request.
    #[error("aborted")]
    Aborted,

    /// Failed to read or parse a notebook document.
    #[error("failed to read notebook {path}: {message}")]
    Notebook { path: PathBuf, message: String },

    /// Failed to write a dependency manifest.
    #[error("failed to write manifest {path}: {message}")]
    ManifestWrite { path: PathBuf, message: String },

    /// The input path is neither a notebook nor a directory.
    #[error("not a notebook or directory: {0}")]
    InvalidInput(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the external tool is absent.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolMissing { .. })
    }

    /// A short recovery hint for the user, if one applies.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ToolMissing { tool } if tool.ends_with("flakenb") => {
                Some("install it with `pip install flakenb`".to_string())
            }
            Self::ToolMissing { tool } if tool.ends_with("conda") => Some(
                "install Miniconda or set REPRONOTEBOOK_CONDA to the conda executable".to_string(),
            ),
            Self::ToolMissing { tool } => Some(format!("make sure `{}` is on PATH", tool)),
            Self::Timeout { .. } => Some("raise the limit with --tool-timeout".to_string()),
            _ => None,
        }
    }

    /// Render the error followed by its hint, if any.
    pub fn with_hint(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{} (hint: {})", self, hint),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subprocess_display_includes_status_and_stderr() {
        let err = Error::Subprocess {
            tool: "conda".to_string(),
            status: Some(1),
            stderr: "ResolvePackageNotFound\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "conda failed with exit status 1: ResolvePackageNotFound"
        );
    }

    #[test]
    fn test_hints() {
        let missing = Error::ToolMissing {
            tool: "flakenb".to_string(),
        };
        assert!(missing.is_tool_missing());
        assert!(missing.with_hint().contains("pip install flakenb"));
        assert!(Error::Aborted.hint().is_none());
    }
}
