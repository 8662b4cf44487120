//! Error types for archive assembly.

use std::path::PathBuf;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that can occur while building or bundling an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The source folder does not exist or is not a directory.
    #[error("Source folder not found: {0}")]
    SourceNotFound(PathBuf),

    /// The source folder has no usable name.
    #[error("Source folder has no name: {0}")]
    UnnamedSource(PathBuf),

    /// Failed to read an input file.
    #[error("Failed to read file {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    /// Failed to write into the crate folder.
    #[error("Failed to write file {path}: {message}")]
    WriteError { path: PathBuf, message: String },

    /// Failed to serialize the metadata document.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ArchiveError {
    pub(crate) fn read(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ReadError {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::WriteError {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// A short recovery hint for the user, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::SourceNotFound(_) | Self::UnnamedSource(_) => {
                Some("pass an existing folder holding the files to package")
            }
            Self::WriteError { .. } => Some("check that the output folder is writable"),
            _ => None,
        }
    }
}
