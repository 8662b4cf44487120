//! Error types for the Zenodo client.

use std::path::PathBuf;

/// Publish errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// No access token was given and `ZENODO_TOKEN` is unset.
    #[error("missing Zenodo access token")]
    MissingCredential,

    /// The server answered with a status the protocol step does not expect.
    #[error("unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Network error.
    #[error("network error: {message}")]
    Network { message: String },

    /// Invalid response body.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Failed to read the file to upload.
    #[error("failed to read {path}: {message}")]
    ReadFile { path: PathBuf, message: String },

    /// Failed to write a metadata or result file.
    #[error("failed to write {path}: {message}")]
    WriteFile { path: PathBuf, message: String },
}

impl PublishError {
    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// A short recovery hint for the user, if one applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredential => Some("set ZENODO_TOKEN or pass --zenodo-token"),
            Self::UnexpectedStatus { status: 401 | 403, .. } => Some(
                "check that the Zenodo token is valid and has the deposit:write and deposit:actions scopes",
            ),
            Self::UnexpectedStatus { .. } | Self::Network { .. } => {
                Some("check the Zenodo token and your network connection")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for Zenodo operations.
pub type ZenodoResult<T> = Result<T, PublishError>;
