//! Configuration and result types.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, ZenodoResult};

/// Environment variable holding the access token.
pub const TOKEN_ENV: &str = "ZENODO_TOKEN";

const PRODUCTION_API: &str = "https://zenodo.org/api";
const PRODUCTION_WEB: &str = "https://zenodo.org";
const SANDBOX_API: &str = "https://sandbox.zenodo.org/api";
const SANDBOX_WEB: &str = "https://sandbox.zenodo.org";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ZenodoConfig {
    /// REST API base URL
    pub api_url: String,

    /// Web site base URL, for review and record links
    pub web_url: String,

    /// Access token; falls back to `ZENODO_TOKEN`
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for idempotent requests
    pub max_retries: u32,

    /// First retry delay; doubled on every further retry
    pub initial_backoff: Duration,
}

impl Default for ZenodoConfig {
    fn default() -> Self {
        Self {
            api_url: PRODUCTION_API.to_string(),
            web_url: PRODUCTION_WEB.to_string(),
            token: None,
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl ZenodoConfig {
    /// Production or sandbox endpoints.
    pub fn for_sandbox(sandbox: bool) -> Self {
        if sandbox {
            Self {
                api_url: SANDBOX_API.to_string(),
                web_url: SANDBOX_WEB.to_string(),
                ..Self::default()
            }
        } else {
            Self::default()
        }
    }

    /// Use a different API base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Use a different web base URL.
    pub fn with_web_url(mut self, url: impl Into<String>) -> Self {
        self.web_url = url.into();
        self
    }

    /// Use an explicit access token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

/// Pick the access token: an explicit value wins over the environment.
///
/// Empty values count as absent.
pub fn resolve_token(explicit: Option<&str>, env: Option<&str>) -> ZenodoResult<String> {
    explicit
        .filter(|t| !t.trim().is_empty())
        .or(env.filter(|t| !t.trim().is_empty()))
        .map(|t| t.trim().to_string())
        .ok_or(PublishError::MissingCredential)
}

/// Numeric identifier of a deposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositionId(pub u64);

impl fmt::Display for DepositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How far a deposition got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    /// File uploaded, awaiting review
    Uploaded,
    /// Published with a DOI
    Published,
}

/// Outcome of publishing an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// Deposition identifier
    pub deposition_id: DepositionId,

    /// DOI, present only once published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// Final state
    pub state: PublishState,

    /// Review page (`/deposit/{id}`) or record page (`/record/{id}`)
    pub url: String,
}

impl PublishResult {
    /// Write the result as pretty JSON.
    pub fn write_to(&self, path: &Path) -> ZenodoResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| PublishError::WriteFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, text).map_err(|e| PublishError::WriteFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
