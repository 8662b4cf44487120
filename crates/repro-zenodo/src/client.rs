//! HTTP client for the Zenodo deposition API.
//!
//! ```text
//! POST /deposit/depositions                      201 → id
//! GET  /deposit/depositions/{id}                 200 → links.bucket
//! PUT  {bucket}/{filename}                       200 | 201
//! POST /deposit/depositions/{id}/actions/publish 202 → doi
//! ```

use std::path::Path;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{PublishError, ZenodoResult};
use crate::metadata::DepositionMetadata;
use crate::types::{DepositionId, PublishResult, PublishState, TOKEN_ENV, ZenodoConfig, resolve_token};

const USER_AGENT_VALUE: &str = concat!("repronotebook/", env!("CARGO_PKG_VERSION"));
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct DepositionResponse {
    id: u64,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    bucket: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    doi: String,
}

/// Zenodo deposition client.
#[derive(Debug, Clone)]
pub struct ZenodoClient {
    client: reqwest::Client,
    api_url: String,
    web_url: String,
    token: String,
    config: ZenodoConfig,
}

impl ZenodoClient {
    /// Create a client.
    ///
    /// The token comes from the config or `ZENODO_TOKEN`; without one this
    /// fails before any request is made.
    pub fn new(config: ZenodoConfig) -> ZenodoResult<Self> {
        let env_token = std::env::var(TOKEN_ENV).ok();
        let token = resolve_token(config.token.as_deref(), env_token.as_deref())?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| PublishError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            token,
            config,
        })
    }

    /// Create an empty deposition carrying `metadata`.
    pub async fn create_deposition(
        &self,
        metadata: &DepositionMetadata,
    ) -> ZenodoResult<DepositionId> {
        let url = format!("{}/deposit/depositions", self.api_url);
        debug!(url = %url, "creating deposition");

        let request = self
            .authorized(Method::POST, &url)
            .json(&json!({ "metadata": metadata }));
        let response = expect_status(request.send().await?, &[StatusCode::CREATED]).await?;

        let deposition: DepositionResponse = parse(response, "deposition").await?;
        info!("Deposition created with ID {}", deposition.id);
        Ok(DepositionId(deposition.id))
    }

    /// Look up the file bucket of a deposition.
    pub async fn bucket_url(&self, id: DepositionId) -> ZenodoResult<String> {
        let url = format!("{}/deposit/depositions/{}", self.api_url, id);
        debug!(url = %url, "fetching deposition");

        let response = self.get_with_retry(&url).await?;
        let deposition: DepositionResponse = parse(response, "deposition").await?;
        deposition.links.bucket.ok_or_else(|| PublishError::InvalidResponse {
            message: format!("deposition {} has no bucket link", id),
        })
    }

    /// Upload `path` into the deposition's bucket under its file name.
    pub async fn upload_file(&self, id: DepositionId, path: &Path) -> ZenodoResult<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| PublishError::ReadFile {
                path: path.to_path_buf(),
                message: "not a file".to_string(),
            })?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| PublishError::ReadFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let bucket = self.bucket_url(id).await?;
        let url = format!("{}/{}", bucket.trim_end_matches('/'), file_name);
        debug!(url = %url, bytes = data.len(), "uploading file");

        let size = data.len();
        let request = self.authorized(Method::PUT, &url).body(data);
        expect_status(request.send().await?, &[StatusCode::OK, StatusCode::CREATED]).await?;

        info!("Uploaded {} ({} bytes)", file_name, size);
        Ok(())
    }

    /// Publish the deposition and return its DOI.
    pub async fn publish(&self, id: DepositionId) -> ZenodoResult<String> {
        let url = format!("{}/deposit/depositions/{}/actions/publish", self.api_url, id);
        debug!(url = %url, "publishing deposition");

        let response = expect_status(
            self.authorized(Method::POST, &url).send().await?,
            &[StatusCode::ACCEPTED],
        )
        .await?;

        let published: PublishResponse = parse(response, "publish").await?;
        info!("Published with DOI {}", published.doi);
        Ok(published.doi)
    }

    /// Create a deposition, upload `archive`, and publish when `finalize`.
    ///
    /// Every call creates a new deposition.
    pub async fn publish_archive(
        &self,
        archive: &Path,
        metadata: &DepositionMetadata,
        finalize: bool,
    ) -> ZenodoResult<PublishResult> {
        let id = self.create_deposition(metadata).await?;
        self.upload_file(id, archive).await?;

        if !finalize {
            return Ok(PublishResult {
                deposition_id: id,
                doi: None,
                state: PublishState::Uploaded,
                url: self.review_url(id),
            });
        }

        let doi = self.publish(id).await?;
        Ok(PublishResult {
            deposition_id: id,
            doi: Some(doi),
            state: PublishState::Published,
            url: self.record_url(id),
        })
    }

    /// Page where an unpublished deposition can be reviewed.
    pub fn review_url(&self, id: DepositionId) -> String {
        format!("{}/deposit/{}", self.web_url, id)
    }

    /// Page of a published record.
    pub fn record_url(&self, id: DepositionId) -> String {
        format!("{}/record/{}", self.web_url, id)
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
    }

    /// GET with retry on transport errors, 429 and 5xx.
    async fn get_with_retry(&self, url: &str) -> ZenodoResult<Response> {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            let result = match self.authorized(Method::GET, url).send().await {
                Ok(response) => expect_status(response, &[StatusCode::OK]).await,
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let base = backoff_ceiling(self.config.initial_backoff, retries);
                    let base_ms = base.as_millis() as u64;
                    let backoff =
                        Duration::from_millis(rand::thread_rng().gen_range(base_ms / 2..=base_ms));

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Upper bound of the jittered wait before retry number `retry` (1-based):
/// doubles from `initial` and never exceeds 30 seconds.
fn backoff_ceiling(initial: Duration, retry: u32) -> Duration {
    initial
        .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
        .min(MAX_BACKOFF)
}

/// Accept `response` if its status is one of `expected`.
async fn expect_status(response: Response, expected: &[StatusCode]) -> ZenodoResult<Response> {
    let status = response.status();
    if expected.contains(&status) {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

async fn parse<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> ZenodoResult<T> {
    response
        .json()
        .await
        .map_err(|e| PublishError::InvalidResponse {
            message: format!("failed to parse {} response: {}", what, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let initial = Duration::from_millis(500);
        assert_eq!(backoff_ceiling(initial, 1), Duration::from_millis(500));
        assert_eq!(backoff_ceiling(initial, 2), Duration::from_secs(1));
        assert_eq!(backoff_ceiling(initial, 4), Duration::from_secs(4));
        assert_eq!(backoff_ceiling(initial, 10), MAX_BACKOFF);
    }

    #[test]
    fn test_backoff_with_many_retries_does_not_overflow() {
        assert_eq!(backoff_ceiling(Duration::from_secs(1), 40), MAX_BACKOFF);
        assert_eq!(backoff_ceiling(Duration::from_secs(1), u32::MAX), MAX_BACKOFF);
    }
}
