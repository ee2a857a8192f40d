//! Confluence Cloud REST client
//!
//! Wraps `reqwest::Client` with basic auth, endpoint construction, and a
//! single retry/backoff policy shared by every call:
//!
//! - 429: retried, honouring `Retry-After` when the server sends one
//! - 409: page lock / edit conflict, retried
//! - 5xx and transport errors: retried with exponential backoff + jitter
//! - any other 4xx: fails immediately, carrying the response body

use std::path::Path;
use std::time::Duration;

use artsync_core::config::{RemoteConfig, RetryConfig};
use artsync_core::domain::{AttachmentMeta, PageContent, PageVersion};
use artsync_core::error::RemoteError;
use artsync_core::ports::IRemotePage;
use rand::Rng;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Page size for attachment listings.
const ATTACHMENT_PAGE_LIMIT: usize = 100;

/// Page size for version listings.
const VERSION_PAGE_LIMIT: usize = 200;

/// Longest response-body excerpt carried in a permanent error.
const ERROR_DETAIL_LIMIT: usize = 2000;

// ============================================================================
// REST response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageResponse {
    title: String,
    body: PageBody,
    version: VersionNode,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    storage: StorageNode,
}

#[derive(Debug, Deserialize)]
struct StorageNode {
    value: String,
}

#[derive(Debug, Deserialize)]
struct VersionNode {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct PagedResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AttachmentNode {
    id: String,
    title: String,
    #[serde(rename = "_links", default)]
    links: Option<AttachmentLinks>,
}

#[derive(Debug, Deserialize, Default)]
struct AttachmentLinks {
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionEntry {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct PropertyNode {
    id: Option<String>,
    key: Option<String>,
    #[serde(default)]
    version: Option<VersionNode>,
}

// ============================================================================
// WikiClient
// ============================================================================

/// HTTP client for the managed wiki page.
///
/// One instance targets one page; the page id is baked into every endpoint.
pub struct WikiClient {
    client: Client,
    base_url: String,
    page_id: String,
    email: String,
    api_token: String,
    retry: RetryConfig,
}

impl WikiClient {
    /// Create a client from the remote section of the configuration.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        Self::with_base_url(config, config.url.clone())
    }

    /// Create a client with a custom base URL (useful for testing against a
    /// mock server).
    pub fn with_base_url(config: &RemoteConfig, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_id: config.page_id.clone(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            retry: config.retry.clone(),
        })
    }

    fn content_url(&self) -> String {
        format!("{}/wiki/rest/api/content/{}", self.base_url, self.page_id)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.email, Some(&self.api_token))
    }

    // ------------------------------------------------------------------
    // Retry core
    // ------------------------------------------------------------------

    /// Send a request, retrying transient failures up to
    /// `retry.max_attempts` total attempts. `make` builds a fresh request
    /// per attempt because a sent request cannot be reused.
    async fn execute_with_retry<F>(&self, op: &str, make: F) -> Result<Response, RemoteError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match self.authed(make()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => classify_response(resp).await,
                Err(e) => RemoteError::Transport {
                    message: e.to_string(),
                },
            };

            if !err.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = err
                .retry_after()
                .unwrap_or_else(|| self.backoff_delay(attempt));
            warn!(
                op,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Exponential backoff with jitter: `base * 2^(attempt-1)` capped at
    /// `max_delay_ms`, plus up to one extra base delay of jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.base_delay_ms;
        let exp = base
            .saturating_mul(1u64 << (attempt - 1).min(16))
            .min(self.retry.max_delay_ms);
        let jitter = rand::thread_rng().gen_range(0..=base);
        Duration::from_millis(exp + jitter)
    }

    async fn get_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, RemoteError> {
        resp.json::<T>()
            .await
            .map_err(|e| RemoteError::BadResponse(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Page content
    // ------------------------------------------------------------------

    /// Fetch title, storage-format body, and current version number.
    pub async fn get_page(&self) -> Result<PageContent, RemoteError> {
        let url = self.content_url();
        let resp = self
            .execute_with_retry("get_page", || {
                self.client
                    .get(&url)
                    .query(&[("expand", "body.storage,version")])
            })
            .await?;
        let page: PageResponse = self.get_json(resp).await?;
        Ok(PageContent {
            title: page.title,
            body: page.body.storage.value,
            version: page.version.number,
        })
    }

    /// Overwrite the page body, targeting `current_version + 1`.
    pub async fn update_page(
        &self,
        body: &str,
        title: &str,
        current_version: u64,
    ) -> Result<(), RemoteError> {
        let url = self.content_url();
        let payload = json!({
            "type": "page",
            "title": title,
            "version": { "number": current_version + 1 },
            "body": { "storage": { "value": body, "representation": "storage" } },
        });
        self.execute_with_retry("update_page", || self.client.put(&url).json(&payload))
            .await?;
        debug!(version = current_version + 1, "page updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    /// List every attachment on the page, following pagination.
    pub async fn list_attachments(&self) -> Result<Vec<AttachmentMeta>, RemoteError> {
        let url = format!("{}/child/attachment", self.content_url());
        let mut all = Vec::new();
        let mut start = 0usize;

        loop {
            let resp = self
                .execute_with_retry("list_attachments", || {
                    self.client.get(&url).query(&[
                        ("limit", ATTACHMENT_PAGE_LIMIT.to_string()),
                        ("start", start.to_string()),
                    ])
                })
                .await?;
            let page: PagedResponse<AttachmentNode> = self.get_json(resp).await?;
            let count = page.results.len();
            if count == 0 {
                break;
            }

            for node in page.results {
                let download = node.links.and_then(|l| l.download);
                let Some(download_path) = download else {
                    warn!(filename = %node.title, "attachment listing entry has no download link, skipping");
                    continue;
                };
                let Some(id) = normalize_content_id(&node.id) else {
                    warn!(filename = %node.title, raw_id = %node.id, "attachment id has no digits, skipping");
                    continue;
                };
                all.push(AttachmentMeta {
                    id,
                    filename: node.title,
                    download_path,
                });
            }

            start += ATTACHMENT_PAGE_LIMIT;
            if count < ATTACHMENT_PAGE_LIMIT {
                break;
            }
        }

        Ok(all)
    }

    /// Download attachment bytes via the path from the listing.
    pub async fn download_attachment(&self, download_path: &str) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/wiki{}", self.base_url, download_path);
        let resp = self
            .execute_with_retry("download_attachment", || self.client.get(&url))
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RemoteError::BadResponse(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Delete one attachment by its normalized id.
    pub async fn delete_attachment(&self, attachment_id: &str) -> Result<(), RemoteError> {
        let url = format!("{}/wiki/rest/api/content/{}", self.base_url, attachment_id);
        self.execute_with_retry("delete_attachment", || self.client.delete(&url))
            .await?;
        Ok(())
    }

    /// Upload `path` as `filename`. An existing attachment with the same
    /// filename is replaced via its `/data` endpoint, otherwise a new one
    /// is created. Returns the normalized attachment id.
    pub async fn upload_attachment(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<String, RemoteError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RemoteError::Transport {
                message: format!("reading {}: {e}", path.display()),
            })?;

        let existing_id = self.find_attachment_id(filename).await?;
        let url = match &existing_id {
            Some(id) => format!("{}/child/attachment/{}/data", self.content_url(), id),
            None => format!("{}/child/attachment", self.content_url()),
        };

        let resp = self
            .execute_with_retry("upload_attachment", || {
                let part = file_part(&bytes, filename);
                self.client
                    .post(&url)
                    .header("X-Atlassian-Token", "nocheck")
                    .multipart(multipart::Form::new().part("file", part))
            })
            .await?;

        let page: PagedResponse<AttachmentNode> = self.get_json(resp).await?;
        let returned = page
            .results
            .first()
            .and_then(|node| normalize_content_id(&node.id));

        match returned.or(existing_id) {
            Some(id) => Ok(id),
            None => Err(RemoteError::BadResponse(
                "upload response carried no attachment id".into(),
            )),
        }
    }

    /// Look up an attachment id by exact filename, `None` when absent.
    async fn find_attachment_id(&self, filename: &str) -> Result<Option<String>, RemoteError> {
        let url = format!("{}/child/attachment", self.content_url());
        let resp = self
            .execute_with_retry("find_attachment", || {
                self.client
                    .get(&url)
                    .query(&[("filename", filename), ("limit", "1")])
            })
            .await?;
        let page: PagedResponse<AttachmentNode> = self.get_json(resp).await?;
        Ok(page
            .results
            .first()
            .and_then(|node| normalize_content_id(&node.id)))
    }

    // ------------------------------------------------------------------
    // Appearance properties
    // ------------------------------------------------------------------

    /// Set the page appearance via the v2 content-property API. Reads the
    /// property list once, then updates or creates the draft and published
    /// keys as needed.
    pub async fn set_appearance(&self, appearance: &str) -> Result<(), RemoteError> {
        let base = format!(
            "{}/wiki/api/v2/pages/{}/properties",
            self.base_url, self.page_id
        );

        let resp = self
            .execute_with_retry("get_properties", || {
                self.client.get(&base).query(&[("limit", "200")])
            })
            .await?;
        let page: PagedResponse<PropertyNode> = self.get_json(resp).await?;

        for key in ["content-appearance-draft", "content-appearance-published"] {
            let existing = page
                .results
                .iter()
                .find(|p| p.key.as_deref() == Some(key))
                .and_then(|p| {
                    let id = p.id.clone()?;
                    let ver = p.version.as_ref().map(|v| v.number).unwrap_or(1);
                    Some((id, ver))
                });

            match existing {
                Some((id, ver)) => {
                    let url = format!("{base}/{id}");
                    let payload = json!({
                        "key": key,
                        "value": appearance,
                        "version": { "number": ver + 1 },
                    });
                    self.execute_with_retry("put_property", || {
                        self.client.put(&url).json(&payload)
                    })
                    .await?;
                }
                None => {
                    let payload = json!({ "key": key, "value": appearance });
                    self.execute_with_retry("post_property", || {
                        self.client.post(&base).json(&payload)
                    })
                    .await?;
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Page versions
    // ------------------------------------------------------------------

    /// List page versions, newest first, following pagination.
    pub async fn list_versions(&self) -> Result<Vec<PageVersion>, RemoteError> {
        let url = format!("{}/version", self.content_url());
        let mut all = Vec::new();
        let mut start = 0usize;

        loop {
            let resp = self
                .execute_with_retry("list_versions", || {
                    self.client.get(&url).query(&[
                        ("limit", VERSION_PAGE_LIMIT.to_string()),
                        ("start", start.to_string()),
                    ])
                })
                .await?;
            let page: PagedResponse<VersionEntry> = self.get_json(resp).await?;
            let count = page.results.len();
            if count == 0 {
                break;
            }
            all.extend(page.results.into_iter().map(|v| PageVersion { number: v.number }));
            start += VERSION_PAGE_LIMIT;
            if count < VERSION_PAGE_LIMIT {
                break;
            }
        }

        Ok(all)
    }

    /// Delete one historical page version. The server refuses to delete the
    /// latest version; callers skip it.
    pub async fn delete_version(&self, version_number: u64) -> Result<(), RemoteError> {
        let url = format!("{}/version/{}", self.content_url(), version_number);
        self.execute_with_retry("delete_version", || self.client.delete(&url))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Port implementation
// ============================================================================

#[async_trait::async_trait]
impl IRemotePage for WikiClient {
    async fn get_page(&self) -> anyhow::Result<PageContent> {
        Ok(WikiClient::get_page(self).await?)
    }

    async fn update_page(
        &self,
        body: &str,
        title: &str,
        current_version: u64,
    ) -> anyhow::Result<()> {
        Ok(WikiClient::update_page(self, body, title, current_version).await?)
    }

    async fn list_attachments(&self) -> anyhow::Result<Vec<AttachmentMeta>> {
        Ok(WikiClient::list_attachments(self).await?)
    }

    async fn download_attachment(&self, download_path: &str) -> anyhow::Result<Vec<u8>> {
        Ok(WikiClient::download_attachment(self, download_path).await?)
    }

    async fn delete_attachment(&self, id: &str) -> anyhow::Result<()> {
        Ok(WikiClient::delete_attachment(self, id).await?)
    }

    async fn upload_attachment(&self, path: &Path, filename: &str) -> anyhow::Result<String> {
        Ok(WikiClient::upload_attachment(self, path, filename).await?)
    }

    async fn set_appearance(&self, mode: &str) -> anyhow::Result<()> {
        Ok(WikiClient::set_appearance(self, mode).await?)
    }

    async fn list_versions(&self) -> anyhow::Result<Vec<PageVersion>> {
        Ok(WikiClient::list_versions(self).await?)
    }

    async fn delete_version(&self, number: u64) -> anyhow::Result<()> {
        Ok(WikiClient::delete_version(self, number).await?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a non-success response to the error taxonomy, consuming the body for
/// permanent failures so the caller sees what the server said.
async fn classify_response(resp: Response) -> RemoteError {
    let status = resp.status();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            RemoteError::RateLimited { retry_after }
        }
        StatusCode::CONFLICT => RemoteError::Conflict,
        s if s.is_server_error() => RemoteError::Server { status: s.as_u16() },
        s => {
            let detail: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_DETAIL_LIMIT)
                .collect();
            RemoteError::Permanent {
                status: s.as_u16(),
                detail,
            }
        }
    }
}

/// The listing API sometimes returns ids like `att123456`; v1 endpoints
/// only accept the bare digits, so ids are normalized everywhere.
fn normalize_content_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix("att").unwrap_or(trimmed);
    let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

fn file_part(bytes: &[u8], filename: &str) -> multipart::Part {
    let part = multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string());
    match part.mime_str(guess_mime(filename)) {
        Ok(part) => part,
        Err(_) => multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string()),
    }
}

fn guess_mime(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
