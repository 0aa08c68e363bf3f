
use anyhow::{Context, Result};
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ConfluenceConfig;
use crate::index::DocMetadata;

/// Page size for the space listing endpoint.
const SPACE_PAGE_LIMIT: usize = 500;
/// Page size for the content listing endpoint.
const CONTENT_PAGE_LIMIT: usize = 1000;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// One unit of source material pulled from Confluence: a page body or an
/// attachment payload. Discarded after normalization; only its metadata
/// travels further down the pipeline.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub metadata: DocMetadata,
    pub body: ItemBody,
}

#[derive(Debug, Clone)]
pub enum ItemBody {
    /// Rendered storage-format HTML of a page
    Html(String),
    /// Raw bytes of a downloaded attachment
    Binary(Vec<u8>),
}

/// A Confluence space (top-level grouping of pages).
#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SpacesResponse {
    results: Vec<Space>,
}

/// A Confluence page, fetched with its storage-format body expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(default)]
    body: Option<PageBody>,
}

#[derive(Debug, Clone, Deserialize)]
struct PageBody {
    storage: StorageBody,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageBody {
    value: String,
}

impl Page {
    /// Raw storage-format HTML, empty when the body was not expanded.
    #[inline]
    pub fn storage_html(&self) -> &str {
        self.body
            .as_ref()
            .map_or("", |body| body.storage.value.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    results: Vec<Page>,
}

/// An attachment listed under a page.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub title: String,
    #[serde(rename = "_links")]
    links: AttachmentLinks,
}

#[derive(Debug, Clone, Deserialize)]
struct AttachmentLinks {
    download: String,
}

impl Attachment {
    /// Relative download path under the instance base URL.
    #[inline]
    pub fn download_path(&self) -> &str {
        &self.links.download
    }
}

#[derive(Debug, Deserialize)]
struct AttachmentsResponse {
    results: Vec<Attachment>,
}

/// Blocking client for the Confluence REST API.
#[derive(Debug, Clone)]
pub struct ConfluenceClient {
    base_url: String,
    auth_header: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl ConfluenceClient {
    #[inline]
    pub fn new(config: &ConfluenceConfig) -> Result<Self> {
        let parsed = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid Confluence base URL: {}", config.base_url))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Confluence base URL must use HTTP or HTTPS: {}", config.base_url);
        }

        let credentials = format!("{}:{}", config.username, config.api_token);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    /// Canonical viewer link for a page. Attachments reuse their parent
    /// page's link.
    #[inline]
    pub fn viewer_link(&self, page_id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={}", self.base_url, page_id)
    }

    /// Enumerate every space in the instance via paginated listing.
    ///
    /// A failure here is fatal to an ingestion run: without the space list
    /// there is nothing to build an index from.
    #[inline]
    pub fn list_spaces(&self) -> Result<Vec<Space>> {
        let mut spaces = Vec::new();
        let mut start = 0;

        loop {
            let url = format!(
                "{}/rest/api/space?start={}&limit={}",
                self.base_url, start, SPACE_PAGE_LIMIT
            );
            let response_text = self
                .get_with_retry(&url)
                .context("Failed to list Confluence spaces")?;

            let page: SpacesResponse = serde_json::from_str(&response_text)
                .context("Failed to parse space listing response")?;

            if page.results.is_empty() {
                break;
            }

            let fetched = page.results.len();
            spaces.extend(page.results);
            debug!("Fetched {} spaces (total {})", fetched, spaces.len());

            // A short page does not mean the listing is done: permission
            // filtering can thin out a page with more data remaining. Only
            // an empty page ends the loop.
            start += SPACE_PAGE_LIMIT;
        }

        Ok(spaces)
    }

    /// Enumerate every page in a space, bodies expanded, via paginated
    /// listing.
    #[inline]
    pub fn list_pages(&self, space_key: &str) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        let mut start = 0;

        loop {
            let url = format!(
                "{}/rest/api/content?spaceKey={}&type=page&start={}&limit={}&expand=body.storage",
                self.base_url, space_key, start, CONTENT_PAGE_LIMIT
            );
            let response_text = self
                .get_with_retry(&url)
                .with_context(|| format!("Failed to list pages in space {}", space_key))?;

            let page: PagesResponse = serde_json::from_str(&response_text)
                .context("Failed to parse page listing response")?;

            if page.results.is_empty() {
                break;
            }

            let fetched = page.results.len();
            pages.extend(page.results);
            debug!(
                "Fetched {} pages from space {} (total {})",
                fetched,
                space_key,
                pages.len()
            );

            start += CONTENT_PAGE_LIMIT;
        }

        Ok(pages)
    }

    /// List the attachments hanging off one page.
    #[inline]
    pub fn list_attachments(&self, page_id: &str) -> Result<Vec<Attachment>> {
        let url = format!(
            "{}/rest/api/content/{}/child/attachment",
            self.base_url, page_id
        );
        let response_text = self
            .get_with_retry(&url)
            .with_context(|| format!("Failed to list attachments for page {}", page_id))?;

        let response: AttachmentsResponse = serde_json::from_str(&response_text)
            .context("Failed to parse attachment listing response")?;

        Ok(response.results)
    }

    /// Download an attachment's raw bytes via its relative download path.
    #[inline]
    pub fn download_attachment(&self, download_path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.base_url, download_path);
        debug!("Downloading attachment from {}", url);

        self.request_with_retry(|| {
            self.agent
                .get(&url)
                .header("Authorization", &self.auth_header)
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_vec())
        })
        .with_context(|| format!("Failed to download attachment from {}", download_path))
    }

    fn get_with_retry(&self, url: &str) -> Result<String> {
        debug!("Confluence GET {}", url);
        self.request_with_retry(|| {
            self.agent
                .get(url)
                .header("Authorization", &self.auth_header)
                .header("Accept", "application/json")
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    fn request_with_retry<T, F>(&self, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match request_fn() {
                Ok(response) => return Ok(response),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        debug!("Waiting {}ms before retry", delay_ms);
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!("All retry attempts failed for Confluence request");

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}
