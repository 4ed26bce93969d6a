//! Out-of-band HTTP client for embed and player pages
//!
//! Every fetch carries a realistic desktop User-Agent and an explicit
//! Referer, since most third-party player backends gate on both. Redirects
//! are followed manually so that each hop gets the previous page as its
//! Referer and so that a redirect straight onto a media file is reported
//! instead of downloaded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::classify::is_stream_url;
use crate::error::{Result, ScoutError};

/// Desktop browser User-Agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Configuration for the HTTP client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,
    /// User-Agent header (default: desktop Chrome)
    pub user_agent: String,
    /// Maximum redirects followed by [`PageFetcher::fetch_page`] (default: 5)
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: USER_AGENT.to_string(),
            max_redirects: 5,
        }
    }
}

/// A fetched page after redirects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Final URL (a media URL if a redirect pointed straight at one)
    pub url: String,
    /// Response body; empty for media responses
    pub body: String,
    /// URLs visited before `url`, in order
    pub redirects: Vec<String>,
    /// True if the response (or redirect target) is media, not a document
    pub is_media: bool,
}

/// A single response without redirect following
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStep {
    pub url: String,
    pub status: u16,
    /// Resolved `Location` header for 3xx responses
    pub location: Option<String>,
    pub body: String,
    pub is_media: bool,
}

/// Source of page text for the scanner and the redirect follower
///
/// Implemented by [`EmbedClient`]; tests substitute canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET a page, following redirects
    ///
    /// # Errors
    /// - `HttpStatus` for non-2xx final responses
    /// - `Timeout` when the host does not answer in time
    /// - `HttpError` for other network failures
    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> Result<Page>;

    /// GET a page without following redirects
    async fn fetch_step(&self, url: &str, referer: Option<&str>) -> Result<FetchStep>;
}

/// HTTP client wrapper for third-party embed pages
///
/// Handles all outbound HTTP traffic of the pipeline:
/// - Desktop User-Agent and explicit Referer on every request
/// - Manual redirect following with per-hop Referer
/// - Never reads bodies of media responses
pub struct EmbedClient {
    client: reqwest::Client,
    max_redirects: usize,
}

impl EmbedClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .default_headers(headers)
            .build()
            .map_err(ScoutError::HttpError)?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    async fn send(&self, url: &str, referer: Option<&str>) -> Result<FetchStep> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer {
            request = request.header(header::REFERER, referer);
        }

        let response = request.send().await.map_err(|e| request_error(url, e))?;
        let status = response.status();

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| crate::url::resolve_url(url, loc));

        let is_media = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_media_content_type)
            .unwrap_or(false);

        // Media bodies can be gigabytes; the URL is all we need
        let body = if is_media || status.is_redirection() {
            String::new()
        } else {
            response.text().await.map_err(|e| request_error(url, e))?
        };

        trace!(url, status = status.as_u16(), is_media, "fetched");

        Ok(FetchStep {
            url: url.to_string(),
            status: status.as_u16(),
            location,
            body,
            is_media,
        })
    }
}

#[async_trait]
impl PageFetcher for EmbedClient {
    async fn fetch_page(&self, url: &str, referer: Option<&str>) -> Result<Page> {
        let mut current_url = url.to_string();
        let mut current_referer = referer.map(str::to_string);
        let mut redirects = Vec::new();

        for _ in 0..=self.max_redirects {
            let step = self.send(&current_url, current_referer.as_deref()).await?;

            if (300..400).contains(&step.status) {
                let Some(location) = step.location else {
                    // No usable Location header: nothing more to read
                    return Err(ScoutError::HttpStatus {
                        status: step.status,
                        url: current_url,
                    });
                };

                redirects.push(current_url.clone());

                // Don't follow redirects onto media files
                if is_stream_url(&location) {
                    debug!(from = %current_url, to = %location, "redirect points at media");
                    return Ok(Page {
                        url: location,
                        body: String::new(),
                        redirects,
                        is_media: true,
                    });
                }

                current_referer = Some(current_url);
                current_url = location;
                continue;
            }

            if !(200..300).contains(&step.status) {
                return Err(ScoutError::HttpStatus {
                    status: step.status,
                    url: current_url,
                });
            }

            return Ok(Page {
                url: current_url,
                body: step.body,
                redirects,
                is_media: step.is_media,
            });
        }

        Err(ScoutError::TooManyRedirects(url.to_string()))
    }

    async fn fetch_step(&self, url: &str, referer: Option<&str>) -> Result<FetchStep> {
        self.send(url, referer).await
    }
}

/// Timeouts get their own variant so callers can tell a slow host from a dead one
fn request_error(url: &str, error: reqwest::Error) -> ScoutError {
    if error.is_timeout() {
        ScoutError::Timeout(url.to_string())
    } else {
        ScoutError::HttpError(error)
    }
}

fn is_media_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("video/")
        || ct.contains("mpegurl")
        || ct.contains("dash+xml")
        || ct == "application/octet-stream"
}
