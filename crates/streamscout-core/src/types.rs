//! Core data types for the extraction pipeline
//!
//! Contains the main data structures used throughout the library.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

/// Streaming format family inferred from a URL's shape
///
/// Declaration order is preference order: `Hls` ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Hls,
    Mp4,
    Webm,
    Dash,
    Unknown,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Hls => "hls",
            ContainerType::Mp4 => "mp4",
            ContainerType::Webm => "webm",
            ContainerType::Dash => "dash",
            ContainerType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata-service identifier (TMDB style number or an IMDB style string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogId {
    Number(u64),
    Text(String),
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogId::Number(n) => write!(f, "{n}"),
            CatalogId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for CatalogId {
    fn from(value: u64) -> Self {
        CatalogId::Number(value)
    }
}

impl From<&str> for CatalogId {
    fn from(value: &str) -> Self {
        CatalogId::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

/// Input to the pipeline: what the user asked to play
///
/// Constructed fresh for every playback request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTarget {
    pub catalog_id: CatalogId,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl EmbedTarget {
    pub fn movie(catalog_id: impl Into<CatalogId>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            content_type: ContentType::Movie,
            season: None,
            episode: None,
        }
    }

    /// Whole-series embed
    pub fn series(catalog_id: impl Into<CatalogId>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            content_type: ContentType::Series,
            season: None,
            episode: None,
        }
    }

    pub fn season(catalog_id: impl Into<CatalogId>, season: u32) -> Self {
        Self {
            season: Some(season),
            ..Self::series(catalog_id)
        }
    }

    pub fn episode(catalog_id: impl Into<CatalogId>, season: u32, episode: u32) -> Self {
        Self {
            season: Some(season),
            episode: Some(episode),
            ..Self::series(catalog_id)
        }
    }

    /// Checks the season/episode combination against the content type
    ///
    /// # Errors
    /// Returns `InvalidTarget` if the ID is empty, a movie carries
    /// season/episode numbers, a number is zero, or an episode is given
    /// without its season.
    pub fn validate(&self) -> Result<()> {
        if let CatalogId::Text(id) = &self.catalog_id
            && id.trim().is_empty()
        {
            return Err(ScoutError::InvalidTarget(
                "Catalog ID cannot be empty".to_string(),
            ));
        }

        match self.content_type {
            ContentType::Movie => {
                if self.season.is_some() || self.episode.is_some() {
                    return Err(ScoutError::InvalidTarget(
                        "Movies have no season or episode".to_string(),
                    ));
                }
            }
            ContentType::Series => {
                if self.season == Some(0) || self.episode == Some(0) {
                    return Err(ScoutError::InvalidTarget(
                        "Season and episode numbers start at 1".to_string(),
                    ));
                }
                if self.episode.is_some() && self.season.is_none() {
                    return Err(ScoutError::InvalidTarget(
                        "Episode requires a season".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// One discovered, directly playable URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCandidate {
    /// Absolute http(s) or blob URL
    pub url: String,

    pub container_type: ContainerType,

    /// "1080p", a provider label, or "auto"
    pub quality_label: String,

    /// Strategy or backend that produced the candidate
    pub source_provider: String,

    /// Page the URL was discovered on
    pub origin_embed_url: String,

    /// Headers a player must send when requesting `url`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl StreamCandidate {
    /// Builds a candidate, returning `None` if `url` is not an absolute
    /// http(s) or blob URL
    ///
    /// The `Referer` header defaults to the origin page when that is a
    /// valid http(s) URL.
    pub fn new(
        url: &str,
        container_type: ContainerType,
        quality_label: Option<&str>,
        source_provider: &str,
        origin_embed_url: &str,
    ) -> Option<Self> {
        let url = url.trim();
        if !is_valid_candidate_url(url) {
            return None;
        }

        let quality_label = match quality_label.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => "auto".to_string(),
        };

        let mut headers = BTreeMap::new();
        if is_http_url(origin_embed_url) {
            headers.insert("Referer".to_string(), origin_embed_url.to_string());
        }

        Some(Self {
            url: url.to_string(),
            container_type,
            quality_label,
            source_provider: source_provider.to_string(),
            origin_embed_url: origin_embed_url.to_string(),
            headers,
        })
    }
}

fn is_http_url(value: &str) -> bool {
    ::url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Checks the candidate URL invariant: absolute http(s) with a host, or blob
pub fn is_valid_candidate_url(value: &str) -> bool {
    if let Some(inner) = value.strip_prefix("blob:") {
        return is_http_url(inner);
    }
    is_http_url(value)
}

/// Extraction strategies, in default priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Sandboxed frame + network sniffer + DOM watcher
    LiveCapture,
    /// Scan known direct-URL template pages
    DirectTemplates,
    /// Follow the redirect chain, then scan where it lands
    RedirectChain,
    /// Scan the raw embed page
    RawEmbedScan,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::LiveCapture,
        StrategyKind::DirectTemplates,
        StrategyKind::RedirectChain,
        StrategyKind::RawEmbedScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::LiveCapture => "live_capture",
            StrategyKind::DirectTemplates => "direct_templates",
            StrategyKind::RedirectChain => "redirect_chain",
            StrategyKind::RawEmbedScan => "raw_embed_scan",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one strategy during an extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StrategyOutcome {
    /// Produced this many candidates
    Found(usize),
    Empty,
    /// Ran out of time; partial results (if any) were kept
    TimedOut,
    Failed(String),
    /// Never started
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReport {
    pub strategy: StrategyKind,
    pub outcome: StrategyOutcome,
    pub elapsed_ms: u64,
}

/// Result of one `extract` call
///
/// `embed_url` is always set so the UI can fall back to (or let the user
/// switch to) the plain iframe regardless of `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    pub candidates: Vec<StreamCandidate>,
    pub embed_url: String,
    pub report: Vec<StrategyReport>,
}

impl ExtractionResult {
    /// Highest ranked candidate, if any
    pub fn best(&self) -> Option<&StreamCandidate> {
        self.candidates.first()
    }
}
