//! URL helper functions
//!
//! Builds canonical embed URLs, expands the direct-URL template table and
//! normalizes URLs pulled out of raw page text.

use crate::types::{ContentType, EmbedTarget};

/// Default embed host the canonical embed URL is built on
pub const DEFAULT_EMBED_BASE: &str = "https://www.2embed.cc";

/// Builds the canonical embed URL for a target
///
/// # Arguments
/// * `base` - Embed host without trailing slash (e.g., "https://www.2embed.cc")
/// * `target` - What to play
///
/// # Returns
/// - movie: `{base}/embed/{id}`
/// - whole series: `{base}/embedtvfull/{id}`
/// - season: `{base}/embedtv/{id}&s={season}`
/// - episode: `{base}/embedtv/{id}&s={season}&e={episode}`
///
/// # Example
/// ```
/// use streamscout_core::{build_embed_url, EmbedTarget};
/// let url = build_embed_url("https://www.2embed.cc", &EmbedTarget::episode(1399, 1, 2));
/// assert_eq!(url, "https://www.2embed.cc/embedtv/1399&s=1&e=2");
/// ```
pub fn build_embed_url(base: &str, target: &EmbedTarget) -> String {
    let base = base.trim_end_matches('/');
    let id = &target.catalog_id;

    match (target.content_type, target.season, target.episode) {
        (ContentType::Movie, _, _) => format!("{}/embed/{}", base, id),
        (ContentType::Series, Some(s), Some(e)) => {
            format!("{}/embedtv/{}&s={}&e={}", base, id, s, e)
        }
        (ContentType::Series, Some(s), None) => format!("{}/embedtv/{}&s={}", base, id, s),
        (ContentType::Series, None, _) => format!("{}/embedtvfull/{}", base, id),
    }
}

// ---------------------------------------------------------------------------
// Direct-URL templates
// ---------------------------------------------------------------------------

/// A known embed backend addressable directly by catalog ID
///
/// Placeholders: `{id}`, `{s}`, `{e}`.
#[derive(Debug, Clone, Copy)]
pub struct DirectTemplate {
    pub name: &'static str,
    pub movie: &'static str,
    /// `None` if the backend has no per-episode pages
    pub episode: Option<&'static str>,
}

/// Direct-URL template backends, tried in order
pub const DIRECT_TEMPLATES: &[DirectTemplate] = &[
    DirectTemplate {
        name: "vidsrc_xyz",
        movie: "https://vidsrc.xyz/embed/movie/{id}",
        episode: Some("https://vidsrc.xyz/embed/tv/{id}/{s}-{e}"),
    },
    DirectTemplate {
        name: "vidsrc_cc",
        movie: "https://vidsrc.cc/v2/embed/movie/{id}?autoPlay=false",
        episode: Some("https://vidsrc.cc/v2/embed/tv/{id}/{s}/{e}?autoPlay=false"),
    },
    DirectTemplate {
        name: "embed_su",
        movie: "https://embed.su/embed/movie/{id}",
        episode: Some("https://embed.su/embed/tv/{id}/{s}/{e}"),
    },
    DirectTemplate {
        name: "autoembed",
        movie: "https://player.autoembed.cc/embed/movie/{id}",
        episode: Some("https://player.autoembed.cc/embed/tv/{id}/{s}/{e}"),
    },
];

impl DirectTemplate {
    /// Expands the template for a target
    ///
    /// Returns `None` for whole-series/season targets (templates address
    /// single episodes) or when the backend has no episode pages.
    pub fn expand(&self, target: &EmbedTarget) -> Option<String> {
        let id = target.catalog_id.to_string();
        match (target.content_type, target.season, target.episode) {
            (ContentType::Movie, _, _) => Some(self.movie.replace("{id}", &id)),
            (ContentType::Series, Some(s), Some(e)) => self.episode.map(|t| {
                t.replace("{id}", &id)
                    .replace("{s}", &s.to_string())
                    .replace("{e}", &e.to_string())
            }),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Resolves `href` against the page it was found on
///
/// Handles absolute, protocol-relative (`//host/path`), root-relative and
/// relative references. Returns `None` for `javascript:`, `about:` and
/// anything that does not resolve to http(s).
///
/// # Example
/// ```
/// use streamscout_core::url::resolve_url;
/// assert_eq!(
///     resolve_url("https://a.example/embed/1", "//b.example/e/x").as_deref(),
///     Some("https://b.example/e/x")
/// );
/// ```
pub fn resolve_url(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let base = ::url::Url::parse(page_url).ok()?;
    let joined = base.join(href).ok()?;

    match joined.scheme() {
        "http" | "https" if joined.host_str().is_some() => Some(joined.to_string()),
        _ => None,
    }
}

/// Returns `scheme://host[:port]` of a URL
pub fn origin(page_url: &str) -> Option<String> {
    let parsed = ::url::Url::parse(page_url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Returns the lowercase host of a URL
pub fn host(page_url: &str) -> Option<String> {
    ::url::Url::parse(page_url)
        .ok()?
        .host_str()
        .map(str::to_ascii_lowercase)
}

/// Decodes common HTML entities in URLs
pub fn decode_html_entities(url: &str) -> String {
    url.replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x2F;", "/")
}

/// Undoes JavaScript string escaping commonly found around URLs
///
/// `https:\/\/cdn.example\/a.m3u8` and `\u002F` escapes become plain slashes.
pub fn unescape_js(text: &str) -> String {
    text.replace("\\/", "/")
        .replace("\\u002F", "/")
        .replace("\\u002f", "/")
        .replace("\\u0026", "&")
        .replace("\\x2F", "/")
}
