//! URL classifier
//!
//! Decides whether a URL points at playable media and, if so, which
//! container family and quality it most likely has. Pure string heuristics,
//! no I/O, so every other component can run arbitrary URLs through it.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::ContainerType;

/// Classifier verdict for a single URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub is_stream: bool,
    pub container_type: ContainerType,
    pub quality_label: String,
}

impl Classification {
    fn miss() -> Self {
        Self {
            is_stream: false,
            container_type: ContainerType::Unknown,
            quality_label: "auto".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Denylist
// ---------------------------------------------------------------------------

/// Resource extensions that are never media
const DENY_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "avif", "woff",
    "woff2", "ttf", "otf", "eot", "vtt", "srt", "ass", "ts", "key", "m4s", "aac",
];

/// Known analytics / ad-tech domains, matched as host suffixes
const DENY_DOMAINS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "googlesyndication.com",
    "googleadservices.com",
    "doubleclick.net",
    "adservice.google.com",
    "amazon-adsystem.com",
    "facebook.net",
    "scorecardresearch.com",
    "hotjar.com",
    "histats.com",
    "popads.net",
    "popcash.net",
    "propellerads.com",
    "adsterra.com",
    "exoclick.com",
    "juicyads.com",
    "taboola.com",
    "outbrain.com",
    "onclickads.net",
    "yandex.ru",
];

/// Host labels that identify ad or tracking infrastructure
const DENY_HOST_LABELS: &[&str] = &[
    "ads", "ad", "adserver", "adsrv", "tracker", "tracking", "analytics", "stats", "pixel",
];

/// Path segments (or file stems) typical for ad and beacon endpoints
///
/// Plain `track` is absent: HLS renditions live under paths like
/// `/track/a1/index.m3u8`.
const DENY_PATH_SEGMENTS: &[&str] = &[
    "ads", "ad", "vast", "vpaid", "pixel", "beacon", "tracker", "tracking", "impression",
];

fn is_denied(host: &str, path: &str) -> bool {
    if DENY_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    {
        return true;
    }

    if host.split('.').any(|label| DENY_HOST_LABELS.contains(&label)) {
        return true;
    }

    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    while let Some(segment) = segments.next() {
        let (stem, ext) = split_extension(segment);
        if DENY_PATH_SEGMENTS.contains(&stem) {
            return true;
        }
        // Only the last segment carries the resource type
        if segments.peek().is_none()
            && let Some(ext) = ext
            && DENY_EXTENSIONS.contains(&ext)
        {
            return true;
        }
    }

    false
}

fn split_extension(segment: &str) -> (&str, Option<&str>) {
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (segment, None),
    }
}

// ---------------------------------------------------------------------------
// Stream patterns
// ---------------------------------------------------------------------------

fn media_extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.(m3u8|mpd|mp4|m4v|mov|webm|mkv|flv)(?:$|[^a-z0-9])")
            .expect("media extension regex")
    })
}

fn container_for_extension(ext: &str) -> ContainerType {
    match ext {
        "m3u8" => ContainerType::Hls,
        "mpd" => ContainerType::Dash,
        "mp4" | "m4v" | "mov" => ContainerType::Mp4,
        "webm" | "mkv" => ContainerType::Webm,
        _ => ContainerType::Unknown,
    }
}

/// Path segments that denote an adaptive-streaming manifest
const MANIFEST_SEGMENTS: &[&str] = &["manifest", "playlist", "master"];

/// Segments that suggest a media endpoint without telling the format
const STREAM_KEYWORD_SEGMENTS: &[&str] = &[
    "hls", "hls2", "hls3", "hls4", "stream", "streams", "videoplayback", "vod",
];

fn container_for_path(path: &str, query: &str) -> Option<ContainerType> {
    // Extension in the path wins over one buried in the query
    for haystack in [path, query] {
        if let Some(caps) = media_extension_re().captures(haystack) {
            return Some(container_for_extension(&caps[1]));
        }
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let is_dash = segments.iter().any(|s| s.contains("dash"));

    let has_manifest = segments.iter().any(|s| {
        let (stem, _) = split_extension(s);
        MANIFEST_SEGMENTS.contains(&stem)
    });
    if has_manifest {
        return Some(if is_dash {
            ContainerType::Dash
        } else {
            ContainerType::Hls
        });
    }

    if segments
        .iter()
        .any(|s| STREAM_KEYWORD_SEGMENTS.contains(s))
    {
        return Some(ContainerType::Unknown);
    }

    None
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Extracts a quality label ("720p") from path and query, or "auto"
pub fn quality_label(text: &str) -> String {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    static BARE_RE: OnceLock<Regex> = OnceLock::new();

    let token = TOKEN_RE
        .get_or_init(|| {
            Regex::new(r"(?i)(?:^|[^0-9a-z])(\d{3,4})p(?:$|[^0-9a-z])").expect("quality token regex")
        })
        .captures(text)
        .map(|caps| format!("{}p", &caps[1]));
    if let Some(label) = token {
        return label;
    }

    BARE_RE
        .get_or_init(|| {
            Regex::new(r"(?:^|[^0-9])(2160|1440|1080|720|480|360|240)(?:$|[^0-9])")
                .expect("bare quality regex")
        })
        .captures(text)
        .map(|caps| format!("{}p", &caps[1]))
        .unwrap_or_else(|| "auto".to_string())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Classifies a URL as a playable stream or not
///
/// The denylist is consulted first and always wins, so ad-tech URLs that
/// happen to look like media (`https://ads.example.com/tracker.m3u8`) are
/// rejected.
///
/// # Example
/// ```
/// use streamscout_core::{classify, ContainerType};
/// let c = classify("https://cdn.example/video/abc123.m3u8?q=720p");
/// assert!(c.is_stream);
/// assert_eq!(c.container_type, ContainerType::Hls);
/// assert_eq!(c.quality_label, "720p");
/// ```
pub fn classify(url: &str) -> Classification {
    let trimmed = url.trim();

    if let Some(inner) = trimmed.strip_prefix("blob:") {
        if ::url::Url::parse(inner).is_ok() {
            return Classification {
                is_stream: true,
                container_type: ContainerType::Unknown,
                quality_label: "auto".to_string(),
            };
        }
        return Classification::miss();
    }

    let Ok(parsed) = ::url::Url::parse(trimmed) else {
        return Classification::miss();
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return Classification::miss();
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = parsed.path().to_ascii_lowercase();
    let query = parsed.query().unwrap_or_default().to_ascii_lowercase();

    if is_denied(&host, &path) {
        return Classification::miss();
    }

    match container_for_path(&path, &query) {
        Some(container_type) => Classification {
            is_stream: true,
            container_type,
            quality_label: quality_label(&format!("{path}?{query}")),
        },
        None => Classification::miss(),
    }
}

/// Shorthand for `classify(url).is_stream`
pub fn is_stream_url(url: &str) -> bool {
    classify(url).is_stream
}

/// True for ad-tech and tracking URLs, which are never worth following
pub fn is_denied_url(url: &str) -> bool {
    let Ok(parsed) = ::url::Url::parse(url.trim()) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    is_denied(&host, &parsed.path().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn verdict(url: &str) -> (bool, ContainerType, String) {
        let c = classify(url);
        (c.is_stream, c.container_type, c.quality_label)
    }

    #[test]
    fn test_classify_table() {
        let table: &[(&str, bool, ContainerType, &str)] = &[
            ("https://cdn.example/video/abc123.m3u8?q=720p", true, ContainerType::Hls, "720p"),
            ("https://cdn.example/hls/master.m3u8", true, ContainerType::Hls, "auto"),
            ("https://x.example/stream.mp4", true, ContainerType::Mp4, "auto"),
            ("https://x.example/movie_1080p.mp4?token=1", true, ContainerType::Mp4, "1080p"),
            ("https://x.example/clip.webm", true, ContainerType::Webm, "auto"),
            ("https://x.example/clip.mkv", true, ContainerType::Webm, "auto"),
            ("https://x.example/clip.mov", true, ContainerType::Mp4, "auto"),
            ("https://x.example/clip.flv", true, ContainerType::Unknown, "auto"),
            ("https://x.example/v/stream.mpd", true, ContainerType::Dash, "auto"),
            ("https://x.example/dash/abc/manifest", true, ContainerType::Dash, "auto"),
            ("https://x.example/abc/playlist", true, ContainerType::Hls, "auto"),
            ("https://x.example/get?file=movie.mp4", true, ContainerType::Mp4, "auto"),
            ("https://x.example/hls/abc/480/", true, ContainerType::Unknown, "480p"),
            ("https://x.example/assets/player.js", false, ContainerType::Unknown, "auto"),
            ("https://x.example/style.css?v=720", false, ContainerType::Unknown, "auto"),
            ("https://x.example/poster.jpg", false, ContainerType::Unknown, "auto"),
            ("https://x.example/font.woff2", false, ContainerType::Unknown, "auto"),
            ("https://x.example/hls/seg-1-v1-a1.ts", false, ContainerType::Unknown, "auto"),
            ("https://x.example/subs/en.vtt", false, ContainerType::Unknown, "auto"),
            ("https://x.example/embed/574475", false, ContainerType::Unknown, "auto"),
            ("not a url", false, ContainerType::Unknown, "auto"),
            ("/relative/video.m3u8", false, ContainerType::Unknown, "auto"),
        ];

        for (url, is_stream, container, quality) in table {
            assert_eq!(
                verdict(url),
                (*is_stream, *container, quality.to_string()),
                "classify({url})"
            );
        }
    }

    #[test]
    fn test_denylist_wins_over_stream_pattern() {
        assert!(!is_stream_url("https://ads.example.com/tracker.m3u8"));
        assert!(!is_stream_url("https://www.google-analytics.com/collect.mp4"));
        assert!(!is_stream_url("https://cdn.example/vast/preroll.mp4"));
        assert!(!is_stream_url("https://static.doubleclick.net/video/ad.m3u8"));
        assert!(!is_stream_url("https://cdn.example/hls/tracker.m3u8"));
    }

    #[test]
    fn test_denylist_does_not_match_substrings() {
        // "uploads" and "shadow" contain "ad" but are not ad segments/hosts
        assert!(is_stream_url("https://cdn.example/uploads/video.mp4"));
        assert!(is_stream_url("https://shadow.example/video.m3u8"));
    }

    #[test]
    fn test_rendition_track_paths_are_streams() {
        assert!(is_stream_url("https://cdn.example/hls/abc/track/a1/index.m3u8"));
        assert!(is_stream_url("https://cdn.example/v/track/subs-en/index.m3u8"));
        assert!(!is_stream_url("https://cdn.example/tracking/v.m3u8"));
    }

    #[test]
    fn test_is_denied_url() {
        assert!(is_denied_url("https://pagead2.googlesyndication.com/pagead/show_ads.js"));
        assert!(is_denied_url("https://cdn.example/vast/preroll.xml"));
        assert!(!is_denied_url("https://player.example/e/abc"));
        assert!(!is_denied_url("not a url"));
    }

    #[test]
    fn test_blob_urls() {
        let c = classify("blob:https://player.example/9a8f-77");
        assert!(c.is_stream);
        assert_eq!(c.container_type, ContainerType::Unknown);
        assert!(!classify("blob:garbage").is_stream);
    }

    #[test]
    fn test_quality_label() {
        assert_eq!(quality_label("/video/abc_720p.m3u8"), "720p");
        assert_eq!(quality_label("/video/1080/index.m3u8"), "1080p");
        assert_eq!(quality_label("/video/abc.m3u8?res=360"), "360p");
        assert_eq!(quality_label("/video/10801/index.m3u8"), "auto");
        assert_eq!(quality_label("/video/abc.m3u8"), "auto");
        assert_eq!(quality_label("/video/2160P/x.mp4"), "2160p");
    }

    #[test]
    fn test_quality_ignores_host() {
        let c = classify("https://s1080.example/video/abc.m3u8");
        assert_eq!(c.quality_label, "auto");
    }

    proptest! {
        #[test]
        fn test_classify_is_deterministic(s in ".{0,80}") {
            prop_assert_eq!(classify(&s), classify(&s));
        }

        #[test]
        fn test_classify_url_is_deterministic(path in "[a-z0-9/._-]{0,40}", ext in "(m3u8|mp4|webm|mpd|js|png)") {
            let url = format!("https://cdn.example/{path}.{ext}");
            prop_assert_eq!(classify(&url), classify(&url));
        }

        #[test]
        fn test_denylisted_host_never_streams(path in "[a-z0-9/_-]{0,40}", ext in "(m3u8|mp4|webm|mpd|mkv)") {
            let url = format!("https://ads.example.com/{path}.{ext}");
            prop_assert!(!classify(&url).is_stream);
        }

        #[test]
        fn test_denylisted_extension_never_streams(path in "[a-z0-9_-]{1,20}", ext in "(css|js|png|jpg|woff2|ts|vtt)") {
            let url = format!("https://cdn.example/hls/{path}.m3u8/{path}.{ext}");
            prop_assert!(!classify(&url).is_stream);
        }
    }
}
