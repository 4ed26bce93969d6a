//! Scan rule table
//!
//! Every pattern the scanner knows lives here as data. Rules run in table
//! order over pre-normalized page text; each one yields either media URLs
//! (which still have to pass the classifier) or follow targets (nested
//! frames and redirects the scanner may recurse into).

use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use regex::{Captures, Regex};

use crate::types::ContainerType;

/// What a rule's matches mean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    /// Absolute media URL literal anywhere in the text
    MediaLiteral,
    /// Player configuration keys and source arrays
    PlayerConfig,
    /// Base64 string literal decoding to a media URL
    Base64Literal,
    /// Nested iframe or redirect target to recurse into
    Follow,
}

/// One raw hit: a URL (possibly relative) and an optional quality label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub url: String,
    pub label: Option<String>,
}

impl Extracted {
    fn url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            label: None,
        }
    }
}

pub struct ScanRule {
    pub name: &'static str,
    pub family: RuleFamily,
    pub pattern: &'static str,
    pub extract: fn(&Captures) -> Vec<Extracted>,
    /// Applied when the classifier can tell it is a stream but not which kind
    pub container_hint: Option<ContainerType>,
}

fn first_group(caps: &Captures) -> Vec<Extracted> {
    caps.get(1)
        .map(|m| vec![Extracted::url(m.as_str())])
        .unwrap_or_default()
}

/// Pulls every `{ file|src: "...", label: "..." }` entry out of an array body
fn source_array_entries(caps: &Captures) -> Vec<Extracted> {
    static ENTRY_RE: OnceLock<Regex> = OnceLock::new();
    static STRING_RE: OnceLock<Regex> = OnceLock::new();

    let Some(body) = caps.get(1).map(|m| m.as_str()) else {
        return Vec::new();
    };

    let entry_re = ENTRY_RE.get_or_init(|| {
        Regex::new(
            r#"\{[^{}]*?["']?(?:file|src|source)["']?\s*:\s*["']([^"']+)["'](?:[^{}]*?["']?(?:label|res|quality)["']?\s*:\s*["']?([^"',}]+)["']?)?[^{}]*\}"#,
        )
        .expect("source entry regex")
    });

    let mut found: Vec<Extracted> = entry_re
        .captures_iter(body)
        .filter_map(|c| {
            let url = c.get(1)?.as_str().to_string();
            let label = c.get(2).map(|l| l.as_str().trim().to_string());
            Some(Extracted { url, label })
        })
        .collect();

    // Plain string arrays: sources: ["https://...", ...]
    if found.is_empty() {
        let string_re = STRING_RE.get_or_init(|| {
            Regex::new(r#"["']((?:https?:)?//[^"']+|/[^"'/][^"']*)["']"#).expect("source string regex")
        });
        found = string_re
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| Extracted::url(m.as_str())))
            .collect();
    }

    found
}

fn decode_base64_url(caps: &Captures) -> Vec<Extracted> {
    let Some(literal) = caps.get(1).map(|m| m.as_str()) else {
        return Vec::new();
    };

    let decoded = STANDARD
        .decode(literal)
        .or_else(|_| URL_SAFE.decode(literal))
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    match decoded {
        Some(text) if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("//") => {
            vec![Extracted::url(text.trim())]
        }
        _ => Vec::new(),
    }
}

fn meta_refresh_target(caps: &Captures) -> Vec<Extracted> {
    caps.get(1)
        .map(|m| {
            let target = m.as_str().trim().trim_matches(|c| c == '\'' || c == '"');
            vec![Extracted::url(target)]
        })
        .unwrap_or_default()
}

/// All scan rules, in evaluation order
pub static RULES: &[ScanRule] = &[
    ScanRule {
        name: "media_literal",
        family: RuleFamily::MediaLiteral,
        // The extension must end the path: `stream.movieapi.club` or
        // `www.mp4upload.com` are hosts, not files.
        pattern: r#"(?i)((?:https?:)?//[^\s"'<>\\()\[\]{}]+?\.(?:m3u8|mpd|mp4|m4v|webm|mkv|mov|flv)(?:[?#][^\s"'<>\\()\[\]{}]*)?)(?:[^\w.\-/]|$)"#,
        extract: first_group,
        container_hint: None,
    },
    ScanRule {
        name: "player_config_key",
        family: RuleFamily::PlayerConfig,
        pattern: r#"(?i)["']?\b(?:file|source|src|video_?url|stream_?url)["']?\s*[:=]\s*["']([^"'\s]+)["']"#,
        extract: first_group,
        container_hint: None,
    },
    ScanRule {
        name: "hls_config_key",
        family: RuleFamily::PlayerConfig,
        pattern: r#"(?i)["']?\bhls\d?(?:_?(?:url|src|file))?["']?\s*:\s*["']([^"'\s]+)["']"#,
        extract: first_group,
        container_hint: Some(ContainerType::Hls),
    },
    ScanRule {
        name: "player_sources_array",
        family: RuleFamily::PlayerConfig,
        pattern: r#"(?is)["']?\b(?:sources|playlist)["']?\s*[:=]\s*\[(.*?)\]"#,
        extract: source_array_entries,
        container_hint: None,
    },
    ScanRule {
        name: "base64_literal",
        family: RuleFamily::Base64Literal,
        pattern: r#"["']([A-Za-z0-9+/_-]{24,}={0,2})["']"#,
        extract: decode_base64_url,
        container_hint: None,
    },
    ScanRule {
        name: "iframe_src",
        family: RuleFamily::Follow,
        pattern: r#"(?i)<iframe[^>]+?(?:data-src|src)\s*=\s*["']([^"']+)["']"#,
        extract: first_group,
        container_hint: None,
    },
    ScanRule {
        name: "meta_refresh",
        family: RuleFamily::Follow,
        pattern: r#"(?i)<meta[^>]+http-equiv\s*=\s*["']?refresh["']?[^>]*content\s*=\s*["'][^"']*?url\s*=\s*([^"'>]+)["']"#,
        extract: meta_refresh_target,
        container_hint: None,
    },
    ScanRule {
        name: "window_location",
        family: RuleFamily::Follow,
        pattern: r#"\b(?:(?:window|document|top|self)\.location(?:\.href)?|location\.href)\s*=\s*["']([^"']+)["']|\blocation\.(?:replace|assign)\(\s*["']([^"']+)["']\s*\)"#,
        extract: location_target,
        container_hint: None,
    },
];

fn location_target(caps: &Captures) -> Vec<Extracted> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| vec![Extracted::url(m.as_str())])
        .unwrap_or_default()
}

/// Rules paired with their compiled patterns
pub fn compiled() -> &'static [(&'static ScanRule, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static ScanRule, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| (rule, Regex::new(rule.pattern).expect("scan rule regex")))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, text: &str) -> Vec<Extracted> {
        let (rule, re) = compiled()
            .iter()
            .find(|(rule, _)| rule.name == name)
            .expect("rule exists");
        re.captures_iter(text).flat_map(|c| (rule.extract)(&c)).collect()
    }

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(compiled().len(), RULES.len());
    }

    #[test]
    fn test_media_literal() {
        let hits = run("media_literal", r#"var a = "https://cdn.example/v/master.m3u8?t=1"; x('//b.example/f.mp4')"#);
        let urls: Vec<&str> = hits.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://cdn.example/v/master.m3u8?t=1", "//b.example/f.mp4"]);
    }

    #[test]
    fn test_media_literal_extension_must_end_path() {
        let text = r#"a("https://stream.movieapi.club/hls/abc/index.m3u8"); b('https://www.mp4upload.com/files/abc/video.mp4')
            c("//webmcdn.example/v/clip.webm#t=10") d("https://cdn.example/v.mp4/index.m3u8?token=x")"#;
        let urls: Vec<String> = run("media_literal", text).into_iter().map(|e| e.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://stream.movieapi.club/hls/abc/index.m3u8",
                "https://www.mp4upload.com/files/abc/video.mp4",
                "//webmcdn.example/v/clip.webm#t=10",
                "https://cdn.example/v.mp4/index.m3u8?token=x",
            ]
        );
    }

    #[test]
    fn test_media_literal_at_end_of_text() {
        let hits = run("media_literal", "https://cdn.example/hls/master.m3u8");
        assert_eq!(hits, vec![Extracted::url("https://cdn.example/hls/master.m3u8")]);
        assert!(run("media_literal", "https://cdn.mp4.example/page").is_empty());
    }

    #[test]
    fn test_player_config_key() {
        let hits = run("player_config_key", r#"player.setup({ file: "https://x.example/stream.mp4", image: "p.jpg" })"#);
        assert_eq!(hits, vec![Extracted::url("https://x.example/stream.mp4")]);

        let json = run("player_config_key", r#"{"file":"/hls/abc/index.m3u8"}"#);
        assert_eq!(json, vec![Extracted::url("/hls/abc/index.m3u8")]);
    }

    #[test]
    fn test_sources_array_with_labels() {
        let text = r#"sources: [{file: "https://c.example/720.mp4", label: "720p"}, {file: "https://c.example/1080.mp4", label: "1080p"}]"#;
        let hits = run("player_sources_array", text);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].url, "https://c.example/1080.mp4");
        assert_eq!(hits[1].label.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_sources_array_of_strings() {
        let hits = run("player_sources_array", r#"playlist: ["https://c.example/a.m3u8", '//c.example/b.mp4']"#);
        let urls: Vec<&str> = hits.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://c.example/a.m3u8", "//c.example/b.mp4"]);
    }

    #[test]
    fn test_base64_literal() {
        let encoded = STANDARD.encode("https://cdn.example/v/movie.m3u8");
        let hits = run("base64_literal", &format!(r#"var s = atob("{encoded}");"#));
        assert_eq!(hits, vec![Extracted::url("https://cdn.example/v/movie.m3u8")]);

        let noise = STANDARD.encode("just some opaque player token value");
        assert!(run("base64_literal", &format!(r#""{noise}""#)).is_empty());
    }

    #[test]
    fn test_follow_rules() {
        let iframe = run("iframe_src", r#"<iframe width="100%" src="//player.example/e/abc" allowfullscreen></iframe>"#);
        assert_eq!(iframe, vec![Extracted::url("//player.example/e/abc")]);

        let meta = run("meta_refresh", r#"<meta http-equiv="refresh" content="0; url=https://next.example/p">"#);
        assert_eq!(meta, vec![Extracted::url("https://next.example/p")]);

        let js = run("window_location", r#"window.location.href = "https://hop.example/r?id=1";"#);
        assert_eq!(js, vec![Extracted::url("https://hop.example/r?id=1")]);

        let replace = run("window_location", r#"location.replace('https://hop.example/x')"#);
        assert_eq!(replace, vec![Extracted::url("https://hop.example/x")]);

        let attribute = run("window_location", r#"<div data-location="https://ads.example/banner"></div>"#);
        assert!(attribute.is_empty());
        let href = run("window_location", r#"location.href='https://hop.example/y'"#);
        assert_eq!(href, vec![Extracted::url("https://hop.example/y")]);
    }
}
