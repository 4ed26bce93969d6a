//! Known player backends
//!
//! Every embed chain eventually lands on one of a handful of hosting
//! backends whose media URLs follow a predictable shape. That knowledge is
//! brittle and changes often, so it lives here as a versioned table and
//! nowhere else.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::EmbedTarget;
use crate::url::{host, origin};

/// Bumped whenever a row below changes
pub const BACKENDS_VERSION: &str = "2025.1";

#[derive(Debug, Clone, Copy)]
pub struct Backend {
    pub name: &'static str,
    /// Host suffixes (or bare labels) served by this backend
    pub hosts: &'static [&'static str],
    /// Regexes with an `id` group, tried in order against the full URL
    pub id_patterns: &'static [&'static str],
    /// Candidate URL shapes, primary first. Placeholders:
    /// `{origin}`, `{id}`, `{catalog_id}`
    pub templates: &'static [&'static str],
}

pub const BACKENDS: &[Backend] = &[
    Backend {
        name: "streamwish",
        hosts: &["streamwish", "swish", "wishembed", "strwish", "yuguaab", "yesmovies"],
        id_patterns: &[r"/(?:e|v|f)/(?<id>[A-Za-z0-9]+)", r"[?&]id=(?<id>[A-Za-z0-9]+)"],
        templates: &["{origin}/hls/{id}/master.m3u8", "{origin}/stream/{id}/master.m3u8"],
    },
    Backend {
        name: "filemoon",
        hosts: &["filemoon", "moonplayer", "kerapoxy"],
        id_patterns: &[r"/(?:e|d)/(?<id>[A-Za-z0-9]+)"],
        templates: &["{origin}/hls/{id}/index.m3u8", "{origin}/download/{id}.mp4"],
    },
    Backend {
        name: "player4u",
        hosts: &["player4u"],
        id_patterns: &[r"[?&]id=(?<id>[\w-]+)", r"/(?:e|embed)/(?<id>[\w-]+)"],
        templates: &["{origin}/hls/{id}/playlist.m3u8", "{origin}/files/{id}.mp4"],
    },
    Backend {
        name: "vidsrc_prorcp",
        hosts: &["cloudnestra", "edgedeliverynetwork"],
        id_patterns: &[r"/prorcp/(?<id>[^/?#]+)"],
        templates: &["{origin}/pl/{id}/master.m3u8"],
    },
    Backend {
        name: "2embed_streamsrcs",
        hosts: &["streamsrcs.2embed.cc"],
        id_patterns: &[r"[?&]id=(?<id>[\w-]+)"],
        templates: &[
            "{origin}/hls/{id}/index.m3u8",
            "{origin}/hls/{catalog_id}/index.m3u8",
        ],
    },
];

fn compiled_patterns() -> &'static Vec<Vec<Regex>> {
    static COMPILED: OnceLock<Vec<Vec<Regex>>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        BACKENDS
            .iter()
            .map(|b| {
                b.id_patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("backend id regex"))
                    .collect()
            })
            .collect()
    })
}

impl Backend {
    /// True if `url`'s host belongs to this backend
    pub fn matches_host(&self, url: &str) -> bool {
        let Some(host) = host(url) else {
            return false;
        };
        self.hosts.iter().any(|pattern| {
            if pattern.contains('.') {
                host == *pattern || host.ends_with(&format!(".{pattern}"))
            } else {
                host.split('.').any(|label| label == *pattern)
            }
        })
    }

    fn index(&self) -> Option<usize> {
        BACKENDS.iter().position(|b| b.name == self.name)
    }

    /// Media ID embedded in `url`
    pub fn extract_id(&self, url: &str) -> Option<String> {
        let patterns = compiled_patterns().get(self.index()?)?;
        patterns
            .iter()
            .find_map(|re| re.captures(url)?.name("id").map(|m| m.as_str().to_string()))
    }

    /// Expands every template for a page on this backend
    pub fn candidate_urls(&self, url: &str, target: &EmbedTarget) -> Vec<String> {
        let (Some(origin), Some(id)) = (origin(url), self.extract_id(url)) else {
            return Vec::new();
        };
        let catalog_id = target.catalog_id.to_string();

        self.templates
            .iter()
            .map(|t| {
                t.replace("{origin}", &origin)
                    .replace("{id}", &id)
                    .replace("{catalog_id}", &catalog_id)
            })
            .collect()
    }
}

/// Finds the backend serving `url`
pub fn identify(url: &str) -> Option<&'static Backend> {
    BACKENDS.iter().find(|b| b.matches_host(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::is_stream_url;

    #[test]
    fn test_all_patterns_compile() {
        let compiled = compiled_patterns();
        assert_eq!(compiled.len(), BACKENDS.len());
        for (backend, patterns) in BACKENDS.iter().zip(compiled) {
            assert_eq!(backend.id_patterns.len(), patterns.len());
        }
    }

    #[test]
    fn test_identify_by_host() {
        assert_eq!(identify("https://streamwish.to/e/1mranuy7w6r2").map(|b| b.name), Some("streamwish"));
        assert_eq!(identify("https://yesmovies.baby/e/ahu6x76icl5g").map(|b| b.name), Some("streamwish"));
        assert_eq!(
            identify("https://cloudnestra.com/prorcp/ZmFrZQ").map(|b| b.name),
            Some("vidsrc_prorcp")
        );
        assert_eq!(
            identify("https://streamsrcs.2embed.cc/swish?id=abc").map(|b| b.name),
            Some("2embed_streamsrcs")
        );
        assert!(identify("https://www.2embed.cc/embed/574475").is_none());
        assert!(identify("https://unknown.example/e/1").is_none());
    }

    #[test]
    fn test_candidate_urls_primary_and_fallback() {
        let backend = identify("https://filemoon.sx/e/k9dw3jx1").unwrap();
        let urls = backend.candidate_urls("https://filemoon.sx/e/k9dw3jx1", &EmbedTarget::movie(1));
        assert_eq!(
            urls,
            vec![
                "https://filemoon.sx/hls/k9dw3jx1/index.m3u8",
                "https://filemoon.sx/download/k9dw3jx1.mp4",
            ]
        );
    }

    #[test]
    fn test_catalog_id_placeholder() {
        let backend = identify("https://streamsrcs.2embed.cc/swish?id=abc").unwrap();
        let urls = backend.candidate_urls(
            "https://streamsrcs.2embed.cc/swish?id=abc",
            &EmbedTarget::movie(574475),
        );
        assert_eq!(urls[1], "https://streamsrcs.2embed.cc/hls/574475/index.m3u8");
    }

    #[test]
    fn test_missing_id_yields_nothing() {
        let backend = identify("https://filemoon.sx/").unwrap();
        assert!(backend.candidate_urls("https://filemoon.sx/", &EmbedTarget::movie(1)).is_empty());
    }

    #[test]
    fn test_every_template_classifies_as_stream() {
        for backend in BACKENDS {
            for template in backend.templates {
                let url = template
                    .replace("{origin}", "https://host.example")
                    .replace("{id}", "abc123")
                    .replace("{catalog_id}", "574475");
                assert!(is_stream_url(&url), "{} template {url} must classify", backend.name);
            }
        }
    }
}
