//! Page-content pattern scanner
//!
//! Fetches a page out-of-band and runs the [`rules`] table over its text,
//! following nested frames and redirect targets up to a fixed depth.

pub mod rules;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::{debug, trace};

use crate::classify::{classify, is_denied_url, quality_label};
use crate::client::PageFetcher;
use crate::session::CandidateSink;
use crate::types::{ContainerType, StreamCandidate};
use crate::url::{decode_html_entities, resolve_url, unescape_js};

use rules::{RuleFamily, compiled};

/// Default nested-frame recursion depth
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Follow targets taken from a single page
pub const MAX_FOLLOW_PER_PAGE: usize = 4;

/// What one page's text yielded
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageFindings {
    /// Classified candidates in discovery order, unique by URL
    pub candidates: Vec<StreamCandidate>,
    /// Absolute nested-frame and redirect URLs, unique, in discovery order
    pub follow: Vec<String>,
}

/// Runs every scan rule over one page's text
///
/// `page_url` resolves relative URLs and becomes each candidate's Referer.
///
/// # Example
/// ```
/// use streamscout_core::scanner::scan_text;
/// let found = scan_text(
///     r#"<script>player.setup({ file: "https://x.example/stream.mp4" })</script>"#,
///     "https://embed.example/e/1",
///     "raw_embed_scan",
/// );
/// assert_eq!(found.candidates.len(), 1);
/// assert_eq!(found.candidates[0].url, "https://x.example/stream.mp4");
/// ```
pub fn scan_text(text: &str, page_url: &str, provider: &str) -> PageFindings {
    let normalized = decode_html_entities(&unescape_js(text));
    let mut findings = PageFindings::default();
    let mut seen = HashSet::new();

    for (rule, re) in compiled() {
        for caps in re.captures_iter(&normalized) {
            for hit in (rule.extract)(&caps) {
                let Some(url) = resolve_url(page_url, &decode_html_entities(&hit.url)) else {
                    continue;
                };

                if rule.family == RuleFamily::Follow {
                    push_follow(&mut findings.follow, page_url, url);
                    continue;
                }

                // A later labelled source array can name the quality of a literal
                if let Some(existing) = findings.candidates.iter_mut().find(|c| c.url == url) {
                    if existing.quality_label == "auto"
                        && let Some(label) = hit.label.as_deref()
                    {
                        existing.quality_label = provider_label(label);
                    }
                    continue;
                }
                if !seen.insert(url.clone()) {
                    continue;
                }

                let verdict = classify(&url);
                if !verdict.is_stream {
                    trace!(rule = rule.name, url = %url, "not a stream");
                    continue;
                }

                let container = match (verdict.container_type, rule.container_hint) {
                    (ContainerType::Unknown, Some(hint)) => hint,
                    (container, _) => container,
                };
                let quality = hit
                    .label
                    .as_deref()
                    .map(provider_label)
                    .unwrap_or(verdict.quality_label);

                if let Some(candidate) =
                    StreamCandidate::new(&url, container, Some(&quality), provider, page_url)
                {
                    trace!(rule = rule.name, url = %url, "matched");
                    findings.candidates.push(candidate);
                }
            }
        }
    }

    for src in iframe_sources(&normalized) {
        if let Some(url) = resolve_url(page_url, &src) {
            push_follow(&mut findings.follow, page_url, url);
        }
    }

    findings
}

fn push_follow(follow: &mut Vec<String>, page_url: &str, url: String) {
    if url == page_url || follow.contains(&url) {
        return;
    }
    if is_denied_url(&url) {
        trace!(url = %url, "skipping ad frame");
        return;
    }
    follow.push(url);
}

/// "720" → "720p"; "HD" stays "HD"
fn provider_label(label: &str) -> String {
    let normalized = quality_label(label);
    if normalized == "auto" && !label.trim().is_empty() {
        label.trim().to_string()
    } else {
        normalized
    }
}

/// Frame sources from the parsed DOM, catching markup the regex misses
fn iframe_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("iframe[src], iframe[data-src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
        .map(str::to_string)
        .collect()
}

/// Scans pages fetched through a [`PageFetcher`]
pub struct PageScanner {
    fetcher: Arc<dyn PageFetcher>,
}

impl PageScanner {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Scans `page_url` and returns every candidate found
    ///
    /// Non-2xx responses and network errors yield an empty list.
    pub async fn scan(
        &self,
        page_url: &str,
        referer: Option<&str>,
        max_depth: usize,
    ) -> Vec<StreamCandidate> {
        let sink = CandidateSink::new();
        self.scan_into(page_url, referer, max_depth, "page_scan", &sink)
            .await;
        sink.take()
    }

    /// Like [`scan`](Self::scan), pushing candidates into `sink` as they
    /// are found so a caller that times out still keeps them
    ///
    /// Nested frames are only followed from pages that produced no
    /// candidates themselves. Each URL is fetched at most once, and at
    /// most `max_depth` levels below `page_url` are visited.
    pub async fn scan_into(
        &self,
        page_url: &str,
        referer: Option<&str>,
        max_depth: usize,
        provider: &str,
        sink: &CandidateSink,
    ) {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((page_url.to_string(), referer.map(str::to_string), 0usize));

        while let Some((url, referer, depth)) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }

            let page = match self.fetcher.fetch_page(&url, referer.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    debug!(url = %url, error = %e, "scan fetch failed");
                    continue;
                }
            };

            if page.is_media {
                let verdict = classify(&page.url);
                if verdict.is_stream
                    && let Some(candidate) = StreamCandidate::new(
                        &page.url,
                        verdict.container_type,
                        Some(&verdict.quality_label),
                        provider,
                        &url,
                    )
                {
                    sink.push(candidate);
                }
                continue;
            }

            let findings = scan_text(&page.body, &page.url, provider);
            debug!(
                url = %page.url,
                depth,
                candidates = findings.candidates.len(),
                nested = findings.follow.len(),
                "scanned page"
            );

            if !findings.candidates.is_empty() {
                sink.extend(findings.candidates);
                continue;
            }

            if depth >= max_depth {
                continue;
            }

            for next in findings.follow.into_iter().take(MAX_FOLLOW_PER_PAGE) {
                if !visited.contains(&next) {
                    queue.push_back((next, Some(page.url.clone()), depth + 1));
                }
            }
        }
    }
}
