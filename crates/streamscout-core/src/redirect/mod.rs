//! Redirect chain follower
//!
//! Walks an embed URL's redirect chain one hop at a time (HTTP `Location`,
//! meta refresh, `window.location` assignments, then the first nested
//! frame) and, if it lands on a known [`backends`] host, synthesizes that
//! backend's media URLs.

pub mod backends;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::classify::{classify, is_denied_url};
use crate::client::PageFetcher;
use crate::scanner::rules::{RuleFamily, compiled};
use crate::types::{EmbedTarget, StreamCandidate};
use crate::url::{decode_html_entities, resolve_url, unescape_js};

/// Default hop limit
pub const DEFAULT_MAX_HOPS: usize = 6;

/// Follow rules in the order a browser would act on them
const HOP_RULE_ORDER: &[&str] = &["meta_refresh", "window_location", "iframe_src"];

/// Where a redirect chain led
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectResolution {
    /// Backend identified along the chain, if any
    pub backend_name: Option<String>,
    /// Every URL visited, starting with the embed URL
    pub hops: Vec<String>,
    /// Candidates synthesized from the backend, or a hop that was media
    pub candidates: Vec<StreamCandidate>,
    /// Last HTML page reached, for the caller to scan
    pub final_page: Option<FinalPage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalPage {
    pub url: String,
    pub body: String,
    /// The hop before it, to use as Referer
    pub referer: Option<String>,
}

/// Picks the next hop out of a 2xx page body
pub fn next_hop(body: &str, page_url: &str) -> Option<String> {
    let normalized = decode_html_entities(&unescape_js(body));

    for name in HOP_RULE_ORDER {
        let Some((rule, re)) = compiled().iter().find(|(rule, _)| rule.name == *name) else {
            continue;
        };
        debug_assert_eq!(rule.family, RuleFamily::Follow);

        let next = re
            .captures_iter(&normalized)
            .flat_map(|caps| (rule.extract)(&caps))
            .filter_map(|hit| resolve_url(page_url, &hit.url))
            .find(|url| url != page_url && !is_denied_url(url));
        if next.is_some() {
            return next;
        }
    }

    None
}

/// Follows redirect chains over a [`PageFetcher`]
pub struct RedirectFollower {
    fetcher: Arc<dyn PageFetcher>,
    max_hops: usize,
}

impl RedirectFollower {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::with_max_hops(fetcher, DEFAULT_MAX_HOPS)
    }

    pub fn with_max_hops(fetcher: Arc<dyn PageFetcher>, max_hops: usize) -> Self {
        Self { fetcher, max_hops }
    }

    /// Follows `embed_url` for `target`
    ///
    /// Never fails: network errors end the chain early, and an
    /// unrecognized backend just leaves `backend_name` unset.
    pub async fn resolve(&self, target: &EmbedTarget, embed_url: &str) -> RedirectResolution {
        let mut resolution = RedirectResolution::default();
        let mut visited = HashSet::new();
        let mut current = embed_url.to_string();
        let mut referer: Option<String> = None;
        let mut backend_hop: Option<(&'static backends::Backend, String)> = None;

        for _ in 0..self.max_hops {
            if !visited.insert(current.clone()) {
                trace!(url = %current, "redirect loop");
                break;
            }
            resolution.hops.push(current.clone());

            if let Some(backend) = backends::identify(&current) {
                debug!(backend = backend.name, url = %current, "backend identified");
                backend_hop = Some((backend, current.clone()));
            }

            let step = match self.fetcher.fetch_step(&current, referer.as_deref()).await {
                Ok(step) => step,
                Err(e) => {
                    debug!(url = %current, error = %e, "redirect hop failed");
                    break;
                }
            };

            if step.is_media {
                push_direct(&mut resolution, &current, referer.as_deref());
                break;
            }

            let next = match step.status {
                300..=399 => step.location,
                200..=299 => {
                    let next = next_hop(&step.body, &current);
                    resolution.final_page = Some(FinalPage {
                        url: current.clone(),
                        body: step.body,
                        referer: referer.clone(),
                    });
                    next
                }
                status => {
                    debug!(url = %current, status, "redirect chain ended on error status");
                    None
                }
            };

            let Some(next) = next else {
                break;
            };

            if classify(&next).is_stream {
                push_direct(&mut resolution, &next, Some(&current));
                resolution.hops.push(next);
                break;
            }

            referer = Some(std::mem::replace(&mut current, next));
        }

        if let Some((backend, url)) = backend_hop {
            resolution.backend_name = Some(backend.name.to_string());
            let provider = format!("redirect:{}", backend.name);
            for candidate_url in backend.candidate_urls(&url, target) {
                let verdict = classify(&candidate_url);
                if let Some(candidate) = StreamCandidate::new(
                    &candidate_url,
                    verdict.container_type,
                    Some(&verdict.quality_label),
                    &provider,
                    &url,
                ) {
                    resolution.candidates.push(candidate);
                }
            }
        }

        debug!(
            hops = resolution.hops.len(),
            backend = resolution.backend_name.as_deref().unwrap_or("unknown"),
            candidates = resolution.candidates.len(),
            "redirect chain resolved"
        );
        resolution
    }
}

fn push_direct(resolution: &mut RedirectResolution, url: &str, referer: Option<&str>) {
    let verdict = classify(url);
    if !verdict.is_stream {
        return;
    }
    if let Some(candidate) = StreamCandidate::new(
        url,
        verdict.container_type,
        Some(&verdict.quality_label),
        "redirect:direct",
        referer.unwrap_or_default(),
    ) {
        resolution.candidates.push(candidate);
    }
}
