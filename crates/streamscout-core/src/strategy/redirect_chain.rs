//! Redirect chain: follow the embed to its backend, then scan where it lands

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::PageFetcher;
use crate::error::Result;
use crate::redirect::RedirectFollower;
use crate::scanner::{scan_text, PageScanner, MAX_FOLLOW_PER_PAGE};
use crate::session::CandidateSink;
use crate::strategy::{Strategy, StrategyContext};
use crate::types::StrategyKind;

const PROVIDER: &str = "redirect_chain";

pub struct RedirectChain {
    follower: RedirectFollower,
    scanner: PageScanner,
}

impl RedirectChain {
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_hops: usize) -> Self {
        Self {
            follower: RedirectFollower::with_max_hops(Arc::clone(&fetcher), max_hops),
            scanner: PageScanner::new(fetcher),
        }
    }
}

#[async_trait]
impl Strategy for RedirectChain {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RedirectChain
    }

    async fn run(&self, ctx: &StrategyContext, sink: &CandidateSink) -> Result<()> {
        let resolution = self.follower.resolve(&ctx.target, &ctx.embed_url).await;
        sink.extend(resolution.candidates);
        if !sink.is_empty() {
            return Ok(());
        }

        let Some(page) = resolution.final_page else {
            return Ok(());
        };

        let findings = scan_text(&page.body, &page.url, PROVIDER);
        if !findings.candidates.is_empty() {
            sink.extend(findings.candidates);
            return Ok(());
        }

        debug!(url = %page.url, nested = findings.follow.len(), "final page has no media");
        let depth = ctx.max_scan_depth.saturating_sub(1);
        for next in findings.follow.iter().take(MAX_FOLLOW_PER_PAGE) {
            if ctx.cancel.is_cancelled() {
                break;
            }
            self.scanner
                .scan_into(next, Some(&page.url), depth, PROVIDER, sink)
                .await;
            if !sink.is_empty() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FetchStep, Page};
    use crate::error::ScoutError;
    use crate::types::EmbedTarget;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// 302 from the embed to a page whose body is scanned
    struct ChainFetcher {
        steps: HashMap<&'static str, FetchStep>,
    }

    #[async_trait]
    impl PageFetcher for ChainFetcher {
        async fn fetch_page(&self, url: &str, _referer: Option<&str>) -> Result<Page> {
            let step = self.fetch_step(url, None).await?;
            Ok(Page {
                url: step.url,
                body: step.body,
                ..Page::default()
            })
        }

        async fn fetch_step(&self, url: &str, _referer: Option<&str>) -> Result<FetchStep> {
            self.steps.get(url).cloned().ok_or_else(|| ScoutError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
        }
    }

    fn ctx() -> StrategyContext {
        StrategyContext {
            target: EmbedTarget::movie(574475),
            embed_url: "https://embed.example/e/574475".to_string(),
            budget: Duration::from_secs(5),
            cancel: CancellationToken::new(),
            max_scan_depth: 3,
        }
    }

    fn page(url: &str, body: &str) -> FetchStep {
        FetchStep {
            url: url.to_string(),
            status: 200,
            body: body.to_string(),
            ..FetchStep::default()
        }
    }

    #[tokio::test]
    async fn test_scans_final_page() {
        let mut steps = HashMap::new();
        steps.insert(
            "https://embed.example/e/574475",
            FetchStep {
                url: "https://embed.example/e/574475".to_string(),
                status: 302,
                location: Some("https://landing.example/watch/574475".to_string()),
                ..FetchStep::default()
            },
        );
        steps.insert(
            "https://landing.example/watch/574475",
            page(
                "https://landing.example/watch/574475",
                r#"<script>sources: [{file: "https://cdn.example/574475/1080.mp4", label: "1080p"}]</script>"#,
            ),
        );
        let sink = CandidateSink::new();

        RedirectChain::new(Arc::new(ChainFetcher { steps }), 6)
            .run(&ctx(), &sink)
            .await
            .unwrap();

        let found = sink.take();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://cdn.example/574475/1080.mp4");
        assert_eq!(found[0].quality_label, "1080p");
        assert_eq!(found[0].source_provider, PROVIDER);
    }

    #[tokio::test]
    async fn test_unreachable_embed_is_empty() {
        let sink = CandidateSink::new();
        RedirectChain::new(Arc::new(ChainFetcher { steps: HashMap::new() }), 6)
            .run(&ctx(), &sink)
            .await
            .unwrap();
        assert!(sink.is_empty());
    }
}
