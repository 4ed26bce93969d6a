//! Direct templates: scan backends addressable straight from the catalog ID

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::PageFetcher;
use crate::error::Result;
use crate::scanner::PageScanner;
use crate::session::CandidateSink;
use crate::strategy::{Strategy, StrategyContext};
use crate::types::StrategyKind;
use crate::url::{DirectTemplate, DIRECT_TEMPLATES};

pub struct DirectTemplates {
    scanner: PageScanner,
    templates: &'static [DirectTemplate],
}

impl DirectTemplates {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self::with_templates(fetcher, DIRECT_TEMPLATES)
    }

    pub fn with_templates(fetcher: Arc<dyn PageFetcher>, templates: &'static [DirectTemplate]) -> Self {
        Self {
            scanner: PageScanner::new(fetcher),
            templates,
        }
    }
}

#[async_trait]
impl Strategy for DirectTemplates {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectTemplates
    }

    async fn run(&self, ctx: &StrategyContext, sink: &CandidateSink) -> Result<()> {
        for template in self.templates {
            if ctx.cancel.is_cancelled() {
                break;
            }
            let Some(url) = template.expand(&ctx.target) else {
                debug!(template = template.name, "template does not cover target");
                continue;
            };

            self.scanner
                .scan_into(
                    &url,
                    Some(&ctx.embed_url),
                    ctx.max_scan_depth,
                    &format!("direct_templates:{}", template.name),
                    sink,
                )
                .await;

            if !sink.is_empty() {
                debug!(template = template.name, candidates = sink.len(), "template hit");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testing::MapFetcher;
    use crate::types::EmbedTarget;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn ctx(target: EmbedTarget) -> StrategyContext {
        StrategyContext {
            target,
            embed_url: "https://www.2embed.cc/embed/574475".to_string(),
            budget: Duration::from_secs(5),
            cancel: CancellationToken::new(),
            max_scan_depth: 2,
        }
    }

    #[tokio::test]
    async fn test_first_template_miss_second_hit() {
        let fetcher = Arc::new(MapFetcher::new([
            ("https://vidsrc.xyz/embed/movie/574475", "<html>nothing</html>"),
            (
                "https://vidsrc.cc/v2/embed/movie/574475?autoPlay=false",
                r#"<script>var src = "https://cdn.example/movie/574475/index.m3u8";</script>"#,
            ),
        ]));
        let sink = CandidateSink::new();

        DirectTemplates::new(fetcher.clone())
            .run(&ctx(EmbedTarget::movie(574475)), &sink)
            .await
            .unwrap();

        let found = sink.take();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source_provider, "direct_templates:vidsrc_cc");
        // Stops at the first hit
        assert_eq!(fetcher.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_whole_series_expands_nothing() {
        let fetcher = Arc::new(MapFetcher::default());
        let sink = CandidateSink::new();

        DirectTemplates::new(fetcher.clone())
            .run(&ctx(EmbedTarget::series(1399)), &sink)
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fetcher = Arc::new(MapFetcher::default());
        let context = ctx(EmbedTarget::movie(1));
        context.cancel.cancel();

        DirectTemplates::new(fetcher.clone())
            .run(&context, &CandidateSink::new())
            .await
            .unwrap();

        assert_eq!(fetcher.fetch_count(), 0);
    }
}
