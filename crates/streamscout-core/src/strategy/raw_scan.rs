//! Raw embed scan: pattern-scan the embed page itself

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::PageFetcher;
use crate::error::Result;
use crate::scanner::PageScanner;
use crate::session::CandidateSink;
use crate::strategy::{Strategy, StrategyContext};
use crate::types::StrategyKind;

pub struct RawEmbedScan {
    scanner: PageScanner,
}

impl RawEmbedScan {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            scanner: PageScanner::new(fetcher),
        }
    }
}

#[async_trait]
impl Strategy for RawEmbedScan {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawEmbedScan
    }

    async fn run(&self, ctx: &StrategyContext, sink: &CandidateSink) -> Result<()> {
        self.scanner
            .scan_into(&ctx.embed_url, None, ctx.max_scan_depth, "raw_embed_scan", sink)
            .await;
        Ok(())
    }
}
