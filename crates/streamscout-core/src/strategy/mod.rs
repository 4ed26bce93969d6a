//! Extraction strategies
//!
//! Each strategy is one way of turning an embed URL into stream
//! candidates. The cascade runs them in order under a time budget and
//! stops at the first one that finds anything.
//!
//! Strategies push candidates into a [`CandidateSink`] as they go instead
//! of returning them, so whatever was found before a budget ran out
//! survives the cancellation.

mod direct_templates;
mod live_capture;
mod raw_scan;
mod redirect_chain;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::session::CandidateSink;
use crate::types::{EmbedTarget, StrategyKind};

pub use direct_templates::DirectTemplates;
pub use live_capture::LiveCapture;
pub use raw_scan::RawEmbedScan;
pub use redirect_chain::RedirectChain;

/// Everything a strategy needs for one run
#[derive(Debug, Clone)]
pub struct StrategyContext {
    pub target: EmbedTarget,
    pub embed_url: String,
    /// Time this run was granted; the cascade enforces it and strategies
    /// with several phases split it between them
    pub budget: Duration,
    /// Cancelled when the budget runs out or the extraction ends
    pub cancel: CancellationToken,
    pub max_scan_depth: usize,
}

/// One way of discovering stream candidates
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Runs to completion, pushing candidates into `sink` as found
    ///
    /// Returning `Ok` with an empty sink means "nothing here"; errors are
    /// reserved for failures worth reporting.
    async fn run(&self, ctx: &StrategyContext, sink: &CandidateSink) -> Result<()>;
}
