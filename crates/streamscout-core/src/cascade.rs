//! Strategy cascade
//!
//! [`StreamExtractor`] is the crate's entry point. One call to
//! [`extract`](StreamExtractor::extract) tries each configured strategy in
//! order, each under its own budget and all under one overall deadline,
//! and stops at the first strategy that yields anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::{EmbedClient, PageFetcher};
use crate::config::ScoutConfig;
use crate::error::Result;
use crate::loader::FrameHost;
use crate::rank::dedup_and_rank;
use crate::session::{CandidateSink, ExtractionSession, SessionState};
use crate::sniffer::session_lock;
use crate::strategy::{
    DirectTemplates, LiveCapture, RawEmbedScan, RedirectChain, Strategy, StrategyContext,
};
use crate::types::{
    EmbedTarget, ExtractionResult, StrategyKind, StrategyOutcome, StrategyReport,
};
use crate::url::build_embed_url;

/// Runs the strategy cascade for embed targets
///
/// Cheap to share behind an `Arc`; concurrent `extract` calls queue up
/// on the process-wide session lock.
pub struct StreamExtractor {
    config: ScoutConfig,
    strategies: HashMap<StrategyKind, Arc<dyn Strategy>>,
}

impl StreamExtractor {
    /// Extractor with default configuration and no live-capture host
    ///
    /// # Errors
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn with_config(config: ScoutConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> StreamExtractorBuilder {
        StreamExtractorBuilder::default()
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }

    /// Canonical embed URL for `target`
    pub fn embed_url(&self, target: &EmbedTarget) -> String {
        build_embed_url(&self.config.embed_base_url, target)
    }

    /// Extracts with the configured overall timeout
    pub async fn extract_default(&self, target: &EmbedTarget) -> Result<ExtractionResult> {
        self.extract(target, self.config.overall_timeout()).await
    }

    /// Runs the cascade for `target`, returning within `overall_timeout`
    ///
    /// Finding nothing is not an error: the result has `success == false`
    /// and still carries the embed URL for an iframe fallback.
    ///
    /// # Errors
    /// Returns `InvalidTarget` if the target fails validation.
    #[instrument(skip(self, target), fields(catalog_id = %target.catalog_id))]
    pub async fn extract(
        &self,
        target: &EmbedTarget,
        overall_timeout: Duration,
    ) -> Result<ExtractionResult> {
        target.validate()?;

        let started = Instant::now();
        let deadline = started + overall_timeout;
        let embed_url = self.embed_url(target);
        let mut session = ExtractionSession::new(target.clone(), deadline);
        let mut report = Vec::new();

        let Ok(_session_guard) = tokio::time::timeout_at(deadline, session_lock().lock()).await
        else {
            warn!("timed out waiting for a running extraction to finish");
            for kind in &self.config.cascade.order {
                report.push(skipped(*kind, "session busy"));
            }
            transition(&mut session, SessionState::Exhausted);
            return Ok(ExtractionResult {
                success: false,
                candidates: Vec::new(),
                embed_url,
                report,
            });
        };

        let cancel = CancellationToken::new();
        let _cancel_on_exit = cancel.clone().drop_guard();
        let cascade = &self.config.cascade;

        for kind in &cascade.order {
            let kind = *kind;
            let Some(strategy) = self.strategies.get(&kind) else {
                report.push(skipped(kind, "not available"));
                continue;
            };

            let remaining = session.remaining();
            if remaining < cascade.min_strategy_budget() {
                debug!(strategy = %kind, ?remaining, "not enough time left");
                report.push(skipped(kind, "overall deadline"));
                continue;
            }
            let budget = cascade.budget_for(kind).min(remaining);

            transition(&mut session, SessionState::Running(kind));
            let ctx = StrategyContext {
                target: target.clone(),
                embed_url: embed_url.clone(),
                budget,
                cancel: cancel.child_token(),
                max_scan_depth: cascade.max_scan_depth,
            };
            let sink = CandidateSink::new();
            let strategy_started = Instant::now();

            let outcome = match tokio::time::timeout(budget, strategy.run(&ctx, &sink)).await {
                Ok(Ok(())) if sink.is_empty() => StrategyOutcome::Empty,
                Ok(Ok(())) => StrategyOutcome::Found(sink.len()),
                Ok(Err(e)) => {
                    warn!(strategy = %kind, error = %e, "strategy failed");
                    StrategyOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    ctx.cancel.cancel();
                    transition(&mut session, SessionState::TimedOut(kind));
                    debug!(strategy = %kind, partial = sink.len(), "strategy timed out");
                    StrategyOutcome::TimedOut
                }
            };

            let elapsed_ms = millis(strategy_started.elapsed());
            debug!(strategy = %kind, ?outcome, elapsed_ms, "strategy finished");
            report.push(StrategyReport {
                strategy: kind,
                outcome,
                elapsed_ms,
            });

            session.discovered.extend(sink.take());
            if !session.discovered.is_empty() {
                transition(&mut session, SessionState::Succeeded);
                break;
            }
        }

        if !session.state().is_terminal() {
            transition(&mut session, SessionState::Exhausted);
        }

        let candidates = dedup_and_rank(std::mem::take(&mut session.discovered));
        let success = !candidates.is_empty();
        info!(
            success,
            candidates = candidates.len(),
            best = candidates.first().map(|c| c.url.as_str()).unwrap_or("none"),
            elapsed_ms = millis(started.elapsed()),
            "extraction finished"
        );

        Ok(ExtractionResult {
            success,
            candidates,
            embed_url,
            report,
        })
    }
}

fn transition(session: &mut ExtractionSession, next: SessionState) {
    let advanced = session.advance(next);
    debug_assert!(advanced.is_ok(), "{advanced:?}");
}

fn skipped(kind: StrategyKind, reason: &str) -> StrategyReport {
    StrategyReport {
        strategy: kind,
        outcome: StrategyOutcome::Skipped(reason.to_string()),
        elapsed_ms: 0,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Assembles a [`StreamExtractor`]
///
/// Live capture is only registered when a frame host is supplied.
#[derive(Default)]
pub struct StreamExtractorBuilder {
    config: ScoutConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
    frame_host: Option<Arc<dyn FrameHost>>,
    overrides: Vec<Arc<dyn Strategy>>,
}

impl StreamExtractorBuilder {
    pub fn config(mut self, config: ScoutConfig) -> Self {
        self.config = config;
        self
    }

    /// HTTP fetcher shared by the scanning strategies
    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Browser host for live capture
    pub fn frame_host(mut self, host: Arc<dyn FrameHost>) -> Self {
        self.frame_host = Some(host);
        self
    }

    /// Replaces the built-in strategy of the same kind
    pub fn strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.overrides.push(strategy);
        self
    }

    /// # Errors
    /// - `Config` if the configuration is invalid
    /// - `HttpError` if the default HTTP client cannot be built
    pub fn build(self) -> Result<StreamExtractor> {
        self.config.validate()?;

        let fetcher: Arc<dyn PageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(EmbedClient::with_config(self.config.client.clone())?),
        };
        let cascade = &self.config.cascade;

        let mut strategies: HashMap<StrategyKind, Arc<dyn Strategy>> = HashMap::new();
        if let Some(host) = self.frame_host {
            strategies.insert(
                StrategyKind::LiveCapture,
                Arc::new(LiveCapture::new(
                    host,
                    Arc::clone(&fetcher),
                    cascade.settle(),
                    cascade.poll_interval(),
                )),
            );
        }
        strategies.insert(
            StrategyKind::DirectTemplates,
            Arc::new(DirectTemplates::new(Arc::clone(&fetcher))),
        );
        strategies.insert(
            StrategyKind::RedirectChain,
            Arc::new(RedirectChain::new(Arc::clone(&fetcher), cascade.max_redirect_hops)),
        );
        strategies.insert(
            StrategyKind::RawEmbedScan,
            Arc::new(RawEmbedScan::new(fetcher)),
        );

        for strategy in self.overrides {
            strategies.insert(strategy.kind(), strategy);
        }

        Ok(StreamExtractor {
            config: self.config,
            strategies,
        })
    }
}
