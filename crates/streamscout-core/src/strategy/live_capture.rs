//! Live capture: play the embed in a sandboxed frame and watch what it
//! requests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::classify::classify;
use crate::client::PageFetcher;
use crate::error::Result;
use crate::loader::{FrameHost, SandboxedEmbedLoader};
use crate::scanner::PageScanner;
use crate::session::CandidateSink;
use crate::sniffer::NetworkSniffer;
use crate::strategy::{Strategy, StrategyContext};
use crate::types::{StrategyKind, StreamCandidate};
use crate::watcher::DomWatcher;

/// Nested frames scanned when nothing was captured live
const MAX_NESTED_SCANS: usize = 3;

/// One part in this many of the budget is kept for the nested-frame scan
const NESTED_SCAN_SHARE: u32 = 4;

pub struct LiveCapture {
    loader: SandboxedEmbedLoader,
    watcher: DomWatcher,
    scanner: PageScanner,
    settle: Duration,
}

impl LiveCapture {
    /// `settle` is the capture window: frame load plus the wait for first
    /// media, measured from insertion
    pub fn new(
        host: Arc<dyn FrameHost>,
        fetcher: Arc<dyn PageFetcher>,
        settle: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            loader: SandboxedEmbedLoader::new(host),
            watcher: DomWatcher::new(poll_interval),
            scanner: PageScanner::new(fetcher),
            settle,
        }
    }

    /// Capture window that still leaves room for the nested-frame scan
    fn capture_window(&self, budget: Duration) -> Duration {
        self.settle.min(budget.saturating_sub(budget / NESTED_SCAN_SHARE))
    }
}

#[async_trait]
impl Strategy for LiveCapture {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LiveCapture
    }

    async fn run(&self, ctx: &StrategyContext, sink: &CandidateSink) -> Result<()> {
        let network_sink = sink.clone();
        let network_origin = ctx.embed_url.clone();
        let mut sniffer = NetworkSniffer::install(move |url, verdict, headers| {
            let Some(mut candidate) = StreamCandidate::new(
                url,
                verdict.container_type,
                Some(&verdict.quality_label),
                "live_capture:network",
                &network_origin,
            ) else {
                return;
            };
            // The Referer the player actually sent beats the embed page
            if let Some(referer) = headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("referer"))
                .map(|(_, value)| value.clone())
            {
                candidate.headers.insert("Referer".to_string(), referer);
            }
            network_sink.push(candidate);
        })?;

        let window = self.capture_window(ctx.budget);
        let capture_deadline = Instant::now() + window;
        let frame = self.loader.load(&ctx.embed_url, window).await?;

        let nested = Arc::new(Mutex::new(Vec::new()));
        let media_sink = sink.clone();
        let media_origin = ctx.embed_url.clone();
        let frames_seen = Arc::clone(&nested);
        let mut watch = self.watcher.watch(
            frame.access().await,
            move |url, via| {
                let verdict = classify(url);
                if !verdict.is_stream {
                    return;
                }
                if let Some(candidate) = StreamCandidate::new(
                    url,
                    verdict.container_type,
                    Some(&verdict.quality_label),
                    &format!("live_capture:{via}"),
                    &media_origin,
                ) {
                    media_sink.push(candidate);
                }
            },
            move |url| {
                if let Ok(mut frames) = frames_seen.lock() {
                    frames.push(url.to_string());
                }
            },
            ctx.cancel.child_token(),
        );

        tokio::select! {
            _ = sink.wait_non_empty() => {}
            _ = tokio::time::sleep_until(capture_deadline) => debug!("live capture settled without media"),
            _ = ctx.cancel.cancelled() => {}
        }

        watch.stop();
        frame.teardown();
        sniffer.uninstall();

        if !sink.is_empty() {
            info!(candidates = sink.len(), "live capture found media");
            return Ok(());
        }
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }

        let frames: Vec<String> = nested
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default();
        for url in frames.iter().take(MAX_NESTED_SCANS) {
            debug!(url = %url, "scanning nested frame");
            self.scanner
                .scan_into(
                    url,
                    Some(&ctx.embed_url),
                    ctx.max_scan_depth.saturating_sub(1),
                    "live_capture:nested_frame",
                    sink,
                )
                .await;
            if !sink.is_empty() {
                break;
            }
        }

        Ok(())
    }
}
