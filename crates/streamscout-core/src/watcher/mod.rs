//! DOM mutation watcher
//!
//! Once the embed frame's document is reachable, the watcher polls it for
//! media element sources and nested frames, nudges the player into starting
//! with a one-shot synthetic interaction, and asks the player-library
//! [`adapters`] for any sources they know about.
//!
//! Reaching into the frame is expected to fail for most cross-origin
//! embeds; [`FrameAccess::AccessDenied`] simply turns the watcher into a
//! no-op.

pub mod adapters;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Result;

/// Default interval between document snapshots
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Collects media element sources (`src` and `currentSrc`) and nested frame URLs
pub const SNAPSHOT_SCRIPT: &str = r#"(() => {
    const media = [];
    document.querySelectorAll('video, audio, video source, audio source').forEach((el) => {
        if (el.currentSrc) media.push(el.currentSrc);
        if (el.src) media.push(el.src);
    });
    const frames = Array.from(document.querySelectorAll('iframe'))
        .map((f) => f.src || f.getAttribute('data-src') || f.getAttribute('data-lazy-src') || '')
        .filter((s) => s.length > 0);
    return { media, frames };
})()"#;

/// Starts playback: `play()` on every media element, then one play-button click
pub const INTERACT_SCRIPT: &str = r#"(() => {
    document.querySelectorAll('video, audio').forEach((m) => {
        try { m.muted = true; const p = m.play(); if (p && p.catch) p.catch(() => {}); } catch (e) {}
    });
    const selectors = [
        '.jw-icon-display', '.vjs-big-play-button', '.plyr__control--overlaid',
        '.play-button', '.btn-play', '#play', '[class*="play"]', 'video'
    ];
    for (const selector of selectors) {
        const el = document.querySelector(selector);
        if (el) { try { el.click(); } catch (e) {} break; }
    }
    return true;
})()"#;

/// A frame document scripts can be evaluated in
#[async_trait]
pub trait EmbedDocument: Send + Sync {
    /// Evaluates `script` in the document and returns its JSON result
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
}

/// Outcome of reaching into an embed frame's document
pub enum FrameAccess {
    Ok(Box<dyn EmbedDocument>),
    /// Cross-origin; the common case
    AccessDenied,
    Error(String),
}

impl std::fmt::Debug for FrameAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameAccess::Ok(_) => f.write_str("FrameAccess::Ok(..)"),
            FrameAccess::AccessDenied => f.write_str("FrameAccess::AccessDenied"),
            FrameAccess::Error(e) => write!(f, "FrameAccess::Error({e})"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DomSnapshot {
    #[serde(default)]
    media: Vec<String>,
    #[serde(default)]
    frames: Vec<String>,
}

/// Reports a media URL and what revealed it (`media_element` or an adapter name)
pub type OnMedia = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// Reports a nested frame URL
pub type OnFrame = Arc<dyn Fn(&str) + Send + Sync>;

/// Polls an embed document for media sources and nested frames
#[derive(Debug, Clone)]
pub struct DomWatcher {
    poll_interval: Duration,
}

impl Default for DomWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl DomWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Starts watching; every distinct value is reported once
    ///
    /// Must be called from within a tokio runtime. `cancel` stops the
    /// watcher as well as the returned handle does.
    pub fn watch<M, F>(
        &self,
        access: FrameAccess,
        on_media: M,
        on_frame: F,
        cancel: CancellationToken,
    ) -> WatchHandle
    where
        M: Fn(&str, &str) + Send + Sync + 'static,
        F: Fn(&str) + Send + Sync + 'static,
    {
        let document: Arc<dyn EmbedDocument> = match access {
            FrameAccess::Ok(document) => Arc::from(document),
            FrameAccess::AccessDenied => {
                debug!("embed document is cross-origin, DOM watcher inactive");
                return WatchHandle::inactive(cancel);
            }
            FrameAccess::Error(e) => {
                debug!(error = %e, "embed document unreachable, DOM watcher inactive");
                return WatchHandle::inactive(cancel);
            }
        };

        let on_media: OnMedia = Arc::new(on_media);
        let on_frame: OnFrame = Arc::new(on_frame);
        let task = tokio::spawn(poll_document(
            document,
            on_media,
            on_frame,
            self.poll_interval,
            cancel.clone(),
        ));

        WatchHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn poll_document(
    document: Arc<dyn EmbedDocument>,
    on_media: OnMedia,
    on_frame: OnFrame,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut seen_media = HashSet::new();
    let mut seen_frames = HashSet::new();
    let mut interacted = false;
    let mut logged_capabilities = false;
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let snapshot = match document.evaluate(SNAPSHOT_SCRIPT).await {
            Ok(value) => serde_json::from_value::<DomSnapshot>(value).unwrap_or_default(),
            Err(e) => {
                trace!(error = %e, "DOM snapshot failed");
                continue;
            }
        };

        for url in snapshot.media {
            if !url.is_empty() && seen_media.insert(url.clone()) {
                on_media(&url, "media_element");
            }
        }
        for url in snapshot.frames {
            if seen_frames.insert(url.clone()) {
                on_frame(&url);
            }
        }

        if !interacted {
            interacted = true;
            if let Err(e) = document.evaluate(INTERACT_SCRIPT).await {
                trace!(error = %e, "synthetic play interaction failed");
            }
        }

        for report in adapters::probe_all(document.as_ref()).await {
            if !logged_capabilities && report.capability.detected {
                debug!(
                    player = report.adapter,
                    hook_installed = report.capability.hook_installed,
                    "player library detected"
                );
            }
            for url in report.sources {
                if seen_media.insert(url.clone()) {
                    on_media(&url, report.adapter);
                }
            }
        }
        logged_capabilities = true;
    }
}

/// Stops the watcher when dropped
#[must_use = "dropping the handle stops the watcher immediately"]
pub struct WatchHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    fn inactive(cancel: CancellationToken) -> Self {
        Self { cancel, task: None }
    }

    /// False when the document was unreachable
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops polling; later calls do nothing
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.cancel.cancel();
            task.abort();
            trace!("DOM watcher stopped");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted document: snapshot results are served in order, the last one repeating
    #[derive(Default)]
    pub struct FakeDocument {
        pub snapshots: Mutex<Vec<serde_json::Value>>,
        pub interactions: AtomicUsize,
        pub evaluations: AtomicUsize,
        /// Responses for adapter scripts, matched by substring
        pub scripted: Vec<(&'static str, serde_json::Value)>,
    }

    impl FakeDocument {
        pub fn with_snapshots(snapshots: Vec<serde_json::Value>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl EmbedDocument for Arc<FakeDocument> {
        async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
            (**self).evaluate(script).await
        }
    }

    #[async_trait]
    impl EmbedDocument for FakeDocument {
        async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            if script == SNAPSHOT_SCRIPT {
                let mut snapshots = self.snapshots.lock().unwrap();
                let value = if snapshots.len() > 1 {
                    snapshots.remove(0)
                } else {
                    snapshots.first().cloned().unwrap_or(serde_json::Value::Null)
                };
                return Ok(value);
            }
            if script == INTERACT_SCRIPT {
                self.interactions.fetch_add(1, Ordering::SeqCst);
                return Ok(serde_json::Value::Bool(true));
            }
            for (needle, value) in &self.scripted {
                if script.contains(needle) {
                    return Ok(value.clone());
                }
            }
            Ok(serde_json::Value::Bool(false))
        }
    }
}
