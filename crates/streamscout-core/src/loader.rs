//! Sandboxed embed loader
//!
//! Inserts the embed URL into an off-screen, sandboxed iframe hosted by a
//! [`FrameHost`] (a headless browser page in production, a mock in tests)
//! and hands back a [`LoadedFrame`] guard that removes it again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, ScoutError};
use crate::types::is_valid_candidate_url;
use crate::watcher::FrameAccess;

/// Sandbox tokens granted to the embed frame
///
/// Popups, top-level navigation, modals and downloads are withheld: they
/// are how ad networks hijack the host page.
pub const SANDBOX_ALLOWED: &[&str] = &[
    "allow-scripts",
    "allow-same-origin",
    "allow-forms",
    "allow-orientation-lock",
    "allow-pointer-lock",
];

/// Feature policy (`allow` attribute) granted to the embed frame
pub const FEATURE_POLICY: &str = "autoplay; fullscreen; encrypted-media; picture-in-picture";

/// Off-screen frame geometry; players refuse to start in zero-size frames
pub const FRAME_WIDTH: u32 = 1280;
pub const FRAME_HEIGHT: u32 = 720;

/// Explicit sandbox allow-list for the embed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    tokens: Vec<&'static str>,
    features: &'static str,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            tokens: SANDBOX_ALLOWED.to_vec(),
            features: FEATURE_POLICY,
        }
    }
}

impl SandboxPolicy {
    /// Value of the `sandbox` attribute
    pub fn sandbox_attribute(&self) -> String {
        self.tokens.join(" ")
    }

    /// Value of the `allow` attribute
    pub fn allow_attribute(&self) -> &'static str {
        self.features
    }

    pub fn grants(&self, token: &str) -> bool {
        self.tokens.contains(&token)
    }
}

/// Host-unique frame identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

impl FrameId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FrameId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// DOM id of the iframe element
    pub fn element_id(&self) -> String {
        format!("streamscout-frame-{}", self.0)
    }
}

/// Everything a host needs to insert one embed frame
#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub id: FrameId,
    pub embed_url: String,
    pub policy: SandboxPolicy,
}

impl FrameSpec {
    pub fn new(embed_url: &str) -> Self {
        Self {
            id: FrameId::next(),
            embed_url: embed_url.to_string(),
            policy: SandboxPolicy::default(),
        }
    }

    /// Renders the iframe element
    ///
    /// The frame is positioned far off-screen rather than hidden with
    /// `display:none`, which stops most players from initializing.
    pub fn to_html(&self) -> String {
        format!(
            r#"<iframe id="{id}" src="{src}" sandbox="{sandbox}" allow="{allow}" width="{w}" height="{h}" referrerpolicy="origin" style="position:absolute;left:-10000px;top:-10000px;width:{w}px;height:{h}px;border:0;"></iframe>"#,
            id = self.id.element_id(),
            src = escape_attribute(&self.embed_url),
            sandbox = self.policy.sandbox_attribute(),
            allow = self.policy.allow_attribute(),
            w = FRAME_WIDTH,
            h = FRAME_HEIGHT,
        )
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The document embed frames are inserted into
#[async_trait]
pub trait FrameHost: Send + Sync {
    /// Inserts the frame and starts loading it
    async fn insert(&self, spec: &FrameSpec) -> Result<()>;

    /// Resolves once the frame document has loaded
    ///
    /// # Errors
    /// `FrameLoad` when the frame's own network load failed outright.
    async fn wait_loaded(&self, id: FrameId) -> Result<()>;

    /// Attempts to reach into the frame's document
    async fn access(&self, id: FrameId) -> FrameAccess;

    /// Removes the frame; must not fail if it is already gone
    fn remove(&self, id: FrameId);
}

/// Loads embed URLs into sandboxed off-screen frames
pub struct SandboxedEmbedLoader {
    host: Arc<dyn FrameHost>,
}

impl SandboxedEmbedLoader {
    pub fn new(host: Arc<dyn FrameHost>) -> Self {
        Self { host }
    }

    /// Inserts `embed_url` and waits up to `timeout` for it to load
    ///
    /// A frame that is still loading when `timeout` runs out is returned
    /// anyway: slow players often start fetching media before the load
    /// event fires.
    ///
    /// # Errors
    /// - `InvalidUrl` if `embed_url` is not absolute http(s)
    /// - `FrameLoad` if the frame's network load failed (the frame is
    ///   already torn down when this is returned)
    pub async fn load(&self, embed_url: &str, timeout: Duration) -> Result<LoadedFrame> {
        if !is_valid_candidate_url(embed_url) || embed_url.starts_with("blob:") {
            return Err(ScoutError::InvalidUrl(embed_url.to_string()));
        }

        let spec = FrameSpec::new(embed_url);
        self.host.insert(&spec).await?;

        let frame = LoadedFrame {
            id: spec.id,
            embed_url: spec.embed_url,
            host: Arc::clone(&self.host),
            torn_down: AtomicBool::new(false),
        };

        match tokio::time::timeout(timeout, self.host.wait_loaded(frame.id)).await {
            Ok(Ok(())) => debug!(url = %frame.embed_url, "embed frame loaded"),
            Ok(Err(e)) => {
                warn!(url = %frame.embed_url, error = %e, "embed frame failed to load");
                frame.teardown();
                return Err(e);
            }
            Err(_) => debug!(url = %frame.embed_url, "embed frame still loading, continuing"),
        }

        Ok(frame)
    }
}

/// An inserted embed frame; removed on [`teardown`](Self::teardown) or drop
pub struct LoadedFrame {
    id: FrameId,
    embed_url: String,
    host: Arc<dyn FrameHost>,
    torn_down: AtomicBool,
}

impl LoadedFrame {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn embed_url(&self) -> &str {
        &self.embed_url
    }

    pub async fn access(&self) -> FrameAccess {
        if self.is_torn_down() {
            return FrameAccess::Error("frame already removed".to_string());
        }
        self.host.access(self.id).await
    }

    /// Removes the frame from its host; later calls do nothing
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.host.remove(self.id);
        debug!(url = %self.embed_url, "embed frame removed");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Drop for LoadedFrame {
    fn drop(&mut self) {
        self.teardown();
    }
}
