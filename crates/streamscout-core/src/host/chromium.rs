//! Headless Chromium frame host
//!
//! Embed frames are inserted into a blank page of a headless Chromium
//! instance. Site isolation is disabled at launch so cross-origin frames
//! stay in the page's renderer and their network events show up on the
//! page's own CDP session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, ResourceType,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Result, ScoutError};
use crate::loader::{FrameHost, FrameId, FrameSpec};
use crate::sniffer::{dispatch, RequestHeaders, RequestPrimitive};
use crate::watcher::{EmbedDocument, FrameAccess};

/// Chromium launch options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumConfig {
    pub headless: bool,
    /// Browser binary; autodetected when unset
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            extra_args: Vec::new(),
        }
    }
}

/// Keeps cross-origin frames on the page's CDP session
const LAUNCH_ARGS: &[&str] = &[
    "--disable-features=IsolateOrigins,site-per-process",
    "--autoplay-policy=no-user-gesture-required",
    "--mute-audio",
];

type LoadState = Option<std::result::Result<(), String>>;

#[derive(Default)]
struct FrameTable {
    /// Frames whose document request has not been seen yet, by URL
    awaiting_request: HashMap<String, FrameId>,
    /// Document request ID -> frame
    requests: HashMap<String, FrameId>,
    loads: HashMap<FrameId, watch::Sender<LoadState>>,
}

impl FrameTable {
    fn settle(&mut self, request_id: &str, state: std::result::Result<(), String>) {
        if let Some(id) = self.requests.remove(request_id)
            && let Some(tx) = self.loads.get(&id)
        {
            tx.send_replace(Some(state));
        }
    }
}

struct Shared {
    page: Page,
    frames: Mutex<FrameTable>,
}

impl Shared {
    fn frames(&self) -> MutexGuard<'_, FrameTable> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frame host backed by a headless Chromium page
pub struct ChromiumHost {
    browser: tokio::sync::Mutex<Browser>,
    shared: Arc<Shared>,
    handler: JoinHandle<()>,
    events: JoinHandle<()>,
}

impl ChromiumHost {
    /// Launches Chromium and opens the blank host page
    ///
    /// # Errors
    /// Returns `Browser` if Chromium cannot be started.
    pub async fn launch(config: ChromiumConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .args(LAUNCH_ARGS.iter().copied().chain(config.extra_args.iter().map(String::as_str)));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let browser_config = builder.build().map_err(ScoutError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(browser_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(browser_error)?;
        let shared = Arc::new(Shared {
            page,
            frames: Mutex::new(FrameTable::default()),
        });
        let events = spawn_event_pump(Arc::clone(&shared)).await?;

        debug!("chromium frame host ready");
        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            shared,
            handler,
            events,
        })
    }

    /// Closes the browser
    pub async fn close(&self) {
        self.events.abort();
        if let Err(e) = self.browser.lock().await.close().await {
            warn!(error = %e, "chromium did not close cleanly");
        }
        self.handler.abort();
    }
}

impl Drop for ChromiumHost {
    fn drop(&mut self) {
        self.events.abort();
        self.handler.abort();
    }
}

fn browser_error(e: impl std::fmt::Display) -> ScoutError {
    ScoutError::Browser(e.to_string())
}

/// Forwards network events to the sniffer and the frame load table
async fn spawn_event_pump(shared: Arc<Shared>) -> Result<JoinHandle<()>> {
    let page = &shared.page;
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(browser_error)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(browser_error)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(browser_error)?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = requests.next() => {
                    let url = event.request.url.as_str();
                    if event.r#type == Some(ResourceType::Document) {
                        let mut frames = shared.frames();
                        if let Some(id) = frames.awaiting_request.remove(url) {
                            frames.requests.insert(event.request_id.inner().clone(), id);
                        }
                    }
                    let headers = headers_from_json(event.request.headers.inner());
                    dispatch(primitive_for(event.r#type.as_ref()), url, &headers);
                }
                Some(event) = finished.next() => {
                    shared.frames().settle(event.request_id.inner(), Ok(()));
                }
                Some(event) = failed.next() => {
                    trace!(error = %event.error_text, "request failed");
                    shared.frames().settle(event.request_id.inner(), Err(event.error_text.clone()));
                }
                else => break,
            }
        }
    }))
}

fn primitive_for(resource_type: Option<&ResourceType>) -> RequestPrimitive {
    match resource_type {
        Some(ResourceType::Xhr) => RequestPrimitive::Xhr,
        _ => RequestPrimitive::Fetch,
    }
}

fn headers_from_json(value: &serde_json::Value) -> RequestHeaders {
    value
        .as_object()
        .map(|object| {
            object
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn frame_lookup(id: FrameId) -> String {
    format!("document.getElementById({})", js_string(&id.element_id()))
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn access_script(id: FrameId) -> String {
    format!(
        "(() => {{ const f = {}; if (!f) return 'missing'; try {{ return f.contentDocument ? 'ok' : 'denied'; }} catch (e) {{ return 'denied'; }} }})()",
        frame_lookup(id)
    )
}

#[async_trait]
impl FrameHost for ChromiumHost {
    async fn insert(&self, spec: &FrameSpec) -> Result<()> {
        let (tx, _) = watch::channel(None);
        {
            let mut frames = self.shared.frames();
            frames.awaiting_request.insert(spec.embed_url.clone(), spec.id);
            frames.loads.insert(spec.id, tx);
        }

        let script = format!(
            "document.body.insertAdjacentHTML('beforeend', {})",
            js_string(&spec.to_html())
        );
        self.shared
            .page
            .evaluate(script)
            .await
            .map_err(|e| ScoutError::FrameLoad(e.to_string()))?;
        Ok(())
    }

    async fn wait_loaded(&self, id: FrameId) -> Result<()> {
        let mut rx = self
            .shared
            .frames()
            .loads
            .get(&id)
            .map(watch::Sender::subscribe)
            .ok_or_else(|| ScoutError::FrameLoad(format!("unknown frame {}", id.element_id())))?;

        let state = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ScoutError::FrameLoad("frame removed while loading".to_string()))?
            .clone();
        match state {
            Some(Err(e)) => Err(ScoutError::FrameLoad(e)),
            _ => Ok(()),
        }
    }

    async fn access(&self, id: FrameId) -> FrameAccess {
        let verdict = match self.shared.page.evaluate(access_script(id)).await {
            Ok(result) => result.into_value::<String>().unwrap_or_default(),
            Err(e) => return FrameAccess::Error(e.to_string()),
        };
        match verdict.as_str() {
            "ok" => FrameAccess::Ok(Box::new(ChromiumDocument {
                page: self.shared.page.clone(),
                id,
            })),
            "denied" => FrameAccess::AccessDenied,
            other => FrameAccess::Error(format!("frame lookup returned {other:?}")),
        }
    }

    fn remove(&self, id: FrameId) {
        {
            let mut frames = self.shared.frames();
            frames.loads.remove(&id);
            frames.awaiting_request.retain(|_, pending| *pending != id);
            frames.requests.retain(|_, pending| *pending != id);
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(frame = %id.element_id(), "no runtime, frame left in place");
            return;
        };
        let page = self.shared.page.clone();
        let script = format!("(() => {{ const f = {}; if (f) f.remove(); }})()", frame_lookup(id));
        runtime.spawn(async move {
            if let Err(e) = page.evaluate(script).await {
                trace!(error = %e, "frame removal failed");
            }
        });
    }
}

/// Same-origin embed document reached through its frame element
struct ChromiumDocument {
    page: Page,
    id: FrameId,
}

#[async_trait]
impl EmbedDocument for ChromiumDocument {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let wrapped = format!("{}.contentWindow.eval({})", frame_lookup(self.id), js_string(script));
        let result = self.page.evaluate(wrapped).await.map_err(browser_error)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_from_json_keeps_strings() {
        let headers = headers_from_json(&json!({
            "Referer": "https://player.example/e/abc",
            "User-Agent": "Mozilla/5.0",
            "X-Bogus": 1
        }));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Referer"], "https://player.example/e/abc");
        assert!(headers_from_json(&json!(null)).is_empty());
    }

    #[test]
    fn test_primitive_for_resource_type() {
        assert_eq!(primitive_for(Some(&ResourceType::Xhr)), RequestPrimitive::Xhr);
        assert_eq!(primitive_for(Some(&ResourceType::Fetch)), RequestPrimitive::Fetch);
        assert_eq!(primitive_for(Some(&ResourceType::Media)), RequestPrimitive::Fetch);
        assert_eq!(primitive_for(None), RequestPrimitive::Fetch);
    }

    #[test]
    fn test_scripts_quote_frame_id() {
        let spec = FrameSpec::new("https://a.example/");
        let script = access_script(spec.id);
        assert!(script.contains(&format!("document.getElementById(\"{}\")", spec.id.element_id())));
        assert_eq!(js_string("it's \"quoted\""), r#""it's \"quoted\"""#);
    }

    #[test]
    fn test_frame_table_settles_tracked_request() {
        let spec = FrameSpec::new("https://a.example/");
        let (tx, rx) = watch::channel(None);
        let mut table = FrameTable::default();
        table.loads.insert(spec.id, tx);
        table.requests.insert("42.1".to_string(), spec.id);

        table.settle("7.7", Ok(()));
        assert!(rx.borrow().is_none());

        table.settle("42.1", Err("net::ERR_ABORTED".to_string()));
        assert_eq!(*rx.borrow(), Some(Err("net::ERR_ABORTED".to_string())));
        assert!(table.requests.is_empty());
    }
}
