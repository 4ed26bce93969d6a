//! Network sniffer
//!
//! A browser host reports every request its embed document makes through
//! [`dispatch`], tagged with the primitive that issued it (fetch or XHR).
//! Those two primitives are process-wide slots, each holding the observer
//! currently wired to it. [`NetworkSniffer::install`] swaps in observers
//! that chain to the previous ones and forward stream URLs to a callback;
//! the returned [`SnifferGuard`] puts the originals back on every exit path.
//!
//! Only one sniffer may be installed at a time. Extraction sessions hold
//! [`session_lock`] while a sniffer is installed so they never overlap.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::classify::{classify, Classification};
use crate::error::{Result, ScoutError};

/// Request headers as reported by the host
pub type RequestHeaders = BTreeMap<String, String>;

/// Outgoing-request primitive a URL was observed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestPrimitive {
    Fetch,
    Xhr,
}

/// Receives every request issued through one primitive
pub trait RequestObserver: Send + Sync {
    fn on_request(&self, url: &str, headers: &RequestHeaders);
}

/// Default observer: the request goes out untouched
struct Passthrough;

impl RequestObserver for Passthrough {
    fn on_request(&self, _url: &str, _headers: &RequestHeaders) {}
}

struct RequestTap {
    fetch: Arc<dyn RequestObserver>,
    xhr: Arc<dyn RequestObserver>,
    installed: bool,
}

impl RequestTap {
    fn slot(&self, primitive: RequestPrimitive) -> &Arc<dyn RequestObserver> {
        match primitive {
            RequestPrimitive::Fetch => &self.fetch,
            RequestPrimitive::Xhr => &self.xhr,
        }
    }
}

fn tap() -> MutexGuard<'static, RequestTap> {
    static TAP: OnceLock<Mutex<RequestTap>> = OnceLock::new();
    TAP.get_or_init(|| {
        Mutex::new(RequestTap {
            fetch: Arc::new(Passthrough),
            xhr: Arc::new(Passthrough),
            installed: false,
        })
    })
    .lock()
    .unwrap_or_else(PoisonError::into_inner)
}

/// Lock serializing extraction sessions around the request tap
pub fn session_lock() -> &'static tokio::sync::Mutex<()> {
    static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| tokio::sync::Mutex::new(()))
}

/// Returns the observer currently wired to `primitive`
pub fn current(primitive: RequestPrimitive) -> Arc<dyn RequestObserver> {
    Arc::clone(tap().slot(primitive))
}

/// Reports one outgoing request from the embed document
///
/// Called by browser hosts for every request they see, including
/// requests issued after redirects.
pub fn dispatch(primitive: RequestPrimitive, url: &str, headers: &RequestHeaders) {
    // Clone out of the lock so observers can take their time
    let observer = current(primitive);
    observer.on_request(url, headers);
}

/// Callback receiving URLs that classified as streams
pub type OnUrlSeen = Arc<dyn Fn(&str, &Classification, &RequestHeaders) + Send + Sync>;

struct SniffingObserver {
    inner: Arc<dyn RequestObserver>,
    on_url_seen: OnUrlSeen,
}

impl RequestObserver for SniffingObserver {
    fn on_request(&self, url: &str, headers: &RequestHeaders) {
        self.inner.on_request(url, headers);

        let verdict = classify(url);
        if verdict.is_stream {
            debug!(url, container = %verdict.container_type, "sniffed stream request");
            (self.on_url_seen)(url, &verdict, headers);
        } else {
            trace!(url, "ignored request");
        }
    }
}

/// Installs sniffing observers on the process-wide request primitives
pub struct NetworkSniffer;

impl NetworkSniffer {
    /// Wraps both primitives so stream URLs reach `on_url_seen`
    ///
    /// Non-stream URLs are discarded without being stored.
    ///
    /// # Errors
    /// Returns `SnifferBusy` if another sniffer is still installed.
    pub fn install<F>(on_url_seen: F) -> Result<SnifferGuard>
    where
        F: Fn(&str, &Classification, &RequestHeaders) + Send + Sync + 'static,
    {
        let on_url_seen: OnUrlSeen = Arc::new(on_url_seen);
        let mut tap = tap();
        if tap.installed {
            return Err(ScoutError::SnifferBusy);
        }

        let original_fetch = Arc::clone(&tap.fetch);
        let original_xhr = Arc::clone(&tap.xhr);

        tap.fetch = Arc::new(SniffingObserver {
            inner: Arc::clone(&original_fetch),
            on_url_seen: Arc::clone(&on_url_seen),
        });
        tap.xhr = Arc::new(SniffingObserver {
            inner: Arc::clone(&original_xhr),
            on_url_seen,
        });
        tap.installed = true;

        debug!("network sniffer installed");
        Ok(SnifferGuard {
            originals: Some((original_fetch, original_xhr)),
        })
    }
}

/// Restores the original request primitives when dropped
#[must_use = "dropping the guard uninstalls the sniffer immediately"]
pub struct SnifferGuard {
    originals: Option<(Arc<dyn RequestObserver>, Arc<dyn RequestObserver>)>,
}

impl SnifferGuard {
    /// Puts the original observers back
    ///
    /// Idempotent: only the first call touches the tap, so a second
    /// call can never clobber a sniffer installed by a later session.
    pub fn uninstall(&mut self) {
        let Some((fetch, xhr)) = self.originals.take() else {
            return;
        };

        let mut tap = tap();
        tap.fetch = fetch;
        tap.xhr = xhr;
        tap.installed = false;
        debug!("network sniffer uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.originals.is_some()
    }
}

impl Drop for SnifferGuard {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collect() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str, &Classification, &RequestHeaders)) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |url: &str, _: &Classification, _: &RequestHeaders| {
            sink.lock().unwrap().push(url.to_string());
        };
        (seen, callback)
    }

    #[test]
    fn test_sniffer_forwards_only_streams() {
        let _session = session_lock().blocking_lock();
        let (seen, callback) = collect();
        let guard = NetworkSniffer::install(callback).unwrap();

        let headers = RequestHeaders::new();
        dispatch(RequestPrimitive::Fetch, "https://x.example/app.js", &headers);
        dispatch(
            RequestPrimitive::Xhr,
            "https://cdn.example/video/abc123.m3u8?q=720p",
            &headers,
        );
        dispatch(RequestPrimitive::Fetch, "https://ads.example.com/tracker.m3u8", &headers);
        drop(guard);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["https://cdn.example/video/abc123.m3u8?q=720p".to_string()]
        );
    }

    #[test]
    fn test_uninstall_restores_original_references() {
        let _session = session_lock().blocking_lock();
        let fetch_before = current(RequestPrimitive::Fetch);
        let xhr_before = current(RequestPrimitive::Xhr);

        let (_, callback) = collect();
        let mut guard = NetworkSniffer::install(callback).unwrap();
        assert!(!Arc::ptr_eq(&current(RequestPrimitive::Fetch), &fetch_before));
        assert!(!Arc::ptr_eq(&current(RequestPrimitive::Xhr), &xhr_before));

        guard.uninstall();
        assert!(Arc::ptr_eq(&current(RequestPrimitive::Fetch), &fetch_before));
        assert!(Arc::ptr_eq(&current(RequestPrimitive::Xhr), &xhr_before));
    }

    #[test]
    fn test_drop_restores_original_references() {
        let _session = session_lock().blocking_lock();
        let fetch_before = current(RequestPrimitive::Fetch);
        {
            let (_, callback) = collect();
            let _guard = NetworkSniffer::install(callback).unwrap();
        }
        assert!(Arc::ptr_eq(&current(RequestPrimitive::Fetch), &fetch_before));
    }

    #[test]
    fn test_second_install_is_busy() {
        let _session = session_lock().blocking_lock();
        let (_, first) = collect();
        let _guard = NetworkSniffer::install(first).unwrap();

        let (_, second) = collect();
        assert!(matches!(
            NetworkSniffer::install(second),
            Err(ScoutError::SnifferBusy)
        ));
    }

    #[test]
    fn test_double_uninstall_does_not_clobber_next_session() {
        let _session = session_lock().blocking_lock();
        let fetch_before = current(RequestPrimitive::Fetch);

        let (_, first) = collect();
        let mut stale = NetworkSniffer::install(first).unwrap();
        stale.uninstall();
        assert!(!stale.is_installed());

        let (_, second) = collect();
        let active = NetworkSniffer::install(second).unwrap();
        let active_fetch = current(RequestPrimitive::Fetch);

        // A late second uninstall of the stale guard must be a no-op
        stale.uninstall();
        drop(stale);
        assert!(Arc::ptr_eq(&current(RequestPrimitive::Fetch), &active_fetch));

        drop(active);
        assert!(Arc::ptr_eq(&current(RequestPrimitive::Fetch), &fetch_before));
    }

    #[test]
    fn test_sniffer_chains_to_original_observer() {
        struct Counting(AtomicUsize);
        impl RequestObserver for Counting {
            fn on_request(&self, _url: &str, _headers: &RequestHeaders) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let _session = session_lock().blocking_lock();
        let counter = Arc::new(Counting(AtomicUsize::new(0)));

        // Stand in a counting observer as the "original" primitive
        let previous = {
            let mut tap = tap();
            std::mem::replace(&mut tap.fetch, counter.clone() as Arc<dyn RequestObserver>)
        };

        let (_, callback) = collect();
        let guard = NetworkSniffer::install(callback).unwrap();
        dispatch(RequestPrimitive::Fetch, "https://x.example/a.css", &RequestHeaders::new());
        drop(guard);

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        tap().fetch = previous;
    }
}
