//! Player-library capability adapters
//!
//! Each adapter knows how to detect one player library inside the embed
//! document and how to read the sources it was configured with. Supporting
//! a new library means adding a row to [`ADAPTERS`].

use serde::Serialize;
use tracing::trace;

use super::EmbedDocument;

/// What an adapter managed to do in a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// The library's global is present
    pub detected: bool,
    /// The source reader ran successfully
    pub hook_installed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerAdapter {
    pub name: &'static str,
    /// Expression evaluating to a boolean
    pub probe_script: &'static str,
    /// Expression evaluating to an array of source URL strings
    pub sources_script: &'static str,
}

/// Known player libraries
pub const ADAPTERS: &[PlayerAdapter] = &[
    PlayerAdapter {
        name: "jwplayer",
        probe_script: "typeof window.jwplayer === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                const player = window.jwplayer();
                const item = player && player.getPlaylistItem && player.getPlaylistItem();
                if (item && item.file) out.push(item.file);
                ((item && item.sources) || []).forEach((s) => { if (s.file) out.push(s.file); });
            } catch (e) {}
            return out;
        })()"#,
    },
    PlayerAdapter {
        name: "videojs",
        probe_script: "typeof window.videojs === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                Object.values(window.videojs.getPlayers ? window.videojs.getPlayers() : {}).forEach((p) => {
                    if (p && p.currentSrc && p.currentSrc()) out.push(p.currentSrc());
                });
            } catch (e) {}
            return out;
        })()"#,
    },
    PlayerAdapter {
        name: "hlsjs",
        probe_script: "typeof window.Hls === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                [window.hls, window.player && window.player.hls].forEach((h) => {
                    if (h && h.url) out.push(h.url);
                });
            } catch (e) {}
            return out;
        })()"#,
    },
    PlayerAdapter {
        name: "plyr",
        probe_script: "typeof window.Plyr === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                [window.player, window.plyr].forEach((p) => {
                    if (p && p.source && typeof p.source === 'string') out.push(p.source);
                    if (p && p.media && p.media.currentSrc) out.push(p.media.currentSrc);
                });
            } catch (e) {}
            return out;
        })()"#,
    },
    PlayerAdapter {
        name: "clappr",
        probe_script: "typeof window.Clappr === 'object' || typeof window.Clappr === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                const p = window.player;
                if (p && p.options && p.options.source) out.push(p.options.source);
                ((p && p.options && p.options.sources) || []).forEach((s) => { if (typeof s === 'string') out.push(s); });
            } catch (e) {}
            return out;
        })()"#,
    },
    PlayerAdapter {
        name: "playerjs",
        probe_script: "typeof window.Playerjs === 'function'",
        sources_script: r#"(() => {
            const out = [];
            try {
                const p = window.player || window.pljs;
                const file = p && p.api && p.api('playlist_file');
                if (typeof file === 'string') out.push(file);
            } catch (e) {}
            return out;
        })()"#,
    },
];

/// One adapter's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    pub adapter: &'static str,
    pub capability: Capability,
    pub sources: Vec<String>,
}

impl PlayerAdapter {
    /// Probes for the library and, if present, reads its sources
    pub async fn run(&self, document: &dyn EmbedDocument) -> AdapterReport {
        let detected = document
            .evaluate(self.probe_script)
            .await
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if !detected {
            return AdapterReport {
                adapter: self.name,
                capability: Capability::default(),
                sources: Vec::new(),
            };
        }

        let (hook_installed, sources) = match document.evaluate(self.sources_script).await {
            Ok(value) => (
                true,
                serde_json::from_value::<Vec<String>>(value)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Err(e) => {
                trace!(player = self.name, error = %e, "source reader failed");
                (false, Vec::new())
            }
        };

        AdapterReport {
            adapter: self.name,
            capability: Capability {
                detected,
                hook_installed,
            },
            sources,
        }
    }
}

/// Runs every adapter against the document
pub async fn probe_all(document: &dyn EmbedDocument) -> Vec<AdapterReport> {
    let mut reports = Vec::with_capacity(ADAPTERS.len());
    for adapter in ADAPTERS {
        reports.push(adapter.run(document).await);
    }
    reports
}
