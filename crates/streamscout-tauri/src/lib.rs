//! Streamscout Tauri Integration
//!
//! Provides a Tauri plugin that lets the frontend ask for a playable stream
//! before falling back to the plain embed iframe.
//!
//! # Usage
//!
//! Register the plugin in your Tauri application:
//!
//! ```ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(streamscout_tauri::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! Then invoke commands from the frontend:
//!
//! ```javascript
//! import { invoke } from '@tauri-apps/api/core';
//!
//! const plan = await invoke('plugin:streamscout|extract_stream', {
//!   target: { catalogId: 1399, contentType: 'series', season: 1, episode: 2 },
//!   timeoutMs: 20000
//! });
//!
//! if (plan.mode === 'native') {
//!   player.src = plan.candidate.url;
//! } else {
//!   iframe.src = plan.embedUrl;
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use streamscout_core::{
    CatalogDetails, CatalogService, EmbedTarget, ScoutConfig, StreamExtractor,
    StreamExtractorBuilder,
};
use tauri::{
    Manager, Runtime,
    plugin::{Builder, TauriPlugin},
};

mod commands;

pub use commands::{PlaybackMode, PlaybackPlan};

/// Shared extractor plus the optional catalog service
///
/// `StreamExtractor` serializes extractions internally, so commands share
/// it through a plain `Arc`.
pub struct ExtractorState {
    pub(crate) extractor: Arc<StreamExtractor>,
    pub(crate) catalog: Option<Arc<dyn CatalogService>>,
}

impl ExtractorState {
    /// Create a new ExtractorState with default configuration
    ///
    /// # Errors
    /// Returns error string if extractor initialization fails
    pub fn new() -> Result<Self, String> {
        Self::with_config(ScoutConfig::default())
    }

    pub fn with_config(config: ScoutConfig) -> Result<Self, String> {
        Self::from_builder(StreamExtractor::builder().config(config))
    }

    /// Builds from a prepared extractor builder (custom fetcher, frame host, ...)
    pub fn from_builder(builder: StreamExtractorBuilder) -> Result<Self, String> {
        let extractor = builder.build().map_err(|e| e.to_string())?;
        Ok(Self {
            extractor: Arc::new(extractor),
            catalog: None,
        })
    }

    /// Registers the metadata service used by `get_details`
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogService>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Runs an extraction and turns it into a playback decision
    ///
    /// `timeout_ms` falls back to the configured overall timeout.
    pub async fn plan(
        &self,
        target: &EmbedTarget,
        timeout_ms: Option<u64>,
    ) -> Result<PlaybackPlan, String> {
        let timeout = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.extractor.config().overall_timeout());
        let result = self
            .extractor
            .extract(target, timeout)
            .await
            .map_err(|e| e.to_string())?;
        Ok(PlaybackPlan::from(result))
    }

    pub fn embed_url(&self, target: &EmbedTarget) -> Result<String, String> {
        target.validate().map_err(|e| e.to_string())?;
        Ok(self.extractor.embed_url(target))
    }

    /// `None` when no catalog service is registered or the ID is unknown
    pub async fn details(&self, target: &EmbedTarget) -> Result<Option<CatalogDetails>, String> {
        let Some(catalog) = &self.catalog else {
            return Ok(None);
        };
        catalog
            .get_details(&target.catalog_id, target.content_type)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Initialize the streamscout plugin with default configuration
///
/// # Example
/// ```ignore
/// tauri::Builder::default()
///     .plugin(streamscout_tauri::init())
///     .run(tauri::generate_context!())
///     .expect("error while running tauri application");
/// ```
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    init_with_config(ScoutConfig::default())
}

/// Initialize the streamscout plugin
///
/// With the `chromium` feature a headless browser is launched during setup
/// to enable live capture; if that fails the plugin runs without it.
pub fn init_with_config<R: Runtime>(config: ScoutConfig) -> TauriPlugin<R> {
    Builder::new("streamscout")
        .invoke_handler(tauri::generate_handler![
            commands::extract_stream,
            commands::build_embed_url,
            commands::get_details
        ])
        .setup(move |app, _api| {
            let builder = StreamExtractor::builder().config(config.clone());
            #[cfg(feature = "chromium")]
            let builder = with_chromium(builder);
            let state = ExtractorState::from_builder(builder)
                .map_err(Box::<dyn std::error::Error>::from)?;
            app.manage(state);
            Ok(())
        })
        .build()
}

#[cfg(feature = "chromium")]
fn with_chromium(builder: StreamExtractorBuilder) -> StreamExtractorBuilder {
    use streamscout_core::host::{ChromiumConfig, ChromiumHost};

    match tauri::async_runtime::block_on(ChromiumHost::launch(ChromiumConfig::default())) {
        Ok(host) => builder.frame_host(Arc::new(host)),
        Err(e) => {
            tracing::warn!(error = %e, "live capture disabled");
            builder
        }
    }
}

// Re-export types for convenience
pub use streamscout_core::{ExtractionResult, StreamCandidate as Stream};
