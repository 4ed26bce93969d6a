//! Tauri commands for the streamscout pipeline
//!
//! This module contains all Tauri command implementations.

use serde::Serialize;
use streamscout_core::{CatalogDetails, EmbedTarget, ExtractionResult, StrategyReport, StreamCandidate};
use tauri::State;

use crate::ExtractorState;

/// How the UI should play the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Play `candidate` in the native video element
    Native,
    /// Show `embed_url` in an iframe
    Iframe,
}

/// Playback decision handed to the frontend
///
/// `embed_url` is always present so the UI can offer "use iframe instead"
/// even when a native stream was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPlan {
    pub mode: PlaybackMode,
    pub candidate: Option<StreamCandidate>,
    pub candidates: Vec<StreamCandidate>,
    pub embed_url: String,
    pub report: Vec<StrategyReport>,
}

impl From<ExtractionResult> for PlaybackPlan {
    fn from(result: ExtractionResult) -> Self {
        let candidate = result.best().cloned();
        let mode = if result.success && candidate.is_some() {
            PlaybackMode::Native
        } else {
            PlaybackMode::Iframe
        };
        Self {
            mode,
            candidate,
            candidates: result.candidates,
            embed_url: result.embed_url,
            report: result.report,
        }
    }
}

/// Find a directly playable stream for a target
///
/// # Arguments
/// * `state` - Managed ExtractorState from Tauri
/// * `target` - What to play
/// * `timeout_ms` - Overall budget; the configured default when omitted
///
/// # Errors
/// Returns error message as String if the target is invalid
#[tauri::command]
pub async fn extract_stream(
    state: State<'_, ExtractorState>,
    target: EmbedTarget,
    timeout_ms: Option<u64>,
) -> Result<PlaybackPlan, String> {
    state.plan(&target, timeout_ms).await
}

/// Canonical embed URL for a target
#[tauri::command]
pub async fn build_embed_url(
    state: State<'_, ExtractorState>,
    target: EmbedTarget,
) -> Result<String, String> {
    state.embed_url(&target)
}

/// Catalog metadata for labelling playback, or null
#[tauri::command]
pub async fn get_details(
    state: State<'_, ExtractorState>,
    target: EmbedTarget,
) -> Result<Option<CatalogDetails>, String> {
    state.details(&target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamscout_core::ContainerType;

    fn result(urls: &[&str]) -> ExtractionResult {
        let candidates: Vec<StreamCandidate> = urls
            .iter()
            .filter_map(|url| {
                StreamCandidate::new(
                    url,
                    ContainerType::Hls,
                    None,
                    "raw_embed_scan",
                    "https://www.2embed.cc/embed/1",
                )
            })
            .collect();
        ExtractionResult {
            success: !candidates.is_empty(),
            candidates,
            embed_url: "https://www.2embed.cc/embed/1".to_string(),
            report: Vec::new(),
        }
    }

    #[test]
    fn test_plan_native_when_found() {
        let plan = PlaybackPlan::from(result(&[
            "https://cdn.example/a/master.m3u8",
            "https://cdn.example/b/master.m3u8",
        ]));
        assert_eq!(plan.mode, PlaybackMode::Native);
        assert_eq!(
            plan.candidate.as_ref().map(|c| c.url.as_str()),
            Some("https://cdn.example/a/master.m3u8")
        );
        assert_eq!(plan.candidates.len(), 2);
        assert_eq!(plan.embed_url, "https://www.2embed.cc/embed/1");
    }

    #[test]
    fn test_plan_iframe_fallback_keeps_embed_url() {
        let plan = PlaybackPlan::from(result(&[]));
        assert_eq!(plan.mode, PlaybackMode::Iframe);
        assert!(plan.candidate.is_none());
        assert_eq!(plan.embed_url, "https://www.2embed.cc/embed/1");
    }

    #[test]
    fn test_plan_serializes_for_frontend() {
        let json = serde_json::to_value(PlaybackPlan::from(result(&[
            "https://cdn.example/a/master.m3u8",
        ])))
        .unwrap();
        assert_eq!(json["mode"], "native");
        assert_eq!(json["embedUrl"], "https://www.2embed.cc/embed/1");
        assert_eq!(json["candidate"]["containerType"], "hls");
    }
}
