//! Error types for the stream discovery pipeline
//!
//! Provides a comprehensive error enum with human-readable messages
//! and Tauri-compatible serialization.
//!
//! Most failures inside the cascade are *not* errors: an empty page, a
//! cross-origin frame or a timed-out strategy only shows up in the
//! extraction report. `ScoutError` is reserved for things a caller can act on.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for all streamscout operations
///
/// Implements Display for human-readable messages and Serialize
/// for Tauri command compatibility.
#[derive(Error, Debug)]
pub enum ScoutError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Redirect chain longer than the configured limit
    #[error("Too many redirects from {0}")]
    TooManyRedirects(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Embed target failed validation
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The sandboxed frame could not be loaded at all
    #[error("Frame failed to load: {0}")]
    FrameLoad(String),

    /// Another session already owns the request tap
    #[error("Network sniffer already installed")]
    SnifferBusy,

    /// Operation did not finish before its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Headless browser host failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Serialize for ScoutError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for streamscout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_http_status() {
        let error = ScoutError::HttpStatus {
            status: 404,
            url: "https://example.com/embed/1".to_string(),
        };
        assert_eq!(error.to_string(), "HTTP 404 for https://example.com/embed/1");
    }

    #[test]
    fn test_error_display_invalid_target() {
        let error = ScoutError::InvalidTarget("episode without season".to_string());
        assert_eq!(error.to_string(), "Invalid target: episode without season");
    }

    #[test]
    fn test_error_display_frame_load() {
        let error = ScoutError::FrameLoad("connection refused".to_string());
        assert_eq!(error.to_string(), "Frame failed to load: connection refused");
    }

    #[test]
    fn test_error_display_sniffer_busy() {
        assert_eq!(
            ScoutError::SnifferBusy.to_string(),
            "Network sniffer already installed"
        );
    }

    #[test]
    fn test_error_serialize() {
        let error = ScoutError::SnifferBusy;
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Network sniffer already installed\"");
    }

    #[test]
    fn test_error_serialize_with_message() {
        let error = ScoutError::InvalidUrl("not-a-url".to_string());
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Invalid URL: not-a-url\"");
    }
}
