//! Streamscout Core Library
//!
//! Finds directly playable stream URLs (HLS, MP4, ...) behind third-party
//! video embeds, so a player can show a native video instead of an
//! ad-laden iframe.
//!
//! # Overview
//!
//! Given an [`EmbedTarget`] (a catalog ID plus optional season/episode) the
//! crate builds the canonical embed URL and runs a cascade of strategies
//! against it:
//! - **Live capture**: load the embed in a sandboxed off-screen frame and
//!   record the media requests it makes (needs a [`FrameHost`], e.g.
//!   `host::ChromiumHost` with the `chromium` feature)
//! - **Direct templates**: scan backends addressable straight from the ID
//! - **Redirect chain**: follow the embed to its backend and scan where it lands
//! - **Raw embed scan**: pattern-scan the embed page and its nested frames
//!
//! The first strategy that finds anything wins; its candidates are
//! deduplicated and ranked (HLS first, then higher quality).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use streamscout_core::{EmbedTarget, Result, StreamExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let extractor = StreamExtractor::new()?;
//!
//!     let target = EmbedTarget::episode(1399, 1, 2);
//!     let result = extractor.extract(&target, Duration::from_secs(25)).await?;
//!
//!     match result.best() {
//!         Some(stream) => println!("{} ({})", stream.url, stream.quality_label),
//!         None => println!("no stream found, fall back to {}", result.embed_url),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Candidate lifetime
//!
//! **Important:** most stream URLs carry signed, expiring tokens and many
//! backends check the `Referer` header. Play them promptly, send the
//! headers stored on the candidate, and do not cache them.

pub mod cascade;
pub mod catalog;
pub mod classify;
mod client;
pub mod config;
mod error;
#[cfg(feature = "chromium")]
pub mod host;
pub mod loader;
pub mod rank;
pub mod redirect;
pub mod scanner;
pub mod session;
pub mod sniffer;
pub mod strategy;
mod types;
pub mod url;
pub mod watcher;

// Re-export the main extraction API
pub use cascade::{StreamExtractor, StreamExtractorBuilder};

// Re-export client types
pub use client::{ClientConfig, EmbedClient, FetchStep, Page, PageFetcher};

// Re-export configuration
pub use config::{CascadeConfig, ScoutConfig};

// Re-export error types
pub use error::{Result, ScoutError};

// Re-export catalog boundary
pub use catalog::{CatalogDetails, CatalogService, StaticCatalog};

// Re-export host integration points
pub use loader::FrameHost;
pub use watcher::{EmbedDocument, FrameAccess};

// Re-export data types
pub use types::{
    CatalogId, ContainerType, ContentType, EmbedTarget, ExtractionResult, StrategyKind,
    StrategyOutcome, StrategyReport, StreamCandidate,
};

// Re-export URL helper functions for convenience
pub use classify::{classify, is_stream_url};
pub use url::build_embed_url;
