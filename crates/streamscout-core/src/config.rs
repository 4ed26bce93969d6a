//! Pipeline configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! embed_base_url = "https://www.2embed.cc"
//! overall_timeout_ms = 25000
//!
//! [client]
//! timeout_secs = 15
//!
//! [cascade]
//! order = ["live_capture", "direct_templates", "redirect_chain", "raw_embed_scan"]
//! live_capture_ms = 12000
//! settle_ms = 6000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::client::ClientConfig;
use crate::error::{Result, ScoutError};
use crate::types::StrategyKind;
use crate::url::DEFAULT_EMBED_BASE;

/// Strategy ordering and time budgets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Strategies in the order they are tried
    pub order: Vec<StrategyKind>,
    pub live_capture_ms: u64,
    pub template_scan_ms: u64,
    pub redirect_ms: u64,
    pub raw_scan_ms: u64,
    /// Live capture window: frame load plus the wait for first media
    pub settle_ms: u64,
    /// A strategy is not started with less time than this left
    pub min_strategy_budget_ms: u64,
    pub max_scan_depth: usize,
    pub max_redirect_hops: usize,
    /// DOM watcher polling interval
    pub poll_interval_ms: u64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            order: StrategyKind::DEFAULT_ORDER.to_vec(),
            live_capture_ms: 12_000,
            template_scan_ms: 8_000,
            redirect_ms: 8_000,
            raw_scan_ms: 6_000,
            settle_ms: 6_000,
            min_strategy_budget_ms: 500,
            max_scan_depth: crate::scanner::DEFAULT_MAX_DEPTH,
            max_redirect_hops: crate::redirect::DEFAULT_MAX_HOPS,
            poll_interval_ms: 250,
        }
    }
}

impl CascadeConfig {
    /// Per-strategy time budget
    pub fn budget_for(&self, kind: StrategyKind) -> Duration {
        Duration::from_millis(match kind {
            StrategyKind::LiveCapture => self.live_capture_ms,
            StrategyKind::DirectTemplates => self.template_scan_ms,
            StrategyKind::RedirectChain => self.redirect_ms,
            StrategyKind::RawEmbedScan => self.raw_scan_ms,
        })
    }

    pub fn min_strategy_budget(&self) -> Duration {
        Duration::from_millis(self.min_strategy_budget_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// Host the canonical embed URL is built on
    pub embed_base_url: String,
    /// Default budget for a whole extraction
    pub overall_timeout_ms: u64,
    pub client: ClientConfig,
    pub cascade: CascadeConfig,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            embed_base_url: DEFAULT_EMBED_BASE.to_string(),
            overall_timeout_ms: 25_000,
            client: ClientConfig::default(),
            cascade: CascadeConfig::default(),
        }
    }
}

impl ScoutConfig {
    /// Parses and validates a TOML document
    ///
    /// # Errors
    /// Returns `Config` for malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScoutConfig =
            toml::from_str(text).map_err(|e| ScoutError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScoutError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }

    /// Checks values serde cannot
    pub fn validate(&self) -> Result<()> {
        match ::url::Url::parse(&self.embed_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            _ => {
                return Err(ScoutError::Config(format!(
                    "embed_base_url is not an http(s) URL: {}",
                    self.embed_base_url
                )));
            }
        }

        if self.overall_timeout_ms == 0 {
            return Err(ScoutError::Config(
                "overall_timeout_ms must be positive".to_string(),
            ));
        }

        let order = &self.cascade.order;
        if order.is_empty() {
            return Err(ScoutError::Config("cascade.order is empty".to_string()));
        }
        for (i, kind) in order.iter().enumerate() {
            if order[..i].contains(kind) {
                return Err(ScoutError::Config(format!(
                    "cascade.order lists {kind} twice"
                )));
            }
        }

        Ok(())
    }
}
