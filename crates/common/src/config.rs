//! `EngineConfig` — ambient runtime tunables, loaded from TOML.
//!
//! Grounded on `eustress-geo::config::GeoConfig::load`: `toml::from_str`
//! over a `Default`-backed struct, with the manual `Display`/`Error` impl
//! there replaced by `thiserror` (see `crate::error`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Runtime tunables for one [`crate::model::ProcessId`]-scoped `Engine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `None` means `min(hardwareConcurrency, 8)`, resolved at pool
    /// construction time since `EngineConfig` has no access to the host's
    /// core count.
    pub context_pool_size: Option<usize>,
    pub grid_resolution: u32,
    pub http_timeout_ms: u64,
    pub http_max_retries: u32,
    pub http_backoff_ms: u64,
    pub debounce_ms: u64,
    pub debounce_fast_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            context_pool_size: None,
            grid_resolution: 256,
            http_timeout_ms: 10_000,
            http_max_retries: 3,
            http_backoff_ms: 250,
            debounce_ms: 1_000,
            debounce_fast_ms: 200,
        }
    }
}

impl EngineConfig {
    /// Resolved context pool size: `min(hardwareConcurrency, 8)` unless
    /// explicitly overridden.
    pub fn resolved_pool_size(&self) -> usize {
        self.context_pool_size
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::invalid_input(format!("reading config {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| Error::invalid_input(format!("parsing config {}: {e}", path.display())))
    }
}
