// =============================================================================
// Tile3D Backend - Configuration
// =============================================================================

use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:7100")
    pub bind_address: String,

    /// Raster (elevation) tile URL template, e.g. `https://.../terrain/{z}/{x}/{y}.png`
    pub raster_url_template: String,

    /// Vector tile URL template, e.g. `https://.../tiles/{z}/{x}/{y}.mvt`
    pub vector_url_template: String,

    /// Path to an `EngineConfig` TOML file, if overriding the built-in defaults.
    pub engine_config_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:7100".into()),
            raster_url_template: env::var("RASTER_URL_TEMPLATE")
                .map_err(|_| ConfigError::Missing("RASTER_URL_TEMPLATE"))?,
            vector_url_template: env::var("VECTOR_URL_TEMPLATE")
                .map_err(|_| ConfigError::Missing("VECTOR_URL_TEMPLATE"))?,
            engine_config_path: env::var("ENGINE_CONFIG_PATH").ok(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
