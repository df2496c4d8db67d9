//! Error taxonomy for the tile3d generation engine.
//!
//! One sum type for the whole pipeline, matching the taxonomy fixed by the
//! spec: `InvalidInput`, `NetworkTimeout`, `TerrainProcessingFailed`,
//! `LayerProcessingFailed`, `Cancelled`, `InternalError`. Shaped after
//! `eustress-forge::error::ForgeError` — tuple/struct variants per case,
//! `#[from]` reserved for true library/I-O boundaries.

use std::collections::HashMap;
use std::fmt;

/// Which stage of a run an error occurred in, for `NetworkTimeout` tagging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Terrain,
    Layer(String),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Terrain => write!(f, "terrain"),
            Stage::Layer(label) => write!(f, "layer:{label}"),
        }
    }
}

/// The engine's single error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("network timeout during {stage}: {reason}")]
    NetworkTimeout { stage: Stage, reason: String },

    #[error("terrain processing failed: {reason}")]
    TerrainProcessingFailed { reason: String },

    #[error("layer '{label}' processing failed: {reason}")]
    LayerProcessingFailed { label: String, reason: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("internal error: {reason}")]
    InternalError { reason: String },
}

impl Error {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput { reason: reason.into() }
    }

    pub fn network_timeout(stage: Stage, reason: impl Into<String>) -> Self {
        Error::NetworkTimeout { stage, reason: reason.into() }
    }

    pub fn terrain_processing_failed(reason: impl Into<String>) -> Self {
        Error::TerrainProcessingFailed { reason: reason.into() }
    }

    pub fn layer_processing_failed(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::LayerProcessingFailed { label: label.into(), reason: reason.into() }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Error::InternalError { reason: reason.into() }
    }

    /// A free-form context map for debug-mode display, per §7's "technical
    /// detail block when debug mode is enabled."
    pub fn context(&self) -> HashMap<String, String> {
        let mut ctx = HashMap::new();
        match self {
            Error::NetworkTimeout { stage, .. } => {
                ctx.insert("stage".to_string(), stage.to_string());
            }
            Error::LayerProcessingFailed { label, .. } => {
                ctx.insert("label".to_string(), label.clone());
            }
            _ => {}
        }
        ctx
    }

    /// Exit code per the core spec's §6 "Exit behavior" table.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidInput { .. } => 2,
            Error::NetworkTimeout { .. } => 3,
            Error::TerrainProcessingFailed { .. } => 4,
            Error::Cancelled => 5,
            Error::LayerProcessingFailed { .. } | Error::InternalError { .. } => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(Error::invalid_input("bad bbox").exit_code(), 2);
        assert_eq!(
            Error::network_timeout(Stage::Terrain, "timed out").exit_code(),
            3
        );
        assert_eq!(Error::terrain_processing_failed("hole").exit_code(), 4);
        assert_eq!(Error::Cancelled.exit_code(), 5);
        assert_eq!(Error::internal("oops").exit_code(), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Terrain.to_string(), "terrain");
        assert_eq!(Stage::Layer("roads".into()).to_string(), "layer:roads");
    }
}
