//! # tile3d-common — shared data model, error taxonomy, config hashing
//!
//! Every other crate in the workspace depends on this one for the types
//! that cross component boundaries: `BBox`, `TerrainSettings`,
//! `LayerConfig`, `ElevationGrid`, `Feature`, `Geometry`, `ConfigHashes`,
//! `ProcessId`, and the single `Error` sum type.
//!
//! ## Modules
//! - `model` — core data types (§3)
//! - `error` — error taxonomy (§7)
//! - `hash` — stable config hashing (§4.11)
//! - `config` — `EngineConfig`, loaded from TOML
//! - `logging` — `tracing_subscriber` init helper
//! - `progress` — progress callback contract (§6)

pub mod config;
pub mod error;
pub mod hash;
pub mod logging;
pub mod model;
pub mod progress;

pub use config::EngineConfig;
pub use error::{Error, Result, Stage};
pub use model::{
    property_value_to_json, BBox, ConfigHashes, ElevationGrid, Feature, FeatureGeometry,
    FilterExpression, Geometry, LayerConfig, ProcessId, PropertyValue, Rgb, TerrainSettings,
};
pub use progress::{Progress, ProgressCallback, ProgressStage};
