//! # tile3d-kernel — geometry kernel, terrain builder, layer processor
//!
//! The pure-compute core of the generation pipeline (§4.6–§4.8): no I/O,
//! no async, every function takes owned/borrowed data and returns a
//! result. Structured after `eustress-geo::vector_render`'s mesh-building
//! modules, generalized from render-time mesh construction to offline
//! buffer/extrude/drape/CSG geometry generation.
//!
//! ## Modules
//! - `buffer` — polygon/linestring buffering (§4.6)
//! - `triangulate` — polygon triangulation via `earcutr` (§4.6)
//! - `extrude` — flat-base extrusion between two Z planes (§4.6)
//! - `mesh` — intermediate mesh representation shared by every builder
//! - `drape` — terrain-following vertex offset (§4.6)
//! - `csg` — terrain-surface clamping and manifold checks (§4.6)
//! - `terrain` — Terrain Builder (§4.7)
//! - `layer_processor` — Layer Processor (§4.8)

pub mod buffer;
pub mod csg;
pub mod drape;
pub mod extrude;
pub mod layer_processor;
pub mod mesh;
pub mod terrain;
pub mod triangulate;

pub use buffer::{ensure_winding, linestring_buffer, polygon_buffer, EPSILON};
pub use csg::{mesh_is_manifold, subtract_terrain, CSG_EPSILON};
pub use drape::{drape_positions, sample_elevation};
pub use extrude::extrude;
pub use layer_processor::{process_layer, LayerResult, SkippedFeature};
pub use mesh::Mesh;
pub use terrain::build_terrain_mesh;
pub use triangulate::triangulate_polygon;
