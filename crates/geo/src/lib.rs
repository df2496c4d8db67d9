//! # tile3d-geo — tile coordinate math, tile clients, elevation grid, filter
//!
//! Everything needed to turn a bbox into raw ingredients for the
//! generation pipeline: which tiles cover it, how to fetch and decode
//! them, how to assemble an elevation grid, and how to select features by
//! a MapLibre-style filter.
//!
//! ## Modules
//! - `tilemath` — Tile Coord Math (§4.1)
//! - `raster` — Raster Tile Client (§4.2)
//! - `vector` — Vector Tile Client (§4.3)
//! - `elevation_grid` — Elevation Grid Builder (§4.4)
//! - `filter` — Feature Filter (§4.5)

pub mod elevation_grid;
pub mod filter;
pub mod raster;
pub mod tilemath;
pub mod vector;

pub use elevation_grid::build_elevation_grid;
pub use filter::{evaluate, filter_features};
pub use raster::{fetch_raster_tile, FetchConfig, RasterTile};
pub use tilemath::{bbox_size_meters, choose_zoom, lnglat_to_world, pixel_to_world, tiles_covering, TileCoord};
pub use vector::{decode_layer_features, fetch_vector_tile, MvtLayer, MvtTile};
