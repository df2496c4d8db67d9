//! # Vector Tile Client (§4.3)
//!
//! Fetches MVT tiles (same retry/backoff/validate policy as the raster
//! client) and decodes the Mapbox Vector Tile protobuf payload into
//! [`tile3d_common::Feature`]s reprojected to bbox-local world XY.
//!
//! Decoding uses `prost` over the schema compiled at build time by
//! `prost-build`, the same `prost::Message`-based idiom confirmed in
//! `catacombing-charon::tiles::vector::protobuf` (its test module imports
//! `prost::Message` directly).

use std::collections::HashMap;

use prost::Message;
use tile3d_common::{BBox, Feature, FeatureGeometry, PropertyValue};

use crate::tilemath::{pixel_to_world, TileCoord};

#[allow(clippy::all)]
mod pb {
    include!(concat!(env!("OUT_DIR"), "/vector_tile.rs"));
}

/// Decoded MVT tile (re-exported so callers never need to name the
/// generated `pb` module directly).
pub type MvtTile = pb::Tile;
/// One source-layer inside a decoded MVT tile.
pub type MvtLayer = pb::tile::Layer;

pub use crate::raster::FetchConfig;
use tile3d_common::{Error, Stage};

/// `fetchVectorTile(url, cfg) -> parsed MVT`. Same retry/backoff/validate
/// policy as [`crate::raster::fetch_raster_tile`].
pub async fn fetch_vector_tile(
    client: &reqwest::Client,
    url: &str,
    cfg: FetchConfig,
    stage: Stage,
) -> Result<pb::Tile, Error> {
    let mut last_err = String::new();

    for attempt in 0..=cfg.max_retries {
        if attempt > 0 {
            let delay_ms = cfg.backoff_ms * 2u64.pow(attempt - 1);
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
        }

        let attempt_result = tokio::time::timeout(
            std::time::Duration::from_millis(cfg.timeout_ms),
            client.get(url).send(),
        )
        .await;

        let response = match attempt_result {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                last_err = e.to_string();
                continue;
            }
            Err(_) => {
                last_err = "request timed out".to_string();
                continue;
            }
        };

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                last_err = e.to_string();
                continue;
            }
        };

        if cfg.validate_content && bytes.is_empty() {
            last_err = "empty response body".to_string();
            continue;
        }

        return pb::Tile::decode(bytes.as_ref())
            .map_err(|e| Error::internal(format!("decoding MVT tile {url}: {e}")));
    }

    Err(Error::network_timeout(
        stage,
        format!("fetching {url} after {} retries: {last_err}", cfg.max_retries),
    ))
}

/// MVT geometry command IDs (zigzag-delta-encoded parameter stream).
const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

fn zigzag_decode(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

/// Decode an MVT geometry command stream into tile-local pixel-space
/// rings/lines, per the MVT spec's command encoding.
fn decode_commands(geometry: &[u32]) -> Vec<Vec<(i32, i32)>> {
    let mut paths = Vec::new();
    let mut current: Vec<(i32, i32)> = Vec::new();
    let mut cursor_x = 0i32;
    let mut cursor_y = 0i32;

    let mut i = 0;
    while i < geometry.len() {
        let cmd_int = geometry[i];
        i += 1;
        let cmd = cmd_int & 0x7;
        let count = cmd_int >> 3;

        match cmd {
            c if c == CMD_MOVE_TO => {
                if !current.is_empty() {
                    paths.push(std::mem::take(&mut current));
                }
                for _ in 0..count {
                    if i + 1 >= geometry.len() {
                        break;
                    }
                    cursor_x += zigzag_decode(geometry[i]);
                    cursor_y += zigzag_decode(geometry[i + 1]);
                    i += 2;
                    current.push((cursor_x, cursor_y));
                }
            }
            c if c == CMD_LINE_TO => {
                for _ in 0..count {
                    if i + 1 >= geometry.len() {
                        break;
                    }
                    cursor_x += zigzag_decode(geometry[i]);
                    cursor_y += zigzag_decode(geometry[i + 1]);
                    i += 2;
                    current.push((cursor_x, cursor_y));
                }
            }
            c if c == CMD_CLOSE_PATH => {
                if let Some(&first) = current.first() {
                    current.push(first);
                }
            }
            _ => break,
        }
    }

    if !current.is_empty() {
        paths.push(current);
    }

    paths
}

/// Ring signed area (shoelace, tile-local pixel space); positive = CCW.
fn ring_signed_area(ring: &[(i32, i32)]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % ring.len()];
        area += (x0 as f64) * (y1 as f64) - (x1 as f64) * (y0 as f64);
    }
    area / 2.0
}

fn value_to_property(v: &pb::tile::Value) -> PropertyValue {
    if let Some(s) = &v.string_value {
        return PropertyValue::String(s.clone());
    }
    if let Some(b) = v.bool_value {
        return PropertyValue::Bool(b);
    }
    if let Some(f) = v.double_value {
        return PropertyValue::Number(f);
    }
    if let Some(f) = v.float_value {
        return PropertyValue::Number(f as f64);
    }
    if let Some(n) = v.int_value {
        return PropertyValue::Number(n as f64);
    }
    if let Some(n) = v.uint_value {
        return PropertyValue::Number(n as f64);
    }
    if let Some(n) = v.sint_value {
        return PropertyValue::Number(n as f64);
    }
    PropertyValue::Bool(false)
}

fn decode_properties(
    feature: &pb::tile::Feature,
    keys: &[String],
    values: &[pb::tile::Value],
) -> HashMap<String, PropertyValue> {
    let mut properties = HashMap::new();
    for pair in feature.tags.chunks_exact(2) {
        let (key_idx, val_idx) = (pair[0] as usize, pair[1] as usize);
        if let (Some(key), Some(value)) = (keys.get(key_idx), values.get(val_idx)) {
            properties.insert(key.clone(), value_to_property(value));
        }
    }
    properties
}

/// Decode all features of one MVT `Layer`, reprojecting tile-local
/// coordinates to bbox-local world XY via [`pixel_to_world`].
pub fn decode_layer_features(
    layer: &pb::tile::Layer,
    tile: TileCoord,
    bbox: &BBox,
) -> Vec<Feature> {
    let extent = layer.extent.unwrap_or(4096);
    let mut out = Vec::new();

    for feature in &layer.features {
        let properties = decode_properties(feature, &layer.keys, &layer.values);
        let paths = decode_commands(&feature.geometry);
        if paths.is_empty() {
            continue;
        }

        let to_world = |ring: &[(i32, i32)]| -> Vec<(f32, f32)> {
            ring.iter()
                .map(|&(px, py)| pixel_to_world(tile, px as f64, py as f64, extent, bbox))
                .collect()
        };

        let geom_type = pb::tile::GeomType::try_from(feature.r#type.unwrap_or(0)).unwrap_or(pb::tile::GeomType::Unknown);

        let geometry = match geom_type {
            pb::tile::GeomType::Point => {
                let (x, y) = to_world(&paths[0])[0];
                FeatureGeometry::Point { coord: (x, y) }
            }
            pb::tile::GeomType::Linestring => {
                if paths.len() == 1 {
                    FeatureGeometry::Line { points: to_world(&paths[0]) }
                } else {
                    // Multiple linestrings collapse to the first; MVT
                    // multi-linestrings are rare for the layer kinds this
                    // spec targets (roads) and §3's `Feature` model has no
                    // MultiLine variant.
                    FeatureGeometry::Line { points: to_world(&paths[0]) }
                }
            }
            pb::tile::GeomType::Polygon => {
                // Group rings into polygons: each CCW ring starts a new
                // polygon, subsequent CW rings are its holes (MVT spec
                // §4.3.3's "multi-polygon" encoding).
                let mut polygons: Vec<(Vec<(f32, f32)>, Vec<Vec<(f32, f32)>>)> = Vec::new();
                for ring in &paths {
                    if ring.len() < 3 {
                        continue;
                    }
                    let world_ring = to_world(ring);
                    if ring_signed_area(ring) > 0.0 {
                        polygons.push((world_ring, Vec::new()));
                    } else if let Some((_, holes)) = polygons.last_mut() {
                        holes.push(world_ring);
                    }
                }
                match polygons.len() {
                    0 => continue,
                    1 => {
                        let (outer, holes) = polygons.into_iter().next().unwrap();
                        FeatureGeometry::Polygon { outer, holes }
                    }
                    _ => FeatureGeometry::MultiPolygon { polygons },
                }
            }
            pb::tile::GeomType::Unknown => continue,
        };

        out.push(Feature { geometry, properties, source_layer: layer.name.clone() });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_decode_matches_mvt_spec_examples() {
        assert_eq!(zigzag_decode(0), 0);
        assert_eq!(zigzag_decode(1), -1);
        assert_eq!(zigzag_decode(2), 1);
        assert_eq!(zigzag_decode(3), -2);
    }

    #[test]
    fn decode_commands_single_moveto_point() {
        // MoveTo(1) then delta (5,5): cmd_int = (1<<3)|1 = 9
        let geometry = vec![9, zigzag_encode(5), zigzag_encode(5)];
        let paths = decode_commands(&geometry);
        assert_eq!(paths, vec![vec![(5, 5)]]);
    }

    fn zigzag_encode(v: i32) -> u32 {
        ((v << 1) ^ (v >> 31)) as u32
    }

    #[test]
    fn ring_signed_area_sign_matches_winding() {
        let ccw = [(0, 0), (10, 0), (10, 10), (0, 10)];
        let cw = [(0, 0), (0, 10), (10, 10), (10, 0)];
        assert!(ring_signed_area(&ccw) > 0.0);
        assert!(ring_signed_area(&cw) < 0.0);
    }
}
