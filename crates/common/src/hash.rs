//! Stable, platform-independent config hashing (§4.11).
//!
//! FNV-1a via the `fnv` crate's `FnvHasher`; only equality matters, so the
//! exact algorithm is a non-issue as long as it's deterministic across runs
//! and platforms (unlike `std::collections::hash_map::DefaultHasher`, whose
//! seed is randomized per process).

use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

use crate::model::{BBox, LayerConfig, TerrainSettings};

fn hash_str(s: &str) -> u64 {
    let mut h = FnvHasher::default();
    s.hash(&mut h);
    h.finish()
}

/// `hashBbox`: round coords to 6 decimals, concatenate `west|south|east|north`.
pub fn hash_bbox(bbox: &BBox) -> u64 {
    let round = |v: f64| (v * 1_000_000.0).round() / 1_000_000.0;
    let s = format!(
        "{:.6}|{:.6}|{:.6}|{:.6}",
        round(bbox.west),
        round(bbox.south),
        round(bbox.east),
        round(bbox.north)
    );
    hash_str(&s)
}

/// `hashTerrain`: `enabled|exag|base|color`.
pub fn hash_terrain(terrain: &TerrainSettings) -> u64 {
    let color = match &terrain.color {
        Some(c) => format!("{:.4},{:.4},{:.4}", c.r, c.g, c.b),
        None => "none".to_string(),
    };
    let s = format!(
        "{}|{:.6}|{:.6}|{}",
        terrain.enabled, terrain.vertical_exaggeration, terrain.base_height, color
    );
    hash_str(&s)
}

/// `hashLayer`: canonicalized JSON of the `LayerConfig` excluding
/// transient/UI-only fields (`label` is excluded per §4.11; `geometry`
/// never lives on `LayerConfig` itself in this model, so there's nothing
/// further to strip).
pub fn hash_layer(layer: &LayerConfig) -> u64 {
    let mut canonical = layer.clone();
    canonical.label = String::new();
    let json = serde_json::to_string(&canonical).unwrap_or_default();
    hash_str(&json)
}

/// Combine all per-layer hashes (order-independent: disabled layers and
/// reordering of enabled layers should not spuriously invalidate the
/// cache when the *set* of contributing configs is identical) into one
/// fingerprint via XOR-fold, then mixed through FNV-1a once more.
pub fn hash_layers(layers: &[LayerConfig]) -> u64 {
    let folded = layers
        .iter()
        .filter(|l| l.enabled)
        .map(hash_layer)
        .fold(0u64, |acc, h| acc ^ h);
    hash_str(&folded.to_string())
}

/// `fullConfigHash`: all child hashes feed into one combined fingerprint.
pub fn full_config_hash(bbox_hash: u64, terrain_hash: u64, layers_hash: u64) -> u64 {
    hash_str(&format!("{bbox_hash}|{terrain_hash}|{layers_hash}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_hash_stable_to_six_decimals() {
        let a = BBox::new(10.1234561, 20.0, 11.0, 21.0).unwrap();
        let b = BBox::new(10.1234564, 20.0, 11.0, 21.0).unwrap();
        assert_eq!(hash_bbox(&a), hash_bbox(&b));

        let c = BBox::new(10.123460, 20.0, 11.0, 21.0).unwrap();
        assert_ne!(hash_bbox(&a), hash_bbox(&c));
    }

    #[test]
    fn layer_hash_ignores_label() {
        use crate::model::Rgb;
        let base = LayerConfig {
            source_layer: "building".into(),
            label: "a".into(),
            enabled: true,
            color: Rgb { r: 1.0, g: 1.0, b: 1.0 },
            filter: None,
            buffer_size: 0.0,
            extrusion_depth: None,
            min_extrusion_depth: None,
            height_scale_factor: 1.0,
            use_adaptive_scale_factor: false,
            z_offset: 0.0,
            align_vertices_to_terrain: false,
            use_csg_clipping: false,
            order: 0,
            geometry_debug_mode: false,
        };
        let mut renamed = base.clone();
        renamed.label = "b".into();
        assert_eq!(hash_layer(&base), hash_layer(&renamed));
    }
}
