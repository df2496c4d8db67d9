//! Core data model shared across the generation pipeline (§3).
//!
//! These are plain, `serde`-derived value types — no Bevy components, no
//! engine-owned state. Generalizes the enum-per-geometry-kind shape of
//! `eustress-geo::vector_import::LocalGeometry` to the tagged `Geometry`
//! output type and the input `FeatureGeometry`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Geographic bounding box in WGS84 degrees. `west < east`, `south < north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> crate::Result<Self> {
        if !(west < east) || !(south < north) {
            return Err(crate::Error::invalid_input(format!(
                "bbox must satisfy west<east and south<north, got west={west} south={south} east={east} north={north}"
            )));
        }
        Ok(BBox { west, south, east, north })
    }

    pub fn contains_xy_world(&self, x: f32, y: f32, width_m: f32, height_m: f32, eps: f32) -> bool {
        x >= -eps && y >= -eps && x <= width_m + eps && y <= height_m + eps
    }
}

/// An RGB color in `[0,1]` per channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Terrain generation settings (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSettings {
    pub enabled: bool,
    pub vertical_exaggeration: f32,
    pub base_height: f32,
    pub color: Option<Rgb>,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        TerrainSettings {
            enabled: true,
            vertical_exaggeration: 1.0,
            base_height: 5.0,
            color: None,
        }
    }
}

/// A MapLibre-style filter expression tree (§4.5, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterExpression {
    Eq(String, PropertyValue),
    Ne(String, PropertyValue),
    Lt(String, PropertyValue),
    Lte(String, PropertyValue),
    Gt(String, PropertyValue),
    Gte(String, PropertyValue),
    In(String, Vec<PropertyValue>),
    NotIn(String, Vec<PropertyValue>),
    Has(String),
    NotHas(String),
    All(Vec<FilterExpression>),
    Any(Vec<FilterExpression>),
    None(Vec<FilterExpression>),
}

/// A scalar property value, as found in a feature's `properties` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
}

/// Immutable per-layer configuration snapshot taken at generation start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub source_layer: String,
    pub label: String,
    pub enabled: bool,
    pub color: Rgb,
    pub filter: Option<FilterExpression>,
    pub buffer_size: f32,
    pub extrusion_depth: Option<f32>,
    pub min_extrusion_depth: Option<f32>,
    pub height_scale_factor: f32,
    pub use_adaptive_scale_factor: bool,
    pub z_offset: f32,
    pub align_vertices_to_terrain: bool,
    pub use_csg_clipping: bool,
    pub order: i32,
    pub geometry_debug_mode: bool,
}

impl LayerConfig {
    /// Effective extrusion height per §3: feature-carried `height`/
    /// `render_height` wins (scaled, floored by `minExtrusionDepth`),
    /// otherwise `extrusionDepth ?? bufferSize`. `vertical_exaggeration`
    /// is the terrain's own setting, divided into the scale factor when
    /// `useAdaptiveScaleFactor` is set so building heights look natural
    /// regardless of terrain exaggeration.
    pub fn effective_height_with_exaggeration(
        &self,
        feature_height: Option<f32>,
        vertical_exaggeration: f32,
    ) -> f32 {
        let scale = if self.use_adaptive_scale_factor {
            self.height_scale_factor / vertical_exaggeration.max(1e-6)
        } else {
            self.height_scale_factor
        };
        match feature_height {
            Some(h) => (h * scale).max(self.min_extrusion_depth.unwrap_or(0.0)),
            None => self.extrusion_depth.unwrap_or(self.buffer_size),
        }
    }

    /// `bottomZ = terrainBaseHeight + zOffset` per §3 / the pinned Open
    /// Question resolution in DESIGN.md.
    pub fn bottom_z(&self, terrain_base_height: f32) -> f32 {
        terrain_base_height + self.z_offset
    }
}

/// A regular W×H elevation grid, row 0 = north edge, column 0 = west edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrid {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<f32>,
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub original_min: f32,
    pub original_max: f32,
}

impl ElevationGrid {
    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.samples[row * self.width + col]
    }

    pub fn in_bounds(&self, col: usize, row: usize) -> bool {
        col < self.width && row < self.height
    }
}

/// Convert one feature property into a `serde_json::Value`, for
/// attaching `properties` as `userData` on emitted geometry (§4.8 step 6).
pub fn property_value_to_json(value: &PropertyValue) -> serde_json::Value {
    match value {
        PropertyValue::String(s) => serde_json::Value::String(s.clone()),
        PropertyValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
    }
}

/// Decoded vector-tile feature geometry, reprojected to world XY (meters
/// relative to the bbox SW corner).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FeatureGeometry {
    Point { coord: (f32, f32) },
    Line { points: Vec<(f32, f32)> },
    Polygon { outer: Vec<(f32, f32)>, holes: Vec<Vec<(f32, f32)>> },
    MultiPolygon { polygons: Vec<(Vec<(f32, f32)>, Vec<Vec<(f32, f32)>>)> },
}

/// A single decoded vector-tile feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: FeatureGeometry,
    pub properties: HashMap<String, PropertyValue>,
    pub source_layer: String,
}

impl Feature {
    /// Feature-carried `height`/`render_height`, per §3's effective-height
    /// rule; `height` takes precedence when both are present.
    pub fn height_property(&self) -> Option<f32> {
        self.numeric_property("height")
            .or_else(|| self.numeric_property("render_height"))
    }

    fn numeric_property(&self, key: &str) -> Option<f32> {
        match self.properties.get(key) {
            Some(PropertyValue::Number(n)) => Some(*n as f32),
            _ => None,
        }
    }
}

/// Output geometry tree (§9 redesign flag 3): a `Leaf` carries one mesh's
/// raw buffers, a `Container` groups many leaves (one layer's per-feature
/// output, or a single merged mesh wrapped for uniformity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Geometry {
    Leaf {
        positions: Vec<f32>,
        indices: Option<Vec<u32>>,
        normals: Option<Vec<f32>>,
        colors: Option<Vec<f32>>,
        user_data: HashMap<String, serde_json::Value>,
    },
    Container {
        children: Vec<Geometry>,
        user_data: HashMap<String, serde_json::Value>,
    },
}

impl Geometry {
    pub fn empty_container() -> Self {
        Geometry::Container { children: Vec::new(), user_data: HashMap::new() }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Leaf { positions, .. } => positions.len() / 3,
            Geometry::Container { children, .. } => children.iter().map(Geometry::vertex_count).sum(),
        }
    }
}

/// Stable fingerprints used for memoization (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigHashes {
    pub full_config_hash: u64,
    pub terrain_hash: u64,
    /// The single combined fingerprint of all enabled layers
    /// (`hash::hash_layers`'s XOR-folded result) — not a per-layer array,
    /// so this alone can't identify which individual layer changed.
    pub layers_hash: u64,
}

/// Opaque identifier namespacing all Context Pool resources of one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub String);

impl ProcessId {
    pub fn new() -> Self {
        ProcessId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_rejects_inverted_bounds() {
        assert!(BBox::new(10.0, 0.0, 5.0, 1.0).is_err());
        assert!(BBox::new(0.0, 10.0, 1.0, 5.0).is_err());
        assert!(BBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn effective_height_formula() {
        let layer = LayerConfig {
            source_layer: "building".into(),
            label: "buildings".into(),
            enabled: true,
            color: Rgb { r: 1.0, g: 1.0, b: 1.0 },
            filter: None,
            buffer_size: 0.0,
            extrusion_depth: None,
            min_extrusion_depth: Some(2.0),
            height_scale_factor: 1.0,
            use_adaptive_scale_factor: false,
            z_offset: 0.0,
            align_vertices_to_terrain: false,
            use_csg_clipping: false,
            order: 0,
            geometry_debug_mode: false,
        };
        assert_eq!(layer.effective_height_with_exaggeration(Some(30.0), 1.0), 30.0);
        assert_eq!(layer.effective_height_with_exaggeration(Some(1.0), 1.0), 2.0);
        assert_eq!(layer.bottom_z(5.0), 5.0);
    }

    #[test]
    fn geometry_vertex_count_recurses() {
        let leaf = Geometry::Leaf {
            positions: vec![0.0; 9],
            indices: None,
            normals: None,
            colors: None,
            user_data: HashMap::new(),
        };
        let container = Geometry::Container {
            children: vec![leaf.clone(), leaf],
            user_data: HashMap::new(),
        };
        assert_eq!(container.vertex_count(), 6);
    }
}
