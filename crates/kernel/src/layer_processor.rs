//! # Layer Processor (§4.8)
//!
//! Turns one [`LayerConfig`] plus its already-filtered feature set into a
//! container [`Geometry`]: filter → buffer → triangulate/extrude/drape →
//! optional CSG subtract → container geometry, generalized from
//! `eustress-geo::vector_render`'s per-feature mesh-building loop. Each
//! feature's failure is recorded and skipped rather than failing the
//! whole layer, the same per-job "record and skip" policy
//! `eustress-forge::jobs`'s builders use at the job level.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use serde_json::Value;

use tile3d_common::{Error, Feature, FeatureGeometry, Geometry, LayerConfig, TerrainSettings};

use crate::buffer::{linestring_buffer, polygon_buffer};
use crate::csg::subtract_terrain;
use crate::drape::sample_elevation;
use crate::extrude::extrude;
use crate::mesh::Mesh;
use crate::triangulate::triangulate_polygon;
use tile3d_geo::filter::filter_features;
use tile3d_common::ElevationGrid;

/// A feature that produced no geometry (filter miss, degenerate ring, or
/// an extrusion/triangulation failure), recorded rather than propagated
/// (§4.8's "Filtered → ... → Emitted or Skipped" state machine).
#[derive(Debug, Clone)]
pub struct SkippedFeature {
    pub feature_index: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct LayerResult {
    pub geometry: Geometry,
    pub skipped: Vec<SkippedFeature>,
}

/// Source layers whose features stay individually addressable in the
/// output (§4.8 step 7: "buildings stay individual, linear/area layers
/// are merged").
fn keeps_features_individual(source_layer: &str) -> bool {
    source_layer.eq_ignore_ascii_case("building")
}

/// Process every feature of one layer against the shared `grid` and
/// return the merged (or per-feature) container geometry.
pub fn process_layer(
    layer: &LayerConfig,
    features: &[Feature],
    terrain: &TerrainSettings,
    grid: &ElevationGrid,
    width_m: f32,
    height_m: f32,
) -> LayerResult {
    let filtered = filter_features(features, layer.filter.as_ref());
    let individual = keeps_features_individual(&layer.source_layer);

    let mut skipped = Vec::new();
    let mut emitted: Vec<(&Feature, Mesh)> = Vec::new();

    for (index, feature) in filtered.iter().enumerate() {
        match process_feature(layer, feature, terrain, grid, width_m, height_m) {
            Ok(Some(mesh)) => emitted.push((feature, mesh)),
            Ok(None) => skipped.push(SkippedFeature { feature_index: index, reason: "empty or degenerate geometry".into() }),
            Err(e) => skipped.push(SkippedFeature { feature_index: index, reason: e.to_string() }),
        }
    }

    let geometry = if individual {
        let children = emitted
            .into_iter()
            .map(|(feature, mesh)| mesh.into_geometry(properties_to_user_data(feature)))
            .collect();
        Geometry::Container { children, user_data: HashMap::new() }
    } else {
        let mut merged = Mesh::default();
        for (_, mesh) in &emitted {
            merged.append(mesh);
        }
        let mut user_data = HashMap::new();
        user_data.insert("sourceLayer".to_string(), Value::String(layer.source_layer.clone()));
        Geometry::Container { children: vec![merged.into_geometry(HashMap::new())], user_data }
    };

    LayerResult { geometry, skipped }
}

fn properties_to_user_data(feature: &Feature) -> HashMap<String, Value> {
    feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), tile3d_common::property_value_to_json(v)))
        .collect()
}

/// Run one feature through buffer → triangulate/extrude/drape → optional
/// CSG subtract. `Ok(None)` means the feature produced no geometry
/// (empty ring, point geometry); `Err` means a kernel step failed.
fn process_feature(
    layer: &LayerConfig,
    feature: &Feature,
    terrain: &TerrainSettings,
    grid: &ElevationGrid,
    width_m: f32,
    height_m: f32,
) -> Result<Option<Mesh>, Error> {
    let rings = match buffered_rings(&feature.geometry, layer.buffer_size) {
        Some(rings) => rings,
        None => return Ok(None),
    };

    let effective_height =
        layer.effective_height_with_exaggeration(feature.height_property(), terrain.vertical_exaggeration);

    let mut mesh = Mesh::default();
    for (outer, holes) in rings {
        if outer.len() < 3 {
            continue;
        }
        let piece = if layer.align_vertices_to_terrain {
            draped_slab(&outer, &holes, grid, width_m, height_m, effective_height, layer.z_offset)?
        } else {
            let bottom_z = layer.bottom_z(terrain.base_height);
            let top_z = bottom_z + effective_height;
            extrude(&outer, &holes, bottom_z, top_z)?
        };
        mesh.append(&piece);
    }

    if mesh.vertex_count() == 0 {
        return Ok(None);
    }

    if layer.use_csg_clipping {
        subtract_terrain(&mut mesh, grid, width_m, height_m);
    }

    Ok(Some(mesh))
}

/// Collect the buffered (outer, holes) polygon rings for one feature,
/// per §4.8 step 2. Points carry no buffer/extrude semantics here and are
/// skipped; lines become a single buffered outline with no holes.
fn buffered_rings(geometry: &FeatureGeometry, buffer_size: f32) -> Option<Vec<(Vec<Vec2>, Vec<Vec<Vec2>>)>> {
    match geometry {
        FeatureGeometry::Point { .. } => None,
        FeatureGeometry::Line { points } => {
            let line: Vec<Vec2> = points.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
            let outline = linestring_buffer(&line, buffer_size.max(crate::buffer::EPSILON));
            if outline.is_empty() {
                None
            } else {
                Some(vec![(outline, Vec::new())])
            }
        }
        FeatureGeometry::Polygon { outer, holes } => {
            Some(vec![buffer_polygon(outer, holes, buffer_size)])
        }
        FeatureGeometry::MultiPolygon { polygons } => Some(
            polygons
                .iter()
                .map(|(outer, holes)| buffer_polygon(outer, holes, buffer_size))
                .collect(),
        ),
    }
}

fn buffer_polygon(outer: &[(f32, f32)], holes: &[Vec<(f32, f32)>], buffer_size: f32) -> (Vec<Vec2>, Vec<Vec<Vec2>>) {
    let outer: Vec<Vec2> = outer.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
    let buffered_outer = polygon_buffer(&outer, buffer_size);
    let buffered_holes = holes
        .iter()
        .map(|h| {
            let ring: Vec<Vec2> = h.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
            // Holes shrink as the outer ring grows; buffer inward by
            // negating delta is not supported by `polygon_buffer`, so
            // holes pass through unbuffered — matching §4.8's silence on
            // hole buffering and keeping the aperture conservative.
            let _ = buffer_size;
            ring
        })
        .collect();
    (buffered_outer, buffered_holes)
}

/// Build a draped slab: bottom cap follows the terrain surface per
/// vertex (shifted by `z_offset`), top cap is offset by `effective_height`
/// above that, sides connect the two per-vertex rather than at one flat
/// plane (§4.8 step 4's "draped slab that follows terrain on its
/// underside"). Falls back to a flat draped cap (no sides/bottom) when
/// `effective_height` is zero, since there is nothing to extrude.
///
/// `terrain.base_height` is deliberately not re-added here: the grid
/// passed in already has it baked into every sample by
/// `build_elevation_grid` (§4.4's `sample' = ... + baseHeight`), so the
/// grid's own minimum already sits at `baseHeight`. Adding `z_offset` on
/// top keeps the §8 invariant 2 floor (`terrainBaseHeight + zOffset − ε`)
/// true for every vertex without double-counting `baseHeight`.
fn draped_slab(
    outer: &[Vec2],
    holes: &[Vec<Vec2>],
    grid: &ElevationGrid,
    width_m: f32,
    height_m: f32,
    effective_height: f32,
    z_offset: f32,
) -> Result<Mesh, Error> {
    let (vertices2d, cap_indices) = triangulate_polygon(outer, holes)?;
    let sample = |v: &Vec2| sample_elevation(grid, v.x, v.y, width_m, height_m) + z_offset;

    let mut mesh = Mesh::default();

    if effective_height <= crate::buffer::EPSILON {
        let base = mesh.positions.len() as u32;
        for v in &vertices2d {
            mesh.positions.push(Vec3::new(v.x, sample(v), v.y));
            mesh.normals.push(Vec3::Y);
        }
        for chunk in cap_indices.chunks_exact(3) {
            mesh.indices.extend([base + chunk[0], base + chunk[1], base + chunk[2]]);
        }
        return Ok(mesh);
    }

    let top_base = mesh.positions.len() as u32;
    for v in &vertices2d {
        mesh.positions.push(Vec3::new(v.x, sample(v) + effective_height, v.y));
        mesh.normals.push(Vec3::Y);
    }
    for chunk in cap_indices.chunks_exact(3) {
        mesh.indices.extend([top_base + chunk[0], top_base + chunk[1], top_base + chunk[2]]);
    }

    let bottom_base = mesh.positions.len() as u32;
    for v in &vertices2d {
        mesh.positions.push(Vec3::new(v.x, sample(v), v.y));
        mesh.normals.push(Vec3::NEG_Y);
    }
    for chunk in cap_indices.chunks_exact(3) {
        mesh.indices.extend([bottom_base + chunk[0], bottom_base + chunk[2], bottom_base + chunk[1]]);
    }

    draped_side_walls(&mut mesh, outer, grid, width_m, height_m, effective_height, z_offset);
    for hole in holes {
        draped_side_walls(&mut mesh, hole, grid, width_m, height_m, effective_height, z_offset);
    }

    Ok(mesh)
}

fn draped_side_walls(
    mesh: &mut Mesh,
    ring: &[Vec2],
    grid: &ElevationGrid,
    width_m: f32,
    height_m: f32,
    effective_height: f32,
    z_offset: f32,
) {
    let n = ring.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let edge = b - a;
        let normal_xy = Vec2::new(edge.y, -edge.x).normalize_or_zero();
        let normal = Vec3::new(normal_xy.x, 0.0, normal_xy.y);

        let sample_a = sample_elevation(grid, a.x, a.y, width_m, height_m) + z_offset;
        let sample_b = sample_elevation(grid, b.x, b.y, width_m, height_m) + z_offset;

        let base = mesh.positions.len() as u32;
        mesh.positions.push(Vec3::new(a.x, sample_a, a.y));
        mesh.positions.push(Vec3::new(b.x, sample_b, b.y));
        mesh.positions.push(Vec3::new(b.x, sample_b + effective_height, b.y));
        mesh.positions.push(Vec3::new(a.x, sample_a + effective_height, a.y));
        for _ in 0..4 {
            mesh.normals.push(normal);
        }

        mesh.indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}
