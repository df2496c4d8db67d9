//! Seed scenarios (§8) exercised end to end through `generate_from_tiles`
//! and `generate`, without any network: the two scenarios not already
//! covered by `tile3d-orchestrator`'s in-crate unit tests — a single
//! merged road layer, and cancelling a run mid-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use tile3d_common::{
    BBox, ElevationGrid, Feature, FeatureGeometry, Geometry, LayerConfig, ProcessId, Progress,
    ProgressCallback, Rgb, TerrainSettings,
};
use tile3d_geo::FetchConfig;
use tile3d_orchestrator::pool::ContextPool;
use tile3d_orchestrator::{GenerationOrchestrator, RunInputs, TileSources};

fn flat_grid(w: usize, h: usize, value: f32) -> ElevationGrid {
    ElevationGrid { width: w, height: h, samples: vec![value; w * h], min_elevation: value, max_elevation: value, original_min: value, original_max: value }
}

fn road_layer() -> LayerConfig {
    LayerConfig {
        source_layer: "road".into(),
        label: "roads".into(),
        enabled: true,
        color: Rgb { r: 0.3, g: 0.3, b: 0.3 },
        filter: None,
        buffer_size: 2.0,
        extrusion_depth: Some(0.3),
        min_extrusion_depth: None,
        height_scale_factor: 1.0,
        use_adaptive_scale_factor: false,
        z_offset: 0.05,
        align_vertices_to_terrain: false,
        use_csg_clipping: false,
        order: 0,
        geometry_debug_mode: false,
    }
}

fn road_feature(a: (f32, f32), b: (f32, f32)) -> Feature {
    Feature { geometry: FeatureGeometry::Line { points: vec![a, b] }, properties: HashMap::new(), source_layer: "road".into() }
}

fn orchestrator() -> GenerationOrchestrator {
    let pool = Arc::new(ContextPool::new(4));
    let sources = TileSources {
        raster_url_template: "https://example.invalid/{z}/{x}/{y}.png".into(),
        vector_url_template: "https://example.invalid/{z}/{x}/{y}.mvt".into(),
        fetch_config: FetchConfig::default(),
    };
    GenerationOrchestrator::new(pool, sources, Duration::from_millis(1000), Duration::from_millis(200))
}

fn no_progress() -> ProgressCallback {
    Box::new(|_: Progress| {})
}

#[tokio::test]
async fn single_road_layer_produces_one_merged_container_child() {
    let orch = orchestrator();
    let input = RunInputs {
        bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
        terrain: TerrainSettings { base_height: 2.0, ..TerrainSettings::default() },
        layers: vec![road_layer()],
    };
    let grid = flat_grid(4, 4, 10.0);
    let mut features = HashMap::new();
    features.insert(
        "road".to_string(),
        vec![road_feature((10.0, 10.0), (80.0, 10.0)), road_feature((10.0, 80.0), (80.0, 80.0))],
    );

    let process_id = ProcessId::new();
    let token = CancellationToken::new();
    let progress = no_progress();
    let output = orch.generate_from_tiles(&process_id, &input, grid, features, &token, &progress).await.unwrap();

    assert_eq!(output.per_layer_geometries.len(), 1);
    assert_eq!(output.per_layer_geometries[0].label, "roads");
    match &output.per_layer_geometries[0].geometry {
        // Roads are not "building"-sourced, so per §4.8 every road
        // feature merges into a single container child rather than
        // staying individually addressable.
        Geometry::Container { children, .. } => assert_eq!(children.len(), 1),
        _ => panic!("expected container"),
    }
}

#[tokio::test]
async fn output_vertices_stay_within_bbox_containment() {
    // §8 invariant 1: every output vertex (x,y) lies inside or on the bbox,
    // within epsilon, once converted to world meters from the bbox SW corner.
    let orch = orchestrator();
    let bbox = BBox::new(0.0, 0.0, 0.001, 0.001).unwrap();
    let input = RunInputs {
        bbox,
        terrain: TerrainSettings { base_height: 2.0, ..TerrainSettings::default() },
        layers: vec![road_layer()],
    };
    let grid = flat_grid(4, 4, 10.0);
    let mut features = HashMap::new();
    features.insert(
        "road".to_string(),
        vec![road_feature((10.0, 10.0), (80.0, 10.0)), road_feature((10.0, 80.0), (80.0, 80.0))],
    );

    let process_id = ProcessId::new();
    let token = CancellationToken::new();
    let progress = no_progress();
    let output = orch.generate_from_tiles(&process_id, &input, grid, features, &token, &progress).await.unwrap();

    let (width_m, height_m) = tile3d_geo::bbox_size_meters(&bbox);
    let eps = 1e-2;

    fn assert_contained(geometry: &Geometry, bbox: &BBox, width_m: f32, height_m: f32, eps: f32) {
        match geometry {
            Geometry::Leaf { positions, .. } => {
                for chunk in positions.chunks_exact(3) {
                    // positions are [x, elevation, z] per `Mesh::into_geometry`
                    // (glam's `Vec3::new(x, elevation, worldNorth)`), so
                    // world-north is index 2, not index 1.
                    let (x, y) = (chunk[0], chunk[2]);
                    assert!(
                        bbox.contains_xy_world(x, y, width_m, height_m, eps),
                        "vertex ({x}, {y}) outside bbox world extent {width_m}x{height_m}"
                    );
                }
            }
            Geometry::Container { children, .. } => {
                for child in children {
                    assert_contained(child, bbox, width_m, height_m, eps);
                }
            }
        }
    }

    assert_contained(&output.terrain_geometry, &bbox, width_m as f32, height_m as f32, eps);
    for layer in &output.per_layer_geometries {
        assert_contained(&layer.geometry, &bbox, width_m as f32, height_m as f32, eps);
    }
}

#[tokio::test]
async fn cancelling_mid_flight_aborts_the_run_with_cancelled_error() {
    let orch = orchestrator();
    let input = RunInputs {
        bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
        terrain: TerrainSettings::default(),
        layers: vec![road_layer()],
    };
    let grid = flat_grid(4, 4, 10.0);
    let mut features = HashMap::new();
    features.insert("road".to_string(), vec![road_feature((10.0, 10.0), (80.0, 10.0))]);

    let process_id = ProcessId::new();
    let token = CancellationToken::new();
    token.cancel();
    let progress = no_progress();

    let result = orch.generate_from_tiles(&process_id, &input, grid, features, &token, &progress).await;
    assert!(matches!(result, Err(tile3d_common::Error::Cancelled)));
}

#[tokio::test]
async fn cancelling_external_token_before_debounce_elapses_short_circuits_generate() {
    let orch = orchestrator();
    let input = RunInputs {
        bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
        terrain: TerrainSettings::default(),
        layers: vec![road_layer()],
    };

    let external = CancellationToken::new();
    external.cancel();

    let messages = Arc::new(Mutex::new(Vec::new()));
    let messages_clone = messages.clone();
    let progress: ProgressCallback = Box::new(move |p| messages_clone.lock().push(p.stage));

    let result = orch.generate(input, progress, external).await;
    assert!(matches!(result, Err(tile3d_common::Error::Cancelled)));
    // The debounce wait is what observes cancellation; generation never
    // reaches the terrain/layers progress stages.
    assert!(!messages.lock().iter().any(|s| matches!(s, tile3d_common::ProgressStage::Complete)));
}
