//! # Generation Orchestrator (§4.10)
//!
//! The single-threaded coordinator (§5: "only the Orchestrator mutates
//! cache/hash state") driving one `generate()` call end to end: hash and
//! skip, debounce, fetch DEM + MVT, dispatch layers to the
//! [`crate::pool::ContextPool`], and assemble the final output. The
//! debounce state machine and cancellation idiom follow the §9 redesign
//! flag directly: two states (`Idle`/`Pending{deadline}`), a
//! `tokio::select!` race between a settling timer and cancellation — the
//! same shape `eustress-forge::lib.rs`'s doc-commented SDK example shows
//! for graceful shutdown (`tokio::select! { _ = shutdown_signal() => ...,
//! interruption = wait_for_spot_interruption(&spot) => ... }`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use tile3d_common::hash::{full_config_hash, hash_bbox, hash_layers, hash_terrain};
use tile3d_common::{
    BBox, ConfigHashes, Error, Feature, Geometry, LayerConfig, ProcessId, Progress, ProgressCallback,
    ProgressStage, TerrainSettings,
};
use tile3d_geo::{
    bbox_size_meters, build_elevation_grid, choose_zoom, decode_layer_features, fetch_raster_tile,
    fetch_vector_tile, tiles_covering, FetchConfig, TileCoord,
};
use tile3d_kernel::build_terrain_mesh;

use crate::pool::{ContextPool, SharedResource};

/// One `generate()` call's input (§6's `input = { bbox, terrain, layers[] }`;
/// `progress`/`cancelToken` are separate parameters here rather than
/// struct fields, matching Rust's callback/token idiom over a duck-typed
/// options bag).
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub bbox: BBox,
    pub terrain: TerrainSettings,
    pub layers: Vec<LayerConfig>,
}

/// One enabled layer's emitted geometry, keyed by its `label` (§6).
#[derive(Debug, Clone)]
pub struct LayerOutput {
    pub label: String,
    pub geometry: Geometry,
}

/// `output = { terrainGeometry, perLayerGeometries }` (§6), plus a
/// `skippedCount` per layer so tests can assert on per-feature failure
/// handling without inspecting geometry (§7's propagation policy).
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub terrain_geometry: Geometry,
    pub per_layer_geometries: Vec<LayerOutput>,
    pub skipped_counts: HashMap<String, usize>,
}

/// Where to fetch DEM/MVT tiles from (§6's URL templates).
#[derive(Debug, Clone)]
pub struct TileSources {
    pub raster_url_template: String,
    pub vector_url_template: String,
    pub fetch_config: FetchConfig,
}

fn fill_template(template: &str, tile: TileCoord) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

struct RunState {
    debounce: DebounceState,
    current_token: Option<CancellationToken>,
    last_hashes: Option<ConfigHashes>,
    last_output: Option<Arc<GenerationOutput>>,
}

impl Default for RunState {
    fn default() -> Self {
        RunState { debounce: DebounceState::Idle, current_token: None, last_hashes: None, last_output: None }
    }
}

pub struct GenerationOrchestrator {
    pool: Arc<ContextPool>,
    http: reqwest::Client,
    sources: TileSources,
    normal_debounce: Duration,
    fast_debounce: Duration,
    layer_timeout: Duration,
    grid_resolution: u32,
    state: Mutex<RunState>,
}

impl GenerationOrchestrator {
    pub fn new(pool: Arc<ContextPool>, sources: TileSources, normal_debounce: Duration, fast_debounce: Duration) -> Self {
        GenerationOrchestrator {
            pool,
            http: reqwest::Client::new(),
            sources,
            normal_debounce,
            fast_debounce,
            layer_timeout: Duration::from_secs(300),
            grid_resolution: 256,
            state: Mutex::new(RunState::default()),
        }
    }

    /// Override the elevation grid's W×H resolution (`EngineConfig::grid_resolution`,
    /// default 256 per §4.4). Consuming builder so callers compose it at
    /// construction time alongside [`GenerationOrchestrator::new`].
    pub fn with_grid_resolution(mut self, resolution: u32) -> Self {
        self.grid_resolution = resolution;
        self
    }

    /// `generate(bbox, terrain, layers, progressCb) → future<{terrainGeometry,
    /// perLayerGeometries}>` (§4.10). Fetches DEM + MVT tiles over the
    /// network; see [`GenerationOrchestrator::generate_from_tiles`] for
    /// the pure-compute continuation this delegates to once both are in
    /// hand.
    pub async fn generate(
        &self,
        input: RunInputs,
        progress: ProgressCallback,
        external_cancel: CancellationToken,
    ) -> Result<Arc<GenerationOutput>, Error> {
        let hashes = self.compute_hashes(&input);

        // Step 1: hash-and-skip memoization — no debounce, no fetch.
        if let Some(cached) = self.cached_output(hashes) {
            return Ok(cached);
        }

        let token = self.supersede_and_register(external_cancel);
        self.wait_out_debounce(&token).await?;

        let process_id = ProcessId::new();
        self.pool.ensure_minimum(self.pool_size_hint());

        let result = self.run_pipeline(&process_id, &input, &token, &progress).await;

        self.pool.release_process(&process_id);
        self.clear_if_current(&token);

        match result {
            Ok(output) => {
                let output = Arc::new(output);
                self.store_success(hashes, output.clone());
                progress(Progress::new(ProgressStage::Complete, 100, "generation complete"));
                Ok(output)
            }
            Err(e) => Err(e),
        }
    }

    /// The pure-compute continuation of [`GenerationOrchestrator::generate`]:
    /// dispatches terrain + layer building from an already-built
    /// `ElevationGrid` and already-decoded per-source-layer feature sets.
    /// Exposed directly so tests can pin §8's geometry/cancellation
    /// invariants without standing up an HTTP server.
    pub async fn generate_from_tiles(
        &self,
        process_id: &ProcessId,
        input: &RunInputs,
        grid: tile3d_common::ElevationGrid,
        features_by_layer: HashMap<String, Vec<Feature>>,
        token: &CancellationToken,
        progress: &ProgressCallback,
    ) -> Result<GenerationOutput, Error> {
        let (width_m, height_m) = bbox_size_meters(&input.bbox);
        let (width_m, height_m) = (width_m as f32, height_m as f32);

        let grid = Arc::new(grid);
        self.pool.register_resource(process_id, "elevation_grid", SharedResource::ElevationGrid(grid.clone()));
        for (source_layer, features) in &features_by_layer {
            self.pool.register_resource(
                process_id,
                &format!("features:{source_layer}"),
                SharedResource::Features(Arc::new(features.clone())),
            );
        }

        progress(Progress::new(ProgressStage::Terrain, 20, "elevation grid ready"));
        let terrain_mesh = build_terrain_mesh(&grid, width_m, height_m, &input.terrain);
        let terrain_geometry = terrain_mesh.into_geometry(HashMap::new());

        let mut enabled: Vec<&LayerConfig> = input.layers.iter().filter(|l| l.enabled).collect();
        enabled.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.label.cmp(&b.label)));
        let sequential = enabled.iter().any(|l| l.align_vertices_to_terrain);

        let (per_layer_geometries, skipped_counts) = if sequential {
            self.dispatch_sequential(process_id, &enabled, &features_by_layer, &input.terrain, &grid, width_m, height_m, token, progress).await?
        } else {
            self.dispatch_parallel(process_id, &enabled, &features_by_layer, &input.terrain, &grid, width_m, height_m, token, progress).await?
        };

        progress(Progress::new(ProgressStage::Finalizing, 95, "assembling output"));
        Ok(GenerationOutput { terrain_geometry, per_layer_geometries, skipped_counts })
    }

    async fn dispatch_sequential(
        &self,
        _process_id: &ProcessId,
        layers: &[&LayerConfig],
        features_by_layer: &HashMap<String, Vec<Feature>>,
        terrain: &TerrainSettings,
        grid: &Arc<tile3d_common::ElevationGrid>,
        width_m: f32,
        height_m: f32,
        token: &CancellationToken,
        progress: &ProgressCallback,
    ) -> Result<(Vec<LayerOutput>, HashMap<String, usize>), Error> {
        let mut outputs = Vec::new();
        let mut skipped_counts = HashMap::new();
        let total = layers.len().max(1);

        for (i, layer) in layers.iter().enumerate() {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let ctx = self.pool.least_busy();
            let features = Arc::new(features_by_layer.get(&layer.source_layer).cloned().unwrap_or_default());
            let result = self.run_one_layer(ctx, layer, features, terrain, grid, width_m, height_m, token).await;
            match result {
                Ok(layer_result) => {
                    skipped_counts.insert(layer.label.clone(), layer_result.skipped.len());
                    outputs.push(LayerOutput { label: layer.label.clone(), geometry: layer_result.geometry });
                }
                Err(e) => return Err(e),
            }
            let pct = 20 + ((i + 1) * 70 / total) as u8;
            progress(Progress::new(ProgressStage::Layers, pct, format!("layer '{}' complete", layer.label)));
        }

        Ok((outputs, skipped_counts))
    }

    async fn dispatch_parallel(
        &self,
        _process_id: &ProcessId,
        layers: &[&LayerConfig],
        features_by_layer: &HashMap<String, Vec<Feature>>,
        terrain: &TerrainSettings,
        grid: &Arc<tile3d_common::ElevationGrid>,
        width_m: f32,
        height_m: f32,
        token: &CancellationToken,
        progress: &ProgressCallback,
    ) -> Result<(Vec<LayerOutput>, HashMap<String, usize>), Error> {
        let futures = layers.iter().map(|layer| {
            let ctx = self.pool.least_busy();
            let features = Arc::new(features_by_layer.get(&layer.source_layer).cloned().unwrap_or_default());
            self.run_one_layer(ctx, layer, features, terrain, grid, width_m, height_m, token)
        });

        let results = futures::future::join_all(futures).await;

        let mut outputs = Vec::new();
        let mut skipped_counts = HashMap::new();
        let total = layers.len().max(1);
        for (i, (layer, result)) in layers.iter().zip(results.into_iter()).enumerate() {
            match result {
                Ok(layer_result) => {
                    skipped_counts.insert(layer.label.clone(), layer_result.skipped.len());
                    outputs.push(LayerOutput { label: layer.label.clone(), geometry: layer_result.geometry });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(_) => {
                    // Parallel mode: a failed layer is skipped, the rest continue (§7).
                    skipped_counts.insert(layer.label.clone(), 0);
                    outputs.push(LayerOutput { label: layer.label.clone(), geometry: Geometry::empty_container() });
                }
            }
            let pct = 20 + ((i + 1) * 70 / total) as u8;
            progress(Progress::new(ProgressStage::Layers, pct, format!("layer '{}' complete", layer.label)));
        }

        Ok((outputs, skipped_counts))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_one_layer(
        &self,
        ctx: crate::pool::ContextHandle,
        layer: &LayerConfig,
        features: Arc<Vec<Feature>>,
        terrain: &TerrainSettings,
        grid: &Arc<tile3d_common::ElevationGrid>,
        width_m: f32,
        height_m: f32,
        token: &CancellationToken,
    ) -> Result<tile3d_kernel::layer_processor::LayerResult, Error> {
        self.pool.share_resources(&ctx, &["elevation_grid", &format!("features:{}", layer.source_layer)]);
        match tokio::time::timeout(
            self.layer_timeout,
            self.pool.run_layer(&ctx, layer.clone(), features, terrain.clone(), grid.clone(), width_m, height_m, token.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::layer_processing_failed(layer.label.clone(), "layer task exceeded 300s timeout")),
        }
    }

    async fn run_pipeline(
        &self,
        process_id: &ProcessId,
        input: &RunInputs,
        token: &CancellationToken,
        progress: &ProgressCallback,
    ) -> Result<GenerationOutput, Error> {
        progress(Progress::new(ProgressStage::Initializing, 0, "starting run"));

        let grid = self.fetch_elevation_grid(&input.bbox, &input.terrain, token).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let features_by_layer = self.fetch_layer_features(&input.bbox, &input.layers, token).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.generate_from_tiles(process_id, input, grid, features_by_layer, token, progress).await
    }

    async fn fetch_elevation_grid(
        &self,
        bbox: &BBox,
        terrain: &TerrainSettings,
        token: &CancellationToken,
    ) -> Result<tile3d_common::ElevationGrid, Error> {
        let zoom = choose_zoom(bbox);
        let mut tiles = std::collections::HashMap::new();
        for tile in tiles_covering(bbox, zoom) {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let url = fill_template(&self.sources.raster_url_template, tile);
            let raster = fetch_raster_tile(&self.http, &url, self.sources.fetch_config, tile3d_common::Stage::Terrain).await?;
            tiles.insert(tile, raster);
        }
        build_elevation_grid(bbox, self.grid_resolution, &tiles, terrain.vertical_exaggeration, terrain.base_height)
    }

    async fn fetch_layer_features(
        &self,
        bbox: &BBox,
        layers: &[LayerConfig],
        token: &CancellationToken,
    ) -> Result<HashMap<String, Vec<Feature>>, Error> {
        let zoom = choose_zoom(bbox);
        let mut out: HashMap<String, Vec<Feature>> = HashMap::new();
        let needed: std::collections::HashSet<&str> =
            layers.iter().filter(|l| l.enabled).map(|l| l.source_layer.as_str()).collect();
        if needed.is_empty() {
            return Ok(out);
        }

        for tile in tiles_covering(bbox, zoom) {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let url = fill_template(&self.sources.vector_url_template, tile);
            let stage = tile3d_common::Stage::Layer("mvt".to_string());
            let mvt = fetch_vector_tile(&self.http, &url, self.sources.fetch_config, stage).await?;
            for layer in &mvt.layers {
                if !needed.contains(layer.name.as_str()) {
                    continue;
                }
                let features = decode_layer_features(layer, tile, bbox);
                out.entry(layer.name.clone()).or_default().extend(features);
            }
        }
        Ok(out)
    }

    fn compute_hashes(&self, input: &RunInputs) -> ConfigHashes {
        let bbox_hash = hash_bbox(&input.bbox);
        let terrain_hash = hash_terrain(&input.terrain);
        let layers_hash = hash_layers(&input.layers);
        let full_config_hash = full_config_hash(bbox_hash, terrain_hash, layers_hash);
        ConfigHashes { full_config_hash, terrain_hash, layers_hash }
    }

    fn cached_output(&self, hashes: ConfigHashes) -> Option<Arc<GenerationOutput>> {
        let state = self.state.lock();
        match state.last_hashes {
            Some(last) if last.full_config_hash == hashes.full_config_hash => state.last_output.clone(),
            _ => None,
        }
    }

    fn store_success(&self, hashes: ConfigHashes, output: Arc<GenerationOutput>) {
        let mut state = self.state.lock();
        state.last_hashes = Some(hashes);
        state.last_output = Some(output);
        state.debounce = DebounceState::Idle;
    }

    /// Cancel any in-flight run (§4.10 step 2) and register this call's
    /// token as the new "current" run, so a later call can supersede it.
    fn supersede_and_register(&self, external_cancel: CancellationToken) -> CancellationToken {
        let mut state = self.state.lock();
        let was_active = matches!(state.debounce, DebounceState::Pending { .. }) || state.current_token.is_some();
        if let Some(old) = state.current_token.take() {
            old.cancel();
        }
        let token = external_cancel.child_token();
        state.current_token = Some(token.clone());
        state.debounce = DebounceState::Pending { deadline: Instant::now() + self.debounce_duration(was_active) };
        token
    }

    fn debounce_duration(&self, was_active: bool) -> Duration {
        if was_active {
            self.fast_debounce
        } else {
            self.normal_debounce
        }
    }

    /// Sleep out the debounce window, racing it against cancellation —
    /// the `tokio::select!` idiom this module's doc comment cites.
    async fn wait_out_debounce(&self, token: &CancellationToken) -> Result<(), Error> {
        let deadline = {
            let state = self.state.lock();
            match state.debounce {
                DebounceState::Pending { deadline } => deadline,
                DebounceState::Idle => Instant::now(),
            }
        };
        let remaining = deadline.saturating_duration_since(Instant::now());

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(remaining) => Ok(()),
        }
    }

    fn clear_if_current(&self, token: &CancellationToken) {
        let mut state = self.state.lock();
        let is_current = state.current_token.as_ref().map(|t| t.is_cancelled() == token.is_cancelled()).unwrap_or(false);
        if is_current && !token.is_cancelled() {
            state.current_token = None;
            state.debounce = DebounceState::Idle;
        }
    }

    fn pool_size_hint(&self) -> usize {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).min(8)
    }

    #[cfg(test)]
    fn grid_resolution(&self) -> u32 {
        self.grid_resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use tile3d_common::{FeatureGeometry, PropertyValue, Rgb};

    fn flat_grid(w: usize, h: usize, value: f32) -> tile3d_common::ElevationGrid {
        tile3d_common::ElevationGrid {
            width: w,
            height: h,
            samples: vec![value; w * h],
            min_elevation: value,
            max_elevation: value,
            original_min: value,
            original_max: value,
        }
    }

    fn building_layer(label: &str, order: i32, align: bool) -> LayerConfig {
        LayerConfig {
            source_layer: "building".into(),
            label: label.into(),
            enabled: true,
            color: Rgb { r: 1.0, g: 1.0, b: 1.0 },
            filter: None,
            buffer_size: 0.0,
            extrusion_depth: None,
            min_extrusion_depth: Some(2.0),
            height_scale_factor: 1.0,
            use_adaptive_scale_factor: false,
            z_offset: 0.0,
            align_vertices_to_terrain: align,
            use_csg_clipping: false,
            order,
            geometry_debug_mode: false,
        }
    }

    fn square_feature(height: f32) -> Feature {
        let mut properties = Map::new();
        properties.insert("height".to_string(), PropertyValue::Number(height as f64));
        Feature {
            geometry: FeatureGeometry::Polygon {
                outer: vec![(40.0, 40.0), (60.0, 40.0), (60.0, 60.0), (40.0, 60.0)],
                holes: vec![],
            },
            properties,
            source_layer: "building".into(),
        }
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
        Box::new(|_| {})
    }

    #[tokio::test]
    async fn single_building_produces_one_container_child() {
        let orch = orchestrator();
        let input = RunInputs {
            bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
            terrain: TerrainSettings { base_height: 5.0, ..TerrainSettings::default() },
            layers: vec![building_layer("buildings", 0, false)],
        };
        let grid = flat_grid(4, 4, 10.0);
        let mut features = HashMap::new();
        features.insert("building".to_string(), vec![square_feature(30.0)]);

        let process_id = ProcessId::new();
        let token = CancellationToken::new();
        let progress = no_progress();
        let output = orch
            .generate_from_tiles(&process_id, &input, grid, features, &token, &progress)
            .await
            .unwrap();

        assert_eq!(output.per_layer_geometries.len(), 1);
        match &output.per_layer_geometries[0].geometry {
            Geometry::Container { children, .. } => assert_eq!(children.len(), 1),
            _ => panic!("expected container"),
        }
    }

    #[tokio::test]
    async fn disabled_layer_is_excluded_from_output() {
        let orch = orchestrator();
        let mut disabled = building_layer("extra", 1, false);
        disabled.enabled = false;
        let input = RunInputs {
            bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
            terrain: TerrainSettings::default(),
            layers: vec![building_layer("buildings", 0, false), disabled],
        };
        let grid = flat_grid(4, 4, 10.0);
        let mut features = HashMap::new();
        features.insert("building".to_string(), vec![square_feature(30.0)]);

        let process_id = ProcessId::new();
        let token = CancellationToken::new();
        let progress = no_progress();
        let output = orch
            .generate_from_tiles(&process_id, &input, grid, features, &token, &progress)
            .await
            .unwrap();

        assert_eq!(output.per_layer_geometries.len(), 1);
        assert_eq!(output.per_layer_geometries[0].label, "buildings");
    }

    #[tokio::test]
    async fn terrain_aligned_layer_forces_sequential_progress_order() {
        let orch = orchestrator();
        let input = RunInputs {
            bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
            terrain: TerrainSettings::default(),
            layers: vec![building_layer("aligned", 0, true), building_layer("plain", 1, false)],
        };
        let grid = flat_grid(4, 4, 10.0);
        let mut features = HashMap::new();
        features.insert("building".to_string(), vec![square_feature(30.0)]);

        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        let progress: ProgressCallback = Box::new(move |p| order_clone.lock().push(p.message));

        let process_id = ProcessId::new();
        let token = CancellationToken::new();
        let output = orch
            .generate_from_tiles(&process_id, &input, grid, features, &token, &progress)
            .await
            .unwrap();

        assert_eq!(output.per_layer_geometries.len(), 2);
        let messages = order.lock();
        let aligned_pos = messages.iter().position(|m| m.contains("aligned")).unwrap();
        let plain_pos = messages.iter().position(|m| m.contains("plain")).unwrap();
        assert!(aligned_pos < plain_pos);
    }

    #[test]
    fn with_grid_resolution_overrides_the_default() {
        let orch = orchestrator().with_grid_resolution(512);
        assert_eq!(orch.grid_resolution(), 512);
    }

    #[tokio::test]
    async fn memoized_repeat_returns_identity_equal_output_with_no_fetch() {
        let orch = orchestrator();
        let input = RunInputs {
            bbox: BBox::new(0.0, 0.0, 0.001, 0.001).unwrap(),
            terrain: TerrainSettings::default(),
            layers: vec![building_layer("buildings", 0, false)],
        };
        let hashes = orch.compute_hashes(&input);
        let output = Arc::new(GenerationOutput {
            terrain_geometry: Geometry::empty_container(),
            per_layer_geometries: vec![],
            skipped_counts: HashMap::new(),
        });
        orch.store_success(hashes, output.clone());

        let cached = orch.cached_output(hashes);
        assert!(cached.is_some());
        assert!(Arc::ptr_eq(&cached.unwrap(), &output));
    }
}
