//! # Context Pool (§4.9)
//!
//! A fixed pool of isolated compute contexts, grounded directly on
//! `eustress-forge::routing::ExperienceRouter`: the same
//! `Arc<parking_lot::RwLock<...>>`-guarded registry and round-robin
//! selection-by-load, generalized from routing players to experience
//! servers into dispatching geometry work to contexts. CPU-bound kernel
//! calls run via `tokio::task::spawn_blocking` per §5's "geometry kernel
//! calls... do not suspend... run on the context's own thread."

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use tile3d_common::{Error, Feature, LayerConfig, ProcessId, TerrainSettings};
use tile3d_kernel::layer_processor::{process_layer, LayerResult};
use tile3d_common::ElevationGrid;

/// One compute context: a thread-like unit of work, not an OS thread
/// itself (the actual CPU-bound work runs via `spawn_blocking`). Tracks
/// its own load and the resource keys it's been granted access to.
#[derive(Clone)]
pub struct ContextHandle {
    pub id: usize,
    active_tasks: Arc<AtomicUsize>,
    last_active: Arc<Mutex<Instant>>,
    accessible: Arc<RwLock<HashSet<String>>>,
}

impl ContextHandle {
    fn new(id: usize) -> Self {
        ContextHandle {
            id,
            active_tasks: Arc::new(AtomicUsize::new(0)),
            last_active: Arc::new(Mutex::new(Instant::now())),
            accessible: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn load(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        *self.last_active.lock() = Instant::now();
    }
}

/// A resource shared read-only across contexts within one run, registered
/// under `(processId, resourceKey)` per §4.9.
#[derive(Clone)]
pub enum SharedResource {
    ElevationGrid(Arc<ElevationGrid>),
    Features(Arc<Vec<Feature>>),
}

/// Fixed-size context pool plus the shared-resource registry all its
/// contexts read from. `N = min(hardwareConcurrency, 8)` per §4.9,
/// resolved by the caller via `EngineConfig::resolved_pool_size`.
pub struct ContextPool {
    max_size: usize,
    contexts: RwLock<Vec<ContextHandle>>,
    resources: RwLock<HashMap<(String, String), SharedResource>>,
}

impl ContextPool {
    pub fn new(max_size: usize) -> Self {
        ContextPool { max_size: max_size.max(1), contexts: RwLock::new(Vec::new()), resources: RwLock::new(HashMap::new()) }
    }

    /// `ensureMinimum(k)`: pre-allocate up to `k` contexts, capped at the
    /// pool's fixed size.
    pub fn ensure_minimum(&self, k: usize) {
        let mut contexts = self.contexts.write();
        let target = k.min(self.max_size);
        while contexts.len() < target {
            let id = contexts.len();
            contexts.push(ContextHandle::new(id));
        }
    }

    /// Pick the least-busy context, allocating one if the pool is empty
    /// (round-robin among equally-loaded contexts is acceptable per
    /// §4.9; ties resolve to the lowest id, which is a stable round-robin
    /// under uniform load).
    pub fn least_busy(&self) -> ContextHandle {
        self.ensure_minimum(1);
        let contexts = self.contexts.read();
        contexts.iter().min_by_key(|c| c.load()).cloned().expect("ensure_minimum(1) guarantees one context")
    }

    /// Register a resource under `(processId, resourceKey)`, readable by
    /// any context once granted access via [`ContextPool::share_resources`].
    pub fn register_resource(&self, process_id: &ProcessId, key: &str, resource: SharedResource) {
        self.resources.write().insert((process_id.0.clone(), key.to_string()), resource);
    }

    /// `shareResources(fromCtx, toCtx, keys)`: grant `to` read access to
    /// the named resource keys (in this registry, every context is
    /// eligible for the same run's resources by default since they're
    /// read-only; this call exists to make that access explicit and
    /// auditable per context, matching §4.9's "mark resources as
    /// accessible to a context").
    pub fn share_resources(&self, to: &ContextHandle, keys: &[&str]) {
        let mut accessible = to.accessible.write();
        for key in keys {
            accessible.insert((*key).to_string());
        }
    }

    fn get_resource(&self, process_id: &ProcessId, context: &ContextHandle, key: &str) -> Option<SharedResource> {
        if !context.accessible.read().contains(key) {
            return None;
        }
        self.resources.read().get(&(process_id.0.clone(), key.to_string())).cloned()
    }

    pub fn elevation_grid(&self, process_id: &ProcessId, context: &ContextHandle) -> Option<Arc<ElevationGrid>> {
        match self.get_resource(process_id, context, "elevation_grid")? {
            SharedResource::ElevationGrid(grid) => Some(grid),
            _ => None,
        }
    }

    pub fn layer_features(&self, process_id: &ProcessId, context: &ContextHandle, source_layer: &str) -> Option<Arc<Vec<Feature>>> {
        match self.get_resource(process_id, context, &format!("features:{source_layer}"))? {
            SharedResource::Features(features) => Some(features),
            _ => None,
        }
    }

    /// Drop every registered resource for `process_id`, releasing its
    /// scoped memory (§5's "the Orchestrator releases all
    /// `processId`-scoped resources" on cancel or completion).
    pub fn release_process(&self, process_id: &ProcessId) {
        self.resources.write().retain(|(pid, _), _| pid != &process_id.0);
    }

    /// `cleanup(idleMs)`: drop contexts idle longer than `idleMs`, keeping
    /// at least one so the pool is never empty.
    pub fn cleanup(&self, idle: Duration) {
        let mut contexts = self.contexts.write();
        if contexts.len() <= 1 {
            return;
        }
        let now = Instant::now();
        contexts.retain(|c| now.duration_since(*c.last_active.lock()) <= idle);
        if contexts.is_empty() {
            contexts.push(ContextHandle::new(0));
        }
    }

    /// `runLayer(layerConfig, sharedRefs, cb) → future<LayerResult>`: run
    /// one layer's processing on `context`, honoring `cancel` by dropping
    /// the spawned task before it's awaited (§4.9/§5).
    pub async fn run_layer(
        &self,
        context: &ContextHandle,
        layer: LayerConfig,
        features: Arc<Vec<Feature>>,
        terrain: TerrainSettings,
        grid: Arc<ElevationGrid>,
        width_m: f32,
        height_m: f32,
        cancel: CancellationToken,
    ) -> Result<LayerResult, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        context.active_tasks.fetch_add(1, Ordering::SeqCst);
        context.touch();

        let label = layer.label.clone();
        let task = tokio::task::spawn_blocking(move || process_layer(&layer, &features, &terrain, &grid, width_m, height_m));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                task.abort();
                Err(Error::Cancelled)
            }
            joined = task => {
                joined.map_err(|e| Error::layer_processing_failed(label, format!("context task panicked: {e}")))
            }
        };

        context.active_tasks.fetch_sub(1, Ordering::SeqCst);
        context.touch();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile3d_common::{ElevationGrid as Grid, Rgb};

    #[test]
    fn ensure_minimum_caps_at_max_size() {
        let pool = ContextPool::new(2);
        pool.ensure_minimum(8);
        assert_eq!(pool.contexts.read().len(), 2);
    }

    #[test]
    fn least_busy_picks_lowest_load() {
        let pool = ContextPool::new(4);
        pool.ensure_minimum(2);
        let contexts = pool.contexts.read().clone();
        contexts[0].active_tasks.store(5, Ordering::SeqCst);
        drop(contexts);
        assert_eq!(pool.least_busy().id, 1);
    }

    #[test]
    fn resource_access_requires_share_resources_first() {
        let pool = ContextPool::new(1);
        let ctx = pool.least_busy();
        let process_id = ProcessId::new();
        let grid = Arc::new(Grid { width: 1, height: 1, samples: vec![0.0], min_elevation: 0.0, max_elevation: 0.0, original_min: 0.0, original_max: 0.0 });
        pool.register_resource(&process_id, "elevation_grid", SharedResource::ElevationGrid(grid));
        assert!(pool.elevation_grid(&process_id, &ctx).is_none());
        pool.share_resources(&ctx, &["elevation_grid"]);
        assert!(pool.elevation_grid(&process_id, &ctx).is_some());
    }

    #[tokio::test]
    async fn run_layer_honors_pre_cancelled_token() {
        let pool = ContextPool::new(1);
        let ctx = pool.least_busy();
        let layer = LayerConfig {
            source_layer: "building".into(),
            label: "buildings".into(),
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
        let grid = Arc::new(Grid { width: 2, height: 2, samples: vec![0.0; 4], min_elevation: 0.0, max_elevation: 0.0, original_min: 0.0, original_max: 0.0 });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool
            .run_layer(&ctx, layer, Arc::new(Vec::new()), TerrainSettings::default(), grid, 10.0, 10.0, cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
