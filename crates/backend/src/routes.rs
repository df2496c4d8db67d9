// =============================================================================
// Tile3D Backend - Routes
// =============================================================================

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use tile3d_common::{BBox, LayerConfig, Progress, TerrainSettings};
use tile3d_orchestrator::{Engine, GenerationOutput, RunInputs};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// `POST /generate` request body: `input = { bbox, terrain, layers[] }` (§6).
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub bbox: BBox,
    pub terrain: TerrainSettings,
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub output: GenerationOutputView,
}

/// A serializable view of [`GenerationOutput`], which itself derives only
/// `Debug, Clone` — going through a named view keeps the wire shape under
/// this module's control independent of the orchestrator's internal type.
#[derive(Debug, Serialize)]
pub struct GenerationOutputView {
    pub terrain_geometry: tile3d_common::Geometry,
    pub layers: Vec<LayerOutputView>,
}

#[derive(Debug, Serialize)]
pub struct LayerOutputView {
    pub label: String,
    pub geometry: tile3d_common::Geometry,
    pub skipped_count: usize,
}

impl From<&GenerationOutput> for GenerationOutputView {
    fn from(output: &GenerationOutput) -> Self {
        GenerationOutputView {
            terrain_geometry: output.terrain_geometry.clone(),
            layers: output
                .per_layer_geometries
                .iter()
                .map(|l| LayerOutputView {
                    label: l.label.clone(),
                    geometry: l.geometry.clone(),
                    skipped_count: output.skipped_counts.get(&l.label).copied().unwrap_or(0),
                })
                .collect(),
        }
    }
}

pub async fn health() -> &'static str {
    "OK"
}

/// `POST /generate`: validates the request body, then runs one
/// `Engine::generate` call with a fresh cancellation token — HTTP
/// requests here have no mid-flight cancel surface of their own, so a
/// later call with the same bbox/terrain/layers simply supersedes this
/// one via the orchestrator's debounce (§4.10).
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let input = RunInputs { bbox: request.bbox, terrain: request.terrain, layers: request.layers };
    let progress: tile3d_common::ProgressCallback = Box::new(|p: Progress| {
        tracing::debug!(stage = %p.stage, pct = p.pct, message = %p.message, "generation progress");
    });

    let output = state.engine.generate(input, progress, CancellationToken::new()).await?;
    Ok(Json(GenerateResponse { output: GenerationOutputView::from(output.as_ref()) }))
}
