// =============================================================================
// Tile3D Backend - API Server Entry Point
// =============================================================================
// Table of Contents:
// 1. Imports
// 2. Main Entry Point
// 3. Router Setup
// =============================================================================

mod config;
mod error;
mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tile3d_common::EngineConfig;
use tile3d_orchestrator::engine::{Engine, TileEndpoints};

use crate::config::Config;
use crate::routes::AppState;

// -----------------------------------------------------------------------------
// 2. Main Entry Point
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tile3d_common::logging::init();

    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("crates/backend/.env");
    }

    let config = Config::from_env()?;
    let bind_addr = config.bind_address.clone();

    let engine_config = match &config.engine_config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let endpoints = TileEndpoints {
        raster_url_template: config.raster_url_template.clone(),
        vector_url_template: config.vector_url_template.clone(),
    };
    let engine = Arc::new(Engine::new(engine_config, endpoints));

    let state = AppState { engine };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tile3d-backend listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

// -----------------------------------------------------------------------------
// 3. Router Setup
// -----------------------------------------------------------------------------

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/generate", post(routes::generate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
