// =============================================================================
// Tile3D Backend - Error Types
// =============================================================================

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tile3d_common::Error as EngineError;

/// API error type: wraps the engine's `Error` taxonomy and maps each
/// variant to an HTTP status, mirroring the exit-code table in spirit
/// (4xx for caller mistakes, 5xx for everything the engine itself failed
/// at).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request body: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Engine(EngineError::InvalidInput { reason }) => (StatusCode::BAD_REQUEST, reason.clone()),
            ApiError::Engine(EngineError::NetworkTimeout { .. }) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Engine(EngineError::TerrainProcessingFailed { .. }) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ApiError::Engine(EngineError::LayerProcessingFailed { .. }) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ApiError::Engine(EngineError::Cancelled) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::Engine(EngineError::InternalError { .. }) => {
                tracing::error!("internal error: {self}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
