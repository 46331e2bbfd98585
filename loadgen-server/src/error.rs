//! Error types for the HTTP API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loadgen_engine::Error as EngineError;
use thiserror::Error;

/// Error type for API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Errors from the engine's lifecycle or configuration surface.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Engine(EngineError::AlreadyRunning)
            | ApiError::Engine(EngineError::NotRunning)
            | ApiError::Engine(EngineError::InvalidState(_)) => StatusCode::CONFLICT,
            ApiError::Engine(EngineError::Config(err)) => {
                tracing::debug!("rejected configuration: {err}");
                StatusCode::BAD_REQUEST
            }
        };

        (status, self.to_string()).into_response()
    }
}
