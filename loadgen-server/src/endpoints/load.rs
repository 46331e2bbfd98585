//! Lifecycle and configuration endpoints for the load generator.

use axum::extract::State;
use axum::{Json, Router, routing};
use loadgen_engine::{Snapshot, WorkloadConfig};
use serde::Serialize;

use crate::endpoints::common::Accepted;
use crate::error::ApiResult;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/load/start", routing::post(start))
        .route("/load/stop", routing::post(stop))
        .route("/load/config", routing::get(get_config).post(update_config))
        .route("/load/status", routing::get(status))
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    running: bool,
    config: WorkloadConfig,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    running: bool,
    metrics: Snapshot,
}

async fn start(State(state): State<ServiceState>) -> ApiResult<Json<Accepted>> {
    state.generator.start()?;
    Ok(Json(Accepted { status: "started" }))
}

async fn stop(State(state): State<ServiceState>) -> ApiResult<Json<Accepted>> {
    state.generator.stop().await?;
    Ok(Json(Accepted { status: "stopped" }))
}

async fn get_config(State(state): State<ServiceState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        running: state.generator.is_running(),
        config: state.generator.config(),
    })
}

async fn update_config(
    State(state): State<ServiceState>,
    Json(config): Json<WorkloadConfig>,
) -> ApiResult<Json<WorkloadConfig>> {
    let applied = state.generator.update_config(config)?;
    tracing::info!(?applied, "workload configuration updated");
    Ok(Json(applied))
}

async fn status(State(state): State<ServiceState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.generator.is_running(),
        metrics: state.generator.metrics(),
    })
}
