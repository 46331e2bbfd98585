//! Metrics reporting endpoints.

use axum::extract::State;
use axum::{Json, Router, routing};
use loadgen_engine::Snapshot;

use crate::endpoints::common::Accepted;
use crate::error::ApiResult;
use crate::state::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/metrics", routing::get(get_metrics))
        .route("/metrics/reset", routing::post(reset_metrics))
}

async fn get_metrics(State(state): State<ServiceState>) -> Json<Snapshot> {
    Json(state.generator.metrics())
}

async fn reset_metrics(State(state): State<ServiceState>) -> ApiResult<Json<Accepted>> {
    state.generator.reset_metrics()?;
    Ok(Json(Accepted { status: "reset" }))
}
