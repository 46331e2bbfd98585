//! Contains all HTTP endpoint handlers.
//!
//! Use [`routes`] to create a router with all endpoints.

use axum::Router;

use crate::state::ServiceState;

mod common;
mod health;
mod load;
mod metrics;

/// Creates the router for the complete API surface.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(health::router())
        .merge(load::router())
        .merge(metrics::router())
}
