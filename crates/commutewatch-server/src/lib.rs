//! IFTTT-compatible HTTP surface for Commutewatch.
//!
//! Routes live under `/ifttt/v1/`; every one of them is behind the shared
//! service-key check. The binary in `main.rs` wires configuration, storage
//! and the sweep task around the router built here.

pub mod auth;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use commutewatch_core::TriggerService;

/// Shared handler state.
pub struct AppState {
    pub service: TriggerService,
    pub service_key: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ifttt/v1/status", get(routes::status))
        .route("/ifttt/v1/test/setup", post(routes::test_setup))
        .route(
            "/ifttt/v1/triggers/commute_threshold_reached",
            post(routes::evaluate_trigger),
        )
        .route(
            "/ifttt/v1/triggers/commute_threshold_reached/trigger_identity/:trigger_identity",
            delete(routes::unsubscribe),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_service_key,
        ))
        .with_state(state)
}
