//! Shared-secret service key check.
//!
//! Every inbound request carries the `IFTTT-Service-Key` header; mismatch
//! is rejected before any handler runs.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::routes::error_body;
use crate::AppState;

pub const SERVICE_KEY_HEADER: &str = "IFTTT-Service-Key";

pub async fn require_service_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let supplied = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if supplied != Some(state.service_key.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(error_body("Channel/Service key is not correct")),
        )
            .into_response();
    }

    next.run(request).await
}
