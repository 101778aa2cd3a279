//! Route handlers.
//!
//! Success responses wrap their payload in `{"data": ...}`; failures use
//! the `{"errors":[{"message": ...}]}` envelope. Validation failures map to
//! 400, collaborator failures to 500; the engine never runs on a rejected
//! request.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use commutewatch_core::{CoreError, EvaluationRequest};
use serde_json::{json, Value};

use crate::AppState;

/// IFTTT error envelope.
pub fn error_body(message: &str) -> Value {
    json!({ "errors": [{ "message": message }] })
}

/// Endpoint-health probe; the key check already ran.
pub async fn status() -> StatusCode {
    StatusCode::OK
}

/// Sample trigger fields for IFTTT's automated endpoint tests.
pub async fn test_setup() -> Json<Value> {
    Json(json!({
        "data": {
            "samples": {
                "triggers": {
                    "commute_threshold_reached": {
                        "threshold_duration": "15",
                        "origin_address": "123 Fake St",
                        "destination_address": "456 Work Ave",
                        "commute_window_start": "17",
                        "commute_window_end": "19"
                    }
                }
            }
        }
    }))
}

/// Trigger evaluation: window check, commute lookup, decision, event log.
pub async fn evaluate_trigger(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EvaluationRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.service.evaluate(&request).await {
        Ok(events) => Ok(Json(json!({ "data": events }))),
        Err(err) => Err(reject(err)),
    }
}

/// Idempotent unsubscribe by trigger identity.
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Path(trigger_identity): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    match state.service.unsubscribe(&trigger_identity).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(err) => Err(reject(err)),
    }
}

fn reject(err: CoreError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(error_body(&err.to_string())))
}
