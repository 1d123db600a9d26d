//! `GET /v1/models` and the liveness probe.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::app::AppState;

/// Single-model OpenAI model list so clients can discover the gateway.
pub(crate) async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "id": state.model_id,
            "object": "model",
            "owned_by": "trellis",
        }]
    }))
}

pub(crate) async fn healthz() -> StatusCode {
    StatusCode::OK
}
