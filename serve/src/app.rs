//! Axum app: state and router.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use trellis::Gateway;

use super::completions::chat_completions;
use super::models::{healthz, list_models};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) gateway: Arc<Gateway>,
    /// Model id echoed by `/v1/models` and used as response default.
    pub(crate) model_id: String,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route("/healthz", get(healthz))
        .with_state(state)
}
