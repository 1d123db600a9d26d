//! HTTP server for the Trellis gateway (axum).
//!
//! Listens on 127.0.0.1:8080 by default and exposes
//! `POST /v1/chat/completions`, `GET /v1/models`, and `GET /healthz`.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod completions;
mod models;
pub mod upstream_env;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use trellis::Gateway;

use app::{router, AppState};

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Runs the server on an existing listener. Used by tests (bind to
/// 127.0.0.1:0 then pass the listener).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    model_id: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("gateway listening on http://{addr}");
    let state = AppState { gateway, model_id };
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Runs the server. Listens on `addr` (default 127.0.0.1:8080).
pub async fn run_serve(
    addr: Option<&str>,
    gateway: Arc<Gateway>,
    model_id: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_HTTP_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, gateway, model_id).await
}
