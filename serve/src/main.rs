//! Gateway entry point: load env config, wire the upstream client, serve.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use serve::upstream_env::{EnvSigner, EnvTokenSource, EphemeralChatStore};
use trellis::{Gateway, GatewayConfig, HttpUpstreamClient, HttpUpstreamConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // env > .env > ~/.config/trellis/config.toml
    let _ = env_config::load_and_apply("trellis", None);

    let config = GatewayConfig::from_env();
    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let base_url = std::env::var("UPSTREAM_BASE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:9000/api/v1".to_string());
    let idle = env_config::env_usize("UPSTREAM_IDLE_TIMEOUT_SECS", 60) as u64;
    let wall = env_config::env_usize("UPSTREAM_REQUEST_TIMEOUT_SECS", 300) as u64;
    let upstream = Arc::new(HttpUpstreamClient::new(
        HttpUpstreamConfig {
            base_url,
            idle_timeout: Duration::from_secs(idle),
            request_timeout: Duration::from_secs(wall),
        },
        Arc::new(EnvTokenSource),
        Arc::new(EnvSigner),
    ));

    let gateway = Arc::new(Gateway::new(config, upstream, Arc::new(EphemeralChatStore)));
    let model_id =
        std::env::var("PROXY_MODEL").unwrap_or_else(|_| "trellis-upstream".to_string());
    let addr = std::env::var("PROXY_LISTEN_ADDR").ok();

    serve::run_serve(addr.as_deref(), gateway, model_id).await
}
