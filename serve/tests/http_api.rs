//! End-to-end HTTP tests: bind on an ephemeral port, drive the axum app
//! with a real client against a scripted upstream.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use trellis::{
    CompactionConfig, EphemeralChatStore, Gateway, GatewayConfig, MockUpstream,
};

async fn spawn_server(mock: Arc<MockUpstream>, config: GatewayConfig) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let gateway = Arc::new(Gateway::new(config, mock, Arc::new(EphemeralChatStore)));
    tokio::spawn(async move {
        let _ = serve::run_serve_on_listener(listener, gateway, "test-model".to_string()).await;
    });
    format!("http://{addr}")
}

/// **Scenario**: plain non-streaming completion over HTTP.
#[tokio::test]
async fn chat_completion_over_http() {
    let base = spawn_server(
        Arc::new(MockUpstream::with_text("Hello.")),
        GatewayConfig::default(),
    )
    .await;
    let response = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({"model": "m", "messages": [{"role": "user", "content": "Say hello"}]}))
        .send()
        .await
        .expect("request");
    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello.");
}

/// **Scenario**: streaming completion yields SSE events ending in [DONE].
#[tokio::test]
async fn streaming_completion_over_http() {
    let base = spawn_server(
        Arc::new(MockUpstream::with_text("Hi there")),
        GatewayConfig::default(),
    )
    .await;
    let response = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.expect("chunk"));
    }
    let text = String::from_utf8(body).expect("utf8");
    assert!(text.contains(r#""content":"Hi there""#));
    assert!(text.trim_end().ends_with("data: [DONE]"));
}

/// **Scenario**: malformed body is a 400 with an OpenAI-style error object.
#[tokio::test]
async fn malformed_body_is_bad_request() {
    let base = spawn_server(
        Arc::new(MockUpstream::with_text("unused")),
        GatewayConfig::default(),
    )
    .await;
    let response = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({"model": "m"}))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

/// **Scenario**: compaction surfaces `X-Proxy-Context-*` headers.
#[tokio::test]
async fn compaction_headers_present_when_dropping() {
    let config = GatewayConfig {
        compaction: CompactionConfig {
            max_tokens: 300,
            reserve_tokens: 20,
            safety_margin: 10,
            recent_messages: 2,
            min_recent_messages: 1,
            ..CompactionConfig::default()
        },
        ..GatewayConfig::default()
    };
    let base = spawn_server(Arc::new(MockUpstream::with_text("ok")), config).await;

    let mut messages = Vec::new();
    for i in 0..30 {
        messages.push(json!({"role": "user", "content": format!("older message {i} {}", "x".repeat(60))}));
    }
    messages.push(json!({"role": "user", "content": "latest"}));
    let response = reqwest::Client::new()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({"model": "m", "messages": messages}))
        .send()
        .await
        .expect("request");
    assert!(response.status().is_success());
    let dropped: usize = response
        .headers()
        .get("x-proxy-context-dropped")
        .expect("dropped header")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(dropped > 0);
    assert!(response.headers().get("x-proxy-context-used").is_some());
    assert!(response.headers().get("x-proxy-context-total").is_some());
}

/// **Scenario**: `/v1/models` lists the configured model; `/healthz` is 200.
#[tokio::test]
async fn models_and_health_endpoints() {
    let base = spawn_server(
        Arc::new(MockUpstream::with_text("unused")),
        GatewayConfig::default(),
    )
    .await;
    let client = reqwest::Client::new();

    let models: Value = client
        .get(format!("{base}/v1/models"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(models["object"], "list");
    assert_eq!(models["data"][0]["id"], "test-model");

    let health = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .expect("request");
    assert_eq!(health.status(), 200);
}
