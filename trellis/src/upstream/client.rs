//! HTTP implementation of [`UpstreamClient`] over the upstream's SSE API.
//!
//! One POST per turn: signed query parameters from the [`RequestSigner`],
//! bearer auth from the [`TokenSource`], response negotiated as SSE and run
//! through the framer and tag splitter. Idle and wall-clock timeouts are
//! enforced here so downstream consumers only ever see a finite stream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::GatewayError;

use super::sse::SseLineFramer;
use super::splitter::ThinkTagSplitter;
use super::{RequestSigner, SendMessageOptions, StreamChunk, TokenSource, UpstreamClient};

/// Transport configuration for the upstream HTTP client.
#[derive(Debug, Clone)]
pub struct HttpUpstreamConfig {
    /// Base URL, e.g. `https://upstream.example/api/v1`.
    pub base_url: String,
    /// Abort when no chunk arrives for this long.
    pub idle_timeout: Duration,
    /// Wall-clock bound for one whole turn.
    pub request_timeout: Duration,
}

impl Default for HttpUpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            idle_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// [`UpstreamClient`] over reqwest's byte stream.
pub struct HttpUpstreamClient {
    http: reqwest::Client,
    config: HttpUpstreamConfig,
    token: Arc<dyn TokenSource>,
    signer: Arc<dyn RequestSigner>,
}

impl HttpUpstreamClient {
    pub fn new(
        config: HttpUpstreamConfig,
        token: Arc<dyn TokenSource>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            token,
            signer,
        }
    }

    async fn bearer(&self) -> Result<String, GatewayError> {
        self.token
            .load_token()
            .await?
            .ok_or_else(|| GatewayError::UpstreamStream("no upstream token available".to_string()))
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn send_message(
        &self,
        opts: SendMessageOptions,
    ) -> Result<BoxStream<'static, StreamChunk>, GatewayError> {
        let token = self.bearer().await?;
        let query = self.signer.signed_query(&opts.chat_id)?;
        let url = format!("{}/chats/{}/messages", self.config.base_url, opts.chat_id);
        let body = serde_json::json!({
            "messages": opts.messages,
            "enable_thinking": opts.enable_thinking,
            "include_history": opts.include_history,
            "parent_message_id": opts.parent_message_id,
            "features": {
                "web_search": opts.features.web_search,
                "auto_search": opts.features.auto_search,
            },
        });

        debug!(chat_id = %opts.chat_id, thinking = opts.enable_thinking, "upstream send_message");
        let response = self
            .http
            .post(&url)
            .query(&query)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamStream(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamStream(format!(
                "upstream returned {status}"
            )));
        }

        let idle = self.config.idle_timeout;
        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        let (tx, rx) = mpsc::channel::<StreamChunk>(64);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut framer = SseLineFramer::new();
            let mut splitter = ThinkTagSplitter::new();
            loop {
                let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                if remaining.is_zero() {
                    let _ = tx
                        .send(StreamChunk::Error("timeout: request deadline exceeded".into()))
                        .await;
                    return;
                }
                let next = tokio::time::timeout(idle.min(remaining), bytes.next()).await;
                match next {
                    Err(_) => {
                        let _ = tx
                            .send(StreamChunk::Error(format!(
                                "timeout: no upstream data for {}s",
                                idle.as_secs()
                            )))
                            .await;
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        let _ = tx.send(StreamChunk::Error(format!("read error: {e}"))).await;
                        return;
                    }
                    Ok(Some(Ok(chunk))) => {
                        for payload in framer.push(&chunk) {
                            match classify_payload(&payload) {
                                Payload::Text(text) => {
                                    for ev in splitter.push(&text) {
                                        if tx.send(ev.into()).await.is_err() {
                                            return; // client disconnected
                                        }
                                    }
                                }
                                Payload::Done => {
                                    for ev in splitter.finalize() {
                                        let _ = tx.send(ev.into()).await;
                                    }
                                    let _ = tx.send(StreamChunk::Done).await;
                                    return;
                                }
                                Payload::Error(msg) => {
                                    warn!(error = %msg, "upstream error payload");
                                    let _ = tx.send(StreamChunk::Error(msg)).await;
                                    return;
                                }
                                Payload::Skip => {}
                            }
                        }
                    }
                }
            }
            // Stream closed without a DONE marker: drain residual state.
            if let Some(payload) = framer.flush() {
                if let Payload::Text(text) = classify_payload(&payload) {
                    for ev in splitter.push(&text) {
                        let _ = tx.send(ev.into()).await;
                    }
                }
            }
            for ev in splitter.finalize() {
                let _ = tx.send(ev.into()).await;
            }
            let _ = tx.send(StreamChunk::Done).await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn get_current_message_id(
        &self,
        chat_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        let token = self.bearer().await?;
        let url = format!("{}/chats/{}", self.config.base_url, chat_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamStream(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamStream(format!("bad chat payload: {e}")))?;
        Ok(value
            .get("current_message_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()))
    }
}

enum Payload {
    Text(String),
    Done,
    Error(String),
    Skip,
}

/// Maps one SSE `data:` payload to stream text.
///
/// The upstream frames chunks as JSON objects carrying the text under
/// `data` or `content`; error payloads carry `error`. Bare text payloads
/// (and anything unparseable) pass through as text.
fn classify_payload(payload: &str) -> Payload {
    if payload.is_empty() {
        return Payload::Skip;
    }
    if payload == "[DONE]" {
        return Payload::Done;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(payload) else {
        return Payload::Text(payload.to_string());
    };
    let Some(obj) = value.as_object() else {
        return Payload::Text(payload.to_string());
    };
    if let Some(err) = obj.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or(payload);
        return Payload::Error(msg.to_string());
    }
    for key in ["data", "content", "text"] {
        if let Some(text) = obj.get(key).and_then(|v| v.as_str()) {
            return Payload::Text(text.to_string());
        }
    }
    Payload::Skip
}
