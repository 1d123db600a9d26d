//! Upstream client abstraction and the SSE parsing stack behind it.
//!
//! The upstream is a proprietary conversational backend reached over one
//! HTTP POST per turn, streaming SSE. This module owns the transport-side
//! parsing chain — [`SseLineFramer`] → [`ThinkTagSplitter`] →
//! [`ThinkingDedupFilter`] — and the narrow traits the core consumes:
//! [`UpstreamClient`], [`ChatStore`], [`TokenSource`], [`RequestSigner`].
//! Signature-parameter construction is opaque to the core and lives behind
//! [`RequestSigner`].

pub mod client;
mod dedup;
mod mock;
mod sse;
mod splitter;

pub use client::{HttpUpstreamClient, HttpUpstreamConfig};
pub use dedup::ThinkingDedupFilter;
pub use mock::MockUpstream;
pub use sse::SseLineFramer;
pub use splitter::{SplitEvent, ThinkTagSplitter};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::GatewayError;

/// One event from the upstream stream.
///
/// `Error` carries a human-readable message; a message with the `timeout:`
/// prefix is mapped to [`GatewayError::UpstreamTimeout`] by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Thinking(String),
    ThinkingEnd,
    Content(String),
    Done,
    Error(String),
}

impl StreamChunk {
    /// Converts an `Error` chunk into the matching gateway error.
    pub fn to_error(message: &str) -> GatewayError {
        match message.strip_prefix("timeout:") {
            Some(rest) => GatewayError::UpstreamTimeout(rest.trim().to_string()),
            None => GatewayError::UpstreamStream(message.to_string()),
        }
    }
}

impl From<SplitEvent> for StreamChunk {
    fn from(event: SplitEvent) -> Self {
        match event {
            SplitEvent::Thinking(t) => StreamChunk::Thinking(t),
            SplitEvent::ThinkingEnd => StreamChunk::ThinkingEnd,
            SplitEvent::Content(c) => StreamChunk::Content(c),
        }
    }
}

/// A message as the upstream accepts it: flat role + text.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: String,
}

/// Per-turn feature switches forwarded to the upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpstreamFeatures {
    pub web_search: bool,
    pub auto_search: bool,
}

/// Options for one upstream turn.
#[derive(Debug, Clone)]
pub struct SendMessageOptions {
    pub chat_id: String,
    pub messages: Vec<UpstreamMessage>,
    pub enable_thinking: bool,
    /// When false, the upstream replays no server-side history and
    /// `parent_message_id` selects the branch point.
    pub include_history: bool,
    pub parent_message_id: Option<String>,
    pub features: UpstreamFeatures,
}

/// Streaming message transport to the upstream.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Sends one turn and returns the chunk stream. The stream is finite:
    /// it ends with `Done` or `Error`.
    async fn send_message(
        &self,
        opts: SendMessageOptions,
    ) -> Result<BoxStream<'static, StreamChunk>, GatewayError>;

    /// Returns the branch-point message id for a new turn when
    /// `include_history` is false.
    async fn get_current_message_id(
        &self,
        chat_id: &str,
    ) -> Result<Option<String>, GatewayError>;
}

/// Creates or resolves the upstream chat a request runs in.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn ensure_chat(&self, title: &str, model: &str) -> Result<String, GatewayError>;
}

/// Supplies the upstream auth token. Storage and JWT decoding are external.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn load_token(&self) -> Result<Option<String>, GatewayError>;
}

/// Builds the signed query parameters the upstream requires on each POST.
/// The parameter scheme is proprietary and entirely opaque to the core.
pub trait RequestSigner: Send + Sync {
    fn signed_query(&self, chat_id: &str) -> Result<Vec<(String, String)>, GatewayError>;
}

/// A [`ChatStore`] that mints a fresh uuid per chat. Used when the real
/// chat-listing RPCs are unavailable and by tests.
#[derive(Debug, Default)]
pub struct EphemeralChatStore;

#[async_trait]
impl ChatStore for EphemeralChatStore {
    async fn ensure_chat(&self, _title: &str, _model: &str) -> Result<String, GatewayError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Applies the dedup filter at [`StreamChunk`] granularity.
///
/// `Done` flushes the filter first so buffered content is never lost;
/// `Error` passes through untouched.
#[derive(Debug, Default)]
pub struct ChunkFilter {
    inner: ThinkingDedupFilter,
}

impl ChunkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: StreamChunk) -> Vec<StreamChunk> {
        match chunk {
            StreamChunk::Thinking(t) => self.map(SplitEvent::Thinking(t)),
            StreamChunk::ThinkingEnd => self.map(SplitEvent::ThinkingEnd),
            StreamChunk::Content(c) => self.map(SplitEvent::Content(c)),
            StreamChunk::Done => {
                let mut out: Vec<StreamChunk> = self
                    .inner
                    .finalize()
                    .into_iter()
                    .map(StreamChunk::from)
                    .collect();
                out.push(StreamChunk::Done);
                out
            }
            StreamChunk::Error(e) => vec![StreamChunk::Error(e)],
        }
    }

    fn map(&mut self, event: SplitEvent) -> Vec<StreamChunk> {
        self.inner
            .push(event)
            .into_iter()
            .map(StreamChunk::from)
            .collect()
    }
}

/// Text collected from a finished upstream turn.
#[derive(Debug, Clone, Default)]
pub struct CollectedTurn {
    pub thinking: String,
    pub content: String,
}

impl CollectedTurn {
    /// Full text for the planner parser: thinking re-wrapped in `<think>`
    /// tags ahead of content, matching what a non-streaming read would see.
    pub fn planner_text(&self) -> String {
        if self.thinking.is_empty() {
            self.content.clone()
        } else {
            format!("<think>{}</think>{}", self.thinking, self.content)
        }
    }
}

/// Drains an upstream stream through the dedup filter into buffered text.
pub async fn collect_turn(
    mut stream: BoxStream<'_, StreamChunk>,
) -> Result<CollectedTurn, GatewayError> {
    use futures_util::StreamExt;

    let mut filter = ChunkFilter::new();
    let mut turn = CollectedTurn::default();
    while let Some(chunk) = stream.next().await {
        for c in filter.push(chunk) {
            match c {
                StreamChunk::Thinking(t) => turn.thinking.push_str(&t),
                StreamChunk::Content(c) => turn.content.push_str(&c),
                StreamChunk::ThinkingEnd => {}
                StreamChunk::Done => return Ok(turn),
                StreamChunk::Error(e) => return Err(StreamChunk::to_error(&e)),
            }
        }
    }
    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn collect_turn_buffers_thinking_and_content() {
        let chunks = vec![
            StreamChunk::Thinking("plan".into()),
            StreamChunk::ThinkingEnd,
            StreamChunk::Content("Hello.".into()),
            StreamChunk::Done,
        ];
        let stream = futures::stream::iter(chunks).boxed();
        let turn = collect_turn(stream).await.unwrap();
        assert_eq!(turn.thinking, "plan");
        assert_eq!(turn.content, "Hello.");
        assert_eq!(turn.planner_text(), "<think>plan</think>Hello.");
    }

    #[tokio::test]
    async fn collect_turn_maps_error_chunks() {
        let stream =
            futures::stream::iter(vec![StreamChunk::Error("boom".into())]).boxed();
        let err = collect_turn(stream).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_stream_error");

        let stream =
            futures::stream::iter(vec![StreamChunk::Error("timeout: idle 30s".into())]).boxed();
        let err = collect_turn(stream).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_timeout");
    }

    #[tokio::test]
    async fn chunk_filter_flushes_on_done() {
        let mut f = ChunkFilter::new();
        let mut out = Vec::new();
        out.extend(f.push(StreamChunk::Thinking("the full plan".into())));
        out.extend(f.push(StreamChunk::ThinkingEnd));
        // Prefix of thinking: held back until Done flushes it.
        out.extend(f.push(StreamChunk::Content("the full".into())));
        assert!(!out.contains(&StreamChunk::Content("the full".into())));
        out.extend(f.push(StreamChunk::Done));
        assert!(out.contains(&StreamChunk::Content("the full".into())));
        assert_eq!(out.last(), Some(&StreamChunk::Done));
    }
}
