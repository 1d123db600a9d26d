//! Scripted upstream for tests: fixed chunk sequences, recorded calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;

use crate::error::GatewayError;

use super::{SendMessageOptions, StreamChunk, UpstreamClient};

/// An [`UpstreamClient`] that replays scripted chunk sequences in order.
///
/// Each `send_message` call pops the next script; when scripts run out, a
/// bare `Done` stream is returned. Received options are recorded for
/// assertions.
pub struct MockUpstream {
    scripts: Mutex<VecDeque<Vec<StreamChunk>>>,
    calls: Mutex<Vec<SendMessageOptions>>,
}

impl MockUpstream {
    /// One turn that streams `text` as a single content chunk.
    pub fn with_text(text: &str) -> Self {
        Self::with_scripts(vec![Self::text_turn(text)])
    }

    pub fn with_scripts(scripts: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Builds the chunk sequence for a plain-text turn.
    pub fn text_turn(text: &str) -> Vec<StreamChunk> {
        vec![StreamChunk::Content(text.to_string()), StreamChunk::Done]
    }

    /// Options received so far, in call order.
    pub fn recorded_calls(&self) -> Vec<SendMessageOptions> {
        self.calls.lock().expect("mock lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock").len()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn send_message(
        &self,
        opts: SendMessageOptions,
    ) -> Result<BoxStream<'static, StreamChunk>, GatewayError> {
        self.calls.lock().expect("mock lock").push(opts);
        let chunks = self
            .scripts
            .lock()
            .expect("mock lock")
            .pop_front()
            .unwrap_or_else(|| vec![StreamChunk::Done]);
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn get_current_message_id(
        &self,
        _chat_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
}
