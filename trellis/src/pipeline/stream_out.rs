//! Emits OpenAI `chat.completion.chunk` SSE lines into an mpsc sink.
//!
//! The serve crate reads the receiver as the response body. Shapes are
//! fixed: a tool-calls turn is exactly two events then `[DONE]`; content
//! turns send the role on the first delta and close with an empty delta
//! carrying `finish_reason: "stop"`.

use tokio::sync::mpsc;

use crate::openai::{
    write_sse_error, write_sse_line, ChatCompletionChunk, ChunkChoice, ChunkUsage, Delta,
    DeltaToolCall, DeltaToolCallFunction, ToolCallMsg, SSE_DONE_LINE,
};

pub struct SseEmitter {
    id: String,
    model: String,
    created: u64,
    include_usage: bool,
    usage: Option<ChunkUsage>,
    sent_role: bool,
    sink: mpsc::Sender<String>,
}

impl SseEmitter {
    pub fn new(
        id: String,
        model: String,
        created: u64,
        include_usage: bool,
        sink: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            model,
            created,
            include_usage,
            usage: None,
            sent_role: false,
            sink,
        }
    }

    /// Usage for the final chunk; only attached when the request asked.
    pub fn set_usage(&mut self, usage: ChunkUsage) {
        self.usage = Some(usage);
    }

    /// True once the client disconnected; producers should stop.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<&str>, usage: Option<ChunkUsage>) -> String {
        write_sse_line(&ChatCompletionChunk {
            id: self.id.clone(),
            object: ChatCompletionChunk::OBJECT,
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(String::from),
            }],
            usage,
        })
    }

    async fn send(&self, line: String) {
        // A closed sink means the client disconnected; nothing to do.
        let _ = self.sink.send(line).await;
    }

    fn role(&mut self) -> Option<String> {
        if self.sent_role {
            None
        } else {
            self.sent_role = true;
            Some("assistant".to_string())
        }
    }

    pub async fn content(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let delta = Delta {
            role: self.role(),
            content: Some(text.to_string()),
            ..Default::default()
        };
        self.send(self.chunk(delta, None, None)).await;
    }

    /// Thinking rides out-of-band as `reasoning_content`.
    pub async fn reasoning(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let delta = Delta {
            role: self.role(),
            reasoning_content: Some(text.to_string()),
            ..Default::default()
        };
        self.send(self.chunk(delta, None, None)).await;
    }

    /// Emits the two-event tool-calls shape and terminates the stream.
    pub async fn tool_calls(&mut self, calls: &[ToolCallMsg]) {
        let deltas: Vec<DeltaToolCall> = calls
            .iter()
            .enumerate()
            .map(|(i, c)| DeltaToolCall {
                index: i as u32,
                id: Some(c.id.clone()),
                call_type: Some(c.call_type.clone()),
                function: Some(DeltaToolCallFunction {
                    name: Some(c.function.name.clone()),
                    arguments: Some(c.function.arguments.clone()),
                }),
            })
            .collect();
        self.sent_role = true;
        let first = Delta {
            role: Some("assistant".to_string()),
            tool_calls: Some(deltas),
            ..Default::default()
        };
        self.send(self.chunk(first, None, None)).await;
        let usage = self.take_usage();
        self.send(self.chunk(Delta::default(), Some("tool_calls"), usage))
            .await;
        self.send(SSE_DONE_LINE.to_string()).await;
    }

    /// Terminal stop chunk plus `[DONE]`.
    pub async fn finish_stop(&mut self) {
        let usage = self.take_usage();
        self.send(self.chunk(Delta::default(), Some("stop"), usage))
            .await;
        self.send(SSE_DONE_LINE.to_string()).await;
    }

    /// Mid-stream failure: error event, then the terminator. HTTP status
    /// stays whatever was already sent (200).
    pub async fn error(&mut self, message: &str, kind: &str) {
        self.send(write_sse_error(message, kind)).await;
        self.send(SSE_DONE_LINE.to_string()).await;
    }

    fn take_usage(&mut self) -> Option<ChunkUsage> {
        if self.include_usage {
            self.usage.take()
        } else {
            None
        }
    }
}
