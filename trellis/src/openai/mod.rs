//! OpenAI Chat Completions wire types.
//!
//! Request DTOs ([`ChatCompletionRequest`], [`ChatMessage`], [`ToolDef`]),
//! streaming chunks ([`ChatCompletionChunk`], [`write_sse_line`]), and
//! buffered responses ([`ChatCompletion`]). No HTTP dependency: the serve
//! crate maps these onto axum.

mod chunk;
mod request;
mod response;

pub use chunk::{
    write_sse_error, write_sse_line, ChatCompletionChunk, ChunkChoice, ChunkUsage, Delta,
    DeltaToolCall, DeltaToolCallFunction, SSE_DONE_LINE,
};
pub use request::{
    new_call_id, ChatCompletionRequest, ChatMessage, ContentPart, FunctionCall, FunctionDef,
    MessageContent, StreamOptions, ToolCallMsg, ToolDef,
};
pub use response::{ChatCompletion, Choice, ResponseMessage};

use std::time::{SystemTime, UNIX_EPOCH};

/// Unix timestamp in seconds for `created` fields.
pub fn created_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generates a completion id of the form `chatcmpl-<uuid>`.
pub fn new_completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}
