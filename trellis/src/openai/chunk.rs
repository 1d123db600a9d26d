//! Streaming response chunk DTOs (`chat.completion.chunk`) and SSE line writer.
//!
//! Matches [OpenAI streaming](https://platform.openai.com/docs/api-reference/chat-streaming).
//! Thinking text rides on `delta.reasoning_content`; `delta.tool_calls`
//! entries carry the transport-only `index` field that buffered responses
//! must not contain.

use serde::Serialize;

/// One streamed chunk of a chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

impl ChatCompletionChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental delta for one choice. All fields optional; an empty delta is
/// the terminal chunk's payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Out-of-band upstream reasoning ("thinking") text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

/// A tool call inside a streaming delta. `index` is transport-only.
#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCall {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<DeltaToolCallFunction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaToolCallFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Usage for the final chunk (when `stream_options.include_usage`).
#[derive(Debug, Clone, Serialize)]
pub struct ChunkUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Serializes a chunk to a single SSE line: `data: <JSON>\n\n`.
pub fn write_sse_line(chunk: &ChatCompletionChunk) -> String {
    let json = serde_json::to_string(chunk).expect("chunk serialization is infallible");
    format!("data: {json}\n\n")
}

/// The stream terminator the OpenAI protocol requires after the last chunk.
pub const SSE_DONE_LINE: &str = "data: [DONE]\n\n";

/// Serializes an error event for streaming responses (HTTP status stays 200).
pub fn write_sse_error(message: &str, kind: &str) -> String {
    let json = serde_json::json!({
        "error": { "message": message, "type": kind }
    });
    format!("data: {json}\n\n")
}
