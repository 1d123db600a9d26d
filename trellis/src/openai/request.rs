//! OpenAI-compatible chat completion request DTOs.
//!
//! Used by the pipeline to parse incoming request bodies. Field names match
//! the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//! Message `content` can be a string, an array of parts (multimodal), or an
//! object carrying `text`; we accept all three.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat completion request body (OpenAI-compatible).
///
/// Parsed from the POST body for `/v1/chat/completions`. The pipeline routes
/// to the planner when `tools` is non-empty, else to the fallback flows.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model name. Echoed in responses; the actual model is upstream-configured.
    pub model: String,
    /// Full conversation: system, user, assistant, and tool messages.
    pub messages: Vec<ChatMessage>,
    /// Declared tools. Presence selects the planner path.
    #[serde(default)]
    pub tools: Option<Vec<ToolDef>>,
    /// When true, response is streamed as SSE.
    #[serde(default)]
    pub stream: bool,
    /// Optional stream options (e.g. include_usage in the final chunk).
    #[serde(default)]
    pub stream_options: Option<StreamOptions>,
    /// Sampling temperature; forwarded upstream when supported, otherwise ignored.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// Client tool_choice; `"none"` suppresses the planner path.
    #[serde(default)]
    pub tool_choice: Option<Value>,
}

impl ChatCompletionRequest {
    /// True when at least one tool is declared and tool_choice is not `"none"`.
    pub fn tools_in_play(&self) -> bool {
        let declared = self.tools.as_ref().map(|t| !t.is_empty()).unwrap_or(false);
        let suppressed = self
            .tool_choice
            .as_ref()
            .and_then(|v| v.as_str())
            .map(|s| s.eq_ignore_ascii_case("none"))
            .unwrap_or(false);
        declared && !suppressed
    }

    /// Whether the final streamed chunk should carry a usage object.
    pub fn include_usage(&self) -> bool {
        self.stream_options
            .as_ref()
            .map(|o| o.include_usage)
            .unwrap_or(false)
    }

    /// Content of the last `role == "user"` message, flattened to text.
    pub fn last_user_text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role.eq_ignore_ascii_case("user"))
            .and_then(|m| m.content.as_ref().map(|c| c.as_text()))
            .unwrap_or_default()
    }
}

/// A single message in the chat request.
///
/// Matches the OpenAI message shape. Assistant messages may carry
/// `tool_calls`; tool messages carry `tool_call_id` tying the result back to
/// an emitted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant", or "tool".
    pub role: String,
    /// Message content. Use [`MessageContent::as_text`] to get text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// For `role == "tool"`: the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For assistant messages: tool calls emitted in that turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMsg>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self::plain("system", text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::plain("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::plain("assistant", text)
    }

    fn plain(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(text.into())),
            tool_call_id: None,
            tool_calls: None,
            name: None,
        }
    }

    /// Text projection of this message's content; empty when content is null.
    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| c.as_text())
            .unwrap_or_default()
    }
}

/// Message content: a plain string, an array of parts, or an object with `text`.
///
/// Deserializes from `"hello"`, `[{"type":"text","text":"hello"}, ...]`, or
/// `{"text":"hello"}` so that clients can send any of the observed shapes
/// without "invalid type" errors. [`as_text`](MessageContent::as_text) is the
/// single deterministic projection: parts are flattened in order, non-text
/// parts skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Object { text: Option<String> },
}

impl MessageContent {
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(""),
            MessageContent::Object { text } => text.clone().unwrap_or_default(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

/// One part of a multimodal content array (OpenAI format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part type, e.g. "text", "image_url". Non-text parts are skipped on extraction.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub part_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A tool call as it appears in messages and buffered responses.
///
/// `function.arguments` is always a serialized JSON object, never the empty
/// string. The transport-only `index` lives on the streaming delta type
/// instead ([`DeltaToolCall`](crate::openai::DeltaToolCall)) and never
/// appears here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallMsg {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCallMsg {
    /// Builds a function call with a fresh `call_<8hex>` id.
    pub fn function(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: new_call_id(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Generates a tool-call id of the form `call_<8hex>`.
pub fn new_call_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("call_{}", &id[..8])
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// A declared tool (OpenAI `{"type":"function","function":{...}}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema for arguments; `properties` keys drive alias repair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Stream options for chat completion (OpenAI stream_options).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamOptions {
    /// If true, include usage in the final stream chunk.
    #[serde(default)]
    pub include_usage: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_accepts_string_parts_and_object() {
        let s: MessageContent = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(s.as_text(), "hello");

        let parts: MessageContent = serde_json::from_str(
            r#"[{"type":"text","text":"a"},{"type":"image_url"},{"type":"text","text":"b"}]"#,
        )
        .unwrap();
        assert_eq!(parts.as_text(), "ab");

        let obj: MessageContent = serde_json::from_str(r#"{"text":"inner"}"#).unwrap();
        assert_eq!(obj.as_text(), "inner");
    }

    #[test]
    fn tools_in_play_respects_tool_choice_none() {
        let mut req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [{"type": "function", "function": {"name": "read"}}]
        }))
        .unwrap();
        assert!(req.tools_in_play());
        req.tool_choice = Some(serde_json::json!("none"));
        assert!(!req.tools_in_play());
    }

    #[test]
    fn last_user_text_picks_latest_user_message() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(req.last_user_text(), "second");
    }

    #[test]
    fn new_call_id_shape() {
        let id = new_call_id();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), "call_".len() + 8);
        assert!(id["call_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tool_message_round_trips() {
        let json = serde_json::json!({
            "role": "tool",
            "tool_call_id": "call_ab12cd34",
            "content": "ok"
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_ab12cd34"));
        assert_eq!(msg.text(), "ok");
    }
}
