//! Buffered (non-streaming) chat completion response DTOs.

use serde::Serialize;

use super::chunk::ChunkUsage;
use super::request::ToolCallMsg;

/// A complete `chat.completion` object with one choice.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

impl ChatCompletion {
    pub const OBJECT: &'static str = "chat.completion";

    /// Builds a single-choice content response with `finish_reason: "stop"`.
    pub fn content(id: String, created: u64, model: String, text: String) -> Self {
        Self {
            id,
            object: Self::OBJECT,
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content: Some(text),
                    tool_calls: None,
                },
                finish_reason: "stop".to_string(),
            }],
            usage: None,
        }
    }

    /// Builds a single-choice tool-calls response with
    /// `finish_reason: "tool_calls"`. The calls carry no transport `index`.
    pub fn tool_calls(id: String, created: u64, model: String, calls: Vec<ToolCallMsg>) -> Self {
        Self {
            id,
            object: Self::OBJECT,
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content: None,
                    tool_calls: Some(calls),
                },
                finish_reason: "tool_calls".to_string(),
            }],
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMsg>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_response_shape() {
        let r = ChatCompletion::content("id1".into(), 1, "m".into(), "Hello.".into());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["object"], "chat.completion");
        assert_eq!(v["choices"][0]["message"]["content"], "Hello.");
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
    }

    #[test]
    fn tool_calls_response_has_no_index_field() {
        let call = ToolCallMsg::function("read", r#"{"path":"a"}"#);
        let r = ChatCompletion::tool_calls("id2".into(), 1, "m".into(), vec![call]);
        let v = serde_json::to_value(&r).unwrap();
        let tc = &v["choices"][0]["message"]["tool_calls"][0];
        assert!(tc.get("index").is_none(), "index is transport-only");
        assert_eq!(tc["type"], "function");
        assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
    }
}
