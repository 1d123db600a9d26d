//! List inference: "list files", "ls", "directory contents".

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::safety::{is_sensitive_path, is_unsafe_path_input};
use crate::tools::{pick_arg_key, ToolRegistry};

use super::InferredCall;

static LIST_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(list\s+(?:the\s+)?(?:all\s+)?files|list\s+(?:the\s+)?director(?:y|ies)|director(?:y|ies)\s+contents|folder\s+contents|what\s+files|show\s+(?:the\s+)?files|ls\b)",
    )
    .expect("list trigger")
});

static IN_DIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:in|under|inside|of)\s+[`"']?([\w\-./]+)[`"']?"#).expect("in-dir regex")
});

pub fn infer_list(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    if !LIST_TRIGGER.is_match(user_text) {
        return None;
    }
    let dir = IN_DIR
        .captures(user_text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .unwrap_or_else(|| ".".to_string());
    if dir != "." && (is_unsafe_path_input(&dir) || is_sensitive_path(&dir)) {
        return None;
    }

    if let Some(info) = registry.find("glob") {
        let pattern = if dir == "." {
            "**/*".to_string()
        } else {
            format!("{dir}/**/*")
        };
        let key = pick_arg_key(info, &["pattern", "glob"])?;
        let mut args = Map::new();
        args.insert(key, Value::String(pattern));
        return Some(InferredCall {
            name: info.name().to_string(),
            args: Value::Object(args),
        });
    }

    let info = registry.find("list").or_else(|| registry.find("ls"))?;
    let key = pick_arg_key(info, &["path", "dir", "directory"])?;
    Some(InferredCall {
        name: info.name().to_string(),
        args: json!({ key: dir }),
    })
}
