//! Write inference: narrow "create file X with content Y" patterns.
//!
//! Only unambiguous phrasings fire; anything conversational falls through
//! to the planner.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::safety::{is_sensitive_path, is_unsafe_path_input};
use crate::tools::{pick_arg_key, ToolRegistry};

use super::InferredCall;

static CREATE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)\bcreate\s+(?:a\s+|new\s+)*file\s+(?:named\s+|called\s+)?[`"']?([\w\-./]+)[`"']?(?:\s+with\s+(?:the\s+)?(?:content|contents|text)s?\s*:?\s*(.+))?$"#,
    )
    .expect("create-file regex")
});

static WRITE_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bwrite\s+(.+?)\s+to\s+(?:the\s+)?(?:file\s+)?[`"']?([\w\-./]+)[`"']?\s*$"#)
        .expect("write-to regex")
});

static SAVE_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)\bsave\s+[`"']?([\w\-./]+)[`"']?\s+(?:with\s+)?(?:content|contents)s?\s*:?\s*(.+)$"#,
    )
    .expect("save regex")
});

fn unquote(text: &str) -> String {
    let t = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('`', '`')] {
        if t.len() >= 2 && t.starts_with(open) && t.ends_with(close) {
            return t[1..t.len() - 1].to_string();
        }
    }
    t.to_string()
}

pub fn infer_write(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    let (path, content) = if let Some(c) = CREATE_FILE.captures(user_text) {
        let path = c.get(1)?.as_str().to_string();
        let content = c.get(2).map(|m| unquote(m.as_str())).unwrap_or_default();
        (path, content)
    } else if let Some(c) = WRITE_TO.captures(user_text) {
        (c.get(2)?.as_str().to_string(), unquote(c.get(1)?.as_str()))
    } else if let Some(c) = SAVE_CONTENT.captures(user_text) {
        (c.get(1)?.as_str().to_string(), unquote(c.get(2)?.as_str()))
    } else {
        return None;
    };

    if is_unsafe_path_input(&path) || is_sensitive_path(&path) {
        return None;
    }
    let info = registry.find("write")?;
    let path_key = pick_arg_key(info, &["path", "filePath", "file_path"])?;
    let mut args = Map::new();
    args.insert(path_key, Value::String(path));
    args.insert("content".to_string(), Value::String(content));
    Some(InferredCall {
        name: info.name().to_string(),
        args: Value::Object(args),
    })
}
