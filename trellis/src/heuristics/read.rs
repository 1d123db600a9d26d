//! Read inference: "read/open/show <path>" style requests.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::safety::{is_sensitive_path, is_unsafe_path_input};
use crate::tools::{pick_arg_key, ToolRegistry};

use super::InferredCall;

static READ_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(read|open|show|cat|print|display)\b").expect("read verbs")
});

static SEARCH_VERBS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(search|find)\b").expect("search verbs"));

/// A path-looking token: backticked/quoted, or bare with an extension
/// (dotfiles included).
static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[`"']([^`"'\s]+)[`"']|(?:^|\s)((?:[\w\-./]+)?\.[A-Za-z0-9_]{1,16})\b"#)
        .expect("path token")
});

static DIR_CONTEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(director(y|ies)|folder)\b").expect("dir context"));

/// Extracts the first path-shaped token from the text.
pub(crate) fn extract_path(text: &str) -> Option<String> {
    PATH_TOKEN.captures_iter(text).find_map(|c| {
        let token = c
            .get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().to_string())?;
        // Quoted tokens still need to look like a file, not a sentence.
        if token.contains(' ') {
            return None;
        }
        Some(token)
    })
}

pub fn infer_read(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    let triggered = READ_VERBS.is_match(user_text)
        || (SEARCH_VERBS.is_match(user_text) && !registry.has_shell_tool());
    if !triggered {
        return None;
    }
    // "show the folder" is a list job, not a read.
    if DIR_CONTEXT.is_match(user_text) {
        return None;
    }
    let path = extract_path(user_text)?;
    if path.ends_with('/') {
        return None;
    }
    if is_unsafe_path_input(&path) || is_sensitive_path(&path) {
        return None;
    }
    let info = registry.find("read")?;
    let key = pick_arg_key(info, &["path", "filePath", "file_path"])?;
    let mut args = Map::new();
    args.insert(key, Value::String(path));
    Some(InferredCall {
        name: info.name().to_string(),
        args: Value::Object(args),
    })
}
