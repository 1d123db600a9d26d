//! Explicit tool-call syntax: `% tool_name args`.
//!
//! The argument rest is tried as JSON, then as `k=v` pairs, then dropped
//! into the tool's default argument key.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::{pick_arg_key, ToolRegistry};

use super::InferredCall;

static EXPLICIT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*%\s*([A-Za-z0-9_\-]+)\s*[:\-]?\s*(.*)$").expect("explicit regex")
});

static KV_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)=("(?:[^"\\]|\\.)*"|\S+)"#).expect("kv regex"));

/// Keys tried (in order) when the rest is a bare value.
const DEFAULT_KEYS: [&str; 9] = [
    "url", "path", "filePath", "query", "input", "text", "command", "cmd", "pattern",
];

pub fn infer_explicit(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    for caps in EXPLICIT_LINE.captures_iter(user_text) {
        let name = caps.get(1)?.as_str();
        let Some(info) = registry.find(name) else {
            continue;
        };
        let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        if rest.is_empty() {
            return Some(InferredCall {
                name: info.name().to_string(),
                args: Value::Object(Map::new()),
            });
        }

        // 1. JSON object as-is.
        if rest.starts_with('{') {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(rest) {
                return Some(InferredCall {
                    name: info.name().to_string(),
                    args: v,
                });
            }
        }

        // 2. k=v pairs covering the whole rest.
        let pairs: Vec<(String, String)> = KV_PAIR
            .captures_iter(rest)
            .map(|c| {
                let key = c[1].to_string();
                let raw = c[2].to_string();
                let value = raw
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .map(|s| s.replace("\\\"", "\""))
                    .unwrap_or(raw);
                (key, value)
            })
            .collect();
        // Pairs count only when they cover the whole rest (ignoring spaces);
        // otherwise `path=a and run it` would half-parse.
        let mut covered = vec![false; rest.len()];
        for m in KV_PAIR.find_iter(rest) {
            covered[m.range()].fill(true);
        }
        let covers_rest = !pairs.is_empty()
            && rest
                .char_indices()
                .all(|(i, c)| c.is_whitespace() || covered[i]);
        if covers_rest {
            let mut map = Map::new();
            for (k, v) in pairs {
                map.insert(k, Value::String(v));
            }
            return Some(InferredCall {
                name: info.name().to_string(),
                args: Value::Object(map),
            });
        }

        // 3. Bare value into the default key.
        let key = pick_arg_key(info, &DEFAULT_KEYS)?;
        let mut map = Map::new();
        map.insert(key, Value::String(rest.to_string()));
        return Some(InferredCall {
            name: info.name().to_string(),
            args: Value::Object(map),
        });
    }
    None
}
