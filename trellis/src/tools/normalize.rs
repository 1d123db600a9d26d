//! Tool-specific argument coercions applied after registry resolution.
//!
//! Clients and the planner disagree on small things — `path` vs `filePath`,
//! `cmd` vs `command`, half-filled todo items — so arguments are repaired
//! against the declared schema before gating.

use serde_json::{json, Map, Value};

use crate::error::GatewayError;

use super::registry::ToolInfo;

/// Normalizes `args` for the resolved tool. Returns the repaired object or
/// an `invalid_tool_args` error when the shape is beyond repair.
pub fn normalize_args_for_tool(info: &ToolInfo, args: Value) -> Result<Value, GatewayError> {
    let mut obj = match args {
        Value::Object(o) => o,
        Value::Null => Map::new(),
        other => {
            return Err(GatewayError::InvalidToolArgs {
                tool: info.name().to_string(),
                reason: format!("arguments must be an object, got {}", kind_of(&other)),
            })
        }
    };

    let norm = info.norm_name.as_str();
    if norm == "todowrite" {
        normalize_todos(&mut obj);
    } else if norm.contains("edit") || (norm.contains("write") && norm != "todowrite") {
        remap_alias(info, &mut obj, "path", "filePath");
        if norm.contains("write") && !norm.contains("edit") {
            let content_empty = obj
                .get("content")
                .map(|v| v.as_str().map(str::is_empty).unwrap_or(false))
                .unwrap_or(true);
            let path_empty = path_value(&obj)
                .map(|p| p.trim().is_empty())
                .unwrap_or(true);
            if content_empty && path_empty {
                return Err(GatewayError::InvalidToolArgs {
                    tool: info.name().to_string(),
                    reason: "write needs a path and content".to_string(),
                });
            }
        }
    } else if norm.contains("run")
        || norm.contains("bash")
        || norm.contains("shell")
        || norm.contains("exec")
    {
        remap_alias(info, &mut obj, "cmd", "command");
    }

    Ok(Value::Object(obj))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn path_value(obj: &Map<String, Value>) -> Option<&str> {
    obj.get("path")
        .or_else(|| obj.get("filePath"))
        .and_then(Value::as_str)
}

/// Moves a value between alias keys so the one the declaration names wins.
fn remap_alias(info: &ToolInfo, obj: &mut Map<String, Value>, a: &str, b: &str) {
    let (declared, other) = if info.has_key(a) {
        (a, b)
    } else if info.has_key(b) {
        (b, a)
    } else {
        return;
    };
    if !obj.contains_key(declared) {
        if let Some(v) = obj.remove(other) {
            obj.insert(declared.to_string(), v);
        }
    } else {
        obj.remove(other);
    }
}

/// Fills defaults on each todo item: `content` from `content|title|text`,
/// `status` defaulting to `"todo"` (also for non-string values), `priority`
/// defaulting to `"medium"`.
fn normalize_todos(obj: &mut Map<String, Value>) {
    let Some(todos) = obj.get_mut("todos").and_then(Value::as_array_mut) else {
        return;
    };
    for item in todos {
        let Some(entry) = item.as_object_mut() else {
            continue;
        };
        let content = entry
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| entry.get("title").and_then(Value::as_str))
            .or_else(|| entry.get("text").and_then(Value::as_str))
            .unwrap_or("")
            .to_string();
        entry.insert("content".to_string(), json!(content));
        let status_ok = entry.get("status").map(Value::is_string).unwrap_or(false);
        if !status_ok {
            entry.insert("status".to_string(), json!("todo"));
        }
        if !entry.contains_key("priority") {
            entry.insert("priority".to_string(), json!("medium"));
        }
    }
}
