//! Planner envelope: the JSON shape the upstream is instructed to emit.
//!
//! `{plan, actions, final, thought}` with tolerant validation: unknown
//! top-level keys are dropped silently, missing lists default to empty, and
//! a bare JSON array is accepted as raw OpenAI-style tool calls.

use serde_json::Value;

use crate::error::GatewayError;

/// Risk level an action self-reports. Advisory only; the gate decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionSafety {
    pub risk: RiskLevel,
    pub notes: Option<String>,
}

/// One planned tool invocation.
#[derive(Debug, Clone)]
pub struct PlannerAction {
    pub tool: String,
    /// Always a JSON object after validation.
    pub args: Value,
    pub why: Option<String>,
    pub expect: Option<String>,
    pub safety: Option<ActionSafety>,
}

/// The parsed envelope.
#[derive(Debug, Clone, Default)]
pub struct PlannerOutput {
    pub plan: Vec<String>,
    pub actions: Vec<PlannerAction>,
    pub final_text: Option<String>,
    pub thought: Option<String>,
}

/// Validates a parsed JSON value as a planner envelope.
///
/// `plan` must be a list of strings (a bare string is accepted as a
/// single-entry list); `actions` entries need a non-empty `tool` and an
/// object `args` (missing/null coerce to `{}`). Anything else in the
/// envelope is dropped.
pub fn validate_envelope(value: &Value) -> Result<PlannerOutput, GatewayError> {
    let obj = value
        .as_object()
        .ok_or_else(|| GatewayError::InvalidJson("envelope is not an object".to_string()))?;

    let plan = match obj.get("plan") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        Some(other) => {
            return Err(GatewayError::InvalidJson(format!(
                "plan must be a list of strings, got {other}"
            )))
        }
    };

    let actions = match obj.get("actions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut actions = Vec::with_capacity(items.len());
            for item in items {
                actions.push(validate_action(item)?);
            }
            actions
        }
        Some(other) => {
            return Err(GatewayError::InvalidJson(format!(
                "actions must be an array, got {other}"
            )))
        }
    };

    let final_text = obj
        .get("final")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    let thought = obj
        .get("thought")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Ok(PlannerOutput {
        plan,
        actions,
        final_text,
        thought,
    })
}

fn validate_action(value: &Value) -> Result<PlannerAction, GatewayError> {
    let obj = value
        .as_object()
        .ok_or_else(|| GatewayError::InvalidJson("action is not an object".to_string()))?;
    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::InvalidJson("action without tool name".to_string()))?
        .to_string();
    let args = match obj.get("args") {
        None | Some(Value::Null) => Value::Object(Default::default()),
        Some(Value::Object(o)) => Value::Object(o.clone()),
        Some(other) => {
            return Err(GatewayError::InvalidJson(format!(
                "action args must be an object, got {other}"
            )))
        }
    };
    let safety = obj.get("safety").and_then(Value::as_object).map(|s| {
        ActionSafety {
            risk: s
                .get("risk")
                .and_then(Value::as_str)
                .map(RiskLevel::parse)
                .unwrap_or_default(),
            notes: s.get("notes").and_then(Value::as_str).map(String::from),
        }
    });
    Ok(PlannerAction {
        tool,
        args,
        why: obj.get("why").and_then(Value::as_str).map(String::from),
        expect: obj.get("expect").and_then(Value::as_str).map(String::from),
        safety,
    })
}

/// A tool call parsed from a raw JSON array outside the planner envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToolCall {
    pub name: String,
    /// Argument object (decoded when the array carried a JSON string).
    pub args: Value,
}

/// Parses a raw OpenAI-style tool-call array. Entries may be flat
/// (`{name, arguments}`) or nested (`{function: {name, arguments}}`);
/// `arguments` may be an object or a JSON-encoded string. Consecutive
/// duplicates (same name + args) are collapsed.
pub fn parse_raw_tool_calls(value: &Value) -> Option<Vec<RawToolCall>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut calls: Vec<RawToolCall> = Vec::with_capacity(items.len());
    for item in items {
        let obj = item.as_object()?;
        let function = obj.get("function").and_then(Value::as_object).unwrap_or(obj);
        let name = function
            .get("name")
            .or_else(|| function.get("tool"))
            .and_then(Value::as_str)?
            .to_string();
        let args = function
            .get("arguments")
            .or_else(|| function.get("args"))
            .cloned()
            .unwrap_or(Value::Object(Default::default()));
        let args = match args {
            Value::String(s) => serde_json::from_str(&s).ok()?,
            Value::Object(o) => Value::Object(o),
            Value::Null => Value::Object(Default::default()),
            _ => return None,
        };
        let call = RawToolCall { name, args };
        if calls.last() == Some(&call) {
            continue; // upstream stutter: same call twice in a row
        }
        calls.push(call);
    }
    Some(calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_envelope_validates() {
        let v = json!({"plan": ["read the file"], "actions": [{"tool": "read", "args": {"path": "a"}}]});
        let out = validate_envelope(&v).unwrap();
        assert_eq!(out.plan, vec!["read the file"]);
        assert_eq!(out.actions.len(), 1);
        assert_eq!(out.actions[0].tool, "read");
    }

    #[test]
    fn unknown_top_level_keys_are_dropped() {
        let v = json!({"plan": [], "actions": [], "confidence": 0.9, "final": "done"});
        let out = validate_envelope(&v).unwrap();
        assert_eq!(out.final_text.as_deref(), Some("done"));
    }

    #[test]
    fn bare_string_plan_becomes_single_entry() {
        let v = json!({"plan": "just one step", "actions": []});
        let out = validate_envelope(&v).unwrap();
        assert_eq!(out.plan, vec!["just one step"]);
    }

    #[test]
    fn action_without_tool_is_invalid() {
        let v = json!({"actions": [{"args": {}}]});
        assert_eq!(validate_envelope(&v).unwrap_err().kind(), "invalid_json");
    }

    #[test]
    fn action_args_default_to_empty_object() {
        let v = json!({"actions": [{"tool": "read"}]});
        let out = validate_envelope(&v).unwrap();
        assert!(out.actions[0].args.is_object());
    }

    #[test]
    fn safety_risk_parses_with_default_low() {
        let v = json!({"actions": [
            {"tool": "write", "args": {}, "safety": {"risk": "high", "notes": "careful"}},
            {"tool": "read", "args": {}, "safety": {"risk": "unknown"}}
        ]});
        let out = validate_envelope(&v).unwrap();
        assert_eq!(out.actions[0].safety.as_ref().unwrap().risk, RiskLevel::High);
        assert_eq!(out.actions[1].safety.as_ref().unwrap().risk, RiskLevel::Low);
    }

    #[test]
    fn raw_calls_parse_flat_and_nested_shapes() {
        let v = json!([
            {"name": "read", "arguments": {"filePath": "a"}},
            {"function": {"name": "grep", "arguments": "{\"pattern\":\"x\"}"}}
        ]);
        let calls = parse_raw_tool_calls(&v).unwrap();
        assert_eq!(calls[0].name, "read");
        assert_eq!(calls[1].name, "grep");
        assert_eq!(calls[1].args["pattern"], "x");
    }

    #[test]
    fn raw_calls_collapse_consecutive_duplicates() {
        let v = json!([
            {"name": "read", "arguments": {"filePath": "a"}},
            {"name": "read", "arguments": {"filePath": "a"}},
            {"name": "read", "arguments": {"filePath": "b"}}
        ]);
        let calls = parse_raw_tool_calls(&v).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args["filePath"], "a");
        assert_eq!(calls[1].args["filePath"], "b");
    }

    #[test]
    fn raw_calls_reject_non_arrays_and_junk() {
        assert!(parse_raw_tool_calls(&json!({})).is_none());
        assert!(parse_raw_tool_calls(&json!([])).is_none());
        assert!(parse_raw_tool_calls(&json!([{"no_name": 1}])).is_none());
    }
}
