//! Per-request tool registry: normalized names, alias-tolerant lookup.

use serde_json::Value;

use crate::openai::ToolDef;

/// One registry entry for a declared tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub tool: ToolDef,
    /// Name lowercased with `_` and `-` removed; the lookup key.
    pub norm_name: String,
    /// Keys of `parameters.properties`, declaration order.
    pub property_keys: Vec<String>,
    pub required: Vec<String>,
}

impl ToolInfo {
    pub fn name(&self) -> &str {
        &self.tool.function.name
    }

    /// True when the declared schema has the given property key.
    pub fn has_key(&self, key: &str) -> bool {
        self.property_keys.iter().any(|k| k == key)
    }
}

/// Normalizes a tool name for lookup: lowercase, `_` and `-` removed.
pub fn norm_tool_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Registry over the request's declared tools. Linear lookup; registries are
/// a handful of entries built fresh per request.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<ToolInfo>,
}

impl ToolRegistry {
    pub fn new(tools: &[ToolDef]) -> Self {
        let entries = tools
            .iter()
            .map(|tool| {
                let properties = tool
                    .function
                    .parameters
                    .as_ref()
                    .and_then(|p| p.get("properties"))
                    .and_then(Value::as_object);
                let property_keys = properties
                    .map(|o| o.keys().cloned().collect())
                    .unwrap_or_default();
                let required = tool
                    .function
                    .parameters
                    .as_ref()
                    .and_then(|p| p.get("required"))
                    .and_then(Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(|s| s.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                ToolInfo {
                    tool: tool.clone(),
                    norm_name: norm_tool_name(&tool.function.name),
                    property_keys,
                    required,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ToolInfo] {
        &self.entries
    }

    /// Resolves a client or planner name: exact match on the normalized
    /// name first, then substring containment in either direction so
    /// aliases like `write`/`write_file` or `run`/`run_shell` land on the
    /// declared tool.
    pub fn find(&self, name: &str) -> Option<&ToolInfo> {
        let norm = norm_tool_name(name);
        if norm.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.norm_name == norm)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.norm_name.contains(&norm) || norm.contains(&e.norm_name))
            })
    }

    /// True when any declared tool resolves for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// True when any declared tool looks like a shell runner.
    pub fn has_shell_tool(&self) -> bool {
        self.entries.iter().any(|e| {
            e.norm_name.contains("run")
                || e.norm_name.contains("bash")
                || e.norm_name.contains("shell")
                || e.norm_name.contains("exec")
        })
    }
}

/// Chooses the argument key to use: the first candidate the declaration
/// actually has, else the first declared key.
pub fn pick_arg_key(info: &ToolInfo, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| info.has_key(c))
        .map(|c| c.to_string())
        .or_else(|| info.property_keys.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, properties: Value) -> ToolDef {
        serde_json::from_value(json!({
            "type": "function",
            "function": {
                "name": name,
                "parameters": { "type": "object", "properties": properties, "required": [] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn norm_name_drops_case_and_separators() {
        assert_eq!(norm_tool_name("Write_File"), "writefile");
        assert_eq!(norm_tool_name("write-file"), "writefile");
        assert_eq!(norm_tool_name("writefile"), "writefile");
    }

    #[test]
    fn find_is_case_and_separator_insensitive() {
        let reg = ToolRegistry::new(&[tool("write_file", json!({"filePath": {}}))]);
        let a = reg.find("Write-File").unwrap();
        let b = reg.find("WRITE_FILE").unwrap();
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn find_falls_back_to_substring_both_directions() {
        let reg = ToolRegistry::new(&[
            tool("write_file", json!({})),
            tool("run", json!({})),
        ]);
        // Short alias resolves to the longer declared name.
        assert_eq!(reg.find("write").unwrap().name(), "write_file");
        // Long alias resolves to the shorter declared name.
        assert_eq!(reg.find("run_shell").unwrap().name(), "run");
    }

    #[test]
    fn exact_match_beats_substring() {
        let reg = ToolRegistry::new(&[
            tool("edit_file", json!({})),
            tool("edit", json!({})),
        ]);
        assert_eq!(reg.find("edit").unwrap().name(), "edit");
    }

    #[test]
    fn property_keys_and_required_are_extracted() {
        let reg = ToolRegistry::new(&[serde_json::from_value(json!({
            "type": "function",
            "function": {
                "name": "read",
                "parameters": {
                    "type": "object",
                    "properties": {"path": {"type": "string"}, "limit": {"type": "integer"}},
                    "required": ["path"]
                }
            }
        }))
        .unwrap()]);
        let info = reg.find("read").unwrap();
        assert!(info.has_key("path"));
        assert!(info.has_key("limit"));
        assert_eq!(info.required, vec!["path"]);
    }

    #[test]
    fn pick_arg_key_prefers_declared_candidate() {
        let reg = ToolRegistry::new(&[tool("write", json!({"filePath": {}, "content": {}}))]);
        let info = reg.find("write").unwrap();
        assert_eq!(
            pick_arg_key(info, &["path", "filePath"]),
            Some("filePath".to_string())
        );
        // No candidate declared: first declared key.
        assert_eq!(pick_arg_key(info, &["nope"]), Some("filePath".to_string()));
    }

    #[test]
    fn shell_tool_detection() {
        let reg = ToolRegistry::new(&[tool("bash", json!({"command": {}}))]);
        assert!(reg.has_shell_tool());
        let reg = ToolRegistry::new(&[tool("read", json!({"path": {}}))]);
        assert!(!reg.has_shell_tool());
    }

    #[test]
    fn empty_name_never_resolves() {
        let reg = ToolRegistry::new(&[tool("read", json!({}))]);
        assert!(reg.find("").is_none());
        assert!(reg.find("__--").is_none());
    }
}
