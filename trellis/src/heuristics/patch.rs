//! Patch/edit inference: fenced diff or `*** Begin Patch` blocks.
//!
//! A simple single-file hunk converts to the edit tool's
//! `{filePath, oldString, newString}`; anything else rides through
//! `apply_patch` verbatim when that tool is declared.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::safety::{is_sensitive_path, is_unsafe_path_input};
use crate::tools::{pick_arg_key, ToolRegistry};

use super::InferredCall;

static DIFF_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:diff|patch)\s*\n(.*?)\n?```").expect("diff fence regex")
});

static PATCH_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\*\*\* Begin Patch\s*\n(.*?)\n?\*\*\* End Patch").expect("patch block regex")
});

static FILE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:\+\+\+\s+(?:b/)?(\S+)|---\s+(?:a/)?(\S+)|\*\*\* Update File:\s*(\S+))$")
        .expect("file header regex")
});

/// Extracts the patch text from the user message, fenced or marker-delimited.
fn extract_patch(text: &str) -> Option<String> {
    if let Some(c) = DIFF_FENCE.captures(text) {
        return Some(c.get(1)?.as_str().to_string());
    }
    PATCH_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| format!("*** Begin Patch\n{}\n*** End Patch", m.as_str()))
}

/// Splits one hunk into (file, old lines, new lines). `None` when the block
/// has no balanced -/+ pair.
fn split_hunk(patch: &str) -> Option<(String, String, String)> {
    let mut file = None;
    for c in FILE_HEADER.captures_iter(patch) {
        let name = c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3))?;
        if name.as_str() != "/dev/null" {
            file = Some(name.as_str().to_string());
        }
    }
    let file = file?;

    let mut old_lines = Vec::new();
    let mut new_lines = Vec::new();
    for line in patch.lines() {
        if line.starts_with("---") || line.starts_with("+++") || line.starts_with("***") {
            continue;
        }
        if let Some(rest) = line.strip_prefix('-') {
            old_lines.push(rest);
        } else if let Some(rest) = line.strip_prefix('+') {
            new_lines.push(rest);
        }
    }
    if old_lines.is_empty() || new_lines.is_empty() {
        return None;
    }
    Some((file, old_lines.join("\n"), new_lines.join("\n")))
}

pub fn infer_patch(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    let patch = extract_patch(user_text)?;

    if let Some(info) = registry.find("edit") {
        if let Some((file, old_string, new_string)) = split_hunk(&patch) {
            if is_unsafe_path_input(&file) || is_sensitive_path(&file) {
                return None;
            }
            let path_key = pick_arg_key(info, &["filePath", "path", "file_path"])?;
            let mut args = Map::new();
            args.insert(path_key, Value::String(file));
            args.insert("oldString".to_string(), Value::String(old_string));
            args.insert("newString".to_string(), Value::String(new_string));
            return Some(InferredCall {
                name: info.name().to_string(),
                args: Value::Object(args),
            });
        }
    }

    let info = registry.find("apply_patch")?;
    let key = pick_arg_key(info, &["patch", "input", "text"])?;
    let mut args = Map::new();
    args.insert(key, Value::String(patch));
    Some(InferredCall {
        name: info.name().to_string(),
        args: Value::Object(args),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{full_registry, tool};
    use super::*;
    use crate::tools::ToolRegistry;

    const DIFF: &str = "apply this:\n```diff\n--- a/src/lib.rs\n+++ b/src/lib.rs\n-old line\n+new line\n```";

    #[test]
    fn diff_fence_with_hunk_becomes_edit() {
        let reg = full_registry();
        let call = infer_patch(DIFF, &reg).unwrap();
        assert_eq!(call.name, "edit");
        assert_eq!(call.args["filePath"], "src/lib.rs");
        assert_eq!(call.args["oldString"], "old line");
        assert_eq!(call.args["newString"], "new line");
    }

    #[test]
    fn add_only_diff_falls_through_to_apply_patch() {
        let reg = full_registry();
        let text = "```diff\n--- a/x.txt\n+++ b/x.txt\n+only additions\n```";
        let call = infer_patch(text, &reg).unwrap();
        assert_eq!(call.name, "apply_patch");
        assert!(call.args["patch"].as_str().unwrap().contains("+only additions"));
    }

    #[test]
    fn begin_patch_block_is_recognized() {
        let reg = ToolRegistry::new(&[tool("apply_patch", serde_json::json!({"patch": {}}))]);
        let text = "*** Begin Patch\n*** Update File: a.py\n-x = 1\n+x = 2\n*** End Patch";
        let call = infer_patch(text, &reg).unwrap();
        assert_eq!(call.name, "apply_patch");
        let patch = call.args["patch"].as_str().unwrap();
        assert!(patch.starts_with("*** Begin Patch"));
        assert!(patch.ends_with("*** End Patch"));
    }

    #[test]
    fn edit_preferred_for_begin_patch_with_hunk() {
        let reg = full_registry();
        let text = "*** Begin Patch\n*** Update File: a.py\n-x = 1\n+x = 2\n*** End Patch";
        let call = infer_patch(text, &reg).unwrap();
        assert_eq!(call.name, "edit");
        assert_eq!(call.args["filePath"], "a.py");
    }

    #[test]
    fn sensitive_target_is_refused() {
        let reg = full_registry();
        let text = "```diff\n--- a/.env\n+++ b/.env\n-A=1\n+A=2\n```";
        assert!(infer_patch(text, &reg).is_none());
    }

    #[test]
    fn text_without_patch_block_does_not_fire() {
        let reg = full_registry();
        assert!(infer_patch("please change old line to new line", &reg).is_none());
    }
}
