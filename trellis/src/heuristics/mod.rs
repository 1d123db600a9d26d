//! Heuristic inference of tool calls from free-form user text.
//!
//! Applied only when the planner produced no actions and the text carries
//! actionable keywords. Deliberately conservative: each inferrer returns at
//! most one call, and `None` on any ambiguity. Disabled wholesale by the
//! `/test no-heuristics` directive without touching planner behavior.

mod explicit;
mod list;
mod patch;
mod read;
mod shell;
mod write;

pub use explicit::infer_explicit;
pub use list::infer_list;
pub use patch::infer_patch;
pub use read::infer_read;
pub use shell::infer_shell;
pub use write::infer_write;

pub(crate) use read::extract_path;

use serde_json::Value;

use crate::tools::ToolRegistry;

/// One inferred call: resolved tool name plus argument object.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredCall {
    pub name: String,
    pub args: Value,
}

/// Runs the inferrers in precedence order and returns the first hit.
///
/// Explicit `% tool` syntax wins; then structural blocks (patch, write,
/// shell), then the read/list fallbacks.
pub fn infer_tool_call(user_text: &str, registry: &ToolRegistry) -> Option<InferredCall> {
    if registry.is_empty() || user_text.trim().is_empty() {
        return None;
    }
    infer_explicit(user_text, registry)
        .or_else(|| infer_patch(user_text, registry))
        .or_else(|| infer_write(user_text, registry))
        .or_else(|| infer_shell(user_text, registry))
        .or_else(|| infer_read(user_text, registry))
        .or_else(|| infer_list(user_text, registry))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn empty_text_or_registry_infers_nothing() {
        let reg = full_registry();
        assert!(infer_tool_call("", &reg).is_none());
        assert!(infer_tool_call("   ", &reg).is_none());
        let empty = crate::tools::ToolRegistry::default();
        assert!(infer_tool_call("read foo.txt", &empty).is_none());
    }

    #[test]
    fn explicit_syntax_wins_over_other_inferrers() {
        let reg = full_registry();
        let call = infer_tool_call("% read path=src/lib.rs\nalso please read a.txt", &reg)
            .unwrap();
        assert_eq!(call.name, "read");
        assert_eq!(call.args["path"], "src/lib.rs");
    }

    #[test]
    fn plain_chat_infers_nothing() {
        let reg = full_registry();
        assert!(infer_tool_call("how does rust borrowck work?", &reg).is_none());
        assert!(infer_tool_call("thanks, that fixed it", &reg).is_none());
    }
}
