//! Safety gate: path, shell, and mutation policy applied post-parse,
//! pre-emit.
//!
//! Decisions come in three shapes: allow, block with a reason the client
//! sees as content, or defer behind a confirmation question. The mutation
//! boundary additionally enforces one confirmable mutation per turn.

mod confirm;
mod path;
mod shell;

pub use confirm::{is_proceed_reply, PendingConfirmations, DEFAULT_CONFIRMATION_TTL};
pub use path::{is_sensitive_path, is_unsafe_path_input};
pub use shell::{is_forbidden_for_heuristics, shell_escape, ShellPolicy, ShellVerdict};

use serde_json::Value;

use crate::error::GatewayError;

/// Tool names (normalized) allowed through when tool calls were parsed from
/// a raw JSON array rather than the planner envelope.
const RAW_ALLOWLIST: [&str; 14] = [
    "question",
    "askquestion",
    "read",
    "list",
    "glob",
    "grep",
    "task",
    "search",
    "rg",
    "ripgrep",
    "todoread",
    "todowrite",
    "webfetch",
    "websearch",
];

/// True when the normalized tool name mutates state.
pub fn is_mutation_tool(norm: &str) -> bool {
    if norm.contains("todo") {
        return false;
    }
    norm.contains("write")
        || norm.contains("edit")
        || norm.contains("patch")
        || norm.starts_with("run")
        || matches!(
            norm,
            "bash" | "shell" | "sh" | "exec" | "delete" | "remove" | "rm" | "mkdir" | "mv" | "move"
        )
}

/// True when the normalized tool name may pass in raw-array mode without
/// the raw-mutations toggle.
pub fn is_raw_allowed(norm: &str) -> bool {
    RAW_ALLOWLIST.contains(&norm)
}

/// True for shell-runner tool names.
pub fn is_shell_tool(norm: &str) -> bool {
    norm.starts_with("run") || matches!(norm, "bash" | "shell" | "sh" | "exec")
}

/// True for web-reaching tool names.
pub fn is_web_tool(norm: &str) -> bool {
    norm.contains("webfetch") || norm.contains("websearch") || norm == "fetch"
}

/// Enforces the one-mutation-per-turn rule: when any entry is a mutation,
/// only the first action survives. Returns the kept list and whether it was
/// truncated.
pub fn apply_mutation_boundary<T>(
    actions: Vec<T>,
    is_mutation: impl Fn(&T) -> bool,
) -> (Vec<T>, bool) {
    if actions.len() > 1 && actions.iter().any(&is_mutation) {
        let mut actions = actions;
        actions.truncate(1);
        (actions, true)
    } else {
        (actions, false)
    }
}

/// Per-request safety policy snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyPolicy {
    pub shell: ShellPolicy,
    pub allow_web: bool,
}

/// Outcome of gating one action.
#[derive(Debug, Clone)]
pub enum GateDecision {
    Allow,
    /// Defer behind a confirmation question carrying the command text.
    Confirm { command: String },
    Block(String, &'static str),
}

impl GateDecision {
    fn block(err: GatewayError) -> Self {
        GateDecision::Block(err.to_string(), err.kind())
    }
}

/// Gates one resolved action by normalized tool name and repaired args.
pub fn gate_action(norm_name: &str, args: &Value, policy: &SafetyPolicy) -> GateDecision {
    if is_web_tool(norm_name) && !policy.allow_web {
        return GateDecision::block(GatewayError::WebToolsDisabled);
    }

    if is_shell_tool(norm_name) {
        let command = args
            .get("command")
            .or_else(|| args.get("cmd"))
            .and_then(Value::as_str)
            .unwrap_or("");
        return match policy.shell.evaluate(command) {
            ShellVerdict::Allowed => GateDecision::Allow,
            ShellVerdict::NeedsConfirmation => GateDecision::Confirm {
                command: command.to_string(),
            },
            ShellVerdict::Denied(reason) => {
                GateDecision::block(GatewayError::UnsafeShell(reason))
            }
        };
    }

    // Path-bearing tools: validate every path-shaped argument.
    let path = ["path", "filePath", "file_path"]
        .iter()
        .find_map(|k| args.get(*k).and_then(Value::as_str));
    match path {
        Some(p) => {
            if is_unsafe_path_input(p) || is_sensitive_path(p) {
                return GateDecision::block(GatewayError::UnsafePath(p.to_string()));
            }
        }
        None => {
            // Patch tools carry their target inside the patch body.
            let patch_like = norm_name.contains("patch")
                && ["patch", "input", "text"]
                    .iter()
                    .any(|k| args.get(*k).and_then(Value::as_str).is_some());
            // A file mutation with nowhere to write is blocked outright.
            if is_mutation_tool(norm_name) && !patch_like {
                return GateDecision::block(GatewayError::MissingPath);
            }
        }
    }

    GateDecision::Allow
}
