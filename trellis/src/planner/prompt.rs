//! Planner system prompt assembly.
//!
//! One system message teaches the upstream the envelope shape, lists the
//! allowed tools, and carries the standing safety guidance. Assembly is
//! cheap but not free (schema serialization), so results are cached per
//! (tool-list identity, extra-system text) with a small FIFO bound.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::tools::ToolRegistry;

/// How tool parameters are rendered in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaStyle {
    /// `args: key1, key2, ...` from the declared property keys.
    #[default]
    ArgsList,
    /// The JSON parameter schema, middle-elided when long.
    TruncatedSchema,
}

/// Inputs for one prompt build.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub schema_style: SchemaStyle,
    /// Extra system text from the client (`/system ...`), truncated.
    pub extra_system: Option<String>,
}

const EXTRA_SYSTEM_MAX_CHARS: usize = 2_000;
const SCHEMA_MAX_CHARS: usize = 600;

const PREAMBLE: &str = r#"You are the planning layer of a coding assistant. You cannot run anything yourself; you plan tool invocations for the client to execute.

Respond with ONLY one JSON object, no prose, no markdown fences:
{"plan": ["short step", ...], "actions": [{"tool": "name", "args": {...}, "why": "reason", "expect": "what the result should show", "safety": {"risk": "low|medium|high", "notes": "optional"}}], "final": "answer when no tool is needed", "thought": "optional reasoning"}

Rules:
- "plan" is a short list of steps in plain language.
- "actions" lists the tool calls for THIS turn only. Use [] when answering directly.
- "args" must be a JSON object matching the tool's parameters.
- When no tool is needed, put the complete answer in "final" and leave "actions" empty.
- Never invent tool names that are not in the allowed list."#;

const GUIDANCE: &str = r#"Tool selection: prefer the most specific tool (read over shell cat, grep over shell grep). One action is usually enough; never plan more than a few.

Mutations: at most ONE mutating action (write, edit, patch, shell, delete, move) per turn. The client will ask the user to confirm dangerous commands before running them.

Paths: use workspace-relative paths only. Never touch absolute paths, `..` traversal, `~`, or credential files (.env, .ssh, key files).

Explicit calls: a user line of the form `% tool_name args` is a direct instruction to call that tool with those arguments."#;

const EXAMPLE_TOOL_TURN: &str = r#"{"plan": ["read the file", "summarize it"], "actions": [{"tool": "read", "args": {"path": "src/main.rs"}, "why": "need the source", "expect": "file contents"}], "thought": "start by reading"}"#;

const EXAMPLE_FINAL_TURN: &str = r#"{"plan": [], "actions": [], "final": "2 + 2 = 4."}"#;

/// Builds the planner system prompt for the given registry.
pub fn build_planner_prompt(registry: &ToolRegistry, options: &PromptOptions) -> String {
    let mut sections = vec![PREAMBLE.to_string()];

    let mut tools = String::from("Allowed tools:\n");
    for info in registry.entries() {
        let description = info
            .tool
            .function
            .description
            .as_deref()
            .unwrap_or("(no description)");
        tools.push_str(&format!("- {}: {}\n", info.name(), description));
        match options.schema_style {
            SchemaStyle::ArgsList => {
                if !info.property_keys.is_empty() {
                    tools.push_str(&format!("  args: {}\n", info.property_keys.join(", ")));
                }
            }
            SchemaStyle::TruncatedSchema => {
                if let Some(params) = &info.tool.function.parameters {
                    let schema = serde_json::to_string(params).unwrap_or_default();
                    tools.push_str(&format!("  schema: {}\n", truncate_schema(&schema)));
                }
            }
        }
    }
    sections.push(tools.trim_end().to_string());

    if let Some(extra) = options
        .extra_system
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let capped: String = extra.chars().take(EXTRA_SYSTEM_MAX_CHARS).collect();
        sections.push(format!("Additional instructions:\n{capped}"));
    }

    sections.push(GUIDANCE.to_string());
    sections.push(format!(
        "Example (tool turn):\n{EXAMPLE_TOOL_TURN}\n\nExample (direct answer):\n{EXAMPLE_FINAL_TURN}"
    ));

    sections.join("\n\n")
}

/// Middle-elides a long schema string: head 70%, tail the rest.
fn truncate_schema(schema: &str) -> String {
    let chars: Vec<char> = schema.chars().collect();
    if chars.len() <= SCHEMA_MAX_CHARS {
        return schema.to_string();
    }
    let head = SCHEMA_MAX_CHARS * 7 / 10;
    let tail = SCHEMA_MAX_CHARS - head;
    let mut out: String = chars[..head].iter().collect();
    out.push('…');
    out.extend(chars[chars.len() - tail..].iter());
    out
}

/// Bounded FIFO cache over built prompts.
///
/// Keyed by a hash of the tool list identity (names, descriptions,
/// parameter schemas) and the extra-system text.
#[derive(Debug)]
pub struct PromptCache {
    entries: Mutex<VecDeque<(u64, String)>>,
    capacity: usize,
}

impl PromptCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_build(&self, registry: &ToolRegistry, options: &PromptOptions) -> String {
        let key = cache_key(registry, options);
        let mut entries = self.entries.lock().expect("prompt cache lock");
        if let Some((_, prompt)) = entries.iter().find(|(k, _)| *k == key) {
            return prompt.clone();
        }
        drop(entries);

        let prompt = build_planner_prompt(registry, options);
        let mut entries = self.entries.lock().expect("prompt cache lock");
        if entries.iter().all(|(k, _)| *k != key) {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back((key, prompt.clone()));
        }
        prompt
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("prompt cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(registry: &ToolRegistry, options: &PromptOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    for info in registry.entries() {
        info.name().hash(&mut hasher);
        info.tool.function.description.hash(&mut hasher);
        if let Some(p) = &info.tool.function.parameters {
            p.to_string().hash(&mut hasher);
        }
    }
    (options.schema_style == SchemaStyle::TruncatedSchema).hash(&mut hasher);
    options.extra_system.hash(&mut hasher);
    hasher.finish()
}
