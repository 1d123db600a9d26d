//! The planner protocol loop: prompt → parse → repair → validate → gate →
//! emit.
//!
//! One call here is one client-visible turn. Upstream round-trips happen
//! only for JSON repair nudges and the single empty-envelope recovery
//! retry, all bounded by the loop limit.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::extract::{try_parse_model_output, try_repair_planner_output};
use crate::heuristics::extract_path;
use crate::openai::{ChatMessage, ToolCallMsg};
use crate::safety::{
    apply_mutation_boundary, gate_action, is_mutation_tool, is_raw_allowed, is_sensitive_path,
    is_unsafe_path_input, GateDecision, PendingConfirmations, SafetyPolicy,
};
use crate::tools::{normalize_args_for_tool, norm_tool_name, pick_arg_key, ToolInfo, ToolRegistry};
use crate::upstream::{
    collect_turn, SendMessageOptions, UpstreamClient, UpstreamFeatures, UpstreamMessage,
};

use super::envelope::{parse_raw_tool_calls, validate_envelope, PlannerAction};

static TODO_INTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(todo|to-do|checklist|task list)\b").expect("todo regex"));

const JSON_NUDGE: &str =
    "Return ONLY valid JSON matching the envelope schema. No prose, no fences.";
const JSON_NUDGE_STRICT: &str = "Your previous reply was not parseable. Respond with exactly one \
JSON object: {\"plan\": [], \"actions\": [], \"final\": \"...\"}. Nothing else.";
const EMPTY_RECOVERY_HINT: &str = "Your reply had no actions and no final answer. Either plan a \
tool call in \"actions\" or answer the user in \"final\".";

/// True when the user text asks for todo/checklist handling; otherwise todo
/// tools are dropped from catalog and actions.
pub fn todo_tools_allowed(user_text: &str) -> bool {
    TODO_INTENT.is_match(user_text)
}

/// Inputs for one planner turn.
pub struct PlannerRequest<'a> {
    pub registry: &'a ToolRegistry,
    /// Planner system prompt (already cached/built).
    pub system_prompt: String,
    /// Compacted transcript, request order, without the planner prompt.
    pub transcript: &'a [ChatMessage],
    /// Cleaned latest user text (directives stripped).
    pub user_text: &'a str,
    pub chat_id: String,
    pub parent_message_id: Option<String>,
    pub enable_thinking: bool,
    pub include_history: bool,
    pub features: UpstreamFeatures,
}

/// What the turn resolved to.
#[derive(Debug, Clone)]
pub enum PlannerTurn {
    ToolCalls(Vec<ToolCallMsg>),
    Content(String),
}

#[derive(Debug, Clone)]
pub struct PlannerOutcome {
    pub turn: PlannerTurn,
    /// Captured upstream reasoning, for `reasoning_content` deltas.
    pub thinking: Option<String>,
    pub plan: Vec<String>,
}

/// Runs the planner protocol for one request turn.
pub async fn run_planner_turn(
    config: &GatewayConfig,
    policy: &SafetyPolicy,
    pending: &PendingConfirmations,
    upstream: &dyn UpstreamClient,
    request: PlannerRequest<'_>,
) -> Result<PlannerOutcome, GatewayError> {
    let todo_allowed = todo_tools_allowed(request.user_text);
    let mut convo = render_upstream_messages(Some(&request.system_prompt), request.transcript);

    let max_calls = config
        .tool_loop_limit
        .max(config.planner_max_retries + 2);
    let mut repair_attempts = 0usize;
    let mut recovery_used = false;
    let mut thinking: Option<String> = None;

    for _ in 0..max_calls {
        let stream = upstream
            .send_message(SendMessageOptions {
                chat_id: request.chat_id.clone(),
                messages: convo.clone(),
                enable_thinking: request.enable_thinking,
                include_history: request.include_history,
                parent_message_id: request.parent_message_id.clone(),
                features: request.features,
            })
            .await?;
        let collected = collect_turn(stream).await?;
        if thinking.is_none() && !collected.thinking.is_empty() {
            thinking = Some(collected.thinking.clone());
        }
        let text = collected.planner_text();

        let parsed = try_parse_model_output(&text, false)
            .or_else(|| try_repair_planner_output(&text));
        // Brace noise in the thinking text can win first-object extraction;
        // prefer a block that actually carries envelope keys.
        let parsed = match parsed {
            Some(value) if value.is_object() && !looks_like_envelope(&value) => {
                Some(try_repair_planner_output(&text).unwrap_or(value))
            }
            other => other,
        };
        let Some(value) = parsed else {
            repair_attempts += 1;
            if repair_attempts > config.planner_max_retries {
                return Err(GatewayError::InvalidJson(
                    "planner output unparseable after retries".to_string(),
                ));
            }
            debug!(attempt = repair_attempts, "planner JSON repair retry");
            let nudge = if repair_attempts >= 2 {
                JSON_NUDGE_STRICT
            } else {
                JSON_NUDGE
            };
            convo.push(UpstreamMessage {
                role: "assistant".to_string(),
                content: nudge.to_string(),
            });
            continue;
        };

        // A bare array is raw tool calls, not an envelope.
        if value.is_array() {
            if let Some(turn) = emit_raw_calls(config, &value, request.registry) {
                return Ok(PlannerOutcome {
                    turn,
                    thinking,
                    plan: Vec::new(),
                });
            }
            return Ok(PlannerOutcome {
                turn: PlannerTurn::Content(collected.content),
                thinking,
                plan: Vec::new(),
            });
        }

        let envelope = match validate_envelope(&value) {
            Ok(e) => e,
            Err(err) => {
                repair_attempts += 1;
                if repair_attempts > config.planner_max_retries {
                    return Err(err);
                }
                convo.push(UpstreamMessage {
                    role: "assistant".to_string(),
                    content: JSON_NUDGE.to_string(),
                });
                continue;
            }
        };

        let mut actions = envelope.actions;
        if !todo_allowed {
            actions.retain(|a| !norm_tool_name(&a.tool).contains("todo"));
        }
        // Pre-limit ahead of the mutation boundary.
        if actions.len() > config.max_actions_per_turn {
            warn!(
                planned = actions.len(),
                limit = config.max_actions_per_turn,
                "planned actions over limit"
            );
            return Err(GatewayError::ActionLimitExceeded {
                planned: actions.len(),
                limit: config.max_actions_per_turn,
            });
        }
        let (actions, truncated) =
            apply_mutation_boundary(actions, |a: &PlannerAction| {
                is_mutation_tool(&norm_tool_name(&a.tool))
            });
        if truncated {
            debug!("mutation boundary kept only the first action");
        }

        let final_empty = envelope
            .final_text
            .as_deref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(true);
        if actions.is_empty() && final_empty {
            if !recovery_used {
                recovery_used = true;
                convo.push(UpstreamMessage {
                    role: "assistant".to_string(),
                    content: EMPTY_RECOVERY_HINT.to_string(),
                });
                continue;
            }
            return Ok(PlannerOutcome {
                turn: PlannerTurn::Content(String::new()),
                thinking,
                plan: envelope.plan,
            });
        }

        let context = repair_context(request.user_text, request.transcript);
        let turn = emit_actions(
            policy,
            pending,
            request.registry,
            actions,
            &envelope.final_text,
            &context,
        )?;
        return Ok(PlannerOutcome {
            turn,
            thinking,
            plan: envelope.plan,
        });
    }

    Err(GatewayError::InvalidJson(
        "planner loop limit exhausted".to_string(),
    ))
}

fn looks_like_envelope(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .map(|o| {
            ["plan", "actions", "final", "thought"]
                .iter()
                .any(|k| o.contains_key(*k))
        })
        .unwrap_or(false)
}

/// The text pool argument repair draws from: current user text first, then
/// prior user turns, latest first.
fn repair_context(user_text: &str, transcript: &[ChatMessage]) -> String {
    let mut parts = vec![user_text.to_string()];
    parts.extend(
        transcript
            .iter()
            .rev()
            .filter(|m| m.role.eq_ignore_ascii_case("user"))
            .map(|m| m.text()),
    );
    parts.join("\n")
}

/// Normalizes args, then repairs a read-style call that came back without a
/// path by lifting one from the conversation context.
fn repair_action_args(
    info: &ToolInfo,
    args: serde_json::Value,
    context: &str,
) -> Result<serde_json::Value, GatewayError> {
    let args = normalize_args_for_tool(info, args)?;
    let Some(obj) = args.as_object() else {
        return Ok(args);
    };
    let has_path = ["path", "filePath", "file_path"]
        .iter()
        .any(|k| obj.contains_key(*k));
    if has_path || !info.norm_name.contains("read") || info.norm_name.contains("todo") {
        return Ok(args);
    }
    if let Some(path) = extract_path(context) {
        if !is_unsafe_path_input(&path) && !is_sensitive_path(&path) {
            if let Some(key) = pick_arg_key(info, &["path", "filePath", "file_path"]) {
                let mut obj = obj.clone();
                obj.insert(key, serde_json::Value::String(path));
                return Ok(serde_json::Value::Object(obj));
            }
        }
    }
    if obj.is_empty() && !info.required.is_empty() {
        return Err(GatewayError::InvalidToolArgs {
            tool: info.name().to_string(),
            reason: "missing required arguments".to_string(),
        });
    }
    Ok(args)
}

/// Maps gated envelope actions onto tool calls or a downgraded content
/// response.
fn emit_actions(
    policy: &SafetyPolicy,
    pending: &PendingConfirmations,
    registry: &ToolRegistry,
    actions: Vec<PlannerAction>,
    final_text: &Option<String>,
    context: &str,
) -> Result<PlannerTurn, GatewayError> {
    let mut calls = Vec::with_capacity(actions.len());
    for action in actions {
        let info = registry
            .find(&action.tool)
            .ok_or_else(|| GatewayError::UnknownTool(action.tool.clone()))?;
        let args = repair_action_args(info, action.args, context)?;
        match gate_action(&info.norm_name, &args, policy) {
            GateDecision::Allow => {
                calls.push(ToolCallMsg::function(info.name(), args.to_string()));
            }
            GateDecision::Confirm { command } => {
                let question = make_confirmation_question(registry, &command);
                pending.park(
                    &question.id,
                    ToolCallMsg::function(info.name(), args.to_string()),
                );
                return Ok(PlannerTurn::ToolCalls(vec![question]));
            }
            GateDecision::Block(reason, kind) => {
                warn!(%reason, kind, "blocked tool call");
                return Ok(PlannerTurn::Content(format!(
                    "Blocked unsafe tool call ({kind})."
                )));
            }
        }
    }
    if calls.is_empty() {
        return Ok(PlannerTurn::Content(
            final_text.clone().unwrap_or_default(),
        ));
    }
    Ok(PlannerTurn::ToolCalls(calls))
}

/// Builds the synthesized confirmation question for a deferred command.
pub fn make_confirmation_question(registry: &ToolRegistry, command: &str) -> ToolCallMsg {
    let name = registry
        .find("question")
        .or_else(|| registry.find("askquestion"))
        .map(|i| i.name().to_string())
        .unwrap_or_else(|| "question".to_string());
    let args = serde_json::json!({
        "question": format!("Run `{command}`? This command can modify or delete data."),
        "options": ["Proceed (Recommended)", "Cancel"],
    });
    ToolCallMsg::function(name, args.to_string())
}

/// Raw-array handling inside the planner path: allowlist, then emit.
fn emit_raw_calls(
    config: &GatewayConfig,
    value: &serde_json::Value,
    registry: &ToolRegistry,
) -> Option<PlannerTurn> {
    let calls = parse_raw_tool_calls(value)?;
    let mut out = Vec::new();
    for call in calls {
        let norm = norm_tool_name(&call.name);
        if !is_raw_allowed(&norm) && !config.allow_raw_mutations {
            debug!(tool = %call.name, "raw-mode call outside allowlist dropped");
            continue;
        }
        let (name, args) = match registry.find(&call.name) {
            Some(info) => {
                let args = normalize_args_for_tool(info, call.args).ok()?;
                (info.name().to_string(), args)
            }
            None => (call.name, call.args),
        };
        out.push(ToolCallMsg::function(name, args.to_string()));
    }
    if out.is_empty() {
        return None;
    }
    if out.len() > config.max_actions_per_turn {
        out.truncate(config.max_actions_per_turn);
    }
    Some(PlannerTurn::ToolCalls(out))
}

/// Flattens the OpenAI transcript into upstream chat messages: the planner
/// prompt (when given) leads, assistant tool calls render as text, tool
/// results come back as user messages.
pub fn render_upstream_messages(
    system_prompt: Option<&str>,
    transcript: &[ChatMessage],
) -> Vec<UpstreamMessage> {
    let mut out = Vec::with_capacity(transcript.len() + 1);
    if let Some(prompt) = system_prompt {
        out.push(UpstreamMessage {
            role: "system".to_string(),
            content: prompt.to_string(),
        });
    }
    for message in transcript {
        let role = message.role.to_ascii_lowercase();
        match role.as_str() {
            "system" => out.push(UpstreamMessage {
                role: "system".to_string(),
                content: message.text(),
            }),
            "assistant" => {
                let mut content = message.text();
                if let Some(calls) = &message.tool_calls {
                    let rendered: Vec<String> = calls
                        .iter()
                        .map(|c| format!("{}({})", c.function.name, c.function.arguments))
                        .collect();
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(&format!("[called tools: {}]", rendered.join(", ")));
                }
                out.push(UpstreamMessage {
                    role: "assistant".to_string(),
                    content,
                });
            }
            "tool" => {
                let id = message.tool_call_id.as_deref().unwrap_or("unknown");
                out.push(UpstreamMessage {
                    role: "user".to_string(),
                    content: format!("Tool result for {id}:\n{}", message.text()),
                });
            }
            _ => out.push(UpstreamMessage {
                role: "user".to_string(),
                content: message.text(),
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::ToolDef;
    use crate::upstream::{MockUpstream, StreamChunk};
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let tools: Vec<ToolDef> = vec![
            tool("read", json!({"path": {}})),
            tool("write", json!({"path": {}, "content": {}})),
            tool("bash", json!({"command": {}})),
            tool("question", json!({"question": {}, "options": {}})),
            tool("todowrite", json!({"todos": {}})),
        ];
        ToolRegistry::new(&tools)
    }

    fn tool(name: &str, props: serde_json::Value) -> ToolDef {
        serde_json::from_value(json!({
            "type": "function",
            "function": {"name": name, "parameters": {"type": "object", "properties": props}}
        }))
        .unwrap()
    }

    fn request<'a>(reg: &'a ToolRegistry, user_text: &'a str) -> PlannerRequest<'a> {
        PlannerRequest {
            registry: reg,
            system_prompt: "planner prompt".to_string(),
            transcript: &[],
            user_text,
            chat_id: "chat-1".to_string(),
            parent_message_id: None,
            enable_thinking: true,
            include_history: false,
            features: UpstreamFeatures::default(),
        }
    }

    async fn run(
        mock: &MockUpstream,
        reg: &ToolRegistry,
        user_text: &str,
    ) -> Result<PlannerOutcome, GatewayError> {
        let config = GatewayConfig::default();
        let policy = SafetyPolicy::default();
        let pending = PendingConfirmations::default();
        run_planner_turn(&config, &policy, &pending, mock, request(reg, user_text)).await
    }

    #[tokio::test]
    async fn envelope_with_action_emits_tool_call() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"plan":["read it"],"actions":[{"tool":"read","args":{"path":"a.txt"}}]}"#,
        );
        let outcome = run(&mock, &reg, "read a.txt").await.unwrap();
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "read");
                assert!(calls[0].function.arguments.contains("a.txt"));
                assert!(calls[0].id.starts_with("call_"));
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
        assert_eq!(outcome.plan, vec!["read it"]);
    }

    #[tokio::test]
    async fn unparseable_output_retries_with_nudge_then_fails() {
        let reg = registry();
        let mock = MockUpstream::with_scripts(vec![
            MockUpstream::text_turn("not json at all"),
            MockUpstream::text_turn("still not json"),
        ]);
        let err = run(&mock, &reg, "hello").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_json");
        assert_eq!(mock.call_count(), 2, "one retry after the nudge");
        let calls = mock.recorded_calls();
        let last_convo = &calls[1].messages;
        assert!(last_convo
            .iter()
            .any(|m| m.role == "assistant" && m.content.contains("ONLY valid JSON")));
    }

    #[tokio::test]
    async fn second_attempt_parses_after_nudge() {
        let reg = registry();
        let mock = MockUpstream::with_scripts(vec![
            MockUpstream::text_turn("garbage"),
            MockUpstream::text_turn(r#"{"plan":[],"actions":[],"final":"recovered"}"#),
        ]);
        let outcome = run(&mock, &reg, "hello").await.unwrap();
        match outcome.turn {
            PlannerTurn::Content(c) => assert_eq!(c, "recovered"),
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mutation_boundary_keeps_first_action() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[
                {"tool":"read","args":{"path":"README.md"}},
                {"tool":"write","args":{"path":"notes.txt","content":"hi"}}
            ]}"#,
        );
        let outcome = run(&mock, &reg, "read then write").await.unwrap();
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "read");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dangerous_shell_defers_behind_question() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[{"tool":"bash","args":{"command":"rm -rf tmp"}}]}"#,
        );
        let config = GatewayConfig::default();
        let policy = SafetyPolicy::default();
        let pending = PendingConfirmations::default();
        let outcome =
            run_planner_turn(&config, &policy, &pending, &mock, request(&reg, "clean tmp"))
                .await
                .unwrap();
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "question");
                let parked = pending
                    .take_if_confirmed(&calls[0].id, "Proceed (Recommended)")
                    .expect("parked action");
                assert_eq!(parked.function.name, "bash");
                assert!(parked.function.arguments.contains("rm -rf tmp"));
            }
            other => panic!("expected question call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_path_mutation_downgrades_to_content() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[{"tool":"write","args":{"content":"hi there"}}]}"#,
        );
        let outcome = run(&mock, &reg, "write it somewhere").await.unwrap();
        match outcome.turn {
            PlannerTurn::Content(c) => {
                assert_eq!(c, "Blocked unsafe tool call (missing_path).")
            }
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn todo_actions_dropped_without_todo_intent() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[{"tool":"todowrite","args":{"todos":[{"content":"x"}]}}],"final":"noted"}"#,
        );
        let outcome = run(&mock, &reg, "please fix the bug").await.unwrap();
        match outcome.turn {
            PlannerTurn::Content(c) => assert_eq!(c, "noted"),
            other => panic!("expected content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn todo_actions_kept_with_todo_intent() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[{"tool":"todowrite","args":{"todos":[{"content":"x"}]}}]}"#,
        );
        let outcome = run(&mock, &reg, "update my todo list").await.unwrap();
        assert!(matches!(outcome.turn, PlannerTurn::ToolCalls(_)));
    }

    #[tokio::test]
    async fn empty_envelope_gets_one_recovery_retry() {
        let reg = registry();
        let mock = MockUpstream::with_scripts(vec![
            MockUpstream::text_turn(r#"{"plan":[],"actions":[]}"#),
            MockUpstream::text_turn(r#"{"plan":[],"actions":[]}"#),
        ]);
        let outcome = run(&mock, &reg, "hm").await.unwrap();
        assert_eq!(mock.call_count(), 2);
        match outcome.turn {
            PlannerTurn::Content(c) => assert!(c.is_empty()),
            other => panic!("expected empty content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn raw_array_output_respects_allowlist() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"[{"name":"read","arguments":{"path":"a"}},{"name":"write","arguments":{"path":"b","content":"c"}}]"#,
        );
        let outcome = run(&mock, &reg, "go").await.unwrap();
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1, "write is not raw-allowed");
                assert_eq!(calls[0].function.name, "read");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn action_limit_is_enforced_before_the_boundary() {
        let reg = registry();
        let mock = MockUpstream::with_text(
            r#"{"actions":[
                {"tool":"read","args":{"path":"a"}},
                {"tool":"read","args":{"path":"b"}},
                {"tool":"read","args":{"path":"c"}},
                {"tool":"read","args":{"path":"d"}}
            ]}"#,
        );
        let err = run(&mock, &reg, "read everything").await.unwrap_err();
        assert_eq!(err.kind(), "action_limit_exceeded");
    }

    #[tokio::test]
    async fn unknown_tool_surfaces_as_error() {
        let reg = registry();
        let mock =
            MockUpstream::with_text(r#"{"actions":[{"tool":"teleport","args":{}}]}"#);
        let err = run(&mock, &reg, "go").await.unwrap_err();
        assert_eq!(err.kind(), "unknown_tool");
    }

    #[tokio::test]
    async fn envelope_wins_over_brace_noise_in_thinking() {
        let reg = registry();
        let mock = MockUpstream::with_scripts(vec![vec![
            StreamChunk::Thinking("maybe args look like {\"x\": 1} here".into()),
            StreamChunk::ThinkingEnd,
            StreamChunk::Content(
                r#"{"plan":["go"],"actions":[{"tool":"read","args":{"path":"a.rs"}}]}"#.into(),
            ),
            StreamChunk::Done,
        ]]);
        let outcome = run(&mock, &reg, "read a.rs").await.unwrap();
        assert!(matches!(outcome.turn, PlannerTurn::ToolCalls(_)));
    }

    #[tokio::test]
    async fn thinking_is_captured_from_stream() {
        let reg = registry();
        let mock = MockUpstream::with_scripts(vec![vec![
            StreamChunk::Thinking("let me plan".into()),
            StreamChunk::ThinkingEnd,
            StreamChunk::Content(r#"{"plan":[],"actions":[],"final":"ok"}"#.into()),
            StreamChunk::Done,
        ]]);
        let outcome = run(&mock, &reg, "hello").await.unwrap();
        assert_eq!(outcome.thinking.as_deref(), Some("let me plan"));
    }

    #[test]
    fn transcript_rendering_flattens_tool_messages() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = Some(vec![ToolCallMsg::function("read", r#"{"path":"a"}"#)]);
        let mut tool = ChatMessage::user("file contents");
        tool.role = "tool".to_string();
        tool.tool_call_id = Some("call_12345678".to_string());
        let rendered = render_upstream_messages(
            Some("sys"),
            &[ChatMessage::user("read a"), assistant, tool],
        );
        assert_eq!(rendered[0].role, "system");
        assert_eq!(rendered[1].role, "user");
        assert!(rendered[2].content.contains("[called tools: read("));
        assert_eq!(rendered[3].role, "user");
        assert!(rendered[3].content.starts_with("Tool result for call_12345678"));
    }

    #[tokio::test]
    async fn read_without_path_is_repaired_from_prior_turns() {
        let reg = registry();
        let mock =
            MockUpstream::with_text(r#"{"plan":["read"],"actions":[{"tool":"read","args":{}}]}"#);
        let config = GatewayConfig::default();
        let policy = SafetyPolicy::default();
        let pending = PendingConfirmations::default();
        let transcript = vec![
            ChatMessage::user("I wrote calculator/calculator.py earlier"),
            ChatMessage::assistant("Understood."),
        ];
        let req = PlannerRequest {
            transcript: &transcript,
            ..request(&reg, "now check it")
        };
        let outcome = run_planner_turn(&config, &policy, &pending, &mock, req)
            .await
            .unwrap();
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                assert_eq!(calls[0].function.name, "read");
                assert!(calls[0]
                    .function
                    .arguments
                    .contains("calculator/calculator.py"));
            }
            other => panic!("expected repaired read call, got {other:?}"),
        }
    }

    #[test]
    fn todo_intent_regex_matches_spec_words() {
        assert!(todo_tools_allowed("update my TODO list"));
        assert!(todo_tools_allowed("make a to-do for this"));
        assert!(todo_tools_allowed("add to the checklist"));
        assert!(todo_tools_allowed("show the task list"));
        assert!(!todo_tools_allowed("fix the parser"));
    }
}
