//! Request pipeline: the conversation life-cycle from parsed OpenAI request
//! to reply.
//!
//! Owns directive handling, confirmation replay, compaction, the planner /
//! fallback split, heuristic recovery, and response assembly. No HTTP here;
//! the serve crate maps [`GatewayReply`] onto axum.

mod directives;
mod fallback;
mod stream_out;

pub use directives::{parse_directives, Directives};
pub use fallback::scan_raw_tool_calls;
pub use stream_out::SseEmitter;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::compress::{compact, estimate_tokens, is_compaction_summary, ContextStats};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::heuristics::{infer_tool_call, InferredCall};
use crate::openai::{
    created_now, new_completion_id, ChatCompletion, ChatCompletionRequest, ChatMessage,
    ChunkUsage, MessageContent, ToolCallMsg,
};
use crate::planner::{
    make_confirmation_question, render_upstream_messages, run_planner_turn, todo_tools_allowed,
    PlannerRequest, PlannerTurn, PromptCache, PromptOptions, SchemaStyle,
};
use crate::safety::{
    gate_action, is_web_tool, GateDecision, PendingConfirmations, SafetyPolicy, ShellPolicy,
};
use crate::tools::{normalize_args_for_tool, norm_tool_name, ToolRegistry};
use crate::upstream::{
    collect_turn, ChatStore, ChunkFilter, SendMessageOptions, StreamChunk, UpstreamClient,
    UpstreamFeatures,
};

const RECOVERY_TEST_HINT: &str =
    "The previous tool results are in. Summarize them for the user or plan the next call.";

/// One reply from the gateway core.
pub enum GatewayReply {
    Buffered {
        completion: ChatCompletion,
        stats: ContextStats,
    },
    /// SSE lines ready to write; already terminated with `[DONE]`.
    Streaming {
        lines: ReceiverStream<String>,
        stats: ContextStats,
    },
}

/// The gateway: per-process state shared across requests.
pub struct Gateway {
    config: GatewayConfig,
    upstream: Arc<dyn UpstreamClient>,
    chats: Arc<dyn ChatStore>,
    pending: PendingConfirmations,
    prompt_cache: PromptCache,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        upstream: Arc<dyn UpstreamClient>,
        chats: Arc<dyn ChatStore>,
    ) -> Self {
        let prompt_cache = PromptCache::new(config.prompt_cache_entries);
        Self {
            config,
            upstream,
            chats,
            pending: PendingConfirmations::default(),
            prompt_cache,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles one chat-completions request.
    ///
    /// Fatal upstream errors surface as `Err` only before streaming starts;
    /// mid-stream failures become SSE `error` events. Non-fatal tool errors
    /// downgrade to content responses carrying the blocking reason.
    pub async fn handle(&self, req: ChatCompletionRequest) -> Result<GatewayReply, GatewayError> {
        let directives = parse_directives(&req.last_user_text());
        let thinking = directives
            .thinking
            .unwrap_or(self.config.default_thinking);
        let web = directives
            .web_search
            .unwrap_or(self.config.allow_web_search);
        let features = UpstreamFeatures {
            web_search: web,
            auto_search: directives.auto_search.unwrap_or(false),
        };
        info!(
            model = %req.model,
            stream = req.stream,
            tools = req.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "chat completion request"
        );

        // A confirmed question unlocks the parked dangerous action.
        if let Some(reply) = self.try_confirmation_replay(&req) {
            return Ok(reply);
        }

        let mut messages = req.messages.clone();
        strip_directives_from_latest_user(&mut messages, &directives);
        if self.config.compact_reset {
            // Start compaction fresh instead of carrying earlier summaries.
            messages.retain(|m| !is_compaction_summary(m));
        }
        if directives.test_tool_result {
            messages.push(ChatMessage::assistant(RECOVERY_TEST_HINT));
        }
        let (messages, stats) = compact(messages, &self.config.compaction);
        if stats.dropped_messages > 0 {
            debug!(
                dropped = stats.dropped_messages,
                summary = stats.summary_added,
                "context compacted"
            );
        }

        let title = chat_title(&directives.cleaned);
        let chat_id = self.chats.ensure_chat(&title, &req.model).await?;
        let include_history = self.config.use_upstream_history;
        let parent_message_id = if include_history {
            None
        } else {
            self.upstream.get_current_message_id(&chat_id).await?
        };

        let planner_selected = req.tools_in_play() || directives.test_tool_loop;
        if planner_selected {
            self.handle_planner(
                &req, directives, messages, stats, chat_id, parent_message_id, thinking,
                include_history, features, web,
            )
            .await
        } else {
            self.handle_fallback(
                &req, messages, stats, chat_id, parent_message_id, thinking, include_history,
                features,
            )
            .await
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_planner(
        &self,
        req: &ChatCompletionRequest,
        directives: Directives,
        messages: Vec<ChatMessage>,
        stats: ContextStats,
        chat_id: String,
        parent_message_id: Option<String>,
        thinking: bool,
        include_history: bool,
        features: UpstreamFeatures,
        web: bool,
    ) -> Result<GatewayReply, GatewayError> {
        let tools = req.tools.clone().unwrap_or_default();
        let registry = ToolRegistry::new(&tools);

        // Catalog shown to the planner: todo tools only on todo intent,
        // web tools only behind the toggle.
        let todo_ok = todo_tools_allowed(&directives.cleaned);
        let catalog: Vec<_> = tools
            .iter()
            .filter(|t| {
                let norm = norm_tool_name(&t.function.name);
                (todo_ok || !norm.contains("todo")) && (web || !is_web_tool(&norm))
            })
            .cloned()
            .collect();
        let prompt_registry = ToolRegistry::new(&catalog);
        let prompt = self.prompt_cache.get_or_build(
            &prompt_registry,
            &PromptOptions {
                schema_style: SchemaStyle::ArgsList,
                extra_system: directives.extra_system.clone(),
            },
        );

        let policy = SafetyPolicy {
            shell: ShellPolicy { allow_network: web },
            allow_web: web,
        };
        let planner_request = PlannerRequest {
            registry: &registry,
            system_prompt: prompt,
            transcript: &messages,
            user_text: &directives.cleaned,
            chat_id,
            parent_message_id,
            enable_thinking: thinking,
            include_history,
            features,
        };
        let outcome = match run_planner_turn(
            &self.config,
            &policy,
            &self.pending,
            self.upstream.as_ref(),
            planner_request,
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(err) if !err.is_fatal() => {
                warn!(kind = err.kind(), "planner turn downgraded to content");
                return Ok(self.reply_content(
                    req,
                    format!("{err} ({}).", err.kind()),
                    None,
                    &messages,
                    stats,
                ));
            }
            Err(err) => return Err(err),
        };

        let thinking_text = outcome.thinking;
        match outcome.turn {
            PlannerTurn::ToolCalls(calls) => {
                Ok(self.reply_tool_calls(req, calls, &messages, stats))
            }
            PlannerTurn::Content(content) => {
                if content.trim().is_empty() && !directives.no_heuristics {
                    if let Some(inferred) = infer_tool_call(&directives.cleaned, &registry) {
                        return Ok(self.emit_inferred(
                            req, inferred, &registry, &policy, &messages, stats,
                        ));
                    }
                }
                Ok(self.reply_content(req, content, thinking_text, &messages, stats))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_fallback(
        &self,
        req: &ChatCompletionRequest,
        messages: Vec<ChatMessage>,
        stats: ContextStats,
        chat_id: String,
        parent_message_id: Option<String>,
        thinking: bool,
        include_history: bool,
        features: UpstreamFeatures,
    ) -> Result<GatewayReply, GatewayError> {
        let tools = req.tools.clone().unwrap_or_default();
        let registry = ToolRegistry::new(&tools);
        let opts = SendMessageOptions {
            chat_id,
            messages: render_upstream_messages(None, &messages),
            enable_thinking: thinking,
            include_history,
            parent_message_id,
            features,
        };

        // Tools declared but not in play: buffer and scan for raw calls.
        if !registry.is_empty() || !req.stream {
            let turn = collect_turn(self.upstream.send_message(opts).await?).await?;
            if let Some(calls) = scan_raw_tool_calls(&self.config, &registry, &turn.content) {
                return Ok(self.reply_tool_calls(req, calls, &messages, stats));
            }
            let thinking_text = (!turn.thinking.is_empty()).then(|| turn.thinking.clone());
            return Ok(self.reply_content(req, turn.content, thinking_text, &messages, stats));
        }

        // Pure streaming path.
        let stream = self.upstream.send_message(opts).await?;
        let (tx, rx) = mpsc::channel::<String>(64);
        let mut emitter = SseEmitter::new(
            new_completion_id(),
            req.model.clone(),
            created_now(),
            self.config.include_usage && req.include_usage(),
            tx,
        );
        let prompt_tokens = estimate_tokens(&messages) as u32;
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = stream;
            let mut filter = ChunkFilter::new();
            let mut completion_chars = 0usize;
            while let Some(chunk) = stream.next().await {
                if emitter.is_closed() {
                    // Client went away: drop the upstream read mid-flight.
                    return;
                }
                for c in filter.push(chunk) {
                    match c {
                        StreamChunk::Thinking(t) => emitter.reasoning(&t).await,
                        StreamChunk::ThinkingEnd => {}
                        StreamChunk::Content(text) => {
                            completion_chars += text.chars().count();
                            emitter.content(&text).await;
                        }
                        StreamChunk::Done => {
                            let completion_tokens = completion_chars.div_ceil(4) as u32;
                            emitter.set_usage(ChunkUsage {
                                prompt_tokens,
                                completion_tokens,
                                total_tokens: prompt_tokens + completion_tokens,
                            });
                            emitter.finish_stop().await;
                            return;
                        }
                        StreamChunk::Error(message) => {
                            let err = StreamChunk::to_error(&message);
                            emitter.error(&err.to_string(), err.kind()).await;
                            return;
                        }
                    }
                }
            }
            emitter.finish_stop().await;
        });
        Ok(GatewayReply::Streaming {
            lines: ReceiverStream::new(rx),
            stats,
        })
    }

    /// Replays a parked dangerous action when its question was answered
    /// "Proceed (Recommended)".
    fn try_confirmation_replay(&self, req: &ChatCompletionRequest) -> Option<GatewayReply> {
        let last = req.messages.last()?;
        if !last.role.eq_ignore_ascii_case("tool") {
            return None;
        }
        let id = last.tool_call_id.as_deref()?;
        let call = self.pending.take_if_confirmed(id, &last.text())?;
        info!(call = %call.function.name, "confirmed action replayed");
        let stats = ContextStats {
            used_tokens: estimate_tokens(&req.messages),
            total_tokens: self.config.compaction.max_tokens,
            ..Default::default()
        };
        Some(self.reply_tool_calls(req, vec![call], &req.messages, stats))
    }

    /// Gates one heuristic inference and emits it like a planned action.
    fn emit_inferred(
        &self,
        req: &ChatCompletionRequest,
        inferred: InferredCall,
        registry: &ToolRegistry,
        policy: &SafetyPolicy,
        messages: &[ChatMessage],
        stats: ContextStats,
    ) -> GatewayReply {
        debug!(tool = %inferred.name, "heuristic tool call inferred");
        let Some(info) = registry.find(&inferred.name) else {
            return self.reply_content(
                req,
                format!("Blocked unsafe tool call (unknown_tool: {}).", inferred.name),
                None,
                messages,
                stats,
            );
        };
        let args = match normalize_args_for_tool(info, inferred.args) {
            Ok(args) => args,
            Err(err) => {
                return self.reply_content(
                    req,
                    format!("Blocked unsafe tool call ({}).", err.kind()),
                    None,
                    messages,
                    stats,
                )
            }
        };
        match gate_action(&info.norm_name, &args, policy) {
            GateDecision::Allow => {
                let call = ToolCallMsg::function(info.name(), args.to_string());
                self.reply_tool_calls(req, vec![call], messages, stats)
            }
            GateDecision::Confirm { command } => {
                let question = make_confirmation_question(registry, &command);
                self.pending
                    .park(&question.id, ToolCallMsg::function(info.name(), args.to_string()));
                self.reply_tool_calls(req, vec![question], messages, stats)
            }
            GateDecision::Block(_, kind) => self.reply_content(
                req,
                format!("Blocked unsafe tool call ({kind})."),
                None,
                messages,
                stats,
            ),
        }
    }

    fn usage_for(&self, req: &ChatCompletionRequest, messages: &[ChatMessage], completion_chars: usize) -> Option<ChunkUsage> {
        if !(self.config.include_usage && req.include_usage()) {
            return None;
        }
        let prompt_tokens = estimate_tokens(messages) as u32;
        let completion_tokens = completion_chars.div_ceil(4) as u32;
        Some(ChunkUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        })
    }

    fn reply_tool_calls(
        &self,
        req: &ChatCompletionRequest,
        calls: Vec<ToolCallMsg>,
        messages: &[ChatMessage],
        stats: ContextStats,
    ) -> GatewayReply {
        let id = new_completion_id();
        let created = created_now();
        let args_chars: usize = calls
            .iter()
            .map(|c| c.function.arguments.chars().count())
            .sum();
        let usage = self.usage_for(req, messages, args_chars);
        if req.stream {
            let (tx, rx) = mpsc::channel::<String>(16);
            let mut emitter =
                SseEmitter::new(id, req.model.clone(), created, usage.is_some(), tx);
            tokio::spawn(async move {
                if let Some(u) = usage {
                    emitter.set_usage(u);
                }
                emitter.tool_calls(&calls).await;
            });
            GatewayReply::Streaming {
                lines: ReceiverStream::new(rx),
                stats,
            }
        } else {
            let mut completion =
                ChatCompletion::tool_calls(id, created, req.model.clone(), calls);
            completion.usage = usage;
            GatewayReply::Buffered { completion, stats }
        }
    }

    fn reply_content(
        &self,
        req: &ChatCompletionRequest,
        content: String,
        thinking: Option<String>,
        messages: &[ChatMessage],
        stats: ContextStats,
    ) -> GatewayReply {
        let id = new_completion_id();
        let created = created_now();
        let usage = self.usage_for(req, messages, content.chars().count());
        if req.stream {
            let (tx, rx) = mpsc::channel::<String>(16);
            let mut emitter =
                SseEmitter::new(id, req.model.clone(), created, usage.is_some(), tx);
            tokio::spawn(async move {
                if let Some(thinking) = thinking {
                    emitter.reasoning(&thinking).await;
                }
                emitter.content(&content).await;
                if let Some(u) = usage {
                    emitter.set_usage(u);
                }
                emitter.finish_stop().await;
            });
            GatewayReply::Streaming {
                lines: ReceiverStream::new(rx),
                stats,
            }
        } else {
            let mut completion = ChatCompletion::content(id, created, req.model.clone(), content);
            completion.usage = usage;
            GatewayReply::Buffered { completion, stats }
        }
    }
}

/// Replaces the latest user message content with the directive-stripped text.
fn strip_directives_from_latest_user(messages: &mut [ChatMessage], directives: &Directives) {
    if let Some(last_user) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role.eq_ignore_ascii_case("user"))
    {
        last_user.content = Some(MessageContent::Text(directives.cleaned.clone()));
    }
}

/// Upstream chat title: the first line of the user text, bounded.
fn chat_title(user_text: &str) -> String {
    let first_line = user_text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return "proxy chat".to_string();
    }
    first_line.chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_title_is_first_line_bounded() {
        assert_eq!(chat_title("fix the bug\nplease"), "fix the bug");
        assert_eq!(chat_title(""), "proxy chat");
        let long = "x".repeat(100);
        assert_eq!(chat_title(&long).chars().count(), 60);
    }

    #[test]
    fn strip_directives_rewrites_latest_user_only() {
        let mut messages = vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("a"),
            ChatMessage::user("/thinking off\nsecond"),
        ];
        let directives = parse_directives("/thinking off\nsecond");
        strip_directives_from_latest_user(&mut messages, &directives);
        assert_eq!(messages[0].text(), "first");
        assert_eq!(messages[2].text(), "second");
    }
}
