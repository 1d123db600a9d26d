//! # Trellis
//!
//! An OpenAI-Chat-Completions-compatible gateway over a proprietary
//! conversational upstream that has no native tool calling. Trellis
//! translates an OpenAI request (messages, tools, streaming) into upstream
//! turns, coerces the upstream's free-form text into structured tool
//! invocations, enforces safety policy on proposed actions, and returns a
//! valid OpenAI response.
//!
//! ## Subsystems
//!
//! - **[`upstream`]**: SSE transport parsing — [`SseLineFramer`] →
//!   [`ThinkTagSplitter`] → [`ThinkingDedupFilter`] — behind the
//!   [`UpstreamClient`] trait ([`HttpUpstreamClient`], [`MockUpstream`]).
//! - **[`extract`]**: balanced-JSON extraction with progressive repair for
//!   noisy model output.
//! - **[`planner`]**: the `{plan, actions, final, thought}` envelope —
//!   prompt assembly ([`PromptCache`]), validation, and the protocol loop
//!   ([`run_planner_turn`]).
//! - **[`tools`]**: per-request [`ToolRegistry`] with alias-tolerant lookup
//!   and argument repair.
//! - **[`heuristics`]**: conservative natural-language → tool-call
//!   inference ([`infer_tool_call`]).
//! - **[`compress`]**: context compaction under a token budget
//!   ([`compact`], [`ContextStats`]).
//! - **[`safety`]**: path/shell policy, the mutation boundary, and the
//!   pending-confirmation map ([`PendingConfirmations`]).
//! - **[`pipeline`]**: the request handler ([`Gateway`]) and fallback
//!   flows; no HTTP dependency — the `serve` crate maps replies onto axum.
//!
//! The gateway never executes tools itself: it only emits `tool_calls` for
//! the downstream OpenAI-compatible client to run.

pub mod compress;
pub mod config;
pub mod error;
pub mod extract;
pub mod heuristics;
pub mod openai;
pub mod pipeline;
pub mod planner;
pub mod safety;
pub mod tools;
pub mod upstream;

pub use compress::{compact, CompactionConfig, ContextStats};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use extract::{try_parse_model_output, try_repair_planner_output};
pub use heuristics::{infer_tool_call, InferredCall};
pub use openai::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChunkUsage,
    MessageContent, ToolCallMsg, ToolDef,
};
pub use pipeline::{parse_directives, Gateway, GatewayReply, SseEmitter};
pub use planner::{
    run_planner_turn, validate_envelope, PlannerAction, PlannerOutput, PlannerTurn, PromptCache,
};
pub use safety::{
    is_proceed_reply, is_sensitive_path, is_unsafe_path_input, PendingConfirmations, SafetyPolicy,
    ShellPolicy, ShellVerdict,
};
pub use tools::{normalize_args_for_tool, norm_tool_name, ToolInfo, ToolRegistry};
pub use upstream::{
    ChatStore, EphemeralChatStore, HttpUpstreamClient, HttpUpstreamConfig, MockUpstream,
    RequestSigner, SendMessageOptions, SseLineFramer, StreamChunk, ThinkTagSplitter,
    ThinkingDedupFilter, TokenSource, UpstreamClient, UpstreamFeatures, UpstreamMessage,
};

/// When running `cargo test -p trellis`, initializes tracing from `RUST_LOG`
/// so unit tests in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
