//! Planner/tool-call protocol.
//!
//! The upstream has no native tool calling; it is instructed to emit the
//! JSON envelope `{plan, actions, final, thought}` which is parsed with
//! progressive repair, validated, gated, and mapped onto OpenAI
//! `tool_calls` or assistant content.

mod envelope;
mod prompt;
mod turn;

pub use envelope::{
    parse_raw_tool_calls, validate_envelope, ActionSafety, PlannerAction, PlannerOutput,
    RawToolCall, RiskLevel,
};
pub use prompt::{build_planner_prompt, PromptCache, PromptOptions, SchemaStyle};
pub use turn::{
    make_confirmation_question, render_upstream_messages, run_planner_turn, todo_tools_allowed,
    PlannerOutcome, PlannerRequest, PlannerTurn,
};
