//! Tool registry and argument repair.
//!
//! Built per request from the client's declared tools; nothing here executes
//! anything — the gateway only emits `tool_calls` for the downstream client
//! to run.

mod normalize;
mod registry;

pub use normalize::normalize_args_for_tool;
pub use registry::{norm_tool_name, pick_arg_key, ToolInfo, ToolRegistry};
