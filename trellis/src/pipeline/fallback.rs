//! Fallback flows: no planner, content streamed or buffered verbatim.
//!
//! When tools were declared but the planner path was not selected, the raw
//! output is still scanned for a bare JSON tool-call array; allowed calls
//! are emitted as `tool_calls`, everything else streams as content.

use tracing::debug;

use crate::config::GatewayConfig;
use crate::extract::try_parse_model_output;
use crate::openai::ToolCallMsg;
use crate::planner::parse_raw_tool_calls;
use crate::safety::is_raw_allowed;
use crate::tools::{normalize_args_for_tool, norm_tool_name, ToolRegistry};

/// Scans fallback output for a raw tool-call array.
///
/// Returns the allowed calls, or `None` when the text is not a tool-call
/// array (or nothing survives the raw allowlist) — in which case the text
/// streams as content.
pub fn scan_raw_tool_calls(
    config: &GatewayConfig,
    registry: &ToolRegistry,
    content: &str,
) -> Option<Vec<ToolCallMsg>> {
    if registry.is_empty() {
        return None;
    }
    let value = try_parse_model_output(content, false)?;
    if !value.is_array() {
        return None;
    }
    let calls = parse_raw_tool_calls(&value)?;

    let mut out = Vec::new();
    for call in calls {
        let norm = norm_tool_name(&call.name);
        if !is_raw_allowed(&norm) && !config.allow_raw_mutations {
            debug!(tool = %call.name, "raw fallback call outside allowlist dropped");
            continue;
        }
        let (name, args) = match registry.find(&call.name) {
            Some(info) => match normalize_args_for_tool(info, call.args) {
                Ok(args) => (info.name().to_string(), args),
                Err(_) => continue,
            },
            None => (call.name, call.args),
        };
        out.push(ToolCallMsg::function(name, args.to_string()));
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
