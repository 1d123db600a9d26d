//! Gateway error kinds surfaced to clients.
//!
//! Each variant maps to one wire-visible reason string ([`GatewayError::kind`]).
//! Parse and schema errors are retried locally by the planner loop before they
//! surface; tool-level errors downgrade to content responses or confirmation
//! calls per the propagation policy in the pipeline.

use thiserror::Error;

/// Errors produced by the gateway core.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Planner output could not be parsed as JSON after all repair retries.
    #[error("planner output is not valid JSON: {0}")]
    InvalidJson(String),

    /// A planned action names a tool absent from the request's registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Action arguments are not a JSON object or fail the declared schema.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidToolArgs { tool: String, reason: String },

    /// A mutation heuristic fired without a usable path argument.
    #[error("missing path for mutating tool call")]
    MissingPath,

    /// A dangerous but allowed shell action needs the user to confirm first.
    #[error("confirmation required before running: {command}")]
    ConfirmationRequired { command: String },

    /// Web tools were requested but `PROXY_ALLOW_WEB_SEARCH` is off.
    #[error("web tools are disabled")]
    WebToolsDisabled,

    /// Path failed the path-input or sensitive-path policy.
    #[error("unsafe path: {0}")]
    UnsafePath(String),

    /// Shell command failed the allow/deny policy.
    #[error("unsafe shell command: {0}")]
    UnsafeShell(String),

    /// More actions were planned than `PROXY_MAX_ACTIONS_PER_TURN` permits.
    #[error("action limit exceeded: planned {planned}, limit {limit}")]
    ActionLimitExceeded { planned: usize, limit: usize },

    /// The upstream stream reported or produced an error mid-response.
    #[error("upstream stream error: {0}")]
    UpstreamStream(String),

    /// The upstream stalled past the idle timeout or the request deadline.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),
}

impl GatewayError {
    /// Stable reason string used in wire payloads and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidJson(_) => "invalid_json",
            GatewayError::UnknownTool(_) => "unknown_tool",
            GatewayError::InvalidToolArgs { .. } => "invalid_tool_args",
            GatewayError::MissingPath => "missing_path",
            GatewayError::ConfirmationRequired { .. } => "confirmation_required",
            GatewayError::WebToolsDisabled => "web_tools_disabled",
            GatewayError::UnsafePath(_) => "unsafe_path",
            GatewayError::UnsafeShell(_) => "unsafe_shell",
            GatewayError::ActionLimitExceeded { .. } => "action_limit_exceeded",
            GatewayError::UpstreamStream(_) => "upstream_stream_error",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
        }
    }

    /// True when the error terminates the current turn (transport-level),
    /// as opposed to downgrading to a content response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamStream(_) | GatewayError::UpstreamTimeout(_)
        )
    }
}
