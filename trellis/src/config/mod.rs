//! Gateway configuration snapshot from `PROXY_*` environment toggles.
//!
//! [`env_config::load_and_apply`] populates the environment first (env >
//! `.env` > XDG); this module only reads it. Toggles accept `"1"/"0"` and
//! `"on"/"off"` via [`env_config::parse_flag`].

use env_config::{env_flag, env_usize};

use crate::compress::CompactionConfig;

/// Feature switches and limits for one gateway process.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Verbose structured logs.
    pub debug: bool,
    /// Create a fresh upstream chat per request.
    pub new_chat_per_request: bool,
    /// Expose `webfetch`/`web_search` to the planner.
    pub allow_web_search: bool,
    /// Max planner iterations per request.
    pub tool_loop_limit: usize,
    /// Attach `usage` to streamed completions.
    pub include_usage: bool,
    /// JSON-repair retry budget.
    pub planner_max_retries: usize,
    /// Mutation-boundary pre-limit on planned actions.
    pub max_actions_per_turn: usize,
    /// Permit mutation tools in raw-array mode.
    pub allow_raw_mutations: bool,
    /// Default `enable_thinking` for upstream turns.
    pub default_thinking: bool,
    /// Reset compaction state instead of carrying summaries forward.
    pub compact_reset: bool,
    /// Let the upstream replay its own server-side history. When both this
    /// and `compact_reset` are set, history reuse wins: the upstream gets
    /// only the latest turn and compaction still reports its stats.
    pub use_upstream_history: bool,
    /// Bound of the planner prompt cache (FIFO eviction).
    pub prompt_cache_entries: usize,
    pub compaction: CompactionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            debug: false,
            new_chat_per_request: false,
            allow_web_search: false,
            tool_loop_limit: 3,
            include_usage: true,
            planner_max_retries: 1,
            max_actions_per_turn: 3,
            allow_raw_mutations: false,
            default_thinking: true,
            compact_reset: false,
            use_upstream_history: false,
            prompt_cache_entries: 8,
            compaction: CompactionConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            debug: env_flag("PROXY_DEBUG", d.debug),
            new_chat_per_request: env_flag("PROXY_NEW_CHAT_PER_REQUEST", d.new_chat_per_request),
            allow_web_search: env_flag("PROXY_ALLOW_WEB_SEARCH", d.allow_web_search),
            tool_loop_limit: env_usize("PROXY_TOOL_LOOP_LIMIT", d.tool_loop_limit),
            include_usage: env_flag("PROXY_INCLUDE_USAGE", d.include_usage),
            planner_max_retries: env_usize("PROXY_PLANNER_MAX_RETRIES", d.planner_max_retries),
            max_actions_per_turn: env_usize("PROXY_MAX_ACTIONS_PER_TURN", d.max_actions_per_turn),
            allow_raw_mutations: env_flag("PROXY_ALLOW_RAW_MUTATIONS", d.allow_raw_mutations),
            default_thinking: env_flag("PROXY_DEFAULT_THINKING", d.default_thinking),
            compact_reset: env_flag("PROXY_COMPACT_RESET", d.compact_reset),
            use_upstream_history: env_flag("PROXY_USE_GLM_HISTORY", d.use_upstream_history),
            prompt_cache_entries: env_usize("PROXY_PROMPT_CACHE_ENTRIES", d.prompt_cache_entries),
            compaction: CompactionConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let c = GatewayConfig::default();
        assert!(!c.debug);
        assert!(!c.new_chat_per_request);
        assert!(!c.allow_web_search);
        assert_eq!(c.tool_loop_limit, 3);
        assert!(c.include_usage);
        assert_eq!(c.planner_max_retries, 1);
        assert_eq!(c.max_actions_per_turn, 3);
        assert!(!c.allow_raw_mutations);
        assert!(c.default_thinking);
        assert_eq!(c.prompt_cache_entries, 8);
    }

    #[test]
    fn from_env_reads_on_off_strings() {
        std::env::set_var("PROXY_DEBUG", "on");
        std::env::set_var("PROXY_INCLUDE_USAGE", "0");
        let c = GatewayConfig::from_env();
        assert!(c.debug);
        assert!(!c.include_usage);
        std::env::remove_var("PROXY_DEBUG");
        std::env::remove_var("PROXY_INCLUDE_USAGE");
    }
}
