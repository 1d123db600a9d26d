//! Compaction configuration for context window management.

use env_config::env_usize;

/// Limits for fitting a conversation under the upstream context budget.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Maximum context size in estimated tokens.
    pub max_tokens: usize,
    /// Tokens reserved for the upstream's generation.
    pub reserve_tokens: usize,
    /// Extra slack subtracted from the budget on top of the reserve.
    pub safety_margin: usize,
    /// How many most-recent messages are pinned before older ones drop.
    pub recent_messages: usize,
    /// Never drop below this many pinned messages.
    pub min_recent_messages: usize,
    /// Cap for the synthesized summary message.
    pub summary_max_chars: usize,
    /// Tool results longer than this many lines are middle-elided.
    pub tool_max_lines: usize,
    /// Tool results longer than this many chars are middle-elided.
    pub tool_max_chars: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_tokens: 128_000,
            reserve_tokens: 4_096,
            safety_margin: 1_024,
            recent_messages: 20,
            min_recent_messages: 4,
            summary_max_chars: 2_000,
            tool_max_lines: 80,
            tool_max_chars: 8_000,
        }
    }
}

impl CompactionConfig {
    /// Reads `PROXY_CONTEXT_*` overrides on top of the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_tokens: env_usize("PROXY_CONTEXT_MAX_TOKENS", d.max_tokens),
            reserve_tokens: env_usize("PROXY_CONTEXT_RESERVE_TOKENS", d.reserve_tokens),
            safety_margin: env_usize("PROXY_CONTEXT_SAFETY_MARGIN", d.safety_margin),
            recent_messages: env_usize("PROXY_CONTEXT_RECENT_MESSAGES", d.recent_messages),
            min_recent_messages: env_usize(
                "PROXY_CONTEXT_MIN_RECENT_MESSAGES",
                d.min_recent_messages,
            ),
            summary_max_chars: env_usize("PROXY_CONTEXT_SUMMARY_MAX_CHARS", d.summary_max_chars),
            tool_max_lines: env_usize("PROXY_CONTEXT_TOOL_MAX_LINES", d.tool_max_lines),
            tool_max_chars: env_usize("PROXY_CONTEXT_TOOL_MAX_CHARS", d.tool_max_chars),
        }
    }

    /// Tokens actually available for messages.
    pub fn budget(&self) -> usize {
        self.max_tokens
            .saturating_sub(self.reserve_tokens)
            .saturating_sub(self.safety_margin)
    }
}
