//! Context compaction: fit a message list under the upstream token budget.
//!
//! Token counts are the cheap `ceil(chars / 4)` estimate over serialized
//! messages. Old messages drop first, silently when the pinned tail fits,
//! otherwise behind a single synthesized summary message; as a last resort
//! the pinned tail itself shrinks down to `min_recent_messages`.

mod config;

pub use config::CompactionConfig;

use crate::openai::{ChatMessage, MessageContent};

/// What compaction did to the request, surfaced via `X-Proxy-Context-*`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub used_tokens: usize,
    pub total_tokens: usize,
    pub dropped_messages: usize,
    pub summary_added: bool,
}

/// Estimated tokens for one message: `ceil(serialized_chars / 4)`.
pub fn estimate_message_tokens(message: &ChatMessage) -> usize {
    let serialized = serde_json::to_string(message).unwrap_or_default();
    serialized.chars().count().div_ceil(4)
}

/// Estimated tokens for a whole list.
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Compacts `messages` under the configured budget.
///
/// Tool results are truncated first; then, if the list still overflows:
/// older messages drop (silently when system + pinned tail fit, else behind
/// a summary), and finally pinned messages drop oldest-first down to
/// `min_recent_messages`.
pub fn compact(
    messages: Vec<ChatMessage>,
    config: &CompactionConfig,
) -> (Vec<ChatMessage>, ContextStats) {
    let mut messages = messages;
    for m in &mut messages {
        if m.role.eq_ignore_ascii_case("tool") {
            let text = m.text();
            let truncated = truncate_tool_result(&text, config);
            if truncated != text {
                m.content = Some(MessageContent::Text(truncated));
            }
        }
    }

    let budget = config.budget();
    let total = estimate_tokens(&messages);
    if total <= budget {
        let stats = ContextStats {
            used_tokens: total,
            total_tokens: config.max_tokens,
            dropped_messages: 0,
            summary_added: false,
        };
        return (messages, stats);
    }

    let system_len = messages
        .iter()
        .take_while(|m| m.role.eq_ignore_ascii_case("system"))
        .count();
    let rest = messages.len() - system_len;
    let pinned_start = system_len + rest.saturating_sub(config.recent_messages);

    let system: Vec<ChatMessage> = messages[..system_len].to_vec();
    let middle: Vec<ChatMessage> = messages[system_len..pinned_start].to_vec();
    let mut pinned: Vec<ChatMessage> = messages[pinned_start..].to_vec();

    let mut dropped = middle.len();
    let mut summary_added = false;
    let mut result: Vec<ChatMessage>;

    let kept = estimate_tokens(&system) + estimate_tokens(&pinned);
    if kept <= budget {
        // The tail fits: older messages vanish without a trace.
        result = system;
        result.extend(pinned);
    } else {
        let summary = summarize_dropped(&middle, config.summary_max_chars);
        result = system;
        if let Some(summary) = summary {
            result.push(summary);
            summary_added = true;
        }
        // Shrink the pinned tail from the oldest side until we fit.
        let base = estimate_tokens(&result);
        while pinned.len() > config.min_recent_messages
            && base + estimate_tokens(&pinned) > budget
        {
            pinned.remove(0);
            dropped += 1;
        }
        result.extend(pinned);
    }

    let stats = ContextStats {
        used_tokens: estimate_tokens(&result),
        total_tokens: config.max_tokens,
        dropped_messages: dropped,
        summary_added,
    };
    (result, stats)
}

/// Leading text of every synthesized summary message; used to recognize a
/// summary carried in from an earlier turn.
const SUMMARY_PREFIX: &str = "Summary of ";
const SUMMARY_MARKER: &str = "dropped for context";

/// True for system messages this module synthesized on a previous turn.
pub fn is_compaction_summary(message: &ChatMessage) -> bool {
    if !message.role.eq_ignore_ascii_case("system") {
        return false;
    }
    let text = message.text();
    text.starts_with(SUMMARY_PREFIX) && text.contains(SUMMARY_MARKER)
}

/// Builds the summary system message for dropped messages: user intents and
/// tool outcomes, capped at `max_chars`.
fn summarize_dropped(dropped: &[ChatMessage], max_chars: usize) -> Option<ChatMessage> {
    if dropped.is_empty() {
        return None;
    }
    let mut lines = vec![format!(
        "{SUMMARY_PREFIX}{} earlier messages {SUMMARY_MARKER}:",
        dropped.len()
    )];
    for m in dropped {
        let text = m.text();
        let head: String = text.chars().take(120).collect();
        let head = head.replace('\n', " ");
        if head.trim().is_empty() {
            continue;
        }
        match m.role.to_ascii_lowercase().as_str() {
            "user" => lines.push(format!("- user asked: {head}")),
            "tool" => lines.push(format!("- tool result: {head}")),
            "assistant" => lines.push(format!("- assistant: {head}")),
            _ => {}
        }
    }
    let mut text = lines.join("\n");
    if text.chars().count() > max_chars {
        text = text.chars().take(max_chars).collect();
    }
    Some(ChatMessage::system(text))
}

/// Middle-elides a tool result that exceeds the line or char limits.
pub fn truncate_tool_result(content: &str, config: &CompactionConfig) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let over_lines = lines.len() > config.tool_max_lines;
    let over_chars = content.chars().count() > config.tool_max_chars;
    if !over_lines && !over_chars {
        return content.to_string();
    }

    let (head, tail) = if over_lines {
        let keep = config.tool_max_lines / 2;
        (
            lines[..keep].join("\n"),
            lines[lines.len() - keep..].join("\n"),
        )
    } else {
        let keep = config.tool_max_chars / 2;
        let chars: Vec<char> = content.chars().collect();
        (
            chars[..keep].iter().collect(),
            chars[chars.len() - keep..].iter().collect(),
        )
    };
    let elided = content
        .chars()
        .count()
        .saturating_sub(head.chars().count() + tail.chars().count());
    format!("{head}\n[truncated {elided} chars]\n{tail}")
}
