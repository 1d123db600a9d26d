//! Suppresses thinking text the upstream re-emits.
//!
//! Two kinds of replay show up in practice: a new thinking segment that
//! restarts with the previous segment's text, and a content body that opens
//! with the just-finished reasoning (bare, block-quoted, or under a
//! "Thought Process:" heading). The filter swallows both, buffering content
//! only while it still looks like a replay and never past a 4000-char cap.

use super::splitter::SplitEvent;

/// Soft cap for buffered content while deciding whether it replays thinking.
const CONTENT_BUFFER_CAP: usize = 4000;

/// Previous thinking segments shorter than this are never treated as the
/// source of a replay.
const REPLAY_MIN_LEN: usize = 50;

const HEADINGS: [&str; 2] = ["Thought Process:", "Thinking:"];

#[derive(Debug, Default)]
pub struct ThinkingDedupFilter {
    /// Completed previous segment, replay source for the next one.
    prev_segment: String,
    /// Current segment text, sanitized.
    segment: String,
    segment_started: bool,
    /// When set, index into `prev_segment` up to which incoming text is replay.
    replay_at: Option<usize>,
    /// Armed by a non-empty segment's end; content is buffered while set.
    dedupe_pending: bool,
    content_buf: String,
    /// Thinking text content stripping compares against.
    strip_source: String,
}

impl ThinkingDedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one splitter event; returns the events to forward.
    pub fn push(&mut self, event: SplitEvent) -> Vec<SplitEvent> {
        match event {
            SplitEvent::Thinking(text) => self
                .on_thinking(&text)
                .map(SplitEvent::Thinking)
                .into_iter()
                .collect(),
            SplitEvent::ThinkingEnd => {
                self.on_thinking_end();
                vec![SplitEvent::ThinkingEnd]
            }
            SplitEvent::Content(text) => self
                .on_content(&text)
                .map(SplitEvent::Content)
                .into_iter()
                .collect(),
        }
    }

    /// Flushes buffered content at stream end.
    pub fn finalize(&mut self) -> Vec<SplitEvent> {
        if !self.dedupe_pending || self.content_buf.is_empty() {
            self.dedupe_pending = false;
            return Vec::new();
        }
        self.dedupe_pending = false;
        let buffered = std::mem::take(&mut self.content_buf);
        let outcome = strip_thought_process(&buffered, &self.strip_source);
        // A still-pending buffer at stream end is kept rather than guessed at.
        let text = if outcome.pending {
            strip_leading_blockquote(&buffered).to_string()
        } else {
            outcome.text
        };
        if text.is_empty() {
            Vec::new()
        } else {
            vec![SplitEvent::Content(text)]
        }
    }

    fn on_thinking(&mut self, text: &str) -> Option<String> {
        let mut t = sanitize_thinking(text);
        if !self.segment_started {
            t = t.trim_start().to_string();
        }
        if t.is_empty() {
            return None;
        }
        if !self.segment_started {
            self.segment_started = true;
            // Proper prefix of a long-enough previous segment arms replay.
            if self.prev_segment.len() > REPLAY_MIN_LEN
                && t.len() < self.prev_segment.len()
                && self.prev_segment.starts_with(&t)
            {
                self.replay_at = Some(0);
            }
        }
        self.segment.push_str(&t);

        let Some(idx) = self.replay_at else {
            return Some(t);
        };
        let expected = &self.prev_segment[idx..];
        let common = common_prefix_len(expected, &t);
        if common == t.len() {
            let next = idx + common;
            self.replay_at = if next >= self.prev_segment.len() {
                None
            } else {
                Some(next)
            };
            None
        } else {
            // Divergence: replay over, emit the unseen remainder.
            self.replay_at = None;
            Some(t[common..].to_string())
        }
    }

    fn on_thinking_end(&mut self) {
        self.segment_started = false;
        self.replay_at = None;
        if self.segment.is_empty() {
            return;
        }
        let segment = std::mem::take(&mut self.segment);
        self.dedupe_pending = true;
        self.strip_source = segment.clone();
        self.prev_segment = segment;
    }

    fn on_content(&mut self, text: &str) -> Option<String> {
        if !self.dedupe_pending {
            return Some(text.to_string());
        }
        self.content_buf.push_str(text);
        let outcome = strip_thought_process(&self.content_buf, &self.strip_source);
        if outcome.pending && self.content_buf.len() <= CONTENT_BUFFER_CAP {
            return None;
        }
        self.dedupe_pending = false;
        // Past the cap with no verdict, keep the buffer rather than guess.
        let text = if outcome.pending {
            strip_leading_blockquote(&self.content_buf).to_string()
        } else {
            outcome.text
        };
        self.content_buf.clear();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Removes stray tag fragments the upstream leaks into thinking text.
fn sanitize_thinking(text: &str) -> String {
    text.replace("<think>", "")
        .replace("<details>", "")
        .replace("true\">", "")
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    let bytes = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .take_while(|(x, y)| x == y)
        .count();
    // Back off to a char boundary so the remainder slices cleanly.
    let mut n = bytes;
    while n > 0 && !b.is_char_boundary(n) {
        n -= 1;
    }
    n
}

pub(crate) struct StripOutcome {
    pub text: String,
    /// True when the buffer may still grow into a replay; keep accumulating.
    pub pending: bool,
}

/// Strips a replayed reasoning prelude from `buffered` content.
///
/// Order of attempts: a `Thought Process:`/`Thinking:` heading followed by a
/// blank-line-terminated block; the accumulated `thinking` text itself,
/// optionally behind a heading word and `>` quote markers; otherwise the
/// buffer is kept. A leading block-quote section is removed from whatever
/// remains.
pub(crate) fn strip_thought_process(buffered: &str, thinking: &str) -> StripOutcome {
    let lead = buffered.trim_start();

    for heading in HEADINGS {
        if let Some(pos) = buffered.find(heading) {
            if buffered[..pos].trim().is_empty() {
                let after = pos + heading.len();
                return match buffered[after..].find("\n\n") {
                    Some(blank) => StripOutcome {
                        text: strip_leading_blockquote(&buffered[after + blank + 2..]).to_string(),
                        pending: false,
                    },
                    // Heading seen but its block is not terminated yet.
                    None => StripOutcome {
                        text: String::new(),
                        pending: true,
                    },
                };
            }
        }
        if !lead.is_empty() && heading.starts_with(lead) {
            return StripOutcome {
                text: String::new(),
                pending: true,
            };
        }
    }

    if !thinking.is_empty() {
        let mut rest = lead;
        for word in ["Thought Process", "Thinking"] {
            if let Some(r) = rest.strip_prefix(word) {
                rest = r.trim_start_matches([':', ' ']);
                break;
            }
        }
        let rest = rest.trim_start_matches(['>', ' ', '\n']);
        if let Some(suffix) = rest.strip_prefix(thinking) {
            return StripOutcome {
                text: strip_leading_blockquote(suffix).to_string(),
                pending: false,
            };
        }
        if !rest.is_empty() && thinking.starts_with(rest) {
            return StripOutcome {
                text: String::new(),
                pending: true,
            };
        }
    }

    StripOutcome {
        text: strip_leading_blockquote(buffered).to_string(),
        pending: false,
    }
}

/// Drops a leading run of `>` block-quote lines (and the blank lines that
/// close it), returning the suffix unchanged.
fn strip_leading_blockquote(text: &str) -> &str {
    let mut rest = text;
    let mut stripped_any = false;
    loop {
        if rest.is_empty() {
            break;
        }
        let line_end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
        let trimmed = rest[..line_end].trim();
        if trimmed.starts_with('>') {
            stripped_any = true;
            rest = &rest[line_end..];
        } else if trimmed.is_empty() {
            // Blank lines inside the leading region ride along with the quote.
            rest = &rest[line_end..];
        } else {
            break;
        }
    }
    if stripped_any {
        rest
    } else {
        text
    }
}
