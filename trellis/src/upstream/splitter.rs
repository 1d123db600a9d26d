//! Splits upstream text into thinking and content streams.
//!
//! The upstream wraps reasoning in `<think>` or `<details>` tags that can be
//! cut anywhere by chunking. The splitter scans tag-by-tag, flips mode on
//! think/details tags, passes every other tag through as data, and holds an
//! incomplete `<...` suffix until the closing `>` arrives. Tag nesting is not
//! tracked beyond the single in/out boolean; a nested `<think>` inside
//! `<details>` is swallowed without a second mode change.

use once_cell::sync::Lazy;
use regex::Regex;

/// One typed event from the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitEvent {
    Thinking(String),
    /// Falling edge of a thinking section. Emitted once per closing tag.
    ThinkingEnd,
    Content(String),
}

static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</?\s*([A-Za-z0-9:-]+)").expect("tag regex"));

/// Stateful tag scanner; feed text with [`push`](ThinkTagSplitter::push),
/// then drain with [`finalize`](ThinkTagSplitter::finalize) at stream end.
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    pending: String,
    in_thinking: bool,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_thinking(&self) -> bool {
        self.in_thinking
    }

    /// Feeds a text chunk and returns the events it completes.
    pub fn push(&mut self, text: &str) -> Vec<SplitEvent> {
        self.pending.push_str(text);
        let mut out = Vec::new();
        loop {
            let Some(lt) = self.pending.find('<') else {
                if !self.pending.is_empty() {
                    let data = std::mem::take(&mut self.pending);
                    self.emit_data(&mut out, data);
                }
                break;
            };
            if lt > 0 {
                let data: String = self.pending.drain(..lt).collect();
                self.emit_data(&mut out, data);
            }
            let Some(gt) = self.pending.find('>') else {
                // Incomplete tag: wait for more input.
                break;
            };
            let tag: String = self.pending.drain(..=gt).collect();
            self.handle_tag(&mut out, &tag);
        }
        out
    }

    /// Drains residual state at end of stream: leftover text is emitted
    /// unless it still looks like an unfinished think/details tag, and a
    /// terminal [`SplitEvent::ThinkingEnd`] closes an open thinking section.
    pub fn finalize(&mut self) -> Vec<SplitEvent> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            if !looks_like_unfinished_think_tag(&rest) {
                self.emit_data(&mut out, rest);
            }
        }
        if self.in_thinking {
            self.in_thinking = false;
            out.push(SplitEvent::ThinkingEnd);
        }
        out
    }

    fn emit_data(&self, out: &mut Vec<SplitEvent>, data: String) {
        if data.is_empty() {
            return;
        }
        if self.in_thinking {
            out.push(SplitEvent::Thinking(data));
        } else {
            out.push(SplitEvent::Content(data));
        }
    }

    fn handle_tag(&mut self, out: &mut Vec<SplitEvent>, tag: &str) {
        let name = TAG_NAME
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_ascii_lowercase());
        match name.as_deref() {
            Some("think") | Some("details") => {
                if tag.starts_with("</") {
                    self.in_thinking = false;
                    out.push(SplitEvent::ThinkingEnd);
                } else {
                    self.in_thinking = true;
                }
            }
            _ => self.emit_data(out, tag.to_string()),
        }
    }
}

/// True when `s` could still grow into a `<think...>` or `<details...>` tag
/// (so it must not be emitted at finalize).
fn looks_like_unfinished_think_tag(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('<') else {
        return false;
    };
    if rest.contains('>') {
        return false;
    }
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let name = name.to_ascii_lowercase();
    "think".starts_with(&name) || "details".starts_with(&name)
}
