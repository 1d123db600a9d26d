//! SSE line framing for the upstream transport.
//!
//! Accepts arbitrary byte chunks, yields complete `data:` payloads, and
//! carries partial lines (including split UTF-8 sequences) across reads.
//! `event:`, `id:`, retry and comment lines are dropped here; the payload
//! text is what the [`splitter`](crate::upstream::splitter) consumes.

/// Stateful framer: bytes in, `data:` payloads out.
#[derive(Debug, Default)]
pub struct SseLineFramer {
    buf: Vec<u8>,
}

impl SseLineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte chunk; returns the payloads of all `data:` lines that
    /// completed with this chunk, in order. The unterminated suffix is kept
    /// for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1]; // drop '\n'
            if let Some(payload) = data_payload(line) {
                out.push(payload);
            }
        }
        out
    }

    /// Emits the residual as a final line. Call once at upstream close.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

/// Extracts the payload of a `data:` line: prefix and at most one leading
/// space removed, then trimmed. Strips a trailing `\r`. Returns `None` for
/// every other line kind.
fn data_payload(line: &[u8]) -> Option<String> {
    let line = match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    };
    let text = String::from_utf8_lossy(line);
    let rest = text.strip_prefix("data:")?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some(rest.trim().to_string())
}
