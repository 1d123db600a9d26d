//! Locate and coerce JSON buried in noisy model output.
//!
//! The upstream is instructed to answer with a bare JSON envelope but wraps
//! it in prose, code fences, comments, or half-escaped strings often enough
//! that parsing is a pipeline: extract the first balanced block, try as-is,
//! then apply repairs one at a time and retry after each.

use serde_json::Value;

/// Parses model output into JSON.
///
/// In `strict` mode the whole trimmed input (after fence stripping) must be
/// the JSON value; otherwise the first balanced `{…}` block is used, with a
/// `[…]` block accepted as fallback for raw tool-call arrays.
pub fn try_parse_model_output(raw: &str, strict: bool) -> Option<Value> {
    let unfenced = strip_code_fences(raw);
    let trimmed = unfenced.trim();

    // Whichever balanced block opens first wins, so a raw tool-call array
    // is not shadowed by the objects inside it.
    let obj_at = trimmed.find('{');
    let arr_at = trimmed.find('[');
    let candidate = match (obj_at, arr_at) {
        (Some(o), Some(a)) if a < o => extract_first_json_array(trimmed)
            .or_else(|| extract_first_json_object(trimmed))?,
        (_, _) => extract_first_json_object(trimmed)
            .or_else(|| extract_first_json_array(trimmed))?,
    };
    if strict && candidate.len() != trimmed.len() {
        return None;
    }
    parse_with_repairs(candidate)
}

/// Recovers a planner envelope from loose output: the widest balanced
/// object whose keys include `plan` or `actions`, wherever it sits in the
/// text.
pub fn try_repair_planner_output(raw: &str) -> Option<Value> {
    let unfenced = strip_code_fences(raw);
    let text = unfenced.trim();

    let mut best: Option<Value> = None;
    let mut best_len = 0usize;
    for (i, c) in text.char_indices() {
        if c != '{' {
            continue;
        }
        let Some(candidate) = extract_balanced(&text[i..], '{', '}') else {
            continue;
        };
        if candidate.len() <= best_len {
            continue;
        }
        let Some(value) = parse_with_repairs(candidate) else {
            continue;
        };
        let has_envelope_keys = value
            .as_object()
            .map(|o| o.contains_key("plan") || o.contains_key("actions"))
            .unwrap_or(false);
        if has_envelope_keys {
            best_len = candidate.len();
            best = Some(value);
        }
    }
    best
}

/// Returns the first balanced `{…}` substring, honoring strings and escapes.
pub fn extract_first_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    extract_balanced(&s[start..], '{', '}')
}

/// Returns the first balanced `[…]` substring, honoring strings and escapes.
pub fn extract_first_json_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    extract_balanced(&s[start..], '[', ']')
}

fn extract_balanced(s: &str, open: char, close: char) -> Option<&str> {
    debug_assert!(s.starts_with(open));
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes fenced code blocks (``` ```lang\n…\n``` ```), keeping the inner text.
pub fn strip_code_fences(raw: &str) -> String {
    if !raw.contains("```") {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find("```") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 3..];
        // Skip the info string on the fence line.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
        let body = &after[body_start..];
        match body.find("```") {
            Some(close) => {
                out.push_str(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                // Unterminated fence: keep the body, drop the marker.
                out.push_str(body);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Tries `serde_json` as-is, then after each repair in order: comment
/// removal, trailing-comma removal, control-character escaping in strings,
/// newline escaping inside `"arguments"` values.
fn parse_with_repairs(candidate: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str(candidate) {
        return Some(v);
    }
    let mut repaired = strip_json_comments(candidate);
    if let Ok(v) = serde_json::from_str(&repaired) {
        return Some(v);
    }
    repaired = strip_trailing_commas(&repaired);
    if let Ok(v) = serde_json::from_str(&repaired) {
        return Some(v);
    }
    repaired = escape_control_chars_in_strings(&repaired);
    if let Ok(v) = serde_json::from_str(&repaired) {
        return Some(v);
    }
    repaired = escape_newlines_in_arguments(&repaired);
    serde_json::from_str(&repaired).ok()
}

/// Removes `/*…*/` and `//` comments outside of string literals.
fn strip_json_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes: Vec<char> = s.chars().collect();
    let mut i = 0;
    let mut in_string = false;
    let mut escaped = false;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if i + 1 < bytes.len() && bytes[i + 1] == '/' => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < bytes.len() && bytes[i + 1] == '*' => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == '*' && bytes[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Removes commas that directly precede `}` or `]` (outside strings).
fn strip_trailing_commas(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            continue;
        }
        if c == '}' || c == ']' {
            // Drop a dangling comma (and the whitespace after it).
            while let Some(last) = out.chars().last() {
                if last.is_whitespace() {
                    out.pop();
                } else {
                    break;
                }
            }
            if out.ends_with(',') {
                out.pop();
            }
        }
        out.push(c);
    }
    out
}

/// Escapes bare `\n`, `\r`, and `\t` characters inside string literals.
fn escape_control_chars_in_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' => {
                    out.push(c);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// Rewrites literal newlines inside the string value of an `"arguments"` key.
///
/// This targets the common failure where a nested argument payload was
/// serialized with real newlines; the general string pass can miss it when
/// earlier damage desynced the string tracking.
fn escape_newlines_in_arguments(s: &str) -> String {
    let mut out = String::new();
    let mut rest = s;
    while let Some(pos) = rest.find("\"arguments\"") {
        let after_key = pos + "\"arguments\"".len();
        out.push_str(&rest[..after_key]);
        rest = &rest[after_key..];
        let Some(colon) = rest.find(':') else {
            break;
        };
        out.push_str(&rest[..=colon]);
        rest = &rest[colon + 1..];
        let trimmed_len = rest.len() - rest.trim_start().len();
        out.push_str(&rest[..trimmed_len]);
        rest = &rest[trimmed_len..];
        if !rest.starts_with('"') {
            continue;
        }
        // Find the end of the string value, escaping as we go.
        out.push('"');
        let mut escaped = false;
        let mut consumed = 1;
        for c in rest[1..].chars() {
            consumed += c.len_utf8();
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' => {
                    out.push(c);
                    break;
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}
