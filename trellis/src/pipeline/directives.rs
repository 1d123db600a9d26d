//! Slash directives embedded in the latest user message.
//!
//! `/system <text>` injects extra system instructions; `/test ...` toggles
//! test branches; `/thinking`, `/search`, `/auto_search` override feature
//! defaults. All directive lines are stripped before the text reaches the
//! planner or heuristics.

use once_cell::sync::Lazy;
use regex::Regex;

use env_config::parse_flag;

static TOGGLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*/(thinking|search|auto_search)\s+(\S+)\s*$").expect("toggle regex")
});

static SYSTEM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*/system\s+(.+)$").expect("system regex"));

static TEST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*/test\s+([a-z\-]+)\s*$").expect("test regex"));

/// Parsed directives plus the cleaned user text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub extra_system: Option<String>,
    /// `/test tool-loop`: force the tool-loop branch.
    pub test_tool_loop: bool,
    /// `/test tool-result`: force the tool-loop-result recovery branch.
    pub test_tool_result: bool,
    /// `/test no-heuristics`: disable the inferrers for this turn.
    pub no_heuristics: bool,
    pub thinking: Option<bool>,
    pub web_search: Option<bool>,
    pub auto_search: Option<bool>,
    /// The user text with directive lines removed.
    pub cleaned: String,
}

/// Extracts directives from the latest user text.
pub fn parse_directives(user_text: &str) -> Directives {
    let mut directives = Directives::default();

    for caps in SYSTEM_LINE.captures_iter(user_text) {
        directives.extra_system = Some(caps[1].trim().to_string());
    }
    for caps in TEST_LINE.captures_iter(user_text) {
        match &caps[1] {
            "tool-loop" => directives.test_tool_loop = true,
            "tool-result" => directives.test_tool_result = true,
            "no-heuristics" => directives.no_heuristics = true,
            _ => {}
        }
    }
    for caps in TOGGLE_LINE.captures_iter(user_text) {
        let value = parse_flag(&caps[2]);
        match &caps[1] {
            "thinking" => directives.thinking = value,
            "search" => directives.web_search = value,
            "auto_search" => directives.auto_search = value,
            _ => {}
        }
    }

    let cleaned: Vec<&str> = user_text
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.starts_with("/system ")
                || t.starts_with("/test ")
                || TOGGLE_LINE.is_match(line))
        })
        .collect();
    directives.cleaned = cleaned.join("\n").trim().to_string();
    directives
}
