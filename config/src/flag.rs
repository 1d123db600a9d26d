//! Shared parsing for the gateway's string toggles: `"1"/"0"` and `"on"/"off"`.
//!
//! All `PROXY_*` feature switches use this, so a toggle set from `.env`, XDG
//! config, or a `/thinking on` slash directive parses identically.

/// Parses a toggle string. Accepts `1`/`0`, `on`/`off`, `true`/`false`,
/// `yes`/`no` (case-insensitive, trimmed). Anything else is `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Some(true),
        "0" | "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Reads a boolean toggle from the environment; unset or unparseable values
/// fall back to `default`.
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .as_deref()
        .and_then(parse_flag)
        .unwrap_or(default)
}

/// Reads a non-negative integer from the environment; unset or unparseable
/// values fall back to `default`.
pub fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_numeric_and_word_forms() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("on"), Some(true));
        assert_eq!(parse_flag("OFF"), Some(false));
        assert_eq!(parse_flag(" true "), Some(true));
        assert_eq!(parse_flag("no"), Some(false));
    }

    #[test]
    fn parse_flag_rejects_unknown() {
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
        assert_eq!(parse_flag("2"), None);
    }

    #[test]
    fn env_flag_uses_default_when_unset() {
        std::env::remove_var("FLAG_TEST_UNSET_XYZ");
        assert!(env_flag("FLAG_TEST_UNSET_XYZ", true));
        assert!(!env_flag("FLAG_TEST_UNSET_XYZ", false));
    }

    #[test]
    fn env_flag_reads_set_value() {
        std::env::set_var("FLAG_TEST_SET_XYZ", "off");
        assert!(!env_flag("FLAG_TEST_SET_XYZ", true));
        std::env::remove_var("FLAG_TEST_SET_XYZ");
    }

    #[test]
    fn env_usize_parses_and_defaults() {
        std::env::set_var("FLAG_TEST_USIZE_XYZ", "42");
        assert_eq!(env_usize("FLAG_TEST_USIZE_XYZ", 3), 42);
        std::env::set_var("FLAG_TEST_USIZE_XYZ", "not a number");
        assert_eq!(env_usize("FLAG_TEST_USIZE_XYZ", 3), 3);
        std::env::remove_var("FLAG_TEST_USIZE_XYZ");
    }
}
