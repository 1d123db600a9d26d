//! Path policy: reject inputs that escape the workspace or touch credentials.

/// Sensitive-name tokens: a basename is credential-like when it carries one
/// of these AND a `key`/`keys` token.
const CREDENTIAL_TOKENS: [&str; 8] = [
    "api",
    "access",
    "secret",
    "private",
    "ssh",
    "gpg",
    "signing",
    "encryption",
];

/// `.env` suffixes that are fine to read (templates, not live config).
const ENV_SAFE_SUFFIXES: [&str; 4] = ["example", "sample", "template", "dist"];

/// True for paths that must never be used as tool input: empty, NUL bytes,
/// `~` expansion, absolute (POSIX `/`, UNC `\\`, Windows drive), or any
/// `..` traversal.
pub fn is_unsafe_path_input(path: &str) -> bool {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed.contains('\0') {
        return true;
    }
    if trimmed.starts_with('~') {
        return true;
    }
    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return true;
    }
    let mut chars = trimmed.chars();
    if let (Some(drive), Some(':')) = (chars.next(), chars.next()) {
        if drive.is_ascii_alphabetic() {
            return true;
        }
    }
    trimmed
        .split(['/', '\\'])
        .any(|component| component == "..")
}

/// True for paths pointing at secrets: `.ssh`/`.git` directories, live
/// `.env` files, package-manager credential files, SSH keys, and basenames
/// whose tokens look like a credential key.
pub fn is_sensitive_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/").to_ascii_lowercase();
    let segments: Vec<&str> = normalized
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.iter().any(|s| *s == ".ssh" || *s == ".git") {
        return true;
    }
    let Some(basename) = segments.last() else {
        return false;
    };

    if *basename == ".env" {
        return true;
    }
    if let Some(suffix) = basename.strip_prefix(".env.") {
        return !ENV_SAFE_SUFFIXES.contains(&suffix);
    }
    if matches!(*basename, ".npmrc" | ".pypirc" | ".netrc") {
        return true;
    }
    if basename.starts_with("id_rsa") || basename.starts_with("id_ed25519") {
        return true;
    }

    let tokens: Vec<&str> = basename
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has_key = tokens.iter().any(|t| *t == "key" || *t == "keys");
    let has_credential_token = tokens
        .iter()
        .any(|t| CREDENTIAL_TOKENS.contains(t));
    has_key && has_credential_token
}
