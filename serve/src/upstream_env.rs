//! Environment-backed collaborator implementations.
//!
//! Token storage, JWT decoding, and signature construction are external to
//! the gateway core; these minimal implementations read what the deployment
//! provides via the environment.

use async_trait::async_trait;

use trellis::{GatewayError, RequestSigner, TokenSource};

// Re-exported so main.rs stays free of trait imports.
pub use trellis::EphemeralChatStore;

/// [`TokenSource`] reading `UPSTREAM_TOKEN` from the environment.
#[derive(Debug, Default)]
pub struct EnvTokenSource;

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn load_token(&self) -> Result<Option<String>, GatewayError> {
        Ok(std::env::var("UPSTREAM_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

/// [`RequestSigner`] forwarding a static signature parameter set.
///
/// The real upstream signature scheme lives outside this repo; deployments
/// that need it put a prebuilt query string in `UPSTREAM_SIGNED_QUERY`
/// (`k1=v1&k2=v2`).
#[derive(Debug, Default)]
pub struct EnvSigner;

impl RequestSigner for EnvSigner {
    fn signed_query(&self, _chat_id: &str) -> Result<Vec<(String, String)>, GatewayError> {
        let Ok(raw) = std::env::var("UPSTREAM_SIGNED_QUERY") else {
            return Ok(Vec::new());
        };
        Ok(raw
            .split('&')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                Some((k.to_string(), v.to_string()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_token_source_trims_and_filters_empty() {
        std::env::set_var("UPSTREAM_TOKEN", "  tok-123  ");
        let token = EnvTokenSource.load_token().await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-123"));
        std::env::set_var("UPSTREAM_TOKEN", "   ");
        assert!(EnvTokenSource.load_token().await.unwrap().is_none());
        std::env::remove_var("UPSTREAM_TOKEN");
    }

    #[test]
    fn env_signer_parses_query_pairs() {
        std::env::set_var("UPSTREAM_SIGNED_QUERY", "sig=abc&ts=123");
        let q = EnvSigner.signed_query("chat-1").unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q[0], ("sig".to_string(), "abc".to_string()));
        std::env::remove_var("UPSTREAM_SIGNED_QUERY");
    }

    #[test]
    fn env_signer_defaults_to_empty() {
        std::env::remove_var("UPSTREAM_SIGNED_QUERY");
        assert!(EnvSigner.signed_query("chat-1").unwrap().is_empty());
    }
}
