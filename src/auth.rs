//! Privilege checks and shared-secret comparison.
//!
//! Identity is owned by an external provider; this module only answers "is this caller
//! elevated?" for a bearer token, and compares dispatch secrets without leaking timing.

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};

/// Caller identity as presented on the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// Bearer token, when one was supplied.
    pub token: Option<String>,
}

impl Principal {
    /// Extract the bearer token from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);
        Self { token }
    }

    /// Principal carrying the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Authorization collaborator deciding whether a caller holds elevated privilege.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Return `true` when the caller may trigger privileged operations.
    async fn is_elevated(&self, principal: &Principal) -> bool;
}

/// Authorizer granting elevation to a fixed set of tokens.
pub struct StaticTokenAuthorizer {
    tokens: Vec<String>,
}

impl StaticTokenAuthorizer {
    /// Build from the configured admin tokens.
    pub fn new(tokens: Vec<String>) -> Self {
        if tokens.is_empty() {
            tracing::warn!("No admin tokens configured; privileged routes reject every caller");
        }
        Self { tokens }
    }
}

#[async_trait]
impl Authorizer for StaticTokenAuthorizer {
    async fn is_elevated(&self, principal: &Principal) -> bool {
        let Some(token) = principal.token.as_deref() else {
            return false;
        };
        self.tokens
            .iter()
            .any(|candidate| secret_matches(candidate, token))
    }
}

/// Compare two secrets through their SHA-256 digests so the comparison time does not depend on
/// where they first differ.
pub fn secret_matches(expected: &str, presented: &str) -> bool {
    let left = Sha256::digest(expected.as_bytes());
    let right = Sha256::digest(presented.as_bytes());
    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn secrets_compare_by_value() {
        assert!(secret_matches("s3cret", "s3cret"));
        assert!(!secret_matches("s3cret", "s3cre"));
        assert!(!secret_matches("s3cret", ""));
    }

    #[test]
    fn bearer_tokens_are_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer admin-1"));
        assert_eq!(Principal::from_headers(&headers).token.as_deref(), Some("admin-1"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(Principal::from_headers(&headers).token, None);
    }

    #[tokio::test]
    async fn static_authorizer_checks_membership() {
        let authorizer = StaticTokenAuthorizer::new(vec!["admin-1".into()]);
        assert!(authorizer.is_elevated(&Principal::with_token("admin-1")).await);
        assert!(!authorizer.is_elevated(&Principal::with_token("reader")).await);
        assert!(!authorizer.is_elevated(&Principal::default()).await);
    }
}
