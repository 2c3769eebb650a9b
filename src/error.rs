//! Error taxonomy shared by every pipeline component.
//!
//! Four kinds matter to callers: configuration (operator-fixable), validation (caller-fixable),
//! upstream (possibly transient, safe for the caller to retry), and authorization. Nothing in this
//! crate retries on its own.

use crate::config::ConfigError;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by chunking, summarization, catalog, speech, storage, and dispatch.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required credential or secret is missing, or configuration is malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Caller input or an inbound payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// External provider failed, answered with a non-success status, or timed out.
    #[error(
        "{provider} request failed{}: {message}",
        status.map(|code| format!(" ({code})")).unwrap_or_default()
    )]
    Upstream {
        /// Short provider label (`openrouter`, `elevenlabs`, `storage`, ...).
        provider: &'static str,
        /// HTTP status when the provider answered.
        status: Option<StatusCode>,
        /// Provider message or transport diagnostic.
        message: String,
    },
    /// Caller lacks the required privilege or presented a mismatching secret.
    #[error("Not authorized: {0}")]
    Authorization(String),
}

impl PipelineError {
    /// Stable label for the error kind, used in HTTP bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Validation(_) => "validation_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Authorization(_) => "authorization_error",
        }
    }

    /// Build a validation error from any displayable reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Map a transport-level `reqwest` failure into an upstream error.
    pub(crate) fn transport(provider: &'static str, error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("timed out: {error}")
        } else {
            error.to_string()
        };
        Self::Upstream {
            provider,
            status: error.status(),
            message,
        }
    }

    /// Build an upstream error from a non-success response, consuming its body for diagnostics.
    pub(crate) async fn from_response(provider: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::Upstream {
            provider,
            status: Some(status),
            message: body,
        }
    }
}
