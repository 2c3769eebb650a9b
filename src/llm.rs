//! Chat-completion client for the hosted model provider.
//!
//! The provider speaks the OpenAI-compatible `POST /chat/completions` protocol (OpenRouter by
//! default). Requests carry a bearer credential and a bounded timeout; failures are reported
//! once and never retried here.

use crate::config::Config;
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const PROVIDER: &str = "openrouter";

/// Request passed to a completion provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Provider model identifier.
    pub model: String,
    /// Instructions framing the task.
    pub system: String,
    /// Task input.
    pub user: String,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the assistant text for the request.
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError>;
}

/// OpenRouter-compatible completion client.
pub struct OpenRouterClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    /// Build a client from configuration, failing when no credential is configured.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let api_key = config.openrouter_key()?.to_string();
        let http = Client::builder()
            .user_agent("bookbrief/summary")
            .timeout(config.http_timeout)
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            base_url: config.openrouter_base_url.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, PipelineError> {
        let payload = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            // Low temperature keeps section layout stable across chunks.
            "temperature": 0.2,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;

        if !response.status().is_success() {
            return Err(PipelineError::from_response(PROVIDER, response).await);
        }

        let body: ChatResponse = response.json().await.map_err(|error| PipelineError::Upstream {
            provider: PROVIDER,
            status: None,
            message: format!("failed to decode completion response: {error}"),
        })?;

        let content = body
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::from_config(&Config {
            openrouter_api_key: Some("sk-test".into()),
            openrouter_base_url: server.base_url(),
            ..Config::default()
        })
        .expect("client")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "openai/gpt-4o-mini".into(),
            system: "Summarize".into(),
            user: "Text".into(),
        }
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let error = OpenRouterClient::from_config(&Config::default())
            .err()
            .expect("config error");
        assert_eq!(error.kind(), "config_error");
    }

    #[tokio::test]
    async fn returns_trimmed_assistant_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  Notes \n" } }]
                }));
            })
            .await;

        let content = client_for(&server).complete(request()).await.expect("content");
        mock.assert_async().await;
        assert_eq!(content, "Notes");
    }

    #[tokio::test]
    async fn error_status_surfaces_as_upstream() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let error = client_for(&server).complete(request()).await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::Upstream { status: Some(status), ref message, .. }
                if status.as_u16() == 503 && message == "overloaded"
        ));
    }
}
