//! Cover image generation.

use crate::config::{self, Config};
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const PROVIDER: &str = "image-generation";
const COVER_SIZE: &str = "1024x1536";

/// Interface implemented by image generators.
#[async_trait]
pub trait CoverApi: Send + Sync {
    /// Render an image for `prompt`, returning encoded PNG bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Client for an image endpoint that accepts a JSON prompt and answers with raw image bytes.
pub struct CoverImageClient {
    http: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl CoverImageClient {
    /// Build from configuration; the endpoint is checked per call.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .user_agent("bookbrief/covers")
            .timeout(config.http_timeout)
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            endpoint: config.image_api_url.clone(),
            api_key: config.image_api_key.clone(),
        })
    }
}

/// Prompt describing a cover for the given book.
pub fn cover_prompt(title: &str, author: &str, feedback: Option<&str>) -> String {
    let mut prompt = format!(
        "Design a book cover for \"{}\" by {}. Portrait orientation, no text other than the \
         title and author name, clean typography.",
        title.trim(),
        author.trim()
    );
    if let Some(feedback) = feedback.map(str::trim).filter(|text| !text.is_empty()) {
        prompt.push_str(" Adjust according to this feedback: ");
        prompt.push_str(feedback);
    }
    prompt
}

#[async_trait]
impl CoverApi for CoverImageClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, PipelineError> {
        let endpoint = config::require(self.endpoint.as_deref(), "IMAGE_API_URL")?;

        let mut request = self
            .http
            .post(endpoint)
            .json(&json!({ "prompt": prompt, "size": COVER_SIZE, "format": "png" }));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        if !response.status().is_success() {
            return Err(PipelineError::from_response(PROVIDER, response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        if bytes.is_empty() {
            return Err(PipelineError::Upstream {
                provider: PROVIDER,
                status: None,
                message: "image response was empty".into(),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[test]
    fn prompt_includes_feedback_when_present() {
        let plain = cover_prompt(" Emma ", "Jane Austen", None);
        assert!(plain.contains("\"Emma\" by Jane Austen"));
        assert!(!plain.contains("feedback"));

        let adjusted = cover_prompt("Emma", "Jane Austen", Some("  warmer colours "));
        assert!(adjusted.ends_with("feedback: warmer colours"));
        assert_eq!(cover_prompt("Emma", "Jane Austen", Some("   ")), plain);
    }

    #[tokio::test]
    async fn returns_image_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/images")
                    .header("authorization", "Bearer img-key")
                    .body_contains("\"prompt\":\"a lighthouse\"");
                then.status(200).body("PNGDATA");
            })
            .await;
        let client = CoverImageClient::from_config(&Config {
            image_api_url: Some(server.url("/images")),
            image_api_key: Some("img-key".into()),
            ..Config::default()
        })
        .expect("client");

        let bytes = client.generate("a lighthouse").await.expect("image");
        assert_eq!(bytes, b"PNGDATA");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_endpoint_is_config_error() {
        let client = CoverImageClient::from_config(&Config::default()).expect("client");
        let error = client.generate("anything").await.unwrap_err();
        assert_eq!(error.kind(), "config_error");
    }
}
