//! Text-to-speech client.
//!
//! Calls the provider's streaming endpoint and collects the stream into one buffer, so callers
//! see a plain `Vec<u8>` of encoded audio.

use crate::config::{self, Config};
use crate::error::PipelineError;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

const PROVIDER: &str = "elevenlabs";
const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";
const STABILITY: f32 = 0.5;
const SIMILARITY_BOOST: f32 = 0.75;
const STYLE: f32 = 0.0;

/// Parameters for one synthesis call; unset fields fall back to configuration.
#[derive(Debug, Clone, Default)]
pub struct SpeechRequest {
    /// Text to narrate.
    pub text: String,
    /// Voice identifier override.
    pub voice: Option<String>,
    /// Speech model override.
    pub model: Option<String>,
    /// Output encoding such as `mp3_44100_128`.
    pub output_format: Option<String>,
}

/// Interface implemented by speech providers.
#[async_trait]
pub trait SpeechApi: Send + Sync {
    /// Synthesize `request.text` and return the encoded audio.
    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, PipelineError>;
}

/// ElevenLabs-compatible synthesizer.
pub struct SpeechSynthesizer {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    default_voice: String,
    default_model: String,
}

impl SpeechSynthesizer {
    /// Build a synthesizer from configuration; the credential is checked per call.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .user_agent("bookbrief/speech")
            .timeout(config.http_timeout)
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            base_url: config.elevenlabs_base_url.clone(),
            api_key: config.elevenlabs_api_key.clone(),
            default_voice: config.elevenlabs_voice_id.clone(),
            default_model: config.elevenlabs_model_id.clone(),
        })
    }

    fn endpoint(&self, voice: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{voice}/stream",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SpeechApi for SpeechSynthesizer {
    async fn synthesize(&self, request: SpeechRequest) -> Result<Vec<u8>, PipelineError> {
        let api_key = config::require(self.api_key.as_deref(), "ELEVENLABS_API_KEY")?;
        let text = request.text.trim();
        if text.is_empty() {
            return Err(PipelineError::validation("text to synthesize must not be blank"));
        }

        let voice = request.voice.as_deref().unwrap_or(&self.default_voice);
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let output_format = request
            .output_format
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_FORMAT);

        tracing::debug!(
            voice,
            model,
            output_format,
            chars = text.chars().count(),
            "Synthesizing speech"
        );
        let response = self
            .http
            .post(self.endpoint(voice))
            .query(&[("output_format", output_format)])
            .header("xi-api-key", api_key)
            .json(&json!({
                "model_id": model,
                "output_format": output_format,
                "text": text,
                "voice_settings": {
                    "similarity_boost": SIMILARITY_BOOST,
                    "stability": STABILITY,
                    "style": STYLE,
                },
            }))
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;

        if !response.status().is_success() {
            let error = PipelineError::from_response(PROVIDER, response).await;
            tracing::warn!(error = %error, "Speech synthesis failed");
            return Err(error);
        }

        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|error| PipelineError::transport(PROVIDER, error))?;
            audio.extend_from_slice(&bytes);
        }

        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use std::time::Duration;

    fn synthesizer(base_url: String, api_key: Option<&str>) -> SpeechSynthesizer {
        SpeechSynthesizer::from_config(&Config {
            elevenlabs_base_url: base_url,
            elevenlabs_api_key: api_key.map(str::to_string),
            elevenlabs_voice_id: "voice-1".into(),
            elevenlabs_model_id: "model-1".into(),
            ..Config::default()
        })
        .expect("synthesizer")
    }

    fn request(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.into(),
            ..SpeechRequest::default()
        }
    }

    #[tokio::test]
    async fn returns_audio_bytes_with_fixed_voice_settings() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/text-to-speech/voice-1/stream")
                    .query_param("output_format", "mp3_44100_128")
                    .header("xi-api-key", "xi-test")
                    .json_body(json!({
                        "model_id": "model-1",
                        "output_format": "mp3_44100_128",
                        "text": "Hello there",
                        "voice_settings": {
                            "similarity_boost": 0.75,
                            "stability": 0.5,
                            "style": 0.0
                        }
                    }));
                then.status(200).body(vec![0x49, 0x44, 0x33, 0x04]);
            })
            .await;

        let audio = synthesizer(server.base_url(), Some("xi-test"))
            .synthesize(request("  Hello there "))
            .await
            .expect("audio");
        mock.assert_async().await;
        assert_eq!(audio, vec![0x49, 0x44, 0x33, 0x04]);
    }

    #[tokio::test]
    async fn blank_text_and_missing_key_fail_before_network() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200);
            })
            .await;

        let missing_key = synthesizer(server.base_url(), None)
            .synthesize(request("Hello"))
            .await
            .unwrap_err();
        assert_eq!(missing_key.kind(), "config_error");

        let blank = synthesizer(server.base_url(), Some("xi-test"))
            .synthesize(request("   "))
            .await
            .unwrap_err();
        assert_eq!(blank.kind(), "validation_error");
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn provider_errors_keep_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("{\"detail\":\"invalid api key\"}");
            })
            .await;

        let error = synthesizer(server.base_url(), Some("xi-test"))
            .synthesize(request("Hello"))
            .await
            .unwrap_err();
        let PipelineError::Upstream { status, message, .. } = error else {
            panic!("expected upstream error");
        };
        assert_eq!(status.map(|code| code.as_u16()), Some(401));
        assert!(message.contains("invalid api key"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .delay(Duration::from_secs(3))
                    .body("late audio");
            })
            .await;
        let synthesizer = SpeechSynthesizer::from_config(&Config {
            elevenlabs_base_url: server.base_url(),
            elevenlabs_api_key: Some("xi-test".into()),
            http_timeout: Duration::from_millis(300),
            ..Config::default()
        })
        .expect("synthesizer");

        let error = synthesizer.synthesize(request("Hello")).await.unwrap_err();
        assert_eq!(error.kind(), "upstream_error");
        assert!(error.to_string().contains("timed out"), "{error}");
    }
}
