//! Model catalog: fetch the provider's model listing and normalize it for display.
//!
//! Raw records arrive as `{"data": [...]}` with per-token decimal prices. The catalog keeps only
//! models that can emit text, converts prices to a per-million-token figure with exact decimal
//! arithmetic, and orders the result by model id.

use crate::config::{self, Config};
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const PROVIDER: &str = "openrouter";
/// Largest power of ten that fits in a `u128`.
const MAX_POW10: u32 = 38;

/// Normalized view of a cataloged model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    /// Provider model identifier.
    pub id: String,
    /// Human readable name; falls back to the id.
    pub name: String,
    /// Prompt price per million tokens, two decimals.
    pub prompt_price: Option<String>,
    /// Completion price per million tokens, two decimals.
    pub completion_price: Option<String>,
    /// Maximum context length in tokens.
    pub context_length: Option<u64>,
    /// Raw modality descriptor such as `text+image->text`.
    pub modality: Option<String>,
    /// Accepted input modalities.
    pub input_modalities: Vec<String>,
    /// Produced output modalities.
    pub output_modalities: Vec<String>,
}

/// Source of model descriptors used by the summarization service and the API.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// List text-capable models ordered by id.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PipelineError>;

    /// Resolve a single model by id; unknown ids are a validation error.
    async fn find(&self, id: &str) -> Result<ModelDescriptor, PipelineError> {
        self.list_models()
            .await?
            .into_iter()
            .find(|model| model.id == id)
            .ok_or_else(|| PipelineError::validation(format!("unknown model `{id}`")))
    }
}

/// HTTP-backed catalog for an OpenRouter-compatible provider.
pub struct ModelCatalog {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ModelCatalog {
    /// Build a catalog client; the credential is checked when the catalog is queried.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::new(
            config.openrouter_base_url.clone(),
            config.openrouter_api_key.clone(),
            config.http_timeout,
        )
    }

    fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .user_agent("bookbrief/catalog")
            .timeout(timeout)
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    data: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<RawPricing>,
    #[serde(default)]
    architecture: Option<RawArchitecture>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPricing {
    #[serde(default)]
    prompt: Option<Value>,
    #[serde(default)]
    completion: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawArchitecture {
    #[serde(default)]
    modality: Option<String>,
    #[serde(default)]
    input_modalities: Vec<String>,
    #[serde(default)]
    output_modalities: Vec<String>,
}

#[async_trait]
impl CatalogApi for ModelCatalog {
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PipelineError> {
        let api_key = config::require(self.api_key.as_deref(), "OPENROUTER_API_KEY")?;

        let response = self
            .http
            .get(self.endpoint())
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;

        if !response.status().is_success() {
            let error = PipelineError::from_response(PROVIDER, response).await;
            tracing::warn!(error = %error, "Model catalog request failed");
            return Err(error);
        }

        let body: CatalogResponse = response.json().await.map_err(|error| PipelineError::Upstream {
            provider: PROVIDER,
            status: None,
            message: format!("failed to decode model catalog: {error}"),
        })?;

        let total = body.data.len();
        let models = normalize_catalog(body.data);
        tracing::debug!(total, kept = models.len(), "Model catalog normalized");
        Ok(models)
    }
}

fn normalize_catalog(raw: Vec<RawModel>) -> Vec<ModelDescriptor> {
    let mut models: Vec<ModelDescriptor> = raw
        .into_iter()
        .map(describe)
        .filter(produces_text)
        .collect();
    models.sort_by(|left, right| left.id.cmp(&right.id));
    models
}

fn describe(raw: RawModel) -> ModelDescriptor {
    let pricing = raw.pricing.unwrap_or_default();
    let architecture = raw.architecture.unwrap_or_default();
    let (declared_inputs, declared_outputs) = architecture
        .modality
        .as_deref()
        .map(split_modality)
        .unwrap_or_default();

    let input_modalities = if architecture.input_modalities.is_empty() {
        declared_inputs
    } else {
        architecture.input_modalities
    };
    let output_modalities = if architecture.output_modalities.is_empty() {
        declared_outputs
    } else {
        architecture.output_modalities
    };

    ModelDescriptor {
        name: raw
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| raw.id.clone()),
        id: raw.id,
        prompt_price: pricing.prompt.as_ref().and_then(price_per_million),
        completion_price: pricing.completion.as_ref().and_then(price_per_million),
        context_length: raw.context_length,
        modality: architecture.modality,
        input_modalities,
        output_modalities,
    }
}

/// Split `text+image->text` into its input and output modality lists. A bare modality such as
/// `text` names both sides.
fn split_modality(modality: &str) -> (Vec<String>, Vec<String>) {
    let parse = |side: &str| -> Vec<String> {
        side.split('+')
            .map(|item| item.trim().to_lowercase())
            .filter(|item| !item.is_empty())
            .collect()
    };
    match modality.split_once("->") {
        Some((inputs, outputs)) => (parse(inputs), parse(outputs)),
        None => {
            let both = parse(modality);
            (both.clone(), both)
        }
    }
}

/// Records without any modality metadata are treated as text models.
fn produces_text(model: &ModelDescriptor) -> bool {
    if model.output_modalities.is_empty() {
        return model.modality.is_none();
    }
    let embeddings_only = model
        .output_modalities
        .iter()
        .all(|modality| modality.eq_ignore_ascii_case("embeddings"));
    !embeddings_only
        && model
            .output_modalities
            .iter()
            .any(|modality| modality.eq_ignore_ascii_case("text"))
}

/// Convert a per-token price to a per-million-token price rounded to two decimals.
///
/// Accepts decimal strings, exponent notation, or JSON numbers, and rounds half away from zero.
pub fn price_per_million(raw: &Value) -> Option<String> {
    match raw {
        Value::String(text) => scale_decimal(text),
        Value::Number(number) => scale_decimal(&number.to_string()),
        _ => None,
    }
}

fn scale_decimal(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{integer}{fraction}");
    let significant = digits.trim_start_matches('0');
    let value: u128 = if significant.is_empty() {
        0
    } else if significant.len() > MAX_POW10 as usize {
        return None;
    } else {
        significant.parse().ok()?
    };

    // value * 10^(exponent - fraction_len) per token; * 10^6 per million; * 10^2 for cents.
    let shift = i64::from(exponent) - fraction.len() as i64 + 6 + 2;
    let hundredths = if shift >= 0 {
        let factor = 10u128.checked_pow(u32::try_from(shift).ok()?)?;
        value.checked_mul(factor)?
    } else {
        let magnitude = u32::try_from(-shift).ok()?;
        if magnitude > MAX_POW10 {
            0
        } else {
            let divisor = 10u128.pow(magnitude);
            value / divisor + u128::from(value % divisor >= divisor - divisor / 2)
        }
    };

    let sign = if negative && hundredths > 0 { "-" } else { "" };
    Some(format!("{sign}{}.{:02}", hundredths / 100, hundredths % 100))
}
