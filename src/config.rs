use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

use crate::processing::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_ELEVENLABS_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_SPEECH_MODEL: &str = "eleven_multilingual_v2";
const DEFAULT_SUMMARY_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CHUNK_CONCURRENCY: usize = 4;
const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 4100..=4199;

/// Errors encountered while loading configuration or resolving a credential at use.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// A component needed a credential or secret that is not configured.
    #[error("{0} is not configured")]
    MissingCredential(&'static str),
}

/// Runtime configuration, built once at start and passed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer credential for the model provider (catalog and completions).
    pub openrouter_api_key: Option<String>,
    /// Base URL of the OpenRouter-compatible model provider.
    pub openrouter_base_url: String,
    /// Model used when the caller does not choose one.
    pub summary_model: String,
    /// API key for the text-to-speech provider.
    pub elevenlabs_api_key: Option<String>,
    /// Base URL of the text-to-speech provider.
    pub elevenlabs_base_url: String,
    /// Voice identifier used when the request does not name one.
    pub elevenlabs_voice_id: String,
    /// Speech model used when the request does not name one.
    pub elevenlabs_model_id: String,
    /// Shared secret sent in `x-import-secret` to the background executor.
    pub import_secret: Option<String>,
    /// Base URL of the background executor receiving derived-asset jobs. When unset the server
    /// sends jobs to its own executor routes.
    pub job_executor_url: Option<String>,
    /// Endpoint returning cover image bytes for a prompt.
    pub image_api_url: Option<String>,
    /// Optional bearer credential for the image endpoint.
    pub image_api_key: Option<String>,
    /// Base URL of the object storage JSON API.
    pub storage_base_url: String,
    /// Bucket receiving uploaded assets.
    pub storage_bucket: Option<String>,
    /// Bearer token for object storage uploads.
    pub storage_token: Option<String>,
    /// Public URL prefix used to build asset links.
    pub storage_public_url: String,
    /// Nominal chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Optional cap on the number of chunks per document.
    pub max_chunks: Option<usize>,
    /// Number of chunk completions in flight per document.
    pub chunk_concurrency: usize,
    /// Timeout applied to catalog, completion, speech, and storage calls.
    pub http_timeout: Duration,
    /// Bearer tokens granted elevated privilege.
    pub admin_tokens: Vec<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Ports tried in order when no explicit port is set.
    pub server_port_range: RangeInclusive<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_URL.into(),
            summary_model: DEFAULT_SUMMARY_MODEL.into(),
            elevenlabs_api_key: None,
            elevenlabs_base_url: DEFAULT_ELEVENLABS_URL.into(),
            elevenlabs_voice_id: DEFAULT_VOICE_ID.into(),
            elevenlabs_model_id: DEFAULT_SPEECH_MODEL.into(),
            import_secret: None,
            job_executor_url: None,
            image_api_url: None,
            image_api_key: None,
            storage_base_url: DEFAULT_STORAGE_URL.into(),
            storage_bucket: None,
            storage_token: None,
            storage_public_url: DEFAULT_STORAGE_URL.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            max_chunks: None,
            chunk_concurrency: DEFAULT_CHUNK_CONCURRENCY,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            admin_tokens: Vec::new(),
            server_port: None,
            server_port_range: DEFAULT_PORT_RANGE,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Credentials stay optional here; components report a [`ConfigError::MissingCredential`]
    /// when they are invoked without one.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            openrouter_api_key: load_env_optional("OPENROUTER_API_KEY"),
            openrouter_base_url: load_env_optional("OPENROUTER_BASE_URL")
                .unwrap_or(defaults.openrouter_base_url),
            summary_model: load_env_optional("SUMMARY_MODEL").unwrap_or(defaults.summary_model),
            elevenlabs_api_key: load_env_optional("ELEVENLABS_API_KEY"),
            elevenlabs_base_url: load_env_optional("ELEVENLABS_BASE_URL")
                .unwrap_or(defaults.elevenlabs_base_url),
            elevenlabs_voice_id: load_env_optional("ELEVENLABS_VOICE_ID")
                .unwrap_or(defaults.elevenlabs_voice_id),
            elevenlabs_model_id: load_env_optional("ELEVENLABS_MODEL_ID")
                .unwrap_or(defaults.elevenlabs_model_id),
            import_secret: load_env_optional("IMPORT_SECRET"),
            job_executor_url: load_env_optional("JOB_EXECUTOR_URL"),
            image_api_url: load_env_optional("IMAGE_API_URL"),
            image_api_key: load_env_optional("IMAGE_API_KEY"),
            storage_base_url: load_env_optional("STORAGE_BASE_URL")
                .unwrap_or(defaults.storage_base_url),
            storage_bucket: load_env_optional("STORAGE_BUCKET"),
            storage_token: load_env_optional("STORAGE_TOKEN"),
            storage_public_url: load_env_optional("STORAGE_PUBLIC_URL")
                .unwrap_or(defaults.storage_public_url),
            chunk_size: load_parsed("CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: load_parsed("CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap),
            max_chunks: load_parsed("MAX_CHUNKS")?,
            chunk_concurrency: load_parsed::<usize>("CHUNK_CONCURRENCY")?
                .unwrap_or(defaults.chunk_concurrency)
                .max(1),
            http_timeout: load_parsed("HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            admin_tokens: load_env_optional("ADMIN_TOKENS")
                .map(|value| parse_list(&value))
                .unwrap_or_default(),
            server_port: load_parsed("SERVER_PORT")?,
            server_port_range: load_env_optional("SERVER_PORT_RANGE")
                .map(|value| parse_port_range(&value))
                .transpose()?
                .unwrap_or(defaults.server_port_range),
        })
    }

    /// Point job delivery at this server's own executor routes unless an executor URL is set.
    pub fn resolve_executor_url(&mut self, local_port: u16) -> &str {
        self.job_executor_url.get_or_insert_with(|| format!("http://127.0.0.1:{local_port}"))
    }

    /// Resolve the model-provider credential or report it as missing.
    pub fn openrouter_key(&self) -> Result<&str, ConfigError> {
        require(self.openrouter_api_key.as_deref(), "OPENROUTER_API_KEY")
    }
}

/// Resolve a configured credential, treating a blank value as missing.
pub fn require<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ConfigError> {
    value
        .filter(|candidate| !candidate.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(name))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_port_range(value: &str) -> Result<RangeInclusive<u16>, ConfigError> {
    let invalid = || ConfigError::InvalidValue("SERVER_PORT_RANGE".into());
    let (start, end) = value.split_once('-').ok_or_else(invalid)?;
    let start: u16 = start.trim().parse().map_err(|_| invalid())?;
    let end: u16 = end.trim().parse().map_err(|_| invalid())?;
    if start > end {
        return Err(invalid());
    }
    Ok(start..=end)
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load `.env` (when present) and build the configuration from the environment.
pub fn init_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        openrouter_url = %config.openrouter_base_url,
        summary_model = %config.summary_model,
        has_openrouter_key = config.openrouter_api_key.is_some(),
        has_elevenlabs_key = config.elevenlabs_api_key.is_some(),
        has_import_secret = config.import_secret.is_some(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
