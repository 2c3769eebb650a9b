//! Binary asset upload to object storage using a `multipart/related` request.
//!
//! The body carries a JSON metadata part followed by the raw bytes, separated by a generated
//! boundary token, matching the storage JSON API's multipart upload.

use crate::config::{self, Config};
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

const PROVIDER: &str = "storage";

/// Location of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Object name inside the bucket.
    pub name: String,
    /// Publicly reachable URL.
    pub url: String,
}

/// Interface implemented by object stores.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` under `name` with the given content type.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, PipelineError>;
}

/// Object storage client speaking the JSON API multipart upload.
pub struct ObjectStorage {
    http: Client,
    base_url: String,
    public_url: String,
    bucket: Option<String>,
    token: Option<String>,
}

impl ObjectStorage {
    /// Build a storage client; bucket and token are checked per upload.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let http = Client::builder()
            .user_agent("bookbrief/storage")
            .timeout(config.http_timeout)
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            base_url: config.storage_base_url.clone(),
            public_url: config.storage_public_url.clone(),
            bucket: config.storage_bucket.clone(),
            token: config.storage_token.clone(),
        })
    }
}

/// Assemble a `multipart/related` body: JSON metadata part, then the binary part.
pub(crate) fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[async_trait]
impl ObjectStore for ObjectStorage {
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, PipelineError> {
        let bucket = config::require(self.bucket.as_deref(), "STORAGE_BUCKET")?;
        let token = config::require(self.token.as_deref(), "STORAGE_TOKEN")?;
        if bytes.is_empty() {
            return Err(PipelineError::validation("refusing to upload an empty object"));
        }

        let uploaded_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let metadata = json!({
            "name": name,
            "contentType": content_type,
            "metadata": { "uploadedAt": uploaded_at },
        });
        let boundary = format!("bookbrief-{}", Uuid::new_v4().simple());
        let size = bytes.len();
        let body = multipart_related_body(&boundary, &metadata, content_type, &bytes);

        let endpoint = format!(
            "{}/upload/storage/v1/b/{bucket}/o",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(endpoint)
            .query(&[("uploadType", "multipart")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;

        if !response.status().is_success() {
            return Err(PipelineError::from_response(PROVIDER, response).await);
        }

        tracing::info!(bucket, name, content_type, bytes = size, "Asset uploaded");
        Ok(StoredObject {
            name: name.to_string(),
            url: format!("{}/{bucket}/{name}", self.public_url.trim_end_matches('/')),
        })
    }
}
