//! Transport delivering jobs to the background executor.

use super::{DerivedAssetJob, IMPORT_SECRET_HEADER, JobRequest};
use crate::config::{Config, ConfigError};
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;

const PROVIDER: &str = "job-executor";

/// Delivers a job to whatever executes it.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Deliver the job; resolves when the executor answered.
    async fn send(&self, job: &DerivedAssetJob) -> Result<(), PipelineError>;
}

/// Posts jobs to `{base}/internal/jobs/{kind}` with the shared secret header.
///
/// No timeout is configured: the call runs detached from the request that triggered it.
pub struct HttpJobTransport {
    http: Client,
    base_url: String,
}

impl HttpJobTransport {
    /// Build a transport targeting the configured executor.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let base_url = config
            .job_executor_url
            .clone()
            .ok_or(ConfigError::MissingCredential("JOB_EXECUTOR_URL"))?;
        let http = Client::builder()
            .user_agent("bookbrief/dispatch")
            .build()
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;
        Ok(Self {
            http,
            base_url,
        })
    }

    fn endpoint(&self, job: &DerivedAssetJob) -> String {
        format!(
            "{}/internal/jobs/{}",
            self.base_url.trim_end_matches('/'),
            job.kind.as_str()
        )
    }
}

#[async_trait]
impl JobTransport for HttpJobTransport {
    async fn send(&self, job: &DerivedAssetJob) -> Result<(), PipelineError> {
        let response = self
            .http
            .post(self.endpoint(job))
            .header(IMPORT_SECRET_HEADER, &job.secret)
            .json(&JobRequest::from(job))
            .send()
            .await
            .map_err(|error| PipelineError::transport(PROVIDER, error))?;

        if !response.status().is_success() {
            return Err(PipelineError::from_response(PROVIDER, response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::JobKind;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use uuid::Uuid;

    fn job(kind: JobKind) -> DerivedAssetJob {
        DerivedAssetJob {
            job_id: Uuid::new_v4(),
            target_id: "book-7".into(),
            kind,
            secret: "shh".into(),
            feedback: Some("darker palette".into()),
            force: true,
        }
    }

    fn transport(server: &MockServer) -> HttpJobTransport {
        HttpJobTransport::from_config(&Config {
            job_executor_url: Some(server.base_url()),
            ..Config::default()
        })
        .expect("transport")
    }

    #[tokio::test]
    async fn posts_secret_header_and_camel_case_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/internal/jobs/cover")
                    .header("x-import-secret", "shh")
                    .json_body(json!({
                        "targetId": "book-7",
                        "force": true,
                        "feedback": "darker palette"
                    }));
                then.status(200);
            })
            .await;

        transport(&server).send(&job(JobKind::Cover)).await.expect("sent");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_jobs_are_upstream_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/internal/jobs/audio");
                then.status(401).body("bad secret");
            })
            .await;

        let error = transport(&server).send(&job(JobKind::Audio)).await.unwrap_err();
        assert_eq!(error.kind(), "upstream_error");
    }
}
