//! Derived assets: cover images and narrated summaries.
//!
//! [`dispatch`] validates a request and fires the job at the background executor without
//! waiting; [`executor`] is that executor's secret-guarded HTTP surface.

pub mod cover;
pub mod dispatch;
pub mod executor;
pub mod transport;

pub use cover::{CoverApi, CoverImageClient};
pub use dispatch::AssetDispatcher;
pub use executor::{ExecutorState, executor_router};
pub use transport::{HttpJobTransport, JobTransport};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the shared dispatch secret.
pub const IMPORT_SECRET_HEADER: &str = "x-import-secret";

/// Kind of derived asset a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Regenerate the cover image.
    Cover,
    /// Narrate the summary.
    Audio,
}

impl JobKind {
    /// Path segment and log label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Audio => "audio",
        }
    }
}

/// Caller options forwarded to the executor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchOptions {
    /// Free-form guidance, e.g. what to change about the previous cover.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Regenerate even when the asset already exists.
    #[serde(default)]
    pub force: bool,
}

/// Job handed to the background executor.
#[derive(Debug, Clone)]
pub struct DerivedAssetJob {
    /// Correlation id used in logs on both sides.
    pub job_id: Uuid,
    /// Book the asset belongs to.
    pub target_id: String,
    /// Asset to produce.
    pub kind: JobKind,
    /// Shared secret authenticating the dispatch.
    pub secret: String,
    /// Optional caller guidance.
    pub feedback: Option<String>,
    /// Regenerate existing assets.
    pub force: bool,
}

/// Wire body posted to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Book the asset belongs to.
    pub target_id: String,
    /// Regenerate existing assets.
    #[serde(default)]
    pub force: bool,
    /// Optional caller guidance.
    #[serde(default)]
    pub feedback: Option<String>,
}

impl From<&DerivedAssetJob> for JobRequest {
    fn from(job: &DerivedAssetJob) -> Self {
        Self {
            target_id: job.target_id.clone(),
            force: job.force,
            feedback: job.feedback.clone(),
        }
    }
}

/// Caller-facing result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAccepted {
    /// Correlation id of the dispatched job.
    pub job_id: String,
    /// Asset being produced.
    pub kind: JobKind,
    /// Book the asset belongs to.
    pub target_id: String,
    /// Always `processing`: completion is reported elsewhere.
    pub status: &'static str,
}
