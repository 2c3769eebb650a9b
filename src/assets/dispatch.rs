//! Fire-and-forget trigger for derived-asset jobs.
//!
//! Every check that could make the job fail for certain (privilege, configured secret, required
//! book fields) runs before the transport is touched. The transport call itself runs on a detached
//! task: the caller is answered immediately, and a transport failure is only logged.

use super::{DerivedAssetJob, DispatchAccepted, DispatchOptions, JobKind, JobTransport};
use crate::auth::{Authorizer, Principal};
use crate::books::{BookRecord, BookRepository};
use crate::config;
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use std::sync::Arc;
use uuid::Uuid;

/// Validates and dispatches derived-asset jobs.
pub struct AssetDispatcher {
    authorizer: Arc<dyn Authorizer>,
    books: Arc<dyn BookRepository>,
    transport: Arc<dyn JobTransport>,
    secret: Option<String>,
    metrics: Arc<PipelineMetrics>,
}

impl AssetDispatcher {
    /// Assemble a dispatcher from its collaborators.
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        books: Arc<dyn BookRepository>,
        transport: Arc<dyn JobTransport>,
        secret: Option<String>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            authorizer,
            books,
            transport,
            secret,
            metrics,
        }
    }

    /// Validate the request and fire the job without awaiting its outcome.
    pub async fn dispatch(
        &self,
        principal: &Principal,
        kind: JobKind,
        target_id: &str,
        options: DispatchOptions,
    ) -> Result<DispatchAccepted, PipelineError> {
        if !self.authorizer.is_elevated(principal).await {
            return Err(PipelineError::Authorization(format!(
                "{} jobs require elevated privilege",
                kind.as_str()
            )));
        }

        let secret = config::require(self.secret.as_deref(), "IMPORT_SECRET")?.to_string();

        let book = self
            .books
            .get(target_id)
            .await?
            .ok_or_else(|| PipelineError::validation(format!("unknown book `{target_id}`")))?;
        ensure_source_fields(kind, &book)?;

        let job = DerivedAssetJob {
            job_id: Uuid::new_v4(),
            target_id: target_id.to_string(),
            kind,
            secret,
            feedback: options
                .feedback
                .map(|feedback| feedback.trim().to_string())
                .filter(|feedback| !feedback.is_empty()),
            force: options.force,
        };
        let accepted = DispatchAccepted {
            job_id: job.job_id.to_string(),
            kind,
            target_id: job.target_id.clone(),
            status: "processing",
        };

        let transport = Arc::clone(&self.transport);
        let metrics = Arc::clone(&self.metrics);
        // Detached: dropping the caller's future must not cancel the delivery.
        tokio::spawn(async move {
            match transport.send(&job).await {
                Ok(()) => tracing::debug!(
                    job_id = %job.job_id,
                    kind = job.kind.as_str(),
                    target = %job.target_id,
                    "Derived-asset job delivered"
                ),
                Err(error) => {
                    metrics.record_dispatch_failure();
                    tracing::error!(
                        job_id = %job.job_id,
                        kind = job.kind.as_str(),
                        target = %job.target_id,
                        error = %error,
                        "Derived-asset dispatch failed"
                    );
                }
            }
        });

        self.metrics.record_dispatch();
        tracing::info!(
            job_id = %accepted.job_id,
            kind = kind.as_str(),
            target = target_id,
            force = options.force,
            "Derived-asset job dispatched"
        );
        Ok(accepted)
    }
}

fn ensure_source_fields(kind: JobKind, book: &BookRecord) -> Result<(), PipelineError> {
    match kind {
        JobKind::Cover => {
            let mut missing = Vec::new();
            if book.title.trim().is_empty() {
                missing.push("title");
            }
            if book.author.trim().is_empty() {
                missing.push("author");
            }
            if !missing.is_empty() {
                return Err(PipelineError::validation(format!(
                    "cover generation requires {} for book `{}`",
                    missing.join(" and "),
                    book.id
                )));
            }
        }
        JobKind::Audio => {
            let has_text = book
                .summary
                .as_ref()
                .is_some_and(|summary| !summary.summary.narration_text().trim().is_empty());
            if !has_text {
                return Err(PipelineError::validation(format!(
                    "audio narration requires a summary for book `{}`",
                    book.id
                )));
            }
        }
    }
    Ok(())
}
