//! Background executor for derived-asset jobs.
//!
//! Mounted under `/internal/jobs`. Every request must carry the shared secret in
//! [`IMPORT_SECRET_HEADER`]; anything else is rejected with `401` before job logic runs.

use super::cover::cover_prompt;
use super::{CoverApi, IMPORT_SECRET_HEADER, JobKind, JobRequest};
use crate::api::AppError;
use crate::auth::secret_matches;
use crate::books::BookRepository;
use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::speech::{SpeechApi, SpeechRequest};
use crate::storage::ObjectStore;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Collaborators used by the executor routes.
#[derive(Clone)]
pub struct ExecutorState {
    /// Book metadata and asset URLs.
    pub books: Arc<dyn BookRepository>,
    /// Narration provider.
    pub speech: Arc<dyn SpeechApi>,
    /// Cover image provider.
    pub covers: Arc<dyn CoverApi>,
    /// Where generated assets are uploaded.
    pub storage: Arc<dyn ObjectStore>,
    /// Expected dispatch secret; `None` rejects every job.
    pub import_secret: Option<String>,
    /// Shared counters.
    pub metrics: Arc<PipelineMetrics>,
}

/// Result reported back to the dispatcher.
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    /// Book the asset belongs to.
    pub target_id: String,
    /// Asset produced.
    pub kind: JobKind,
    /// `completed` or `skipped`.
    pub status: &'static str,
    /// Public URL of the asset, when one exists.
    pub url: Option<String>,
}

/// Router serving `POST /internal/jobs/{cover,audio}`.
pub fn executor_router(state: ExecutorState) -> Router {
    Router::new()
        .route("/internal/jobs/cover", post(run_cover_job))
        .route("/internal/jobs/audio", post(run_audio_job))
        .route_layer(from_fn_with_state(state.clone(), require_import_secret))
        .with_state(state)
}

async fn require_import_secret(
    State(state): State<ExecutorState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(IMPORT_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    let authorized = match (state.import_secret.as_deref(), presented) {
        (Some(expected), Some(presented)) if !expected.is_empty() => {
            secret_matches(expected, presented)
        }
        _ => false,
    };
    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected job with missing or invalid secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "authorization_error",
                "message": "missing or invalid import secret",
            })),
        )
            .into_response();
    }
    next.run(request).await
}

async fn run_audio_job(
    State(state): State<ExecutorState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<JobOutcome>, AppError> {
    let book = load_book(&state, &request.target_id).await?;
    if let Some(url) = book.audio_url.clone().filter(|_| !request.force) {
        return Ok(Json(skipped(request.target_id, JobKind::Audio, url)));
    }

    let text = book
        .summary
        .as_ref()
        .map(|summary| summary.summary.narration_text())
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::validation(format!("book `{}` has no summary to narrate", book.id))
        })?;

    let audio = state
        .speech
        .synthesize(SpeechRequest {
            text,
            ..SpeechRequest::default()
        })
        .await?;
    let stored = state
        .storage
        .upload(&format!("audio/{}.mp3", book.id), "audio/mpeg", audio)
        .await?;
    complete(&state, book.id, JobKind::Audio, stored.url).await
}

async fn run_cover_job(
    State(state): State<ExecutorState>,
    Json(request): Json<JobRequest>,
) -> Result<Json<JobOutcome>, AppError> {
    let book = load_book(&state, &request.target_id).await?;
    if let Some(url) = book.cover_url.clone().filter(|_| !request.force) {
        return Ok(Json(skipped(request.target_id, JobKind::Cover, url)));
    }
    if book.title.trim().is_empty() || book.author.trim().is_empty() {
        return Err(PipelineError::validation(format!(
            "book `{}` needs a title and author for cover generation",
            book.id
        ))
        .into());
    }

    let prompt = cover_prompt(&book.title, &book.author, request.feedback.as_deref());
    let image = state.covers.generate(&prompt).await?;
    let stored = state
        .storage
        .upload(&format!("covers/{}.png", book.id), "image/png", image)
        .await?;
    complete(&state, book.id, JobKind::Cover, stored.url).await
}

async fn load_book(
    state: &ExecutorState,
    target_id: &str,
) -> Result<crate::books::BookRecord, PipelineError> {
    state
        .books
        .get(target_id)
        .await?
        .ok_or_else(|| PipelineError::validation(format!("unknown book `{target_id}`")))
}

fn skipped(target_id: String, kind: JobKind, url: String) -> JobOutcome {
    tracing::info!(target = %target_id, kind = kind.as_str(), "Asset exists; job skipped");
    JobOutcome {
        target_id,
        kind,
        status: "skipped",
        url: Some(url),
    }
}

async fn complete(
    state: &ExecutorState,
    target_id: String,
    kind: JobKind,
    url: String,
) -> Result<Json<JobOutcome>, AppError> {
    state.books.set_asset_url(&target_id, kind, &url).await?;
    state.metrics.record_job_completed();
    tracing::info!(
        target = %target_id,
        kind = kind.as_str(),
        url = %url,
        "Derived-asset job completed"
    );
    Ok(Json(JobOutcome {
        target_id,
        kind,
        status: "completed",
        url: Some(url),
    }))
}
