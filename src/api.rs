//! HTTP surface for bookbrief.
//!
//! - `POST /documents/word-count` – Word count plus the low-yield extraction warning.
//! - `POST /documents/chunks` – Split text into overlapping windows.
//! - `POST /summaries` – Summarize and validate a document; `book_id` persists the result on a
//!   book.
//! - `POST /summaries/validate` – Run the validation cascade over an arbitrary payload.
//! - `GET /summaries/schemas` – JSON Schemas of the structured and flexible shapes.
//! - `GET /models` – Text-capable models with per-million prices.
//! - `GET /books/:id`, `PUT /books/:id` – Read a book record; create it or update its title and
//!   author (elevated).
//! - `POST /books/:id/cover`, `POST /books/:id/audio` – Dispatch a derived-asset job (`202`).
//!   Requires an elevated bearer token.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /commands` – Machine-readable command catalog.
//!
//! Errors render as `{ "error": kind, "message": ... }` with the status chosen by [`AppError`].

use crate::assets::{
    AssetDispatcher, CoverImageClient, DispatchAccepted, DispatchOptions, ExecutorState,
    HttpJobTransport, JobKind, executor_router,
};
use crate::auth::{Authorizer, Principal, StaticTokenAuthorizer};
use crate::books::{BookRecord, BookRepository, InMemoryBookRepository};
use crate::catalog::{CatalogApi, ModelCatalog, ModelDescriptor};
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{CompletionClient, OpenRouterClient};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::processing::{Chunk, Document, ExtractionReport, chunk};
use crate::speech::SpeechSynthesizer;
use crate::storage::ObjectStorage;
use crate::summary::{
    SchemaError, SummarizeOptions, SummaryService, ValidatedSummary,
    shape_schemas, validate,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Services shared by the route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Summarization orchestrator.
    pub summaries: Arc<SummaryService>,
    /// Model catalog.
    pub catalog: Arc<dyn CatalogApi>,
    /// Derived-asset trigger.
    pub dispatcher: Arc<AssetDispatcher>,
    /// Book records.
    pub books: Arc<dyn BookRepository>,
    /// Privilege checks for book writes.
    pub authorizer: Arc<dyn Authorizer>,
    /// Shared counters.
    pub metrics: Arc<PipelineMetrics>,
}

/// Wire the production collaborators from `config` and return the public router merged with the
/// executor routes. Summarization stays disabled (config error per request) without a provider key.
pub fn build_app(config: &Config) -> Result<Router, PipelineError> {
    let metrics = Arc::new(PipelineMetrics::new());
    let books = Arc::new(InMemoryBookRepository::new());

    let completions: Option<Arc<dyn CompletionClient>> = match OpenRouterClient::from_config(config)
    {
        Ok(client) => Some(Arc::new(client)),
        Err(error) => {
            tracing::warn!(error = %error, "Summarization disabled until a provider key is set");
            None
        }
    };
    let catalog: Arc<dyn CatalogApi> = Arc::new(ModelCatalog::from_config(config)?);
    let summaries = Arc::new(SummaryService::new(
        completions,
        catalog.clone(),
        books.clone(),
        metrics.clone(),
        config.clone(),
    ));
    let authorizer = Arc::new(StaticTokenAuthorizer::new(config.admin_tokens.clone()));
    let dispatcher = Arc::new(AssetDispatcher::new(
        authorizer.clone(),
        books.clone(),
        Arc::new(HttpJobTransport::from_config(config)?),
        config.import_secret.clone(),
        metrics.clone(),
    ));

    let executor = executor_router(ExecutorState {
        books: books.clone(),
        speech: Arc::new(SpeechSynthesizer::from_config(config)?),
        covers: Arc::new(CoverImageClient::from_config(config)?),
        storage: Arc::new(ObjectStorage::from_config(config)?),
        import_secret: config.import_secret.clone(),
        metrics: metrics.clone(),
    });

    Ok(create_router(AppState {
        summaries,
        catalog,
        dispatcher,
        books,
        authorizer,
        metrics,
    })
    .merge(executor))
}

/// Build the public router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/documents/word-count", post(count_document_words))
        .route("/documents/chunks", post(chunk_document))
        .route("/summaries", post(summarize_document))
        .route("/summaries/validate", post(validate_summary))
        .route("/summaries/schemas", get(get_schemas))
        .route("/models", get(list_models))
        .route("/books/:id", get(get_book).put(put_book))
        .route("/books/:id/cover", post(dispatch_cover))
        .route("/books/:id/audio", post(dispatch_audio))
        .route("/metrics", get(get_metrics))
        .route("/commands", get(get_commands))
        .with_state(state)
}

async fn count_document_words(Json(document): Json<Document>) -> Json<ExtractionReport> {
    Json(document.extraction_report())
}

/// Request body for `POST /documents/chunks`.
#[derive(Deserialize)]
struct ChunkRequest {
    text: String,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    overlap: Option<usize>,
    #[serde(default)]
    max_chunks: Option<usize>,
}

#[derive(Serialize)]
struct ChunkResponse {
    chunk_count: usize,
    chunk_size: usize,
    overlap: usize,
    chunks: Vec<Chunk>,
}

async fn chunk_document(
    State(state): State<AppState>,
    Json(request): Json<ChunkRequest>,
) -> Json<ChunkResponse> {
    let options = state.summaries.chunk_options(&SummarizeOptions {
        chunk_size: request.chunk_size,
        overlap: request.overlap,
        max_chunks: request.max_chunks,
        ..SummarizeOptions::default()
    });
    let chunks = chunk(&request.text, options);
    Json(ChunkResponse {
        chunk_count: chunks.len(),
        chunk_size: options.effective_size(),
        overlap: options.effective_overlap(),
        chunks,
    })
}

/// Request body for `POST /summaries`: the document plus per-request overrides.
#[derive(Deserialize)]
struct SummarizeRequest {
    text: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    source_filename: Option<String>,
    #[serde(default)]
    byte_size: u64,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    book_id: Option<String>,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    overlap: Option<usize>,
    #[serde(default)]
    max_chunks: Option<usize>,
}

impl SummarizeRequest {
    fn into_parts(self) -> (Document, SummarizeOptions) {
        let document = Document {
            title: self.title,
            author: self.author,
            source_filename: self.source_filename,
            byte_size: self.byte_size,
            text: self.text,
        };
        let options = SummarizeOptions {
            model: self.model,
            prompt: self.prompt,
            book_id: self.book_id,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            max_chunks: self.max_chunks,
        };
        (document, options)
    }
}

async fn summarize_document(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (document, options) = request.into_parts();
    let outcome = state.summaries.summarize(document, options).await?;
    tracing::info!(
        model = %outcome.model,
        shape = outcome.summary.shape().as_str(),
        chunks = outcome.chunk_count,
        failed = outcome.failed_chunks,
        "Summary request completed"
    );
    Ok((etag(&outcome.summary), Json(outcome)))
}

async fn validate_summary(Json(payload): Json<Value>) -> Result<impl IntoResponse, AppError> {
    let summary = validate(&payload)?;
    Ok((etag(&summary), Json(summary)))
}

fn etag(summary: &ValidatedSummary) -> [(header::HeaderName, String); 1] {
    [(header::ETAG, format!("\"{}\"", summary.fingerprint))]
}

async fn get_schemas() -> Json<Value> {
    Json(shape_schemas())
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<ModelDescriptor>,
}

async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, AppError> {
    let models = state.catalog.list_models().await?;
    Ok(Json(ModelsResponse { models }))
}

async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookRecord>, AppError> {
    let book = state
        .books
        .get(&id)
        .await?
        .ok_or_else(|| PipelineError::validation(format!("unknown book `{id}`")))?;
    Ok(Json(book))
}

/// Request body for `PUT /books/:id`.
#[derive(Deserialize)]
struct BookMetadataRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
}

async fn put_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<BookMetadataRequest>,
) -> Result<Json<BookRecord>, AppError> {
    if !state
        .authorizer
        .is_elevated(&Principal::from_headers(&headers))
        .await
    {
        return Err(
            PipelineError::Authorization("book writes require elevated privilege".into()).into(),
        );
    }
    let book = state
        .books
        .put_metadata(&id, &request.title, &request.author)
        .await?;
    tracing::info!(book = %book.id, "Book metadata stored");
    Ok(Json(book))
}

async fn dispatch_cover(
    state: State<AppState>,
    id: Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchAccepted>), AppError> {
    dispatch(state, id, headers, body, JobKind::Cover).await
}

async fn dispatch_audio(
    state: State<AppState>,
    id: Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchAccepted>), AppError> {
    dispatch(state, id, headers, body, JobKind::Audio).await
}

async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
    kind: JobKind,
) -> Result<(StatusCode, Json<DispatchAccepted>), AppError> {
    // An empty body means default options.
    let options: DispatchOptions = if body.iter().all(u8::is_ascii_whitespace) {
        DispatchOptions::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|error| {
                PipelineError::validation(format!("invalid dispatch options: {error}"))
            })?
    };
    let principal = Principal::from_headers(&headers);
    let accepted = state
        .dispatcher
        .dispatch(&principal, kind, &id, options)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "word_count",
                method: "POST",
                path: "/documents/word-count",
                description: "Count words and flag scanned sources with implausibly few words.",
                request_example: Some(json!({
                    "text": "Extracted text",
                    "source_filename": "book.pdf",
                    "byte_size": 2_400_000
                })),
            },
            CommandDescriptor {
                name: "chunk",
                method: "POST",
                path: "/documents/chunks",
                description: "Split text into overlapping character windows covering the document.",
                request_example: Some(json!({
                    "text": "Document contents",
                    "chunk_size": 4000,
                    "overlap": 250
                })),
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summaries",
                description: "Summarize chunk by chunk, compose, validate; book_id persists it.",
                request_example: Some(json!({
                    "text": "Document contents",
                    "title": "Walden",
                    "author": "Henry David Thoreau",
                    "model": "openai/gpt-4o-mini",
                    "book_id": "book-123"
                })),
            },
            CommandDescriptor {
                name: "validate_summary",
                method: "POST",
                path: "/summaries/validate",
                description: "Validate a payload against the summary shapes; first match wins.",
                request_example: Some(json!({ "summary": "A short summary." })),
            },
            CommandDescriptor {
                name: "summary_schemas",
                method: "GET",
                path: "/summaries/schemas",
                description: "Return JSON Schemas for the structured and flexible summary shapes.",
                request_example: None,
            },
            CommandDescriptor {
                name: "models",
                method: "GET",
                path: "/models",
                description: "List text-capable models with prices per million tokens.",
                request_example: None,
            },
            CommandDescriptor {
                name: "put_book",
                method: "PUT",
                path: "/books/:id",
                description: "Create a book or update title and author. Needs an elevated token.",
                request_example: Some(json!({
                    "title": "Walden",
                    "author": "Henry David Thoreau"
                })),
            },
            CommandDescriptor {
                name: "get_book",
                method: "GET",
                path: "/books/:id",
                description: "Return a book with its summary and asset URLs.",
                request_example: None,
            },
            CommandDescriptor {
                name: "generate_cover",
                method: "POST",
                path: "/books/:id/cover",
                description: "Dispatch cover generation. Needs an elevated token; returns 202.",
                request_example: Some(json!({ "feedback": "less busy background", "force": true })),
            },
            CommandDescriptor {
                name: "generate_audio",
                method: "POST",
                path: "/books/:id/audio",
                description: "Dispatch summary narration. Needs an elevated token; returns 202.",
                request_example: Some(json!({ "force": false })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return summarization and dispatch counters.",
                request_example: None,
            },
        ],
    })
}

/// Error wrapper translating [`PipelineError`] into an HTTP response.
pub(crate) struct AppError(pub(crate) PipelineError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Authorization(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }
        let body = json!({ "error": self.0.kind(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self(inner)
    }
}

impl From<SchemaError> for AppError {
    fn from(inner: SchemaError) -> Self {
        Self(inner.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, create_router, get_commands};
    use crate::assets::{AssetDispatcher, DerivedAssetJob, JobTransport};
    use crate::auth::StaticTokenAuthorizer;
    use crate::books::{BookRecord, InMemoryBookRepository};
    use crate::catalog::{CatalogApi, ModelDescriptor};
    use crate::config::Config;
    use crate::error::PipelineError;
    use crate::metrics::PipelineMetrics;
    use crate::summary::SummaryService;
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    struct StubCatalog;

    #[async_trait]
    impl CatalogApi for StubCatalog {
        async fn list_models(&self) -> Result<Vec<ModelDescriptor>, PipelineError> {
            Ok(vec![ModelDescriptor {
                id: "openai/gpt-4o-mini".into(),
                name: "GPT-4o mini".into(),
                prompt_price: Some("0.15".into()),
                ..ModelDescriptor::default()
            }])
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        jobs: Mutex<Vec<DerivedAssetJob>>,
    }

    #[async_trait]
    impl JobTransport for RecordingTransport {
        async fn send(&self, job: &DerivedAssetJob) -> Result<(), PipelineError> {
            self.jobs.lock().await.push(job.clone());
            Ok(())
        }
    }

    async fn app() -> Router {
        let books = Arc::new(InMemoryBookRepository::new());
        books
            .insert(BookRecord {
                id: "b1".into(),
                title: "Walden".into(),
                author: "Henry David Thoreau".into(),
                ..BookRecord::default()
            })
            .await;
        let metrics = Arc::new(PipelineMetrics::new());
        let catalog: Arc<dyn CatalogApi> = Arc::new(StubCatalog);
        let summaries = Arc::new(SummaryService::new(
            None,
            catalog.clone(),
            books.clone(),
            metrics.clone(),
            Config::default(),
        ));
        let authorizer = Arc::new(StaticTokenAuthorizer::new(vec!["admin".into()]));
        let dispatcher = Arc::new(AssetDispatcher::new(
            authorizer.clone(),
            books.clone(),
            Arc::new(RecordingTransport::default()),
            Some("secret".into()),
            metrics.clone(),
        ));
        create_router(AppState {
            summaries,
            catalog,
            dispatcher,
            books,
            authorizer,
            metrics,
        })
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[tokio::test]
    async fn commands_catalog_exposes_summary_endpoint() {
        let commands = get_commands().await.0.commands;
        let summarize = commands
            .iter()
            .find(|cmd| cmd.name == "summarize")
            .expect("summarize command present");
        assert_eq!(summarize.method, "POST");
        assert_eq!(summarize.path, "/summaries");
        assert!(commands.iter().any(|cmd| cmd.path == "/books/:id/cover"));
    }

    #[tokio::test]
    async fn chunks_route_applies_overrides() {
        let response = app()
            .await
            .oneshot(post(
                "/documents/chunks",
                json!({ "text": "abcdefghij", "chunk_size": 4, "overlap": 1 }),
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["chunk_count"], 3);
        assert_eq!(json["chunks"][0]["text"], "abcd");
        assert_eq!(json["chunks"][1]["start_offset"], 3);
    }

    #[tokio::test]
    async fn word_count_route_reports_words() {
        let response = app()
            .await
            .oneshot(post("/documents/word-count", json!({ "text": "one two, three!" })))
            .await
            .expect("router response");
        let json = json_body(response).await;
        assert_eq!(json["word_count"], 3);
        assert!(json.get("warning").is_none());
    }

    #[tokio::test]
    async fn invalid_summary_payload_is_unprocessable() {
        let response = app()
            .await
            .oneshot(post("/summaries/validate", json!({ "summary": "" })))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"], "validation_error");
    }

    #[tokio::test]
    async fn accepted_summary_carries_fingerprint_etag() {
        let response = app()
            .await
            .oneshot(post("/summaries/validate", json!("A short novel.")))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let etag = response
            .headers()
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header");
        let json = json_body(response).await;
        assert_eq!(etag, format!("\"{}\"", json["fingerprint"].as_str().expect("fingerprint")));
    }

    #[tokio::test]
    async fn summaries_without_credentials_are_config_errors() {
        let response = app()
            .await
            .oneshot(post("/summaries", json!({ "text": "Some text" })))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "config_error");
    }

    #[tokio::test]
    async fn models_route_lists_catalog() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/models")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = json_body(response).await;
        assert_eq!(json["models"][0]["id"], "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn book_metadata_round_trips_through_routes() {
        let app = app().await;
        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/books/b9")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "title": "Ulysses" }).to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let stored = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/books/b9")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer admin")
                    .body(Body::from(
                        json!({ "title": "Ulysses", "author": "James Joyce" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(stored.status(), StatusCode::OK);

        let fetched = app
            .oneshot(
                Request::builder()
                    .uri("/books/b9")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = json_body(fetched).await;
        assert_eq!(json["author"], "James Joyce");
        assert!(json["summary"].is_null());
    }

    #[tokio::test]
    async fn cover_dispatch_requires_elevated_token() {
        let response = app()
            .await
            .oneshot(post("/books/b1/cover", json!({})))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cover_dispatch_is_accepted() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/books/b1/cover")
                    .header("authorization", "Bearer admin")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = json_body(response).await;
        assert_eq!(json["status"], "processing");
        assert_eq!(json["kind"], "cover");
        assert_eq!(json["target_id"], "b1");
    }
}
