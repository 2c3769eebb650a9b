//! Summarization orchestrator.
//!
//! A document is chunked, each chunk is summarized independently (bounded concurrency, order
//! preserved), the partial summaries are merged, and a final compose call turns the merged notes
//! into a payload that must pass the validation cascade before it is returned or persisted.

use super::schema::{ValidatedSummary, validate};
use crate::books::BookRepository;
use crate::catalog::CatalogApi;
use crate::config::{Config, ConfigError};
use crate::error::PipelineError;
use crate::llm::{CompletionClient, CompletionRequest};
use crate::metrics::PipelineMetrics;
use crate::processing::{ChunkOptions, Document, ExtractionWarning, TokenEstimator, chunk, merge};
use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const CHUNK_SYSTEM_PROMPT: &str = "You summarize one excerpt of a longer book. Capture the main \
events, arguments, and named people in plain prose. Do not speculate about parts you have not \
seen.";

const STRUCTURED_COMPOSE_PROMPT: &str = "You combine partial notes about a book into one summary. \
Reply with a single JSON object and nothing else, using exactly these keys: \"overview\" (string), \
\"key_points\" (1 to 20 strings), \"chapters\" (list of {\"title\", \"summary\"} objects), \
\"themes\" (strings), \"takeaways\" (1 to 20 strings), \"quotes\" (strings).";

const FLEXIBLE_COMPOSE_SUFFIX: &str = "Reply with a single JSON object and nothing else. Each key \
is a section name; each value is a string, a list of strings, or an object of the same form.";

/// Per-request overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummarizeOptions {
    /// Model identifier; defaults to the configured summary model.
    #[serde(default)]
    pub model: Option<String>,
    /// Custom instructions; when present the reply is expected in the flexible shape.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Persist the accepted summary on this book.
    #[serde(default)]
    pub book_id: Option<String>,
    /// Chunk window override.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Chunk overlap override.
    #[serde(default)]
    pub overlap: Option<usize>,
    /// Chunk capacity override.
    #[serde(default)]
    pub max_chunks: Option<usize>,
}

/// Result of a successful summarization.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    /// Summary accepted by the cascade.
    pub summary: ValidatedSummary,
    /// Model that produced it.
    pub model: String,
    /// Number of chunks the document was split into.
    pub chunk_count: usize,
    /// Chunks whose completion failed and were left out of the merge.
    pub failed_chunks: usize,
    /// Words in the source text.
    pub word_count: usize,
    /// Low-yield extraction warning, when raised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_warning: Option<ExtractionWarning>,
}

/// Coordinates completion calls, validation, and persistence for one document at a time.
pub struct SummaryService {
    completions: Option<Arc<dyn CompletionClient>>,
    catalog: Arc<dyn CatalogApi>,
    books: Arc<dyn BookRepository>,
    metrics: Arc<PipelineMetrics>,
    config: Config,
}

impl SummaryService {
    /// Assemble the service. `completions` is `None` when no provider credential is configured.
    pub fn new(
        completions: Option<Arc<dyn CompletionClient>>,
        catalog: Arc<dyn CatalogApi>,
        books: Arc<dyn BookRepository>,
        metrics: Arc<PipelineMetrics>,
        config: Config,
    ) -> Self {
        Self {
            completions,
            catalog,
            books,
            metrics,
            config,
        }
    }

    /// Shared counters.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Chunk options after applying request overrides to the configured defaults.
    pub fn chunk_options(&self, options: &SummarizeOptions) -> ChunkOptions {
        ChunkOptions {
            chunk_size: options.chunk_size.unwrap_or(self.config.chunk_size),
            overlap: options.overlap.unwrap_or(self.config.chunk_overlap),
            max_chunks: options.max_chunks.or(self.config.max_chunks),
        }
    }

    /// Summarize `document`, persisting the result when `options.book_id` is set.
    pub async fn summarize(
        &self,
        document: Document,
        options: SummarizeOptions,
    ) -> Result<SummaryOutcome, PipelineError> {
        if document.text.trim().is_empty() {
            return Err(PipelineError::validation("document text must not be empty"));
        }
        let completions = self
            .completions
            .as_ref()
            .ok_or(ConfigError::MissingCredential("OPENROUTER_API_KEY"))?;
        if let Some(book_id) = options.book_id.as_deref() {
            if self.books.get(book_id).await?.is_none() {
                return Err(PipelineError::validation(format!("unknown book `{book_id}`")));
            }
        }

        let model = options
            .model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.config.summary_model.clone());
        let context_length = self.context_length(&model).await?;

        let report = document.extraction_report();
        if let Some(warning) = report.warning {
            tracing::warn!(
                source = document.source_filename.as_deref().unwrap_or("<inline>"),
                bytes = document.byte_size,
                words = report.word_count,
                ?warning,
                "Extraction yielded little text"
            );
        }

        let chunks = chunk(&document.text, self.chunk_options(&options));
        let total = chunks.len();
        if let Some(limit) = context_length {
            let estimator = TokenEstimator::for_model(&model);
            let largest = chunks
                .iter()
                .map(|chunk| estimator.estimate(&chunk.text))
                .max()
                .unwrap_or(0);
            if largest as u64 > limit {
                tracing::warn!(
                    model = %model,
                    largest,
                    limit,
                    "Chunk exceeds model context length"
                );
            }
        }
        tracing::info!(
            model = %model,
            chunks = total,
            words = report.word_count,
            "Summarizing document"
        );

        let concurrency = self.config.chunk_concurrency.max(1);
        let results: Vec<Result<String, PipelineError>> = stream::iter(chunks)
            .map(|chunk| {
                let request = CompletionRequest {
                    model: model.clone(),
                    system: CHUNK_SYSTEM_PROMPT.to_string(),
                    user: format!("Excerpt {} of {total}:\n\n{}", chunk.index + 1, chunk.text),
                };
                async move { completions.complete(request).await }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut partials = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(text) => partials.push(text),
                Err(error) => {
                    tracing::warn!(chunk = index, error = %error, "Chunk summary failed; omitting");
                    first_error.get_or_insert(error);
                }
            }
        }
        let failed_chunks = total - partials.len();
        if partials.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| PipelineError::validation("document produced no chunks")));
        }

        let reply = completions
            .complete(self.compose_request(&model, &document, &options, &merge(&partials)))
            .await?;
        let summary = validate(&reply_payload(&reply))?;

        if let Some(book_id) = options.book_id.as_deref() {
            self.books.save_summary(book_id, &summary).await?;
            tracing::info!(book = book_id, shape = summary.shape().as_str(), "Summary saved");
        }
        self.metrics
            .record_summary(total as u64, failed_chunks as u64);

        Ok(SummaryOutcome {
            summary,
            model,
            chunk_count: total,
            failed_chunks,
            word_count: report.word_count,
            extraction_warning: report.warning,
        })
    }

    async fn context_length(&self, model: &str) -> Result<Option<u64>, PipelineError> {
        match self.catalog.find(model).await {
            Ok(descriptor) => Ok(descriptor.context_length),
            Err(error @ PipelineError::Validation(_)) => Err(error),
            Err(error) => {
                tracing::warn!(
                    model,
                    error = %error,
                    "Model catalog unavailable; skipping context check"
                );
                Ok(None)
            }
        }
    }

    fn compose_request(
        &self,
        model: &str,
        document: &Document,
        options: &SummarizeOptions,
        notes: &str,
    ) -> CompletionRequest {
        let system = match options.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => format!("{prompt}\n\n{FLEXIBLE_COMPOSE_SUFFIX}"),
            _ => STRUCTURED_COMPOSE_PROMPT.to_string(),
        };
        let mut user = String::new();
        if let Some(title) = document.title.as_deref() {
            user.push_str(&format!("Title: {title}\n"));
        }
        if let Some(author) = document.author.as_deref() {
            user.push_str(&format!("Author: {author}\n"));
        }
        user.push_str("Notes:\n\n");
        user.push_str(notes);
        CompletionRequest {
            model: model.to_string(),
            system,
            user,
        }
    }
}

/// Interpret a compose reply: fenced or bare JSON is the payload, anything else is raw text.
fn reply_payload(reply: &str) -> Value {
    let body = strip_code_fences(reply);
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() || value.is_string() => value,
        _ => json!({ "summary": body }),
    }
}

fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
