//! Document processing primitives: chunking, merging, and word counting.

pub mod chunking;
pub mod merge;
pub mod word_count;

pub use chunking::{Chunk, ChunkOptions, TokenEstimator, chunk, chunk_texts};
pub use merge::merge;
pub use word_count::{ExtractionReport, ExtractionWarning, assess_extraction, count_words};

use serde::Deserialize;

/// Extracted document handed to the pipeline for the duration of one request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    /// Book title, when known.
    #[serde(default)]
    pub title: Option<String>,
    /// Book author, when known.
    #[serde(default)]
    pub author: Option<String>,
    /// Name of the uploaded file the text was extracted from.
    #[serde(default)]
    pub source_filename: Option<String>,
    /// Size of the uploaded file in bytes.
    #[serde(default)]
    pub byte_size: u64,
    /// Extracted plain text.
    pub text: String,
}

impl Document {
    /// Wrap plain text without metadata.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Run the extraction heuristic over this document.
    pub fn extraction_report(&self) -> ExtractionReport {
        assess_extraction(self.source_filename.as_deref(), self.byte_size, &self.text)
    }
}
