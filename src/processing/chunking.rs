//! Sliding-window chunking sized for a model's context limit.
//!
//! Windows are measured in characters (Unicode scalar values) so that slicing never splits a
//! code point. Consecutive windows share `overlap` characters; the last window may be shorter.
//! Token estimates for a window come from `tiktoken-rs` when the model maps to a known encoding
//! and fall back to a whitespace counter otherwise.

use serde::Serialize;
use std::sync::Arc;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};

/// Default nominal window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 4000;
/// Default number of characters shared by consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 250;

/// Options controlling window size, overlap, and the capacity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Nominal window size; clamped to at least 1.
    pub chunk_size: usize,
    /// Shared characters between windows; clamped to `chunk_size - 1`.
    pub overlap: usize,
    /// Stop after this many windows, dropping the tail of the document; clamped to at least 1.
    pub max_chunks: Option<usize>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            max_chunks: None,
        }
    }
}

impl ChunkOptions {
    /// Window size after clamping.
    pub fn effective_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Overlap after clamping against the effective size.
    pub fn effective_overlap(&self) -> usize {
        self.overlap.min(self.effective_size() - 1)
    }

    /// Window limit after clamping, so non-empty input always yields a chunk.
    pub fn effective_max_chunks(&self) -> Option<usize> {
        self.max_chunks.map(|limit| limit.max(1))
    }

    /// Cursor advance between windows; always at least 1.
    pub fn step(&self) -> usize {
        self.effective_size() - self.effective_overlap()
    }
}

/// A bounded window of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Ordinal position of the window.
    pub index: usize,
    /// Window contents.
    pub text: String,
    /// Character offset where the window starts.
    pub start_offset: usize,
    /// Character offset one past the window end.
    pub end_offset: usize,
}

/// Split `text` into overlapping windows.
///
/// Empty input yields no chunks, and input no longer than one window yields exactly one chunk
/// holding the whole text. The result depends only on the arguments.
pub fn chunk(text: &str, options: ChunkOptions) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character start, plus the end of the string.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let size = options.effective_size();

    if char_len <= size {
        return vec![Chunk {
            index: 0,
            text: text.to_string(),
            start_offset: 0,
            end_offset: char_len,
        }];
    }

    let step = options.step();
    let limit = options.effective_max_chunks();
    let mut chunks = Vec::new();
    let mut cursor = 0;

    loop {
        if limit.is_some_and(|limit| chunks.len() >= limit) {
            tracing::debug!(
                emitted = chunks.len(),
                dropped_from = cursor,
                total = char_len,
                "Chunk limit reached; dropping document tail"
            );
            break;
        }

        let end = (cursor + size).min(char_len);
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[boundaries[cursor]..boundaries[end]].to_string(),
            start_offset: cursor,
            end_offset: end,
        });

        if end == char_len {
            break;
        }
        cursor += step;
    }

    chunks
}

/// Convenience wrapper returning only the window texts.
pub fn chunk_texts(text: &str, options: ChunkOptions) -> Vec<String> {
    chunk(text, options)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

/// Approximate token counter for a model identifier.
#[derive(Clone)]
pub struct TokenEstimator {
    encoding: Option<Arc<CoreBPE>>,
}

impl TokenEstimator {
    /// Resolve an encoding for the model, ignoring any `vendor/` prefix.
    pub fn for_model(model: &str) -> Self {
        let bare = model.rsplit('/').next().unwrap_or(model).trim();
        let encoding = match get_bpe_from_model(bare) {
            Ok(encoding) => Some(encoding),
            Err(_) if ["gpt-4o", "o1", "o3", "o4"]
                .iter()
                .any(|prefix| bare.starts_with(prefix)) =>
            {
                o200k_base().ok()
            }
            Err(error) => {
                tracing::trace!(
                    model,
                    error = %error,
                    "Unknown tokenizer for model; using cl100k_base"
                );
                cl100k_base().ok()
            }
        };
        if encoding.is_none() {
            tracing::warn!(model, "Tokenizer unavailable; falling back to whitespace counter");
        }
        Self {
            encoding: encoding.map(Arc::new),
        }
    }

    /// Count tokens in `text`.
    pub fn estimate(&self, text: &str) -> usize {
        match &self.encoding {
            Some(encoding) => encoding.encode_ordinary(text).len(),
            None => whitespace_tokens(text),
        }
    }
}

fn whitespace_tokens(text: &str) -> usize {
    let tokens = text.split_whitespace().count();
    if tokens == 0 && !text.is_empty() { 1 } else { tokens }
}
