//! Lexical word counting and the scanned-document heuristic built on it.

use serde::Serialize;
use std::path::Path;

/// Extensions whose files may hold page images instead of extractable text.
const PAGE_IMAGE_EXTENSIONS: &[&str] = &["pdf", "djvu", "tif", "tiff", "png", "jpg", "jpeg"];
/// Sources smaller than this are never flagged.
const LARGE_SOURCE_BYTES: u64 = 100 * 1024;
/// Expected minimum yield per 100 KiB of source.
const MIN_WORDS_PER_100_KIB: u64 = 50;
/// Floor for the expected word count of a large source.
const MIN_EXPECTED_WORDS: u64 = 200;

/// Count words in `text`.
///
/// Whitespace separates tokens; a token is a word when it holds at least one Unicode letter or
/// digit, so `well-known` counts once and a lone `—` does not count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Warning attached to an extraction that yielded suspiciously little text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// The source is large, page-image capable, and produced almost no words (likely scanned).
    PossiblyNonTextExtractable,
}

/// Word count plus the optional low-yield warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Number of words in the extracted text.
    pub word_count: usize,
    /// Set when the extraction probably failed to recover real text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ExtractionWarning>,
}

/// Count words and flag large page-image sources whose extraction yielded implausibly few words.
pub fn assess_extraction(
    source_filename: Option<&str>,
    byte_size: u64,
    text: &str,
) -> ExtractionReport {
    let word_count = count_words(text);
    let page_image_capable = source_filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            PAGE_IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate))
        });

    let warning = (page_image_capable
        && byte_size >= LARGE_SOURCE_BYTES
        && (word_count as u64) < expected_minimum_words(byte_size))
    .then_some(ExtractionWarning::PossiblyNonTextExtractable);

    if warning.is_some() {
        tracing::warn!(
            source = source_filename.unwrap_or_default(),
            byte_size,
            word_count,
            "Extraction yielded few words; source may be scanned images"
        );
    }

    ExtractionReport {
        word_count,
        warning,
    }
}

fn expected_minimum_words(byte_size: u64) -> u64 {
    (byte_size / LARGE_SOURCE_BYTES * MIN_WORDS_PER_100_KIB).max(MIN_EXPECTED_WORDS)
}
