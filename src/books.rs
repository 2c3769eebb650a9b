//! Book records as seen by the pipeline.
//!
//! Book storage is an external collaborator. The pipeline reads a book's metadata, writes
//! accepted summaries, and records derived-asset URLs through [`BookRepository`]; the in-memory
//! adapter backs the server binary and the tests.

use crate::assets::JobKind;
use crate::error::PipelineError;
use crate::summary::ValidatedSummary;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Book metadata and derived assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookRecord {
    /// Stable identifier.
    pub id: String,
    /// Title, possibly blank for incomplete imports.
    pub title: String,
    /// Author, possibly blank for incomplete imports.
    pub author: String,
    /// Latest accepted summary.
    pub summary: Option<ValidatedSummary>,
    /// URL of the generated cover.
    pub cover_url: Option<String>,
    /// URL of the narrated summary.
    pub audio_url: Option<String>,
}

/// Persistence operations the pipeline depends on.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Load a book, returning `None` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<BookRecord>, PipelineError>;

    /// Replace the book's summary.
    async fn save_summary(&self, id: &str, summary: &ValidatedSummary) -> Result<(), PipelineError>;

    /// Record the URL of a derived asset.
    async fn set_asset_url(&self, id: &str, kind: JobKind, url: &str) -> Result<(), PipelineError>;

    /// Create the book or update its title and author, keeping summary and assets.
    async fn put_metadata(
        &self,
        id: &str,
        title: &str,
        author: &str,
    ) -> Result<BookRecord, PipelineError>;
}

/// Process-local repository.
#[derive(Default)]
pub struct InMemoryBookRepository {
    books: RwLock<HashMap<String, BookRecord>>,
}

impl InMemoryBookRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a book.
    pub async fn insert(&self, book: BookRecord) {
        self.books.write().await.insert(book.id.clone(), book);
    }
}

fn unknown_book(id: &str) -> PipelineError {
    PipelineError::validation(format!("unknown book `{id}`"))
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn get(&self, id: &str) -> Result<Option<BookRecord>, PipelineError> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn save_summary(
        &self,
        id: &str,
        summary: &ValidatedSummary,
    ) -> Result<(), PipelineError> {
        let mut books = self.books.write().await;
        let book = books.get_mut(id).ok_or_else(|| unknown_book(id))?;
        book.summary = Some(summary.clone());
        Ok(())
    }

    async fn set_asset_url(&self, id: &str, kind: JobKind, url: &str) -> Result<(), PipelineError> {
        let mut books = self.books.write().await;
        let book = books.get_mut(id).ok_or_else(|| unknown_book(id))?;
        match kind {
            JobKind::Cover => book.cover_url = Some(url.to_string()),
            JobKind::Audio => book.audio_url = Some(url.to_string()),
        }
        Ok(())
    }

    async fn put_metadata(
        &self,
        id: &str,
        title: &str,
        author: &str,
    ) -> Result<BookRecord, PipelineError> {
        if id.trim().is_empty() {
            return Err(PipelineError::validation("book id must not be blank"));
        }
        let mut books = self.books.write().await;
        let book = books.entry(id.to_string()).or_insert_with(|| BookRecord {
            id: id.to_string(),
            ..BookRecord::default()
        });
        book.title = title.trim().to_string();
        book.author = author.trim().to_string();
        Ok(book.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::validate;
    use serde_json::json;

    #[tokio::test]
    async fn records_summaries_and_assets() {
        let repository = InMemoryBookRepository::new();
        repository
            .insert(BookRecord {
                id: "b1".into(),
                title: "Dune".into(),
                author: "Frank Herbert".into(),
                ..BookRecord::default()
            })
            .await;

        let summary = validate(&json!("Spice.")).expect("summary");
        repository.save_summary("b1", &summary).await.expect("saved");
        repository
            .set_asset_url("b1", JobKind::Audio, "https://cdn/b1.mp3")
            .await
            .expect("asset");

        let book = repository.get("b1").await.expect("get").expect("book");
        assert_eq!(book.summary, Some(summary));
        assert_eq!(book.audio_url.as_deref(), Some("https://cdn/b1.mp3"));
        assert_eq!(book.cover_url, None);
    }

    #[tokio::test]
    async fn metadata_updates_keep_assets() {
        let repository = InMemoryBookRepository::new();
        repository.put_metadata("b2", "Draft", "").await.expect("created");
        repository
            .set_asset_url("b2", JobKind::Cover, "https://cdn/b2.png")
            .await
            .expect("asset");

        let book = repository
            .put_metadata("b2", " Final Title ", "A. Writer")
            .await
            .expect("updated");
        assert_eq!(book.title, "Final Title");
        assert_eq!(book.author, "A. Writer");
        assert_eq!(book.cover_url.as_deref(), Some("https://cdn/b2.png"));
    }

    #[tokio::test]
    async fn writes_to_unknown_books_are_rejected() {
        let repository = InMemoryBookRepository::new();
        let error = repository
            .set_asset_url("missing", JobKind::Cover, "u")
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "validation_error");
    }
}
