#![deny(missing_docs)]

//! Core library for bookbrief: document chunking, AI summarization with schema validation, and
//! derived-asset (cover and narration) dispatch.

/// HTTP routing and REST handlers.
pub mod api;
/// Derived-asset dispatch, transport, and background executor.
pub mod assets;
/// Privilege checks and shared-secret comparison.
pub mod auth;
/// Book records and the repository seam.
pub mod books;
/// Model catalog with price normalization.
pub mod catalog;
/// Environment-driven configuration.
pub mod config;
/// Pipeline error taxonomy.
pub mod error;
/// Chat-completion client.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Chunking, merging, and word counting.
pub mod processing;
/// Text-to-speech client.
pub mod speech;
/// Object storage uploads.
pub mod storage;
/// Summary shapes, validation cascade, and orchestration.
pub mod summary;

pub use error::PipelineError;
