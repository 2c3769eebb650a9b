//! Summary shapes, the validation cascade, and the summarization orchestrator.

pub mod schema;
pub mod service;
pub mod shapes;

pub use schema::{SchemaError, ValidatedSummary, shape_schemas, validate};
pub use service::{SummarizeOptions, SummaryOutcome, SummaryService};
pub use shapes::{
    ChapterSummary, FlexibleSection, FlexibleSummary, SectionContent, StructuredSummary, Summary,
    SummaryShape,
};
