//! Ordered validation cascade over inbound summary payloads.
//!
//! Attempts run from strictest/most common to most permissive: raw text, structured, flexible.
//! The first success wins. When every attempt fails, only the raw-text reason is reported.

use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::shapes::{
    FlexibleSummary, StructuredSummary, Summary, SummaryShape, parse_flexible, parse_raw_text,
    parse_structured,
};
use crate::error::PipelineError;

type ShapeParser = fn(&Value) -> Result<Summary, String>;

/// Attempts in evaluation order.
const CASCADE: [(SummaryShape, ShapeParser); 3] = [
    (SummaryShape::RawText, parse_raw_text),
    (SummaryShape::Structured, parse_structured),
    (SummaryShape::Flexible, parse_flexible),
];

/// Rejection carrying the reason of the first (strictest) attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("summary payload matches no accepted shape ({shape}: {detail})", shape = .shape.as_str())]
pub struct SchemaError {
    /// Attempt whose reason is reported.
    pub shape: SummaryShape,
    /// Reason that attempt rejected the payload.
    pub detail: String,
}

impl From<SchemaError> for PipelineError {
    fn from(error: SchemaError) -> Self {
        PipelineError::Validation(error.to_string())
    }
}

/// Summary accepted by the cascade.
///
/// Serializes as `{ "shape": .., "data": .., "fingerprint": .. }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedSummary {
    /// Normalized summary data, tagged with its shape.
    #[serde(flatten)]
    pub summary: Summary,
    /// SHA-256 of the normalized summary, hex encoded.
    pub fingerprint: String,
}

impl ValidatedSummary {
    /// Shape the payload was accepted as.
    pub fn shape(&self) -> SummaryShape {
        self.summary.shape()
    }
}

/// Validate a payload against the three shapes in order.
pub fn validate(payload: &Value) -> Result<ValidatedSummary, SchemaError> {
    run_cascade(payload, &CASCADE)
}

fn run_cascade(
    payload: &Value,
    attempts: &[(SummaryShape, ShapeParser)],
) -> Result<ValidatedSummary, SchemaError> {
    let mut first_error: Option<SchemaError> = None;

    for (shape, parser) in attempts {
        match parser(payload) {
            Ok(summary) => {
                let fingerprint = fingerprint(&summary);
                tracing::debug!(shape = shape.as_str(), %fingerprint, "Summary payload accepted");
                return Ok(ValidatedSummary {
                    summary,
                    fingerprint,
                });
            }
            Err(detail) => {
                tracing::trace!(shape = shape.as_str(), %detail, "Summary shape rejected payload");
                first_error.get_or_insert(SchemaError {
                    shape: *shape,
                    detail,
                });
            }
        }
    }

    Err(first_error.unwrap_or(SchemaError {
        shape: SummaryShape::RawText,
        detail: "no validators configured".into(),
    }))
}

fn fingerprint(summary: &Summary) -> String {
    let canonical = serde_json::to_vec(summary).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

/// JSON Schemas describing the structured and flexible shapes, for producers and prompt authors.
pub fn shape_schemas() -> Value {
    let structured: RootSchema = schema_for!(StructuredSummary);
    let flexible: RootSchema = schema_for!(FlexibleSummary);
    serde_json::json!({
        "order": CASCADE.iter().map(|(shape, _)| shape.as_str()).collect::<Vec<_>>(),
        "raw_text": {
            "description":
                "A JSON string, or an object whose only key is a non-blank `summary` string."
        },
        "structured": structured,
        "flexible": flexible,
    })
}
