//! The three accepted summary shapes and their per-shape parsers.
//!
//! Each parser takes the raw JSON payload and either returns normalized data (strings trimmed)
//! or a human-readable reason. Parsers do not know about each other; ordering lives in
//! [`super::schema`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MAX_KEY_POINTS: usize = 20;
const MAX_TAKEAWAYS: usize = 20;
const MAX_CHAPTERS: usize = 100;

/// Which shape a payload was accepted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryShape {
    /// A single opaque string.
    RawText,
    /// Fixed named sections.
    Structured,
    /// Caller-defined sections with relaxed constraints.
    Flexible,
}

impl SummaryShape {
    /// Snake-case label used in logs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RawText => "raw_text",
            Self::Structured => "structured",
            Self::Flexible => "flexible",
        }
    }
}

/// Accepted summary in exactly one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum Summary {
    /// Opaque summary text.
    RawText(String),
    /// Summary with the fixed section layout.
    Structured(StructuredSummary),
    /// Summary produced by a custom prompt.
    Flexible(FlexibleSummary),
}

impl Summary {
    /// Shape this summary was accepted as.
    pub fn shape(&self) -> SummaryShape {
        match self {
            Self::RawText(_) => SummaryShape::RawText,
            Self::Structured(_) => SummaryShape::Structured,
            Self::Flexible(_) => SummaryShape::Flexible,
        }
    }

    /// Plain prose rendering suitable for narration.
    pub fn narration_text(&self) -> String {
        match self {
            Self::RawText(text) => text.clone(),
            Self::Structured(summary) => {
                let mut parts = vec![summary.overview.clone()];
                if !summary.key_points.is_empty() {
                    parts.push(format!("Key points. {}", summary.key_points.join(" ")));
                }
                for chapter in &summary.chapters {
                    parts.push(format!("{}. {}", chapter.title, chapter.summary));
                }
                parts.push(format!("Takeaways. {}", summary.takeaways.join(" ")));
                parts.join("\n\n")
            }
            Self::Flexible(summary) => {
                let mut parts = Vec::new();
                if let Some(title) = &summary.title {
                    parts.push(title.clone());
                }
                for section in &summary.sections {
                    parts.push(format!("{}. {}", section.name, section.content.flatten()));
                }
                parts.join("\n\n")
            }
        }
    }
}

/// Chapter entry of a structured summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChapterSummary {
    /// Chapter heading.
    pub title: String,
    /// Chapter synopsis.
    pub summary: String,
}

/// Summary with the fixed section layout produced by the default prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StructuredSummary {
    /// One-paragraph synopsis.
    pub overview: String,
    /// Main ideas, 1 to 20 entries.
    pub key_points: Vec<String>,
    /// Per-chapter synopses, at most 100 entries.
    #[serde(default)]
    pub chapters: Vec<ChapterSummary>,
    /// Recurring themes.
    #[serde(default)]
    pub themes: Vec<String>,
    /// Actionable takeaways, 1 to 20 entries.
    pub takeaways: Vec<String>,
    /// Notable quotations.
    #[serde(default)]
    pub quotes: Vec<String>,
}

/// Summary built from caller-defined sections.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FlexibleSummary {
    /// Optional heading for the whole summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sections in payload order.
    pub sections: Vec<FlexibleSection>,
}

/// One named section of a flexible summary.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FlexibleSection {
    /// Section name as given by the producer.
    pub name: String,
    /// Section body.
    pub content: SectionContent,
}

/// Body of a flexible section.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum SectionContent {
    /// Prose paragraph.
    Text(String),
    /// Bullet list.
    List(Vec<String>),
    /// One level of named subsections.
    Nested(Vec<FlexibleSection>),
}

impl SectionContent {
    fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join(" "),
            Self::Nested(sections) => sections
                .iter()
                .map(|section| format!("{}: {}", section.name, section.content.flatten()))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Accept a JSON string, or an object whose only key is a `summary` string.
pub(crate) fn parse_raw_text(payload: &Value) -> Result<Summary, String> {
    let text = match payload {
        Value::String(text) => text,
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(format!(
                    "expected an object with only a `summary` string, found {} keys",
                    map.len()
                ));
            }
            match map.get("summary") {
                Some(Value::String(text)) => text,
                Some(other) => {
                    return Err(format!(
                        "`summary` must be a string, found {}",
                        json_type(other)
                    ));
                }
                None => return Err("missing `summary` string".into()),
            }
        }
        other => {
            return Err(format!(
                "expected a string or a `summary` object, found {}",
                json_type(other)
            ));
        }
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("`summary` must not be blank".into());
    }
    Ok(Summary::RawText(trimmed.to_string()))
}

/// Accept the fixed section layout; unknown fields are rejected.
pub(crate) fn parse_structured(payload: &Value) -> Result<Summary, String> {
    let body = unwrap_summary_object(payload).ok_or("expected a JSON object")?;
    let parsed: StructuredSummary =
        serde_json::from_value(Value::Object(body.clone())).map_err(|error| error.to_string())?;

    let overview = required_text("overview", &parsed.overview)?;
    let key_points = bounded_list("key_points", parsed.key_points, 1, MAX_KEY_POINTS)?;
    let takeaways = bounded_list("takeaways", parsed.takeaways, 1, MAX_TAKEAWAYS)?;
    let themes = bounded_list("themes", parsed.themes, 0, usize::MAX)?;
    let quotes = bounded_list("quotes", parsed.quotes, 0, usize::MAX)?;
    if parsed.chapters.len() > MAX_CHAPTERS {
        return Err(format!("`chapters` allows at most {MAX_CHAPTERS} entries"));
    }
    let chapters = parsed
        .chapters
        .into_iter()
        .enumerate()
        .map(|(index, chapter)| {
            Ok(ChapterSummary {
                title: required_text(&format!("chapters[{index}].title"), &chapter.title)?,
                summary: required_text(&format!("chapters[{index}].summary"), &chapter.summary)?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Summary::Structured(StructuredSummary {
        overview,
        key_points,
        chapters,
        themes,
        takeaways,
        quotes,
    }))
}

/// Accept any non-empty set of named sections; `title` and a `sections` wrapper are optional.
pub(crate) fn parse_flexible(payload: &Value) -> Result<Summary, String> {
    let body = unwrap_summary_object(payload).ok_or("expected a JSON object")?;
    let mut title = None;
    if let Some(Value::String(value)) = body.get("title") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            title = Some(trimmed.to_string());
        }
    }

    let (source, top_level) = match body.get("sections") {
        Some(Value::Object(inner)) => {
            let beside = body
                .keys()
                .find(|key| !matches!(key.as_str(), "sections" | "title"));
            if let Some(extra) = beside {
                return Err(format!("`{extra}` must be inside `sections`, not beside it"));
            }
            (inner, false)
        }
        _ => (body, true),
    };
    let sections = source
        .iter()
        .filter(|(key, _)| !(top_level && key.as_str() == "title"))
        .map(|(key, value)| parse_section(key, value, true))
        .collect::<Result<Vec<_>, String>>()?;

    if sections.is_empty() {
        return Err("expected at least one section".into());
    }
    Ok(Summary::Flexible(FlexibleSummary { title, sections }))
}

fn parse_section(
    name: &str,
    value: &Value,
    allow_nesting: bool,
) -> Result<FlexibleSection, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("section names must not be blank".into());
    }
    let content = match value {
        Value::String(text) => SectionContent::Text(required_text(name, text)?),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text.clone()),
                    other => Err(format!(
                        "section `{name}` lists must hold strings, found {}",
                        json_type(other)
                    )),
                })
                .collect::<Result<Vec<_>, String>>()?;
            SectionContent::List(bounded_list(name, items, 1, usize::MAX)?)
        }
        Value::Object(children) if allow_nesting => {
            let nested = children
                .iter()
                .map(|(key, child)| parse_section(key, child, false))
                .collect::<Result<Vec<_>, String>>()?;
            if nested.is_empty() {
                return Err(format!("section `{name}` has no subsections"));
            }
            SectionContent::Nested(nested)
        }
        other => {
            return Err(format!(
                "section `{name}` must be text, a list, or subsections, found {}",
                json_type(other)
            ));
        }
    };
    Ok(FlexibleSection {
        name: name.to_string(),
        content,
    })
}

/// Return the object itself, or the inner object of a `{ "summary": { .. } }` wrapper.
fn unwrap_summary_object(payload: &Value) -> Option<&Map<String, Value>> {
    let map = payload.as_object()?;
    match map.get("summary") {
        Some(Value::Object(inner)) if map.len() == 1 => Some(inner),
        _ => Some(map),
    }
}

fn required_text(field: &str, value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("`{field}` must not be blank"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn bounded_list(
    field: &str,
    items: Vec<String>,
    min: usize,
    max: usize,
) -> Result<Vec<String>, String> {
    let cleaned: Vec<String> = items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    if cleaned.len() < min {
        return Err(format!("`{field}` needs at least {min} non-blank entries"));
    }
    if cleaned.len() > max {
        return Err(format!("`{field}` allows at most {max} entries"));
    }
    Ok(cleaned)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
