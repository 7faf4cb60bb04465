// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Defensive parsing of model extraction output.
//!
//! Models wrap JSON in prose, code fences or both. Parsing runs an ordered
//! list of attempts (whole response, first fenced block, outermost brace
//! span) and the first one that decodes into the extraction schema wins.

use mnema_core::{EntryType, MnemaError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Confidence assigned when the model omits one.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// A memory entry proposed by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntry {
    pub entry_type: EntryType,
    pub content: String,
    pub confidence: f64,
    pub tags: Vec<String>,
}

/// A graph entity proposed by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
}

/// A graph edge proposed by the model, with endpoints by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRelationship {
    pub source: String,
    pub relation: String,
    pub target: String,
    pub confidence: f64,
}

/// Normalized result of one extraction call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entries: Vec<ExtractedEntry>,
    pub profile_facts: Vec<String>,
    pub summary: Option<String>,
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.profile_facts.is_empty()
            && self.summary.is_none()
            && self.entities.is_empty()
            && self.relationships.is_empty()
    }
}

// --- wire shapes (lenient) ---

/// A JSON `null` decodes to the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtraction {
    #[serde(deserialize_with = "null_as_default")]
    entries: Vec<RawEntry>,
    #[serde(deserialize_with = "null_as_default")]
    profile_facts: Vec<Option<RawFact>>,
    summary: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    entities: Vec<RawEntity>,
    #[serde(deserialize_with = "null_as_default")]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntry {
    #[serde(
        rename = "type",
        alias = "entry_type",
        deserialize_with = "null_as_default"
    )]
    entry_type: String,
    #[serde(deserialize_with = "null_as_default")]
    content: String,
    confidence: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    tags: Vec<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFact {
    Text(String),
    Object { content: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEntity {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "type", alias = "entity_type")]
    entity_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRelationship {
    #[serde(deserialize_with = "null_as_default")]
    source: String,
    #[serde(deserialize_with = "null_as_default")]
    relation: String,
    #[serde(deserialize_with = "null_as_default")]
    target: String,
    confidence: Option<f64>,
}

fn clamp_confidence(value: Option<f64>) -> f64 {
    match value {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl From<RawExtraction> for Extraction {
    fn from(raw: RawExtraction) -> Self {
        let entries = raw
            .entries
            .into_iter()
            .filter_map(|e| {
                Some(ExtractedEntry {
                    content: non_empty(&e.content)?,
                    entry_type: EntryType::parse_lenient(&e.entry_type),
                    confidence: clamp_confidence(e.confidence),
                    tags: e.tags.iter().flatten().filter_map(|t| non_empty(t)).collect(),
                })
            })
            .collect();

        let profile_facts = raw
            .profile_facts
            .into_iter()
            .flatten()
            .filter_map(|f| match f {
                RawFact::Text(text) | RawFact::Object { content: text } => non_empty(&text),
            })
            .collect();

        let entities = raw
            .entities
            .into_iter()
            .filter_map(|e| {
                Some(ExtractedEntity {
                    name: non_empty(&e.name)?,
                    entity_type: e
                        .entity_type
                        .as_deref()
                        .and_then(non_empty)
                        .unwrap_or_else(|| crate::graph::UNKNOWN_ENTITY_TYPE.to_string()),
                })
            })
            .collect();

        let relationships = raw
            .relationships
            .into_iter()
            .filter_map(|r| {
                Some(ExtractedRelationship {
                    source: non_empty(&r.source)?,
                    relation: non_empty(&r.relation)?,
                    target: non_empty(&r.target)?,
                    confidence: clamp_confidence(r.confidence),
                })
            })
            .collect();

        Extraction {
            entries,
            profile_facts,
            summary: raw.summary.as_deref().and_then(non_empty),
            entities,
            relationships,
        }
    }
}

// --- attempts ---

type Attempt = fn(&str) -> Result<Extraction, MnemaError>;

/// Parse strategies in the order they are tried.
const ATTEMPTS: [(&str, Attempt); 3] = [
    ("direct", parse_direct),
    ("fenced_block", parse_fenced_block),
    ("brace_span", parse_brace_span),
];

/// Decode `candidate` into the extraction schema. The top level must be an
/// object; missing sections default to empty.
fn decode(candidate: &str) -> Result<Extraction, MnemaError> {
    let value: Value =
        serde_json::from_str(candidate.trim()).map_err(|e| MnemaError::Parse(e.to_string()))?;
    if !value.is_object() {
        return Err(MnemaError::Parse("top-level JSON is not an object".to_string()));
    }
    let raw: RawExtraction =
        serde_json::from_value(value).map_err(|e| MnemaError::Parse(e.to_string()))?;
    Ok(raw.into())
}

fn parse_direct(response: &str) -> Result<Extraction, MnemaError> {
    decode(response)
}

fn parse_fenced_block(response: &str) -> Result<Extraction, MnemaError> {
    decode(fenced_block(response)?)
}

fn parse_brace_span(response: &str) -> Result<Extraction, MnemaError> {
    decode(brace_span(response)?)
}

/// Contents of the first ```-fenced block, without its info string.
fn fenced_block(text: &str) -> Result<&str, MnemaError> {
    let open = text
        .find("```")
        .ok_or_else(|| MnemaError::Parse("no code fence".to_string()))?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
    let body = &after_fence[body_start..];
    let close = body
        .find("```")
        .ok_or_else(|| MnemaError::Parse("unterminated code fence".to_string()))?;
    Ok(&body[..close])
}

/// Substring from the first `{` to the last `}` inclusive.
fn brace_span(text: &str) -> Result<&str, MnemaError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(MnemaError::Parse("no brace-delimited span".to_string())),
    }
}

/// Run every attempt in order; the first success wins.
///
/// Fails with [`MnemaError::Parse`] carrying the last attempt's error when no
/// strategy produced schema-matching JSON.
pub fn parse_extraction(response: &str) -> Result<Extraction, MnemaError> {
    let mut last_error = MnemaError::Parse("empty response".to_string());
    for (name, attempt) in ATTEMPTS {
        match attempt(response) {
            Ok(extraction) => {
                debug!(strategy = name, "extraction response parsed");
                return Ok(extraction);
            }
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "entries": [
            {"type": "preference", "content": "User prefers light mode", "confidence": 0.9, "tags": ["ui"]},
            {"type": "Decision", "content": "Chose Postgres", "tags": []}
        ],
        "profile_facts": ["Lives in Lisbon"],
        "summary": "Talked about editor themes.",
        "entities": [{"name": "Lisbon", "type": "place"}],
        "relationships": [{"source": "User", "relation": "lives_in", "target": "Lisbon", "confidence": 0.95}]
    }"#;

    fn expected() -> Extraction {
        decode(BODY).unwrap()
    }

    #[test]
    fn raw_object_decodes() {
        let parsed = parse_extraction(BODY).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].entry_type, EntryType::Preference);
        assert_eq!(parsed.entries[1].entry_type, EntryType::Decision);
        assert_eq!(parsed.entries[1].confidence, DEFAULT_CONFIDENCE);
        assert_eq!(parsed.profile_facts, vec!["Lives in Lisbon".to_string()]);
        assert_eq!(parsed.summary.as_deref(), Some("Talked about editor themes."));
        assert_eq!(parsed.relationships[0].relation, "lives_in");
    }

    #[test]
    fn fenced_raw_and_prose_wrapped_agree() {
        let fenced = format!("```json\n{BODY}\n```");
        let prose = format!("Here is what I found:\n{BODY}\nLet me know if you need more.");
        let prose_and_fence = format!("Sure!\n```\n{BODY}\n```\nDone.");

        assert_eq!(parse_extraction(&fenced).unwrap(), expected());
        assert_eq!(parse_extraction(&prose).unwrap(), expected());
        assert_eq!(parse_extraction(&prose_and_fence).unwrap(), expected());
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let err = parse_extraction("I could not find anything to remember.").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn array_top_level_is_rejected() {
        assert!(parse_extraction(r#"[{"content": "x"}]"#).is_err());
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let parsed = parse_extraction(r#"{"summary": "  "}"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn lenient_normalization() {
        let parsed = parse_extraction(
            r#"{
                "entries": [
                    {"type": "mystery", "content": "Unknown kind", "confidence": 7},
                    {"type": "fact", "content": "   "}
                ],
                "profile_facts": [{"content": "Has a cat"}, ""],
                "entities": [{"name": "Acme"}]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].entry_type, EntryType::Fact);
        assert_eq!(parsed.entries[0].confidence, 1.0);
        assert_eq!(parsed.profile_facts, vec!["Has a cat".to_string()]);
        assert_eq!(parsed.entities[0].entity_type, "unknown");
    }

    #[test]
    fn null_fields_decode_as_empty() {
        let parsed = parse_extraction(
            r#"{
                "entries": [
                    {"type": "fact", "content": "User lives in Lisbon", "tags": null},
                    {"type": null, "content": "User owns a bike", "tags": ["sport", null]},
                    {"type": "fact", "content": null}
                ],
                "profile_facts": ["Lives in Lisbon", null],
                "entities": null,
                "relationships": [{"source": "User", "relation": null, "target": "Bike"}]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert!(parsed.entries[0].tags.is_empty());
        assert_eq!(parsed.entries[1].entry_type, EntryType::Fact);
        assert_eq!(parsed.entries[1].tags, vec!["sport".to_string()]);
        assert_eq!(parsed.profile_facts, vec!["Lives in Lisbon".to_string()]);
        assert!(parsed.entities.is_empty());
        assert!(parsed.relationships.is_empty());
    }

    #[test]
    fn null_sections_are_empty_not_a_failure() {
        let parsed = parse_extraction(
            r#"{"entries": null, "profile_facts": null, "summary": null, "relationships": null}"#,
        )
        .unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn fenced_block_skips_info_string() {
        assert_eq!(fenced_block("x ```json\n{}\n``` y").unwrap(), "{}\n");
        assert!(fenced_block("```json\n{}").is_err());
    }
}
