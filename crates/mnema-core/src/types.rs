// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the memory subsystem and its collaborators.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Agent id used for records that belong to no particular agent (profile edits,
/// regenerations).
pub const SYSTEM_AGENT_ID: &str = "system";

/// Rough heuristic used everywhere a token count is needed: 4 chars per token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text with the 4-chars-per-token heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Current UTC time as an ISO 8601 string with millisecond precision.
///
/// The format sorts lexicographically in chronological order, which the
/// storage layer relies on for recency ordering.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

// --- Memory entries ---

/// Kind of a discrete memory entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Fact,
    Preference,
    Decision,
    Correction,
    Commitment,
    Relationship,
    Skill,
}

impl EntryType {
    /// Parse a model-supplied type name, falling back to [`EntryType::Fact`].
    pub fn parse_lenient(value: &str) -> Self {
        value.trim().parse().unwrap_or(EntryType::Fact)
    }
}

/// A single extracted memory entry belonging to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub agent_id: String,
    pub entry_type: EntryType,
    pub content: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub source_conversation_id: Option<String>,
    pub tags: Vec<String>,
    /// Model that produced this entry.
    pub model: String,
    /// Id of the entry that replaced this one. Non-null means inactive.
    pub superseded_by: Option<String>,
    pub created_at: String,
    pub last_accessed_at: Option<String>,
    pub access_count: i64,
}

impl MemoryEntry {
    /// An entry is active until something supersedes it.
    pub fn is_active(&self) -> bool {
        self.superseded_by.is_none()
    }
}

// --- Signals ---

/// A detected trigger in a conversation turn that warrants extraction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// The user explicitly asked to remember something.
    Explicit,
    Preference,
    Decision,
    Correction,
    Commitment,
    Fact,
    Relationship,
}

/// A signal to be persisted by the ingestor.
#[derive(Debug, Clone)]
pub struct NewSignal {
    pub agent_id: String,
    pub conversation_id: String,
    pub signal_type: SignalType,
    pub user_message: String,
    pub assistant_message: Option<String>,
}

/// A persisted extraction trigger awaiting the batched path.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSignal {
    pub id: i64,
    pub agent_id: String,
    pub conversation_id: String,
    pub signal_type: SignalType,
    pub user_message: String,
    pub assistant_message: Option<String>,
    pub processed: bool,
    pub created_at: String,
}

// --- Profile ---

/// Kind of a profile event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProfileEventKind {
    /// A durable fact destined for the profile.
    Contribution,
    /// An explicit user override; never superseded or dropped.
    UserEdit,
    /// Audit record of a regeneration run.
    Regeneration,
}

/// A profile event to be persisted.
#[derive(Debug, Clone)]
pub struct NewProfileEvent {
    pub agent_id: String,
    pub kind: ProfileEventKind,
    pub content: String,
    pub model: Option<String>,
    pub incorporated_in: Option<i64>,
}

/// A persisted profile event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEvent {
    pub id: i64,
    pub agent_id: String,
    pub kind: ProfileEventKind,
    pub content: String,
    pub model: Option<String>,
    /// Profile version this event was folded into, if any.
    pub incorporated_in: Option<i64>,
    pub created_at: String,
}

/// The versioned user profile shared across agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub content: String,
    pub token_count: usize,
    /// Starts at 1 and increases by exactly one per regeneration.
    pub version: i64,
    pub model: String,
    pub generated_at: String,
}

// --- Summaries and chunks ---

/// A summary to be persisted.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub agent_id: String,
    pub conversation_id: String,
    pub summary: String,
    pub model: String,
    /// Deterministic search index id for this summary.
    pub index_id: String,
    pub created_at: String,
}

/// A persisted conversation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub agent_id: String,
    pub conversation_id: String,
    pub summary: String,
    pub token_count: usize,
    pub model: String,
    pub index_id: String,
    pub created_at: String,
}

/// One indexed piece of a raw conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationChunk {
    pub agent_id: String,
    pub conversation_id: String,
    pub chunk_index: i64,
    pub role: String,
    pub content: String,
    /// Deterministic search index id for this chunk.
    pub index_id: String,
    pub created_at: String,
}

// --- Knowledge graph ---

/// A graph node, identified case-insensitively by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: i64,
    pub name: String,
    pub entity_type: String,
    pub created_at: String,
}

/// A relationship edge to be persisted.
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub source_id: i64,
    pub target_id: i64,
    pub relation: String,
    pub confidence: f64,
    pub model: Option<String>,
}

/// A relationship edge joined with the names of its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: i64,
    pub source_id: i64,
    pub source: String,
    pub target_id: i64,
    pub target: String,
    pub relation: String,
    pub confidence: f64,
    pub created_at: String,
}

// --- Processing ---

/// Per-agent batched extraction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Idle,
    Processing,
}

/// Which pipeline run produced a processing log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum TaskType {
    ImmediateExtraction,
    BatchExtraction,
    ProfileRegeneration,
}

/// Outcome recorded in a processing log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum LogStatus {
    Success,
    /// The model answered but nothing could be parsed.
    Empty,
    Failed,
}

/// Append-only audit row. Never read back by the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessingLog {
    pub agent_id: String,
    pub task_type: TaskType,
    pub status: LogStatus,
    pub model: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub detail: Option<String>,
}

// --- Model invocation ---

/// A single text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
}

// --- Search ---

/// A raw hit returned by a search backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub text: String,
}

// --- Observability ---

/// Structured events emitted by the pipeline to the injected observer.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// An extraction run finished and its results were applied.
    ExtractionCompleted {
        agent_id: String,
        task: TaskType,
        entries: usize,
        facts: usize,
        entities: usize,
        relationships: usize,
    },
    /// An extraction run was aborted before anything was applied.
    ExtractionFailed {
        agent_id: String,
        task: TaskType,
        error: String,
    },
    /// No parse strategy produced a usable result.
    ParseFailed { agent_id: String, task: TaskType },
    /// An older entry was superseded by a newer one.
    EntrySuperseded {
        agent_id: String,
        old_id: String,
        new_id: String,
        similarity: f64,
    },
    /// A profile fact was rejected as a near-duplicate.
    FactSkipped {
        agent_id: String,
        content: String,
        similarity: f64,
    },
    /// A new profile version was written.
    ProfileRegenerated { version: i64, contributions: usize },
    /// A batched trigger found the agent already processing.
    BatchSkipped { agent_id: String },
    /// A search index mutation failed and was skipped.
    IndexFailure { operation: String, error: String },
    /// A search fell back to plain text search over durable storage.
    SearchFallback { scope: String, reason: String },
    /// A single storage operation failed; the rest of the batch continued.
    StorageFailure { operation: String, error: String },
}

impl MemoryEvent {
    /// Stable event name for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            MemoryEvent::ExtractionCompleted { .. } => "extraction_completed",
            MemoryEvent::ExtractionFailed { .. } => "extraction_failed",
            MemoryEvent::ParseFailed { .. } => "parse_failed",
            MemoryEvent::EntrySuperseded { .. } => "entry_superseded",
            MemoryEvent::FactSkipped { .. } => "fact_skipped",
            MemoryEvent::ProfileRegenerated { .. } => "profile_regenerated",
            MemoryEvent::BatchSkipped { .. } => "batch_skipped",
            MemoryEvent::IndexFailure { .. } => "index_failure",
            MemoryEvent::SearchFallback { .. } => "search_fallback",
            MemoryEvent::StorageFailure { .. } => "storage_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_round_trips_through_strings() {
        for t in [
            EntryType::Fact,
            EntryType::Preference,
            EntryType::Decision,
            EntryType::Correction,
            EntryType::Commitment,
            EntryType::Relationship,
            EntryType::Skill,
        ] {
            assert_eq!(EntryType::parse_lenient(&t.to_string()), t);
        }
    }

    #[test]
    fn entry_type_lenient_parse() {
        assert_eq!(EntryType::parse_lenient("Preference"), EntryType::Preference);
        assert_eq!(EntryType::parse_lenient(" DECISION "), EntryType::Decision);
        assert_eq!(EntryType::parse_lenient("opinion"), EntryType::Fact);
        assert_eq!(EntryType::parse_lenient(""), EntryType::Fact);
    }

    #[test]
    fn profile_event_kind_strings() {
        assert_eq!(ProfileEventKind::UserEdit.to_string(), "user_edit");
        assert_eq!(
            "contribution".parse::<ProfileEventKind>().unwrap(),
            ProfileEventKind::Contribution
        );
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn superseded_entry_is_inactive() {
        let mut entry = MemoryEntry {
            id: "e1".into(),
            agent_id: "a".into(),
            entry_type: EntryType::Fact,
            content: "User lives in Berlin".into(),
            confidence: 0.9,
            source_conversation_id: None,
            tags: vec![],
            model: "m".into(),
            superseded_by: None,
            created_at: now_timestamp(),
            last_accessed_at: None,
            access_count: 0,
        };
        assert!(entry.is_active());
        entry.superseded_by = Some("e2".into());
        assert!(!entry.is_active());
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert!(a < b);
    }
}
