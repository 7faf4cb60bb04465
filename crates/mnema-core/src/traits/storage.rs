// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable repository trait for every memory entity.

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::types::{
    ConversationChunk, ConversationSummary, GraphEdge, GraphEntity, MemoryEntry, NewProfileEvent,
    NewRelationship, NewSignal, NewSummary, PendingSignal, ProcessingLog, ProfileEvent,
    UserProfile,
};

/// Durable storage for entries, signals, profile state, summaries, chunks,
/// the knowledge graph, and the processing audit trail.
///
/// This is the source of truth: search indexes are derived from it. Each call
/// is independent and may fail on its own; callers decide whether a failure
/// aborts their batch.
#[async_trait]
pub trait MemoryStorage: Send + Sync + 'static {
    // --- entries ---

    /// Inserts a new entry.
    async fn insert_entry(&self, entry: &MemoryEntry) -> Result<(), MnemaError>;

    /// Fetches one entry (active or not).
    async fn get_entry(&self, id: &str) -> Result<Option<MemoryEntry>, MnemaError>;

    /// Active entries of one agent, newest first, optionally capped.
    async fn load_active_entries(
        &self,
        agent_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEntry>, MnemaError>;

    /// Active entries of every agent (used to rebuild the search index).
    async fn load_all_active_entries(&self) -> Result<Vec<MemoryEntry>, MnemaError>;

    /// Active entries with the given ids, in no particular order.
    async fn get_entries_by_ids(&self, ids: &[String]) -> Result<Vec<MemoryEntry>, MnemaError>;

    /// Marks `old_id` as superseded by `new_id`, recording why.
    async fn supersede_entry(
        &self,
        old_id: &str,
        new_id: &str,
        reason: &str,
    ) -> Result<(), MnemaError>;

    /// Bumps recency metadata on entries that were injected into a prompt.
    async fn touch_entries(&self, ids: &[String]) -> Result<(), MnemaError>;

    /// Plain substring search over active entries.
    async fn search_entries_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MnemaError>;

    // --- signals ---

    /// Persists one pending signal and returns its id.
    async fn insert_signal(&self, signal: &NewSignal) -> Result<i64, MnemaError>;

    /// Unprocessed signals of one agent, oldest first.
    async fn load_pending_signals(&self, agent_id: &str) -> Result<Vec<PendingSignal>, MnemaError>;

    /// Flags signals as consumed by a batched run.
    async fn mark_signals_processed(&self, ids: &[i64]) -> Result<(), MnemaError>;

    /// `(agent_id, pending count)` for every agent with unprocessed signals.
    async fn pending_signal_counts(&self) -> Result<Vec<(String, usize)>, MnemaError>;

    // --- profile ---

    /// Persists one profile event and returns its id.
    async fn insert_profile_event(&self, event: &NewProfileEvent) -> Result<i64, MnemaError>;

    /// Contributions not yet folded into any profile version, oldest first.
    async fn load_unincorporated_contributions(&self) -> Result<Vec<ProfileEvent>, MnemaError>;

    /// Number of contributions not yet folded into any profile version.
    async fn count_unincorporated_contributions(&self) -> Result<usize, MnemaError>;

    /// Every user-edit event, oldest first.
    async fn load_user_edits(&self) -> Result<Vec<ProfileEvent>, MnemaError>;

    /// Stamps events with the profile version that incorporated them.
    async fn mark_incorporated(&self, ids: &[i64], version: i64) -> Result<(), MnemaError>;

    /// The profile with the highest version, if any exists.
    async fn load_current_profile(&self) -> Result<Option<UserProfile>, MnemaError>;

    /// Stores a new profile version.
    async fn save_profile(&self, profile: &UserProfile) -> Result<(), MnemaError>;

    // --- summaries ---

    /// Persists a conversation summary.
    async fn insert_summary(&self, summary: &NewSummary)
    -> Result<ConversationSummary, MnemaError>;

    /// Summaries of one agent created at or after `since`, newest first.
    async fn load_summaries_since(
        &self,
        agent_id: &str,
        since: &str,
    ) -> Result<Vec<ConversationSummary>, MnemaError>;

    /// Summaries by their search index ids.
    async fn get_summaries_by_index_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<ConversationSummary>, MnemaError>;

    /// Plain substring search over summaries.
    async fn search_summaries_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, MnemaError>;

    // --- chunks ---

    /// Inserts or replaces the chunk keyed by `(conversation_id, chunk_index)`.
    async fn upsert_chunk(&self, chunk: &ConversationChunk) -> Result<(), MnemaError>;

    /// Chunks by their search index ids.
    async fn get_chunks_by_index_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<ConversationChunk>, MnemaError>;

    /// Plain substring search over chunks.
    async fn search_chunks_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationChunk>, MnemaError>;

    // --- graph ---

    /// Looks an entity up by case-insensitive name.
    async fn find_entity(&self, name: &str) -> Result<Option<GraphEntity>, MnemaError>;

    /// Creates an entity, or returns the existing one with the same name.
    async fn insert_entity(&self, name: &str, entity_type: &str)
    -> Result<GraphEntity, MnemaError>;

    /// Inserts a relationship edge and returns its id.
    async fn insert_relationship(&self, relationship: &NewRelationship)
    -> Result<i64, MnemaError>;

    /// Most recent edges, newest first.
    async fn load_recent_edges(&self, limit: usize) -> Result<Vec<GraphEdge>, MnemaError>;

    /// Edges with either endpoint in `entity_ids`.
    async fn load_edges_for_entities(
        &self,
        entity_ids: &[i64],
    ) -> Result<Vec<GraphEdge>, MnemaError>;

    /// Edges with the given relation label (case-insensitive), newest first.
    async fn load_edges_by_relation(
        &self,
        relation: &str,
        limit: usize,
    ) -> Result<Vec<GraphEdge>, MnemaError>;

    // --- audit ---

    /// Appends a processing log row.
    async fn append_processing_log(&self, log: &ProcessingLog) -> Result<(), MnemaError>;
}
