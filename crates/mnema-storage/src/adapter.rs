// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the MemoryStorage trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use mnema_config::model::StorageConfig;
use mnema_core::types::{
    ConversationChunk, ConversationSummary, GraphEdge, GraphEntity, MemoryEntry, NewProfileEvent,
    NewRelationship, NewSignal, NewSummary, PendingSignal, ProcessingLog, ProfileEvent,
    UserProfile,
};
use mnema_core::{MemoryStorage, MnemaError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed memory storage.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](Self::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: String::new(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the database file and apply migrations.
    pub async fn initialize(&self) -> Result<(), MnemaError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| MnemaError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoint the WAL before the process exits.
    pub async fn close(&self) -> Result<(), MnemaError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// The underlying database handle.
    pub fn database(&self) -> Result<&Database, MnemaError> {
        self.db()
    }

    fn db(&self) -> Result<&Database, MnemaError> {
        self.db.get().ok_or_else(|| MnemaError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl MemoryStorage for SqliteStorage {
    // --- entries ---

    async fn insert_entry(&self, entry: &MemoryEntry) -> Result<(), MnemaError> {
        queries::entries::insert_entry(self.db()?, entry).await
    }

    async fn get_entry(&self, id: &str) -> Result<Option<MemoryEntry>, MnemaError> {
        queries::entries::get_entry(self.db()?, id).await
    }

    async fn load_active_entries(
        &self,
        agent_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MemoryEntry>, MnemaError> {
        queries::entries::load_active_entries(self.db()?, agent_id, limit).await
    }

    async fn load_all_active_entries(&self) -> Result<Vec<MemoryEntry>, MnemaError> {
        queries::entries::load_all_active_entries(self.db()?).await
    }

    async fn get_entries_by_ids(&self, ids: &[String]) -> Result<Vec<MemoryEntry>, MnemaError> {
        queries::entries::get_entries_by_ids(self.db()?, ids).await
    }

    async fn supersede_entry(
        &self,
        old_id: &str,
        new_id: &str,
        reason: &str,
    ) -> Result<(), MnemaError> {
        queries::entries::supersede_entry(self.db()?, old_id, new_id, reason).await
    }

    async fn touch_entries(&self, ids: &[String]) -> Result<(), MnemaError> {
        queries::entries::touch_entries(self.db()?, ids).await
    }

    async fn search_entries_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, MnemaError> {
        queries::entries::search_entries_text(self.db()?, query, agent_id, limit).await
    }

    // --- signals ---

    async fn insert_signal(&self, signal: &NewSignal) -> Result<i64, MnemaError> {
        queries::signals::insert_signal(self.db()?, signal).await
    }

    async fn load_pending_signals(&self, agent_id: &str) -> Result<Vec<PendingSignal>, MnemaError> {
        queries::signals::load_pending_signals(self.db()?, agent_id).await
    }

    async fn mark_signals_processed(&self, ids: &[i64]) -> Result<(), MnemaError> {
        queries::signals::mark_signals_processed(self.db()?, ids).await
    }

    async fn pending_signal_counts(&self) -> Result<Vec<(String, usize)>, MnemaError> {
        queries::signals::pending_signal_counts(self.db()?).await
    }

    // --- profile ---

    async fn insert_profile_event(&self, event: &NewProfileEvent) -> Result<i64, MnemaError> {
        queries::profile::insert_profile_event(self.db()?, event).await
    }

    async fn load_unincorporated_contributions(&self) -> Result<Vec<ProfileEvent>, MnemaError> {
        queries::profile::load_unincorporated_contributions(self.db()?).await
    }

    async fn count_unincorporated_contributions(&self) -> Result<usize, MnemaError> {
        queries::profile::count_unincorporated_contributions(self.db()?).await
    }

    async fn load_user_edits(&self) -> Result<Vec<ProfileEvent>, MnemaError> {
        queries::profile::load_user_edits(self.db()?).await
    }

    async fn mark_incorporated(&self, ids: &[i64], version: i64) -> Result<(), MnemaError> {
        queries::profile::mark_incorporated(self.db()?, ids, version).await
    }

    async fn load_current_profile(&self) -> Result<Option<UserProfile>, MnemaError> {
        queries::profile::load_current_profile(self.db()?).await
    }

    async fn save_profile(&self, profile: &UserProfile) -> Result<(), MnemaError> {
        queries::profile::save_profile(self.db()?, profile).await
    }

    // --- summaries ---

    async fn insert_summary(
        &self,
        summary: &NewSummary,
    ) -> Result<ConversationSummary, MnemaError> {
        queries::summaries::insert_summary(self.db()?, summary).await
    }

    async fn load_summaries_since(
        &self,
        agent_id: &str,
        since: &str,
    ) -> Result<Vec<ConversationSummary>, MnemaError> {
        queries::summaries::load_summaries_since(self.db()?, agent_id, since).await
    }

    async fn get_summaries_by_index_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<ConversationSummary>, MnemaError> {
        queries::summaries::get_summaries_by_index_ids(self.db()?, ids).await
    }

    async fn search_summaries_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, MnemaError> {
        queries::summaries::search_summaries_text(self.db()?, query, agent_id, limit).await
    }

    // --- chunks ---

    async fn upsert_chunk(&self, chunk: &ConversationChunk) -> Result<(), MnemaError> {
        queries::chunks::upsert_chunk(self.db()?, chunk).await
    }

    async fn get_chunks_by_index_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<ConversationChunk>, MnemaError> {
        queries::chunks::get_chunks_by_index_ids(self.db()?, ids).await
    }

    async fn search_chunks_text(
        &self,
        query: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ConversationChunk>, MnemaError> {
        queries::chunks::search_chunks_text(self.db()?, query, agent_id, limit).await
    }

    // --- graph ---

    async fn find_entity(&self, name: &str) -> Result<Option<GraphEntity>, MnemaError> {
        queries::graph::find_entity(self.db()?, name).await
    }

    async fn insert_entity(
        &self,
        name: &str,
        entity_type: &str,
    ) -> Result<GraphEntity, MnemaError> {
        queries::graph::insert_entity(self.db()?, name, entity_type).await
    }

    async fn insert_relationship(
        &self,
        relationship: &NewRelationship,
    ) -> Result<i64, MnemaError> {
        queries::graph::insert_relationship(self.db()?, relationship).await
    }

    async fn load_recent_edges(&self, limit: usize) -> Result<Vec<GraphEdge>, MnemaError> {
        queries::graph::load_recent_edges(self.db()?, limit).await
    }

    async fn load_edges_for_entities(
        &self,
        entity_ids: &[i64],
    ) -> Result<Vec<GraphEdge>, MnemaError> {
        queries::graph::load_edges_for_entities(self.db()?, entity_ids).await
    }

    async fn load_edges_by_relation(
        &self,
        relation: &str,
        limit: usize,
    ) -> Result<Vec<GraphEdge>, MnemaError> {
        queries::graph::load_edges_by_relation(self.db()?, relation, limit).await
    }

    // --- audit ---

    async fn append_processing_log(&self, log: &ProcessingLog) -> Result<(), MnemaError> {
        queries::logs::append_processing_log(self.db()?, log).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_core::types::EntryType;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn calls_fail_before_initialize() {
        let storage = SqliteStorage::new(make_config("/nonexistent/never.db"));
        let err = storage.load_active_entries("a", None).await.unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[tokio::test]
    async fn entries_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let path = db_path.to_str().unwrap();

        let storage = SqliteStorage::new(make_config(path));
        storage.initialize().await.unwrap();
        storage
            .insert_entry(&MemoryEntry {
                id: "e1".to_string(),
                agent_id: "agent-a".to_string(),
                entry_type: EntryType::Decision,
                content: "Chose Postgres for the backend".to_string(),
                confidence: 0.7,
                source_conversation_id: None,
                tags: vec![],
                model: "m".to_string(),
                superseded_by: None,
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
                last_accessed_at: None,
                access_count: 0,
            })
            .await
            .unwrap();
        storage.close().await.unwrap();
        drop(storage);

        let reopened = SqliteStorage::new(make_config(path));
        reopened.initialize().await.unwrap();
        let active = reopened.load_active_entries("agent-a", None).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].entry_type, EntryType::Decision);
    }
}
