// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage harness.
//!
//! `TestHarness` opens a migrated database in a temp directory that lives as
//! long as the harness.

use std::sync::Arc;

use mnema_config::model::StorageConfig;
use mnema_core::{MemoryStorage, MnemaError};
use mnema_storage::SqliteStorage;
use tempfile::TempDir;

pub struct TestHarness {
    // Dropped last so the database file outlives the connection.
    storage: Arc<SqliteStorage>,
    temp_dir: TempDir,
}

impl TestHarness {
    /// Create a fresh database with every migration applied.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory or database cannot be created.
    pub async fn new() -> Self {
        match Self::build().await {
            Ok(harness) => harness,
            Err(e) => panic!("failed to build test harness: {e}"),
        }
    }

    pub async fn build() -> Result<Self, MnemaError> {
        let temp_dir = TempDir::new().map_err(MnemaError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await?;
        Ok(Self {
            storage: Arc::new(storage),
            temp_dir,
        })
    }

    /// The storage behind its trait.
    pub fn storage(&self) -> Arc<dyn MemoryStorage> {
        self.storage.clone()
    }

    /// The concrete SQLite storage.
    pub fn sqlite(&self) -> Arc<SqliteStorage> {
        self.storage.clone()
    }

    /// Path of the temp directory holding the database.
    pub fn dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}
