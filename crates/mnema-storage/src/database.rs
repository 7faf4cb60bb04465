// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use mnema_core::MnemaError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to one SQLite database with the memory schema applied.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, MnemaError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(MnemaError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(MnemaError::storage)?;
        let db = Self { conn };
        db.configure(wal_mode).await?;
        db.migrate().await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, MnemaError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(MnemaError::storage)?;
        let db = Self { conn };
        db.configure(false).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// The underlying connection. Every query goes through `call`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), MnemaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn configure(&self, wal_mode: bool) -> Result<(), MnemaError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn migrate(&self) -> Result<(), MnemaError> {
        self.conn
            .call(|conn| -> Result<(), MnemaError> { migrations::run_migrations(conn) })
            .await
            .map_err(MnemaError::storage)
    }
}

/// Convert a tokio-rusqlite error into `MnemaError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MnemaError {
    MnemaError::Storage {
        source: Box::new(e),
    }
}

/// Extension trait for optional row queries.
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Build `?1, ?2, ...` placeholders for an `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Escape `%`, `_` and the escape char itself for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
