// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FTS5-backed lexical search index.
//!
//! Documents live in an FTS5 virtual table keyed by an unindexed `doc_id`
//! column. Ranking uses `bm25()`; FTS5 reports more relevant rows as more
//! negative, so scores are negated so that higher is better.

use async_trait::async_trait;
use tokio_rusqlite::Connection;
use tracing::debug;

use mnema_core::types::SearchHit;
use mnema_core::{MnemaError, VectorIndex};

use crate::database::{Database, map_tr_err};

/// Lexical [`VectorIndex`] over an SQLite FTS5 table.
pub struct Fts5Index {
    conn: Connection,
}

impl Fts5Index {
    /// Index stored in its own database file.
    pub async fn open(path: &str) -> Result<Self, MnemaError> {
        let conn = Connection::open(path).await.map_err(MnemaError::storage)?;
        Ok(Self { conn })
    }

    /// Index stored in a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, MnemaError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(MnemaError::storage)?;
        Ok(Self { conn })
    }

    /// Index sharing the storage database (and its writer thread).
    pub fn with_database(db: &Database) -> Self {
        Self {
            conn: db.connection().clone(),
        }
    }

    async fn upsert(&self, docs: Vec<(String, String)>) -> Result<(), MnemaError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                {
                    let mut delete = tx.prepare("DELETE FROM search_documents WHERE doc_id = ?1")?;
                    let mut insert =
                        tx.prepare("INSERT INTO search_documents (doc_id, body) VALUES (?1, ?2)")?;
                    for (id, text) in &docs {
                        delete.execute([id])?;
                        insert.execute([id, text])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(index_err)
    }
}

#[async_trait]
impl VectorIndex for Fts5Index {
    async fn initialize(&self) -> Result<(), MnemaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS search_documents
                     USING fts5(doc_id UNINDEXED, body, tokenize = 'unicode61');",
                )
            })
            .await
            .map_err(index_err)?;
        debug!("fts5 search index ready");
        Ok(())
    }

    async fn add_document(&self, text: &str, id: &str) -> Result<(), MnemaError> {
        self.upsert(vec![(id.to_string(), text.to_string())]).await
    }

    async fn add_documents(&self, texts: &[String], ids: &[String]) -> Result<(), MnemaError> {
        if texts.len() != ids.len() {
            return Err(MnemaError::search_index(format!(
                "add_documents: {} texts for {} ids",
                texts.len(),
                ids.len()
            )));
        }
        let docs = ids.iter().cloned().zip(texts.iter().cloned()).collect();
        self.upsert(docs).await
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MnemaError> {
        let Some(expression) = match_expression(query) else {
            return Ok(vec![]);
        };
        let hits = self
            .conn
            .call(move |conn| -> Result<Vec<SearchHit>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT doc_id, body, bm25(search_documents) FROM search_documents
                     WHERE search_documents MATCH ?1
                     ORDER BY bm25(search_documents) LIMIT ?2",
                )?;
                let hits = stmt
                    .query_map(rusqlite::params![expression, k as i64], |row| {
                        let rank: f64 = row.get(2)?;
                        Ok(SearchHit {
                            id: row.get(0)?,
                            text: row.get(1)?,
                            score: -rank as f32,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(hits)
            })
            .await
            .map_err(index_err)?;
        Ok(hits.into_iter().filter(|h| h.score >= threshold).collect())
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), MnemaError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare("DELETE FROM search_documents WHERE doc_id = ?1")?;
                    for id in &ids {
                        stmt.execute([id])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(index_err)
    }

    async fn reset(&self) -> Result<(), MnemaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM search_documents", [])?;
                Ok(())
            })
            .await
            .map_err(index_err)
    }
}

/// Turn free text into an FTS5 expression of quoted, OR-joined terms so that
/// user input can never be parsed as FTS5 syntax.
fn match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}

fn index_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MnemaError {
    let storage = map_tr_err(e);
    MnemaError::SearchIndex {
        message: storage.to_string(),
        source: Some(Box::new(storage)),
    }
}
