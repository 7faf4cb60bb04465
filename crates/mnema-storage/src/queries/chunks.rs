// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw conversation chunk storage.

use mnema_core::MnemaError;
use mnema_core::types::ConversationChunk;
use rusqlite::params;

use crate::database::{Database, like_pattern, map_tr_err, placeholders};

const CHUNK_COLUMNS: &str =
    "agent_id, conversation_id, chunk_index, role, content, index_id, created_at";

/// Insert or replace the chunk keyed by `(conversation_id, chunk_index)`.
pub async fn upsert_chunk(db: &Database, chunk: &ConversationChunk) -> Result<(), MnemaError> {
    let chunk = chunk.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO conversation_chunks
                     (agent_id, conversation_id, chunk_index, role, content, index_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(conversation_id, chunk_index) DO UPDATE SET
                     agent_id = excluded.agent_id,
                     role = excluded.role,
                     content = excluded.content,
                     index_id = excluded.index_id",
                params![
                    chunk.agent_id,
                    chunk.conversation_id,
                    chunk.chunk_index,
                    chunk.role,
                    chunk.content,
                    chunk.index_id,
                    chunk.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Chunks whose derived index id is in `ids`.
pub async fn get_chunks_by_index_ids(
    db: &Database,
    ids: &[String],
) -> Result<Vec<ConversationChunk>, MnemaError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationChunk>, rusqlite::Error> {
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM conversation_chunks WHERE index_id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), row_to_chunk)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Substring search over chunk content, newest first.
pub async fn search_chunks_text(
    db: &Database,
    query: &str,
    agent_id: Option<&str>,
    limit: usize,
) -> Result<Vec<ConversationChunk>, MnemaError> {
    let pattern = like_pattern(query);
    let agent_id = agent_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationChunk>, rusqlite::Error> {
            let sql = format!(
                "SELECT {CHUNK_COLUMNS} FROM conversation_chunks
                 WHERE content LIKE ?1 ESCAPE '\\' AND (?2 IS NULL OR agent_id = ?2)
                 ORDER BY created_at DESC, chunk_index DESC LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![pattern, agent_id, limit as i64], row_to_chunk)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> Result<ConversationChunk, rusqlite::Error> {
    Ok(ConversationChunk {
        agent_id: row.get(0)?,
        conversation_id: row.get(1)?,
        chunk_index: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        index_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}
