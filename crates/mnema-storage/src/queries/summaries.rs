// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation summary operations.

use mnema_core::MnemaError;
use mnema_core::types::{ConversationSummary, NewSummary, estimate_tokens};
use rusqlite::params;

use crate::database::{Database, like_pattern, map_tr_err, placeholders};

const SUMMARY_COLUMNS: &str =
    "id, agent_id, conversation_id, summary, token_count, model, index_id, created_at";

/// Persist a summary. Re-inserting the same index id replaces the text.
pub async fn insert_summary(
    db: &Database,
    summary: &NewSummary,
) -> Result<ConversationSummary, MnemaError> {
    let summary = summary.clone();
    db.connection()
        .call(move |conn| -> Result<ConversationSummary, rusqlite::Error> {
            let token_count = estimate_tokens(&summary.summary);
            conn.execute(
                "INSERT INTO conversation_summaries
                     (agent_id, conversation_id, summary, token_count, model, index_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(index_id) DO UPDATE SET
                     summary = excluded.summary,
                     token_count = excluded.token_count,
                     model = excluded.model",
                params![
                    summary.agent_id,
                    summary.conversation_id,
                    summary.summary,
                    token_count as i64,
                    summary.model,
                    summary.index_id,
                    summary.created_at,
                ],
            )?;
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM conversation_summaries WHERE index_id = ?1"
            );
            conn.query_row(&sql, params![summary.index_id], row_to_summary)
        })
        .await
        .map_err(map_tr_err)
}

/// Summaries of one agent created at or after `since`, newest first.
pub async fn load_summaries_since(
    db: &Database,
    agent_id: &str,
    since: &str,
) -> Result<Vec<ConversationSummary>, MnemaError> {
    let agent_id = agent_id.to_string();
    let since = since.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationSummary>, rusqlite::Error> {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM conversation_summaries
                 WHERE agent_id = ?1 AND created_at >= ?2
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![agent_id, since], row_to_summary)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Summaries whose derived index id is in `ids`.
pub async fn get_summaries_by_index_ids(
    db: &Database,
    ids: &[String],
) -> Result<Vec<ConversationSummary>, MnemaError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationSummary>, rusqlite::Error> {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM conversation_summaries WHERE index_id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), row_to_summary)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Substring search over summary text, newest first.
pub async fn search_summaries_text(
    db: &Database,
    query: &str,
    agent_id: Option<&str>,
    limit: usize,
) -> Result<Vec<ConversationSummary>, MnemaError> {
    let pattern = like_pattern(query);
    let agent_id = agent_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<ConversationSummary>, rusqlite::Error> {
            let sql = format!(
                "SELECT {SUMMARY_COLUMNS} FROM conversation_summaries
                 WHERE summary LIKE ?1 ESCAPE '\\' AND (?2 IS NULL OR agent_id = ?2)
                 ORDER BY created_at DESC, id DESC LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![pattern, agent_id, limit as i64], row_to_summary)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<ConversationSummary, rusqlite::Error> {
    let token_count: i64 = row.get(4)?;
    Ok(ConversationSummary {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        conversation_id: row.get(2)?,
        summary: row.get(3)?,
        token_count: token_count as usize,
        model: row.get(5)?,
        index_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}
