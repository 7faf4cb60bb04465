// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending signal queue operations.

use mnema_core::MnemaError;
use mnema_core::types::{NewSignal, PendingSignal, now_timestamp};
use rusqlite::params;

use super::parse_column;
use crate::database::{Database, map_tr_err, placeholders};

/// Persist one signal and return its row id.
pub async fn insert_signal(db: &Database, signal: &NewSignal) -> Result<i64, MnemaError> {
    let signal = signal.clone();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO pending_signals (agent_id, conversation_id, signal_type,
                     user_message, assistant_message, processed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    signal.agent_id,
                    signal.conversation_id,
                    signal.signal_type.to_string(),
                    signal.user_message,
                    signal.assistant_message,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Unprocessed signals of one agent in arrival order.
pub async fn load_pending_signals(
    db: &Database,
    agent_id: &str,
) -> Result<Vec<PendingSignal>, MnemaError> {
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<PendingSignal>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, conversation_id, signal_type, user_message,
                        assistant_message, processed, created_at
                 FROM pending_signals
                 WHERE agent_id = ?1 AND processed = 0
                 ORDER BY id",
            )?;
            let signals = stmt
                .query_map(params![agent_id], |row| {
                    Ok(PendingSignal {
                        id: row.get(0)?,
                        agent_id: row.get(1)?,
                        conversation_id: row.get(2)?,
                        signal_type: parse_column(3, row.get(3)?)?,
                        user_message: row.get(4)?,
                        assistant_message: row.get(5)?,
                        processed: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(signals)
        })
        .await
        .map_err(map_tr_err)
}

/// Flag the given signals as consumed.
pub async fn mark_signals_processed(db: &Database, ids: &[i64]) -> Result<(), MnemaError> {
    if ids.is_empty() {
        return Ok(());
    }

    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let sql = format!(
                "UPDATE pending_signals SET processed = 1 WHERE id IN ({})",
                placeholders(ids.len())
            );
            conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// `(agent_id, count)` for every agent with unprocessed signals.
pub async fn pending_signal_counts(db: &Database) -> Result<Vec<(String, usize)>, MnemaError> {
    db.connection()
        .call(|conn| -> Result<Vec<(String, usize)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT agent_id, COUNT(*) FROM pending_signals
                 WHERE processed = 0 GROUP BY agent_id ORDER BY agent_id",
            )?;
            let counts = stmt
                .query_map([], |row| {
                    let count: i64 = row.get(1)?;
                    Ok((row.get(0)?, count as usize))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}
