// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only processing audit log.

use mnema_core::MnemaError;
use mnema_core::types::{ProcessingLog, now_timestamp};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Append one processing log row.
pub async fn append_processing_log(db: &Database, log: &ProcessingLog) -> Result<(), MnemaError> {
    let log = log.clone();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO processing_logs (agent_id, task_type, status, model, input_tokens,
                     output_tokens, duration_ms, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    log.agent_id,
                    log.task_type.to_string(),
                    log.status.to_string(),
                    log.model,
                    log.input_tokens as i64,
                    log.output_tokens as i64,
                    log.duration_ms as i64,
                    log.detail,
                    created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
