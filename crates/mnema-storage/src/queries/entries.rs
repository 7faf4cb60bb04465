// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory entry CRUD, supersession and plain-text search.

use mnema_core::MnemaError;
use mnema_core::types::{EntryType, MemoryEntry, now_timestamp};
use rusqlite::params;

use crate::database::{Database, OptionalExt, like_pattern, map_tr_err, placeholders};

const ENTRY_COLUMNS: &str = "id, agent_id, entry_type, content, confidence, source_conversation_id, \
     tags, model, superseded_by, created_at, last_accessed_at, access_count";

/// Insert a new entry.
pub async fn insert_entry(db: &Database, entry: &MemoryEntry) -> Result<(), MnemaError> {
    let entry = entry.clone();
    let tags = serde_json::to_string(&entry.tags).map_err(MnemaError::storage)?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO memory_entries (id, agent_id, entry_type, content, confidence,
                     source_conversation_id, tags, model, superseded_by, created_at,
                     last_accessed_at, access_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    entry.id,
                    entry.agent_id,
                    entry.entry_type.to_string(),
                    entry.content,
                    entry.confidence,
                    entry.source_conversation_id,
                    tags,
                    entry.model,
                    entry.superseded_by,
                    entry.created_at,
                    entry.last_accessed_at,
                    entry.access_count,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get an entry by id, active or not.
pub async fn get_entry(db: &Database, id: &str) -> Result<Option<MemoryEntry>, MnemaError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<MemoryEntry>, rusqlite::Error> {
            let sql = format!("SELECT {ENTRY_COLUMNS} FROM memory_entries WHERE id = ?1");
            conn.query_row(&sql, params![id], row_to_entry).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active entries of one agent, newest first.
pub async fn load_active_entries(
    db: &Database,
    agent_id: &str,
    limit: Option<usize>,
) -> Result<Vec<MemoryEntry>, MnemaError> {
    let agent_id = agent_id.to_string();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map_or(-1, |l| l as i64);
    db.connection()
        .call(move |conn| -> Result<Vec<MemoryEntry>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE agent_id = ?1 AND superseded_by IS NULL
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![agent_id, limit], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Active entries of every agent, oldest first.
pub async fn load_all_active_entries(db: &Database) -> Result<Vec<MemoryEntry>, MnemaError> {
    db.connection()
        .call(|conn| -> Result<Vec<MemoryEntry>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE superseded_by IS NULL ORDER BY created_at, rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map([], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Active entries among `ids` (batch retrieval after index search).
pub async fn get_entries_by_ids(
    db: &Database,
    ids: &[String],
) -> Result<Vec<MemoryEntry>, MnemaError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<Vec<MemoryEntry>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE id IN ({}) AND superseded_by IS NULL",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark `old_id` as superseded by `new_id`. Already-superseded entries keep
/// their original back-reference.
pub async fn supersede_entry(
    db: &Database,
    old_id: &str,
    new_id: &str,
    reason: &str,
) -> Result<(), MnemaError> {
    let old_id = old_id.to_string();
    let new_id = new_id.to_string();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE memory_entries SET superseded_by = ?1, supersede_reason = ?2
                 WHERE id = ?3 AND superseded_by IS NULL",
                params![new_id, reason, old_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Bump `access_count` and `last_accessed_at` on the given entries.
pub async fn touch_entries(db: &Database, ids: &[String]) -> Result<(), MnemaError> {
    if ids.is_empty() {
        return Ok(());
    }

    let ids = ids.to_vec();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "UPDATE memory_entries
                     SET access_count = access_count + 1, last_accessed_at = ?1
                     WHERE id = ?2",
                )?;
                for id in &ids {
                    stmt.execute(params![now, id])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Substring search over active entry contents, newest first.
pub async fn search_entries_text(
    db: &Database,
    query: &str,
    agent_id: Option<&str>,
    limit: usize,
) -> Result<Vec<MemoryEntry>, MnemaError> {
    let pattern = like_pattern(query);
    let agent_id = agent_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<MemoryEntry>, rusqlite::Error> {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM memory_entries
                 WHERE superseded_by IS NULL
                   AND content LIKE ?1 ESCAPE '\\'
                   AND (?2 IS NULL OR agent_id = ?2)
                 ORDER BY created_at DESC, rowid DESC LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![pattern, agent_id, limit as i64], row_to_entry)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<MemoryEntry, rusqlite::Error> {
    let entry_type: String = row.get(2)?;
    let tags: String = row.get(6)?;
    Ok(MemoryEntry {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        entry_type: EntryType::parse_lenient(&entry_type),
        content: row.get(3)?,
        confidence: row.get(4)?,
        source_conversation_id: row.get(5)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        model: row.get(7)?,
        superseded_by: row.get(8)?,
        created_at: row.get(9)?,
        last_accessed_at: row.get(10)?,
        access_count: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(id: &str, agent: &str, ty: EntryType, content: &str) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            agent_id: agent.to_string(),
            entry_type: ty,
            content: content.to_string(),
            confidence: 0.9,
            source_conversation_id: Some("conv-1".to_string()),
            tags: vec!["ui".to_string()],
            model: "test-model".to_string(),
            superseded_by: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            last_accessed_at: None,
            access_count: 0,
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let entry = make_entry("e1", "agent-a", EntryType::Preference, "User prefers dark mode");
        insert_entry(&db, &entry).await.unwrap();

        let loaded = get_entry(&db, "e1").await.unwrap().unwrap();
        assert_eq!(loaded, entry);
        assert!(get_entry(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_entries_are_newest_first_and_capped() {
        let db = Database::open_in_memory().await.unwrap();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let mut e = make_entry(id, "agent-a", EntryType::Fact, "fact");
            e.created_at = format!("2026-01-0{}T00:00:00.000Z", i + 1);
            insert_entry(&db, &e).await.unwrap();
        }
        insert_entry(&db, &make_entry("other", "agent-b", EntryType::Fact, "x"))
            .await
            .unwrap();

        let all = load_active_entries(&db, "agent-a", None).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);

        let capped = load_active_entries(&db, "agent-a", Some(2)).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn superseded_entries_leave_active_set() {
        let db = Database::open_in_memory().await.unwrap();
        insert_entry(&db, &make_entry("old", "agent-a", EntryType::Preference, "dark"))
            .await
            .unwrap();
        insert_entry(&db, &make_entry("new", "agent-a", EntryType::Preference, "light"))
            .await
            .unwrap();

        supersede_entry(&db, "old", "new", "contradicted").await.unwrap();

        let old = get_entry(&db, "old").await.unwrap().unwrap();
        assert_eq!(old.superseded_by.as_deref(), Some("new"));
        let active = load_active_entries(&db, "agent-a", None).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "new");

        let by_id = get_entries_by_ids(&db, &["old".into(), "new".into()])
            .await
            .unwrap();
        assert_eq!(by_id.len(), 1);
    }

    #[tokio::test]
    async fn touch_bumps_access_metadata() {
        let db = Database::open_in_memory().await.unwrap();
        insert_entry(&db, &make_entry("e1", "agent-a", EntryType::Fact, "x"))
            .await
            .unwrap();
        touch_entries(&db, &["e1".into()]).await.unwrap();
        touch_entries(&db, &["e1".into()]).await.unwrap();

        let e = get_entry(&db, "e1").await.unwrap().unwrap();
        assert_eq!(e.access_count, 2);
        assert!(e.last_accessed_at.is_some());
    }

    #[tokio::test]
    async fn text_search_matches_substrings_and_escapes_wildcards() {
        let db = Database::open_in_memory().await.unwrap();
        insert_entry(&db, &make_entry("e1", "agent-a", EntryType::Fact, "Uses Rust daily"))
            .await
            .unwrap();
        insert_entry(&db, &make_entry("e2", "agent-b", EntryType::Fact, "100% remote"))
            .await
            .unwrap();

        let hits = search_entries_text(&db, "rust", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "e1");

        let scoped = search_entries_text(&db, "rust", Some("agent-b"), 10)
            .await
            .unwrap();
        assert!(scoped.is_empty());

        let percent = search_entries_text(&db, "0%", None, 10).await.unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].id, "e2");
    }
}
