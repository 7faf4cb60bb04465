// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile events and versioned user profiles.

use mnema_core::MnemaError;
use mnema_core::types::{NewProfileEvent, ProfileEvent, ProfileEventKind, UserProfile, now_timestamp};
use rusqlite::params;

use super::parse_column;
use crate::database::{Database, OptionalExt, map_tr_err, placeholders};

/// Persist one profile event and return its row id.
pub async fn insert_profile_event(
    db: &Database,
    event: &NewProfileEvent,
) -> Result<i64, MnemaError> {
    let event = event.clone();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO profile_events (agent_id, kind, content, model, incorporated_in, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.agent_id,
                    event.kind.to_string(),
                    event.content,
                    event.model,
                    event.incorporated_in,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Contributions not yet folded into a profile, oldest first.
pub async fn load_unincorporated_contributions(
    db: &Database,
) -> Result<Vec<ProfileEvent>, MnemaError> {
    load_events(
        db,
        ProfileEventKind::Contribution,
        "AND incorporated_in IS NULL",
    )
    .await
}

/// Every user edit, oldest first.
pub async fn load_user_edits(db: &Database) -> Result<Vec<ProfileEvent>, MnemaError> {
    load_events(db, ProfileEventKind::UserEdit, "").await
}

async fn load_events(
    db: &Database,
    kind: ProfileEventKind,
    filter: &'static str,
) -> Result<Vec<ProfileEvent>, MnemaError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ProfileEvent>, rusqlite::Error> {
            let sql = format!(
                "SELECT id, agent_id, kind, content, model, incorporated_in, created_at
                 FROM profile_events WHERE kind = ?1 {filter} ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let events = stmt
                .query_map(params![kind.to_string()], |row| {
                    Ok(ProfileEvent {
                        id: row.get(0)?,
                        agent_id: row.get(1)?,
                        kind: parse_column(2, row.get(2)?)?,
                        content: row.get(3)?,
                        model: row.get(4)?,
                        incorporated_in: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of contributions not yet folded into a profile.
pub async fn count_unincorporated_contributions(db: &Database) -> Result<usize, MnemaError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM profile_events
                 WHERE kind = 'contribution' AND incorporated_in IS NULL",
                [],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp contributions with the profile version that incorporated them.
/// User edits are never stamped.
pub async fn mark_incorporated(db: &Database, ids: &[i64], version: i64) -> Result<(), MnemaError> {
    if ids.is_empty() {
        return Ok(());
    }

    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let sql = format!(
                "UPDATE profile_events SET incorporated_in = ?{}
                 WHERE kind = 'contribution' AND id IN ({})",
                ids.len() + 1,
                placeholders(ids.len())
            );
            let mut values = ids;
            values.push(version);
            conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The profile with the highest version.
pub async fn load_current_profile(db: &Database) -> Result<Option<UserProfile>, MnemaError> {
    db.connection()
        .call(|conn| -> Result<Option<UserProfile>, rusqlite::Error> {
            conn.query_row(
                "SELECT content, token_count, version, model, generated_at
                 FROM user_profiles ORDER BY version DESC LIMIT 1",
                [],
                |row| {
                    let token_count: i64 = row.get(1)?;
                    Ok(UserProfile {
                        content: row.get(0)?,
                        token_count: token_count as usize,
                        version: row.get(2)?,
                        model: row.get(3)?,
                        generated_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Store a new profile version. Fails if that version already exists.
pub async fn save_profile(db: &Database, profile: &UserProfile) -> Result<(), MnemaError> {
    let profile = profile.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO user_profiles (version, content, token_count, model, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    profile.version,
                    profile.content,
                    profile.token_count as i64,
                    profile.model,
                    profile.generated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
