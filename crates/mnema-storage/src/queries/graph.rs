// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge graph entities and relationship edges.

use mnema_core::MnemaError;
use mnema_core::types::{GraphEdge, GraphEntity, NewRelationship, now_timestamp};
use rusqlite::params;

use crate::database::{Database, OptionalExt, map_tr_err, placeholders};

const EDGE_SELECT: &str = "SELECT r.id, r.source_id, s.name, r.target_id, t.name, r.relation,
            r.confidence, r.created_at
     FROM graph_relationships r
     JOIN graph_entities s ON s.id = r.source_id
     JOIN graph_entities t ON t.id = r.target_id";

/// Look an entity up by case-insensitive name.
pub async fn find_entity(db: &Database, name: &str) -> Result<Option<GraphEntity>, MnemaError> {
    let name = name.trim().to_string();
    db.connection()
        .call(move |conn| -> Result<Option<GraphEntity>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, entity_type, created_at FROM graph_entities
                 WHERE lower(name) = lower(?1)",
                params![name],
                row_to_entity,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Create an entity, or return the existing one with the same folded name.
pub async fn insert_entity(
    db: &Database,
    name: &str,
    entity_type: &str,
) -> Result<GraphEntity, MnemaError> {
    let name = name.trim().to_string();
    let entity_type = entity_type.trim().to_string();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<GraphEntity, rusqlite::Error> {
            conn.execute(
                "INSERT INTO graph_entities (name, entity_type, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT DO NOTHING",
                params![name, entity_type, created_at],
            )?;
            conn.query_row(
                "SELECT id, name, entity_type, created_at FROM graph_entities
                 WHERE lower(name) = lower(?1)",
                params![name],
                row_to_entity,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a relationship edge and return its id.
pub async fn insert_relationship(
    db: &Database,
    relationship: &NewRelationship,
) -> Result<i64, MnemaError> {
    let rel = relationship.clone();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO graph_relationships
                     (source_id, target_id, relation, confidence, model, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rel.source_id,
                    rel.target_id,
                    rel.relation,
                    rel.confidence,
                    rel.model,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent edges, newest first.
pub async fn load_recent_edges(db: &Database, limit: usize) -> Result<Vec<GraphEdge>, MnemaError> {
    db.connection()
        .call(move |conn| -> Result<Vec<GraphEdge>, rusqlite::Error> {
            let sql = format!("{EDGE_SELECT} ORDER BY r.created_at DESC, r.id DESC LIMIT ?1");
            let mut stmt = conn.prepare(&sql)?;
            let edges = stmt
                .query_map(params![limit as i64], row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(edges)
        })
        .await
        .map_err(map_tr_err)
}

/// Edges with either endpoint among `entity_ids`, oldest first.
pub async fn load_edges_for_entities(
    db: &Database,
    entity_ids: &[i64],
) -> Result<Vec<GraphEdge>, MnemaError> {
    if entity_ids.is_empty() {
        return Ok(vec![]);
    }

    let ids = entity_ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<Vec<GraphEdge>, rusqlite::Error> {
            let list = placeholders(ids.len());
            let sql = format!(
                "{EDGE_SELECT} WHERE r.source_id IN ({list}) OR r.target_id IN ({list})
                 ORDER BY r.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let edges = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(edges)
        })
        .await
        .map_err(map_tr_err)
}

/// Edges with the given relation label (case-insensitive), newest first.
pub async fn load_edges_by_relation(
    db: &Database,
    relation: &str,
    limit: usize,
) -> Result<Vec<GraphEdge>, MnemaError> {
    let relation = relation.trim().to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<GraphEdge>, rusqlite::Error> {
            let sql = format!(
                "{EDGE_SELECT} WHERE lower(r.relation) = lower(?1)
                 ORDER BY r.created_at DESC, r.id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let edges = stmt
                .query_map(params![relation, limit as i64], row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(edges)
        })
        .await
        .map_err(map_tr_err)
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> Result<GraphEntity, rusqlite::Error> {
    Ok(GraphEntity {
        id: row.get(0)?,
        name: row.get(1)?,
        entity_type: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_edge(row: &rusqlite::Row<'_>) -> Result<GraphEdge, rusqlite::Error> {
    Ok(GraphEdge {
        id: row.get(0)?,
        source_id: row.get(1)?,
        source: row.get(2)?,
        target_id: row.get(3)?,
        target: row.get(4)?,
        relation: row.get(5)?,
        confidence: row.get(6)?,
        created_at: row.get(7)?,
    })
}
