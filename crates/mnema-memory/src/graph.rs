// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge graph upserts and traversal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mnema_core::types::{GraphEdge, GraphEntity, NewRelationship};
use mnema_core::{MemoryEvent, MemoryObserver, MemoryStorage, MnemaError};
use tracing::debug;

use crate::extraction::{ExtractedEntity, ExtractedRelationship};

/// Entity type used when a relationship names an entity the batch did not declare.
pub const UNKNOWN_ENTITY_TYPE: &str = "unknown";

/// Counts of graph records written by one upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphUpsertOutcome {
    pub entities: usize,
    pub relationships: usize,
}

/// Resolves or creates entities and inserts relationship edges.
pub struct GraphUpserter {
    storage: Arc<dyn MemoryStorage>,
    observer: Arc<dyn MemoryObserver>,
}

impl GraphUpserter {
    pub fn new(storage: Arc<dyn MemoryStorage>, observer: Arc<dyn MemoryObserver>) -> Self {
        Self { storage, observer }
    }

    /// Upsert one batch. Individual failures are reported and skipped.
    pub async fn upsert(
        &self,
        entities: &[ExtractedEntity],
        relationships: &[ExtractedRelationship],
        model: &str,
    ) -> GraphUpsertOutcome {
        let mut outcome = GraphUpsertOutcome::default();
        let declared: HashMap<String, &str> = entities
            .iter()
            .map(|e| (e.name.to_lowercase(), e.entity_type.as_str()))
            .collect();
        let mut resolved: HashMap<String, GraphEntity> = HashMap::new();

        for entity in entities {
            match self.resolve(&entity.name, &entity.entity_type, &mut resolved).await {
                Ok(_) => outcome.entities += 1,
                Err(e) => self.failed("insert_entity", &e),
            }
        }

        for rel in relationships {
            let source_type = declared
                .get(&rel.source.to_lowercase())
                .copied()
                .unwrap_or(UNKNOWN_ENTITY_TYPE);
            let target_type = declared
                .get(&rel.target.to_lowercase())
                .copied()
                .unwrap_or(UNKNOWN_ENTITY_TYPE);

            let source = match self.resolve(&rel.source, source_type, &mut resolved).await {
                Ok(entity) => entity,
                Err(e) => {
                    self.failed("resolve_relationship_source", &e);
                    continue;
                }
            };
            let target = match self.resolve(&rel.target, target_type, &mut resolved).await {
                Ok(entity) => entity,
                Err(e) => {
                    self.failed("resolve_relationship_target", &e);
                    continue;
                }
            };

            let edge = NewRelationship {
                source_id: source.id,
                target_id: target.id,
                relation: rel.relation.clone(),
                confidence: rel.confidence,
                model: Some(model.to_string()),
            };
            match self.storage.insert_relationship(&edge).await {
                Ok(id) => {
                    debug!(edge_id = id, relation = %rel.relation, "relationship inserted");
                    outcome.relationships += 1;
                }
                Err(e) => self.failed("insert_relationship", &e),
            }
        }

        outcome
    }

    async fn resolve(
        &self,
        name: &str,
        entity_type: &str,
        cache: &mut HashMap<String, GraphEntity>,
    ) -> Result<GraphEntity, MnemaError> {
        let key = name.to_lowercase();
        if let Some(entity) = cache.get(&key) {
            return Ok(entity.clone());
        }
        let entity = match self.storage.find_entity(name).await? {
            Some(existing) => existing,
            None => self.storage.insert_entity(name, entity_type).await?,
        };
        cache.insert(key, entity.clone());
        Ok(entity)
    }

    fn failed(&self, operation: &str, error: &MnemaError) {
        self.observer.record(MemoryEvent::StorageFailure {
            operation: operation.to_string(),
            error: error.to_string(),
        });
    }
}

/// Exact relational lookup over the graph.
///
/// With an entity: breadth-first over edges touching the frontier for up to
/// `depth` hops, optionally keeping only edges with `relation`. With only a
/// relation: every edge carrying it. With neither: the most recent edges.
pub async fn search_graph(
    storage: &dyn MemoryStorage,
    entity_name: Option<&str>,
    relation: Option<&str>,
    depth: usize,
    limit: usize,
) -> Result<Vec<GraphEdge>, MnemaError> {
    let relation = relation.map(str::trim).filter(|r| !r.is_empty());
    let entity_name = entity_name.map(str::trim).filter(|n| !n.is_empty());

    let Some(name) = entity_name else {
        return match relation {
            Some(relation) => storage.load_edges_by_relation(relation, limit).await,
            None => storage.load_recent_edges(limit).await,
        };
    };

    let Some(root) = storage.find_entity(name).await? else {
        return Ok(vec![]);
    };

    let mut visited: HashSet<i64> = HashSet::from([root.id]);
    let mut frontier = vec![root.id];
    let mut seen_edges: HashSet<i64> = HashSet::new();
    let mut edges = Vec::new();

    for _ in 0..depth.max(1) {
        if frontier.is_empty() || edges.len() >= limit {
            break;
        }
        let mut next = Vec::new();
        for edge in storage.load_edges_for_entities(&frontier).await? {
            if let Some(relation) = relation
                && !edge.relation.eq_ignore_ascii_case(relation)
            {
                continue;
            }
            if !seen_edges.insert(edge.id) {
                continue;
            }
            for endpoint in [edge.source_id, edge.target_id] {
                if visited.insert(endpoint) {
                    next.push(endpoint);
                }
            }
            edges.push(edge);
        }
        frontier = next;
    }

    edges.truncate(limit);
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_test_utils::{RecordingObserver, TestHarness};

    fn entity(name: &str, entity_type: &str) -> ExtractedEntity {
        ExtractedEntity {
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }

    fn rel(source: &str, relation: &str, target: &str) -> ExtractedRelationship {
        ExtractedRelationship {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn entities_resolve_case_insensitively() {
        let harness = TestHarness::new().await;
        let upserter = GraphUpserter::new(harness.storage(), Arc::new(RecordingObserver::new()));

        upserter
            .upsert(&[entity("Lisbon", "place")], &[], "m")
            .await;
        let outcome = upserter
            .upsert(
                &[entity("lisbon", "city")],
                &[rel("Ana", "lives_in", "LISBON")],
                "m",
            )
            .await;

        assert_eq!(outcome, GraphUpsertOutcome { entities: 1, relationships: 1 });
        let lisbon = harness.storage().find_entity("LISBON").await.unwrap().unwrap();
        assert_eq!(lisbon.entity_type, "place");
        let ana = harness.storage().find_entity("ana").await.unwrap().unwrap();
        assert_eq!(ana.entity_type, UNKNOWN_ENTITY_TYPE);

        let edges = harness.storage().load_recent_edges(10).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, lisbon.id);
    }

    #[tokio::test]
    async fn traversal_respects_depth_and_relation() {
        let harness = TestHarness::new().await;
        let upserter = GraphUpserter::new(harness.storage(), Arc::new(RecordingObserver::new()));
        upserter
            .upsert(
                &[],
                &[
                    rel("Ana", "works_at", "Acme"),
                    rel("Acme", "located_in", "Porto"),
                    rel("Porto", "part_of", "Portugal"),
                    rel("Ana", "likes", "Tea"),
                ],
                "m",
            )
            .await;
        let storage = harness.storage();

        let one_hop = search_graph(storage.as_ref(), Some("ana"), None, 1, 100)
            .await
            .unwrap();
        assert_eq!(one_hop.len(), 2);

        let two_hops = search_graph(storage.as_ref(), Some("Ana"), None, 2, 100)
            .await
            .unwrap();
        assert_eq!(two_hops.len(), 3);

        let filtered = search_graph(storage.as_ref(), Some("Ana"), Some("LIKES"), 3, 100)
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].target, "Tea");

        let by_relation = search_graph(storage.as_ref(), None, Some("part_of"), 1, 100)
            .await
            .unwrap();
        assert_eq!(by_relation.len(), 1);

        let missing = search_graph(storage.as_ref(), Some("Nobody"), None, 3, 100)
            .await
            .unwrap();
        assert!(missing.is_empty());

        let recent = search_graph(storage.as_ref(), None, None, 1, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }
}
