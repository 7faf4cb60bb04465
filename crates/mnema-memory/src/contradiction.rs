// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supersession of contradicted entries.
//!
//! A new entry is compared against the agent's active entries of the same
//! type. Any older entry whose word overlap exceeds the threshold, and whose
//! text differs, is superseded by the new one and dropped from the index.

use std::sync::Arc;

use mnema_core::{MemoryEntry, MemoryEvent, MemoryObserver, MemoryStorage, MnemaError};
use tracing::{debug, info};

use crate::search::HybridSearchIndex;
use crate::similarity::{jaccard_sets, token_set};

/// Outcome of resolving one new entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Ids of the entries the new one replaced.
    pub superseded: Vec<String>,
}

pub struct ContradictionResolver {
    storage: Arc<dyn MemoryStorage>,
    index: Arc<HybridSearchIndex>,
    observer: Arc<dyn MemoryObserver>,
    threshold: f64,
}

impl ContradictionResolver {
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        index: Arc<HybridSearchIndex>,
        observer: Arc<dyn MemoryObserver>,
        threshold: f64,
    ) -> Self {
        Self {
            storage,
            index,
            observer,
            threshold,
        }
    }

    /// Persist `entry` and supersede whatever it contradicts.
    ///
    /// `active` is the caller's working set for the agent; it is updated in
    /// place so later entries of the same batch see this one. Fails only if
    /// the new entry itself could not be stored, in which case nothing else
    /// changes.
    pub async fn resolve(
        &self,
        entry: MemoryEntry,
        active: &mut Vec<MemoryEntry>,
    ) -> Result<Resolution, MnemaError> {
        self.storage.insert_entry(&entry).await?;

        let new_tokens = token_set(&entry.content);
        let mut resolution = Resolution::default();

        for old in active
            .iter()
            .filter(|old| old.entry_type == entry.entry_type && old.id != entry.id)
        {
            if old.content == entry.content {
                continue;
            }
            let similarity = jaccard_sets(&token_set(&old.content), &new_tokens);
            if similarity <= self.threshold {
                continue;
            }
            let reason = format!("contradicted by {} (similarity {similarity:.2})", entry.id);
            match self.storage.supersede_entry(&old.id, &entry.id, &reason).await {
                Ok(()) => {
                    info!(
                        agent_id = %entry.agent_id,
                        old_id = %old.id,
                        new_id = %entry.id,
                        similarity,
                        "entry superseded"
                    );
                    self.observer.record(MemoryEvent::EntrySuperseded {
                        agent_id: entry.agent_id.clone(),
                        old_id: old.id.clone(),
                        new_id: entry.id.clone(),
                        similarity,
                    });
                    resolution.superseded.push(old.id.clone());
                }
                Err(e) => self.observer.record(MemoryEvent::StorageFailure {
                    operation: "supersede_entry".to_string(),
                    error: e.to_string(),
                }),
            }
        }

        self.index.remove(&resolution.superseded).await;
        self.index.index_entry(&entry).await;

        active.retain(|e| !resolution.superseded.contains(&e.id));
        debug!(entry_id = %entry.id, superseded = resolution.superseded.len(), "entry stored");
        active.insert(0, entry);
        Ok(resolution)
    }
}
