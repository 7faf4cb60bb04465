// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory search backend.
//!
//! Scores documents by word overlap with the query (Jaccard over lower-cased
//! whitespace tokens). Failure can be switched on to exercise fallback paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mnema_core::types::SearchHit;
use mnema_core::{MnemaError, VectorIndex};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn overlap(query: &HashSet<String>, text: &str) -> f32 {
    let doc = tokens(text);
    let union = query.union(&doc).count();
    if union == 0 {
        return 0.0;
    }
    query.intersection(&doc).count() as f32 / union as f32
}

#[derive(Default)]
pub struct MockVectorIndex {
    documents: Mutex<BTreeMap<String, String>>,
    failing: Mutex<bool>,
    add_calls: Mutex<usize>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index whose every call (including `initialize`) fails.
    pub fn failing() -> Self {
        let index = Self::new();
        index.set_failing(true);
        index
    }

    pub fn set_failing(&self, failing: bool) {
        *guard(&self.failing) = failing;
    }

    /// Whether a document with `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        guard(&self.documents).contains_key(id)
    }

    /// Snapshot of stored `(id, text)` pairs, sorted by id.
    pub fn documents(&self) -> Vec<(String, String)> {
        guard(&self.documents)
            .iter()
            .map(|(id, text)| (id.clone(), text.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        guard(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful `add_document` calls.
    pub fn add_calls(&self) -> usize {
        *guard(&self.add_calls)
    }

    fn check(&self, operation: &str) -> Result<(), MnemaError> {
        if *guard(&self.failing) {
            return Err(MnemaError::search_index(format!(
                "mock index failure in {operation}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn initialize(&self) -> Result<(), MnemaError> {
        self.check("initialize")
    }

    async fn add_document(&self, text: &str, id: &str) -> Result<(), MnemaError> {
        self.check("add_document")?;
        guard(&self.documents).insert(id.to_string(), text.to_string());
        *guard(&self.add_calls) += 1;
        Ok(())
    }

    async fn add_documents(&self, texts: &[String], ids: &[String]) -> Result<(), MnemaError> {
        self.check("add_documents")?;
        if texts.len() != ids.len() {
            return Err(MnemaError::search_index("texts and ids differ in length"));
        }
        let mut documents = guard(&self.documents);
        for (text, id) in texts.iter().zip(ids) {
            documents.insert(id.clone(), text.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MnemaError> {
        self.check("search")?;
        let query = tokens(query);
        let mut hits: Vec<SearchHit> = guard(&self.documents)
            .iter()
            .map(|(id, text)| SearchHit {
                id: id.clone(),
                score: overlap(&query, text),
                text: text.clone(),
            })
            .filter(|hit| hit.score > 0.0 && hit.score >= threshold)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), MnemaError> {
        self.check("delete_documents")?;
        let mut documents = guard(&self.documents);
        for id in ids {
            documents.remove(id);
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), MnemaError> {
        self.check("reset")?;
        guard(&self.documents).clear();
        Ok(())
    }
}
