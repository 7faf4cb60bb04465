// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort wrapper around an external search backend.
//!
//! Durable storage is the source of truth; the index is derived from it.
//! Mutations never fail from the caller's point of view: a backend error is
//! reported to the observer and swallowed. Reads return `None` when the
//! backend is unavailable so the caller can fall back to text search.

use std::sync::Arc;

use mnema_core::types::{ConversationChunk, ConversationSummary, MemoryEntry, SearchHit};
use mnema_core::{MemoryEvent, MemoryObserver, VectorIndex};
use tracing::{debug, info};

/// Search index facade with failure isolation.
pub struct HybridSearchIndex {
    backend: Option<Arc<dyn VectorIndex>>,
    observer: Arc<dyn MemoryObserver>,
}

impl HybridSearchIndex {
    /// Initialize `backend`; if that fails the index stays permanently
    /// unavailable and every search uses the fallback path.
    pub async fn connect(
        backend: Option<Arc<dyn VectorIndex>>,
        observer: Arc<dyn MemoryObserver>,
    ) -> Self {
        let backend = match backend {
            Some(backend) => match backend.initialize().await {
                Ok(()) => Some(backend),
                Err(e) => {
                    observer.record(MemoryEvent::IndexFailure {
                        operation: "initialize".to_string(),
                        error: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };
        Self { backend, observer }
    }

    /// An index that always falls back to text search.
    pub fn disabled(observer: Arc<dyn MemoryObserver>) -> Self {
        Self {
            backend: None,
            observer,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn index_entry(&self, entry: &MemoryEntry) {
        self.add("index_entry", &entry.content, &entry.id).await;
    }

    pub async fn index_chunk(&self, chunk: &ConversationChunk) {
        self.add("index_chunk", &chunk.content, &chunk.index_id).await;
    }

    pub async fn index_summary(&self, summary: &ConversationSummary) {
        self.add("index_summary", &summary.summary, &summary.index_id)
            .await;
    }

    /// Drop documents (superseded entries) from the index.
    pub async fn remove(&self, ids: &[String]) {
        let Some(backend) = &self.backend else {
            return;
        };
        if ids.is_empty() {
            return;
        }
        if let Err(e) = backend.delete_documents(ids).await {
            self.failed("remove", &e);
        }
    }

    /// Drop every indexed document, then re-add the given active entries.
    /// Returns the number of entries re-indexed, or `None` if nothing was done.
    pub async fn rebuild(&self, entries: &[MemoryEntry]) -> Option<usize> {
        let backend = self.backend.as_ref()?;
        if let Err(e) = backend.reset().await {
            self.failed("rebuild", &e);
            return None;
        }
        if entries.is_empty() {
            return Some(0);
        }
        let texts: Vec<String> = entries.iter().map(|e| e.content.clone()).collect();
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        match backend.add_documents(&texts, &ids).await {
            Ok(()) => {
                info!(documents = ids.len(), "search index rebuilt");
                Some(ids.len())
            }
            Err(e) => {
                self.failed("rebuild", &e);
                None
            }
        }
    }

    /// Drop every indexed document. Returns whether the reset happened.
    pub async fn reset(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match backend.reset().await {
            Ok(()) => true,
            Err(e) => {
                self.failed("reset", &e);
                false
            }
        }
    }

    /// Raw backend search. `None` means "use the fallback".
    pub async fn search(
        &self,
        scope: &str,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Option<Vec<SearchHit>> {
        let Some(backend) = &self.backend else {
            self.observer.record(MemoryEvent::SearchFallback {
                scope: scope.to_string(),
                reason: "index unavailable".to_string(),
            });
            return None;
        };
        match backend.search(query, k, threshold).await {
            Ok(hits) => {
                debug!(scope, hits = hits.len(), "index search");
                Some(hits)
            }
            Err(e) => {
                self.observer.record(MemoryEvent::SearchFallback {
                    scope: scope.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    async fn add(&self, operation: &str, text: &str, id: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend.add_document(text, id).await {
            self.failed(operation, &e);
        }
    }

    fn failed(&self, operation: &str, error: &mnema_core::MnemaError) {
        self.observer.record(MemoryEvent::IndexFailure {
            operation: operation.to_string(),
            error: error.to_string(),
        });
    }
}
