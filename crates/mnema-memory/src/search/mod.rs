// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval over entries, conversation chunks and summaries.
//!
//! Each search over-fetches `top_k × fetch_multiplier` hits from the index,
//! resolves them against durable storage (dropping stale or foreign-agent
//! documents), and MMR-reranks down to `top_k`. If too few hits survive
//! resolution the window doubles until the index runs dry. When the index
//! is unavailable the search degrades to a substring match over storage,
//! reranked the same way with uniform relevance.

pub mod ids;
pub mod index;
pub mod mmr;

use std::collections::HashMap;
use std::sync::Arc;

use mnema_config::model::SearchConfig;
use mnema_core::types::{ConversationChunk, ConversationSummary, MemoryEntry, SearchHit};
use mnema_core::{MemoryStorage, MnemaError};
use serde::Serialize;
use tracing::debug;

pub use ids::{chunk_document_id, derive_document_id, summary_document_id};
pub use index::HybridSearchIndex;
pub use mmr::{Candidate, Ranked, rerank};

use ids::{CHUNK_PREFIX, SUMMARY_PREFIX, is_entry_id};

/// Per-call overrides of the configured search parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub top_k: Option<usize>,
    pub lambda: Option<f64>,
    pub fetch_multiplier: Option<usize>,
}

/// Reranked results plus whether the text fallback produced them.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome<T> {
    pub results: Vec<Ranked<T>>,
    pub fallback: bool,
}

impl<T> SearchOutcome<T> {
    fn empty() -> Self {
        Self {
            results: vec![],
            fallback: false,
        }
    }
}

/// Resolved parameters of one search call.
#[derive(Debug, Clone, Copy)]
struct Plan {
    top_k: usize,
    fetch_k: usize,
    lambda: f64,
    threshold: f32,
}

/// Search facade over storage and the index.
pub struct MemorySearch {
    storage: Arc<dyn MemoryStorage>,
    index: Arc<HybridSearchIndex>,
    config: SearchConfig,
}

impl MemorySearch {
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        index: Arc<HybridSearchIndex>,
        config: SearchConfig,
    ) -> Self {
        Self {
            storage,
            index,
            config,
        }
    }

    /// Active memory entries relevant to `query`.
    pub async fn search_entries(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<MemoryEntry>, MnemaError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::empty());
        }
        let plan = self.plan(options);

        let resolve = |hits: Vec<SearchHit>| async move {
            let rows = self.storage.get_entries_by_ids(&hit_ids(&hits)).await?;
            let rows = rows
                .into_iter()
                .filter(|e| agent_id.is_none_or(|a| e.agent_id == a))
                .map(|e| (e.id.clone(), e))
                .collect();
            Ok::<_, MnemaError>(join_hits(hits, rows, |e: &MemoryEntry| e.content.clone()))
        };
        match self.fetch_candidates("entries", query, plan, is_entry_id, resolve).await? {
            Some(candidates) => Ok(self.finish(candidates, plan, false)),
            None => {
                let rows = self
                    .storage
                    .search_entries_text(query, agent_id, plan.fetch_k)
                    .await?;
                Ok(self.fallback(rows, plan, |e| e.content.clone()))
            }
        }
    }

    /// Raw conversation chunks relevant to `query`.
    pub async fn search_conversations(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<ConversationChunk>, MnemaError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::empty());
        }
        let plan = self.plan(options);

        let resolve = |hits: Vec<SearchHit>| async move {
            let rows = self.storage.get_chunks_by_index_ids(&hit_ids(&hits)).await?;
            let rows = rows
                .into_iter()
                .filter(|c| agent_id.is_none_or(|a| c.agent_id == a))
                .map(|c| (c.index_id.clone(), c))
                .collect();
            Ok::<_, MnemaError>(join_hits(hits, rows, |c: &ConversationChunk| {
                c.content.clone()
            }))
        };
        let accepts = |id: &str| id.starts_with(CHUNK_PREFIX);
        match self.fetch_candidates("conversations", query, plan, accepts, resolve).await? {
            Some(candidates) => Ok(self.finish(candidates, plan, false)),
            None => {
                let rows = self
                    .storage
                    .search_chunks_text(query, agent_id, plan.fetch_k)
                    .await?;
                Ok(self.fallback(rows, plan, |c| c.content.clone()))
            }
        }
    }

    /// Conversation summaries relevant to `query`.
    pub async fn search_summaries(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<ConversationSummary>, MnemaError> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::empty());
        }
        let plan = self.plan(options);

        let resolve = |hits: Vec<SearchHit>| async move {
            let rows = self
                .storage
                .get_summaries_by_index_ids(&hit_ids(&hits))
                .await?;
            let rows = rows
                .into_iter()
                .filter(|s| agent_id.is_none_or(|a| s.agent_id == a))
                .map(|s| (s.index_id.clone(), s))
                .collect();
            Ok::<_, MnemaError>(join_hits(hits, rows, |s: &ConversationSummary| {
                s.summary.clone()
            }))
        };
        let accepts = |id: &str| id.starts_with(SUMMARY_PREFIX);
        match self.fetch_candidates("summaries", query, plan, accepts, resolve).await? {
            Some(candidates) => Ok(self.finish(candidates, plan, false)),
            None => {
                let rows = self
                    .storage
                    .search_summaries_text(query, agent_id, plan.fetch_k)
                    .await?;
                Ok(self.fallback(rows, plan, |s| s.summary.clone()))
            }
        }
    }

    /// Query the index and resolve the hits, doubling the fetch window until
    /// `top_k` candidates survive resolution or the index has no more hits.
    /// `None` means the index is unavailable.
    async fn fetch_candidates<T, F, Fut>(
        &self,
        scope: &str,
        query: &str,
        plan: Plan,
        accepts: impl Fn(&str) -> bool,
        resolve: F,
    ) -> Result<Option<Vec<Candidate<T>>>, MnemaError>
    where
        F: Fn(Vec<SearchHit>) -> Fut,
        Fut: Future<Output = Result<Vec<Candidate<T>>, MnemaError>>,
    {
        let mut fetch_k = plan.fetch_k;
        loop {
            let Some(hits) = self
                .index
                .search(scope, query, fetch_k, plan.threshold)
                .await
            else {
                return Ok(None);
            };
            let exhausted = hits.len() < fetch_k;
            let hits = hits.into_iter().filter(|h| accepts(&h.id)).collect();
            let candidates = resolve(hits).await?;
            if candidates.len() >= plan.top_k || exhausted || fetch_k == usize::MAX {
                return Ok(Some(candidates));
            }
            fetch_k = fetch_k.saturating_mul(2);
            debug!(scope, kept = candidates.len(), fetch_k, "widening search window");
        }
    }

    fn plan(&self, options: SearchOptions) -> Plan {
        let top_k = options.top_k.unwrap_or(self.config.default_top_k).max(1);
        let multiplier = options
            .fetch_multiplier
            .unwrap_or(self.config.fetch_multiplier)
            .max(1);
        Plan {
            top_k,
            fetch_k: top_k.saturating_mul(multiplier),
            lambda: options
                .lambda
                .unwrap_or(self.config.mmr_lambda)
                .clamp(0.0, 1.0),
            threshold: self.config.similarity_threshold,
        }
    }

    fn finish<T>(
        &self,
        candidates: Vec<Candidate<T>>,
        plan: Plan,
        fallback: bool,
    ) -> SearchOutcome<T> {
        SearchOutcome {
            results: rerank(candidates, plan.top_k, plan.lambda),
            fallback,
        }
    }

    /// Text-search rows carry no score, so MMR ranks them on diversity alone.
    fn fallback<T>(
        &self,
        rows: Vec<T>,
        plan: Plan,
        text: impl Fn(&T) -> String,
    ) -> SearchOutcome<T> {
        let candidates = rows
            .into_iter()
            .map(|item| Candidate {
                text: text(&item),
                item,
                score: 0.0,
            })
            .collect();
        self.finish(candidates, plan, true)
    }
}

fn hit_ids(hits: &[SearchHit]) -> Vec<String> {
    hits.iter().map(|h| h.id.clone()).collect()
}

/// Pair index hits with their storage rows, keeping hit order and dropping
/// hits whose row is gone (superseded, other agent, or stale document).
fn join_hits<T>(
    hits: Vec<SearchHit>,
    mut rows: HashMap<String, T>,
    text: impl Fn(&T) -> String,
) -> Vec<Candidate<T>> {
    hits.into_iter()
        .filter_map(|hit| {
            rows.remove(&hit.id).map(|item| Candidate {
                text: text(&item),
                item,
                score: f64::from(hit.score),
            })
        })
        .collect()
}
