// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory service facade.
//!
//! Processing entry points never return an error: they report what happened
//! and leave memory either improved or unchanged. Reads return `Result` since
//! a caller asking for data must learn when durable storage failed; index
//! failures never surface because searches fall back to storage.

use std::sync::Arc;

use mnema_config::MnemaConfig;
use mnema_config::model::{ContextConfig, SearchConfig};
use mnema_core::types::{
    ConversationChunk, ConversationSummary, GraphEdge, NewProfileEvent, SYSTEM_AGENT_ID,
    UserProfile, now_timestamp,
};
use mnema_core::{
    MemoryEntry, MemoryObserver, MemoryStorage, MnemaError, ModelInvoker, ProcessingStatus,
    ProfileEventKind, SignalType,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::ContextAssembler;
use crate::extraction::{ExtractionOrchestrator, ExtractionReport};
use crate::graph::search_graph;
use crate::profile::{ProfileRegenerator, RegenerationOutcome};
use crate::search::{
    HybridSearchIndex, MemorySearch, SearchOptions, SearchOutcome, chunk_document_id,
};
use crate::signals::SignalIngestor;

/// Most edges a graph search returns.
pub const GRAPH_RESULT_LIMIT: usize = 100;

/// Outcome of one processing trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    /// Pending signals written by this call (immediate path only).
    pub signals_stored: usize,
    pub extraction: ExtractionReport,
    /// Set when the extraction completed and the regeneration check ran.
    pub profile: Option<RegenerationOutcome>,
}

/// Outcome of [`MemoryService::sync_now`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub agents: Vec<AgentSyncReport>,
    pub profile: Option<RegenerationOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSyncReport {
    pub agent_id: String,
    pub extraction: ExtractionReport,
}

/// Snapshot of pipeline state for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub agents: Vec<AgentStatus>,
    pub unincorporated_contributions: usize,
    pub profile_version: Option<i64>,
    pub index_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub pending_signals: usize,
    pub processing: ProcessingStatus,
}

/// Entry point for the conversational layer and the CLI.
pub struct MemoryService {
    storage: Arc<dyn MemoryStorage>,
    index: Arc<HybridSearchIndex>,
    ingestor: SignalIngestor,
    orchestrator: ExtractionOrchestrator,
    regenerator: ProfileRegenerator,
    search: MemorySearch,
    assembler: ContextAssembler,
    search_config: SearchConfig,
    context_config: ContextConfig,
}

impl MemoryService {
    /// Wire the pipeline around explicit collaborators.
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        model: Arc<dyn ModelInvoker>,
        index: Arc<HybridSearchIndex>,
        observer: Arc<dyn MemoryObserver>,
        config: &MnemaConfig,
    ) -> Self {
        Self {
            ingestor: SignalIngestor::new(storage.clone(), observer.clone()),
            orchestrator: ExtractionOrchestrator::new(
                storage.clone(),
                model.clone(),
                index.clone(),
                observer.clone(),
                &config.memory,
                &config.model,
            ),
            regenerator: ProfileRegenerator::new(
                storage.clone(),
                model,
                observer.clone(),
                config.model.profile_model.clone(),
                config.model.max_tokens,
                config.memory.profile_regeneration_threshold,
            ),
            search: MemorySearch::new(storage.clone(), index.clone(), config.search.clone()),
            assembler: ContextAssembler::new(storage.clone(), observer),
            storage,
            index,
            search_config: config.search.clone(),
            context_config: config.context.clone(),
        }
    }

    /// Context budgets the service was configured with.
    pub fn context_config(&self) -> &ContextConfig {
        &self.context_config
    }

    // --- processing ---

    /// Persist the turn's signals, extract from it right away, then check
    /// whether the profile is due for regeneration.
    ///
    /// The stored signals stay pending and are consumed by the next batched
    /// run for the agent.
    pub async fn process_immediate_signals(
        &self,
        signals: &[SignalType],
        user_message: &str,
        assistant_message: Option<&str>,
        agent_id: &str,
        conversation_id: &str,
    ) -> ProcessingReport {
        let signals_stored = self
            .ingestor
            .ingest(
                agent_id,
                conversation_id,
                signals,
                user_message,
                assistant_message,
            )
            .await;
        let extraction = self
            .orchestrator
            .run_immediate(
                agent_id,
                conversation_id,
                signals,
                user_message,
                assistant_message,
            )
            .await;
        self.with_profile_check(signals_stored, extraction).await
    }

    /// Batched consolidation of one agent's pending signals.
    pub async fn process_post_activity(&self, agent_id: &str) -> ProcessingReport {
        let extraction = self.orchestrator.run_batch(agent_id).await;
        self.with_profile_check(0, extraction).await
    }

    /// Regenerate the profile now if there is anything to fold in.
    pub async fn regenerate_profile(&self) -> RegenerationOutcome {
        self.regenerator.regenerate().await
    }

    /// Process every agent with pending signals, then regenerate the profile
    /// if contributions are outstanding.
    pub async fn sync_now(&self) -> SyncReport {
        let pending = match self.storage.pending_signal_counts().await {
            Ok(pending) => pending,
            Err(e) => {
                return SyncReport {
                    agents: vec![],
                    profile: Some(RegenerationOutcome::Failed {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }),
                };
            }
        };

        let mut agents = Vec::with_capacity(pending.len());
        for (agent_id, count) in pending {
            debug!(agent_id = %agent_id, pending = count, "syncing agent");
            let extraction = self.orchestrator.run_batch(&agent_id).await;
            agents.push(AgentSyncReport {
                agent_id,
                extraction,
            });
        }

        let profile = match self.storage.count_unincorporated_contributions().await {
            Ok(0) => None,
            Ok(_) => Some(self.regenerator.regenerate().await),
            Err(e) => Some(RegenerationOutcome::Failed {
                kind: e.kind().to_string(),
                message: e.to_string(),
            }),
        };
        info!(agents = agents.len(), "sync finished");
        SyncReport { agents, profile }
    }

    async fn with_profile_check(
        &self,
        signals_stored: usize,
        extraction: ExtractionReport,
    ) -> ProcessingReport {
        let profile = if extraction.is_completed() {
            Some(self.regenerator.maybe_regenerate().await)
        } else {
            None
        };
        ProcessingReport {
            signals_stored,
            extraction,
            profile,
        }
    }

    // --- retrieval ---

    pub async fn search_memory_entries(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<MemoryEntry>, MnemaError> {
        self.search.search_entries(query, agent_id, options).await
    }

    pub async fn search_conversations(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<ConversationChunk>, MnemaError> {
        self.search.search_conversations(query, agent_id, options).await
    }

    pub async fn search_summaries(
        &self,
        query: &str,
        agent_id: Option<&str>,
        options: SearchOptions,
    ) -> Result<SearchOutcome<ConversationSummary>, MnemaError> {
        self.search.search_summaries(query, agent_id, options).await
    }

    /// Exact graph lookup; `depth` is clamped to `1..=max_graph_depth`.
    pub async fn search_graph(
        &self,
        entity_name: Option<&str>,
        relation: Option<&str>,
        depth: usize,
    ) -> Result<Vec<GraphEdge>, MnemaError> {
        let depth = depth.clamp(1, self.search_config.max_graph_depth.max(1));
        search_graph(
            self.storage.as_ref(),
            entity_name,
            relation,
            depth,
            GRAPH_RESULT_LIMIT,
        )
        .await
    }

    pub async fn assemble_context(
        &self,
        agent_id: &str,
        config: &ContextConfig,
    ) -> Result<String, MnemaError> {
        self.assembler.assemble(agent_id, config).await
    }

    // --- records ---

    /// Store one piece of a raw conversation and index it under its derived
    /// id. Recording the same `(conversation_id, chunk_index)` again replaces
    /// it. Returns the index id.
    pub async fn record_conversation_chunk(
        &self,
        agent_id: &str,
        conversation_id: &str,
        chunk_index: i64,
        role: &str,
        content: &str,
    ) -> Result<String, MnemaError> {
        let chunk = ConversationChunk {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
            chunk_index,
            role: role.to_string(),
            content: content.to_string(),
            index_id: chunk_document_id(conversation_id, chunk_index),
            created_at: now_timestamp(),
        };
        self.storage.upsert_chunk(&chunk).await?;
        self.index.index_chunk(&chunk).await;
        Ok(chunk.index_id)
    }

    /// Store an explicit user override of the profile.
    pub async fn record_user_edit(&self, content: &str) -> Result<i64, MnemaError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MnemaError::Internal("user edit is empty".to_string()));
        }
        let event = NewProfileEvent {
            agent_id: SYSTEM_AGENT_ID.to_string(),
            kind: ProfileEventKind::UserEdit,
            content: content.to_string(),
            model: None,
            incorporated_in: None,
        };
        self.storage.insert_profile_event(&event).await
    }

    pub async fn current_profile(&self) -> Result<Option<UserProfile>, MnemaError> {
        self.storage.load_current_profile().await
    }

    // --- maintenance ---

    /// Drop the index and re-add every active entry. `None` when the index is
    /// unavailable or the rebuild failed.
    pub async fn rebuild_index(&self) -> Result<Option<usize>, MnemaError> {
        let entries = self.storage.load_all_active_entries().await?;
        Ok(self.index.rebuild(&entries).await)
    }

    /// Drop every indexed document. Returns whether the reset happened.
    pub async fn reset_index(&self) -> bool {
        self.index.reset().await
    }

    pub async fn status(&self) -> Result<StatusReport, MnemaError> {
        let agents = self
            .storage
            .pending_signal_counts()
            .await?
            .into_iter()
            .map(|(agent_id, pending_signals)| AgentStatus {
                processing: self.orchestrator.processing_status(&agent_id),
                agent_id,
                pending_signals,
            })
            .collect();
        Ok(StatusReport {
            agents,
            unincorporated_contributions: self.storage.count_unincorporated_contributions().await?,
            profile_version: self.storage.load_current_profile().await?.map(|p| p.version),
            index_available: self.index.is_available(),
        })
    }
}
