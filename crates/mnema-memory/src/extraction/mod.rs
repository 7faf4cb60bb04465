// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extraction orchestration.
//!
//! Two entry points share one apply phase:
//!
//! - the immediate path runs per conversational turn that fired a signal and
//!   shows the model a small set of active entries as dedup hints;
//! - the batched path consolidates every pending signal of one agent, asks
//!   for a session summary too, and marks the signals processed.
//!
//! Apply = contradiction resolution for entries, deduplication for profile
//! facts, upserts for the graph. Every step is best effort: failures are
//! reported to the observer and the rest of the batch continues.

pub mod parser;
pub mod prompt;

use std::sync::Arc;
use std::time::Instant;

use mnema_config::model::{MemoryConfig, ModelConfig};
use mnema_core::types::{
    GenerateRequest, LogStatus, NewSummary, PendingSignal, ProcessingLog, TaskType,
    estimate_tokens, now_timestamp,
};
use mnema_core::{
    MemoryEntry, MemoryEvent, MemoryObserver, MemoryStorage, MnemaError, ModelInvoker,
    ProcessingStatus, SignalType,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use parser::{
    ExtractedEntity, ExtractedEntry, ExtractedRelationship, Extraction, parse_extraction,
};
pub use prompt::{EXTRACTION_SYSTEM_PROMPT, build_batch_prompt, build_immediate_prompt};

use crate::contradiction::ContradictionResolver;
use crate::graph::GraphUpserter;
use crate::profile::ProfileFactDeduper;
use crate::search::{HybridSearchIndex, summary_document_id};
use crate::state::{AgentLocks, AgentProcessingState};

/// Counts from one completed extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub signals: usize,
    pub entries_added: usize,
    pub entries_superseded: usize,
    pub facts_added: usize,
    pub facts_skipped: usize,
    pub entities: usize,
    pub relationships: usize,
    pub summary_stored: bool,
    /// The model answered but no parse strategy succeeded.
    pub parse_failed: bool,
}

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No signal fired on this turn.
    NoSignals,
    /// The agent has nothing pending.
    NoPendingSignals,
    /// A batched run for the agent is already in progress.
    AlreadyProcessing,
}

/// Result of one extraction trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionReport {
    Completed(ExtractionStats),
    Skipped { reason: SkipReason },
    Failed { kind: String, message: String },
}

impl ExtractionReport {
    fn failed(error: &MnemaError) -> Self {
        ExtractionReport::Failed {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExtractionReport::Completed(_))
    }
}

/// Drives both extraction paths for every agent.
pub struct ExtractionOrchestrator {
    storage: Arc<dyn MemoryStorage>,
    model: Arc<dyn ModelInvoker>,
    index: Arc<HybridSearchIndex>,
    observer: Arc<dyn MemoryObserver>,
    resolver: ContradictionResolver,
    deduper: ProfileFactDeduper,
    graph: GraphUpserter,
    locks: AgentLocks,
    state: AgentProcessingState,
    model_id: String,
    max_tokens: u32,
    immediate_hint_limit: usize,
    batch_hint_limit: usize,
}

impl ExtractionOrchestrator {
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        model: Arc<dyn ModelInvoker>,
        index: Arc<HybridSearchIndex>,
        observer: Arc<dyn MemoryObserver>,
        memory: &MemoryConfig,
        model_config: &ModelConfig,
    ) -> Self {
        Self {
            resolver: ContradictionResolver::new(
                storage.clone(),
                index.clone(),
                observer.clone(),
                memory.contradiction_threshold,
            ),
            deduper: ProfileFactDeduper::new(
                storage.clone(),
                observer.clone(),
                memory.dedup_threshold,
            ),
            graph: GraphUpserter::new(storage.clone(), observer.clone()),
            storage,
            model,
            index,
            observer,
            locks: AgentLocks::new(),
            state: AgentProcessingState::new(),
            model_id: model_config.extraction_model.clone(),
            max_tokens: model_config.max_tokens,
            immediate_hint_limit: memory.immediate_hint_limit,
            batch_hint_limit: memory.batch_hint_limit,
        }
    }

    /// Batched-run status of one agent.
    pub fn processing_status(&self, agent_id: &str) -> ProcessingStatus {
        self.state.status(agent_id)
    }

    /// Extract from a single turn. Holds the agent's lock for the whole run.
    pub async fn run_immediate(
        &self,
        agent_id: &str,
        conversation_id: &str,
        signals: &[SignalType],
        user_message: &str,
        assistant_message: Option<&str>,
    ) -> ExtractionReport {
        if signals.is_empty() {
            return ExtractionReport::Skipped {
                reason: SkipReason::NoSignals,
            };
        }
        let task = TaskType::ImmediateExtraction;
        let started = Instant::now();
        let _lock = self.locks.lock(agent_id).await;

        let hints = match self
            .storage
            .load_active_entries(agent_id, Some(self.immediate_hint_limit))
            .await
        {
            Ok(hints) => hints,
            Err(e) => return self.abort(agent_id, task, "load_active_entries", &e),
        };
        let prompt = build_immediate_prompt(signals, user_message, assistant_message, &hints);

        let (extraction, tokens) = match self.invoke(agent_id, task, prompt, started).await {
            ModelOutcome::Parsed(extraction, tokens) => (Some(extraction), tokens),
            ModelOutcome::Unparseable(tokens) => (None, tokens),
            ModelOutcome::Failed(e) => return ExtractionReport::failed(&e),
        };

        let mut stats = ExtractionStats {
            signals: signals.len(),
            parse_failed: extraction.is_none(),
            ..Default::default()
        };
        if let Some(extraction) = &extraction {
            self.apply(agent_id, Some(conversation_id), extraction, &mut stats)
                .await;
        }
        self.finish(agent_id, task, &stats, tokens, started).await;
        ExtractionReport::Completed(stats)
    }

    /// Consolidate every pending signal of `agent_id`.
    ///
    /// A second call while one is running returns `Skipped` immediately. If
    /// the model is unavailable the signals stay pending for the next run.
    pub async fn run_batch(&self, agent_id: &str) -> ExtractionReport {
        let Some(_processing) = self.state.try_begin(agent_id) else {
            info!(agent_id, "batched extraction already running, skipping");
            self.observer.record(MemoryEvent::BatchSkipped {
                agent_id: agent_id.to_string(),
            });
            return ExtractionReport::Skipped {
                reason: SkipReason::AlreadyProcessing,
            };
        };
        let task = TaskType::BatchExtraction;
        let started = Instant::now();

        let signals = match self.storage.load_pending_signals(agent_id).await {
            Ok(signals) => signals,
            Err(e) => return self.abort(agent_id, task, "load_pending_signals", &e),
        };
        if signals.is_empty() {
            debug!(agent_id, "no pending signals");
            return ExtractionReport::Skipped {
                reason: SkipReason::NoPendingSignals,
            };
        }
        let hints = match self
            .storage
            .load_active_entries(agent_id, Some(self.batch_hint_limit))
            .await
        {
            Ok(hints) => hints,
            Err(e) => return self.abort(agent_id, task, "load_active_entries", &e),
        };
        let prompt = build_batch_prompt(&signals, &hints);

        let (extraction, tokens) = match self.invoke(agent_id, task, prompt, started).await {
            ModelOutcome::Parsed(extraction, tokens) => (Some(extraction), tokens),
            ModelOutcome::Unparseable(tokens) => (None, tokens),
            ModelOutcome::Failed(e) => return ExtractionReport::failed(&e),
        };

        let _lock = self.locks.lock(agent_id).await;
        let conversation_id = signals
            .last()
            .map(|s| s.conversation_id.clone())
            .unwrap_or_default();
        let mut stats = ExtractionStats {
            signals: signals.len(),
            parse_failed: extraction.is_none(),
            ..Default::default()
        };
        if let Some(extraction) = &extraction {
            self.apply(agent_id, Some(&conversation_id), extraction, &mut stats)
                .await;
            if let Some(summary) = &extraction.summary {
                stats.summary_stored = self
                    .store_summary(agent_id, &conversation_id, summary)
                    .await;
            }
        }
        self.mark_processed(&signals).await;
        self.finish(agent_id, task, &stats, tokens, started).await;
        ExtractionReport::Completed(stats)
    }

    /// Call the model and parse its answer. A failed call is logged and
    /// reported here; an unparseable answer counts as an empty extraction.
    async fn invoke(
        &self,
        agent_id: &str,
        task: TaskType,
        prompt: String,
        started: Instant,
    ) -> ModelOutcome {
        let input_tokens = estimate_tokens(EXTRACTION_SYSTEM_PROMPT) + estimate_tokens(&prompt);
        let request = GenerateRequest {
            model: self.model_id.clone(),
            prompt,
            system_prompt: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
        };

        let response = match self.model.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(agent_id, model = %self.model_id, error = %e, "extraction model call failed");
                self.observer.record(MemoryEvent::ExtractionFailed {
                    agent_id: agent_id.to_string(),
                    task,
                    error: e.to_string(),
                });
                self.append_log(
                    agent_id,
                    task,
                    LogStatus::Failed,
                    (input_tokens, 0),
                    started,
                    Some(e.to_string()),
                )
                .await;
                return ModelOutcome::Failed(e);
            }
        };
        let tokens = (input_tokens, estimate_tokens(&response));

        match parse_extraction(&response) {
            Ok(extraction) => ModelOutcome::Parsed(extraction, tokens),
            Err(e) => {
                warn!(
                    agent_id,
                    task = %task,
                    error = %e,
                    "extraction response could not be parsed"
                );
                self.observer.record(MemoryEvent::ParseFailed {
                    agent_id: agent_id.to_string(),
                    task,
                });
                ModelOutcome::Unparseable(tokens)
            }
        }
    }

    async fn apply(
        &self,
        agent_id: &str,
        conversation_id: Option<&str>,
        extraction: &Extraction,
        stats: &mut ExtractionStats,
    ) {
        if !extraction.entries.is_empty() {
            let mut active = match self.storage.load_active_entries(agent_id, None).await {
                Ok(active) => active,
                Err(e) => {
                    self.storage_failure("load_active_entries", &e);
                    Vec::new()
                }
            };
            let created_at = now_timestamp();
            for extracted in &extraction.entries {
                let entry = MemoryEntry {
                    id: Uuid::new_v4().to_string(),
                    agent_id: agent_id.to_string(),
                    entry_type: extracted.entry_type,
                    content: extracted.content.clone(),
                    confidence: extracted.confidence,
                    source_conversation_id: conversation_id.map(str::to_string),
                    tags: extracted.tags.clone(),
                    model: self.model_id.clone(),
                    superseded_by: None,
                    created_at: created_at.clone(),
                    last_accessed_at: None,
                    access_count: 0,
                };
                match self.resolver.resolve(entry, &mut active).await {
                    Ok(resolution) => {
                        stats.entries_added += 1;
                        stats.entries_superseded += resolution.superseded.len();
                    }
                    Err(e) => self.storage_failure("insert_entry", &e),
                }
            }
        }

        let dedup = self
            .deduper
            .add_facts(agent_id, &extraction.profile_facts, &self.model_id)
            .await;
        stats.facts_added = dedup.added;
        stats.facts_skipped = dedup.skipped;

        let graph = self
            .graph
            .upsert(
                &extraction.entities,
                &extraction.relationships,
                &self.model_id,
            )
            .await;
        stats.entities = graph.entities;
        stats.relationships = graph.relationships;
    }

    async fn store_summary(&self, agent_id: &str, conversation_id: &str, summary: &str) -> bool {
        let created_at = now_timestamp();
        let new = NewSummary {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
            summary: summary.to_string(),
            model: self.model_id.clone(),
            index_id: summary_document_id(agent_id, conversation_id, &created_at),
            created_at,
        };
        match self.storage.insert_summary(&new).await {
            Ok(stored) => {
                self.index.index_summary(&stored).await;
                true
            }
            Err(e) => {
                self.storage_failure("insert_summary", &e);
                false
            }
        }
    }

    async fn mark_processed(&self, signals: &[PendingSignal]) {
        let ids: Vec<i64> = signals.iter().map(|s| s.id).collect();
        if let Err(e) = self.storage.mark_signals_processed(&ids).await {
            self.storage_failure("mark_signals_processed", &e);
        }
    }

    async fn finish(
        &self,
        agent_id: &str,
        task: TaskType,
        stats: &ExtractionStats,
        tokens: (usize, usize),
        started: Instant,
    ) {
        let status = if stats.parse_failed {
            LogStatus::Empty
        } else {
            LogStatus::Success
        };
        self.append_log(agent_id, task, status, tokens, started, None)
            .await;
        info!(
            agent_id,
            task = %task,
            entries = stats.entries_added,
            superseded = stats.entries_superseded,
            facts = stats.facts_added,
            "extraction completed"
        );
        self.observer.record(MemoryEvent::ExtractionCompleted {
            agent_id: agent_id.to_string(),
            task,
            entries: stats.entries_added,
            facts: stats.facts_added,
            entities: stats.entities,
            relationships: stats.relationships,
        });
    }

    /// Report a storage failure that stops the run before the model is called.
    fn abort(
        &self,
        agent_id: &str,
        task: TaskType,
        operation: &str,
        error: &MnemaError,
    ) -> ExtractionReport {
        self.storage_failure(operation, error);
        self.observer.record(MemoryEvent::ExtractionFailed {
            agent_id: agent_id.to_string(),
            task,
            error: error.to_string(),
        });
        ExtractionReport::failed(error)
    }

    async fn append_log(
        &self,
        agent_id: &str,
        task_type: TaskType,
        status: LogStatus,
        (input_tokens, output_tokens): (usize, usize),
        started: Instant,
        detail: Option<String>,
    ) {
        let log = ProcessingLog {
            agent_id: agent_id.to_string(),
            task_type,
            status,
            model: Some(self.model_id.clone()),
            input_tokens,
            output_tokens,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            detail,
        };
        if let Err(e) = self.storage.append_processing_log(&log).await {
            self.storage_failure("append_processing_log", &e);
        }
    }

    fn storage_failure(&self, operation: &str, error: &MnemaError) {
        self.observer.record(MemoryEvent::StorageFailure {
            operation: operation.to_string(),
            error: error.to_string(),
        });
    }
}

enum ModelOutcome {
    Parsed(Extraction, (usize, usize)),
    Unparseable((usize, usize)),
    Failed(MnemaError),
}
