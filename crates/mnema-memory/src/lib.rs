// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory pipeline for conversational agents.
//!
//! Turns conversation signals into typed memory entries, a versioned user
//! profile, a knowledge graph and conversation summaries, and turns those
//! back into a budgeted context block and searchable results.
//!
//! ## Architecture
//!
//! - **SignalIngestor**: persists extraction triggers
//! - **ExtractionOrchestrator**: immediate and batched extraction runs
//! - **ContradictionResolver**: supersedes contradicted entries
//! - **ProfileFactDeduper / ProfileRegenerator**: profile maintenance
//! - **GraphUpserter**: entity and relationship upserts
//! - **HybridSearchIndex / MemorySearch**: indexed search with MMR and text fallback
//! - **ContextAssembler**: budgeted context block
//! - **MemoryService**: facade over all of the above
//!
//! Collaborators (storage, search backend, model, observer) are passed in
//! explicitly; see the traits in `mnema-core`.

pub mod context;
pub mod contradiction;
pub mod extraction;
pub mod graph;
pub mod observer;
pub mod profile;
pub mod search;
pub mod service;
pub mod signals;
pub mod similarity;
pub mod state;

pub use context::ContextAssembler;
pub use contradiction::ContradictionResolver;
pub use extraction::{ExtractionOrchestrator, ExtractionReport, ExtractionStats, SkipReason};
pub use graph::GraphUpserter;
pub use observer::TracingObserver;
pub use profile::{ProfileFactDeduper, ProfileRegenerator, RegenerationOutcome};
pub use search::{HybridSearchIndex, MemorySearch, SearchOptions, SearchOutcome};
pub use service::{MemoryService, ProcessingReport, StatusReport, SyncReport};
pub use signals::SignalIngestor;
