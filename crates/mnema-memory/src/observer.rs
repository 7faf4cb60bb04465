// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default observer: structured logs plus event counters.

use metrics::describe_counter;
use mnema_core::{MemoryEvent, MemoryObserver};
use tracing::{debug, info, warn};

/// Name of the counter incremented for every pipeline event.
pub const EVENTS_COUNTER: &str = "mnema_memory_events_total";

/// Register metric descriptions. Call once after a recorder is installed.
pub fn register_metrics() {
    describe_counter!(EVENTS_COUNTER, "Memory pipeline events by kind");
}

/// Logs every [`MemoryEvent`] through `tracing` and counts it with `metrics`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl MemoryObserver for TracingObserver {
    fn record(&self, event: MemoryEvent) {
        metrics::counter!(EVENTS_COUNTER, "event" => event.name()).increment(1);

        match event {
            MemoryEvent::ExtractionCompleted {
                agent_id,
                task,
                entries,
                facts,
                entities,
                relationships,
            } => info!(
                agent_id = %agent_id,
                task = %task,
                entries,
                facts,
                entities,
                relationships,
                "extraction completed"
            ),
            MemoryEvent::ExtractionFailed {
                agent_id,
                task,
                error,
            } => warn!(agent_id = %agent_id, task = %task, error = %error, "extraction failed"),
            MemoryEvent::ParseFailed { agent_id, task } => {
                warn!(agent_id = %agent_id, task = %task, "no parse strategy matched model output")
            }
            MemoryEvent::EntrySuperseded {
                agent_id,
                old_id,
                new_id,
                similarity,
            } => debug!(
                agent_id = %agent_id,
                old_id = %old_id,
                new_id = %new_id,
                similarity,
                "entry superseded"
            ),
            MemoryEvent::FactSkipped {
                agent_id,
                content,
                similarity,
            } => debug!(
                agent_id = %agent_id,
                content = %content,
                similarity,
                "duplicate profile fact skipped"
            ),
            MemoryEvent::ProfileRegenerated {
                version,
                contributions,
            } => info!(version, contributions, "profile regenerated"),
            MemoryEvent::BatchSkipped { agent_id } => {
                debug!(agent_id = %agent_id, "batched extraction already running")
            }
            MemoryEvent::IndexFailure { operation, error } => {
                warn!(operation = %operation, error = %error, "search index operation failed")
            }
            MemoryEvent::SearchFallback { scope, reason } => {
                warn!(scope = %scope, reason = %reason, "falling back to text search")
            }
            MemoryEvent::StorageFailure { operation, error } => {
                warn!(operation = %operation, error = %error, "storage operation failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn superseded_entries_are_logged_with_ids() {
        TracingObserver.record(MemoryEvent::EntrySuperseded {
            agent_id: "coder".into(),
            old_id: "e-old".into(),
            new_id: "e-new".into(),
            similarity: 0.42,
        });
        assert!(logs_contain("entry superseded"));
        assert!(logs_contain("e-old"));
        assert!(logs_contain("e-new"));
    }

    #[test]
    #[traced_test]
    fn search_fallback_logs_a_warning() {
        TracingObserver.record(MemoryEvent::SearchFallback {
            scope: "entries".into(),
            reason: "index unavailable".into(),
        });
        assert!(logs_contain("WARN"));
        assert!(logs_contain("falling back to text search"));
    }

    #[test]
    #[traced_test]
    fn profile_regeneration_is_logged() {
        register_metrics();
        TracingObserver.record(MemoryEvent::ProfileRegenerated {
            version: 4,
            contributions: 3,
        });
        assert!(logs_contain("profile regenerated"));
        assert!(logs_contain("version=4"));
    }
}
