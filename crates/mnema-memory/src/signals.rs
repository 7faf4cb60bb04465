// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of extraction triggers.

use std::sync::Arc;

use mnema_core::types::NewSignal;
use mnema_core::{MemoryEvent, MemoryObserver, MemoryStorage, SignalType};
use tracing::debug;

/// Writes one pending signal per detected signal type.
pub struct SignalIngestor {
    storage: Arc<dyn MemoryStorage>,
    observer: Arc<dyn MemoryObserver>,
}

impl SignalIngestor {
    pub fn new(storage: Arc<dyn MemoryStorage>, observer: Arc<dyn MemoryObserver>) -> Self {
        Self { storage, observer }
    }

    /// Persist the turn once per distinct signal type. A failed insert is
    /// reported and the remaining types are still written. Returns how many
    /// signals were stored.
    pub async fn ingest(
        &self,
        agent_id: &str,
        conversation_id: &str,
        signals: &[SignalType],
        user_message: &str,
        assistant_message: Option<&str>,
    ) -> usize {
        let mut stored = 0;
        let mut seen = Vec::with_capacity(signals.len());
        for &signal_type in signals {
            if seen.contains(&signal_type) {
                continue;
            }
            seen.push(signal_type);

            let signal = NewSignal {
                agent_id: agent_id.to_string(),
                conversation_id: conversation_id.to_string(),
                signal_type,
                user_message: user_message.to_string(),
                assistant_message: assistant_message.map(str::to_string),
            };
            match self.storage.insert_signal(&signal).await {
                Ok(id) => {
                    debug!(agent_id, signal_id = id, signal = %signal_type, "signal stored");
                    stored += 1;
                }
                Err(e) => self.observer.record(MemoryEvent::StorageFailure {
                    operation: "insert_signal".to_string(),
                    error: e.to_string(),
                }),
            }
        }
        stored
    }
}
