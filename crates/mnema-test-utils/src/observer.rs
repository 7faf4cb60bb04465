// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer that records events for assertions.

use std::sync::{Mutex, MutexGuard};

use mnema_core::{MemoryEvent, MemoryObserver};

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<MemoryEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<MemoryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every event recorded so far, in order.
    pub fn events(&self) -> Vec<MemoryEvent> {
        self.guard().clone()
    }

    /// Number of recorded events with the given [`MemoryEvent::name`].
    pub fn count(&self, name: &str) -> usize {
        self.guard().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}

impl MemoryObserver for RecordingObserver {
    fn record(&self, event: MemoryEvent) {
        tracing::debug!(event = event.name(), "recorded");
        self.guard().push(event);
    }
}
