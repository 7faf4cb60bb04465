// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer trait for structured pipeline events.

use crate::types::MemoryEvent;

/// Receives typed events from the memory pipeline.
///
/// Recording must not fail or block; implementations log, count, or buffer.
pub trait MemoryObserver: Send + Sync + 'static {
    /// Records one event.
    fn record(&self, event: MemoryEvent);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MemoryObserver for NoopObserver {
    fn record(&self, _event: MemoryEvent) {}
}
