// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-agent serialization and batched-run status.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mnema_core::ProcessingStatus;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per agent. Every mutation path for an agent holds its lock;
/// different agents never contend.
#[derive(Default)]
pub struct AgentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AgentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `agent_id`.
    pub async fn lock(&self, agent_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = self
            .locks
            .entry(agent_id.to_string())
            .or_default()
            .clone();
        mutex.lock_owned().await
    }
}

/// Map from agent id to batched-extraction status.
#[derive(Default)]
pub struct AgentProcessingState {
    states: DashMap<String, ProcessingStatus>,
}

impl AgentProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically flip `agent_id` from idle to processing.
    ///
    /// Returns `None` if a run is already active. The returned guard restores
    /// idle when dropped, on every exit path.
    pub fn try_begin<'a>(&'a self, agent_id: &str) -> Option<ProcessingGuard<'a>> {
        match self.states.entry(agent_id.to_string()) {
            Entry::Occupied(mut slot) => {
                if *slot.get() == ProcessingStatus::Processing {
                    return None;
                }
                slot.insert(ProcessingStatus::Processing);
            }
            Entry::Vacant(slot) => {
                slot.insert(ProcessingStatus::Processing);
            }
        }
        Some(ProcessingGuard {
            states: &self.states,
            agent_id: agent_id.to_string(),
        })
    }

    /// Current status of `agent_id` (idle if never seen).
    pub fn status(&self, agent_id: &str) -> ProcessingStatus {
        self.states
            .get(agent_id)
            .map(|s| *s)
            .unwrap_or(ProcessingStatus::Idle)
    }
}

/// Marks an agent as processing for as long as it lives.
pub struct ProcessingGuard<'a> {
    states: &'a DashMap<String, ProcessingStatus>,
    agent_id: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.states
            .insert(self.agent_id.clone(), ProcessingStatus::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_refused_until_guard_drops() {
        let state = AgentProcessingState::new();
        let guard = state.try_begin("a").unwrap();
        assert_eq!(state.status("a"), ProcessingStatus::Processing);
        assert!(state.try_begin("a").is_none());
        assert!(state.try_begin("b").is_some(), "other agents are independent");

        drop(guard);
        assert_eq!(state.status("a"), ProcessingStatus::Idle);
        assert!(state.try_begin("a").is_some());
    }

    #[test]
    fn guard_restores_idle_on_panic() {
        let state = AgentProcessingState::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = state.try_begin("a").unwrap();
            panic!("run failed");
        }));
        assert!(result.is_err());
        assert_eq!(state.status("a"), ProcessingStatus::Idle);
    }

    #[tokio::test]
    async fn agent_locks_serialize_one_agent_only() {
        let locks = AgentLocks::new();
        let held = locks.lock("a").await;
        // A different agent is not blocked.
        let _b = locks.lock("b").await;
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), locks.lock("a"));
        assert!(pending.await.is_err());
        drop(held);
        let _a = locks.lock("a").await;
    }
}
