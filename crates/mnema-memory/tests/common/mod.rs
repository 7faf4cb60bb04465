// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;

use mnema_config::MnemaConfig;
use mnema_memory::{HybridSearchIndex, MemoryService};
use mnema_test_utils::{MockModel, MockVectorIndex, RecordingObserver, TestHarness};

pub const AGENT: &str = "agent-1";
pub const CONVERSATION: &str = "conv-1";

pub struct Fixture {
    pub harness: TestHarness,
    pub model: Arc<MockModel>,
    pub backend: Arc<MockVectorIndex>,
    pub observer: Arc<RecordingObserver>,
    pub service: MemoryService,
}

pub async fn fixture() -> Fixture {
    fixture_with(MnemaConfig::default(), MockVectorIndex::new()).await
}

pub async fn fixture_with(config: MnemaConfig, backend: MockVectorIndex) -> Fixture {
    let harness = TestHarness::new().await;
    let model = Arc::new(MockModel::new());
    let backend = Arc::new(backend);
    let observer = Arc::new(RecordingObserver::new());
    let index =
        Arc::new(HybridSearchIndex::connect(Some(backend.clone()), observer.clone()).await);
    let service = MemoryService::new(
        harness.storage(),
        model.clone(),
        index,
        observer.clone(),
        &config,
    );
    Fixture {
        harness,
        model,
        backend,
        observer,
        service,
    }
}

/// Extraction response with one entry of the given type.
pub fn entry_response(entry_type: &str, content: &str) -> String {
    serde_json::json!({
        "entries": [{"type": entry_type, "content": content, "confidence": 0.9, "tags": []}]
    })
    .to_string()
}

/// Extraction response with only profile facts.
pub fn facts_response(facts: &[&str]) -> String {
    serde_json::json!({ "profile_facts": facts }).to_string()
}
