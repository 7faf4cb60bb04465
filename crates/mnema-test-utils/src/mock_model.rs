// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model invoker for deterministic testing.
//!
//! Responses are popped from a FIFO queue. When the queue is empty an empty
//! JSON object is returned, which parses as an empty extraction.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mnema_core::types::GenerateRequest;
use mnema_core::{MnemaError, ModelInvoker};

/// Response returned once the queue is drained.
pub const DEFAULT_RESPONSE: &str = "{}";

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct MockModel {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
    unavailable: Mutex<bool>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock pre-loaded with the given responses.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for response in responses {
            model.push_response(response);
        }
        model
    }

    /// Queue a response.
    pub fn push_response(&self, text: impl Into<String>) {
        guard(&self.responses).push_back(text.into());
    }

    /// When set, every call fails with `ModelUnavailable` and consumes nothing.
    pub fn set_unavailable(&self, unavailable: bool) {
        *guard(&self.unavailable) = unavailable;
    }

    /// Every request received, in order (including failed ones).
    pub fn requests(&self) -> Vec<GenerateRequest> {
        guard(&self.requests).clone()
    }

    /// Prompts of every request received, in order.
    pub fn prompts(&self) -> Vec<String> {
        guard(&self.requests)
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    /// Responses still queued.
    pub fn remaining(&self) -> usize {
        guard(&self.responses).len()
    }
}

#[async_trait]
impl ModelInvoker for MockModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String, MnemaError> {
        let model = request.model.clone();
        guard(&self.requests).push(request);
        if *guard(&self.unavailable) {
            return Err(MnemaError::ModelUnavailable { model });
        }
        Ok(guard(&self.responses)
            .pop_front()
            .unwrap_or_else(|| DEFAULT_RESPONSE.to_string()))
    }
}
