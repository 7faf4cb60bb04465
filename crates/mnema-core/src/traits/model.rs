// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model invoker trait for text-generation backends.

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::types::GenerateRequest;

/// Routes a prompt to some text-generation backend.
///
/// Implementations fail with [`MnemaError::ModelUnavailable`] when no backend
/// can serve `request.model`. Timeout policy, if any, belongs here.
#[async_trait]
pub trait ModelInvoker: Send + Sync + 'static {
    /// Generates a completion and returns the raw response text.
    async fn generate(&self, request: GenerateRequest) -> Result<String, MnemaError>;
}
