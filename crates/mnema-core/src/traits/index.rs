// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search backend trait (hybrid semantic + lexical, or lexical only).

use async_trait::async_trait;

use crate::error::MnemaError;
use crate::types::SearchHit;

/// A document search backend.
///
/// Any call may fail; callers treat a failure as "index unavailable for this
/// operation" and never as fatal.
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Prepares the backend. A failure here marks the index unavailable.
    async fn initialize(&self) -> Result<(), MnemaError>;

    /// Adds (or replaces) one document under `id`.
    async fn add_document(&self, text: &str, id: &str) -> Result<(), MnemaError>;

    /// Adds (or replaces) many documents; `texts` and `ids` are parallel.
    async fn add_documents(&self, texts: &[String], ids: &[String]) -> Result<(), MnemaError>;

    /// Returns up to `k` hits scoring at least `threshold`, best first.
    async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>, MnemaError>;

    /// Removes documents by id. Unknown ids are ignored.
    async fn delete_documents(&self, ids: &[String]) -> Result<(), MnemaError>;

    /// Drops every indexed document.
    async fn reset(&self) -> Result<(), MnemaError>;
}
