// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mnema memory subsystem.

use thiserror::Error;

/// The primary error type used across all Mnema collaborator traits and pipeline stages.
#[derive(Debug, Error)]
pub enum MnemaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable storage errors (connection, query failure, row decoding).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No text-generation backend can serve the requested model.
    #[error("model unavailable: {model}")]
    ModelUnavailable { model: String },

    /// A backend was reached but the generation call failed.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No parsing strategy produced valid, schema-matching JSON.
    #[error("parse failure: {0}")]
    Parse(String),

    /// The search index rejected or failed an operation.
    #[error("search index error: {message}")]
    SearchIndex {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemaError {
    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        MnemaError::Storage {
            source: source.into(),
        }
    }

    /// Build a search index failure from a message.
    pub fn search_index(message: impl Into<String>) -> Self {
        MnemaError::SearchIndex {
            message: message.into(),
            source: None,
        }
    }

    /// Short, stable label for the error kind (used in logs and metrics).
    pub fn kind(&self) -> &'static str {
        match self {
            MnemaError::Config(_) => "config",
            MnemaError::Storage { .. } => "storage",
            MnemaError::ModelUnavailable { .. } => "model_unavailable",
            MnemaError::Provider { .. } => "provider",
            MnemaError::Parse(_) => "parse",
            MnemaError::SearchIndex { .. } => "search_index",
            MnemaError::Internal(_) => "internal",
        }
    }
}
