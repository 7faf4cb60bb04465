// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnema agent memory subsystem.
//!
//! This crate provides the error type, domain types, and the collaborator
//! traits (storage, search index, model invoker, observer) that the memory
//! pipeline is built against. Concrete collaborators live in other crates.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemaError;
pub use types::{
    EntryType, MemoryEntry, MemoryEvent, ProcessingStatus, ProfileEventKind, SignalType,
};

// Re-export all collaborator traits at crate root.
pub use traits::{MemoryObserver, MemoryStorage, ModelInvoker, NoopObserver, VectorIndex};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnema_error_has_all_variants() {
        let errors = [
            MnemaError::Config("test".into()),
            MnemaError::storage(std::io::Error::other("test")),
            MnemaError::ModelUnavailable {
                model: "m".into(),
            },
            MnemaError::Provider {
                message: "test".into(),
                source: None,
            },
            MnemaError::Parse("test".into()),
            MnemaError::search_index("test"),
            MnemaError::Internal("test".into()),
        ];
        let kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            [
                "config",
                "storage",
                "model_unavailable",
                "provider",
                "parse",
                "search_index",
                "internal"
            ]
        );
    }

    #[test]
    fn model_unavailable_names_the_model() {
        let err = MnemaError::ModelUnavailable {
            model: "llama-3".into(),
        };
        assert_eq!(err.to_string(), "model unavailable: llama-3");
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _storage(_: &dyn MemoryStorage) {}
        fn _index(_: &dyn VectorIndex) {}
        fn _model(_: &dyn ModelInvoker) {}
        fn _observer(_: &dyn MemoryObserver) {}
    }

    #[test]
    fn noop_observer_accepts_events() {
        NoopObserver.record(MemoryEvent::BatchSkipped {
            agent_id: "a".into(),
        });
    }
}
