// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The memory pipeline only talks to its environment through these traits,
//! so every component can be built with test doubles. All async traits use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod index;
pub mod model;
pub mod observability;
pub mod storage;

pub use index::VectorIndex;
pub use model::ModelInvoker;
pub use observability::{MemoryObserver, NoopObserver};
pub use storage::MemoryStorage;
