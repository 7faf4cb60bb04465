// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnema integration tests.
//!
//! Provides collaborator doubles and a storage harness for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockModel`] - model invoker with canned responses and prompt capture
//! - [`MockVectorIndex`] - in-memory search backend with switchable failure
//! - [`RecordingObserver`] - observer that keeps every event for assertions
//! - [`TestHarness`] - migrated SQLite storage in a temp directory

pub mod harness;
pub mod mock_index;
pub mod mock_model;
pub mod observer;

pub use harness::TestHarness;
pub use mock_index::MockVectorIndex;
pub use mock_model::MockModel;
pub use observer::RecordingObserver;
