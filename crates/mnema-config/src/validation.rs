// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as ratio ranges, non-empty paths, and positive counts.

use crate::diagnostic::ConfigError;
use crate::model::MnemaConfig;

/// Longest summary window accepted, in days.
pub const MAX_SUMMARY_DAYS: i64 = 36_500;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MnemaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if let Some(path) = &config.index.database_path
        && path.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "index.database_path must not be empty when set".to_string(),
        });
    }

    for (key, value) in [
        ("model.extraction_model", &config.model.extraction_model),
        ("model.profile_model", &config.model.profile_model),
        ("model.base_url", &config.model.base_url),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    for (key, value) in [
        (
            "memory.contradiction_threshold",
            config.memory.contradiction_threshold,
        ),
        ("memory.dedup_threshold", config.memory.dedup_threshold),
        ("search.mmr_lambda", config.search.mmr_lambda),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be between 0.0 and 1.0, got {value}"),
            });
        }
    }

    if config.memory.profile_regeneration_threshold < 1 {
        errors.push(ConfigError::Validation {
            message: "memory.profile_regeneration_threshold must be at least 1".to_string(),
        });
    }

    if config.search.fetch_multiplier < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "search.fetch_multiplier must be at least 1, got {}",
                config.search.fetch_multiplier
            ),
        });
    }

    if config.search.default_top_k < 1 {
        errors.push(ConfigError::Validation {
            message: "search.default_top_k must be at least 1".to_string(),
        });
    }

    if !(1..=5).contains(&config.search.max_graph_depth) {
        errors.push(ConfigError::Validation {
            message: format!(
                "search.max_graph_depth must be between 1 and 5, got {}",
                config.search.max_graph_depth
            ),
        });
    }

    if !(0..=MAX_SUMMARY_DAYS).contains(&config.context.summary_days) {
        errors.push(ConfigError::Validation {
            message: format!(
                "context.summary_days must be between 0 and {MAX_SUMMARY_DAYS}, got {}",
                config.context.summary_days
            ),
        });
    }

    if config.model.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "model.timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
