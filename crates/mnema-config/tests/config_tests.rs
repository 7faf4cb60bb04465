// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Mnema configuration system.

use mnema_config::diagnostic::ConfigError;
use mnema_config::model::MnemaConfig;
use mnema_config::{load_and_validate_str, load_config_from_str};

#[test]
fn valid_toml_deserializes_into_mnema_config() {
    let toml = r#"
[logging]
level = "debug"

[storage]
database_path = "/tmp/mnema-test.db"
wal_mode = false

[index]
enabled = false

[model]
extraction_model = "qwen2.5:7b"
profile_model = "qwen2.5:14b"
base_url = "http://localhost:8080/v1"
available_models = ["qwen2.5:7b", "qwen2.5:14b"]

[memory]
immediate_hint_limit = 10
profile_regeneration_threshold = 5

[search]
default_top_k = 8
mmr_lambda = 0.5

[context]
working_memory_budget_tokens = 250
summary_days = 3
"#;
    let config = load_and_validate_str(toml).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/mnema-test.db");
    assert!(!config.storage.wal_mode);
    assert!(!config.index.enabled);
    assert_eq!(config.model.available_models.len(), 2);
    assert_eq!(config.memory.immediate_hint_limit, 10);
    assert_eq!(config.memory.batch_hint_limit, 30);
    assert_eq!(config.search.default_top_k, 8);
    assert_eq!(config.context.working_memory_budget_tokens, 250);
    assert_eq!(config.context.summary_days, 3);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config, MnemaConfig::default());
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let toml = r#"
[search]
mmr_lamda = 0.5
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "mmr_lamda");
            assert_eq!(suggestion.as_deref(), Some("mmr_lambda"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "telegram"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[memory]\nbatch_hint_limit = \"many\"\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_violations_surface_after_parsing() {
    let toml = r#"
[memory]
contradiction_threshold = 2.0

[search]
max_graph_depth = 0
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}
