// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnema memory subsystem.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Mnema configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemaConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Durable storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Search index backend settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Text-generation backend settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Extraction, contradiction and profile settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Retrieval and reranking settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Context block budgets.
    #[serde(default)]
    pub context: ContextConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("mnema").join("mnema.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mnema.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Search index backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// When false, every search uses the plain-text fallback.
    #[serde(default = "default_index_enabled")]
    pub enabled: bool,

    /// Separate database file for the index. Defaults to the storage database.
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: default_index_enabled(),
            database_path: None,
        }
    }
}

fn default_index_enabled() -> bool {
    true
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Model used for entry/fact/graph extraction.
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// Model used for profile regeneration.
    #[serde(default = "default_profile_model")]
    pub profile_model: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key sent as a bearer token, if the backend needs one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Models the backend is known to serve. Empty means "ask the backend".
    #[serde(default)]
    pub available_models: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum tokens requested per generation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            extraction_model: default_extraction_model(),
            profile_model: default_profile_model(),
            base_url: default_base_url(),
            api_key: None,
            available_models: Vec::new(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_extraction_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_profile_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    2048
}

/// Extraction, contradiction and profile configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Active entries shown to the model as dedup hints on the immediate path.
    #[serde(default = "default_immediate_hint_limit")]
    pub immediate_hint_limit: usize,

    /// Active entries shown to the model as dedup hints on the batched path.
    #[serde(default = "default_batch_hint_limit")]
    pub batch_hint_limit: usize,

    /// Word-overlap similarity above which a same-type entry is superseded.
    #[serde(default = "default_contradiction_threshold")]
    pub contradiction_threshold: f64,

    /// Word-overlap similarity above which a profile fact is a duplicate.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,

    /// Unincorporated contributions needed to regenerate an existing profile.
    #[serde(default = "default_profile_regeneration_threshold")]
    pub profile_regeneration_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            immediate_hint_limit: default_immediate_hint_limit(),
            batch_hint_limit: default_batch_hint_limit(),
            contradiction_threshold: default_contradiction_threshold(),
            dedup_threshold: default_dedup_threshold(),
            profile_regeneration_threshold: default_profile_regeneration_threshold(),
        }
    }
}

fn default_immediate_hint_limit() -> usize {
    20
}

fn default_batch_hint_limit() -> usize {
    30
}

fn default_contradiction_threshold() -> f64 {
    0.3
}

fn default_dedup_threshold() -> f64 {
    0.6
}

fn default_profile_regeneration_threshold() -> usize {
    3
}

/// Retrieval and reranking configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Results returned when the caller does not specify `top_k`.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f64,

    /// Over-fetch factor applied before reranking.
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,

    /// Minimum backend score for a hit to be considered.
    #[serde(default)]
    pub similarity_threshold: f32,

    /// Upper bound on graph traversal depth.
    #[serde(default = "default_max_graph_depth")]
    pub max_graph_depth: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            mmr_lambda: default_mmr_lambda(),
            fetch_multiplier: default_fetch_multiplier(),
            similarity_threshold: 0.0,
            max_graph_depth: default_max_graph_depth(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_mmr_lambda() -> f64 {
    0.7
}

fn default_fetch_multiplier() -> usize {
    2
}

fn default_max_graph_depth() -> usize {
    3
}

/// Token budgets for the assembled context block.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Budget for the working memory section.
    #[serde(default = "default_working_memory_budget_tokens")]
    pub working_memory_budget_tokens: usize,

    /// Budget for the conversation summaries section.
    #[serde(default = "default_summary_budget_tokens")]
    pub summary_budget_tokens: usize,

    /// Budget for the key relationships section.
    #[serde(default = "default_graph_budget_tokens")]
    pub graph_budget_tokens: usize,

    /// How many days of summaries are eligible.
    #[serde(default = "default_summary_days")]
    pub summary_days: i64,

    /// How many recent graph edges are eligible.
    #[serde(default = "default_max_relationships")]
    pub max_relationships: usize,

    /// How many active entries are eligible.
    #[serde(default = "default_max_working_entries")]
    pub max_working_entries: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            working_memory_budget_tokens: default_working_memory_budget_tokens(),
            summary_budget_tokens: default_summary_budget_tokens(),
            graph_budget_tokens: default_graph_budget_tokens(),
            summary_days: default_summary_days(),
            max_relationships: default_max_relationships(),
            max_working_entries: default_max_working_entries(),
        }
    }
}

fn default_working_memory_budget_tokens() -> usize {
    500
}

fn default_summary_budget_tokens() -> usize {
    300
}

fn default_graph_budget_tokens() -> usize {
    200
}

fn default_summary_days() -> i64 {
    7
}

fn default_max_relationships() -> usize {
    20
}

fn default_max_working_entries() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MnemaConfig::default();
        assert_eq!(config.memory.immediate_hint_limit, 20);
        assert_eq!(config.memory.batch_hint_limit, 30);
        assert!((config.memory.contradiction_threshold - 0.3).abs() < f64::EPSILON);
        assert!((config.memory.dedup_threshold - 0.6).abs() < f64::EPSILON);
        assert!((config.search.mmr_lambda - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.search.fetch_multiplier, 2);
        assert!(config.index.enabled);
        assert!(config.storage.database_path.ends_with("mnema.db"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: MnemaConfig = toml::from_str(
            r#"
[memory]
dedup_threshold = 0.75
"#,
        )
        .unwrap();
        assert!((config.memory.dedup_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.memory.profile_regeneration_threshold, 3);
        assert_eq!(config.context, ContextConfig::default());
    }
}
