// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./mnema.toml` > `~/.config/mnema/mnema.toml` > `/etc/mnema/mnema.toml`
//! with environment variable overrides via `MNEMA_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MnemaConfig;

/// Top-level sections, used to map `MNEMA_SECTION_KEY` to `section.key`.
const SECTIONS: &[&str] = &[
    "logging", "storage", "index", "model", "memory", "search", "context",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mnema/mnema.toml` (system-wide)
/// 3. `~/.config/mnema/mnema.toml` (user XDG config)
/// 4. `./mnema.toml` (local directory)
/// 5. `MNEMA_*` environment variables
pub fn load_config() -> Result<MnemaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MnemaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MnemaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MnemaConfig::default()))
        .merge(Toml::file("/etc/mnema/mnema.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("mnema/mnema.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("mnema.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `MNEMA_MEMORY_DEDUP_THRESHOLD` must map to
/// `memory.dedup_threshold`, not `memory.dedup.threshold`.
fn env_provider() -> Env {
    Env::prefixed("MNEMA_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
