// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on memory entities.

pub mod chunks;
pub mod entries;
pub mod graph;
pub mod logs;
pub mod profile;
pub mod signals;
pub mod summaries;

use std::str::FromStr;

/// Parse a TEXT column into a strum-backed enum, surfacing bad values as a
/// conversion failure on that column.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
