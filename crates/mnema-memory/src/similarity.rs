// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-set Jaccard similarity.
//!
//! Used by contradiction detection, profile fact deduplication and MMR. Texts
//! are lower-cased and split on whitespace; punctuation is kept, so "mode."
//! and "mode" are distinct tokens.

use std::collections::HashSet;

/// Lower-cased whitespace tokens of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard similarity of two token sets. Two empty sets score 0.0.
pub fn jaccard_sets(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Jaccard similarity of the token sets of two texts.
pub fn jaccard(a: &str, b: &str) -> f64 {
    jaccard_sets(&token_set(a), &token_set(b))
}
