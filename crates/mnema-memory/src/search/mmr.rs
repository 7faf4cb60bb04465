// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maximal Marginal Relevance reranking.
//!
//! Greedily picks the candidate maximizing
//! `λ·relevance − (1−λ)·max_similarity_to_selected`, where relevance is the
//! min-max normalized backend score and similarity is token-set Jaccard.

use std::collections::HashSet;

use serde::Serialize;

use crate::similarity::{jaccard_sets, token_set};

/// A search result awaiting reranking.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub item: T,
    pub score: f64,
    pub text: String,
}

/// A reranked result with its normalized relevance and MMR score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    pub item: T,
    pub relevance: f64,
    pub mmr_score: f64,
}

/// Min-max normalize to [0, 1]. A zero-range set normalizes to all 1.0.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Select up to `k` candidates in MMR order.
pub fn rerank<T>(candidates: Vec<Candidate<T>>, k: usize, lambda: f64) -> Vec<Ranked<T>> {
    if candidates.is_empty() || k == 0 {
        return vec![];
    }

    let scores: Vec<f64> = candidates.iter().map(|c| c.score).collect();
    let relevance = normalize_scores(&scores);
    let tokens: Vec<HashSet<String>> = candidates.iter().map(|c| token_set(&c.text)).collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut order: Vec<(usize, f64)> = Vec::with_capacity(k.min(candidates.len()));

    while order.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let max_sim = order
                .iter()
                .map(|&(chosen, _)| jaccard_sets(&tokens[idx], &tokens[chosen]))
                .fold(0.0, f64::max);
            let score = lambda * relevance[idx] - (1.0 - lambda) * max_sim;
            // Strict comparison keeps the earlier (higher-ranked) candidate on ties.
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((pos, score));
            }
        }
        let Some((pos, score)) = best else { break };
        order.push((remaining.remove(pos), score));
    }

    let mut slots: Vec<Option<Candidate<T>>> = candidates.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|(idx, mmr_score)| {
            slots[idx].take().map(|c| Ranked {
                item: c.item,
                relevance: relevance[idx],
                mmr_score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(id: &'static str, score: f64, text: &str) -> Candidate<&'static str> {
        Candidate {
            item: id,
            score,
            text: text.to_string(),
        }
    }

    #[test]
    fn distinct_candidate_beats_near_duplicate() {
        let candidates = vec![
            candidate("dup1", 1.0, "user prefers dark mode in the editor"),
            candidate("dup2", 0.95, "user prefers dark mode in the editor"),
            candidate("distinct", 0.5, "meeting with Dana on friday"),
        ];
        let ranked = rerank(candidates, 2, 0.5);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(ids, ["dup1", "distinct"]);
    }

    #[test]
    fn pure_relevance_keeps_score_order() {
        let candidates = vec![
            candidate("b", 0.4, "same words"),
            candidate("a", 0.9, "same words"),
            candidate("c", 0.1, "same words"),
        ];
        let ranked = rerank(candidates, 3, 1.0);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn degenerate_scores_normalize_to_one() {
        assert_eq!(normalize_scores(&[0.3, 0.3]), vec![1.0, 1.0]);
        assert_eq!(normalize_scores(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn first_pick_has_no_diversity_penalty() {
        let ranked = rerank(vec![candidate("only", 5.0, "text")], 3, 0.7);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].mmr_score - 0.7).abs() < 1e-9);
        assert!((ranked[0].relevance - 1.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn selects_min_of_k_and_candidates_without_repeats(
            scores in proptest::collection::vec(0.0f64..10.0, 0..12),
            k in 0usize..15,
            lambda in 0.0f64..=1.0,
        ) {
            let candidates: Vec<Candidate<usize>> = scores
                .iter()
                .enumerate()
                .map(|(i, &score)| Candidate {
                    item: i,
                    score,
                    text: format!("word{} shared", i % 3),
                })
                .collect();
            let ranked = rerank(candidates, k, lambda);
            prop_assert_eq!(ranked.len(), k.min(scores.len()));
            let unique: HashSet<usize> = ranked.iter().map(|r| r.item).collect();
            prop_assert_eq!(unique.len(), ranked.len());
            for r in &ranked {
                prop_assert!((0.0..=1.0).contains(&r.relevance));
            }
        }
    }
}
