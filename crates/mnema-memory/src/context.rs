// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budgeted context block assembly.
//!
//! Sections appear in a fixed order and are separated by a blank line. User
//! overrides and the profile are never trimmed; working memory, summaries and
//! relationships are trimmed to a character budget (`tokens × 4`) by keeping
//! the longest prefix of lines that fits. Empty sections are omitted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mnema_config::model::ContextConfig;
use mnema_core::types::{CHARS_PER_TOKEN, GraphEdge, MemoryEntry};
use mnema_core::{MemoryEvent, MemoryObserver, MemoryStorage, MnemaError};

const OVERRIDES_HEADER: &str = "## User Overrides";
const PROFILE_HEADER: &str = "## User Profile";
const WORKING_MEMORY_HEADER: &str = "## Working Memory";
const SUMMARIES_HEADER: &str = "## Conversation Summaries";
const RELATIONSHIPS_HEADER: &str = "## Key Relationships";

/// Lower bound used when the summary window reaches past representable time.
const EARLIEST_TIMESTAMP: &str = "0000-01-01T00:00:00.000Z";

/// Longest prefix of `lines` whose newline-joined length stays within
/// `budget_tokens × 4` characters. Stops at the first line that would
/// overflow; never reorders, skips ahead or truncates a line.
pub fn trim_to_budget(lines: &[String], budget_tokens: usize) -> Vec<String> {
    trim_to_chars(lines, budget_tokens.saturating_mul(CHARS_PER_TOKEN))
}

/// Like [`trim_to_budget`], but the budget also pays for the section header
/// and its newline, so the rendered section fits in `budget_tokens × 4`.
pub fn trim_section(header: &str, lines: &[String], budget_tokens: usize) -> Vec<String> {
    let budget = budget_tokens
        .saturating_mul(CHARS_PER_TOKEN)
        .saturating_sub(header.chars().count() + 1);
    trim_to_chars(lines, budget)
}

fn trim_to_chars(lines: &[String], budget: usize) -> Vec<String> {
    let mut used = 0usize;
    let mut kept = Vec::new();
    for line in lines {
        let separator = usize::from(!kept.is_empty());
        let cost = separator + line.chars().count();
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line.clone());
    }
    kept
}

fn render_section(header: &str, lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    Some(format!("{header}\n{}", lines.join("\n")))
}

/// Start of the summary window, `days` back from now. A window too large to
/// represent covers every summary.
fn summary_window_start(days: i64) -> String {
    Duration::try_days(days)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .map(|since| since.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| EARLIEST_TIMESTAMP.to_string())
}

fn entry_line(entry: &MemoryEntry) -> String {
    format!("- [{}] {}", entry.entry_type, entry.content)
}

fn edge_line(edge: &GraphEdge) -> String {
    format!("- {} {} {}", edge.source, edge.relation, edge.target)
}

/// Builds the memory block injected into an agent's prompt.
pub struct ContextAssembler {
    storage: Arc<dyn MemoryStorage>,
    observer: Arc<dyn MemoryObserver>,
}

impl ContextAssembler {
    pub fn new(storage: Arc<dyn MemoryStorage>, observer: Arc<dyn MemoryObserver>) -> Self {
        Self { storage, observer }
    }

    /// Assemble the context block for `agent_id`. Returns an empty string
    /// when there is nothing to inject.
    pub async fn assemble(
        &self,
        agent_id: &str,
        config: &ContextConfig,
    ) -> Result<String, MnemaError> {
        let mut sections = Vec::new();

        let overrides: Vec<String> = self
            .storage
            .load_user_edits()
            .await?
            .into_iter()
            .map(|edit| format!("- {}", edit.content.trim()))
            .collect();
        sections.extend(render_section(OVERRIDES_HEADER, &overrides));

        if let Some(profile) = self.storage.load_current_profile().await?
            && !profile.content.trim().is_empty()
        {
            sections.push(format!("{PROFILE_HEADER}\n{}", profile.content.trim()));
        }

        let entries = self
            .storage
            .load_active_entries(agent_id, Some(config.max_working_entries))
            .await?;
        let entry_lines: Vec<String> = entries.iter().map(entry_line).collect();
        let kept = trim_section(
            WORKING_MEMORY_HEADER,
            &entry_lines,
            config.working_memory_budget_tokens,
        );
        if !kept.is_empty() {
            let included: Vec<String> = entries[..kept.len()]
                .iter()
                .map(|e| e.id.clone())
                .collect();
            if let Err(e) = self.storage.touch_entries(&included).await {
                self.observer.record(MemoryEvent::StorageFailure {
                    operation: "touch_entries".to_string(),
                    error: e.to_string(),
                });
            }
        }
        sections.extend(render_section(WORKING_MEMORY_HEADER, &kept));

        let since = summary_window_start(config.summary_days);
        let summary_lines: Vec<String> = self
            .storage
            .load_summaries_since(agent_id, &since)
            .await?
            .iter()
            .map(|s| {
                let day = s.created_at.get(..10).unwrap_or(&s.created_at);
                format!("- {day}: {}", s.summary.trim())
            })
            .collect();
        let kept = trim_section(SUMMARIES_HEADER, &summary_lines, config.summary_budget_tokens);
        sections.extend(render_section(SUMMARIES_HEADER, &kept));

        let edge_lines: Vec<String> = self
            .storage
            .load_recent_edges(config.max_relationships)
            .await?
            .iter()
            .map(edge_line)
            .collect();
        let kept = trim_section(RELATIONSHIPS_HEADER, &edge_lines, config.graph_budget_tokens);
        sections.extend(render_section(RELATIONSHIPS_HEADER, &kept));

        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn budget_stops_at_first_overflow() {
        // Budget 3 tokens = 12 chars: "aaaa" (4) + "\nbbbb" (5) = 9, next "\ncccc" would be 14.
        let kept = trim_to_budget(&lines(&["aaaa", "bbbb", "cccc", "d"]), 3);
        assert_eq!(kept, lines(&["aaaa", "bbbb"]));
    }

    #[test]
    fn oversized_first_line_yields_nothing() {
        let kept = trim_to_budget(&lines(&["this line is far too long", "ok"]), 1);
        assert!(kept.is_empty(), "must not skip ahead to a shorter line");
    }

    #[test]
    fn zero_budget_keeps_nothing() {
        assert!(trim_to_budget(&lines(&["a"]), 0).is_empty());
    }

    #[test]
    fn empty_section_is_omitted() {
        assert_eq!(render_section("## X", &[]), None);
        assert_eq!(
            render_section("## X", &lines(&["- a", "- b"])).as_deref(),
            Some("## X\n- a\n- b")
        );
    }

    #[test]
    fn section_budget_includes_the_header() {
        // 5 tokens = 20 chars; the header alone takes 18 of them.
        let kept = trim_section(WORKING_MEMORY_HEADER, &lines(&["- [fact] abcdefghij"]), 5);
        assert!(kept.is_empty());

        // 7 tokens = 28 chars: 18 for the header leaves 10 for "- a\n- b" (7).
        let kept = trim_section(WORKING_MEMORY_HEADER, &lines(&["- a", "- b", "- c"]), 7);
        assert_eq!(kept, lines(&["- a", "- b"]));
        let rendered = render_section(WORKING_MEMORY_HEADER, &kept).unwrap();
        assert!(rendered.chars().count() <= 28);
    }

    #[test]
    fn huge_summary_window_covers_everything() {
        assert_eq!(summary_window_start(1_000_000_000), EARLIEST_TIMESTAMP);
        assert_eq!(summary_window_start(i64::MAX), EARLIEST_TIMESTAMP);
        let week = summary_window_start(7);
        assert!(week.as_str() > EARLIEST_TIMESTAMP);
        assert!(week.ends_with('Z'));
    }

    proptest! {
        #[test]
        fn rendered_section_stays_within_budget(
            items in proptest::collection::vec("[a-z ]{0,40}", 0..20),
            budget in 0usize..60,
        ) {
            let input: Vec<String> = items;
            let kept = trim_section(SUMMARIES_HEADER, &input, budget);
            prop_assert_eq!(&input[..kept.len()], &kept[..]);
            if let Some(rendered) = render_section(SUMMARIES_HEADER, &kept) {
                prop_assert!(rendered.chars().count() <= budget * CHARS_PER_TOKEN);
            }
        }

        #[test]
        fn trimmed_lines_are_a_prefix_within_budget(
            items in proptest::collection::vec("[a-z ]{0,40}", 0..20),
            budget in 0usize..60,
        ) {
            let input: Vec<String> = items;
            let kept = trim_to_budget(&input, budget);
            prop_assert!(kept.join("\n").chars().count() <= budget * CHARS_PER_TOKEN);
            prop_assert_eq!(&input[..kept.len()], &kept[..]);
        }
    }
}
