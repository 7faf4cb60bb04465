// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt construction for extraction runs.

use std::fmt::Write;

use mnema_core::types::{MemoryEntry, PendingSignal, SignalType};

/// System prompt shared by both extraction paths.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "\
You extract durable memory from conversations between a user and an assistant.
Respond with a single JSON object and nothing else, using this shape:
{
  \"entries\": [{\"type\": \"fact|preference|decision|correction|commitment|relationship|skill\", \"content\": \"...\", \"confidence\": 0.0-1.0, \"tags\": [\"...\"]}],
  \"profile_facts\": [\"durable fact about the user\"],
  \"summary\": \"short summary of the session, or null\",
  \"entities\": [{\"name\": \"...\", \"type\": \"person|place|organization|project|tool|concept\"}],
  \"relationships\": [{\"source\": \"entity name\", \"relation\": \"snake_case_verb\", \"target\": \"entity name\", \"confidence\": 0.0-1.0}]
}
Write each entry as one self-contained sentence. Only record what was actually said.
Use empty arrays when there is nothing to record. Do not repeat known memories.";

fn push_hints(prompt: &mut String, hints: &[MemoryEntry]) {
    if hints.is_empty() {
        return;
    }
    prompt.push_str("Already known (do not repeat these):\n");
    for hint in hints {
        let _ = writeln!(prompt, "- [{}] {}", hint.entry_type, hint.content);
    }
    prompt.push('\n');
}

fn join_signal_types(types: impl IntoIterator<Item = SignalType>) -> String {
    types
        .into_iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for a single conversational turn.
pub fn build_immediate_prompt(
    signals: &[SignalType],
    user_message: &str,
    assistant_message: Option<&str>,
    hints: &[MemoryEntry],
) -> String {
    let mut prompt = String::new();
    push_hints(&mut prompt, hints);
    let _ = writeln!(
        prompt,
        "Detected signals: {}\n",
        join_signal_types(signals.iter().copied())
    );
    let _ = writeln!(prompt, "User: {user_message}");
    if let Some(reply) = assistant_message {
        let _ = writeln!(prompt, "Assistant: {reply}");
    }
    prompt.push_str("\nExtract memory from this turn. Set \"summary\" to null.");
    prompt
}

/// Consolidated prompt over every pending signal of one agent. Asks for a
/// session summary in addition to the usual sections.
pub fn build_batch_prompt(signals: &[PendingSignal], hints: &[MemoryEntry]) -> String {
    let mut prompt = String::new();
    push_hints(&mut prompt, hints);
    prompt.push_str("Conversation excerpts since the last consolidation:\n\n");
    for (i, signal) in signals.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "### Excerpt {} ({})",
            i + 1,
            signal.signal_type
        );
        let _ = writeln!(prompt, "User: {}", signal.user_message);
        if let Some(reply) = &signal.assistant_message {
            let _ = writeln!(prompt, "Assistant: {reply}");
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "Consolidate these excerpts into memory, merging duplicates. \
         Also write a two or three sentence \"summary\" of the session.",
    );
    prompt
}
