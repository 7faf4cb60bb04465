// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile fact deduplication and profile regeneration.
//!
//! Extraction runs contribute facts about the user. Facts that overlap an
//! outstanding contribution are dropped. Once enough contributions pile up
//! the profile is regenerated from user edits, the outstanding contributions
//! and the current profile text, and the contributions are stamped with the
//! new version.

use std::fmt::Write;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use mnema_core::types::{
    GenerateRequest, LogStatus, NewProfileEvent, ProcessingLog, ProfileEvent, SYSTEM_AGENT_ID,
    TaskType, UserProfile, estimate_tokens, now_timestamp,
};
use mnema_core::{
    MemoryEvent, MemoryObserver, MemoryStorage, MnemaError, ModelInvoker, ProfileEventKind,
};
use regex::Regex;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::similarity::{jaccard_sets, token_set};

/// Counts from one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupOutcome {
    pub added: usize,
    pub skipped: usize,
}

/// Stores new profile facts unless they repeat an outstanding contribution.
pub struct ProfileFactDeduper {
    storage: Arc<dyn MemoryStorage>,
    observer: Arc<dyn MemoryObserver>,
    threshold: f64,
}

impl ProfileFactDeduper {
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        observer: Arc<dyn MemoryObserver>,
        threshold: f64,
    ) -> Self {
        Self {
            storage,
            observer,
            threshold,
        }
    }

    /// Compare each fact against unincorporated contributions (including the
    /// ones this call just stored) and store the ones that are new.
    pub async fn add_facts(&self, agent_id: &str, facts: &[String], model: &str) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        if facts.is_empty() {
            return outcome;
        }

        let mut known: Vec<_> = match self.storage.load_unincorporated_contributions().await {
            Ok(events) => events.iter().map(|e| token_set(&e.content)).collect(),
            Err(e) => {
                self.observer.record(MemoryEvent::StorageFailure {
                    operation: "load_unincorporated_contributions".to_string(),
                    error: e.to_string(),
                });
                return outcome;
            }
        };

        for fact in facts {
            let tokens = token_set(fact);
            let best = known
                .iter()
                .map(|k| jaccard_sets(k, &tokens))
                .fold(0.0_f64, f64::max);
            if best > self.threshold {
                debug!(agent_id, similarity = best, "duplicate profile fact skipped");
                self.observer.record(MemoryEvent::FactSkipped {
                    agent_id: agent_id.to_string(),
                    content: fact.clone(),
                    similarity: best,
                });
                outcome.skipped += 1;
                continue;
            }

            let event = NewProfileEvent {
                agent_id: agent_id.to_string(),
                kind: ProfileEventKind::Contribution,
                content: fact.clone(),
                model: Some(model.to_string()),
                incorporated_in: None,
            };
            match self.storage.insert_profile_event(&event).await {
                Ok(_) => {
                    known.push(tokens);
                    outcome.added += 1;
                }
                Err(e) => self.observer.record(MemoryEvent::StorageFailure {
                    operation: "insert_profile_event".to_string(),
                    error: e.to_string(),
                }),
            }
        }
        outcome
    }
}

/// System prompt for profile regeneration.
pub const PROFILE_SYSTEM_PROMPT: &str = "\
You maintain a short profile of the user, written in the third person.
Restate only the facts listed in the request. Never invent details and never
write placeholders such as [Name], N/A or unknown. User overrides always win
over any other fact. Output the profile text directly, with no preamble,
headings about the task, or closing remarks.";

/// Leading chatter models put before the profile text, tried in order.
static PREAMBLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(?:sure|certainly|of course|okay|ok|absolutely)(?:\s*[,!.:]+|[ \t]*(?:\n|$))\s*",
        r"(?i)^here(?:'s| is| are)\b[^:\n]*:\s*",
        r"(?i)^here(?:'s| is| are)\b[^\n]*\n\s*",
        r"(?i)^(?:i've|i have) (?:updated|compiled|rewritten|generated)\b[^:\n]*:\s*",
        r"(?i)^(?:updated )?(?:user )?profile:\s*",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Remove leading preamble, repeating until no pattern matches.
pub fn strip_preamble(text: &str) -> String {
    let mut rest = text.trim_start();
    'outer: loop {
        for pattern in PREAMBLE_PATTERNS.iter() {
            if let Some(m) = pattern.find(rest)
                && m.end() > 0
            {
                rest = rest[m.end()..].trim_start();
                continue 'outer;
            }
        }
        break;
    }
    rest.trim().to_string()
}

/// Build the regeneration prompt: user edits, then new contributions, then
/// the current profile.
pub fn build_regeneration_prompt(
    edits: &[ProfileEvent],
    contributions: &[ProfileEvent],
    current: Option<&UserProfile>,
) -> String {
    let mut prompt = String::new();
    if !edits.is_empty() {
        prompt.push_str("User overrides (always honor these):\n");
        for edit in edits {
            let _ = writeln!(prompt, "- {}", edit.content);
        }
        prompt.push('\n');
    }
    if !contributions.is_empty() {
        prompt.push_str("New facts:\n");
        for fact in contributions {
            let _ = writeln!(prompt, "- {}", fact.content);
        }
        prompt.push('\n');
    }
    match current {
        Some(profile) => {
            let _ = writeln!(prompt, "Current profile:\n{}\n", profile.content);
            prompt.push_str("Rewrite the profile to include the new facts.");
        }
        None => prompt.push_str("Write the first version of the profile."),
    }
    prompt
}

/// What a regeneration check did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegenerationOutcome {
    Regenerated { version: i64, contributions: usize },
    NotDue { outstanding: usize, threshold: usize },
    NothingToDo,
    Failed { kind: String, message: String },
}

impl RegenerationOutcome {
    fn failed(error: &MnemaError) -> Self {
        RegenerationOutcome::Failed {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Regenerates the global user profile. Runs are serialized so versions are
/// strictly sequential.
pub struct ProfileRegenerator {
    storage: Arc<dyn MemoryStorage>,
    model: Arc<dyn ModelInvoker>,
    observer: Arc<dyn MemoryObserver>,
    model_id: String,
    max_tokens: u32,
    threshold: usize,
    run_lock: Mutex<()>,
}

impl ProfileRegenerator {
    pub fn new(
        storage: Arc<dyn MemoryStorage>,
        model: Arc<dyn ModelInvoker>,
        observer: Arc<dyn MemoryObserver>,
        model_id: impl Into<String>,
        max_tokens: u32,
        threshold: usize,
    ) -> Self {
        Self {
            storage,
            model,
            observer,
            model_id: model_id.into(),
            max_tokens,
            threshold,
            run_lock: Mutex::new(()),
        }
    }

    /// Regenerate if enough contributions are outstanding. The threshold is 1
    /// while no profile exists.
    pub async fn maybe_regenerate(&self) -> RegenerationOutcome {
        let _guard = self.run_lock.lock().await;
        let outstanding = match self.storage.count_unincorporated_contributions().await {
            Ok(n) => n,
            Err(e) => return self.storage_failed("count_unincorporated_contributions", e),
        };
        let current = match self.storage.load_current_profile().await {
            Ok(p) => p,
            Err(e) => return self.storage_failed("load_current_profile", e),
        };
        let threshold = if current.is_none() { 1 } else { self.threshold };
        if outstanding < threshold {
            debug!(outstanding, threshold, "profile regeneration not due");
            return RegenerationOutcome::NotDue {
                outstanding,
                threshold,
            };
        }
        self.run(current).await
    }

    /// Regenerate now if there is anything to fold in.
    pub async fn regenerate(&self) -> RegenerationOutcome {
        let _guard = self.run_lock.lock().await;
        let current = match self.storage.load_current_profile().await {
            Ok(p) => p,
            Err(e) => return self.storage_failed("load_current_profile", e),
        };
        self.run(current).await
    }

    async fn run(&self, current: Option<UserProfile>) -> RegenerationOutcome {
        let started = Instant::now();
        let edits = match self.storage.load_user_edits().await {
            Ok(e) => e,
            Err(e) => return self.storage_failed("load_user_edits", e),
        };
        let contributions = match self.storage.load_unincorporated_contributions().await {
            Ok(c) => c,
            Err(e) => return self.storage_failed("load_unincorporated_contributions", e),
        };
        if contributions.is_empty() && edits.is_empty() {
            return RegenerationOutcome::NothingToDo;
        }

        let prompt = build_regeneration_prompt(&edits, &contributions, current.as_ref());
        let input_tokens = estimate_tokens(PROFILE_SYSTEM_PROMPT) + estimate_tokens(&prompt);
        let request = GenerateRequest {
            model: self.model_id.clone(),
            prompt,
            system_prompt: Some(PROFILE_SYSTEM_PROMPT.to_string()),
            max_tokens: self.max_tokens,
        };

        let response = match self.model.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(model = %self.model_id, error = %e, "profile regeneration failed");
                self.log(LogStatus::Failed, input_tokens, 0, started, Some(e.to_string()))
                    .await;
                return RegenerationOutcome::failed(&e);
            }
        };

        let content = strip_preamble(&response);
        if content.is_empty() {
            let error = MnemaError::Parse("model returned an empty profile".to_string());
            self.log(
                LogStatus::Empty,
                input_tokens,
                estimate_tokens(&response),
                started,
                Some(error.to_string()),
            )
            .await;
            return RegenerationOutcome::failed(&error);
        }

        let version = current.as_ref().map_or(1, |p| p.version + 1);
        let profile = UserProfile {
            token_count: estimate_tokens(&content),
            content,
            version,
            model: self.model_id.clone(),
            generated_at: now_timestamp(),
        };
        if let Err(e) = self.storage.save_profile(&profile).await {
            return self.storage_failed("save_profile", e);
        }

        let ids: Vec<i64> = contributions.iter().map(|c| c.id).collect();
        if let Err(e) = self.storage.mark_incorporated(&ids, version).await {
            self.record_storage_failure("mark_incorporated", &e);
        }

        let audit = NewProfileEvent {
            agent_id: SYSTEM_AGENT_ID.to_string(),
            kind: ProfileEventKind::Regeneration,
            content: format!(
                "regenerated profile version {version} from {} contributions and {} user edits",
                contributions.len(),
                edits.len()
            ),
            model: Some(self.model_id.clone()),
            incorporated_in: Some(version),
        };
        if let Err(e) = self.storage.insert_profile_event(&audit).await {
            self.record_storage_failure("insert_profile_event", &e);
        }

        self.log(
            LogStatus::Success,
            input_tokens,
            estimate_tokens(&response),
            started,
            None,
        )
        .await;
        info!(
            version,
            contributions = contributions.len(),
            "user profile regenerated"
        );
        self.observer.record(MemoryEvent::ProfileRegenerated {
            version,
            contributions: contributions.len(),
        });
        RegenerationOutcome::Regenerated {
            version,
            contributions: contributions.len(),
        }
    }

    async fn log(
        &self,
        status: LogStatus,
        input_tokens: usize,
        output_tokens: usize,
        started: Instant,
        detail: Option<String>,
    ) {
        let log = ProcessingLog {
            agent_id: SYSTEM_AGENT_ID.to_string(),
            task_type: TaskType::ProfileRegeneration,
            status,
            model: Some(self.model_id.clone()),
            input_tokens,
            output_tokens,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            detail,
        };
        if let Err(e) = self.storage.append_processing_log(&log).await {
            self.record_storage_failure("append_processing_log", &e);
        }
    }

    fn storage_failed(&self, operation: &str, error: MnemaError) -> RegenerationOutcome {
        self.record_storage_failure(operation, &error);
        RegenerationOutcome::failed(&error)
    }

    fn record_storage_failure(&self, operation: &str, error: &MnemaError) {
        self.observer.record(MemoryEvent::StorageFailure {
            operation: operation.to_string(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_test_utils::{MockModel, RecordingObserver, TestHarness};

    #[test]
    fn strips_layered_preamble() {
        assert_eq!(
            strip_preamble("Sure! Here is the updated profile:\n\nUser lives in Lisbon."),
            "User lives in Lisbon."
        );
        assert_eq!(
            strip_preamble("Certainly, here's the profile:\nLikes tea."),
            "Likes tea."
        );
        assert_eq!(
            strip_preamble("Here is a revised version.\nThe user is a chemist."),
            "The user is a chemist."
        );
        assert_eq!(strip_preamble("Profile: Enjoys hiking."), "Enjoys hiking.");
    }

    #[test]
    fn leaves_plain_profile_alone() {
        let text = "The user is a backend engineer who prefers Rust.";
        assert_eq!(strip_preamble(text), text);
        assert_eq!(strip_preamble("Okra farmer in Ghana."), "Okra farmer in Ghana.");
    }

    #[test]
    fn acknowledgement_needs_punctuation_or_line_end() {
        assert_eq!(strip_preamble("OK Go fan since 2005."), "OK Go fan since 2005.");
        assert_eq!(
            strip_preamble("Sure thing to know: user is vegan."),
            "Sure thing to know: user is vegan."
        );
        assert_eq!(
            strip_preamble("Okay! The user lives in Oslo."),
            "The user lives in Oslo."
        );
        assert_eq!(strip_preamble("OK\nThe user lives in Oslo."), "The user lives in Oslo.");
        assert_eq!(strip_preamble("Of course:\nLikes tea."), "Likes tea.");
    }

    #[test]
    fn prompt_puts_edits_first() {
        let event = |kind, content: &str| ProfileEvent {
            id: 1,
            agent_id: "a".into(),
            kind,
            content: content.into(),
            model: None,
            incorporated_in: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let prompt = build_regeneration_prompt(
            &[event(ProfileEventKind::UserEdit, "My name is Ana")],
            &[event(ProfileEventKind::Contribution, "Lives in Porto")],
            None,
        );
        let edit_at = prompt.find("My name is Ana").unwrap();
        let fact_at = prompt.find("Lives in Porto").unwrap();
        assert!(edit_at < fact_at);
        assert!(prompt.ends_with("Write the first version of the profile."));
    }

    #[tokio::test]
    async fn dedup_rejects_overlapping_fact() {
        let harness = TestHarness::new().await;
        let observer = Arc::new(RecordingObserver::new());
        let deduper = ProfileFactDeduper::new(harness.storage(), observer.clone(), 0.6);

        let outcome = deduper
            .add_facts(
                "agent-1",
                &[
                    "User lives in Lisbon Portugal".to_string(),
                    "User lives in Lisbon, Portugal".to_string(),
                    "User owns two cats".to_string(),
                ],
                "m",
            )
            .await;

        assert_eq!(outcome, DedupOutcome { added: 2, skipped: 1 });
        assert_eq!(observer.count("fact_skipped"), 1);
        assert_eq!(
            harness
                .storage()
                .count_unincorporated_contributions()
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn bootstrap_regenerates_on_first_contribution() {
        let harness = TestHarness::new().await;
        let model = Arc::new(MockModel::new());
        model.push_response("Sure! Here's the profile:\nThe user lives in Lisbon.");
        let observer = Arc::new(RecordingObserver::new());
        let storage = harness.storage();
        storage
            .insert_profile_event(&NewProfileEvent {
                agent_id: "agent-1".into(),
                kind: ProfileEventKind::Contribution,
                content: "Lives in Lisbon".into(),
                model: None,
                incorporated_in: None,
            })
            .await
            .unwrap();

        let regenerator =
            ProfileRegenerator::new(storage.clone(), model.clone(), observer.clone(), "m", 512, 3);
        let outcome = regenerator.maybe_regenerate().await;

        assert_eq!(
            outcome,
            RegenerationOutcome::Regenerated {
                version: 1,
                contributions: 1
            }
        );
        let profile = storage.load_current_profile().await.unwrap().unwrap();
        assert_eq!(profile.content, "The user lives in Lisbon.");
        assert_eq!(storage.count_unincorporated_contributions().await.unwrap(), 0);
        assert_eq!(observer.count("profile_regenerated"), 1);
    }

    #[tokio::test]
    async fn empty_model_output_keeps_contributions() {
        let harness = TestHarness::new().await;
        let model = Arc::new(MockModel::new());
        model.push_response("Sure!");
        let storage = harness.storage();
        storage
            .insert_profile_event(&NewProfileEvent {
                agent_id: "agent-1".into(),
                kind: ProfileEventKind::Contribution,
                content: "Lives in Lisbon".into(),
                model: None,
                incorporated_in: None,
            })
            .await
            .unwrap();

        let regenerator = ProfileRegenerator::new(
            storage.clone(),
            model,
            Arc::new(RecordingObserver::new()),
            "m",
            512,
            3,
        );
        let outcome = regenerator.regenerate().await;

        assert!(matches!(outcome, RegenerationOutcome::Failed { ref kind, .. } if kind == "parse"));
        assert!(storage.load_current_profile().await.unwrap().is_none());
        assert_eq!(storage.count_unincorporated_contributions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn forced_regeneration_with_nothing_outstanding_is_a_no_op() {
        let harness = TestHarness::new().await;
        let model = Arc::new(MockModel::new());
        let regenerator = ProfileRegenerator::new(
            harness.storage(),
            model.clone(),
            Arc::new(RecordingObserver::new()),
            "m",
            512,
            3,
        );
        assert_eq!(regenerator.regenerate().await, RegenerationOutcome::NothingToDo);
        assert!(model.prompts().is_empty());
    }
}
