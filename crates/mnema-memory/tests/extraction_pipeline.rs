// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end extraction behavior through the service facade.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{AGENT, CONVERSATION, entry_response, facts_response, fixture, fixture_with};
use mnema_config::MnemaConfig;
use mnema_core::types::GenerateRequest;
use mnema_core::{EntryType, MnemaError, ModelInvoker, ProcessingStatus, SignalType};
use mnema_memory::{
    ExtractionReport, HybridSearchIndex, MemoryService, RegenerationOutcome, SkipReason,
};
use mnema_test_utils::{MockVectorIndex, RecordingObserver, TestHarness};
use tokio::sync::Notify;

async fn turn(fx: &common::Fixture, response: String, user: &str) -> mnema_memory::ProcessingReport {
    fx.model.push_response(response);
    fx.service
        .process_immediate_signals(&[SignalType::Preference], user, None, AGENT, CONVERSATION)
        .await
}

#[tokio::test]
async fn contradicting_preference_supersedes_the_older_entry() {
    let fx = fixture().await;
    let storage = fx.harness.storage();

    turn(
        &fx,
        entry_response("preference", "User prefers dark mode"),
        "I like dark mode",
    )
    .await;
    let old = storage.load_active_entries(AGENT, None).await.unwrap();
    assert_eq!(old.len(), 1);
    let old_id = old[0].id.clone();
    assert!(fx.backend.contains(&old_id));

    let report = turn(
        &fx,
        entry_response("preference", "User prefers light mode"),
        "Actually, light mode",
    )
    .await;

    let ExtractionReport::Completed(stats) = report.extraction else {
        panic!("expected a completed run, got {:?}", report.extraction);
    };
    assert_eq!(stats.entries_added, 1);
    assert_eq!(stats.entries_superseded, 1);

    let active = storage.load_active_entries(AGENT, None).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].content, "User prefers light mode");
    assert_eq!(active[0].entry_type, EntryType::Preference);

    let superseded = storage.get_entry(&old_id).await.unwrap().unwrap();
    assert_eq!(superseded.superseded_by.as_deref(), Some(active[0].id.as_str()));
    assert!(!fx.backend.contains(&old_id));
    assert!(fx.backend.contains(&active[0].id));
    assert_eq!(fx.observer.count("entry_superseded"), 1);
}

#[tokio::test]
async fn immediate_path_shows_hints_and_leaves_signals_pending() {
    let fx = fixture().await;
    turn(&fx, entry_response("fact", "User is a chemist"), "I'm a chemist").await;
    turn(&fx, "{}".to_string(), "I also like tea").await;

    let prompts = fx.model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("- [fact] User is a chemist"));

    let pending = fx
        .harness
        .storage()
        .load_pending_signals(AGENT)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn no_signals_means_no_model_call() {
    let fx = fixture().await;
    let report = fx
        .service
        .process_immediate_signals(&[], "hello", Some("hi"), AGENT, CONVERSATION)
        .await;
    assert_eq!(
        report.extraction,
        ExtractionReport::Skipped {
            reason: SkipReason::NoSignals
        }
    );
    assert!(fx.model.prompts().is_empty());
}

#[tokio::test]
async fn fenced_and_prose_wrapped_responses_are_applied() {
    let fx = fixture().await;
    let body = entry_response("decision", "Team chose Postgres for storage");
    turn(&fx, format!("Here you go:\n```json\n{body}\n```"), "Let's use Postgres").await;
    turn(
        &fx,
        format!("Sure. {} Hope that helps!", entry_response("skill", "User knows Haskell")),
        "I write Haskell",
    )
    .await;

    let active = fx
        .harness
        .storage()
        .load_active_entries(AGENT, None)
        .await
        .unwrap();
    let mut contents: Vec<&str> = active.iter().map(|e| e.content.as_str()).collect();
    contents.sort_unstable();
    assert_eq!(
        contents,
        vec!["Team chose Postgres for storage", "User knows Haskell"]
    );
    assert_eq!(fx.observer.count("parse_failed"), 0);
}

#[tokio::test]
async fn unparseable_response_is_an_empty_extraction() {
    let fx = fixture().await;
    let report = turn(&fx, "I am not able to help with that.".to_string(), "hmm").await;

    let ExtractionReport::Completed(stats) = report.extraction else {
        panic!("parse failure must not fail the run");
    };
    assert!(stats.parse_failed);
    assert_eq!(stats.entries_added, 0);
    assert_eq!(fx.observer.count("parse_failed"), 1);
    assert_eq!(fx.model.prompts().len(), 1, "parse failures are not retried");
}

#[tokio::test]
async fn duplicate_profile_fact_is_rejected_and_reported() {
    let fx = fixture().await;
    fx.model.push_response(facts_response(&[
        "User lives in Lisbon Portugal",
        "User lives in Lisbon, Portugal",
    ]));
    fx.model.push_response("The user lives in Lisbon.");
    let report = fx
        .service
        .process_immediate_signals(&[SignalType::Fact], "I live in Lisbon", None, AGENT, CONVERSATION)
        .await;

    assert_eq!(fx.observer.count("fact_skipped"), 1, "{:?}", fx.observer.events());
    let ExtractionReport::Completed(stats) = report.extraction else {
        panic!("expected completion");
    };
    assert_eq!((stats.facts_added, stats.facts_skipped), (1, 1));
    assert_eq!(
        report.profile,
        Some(RegenerationOutcome::Regenerated {
            version: 1,
            contributions: 1
        })
    );
}

#[tokio::test]
async fn profile_regeneration_is_gated_by_threshold() {
    let fx = fixture().await;
    let storage = fx.harness.storage();

    // Bootstrap: the first contribution creates version 1.
    fx.model.push_response(facts_response(&["Lives in Lisbon"]));
    fx.model.push_response("The user lives in Lisbon.");
    let report = fx
        .service
        .process_immediate_signals(&[SignalType::Fact], "I live in Lisbon", None, AGENT, CONVERSATION)
        .await;
    assert_eq!(
        report.profile,
        Some(RegenerationOutcome::Regenerated {
            version: 1,
            contributions: 1
        })
    );

    for (i, fact) in ["Owns a cat named Miso", "Works as a chemist"]
        .into_iter()
        .enumerate()
    {
        let report = turn(&fx, facts_response(&[fact]), fact).await;
        assert_eq!(
            report.profile,
            Some(RegenerationOutcome::NotDue {
                outstanding: i + 1,
                threshold: 3
            })
        );
        let profile = storage.load_current_profile().await.unwrap().unwrap();
        assert_eq!(profile.version, 1);
    }

    fx.model.push_response(facts_response(&["Plays the cello every weekend"]));
    fx.model
        .push_response("Here is the updated profile:\nLisbon chemist, cat owner, cellist.");
    let report = fx
        .service
        .process_immediate_signals(&[SignalType::Fact], "cello", None, AGENT, CONVERSATION)
        .await;
    assert_eq!(
        report.profile,
        Some(RegenerationOutcome::Regenerated {
            version: 2,
            contributions: 3
        })
    );

    let profile = storage.load_current_profile().await.unwrap().unwrap();
    assert_eq!(profile.version, 2);
    assert_eq!(profile.content, "Lisbon chemist, cat owner, cellist.");
    assert_eq!(storage.count_unincorporated_contributions().await.unwrap(), 0);

    let regeneration_prompt = fx.model.prompts().pop().unwrap();
    assert!(regeneration_prompt.contains("The user lives in Lisbon."));
    assert!(regeneration_prompt.contains("- Plays the cello every weekend"));
}

#[tokio::test]
async fn user_edits_lead_the_regeneration_prompt() {
    let fx = fixture().await;
    fx.service.record_user_edit("Call me Ana").await.unwrap();
    fx.model.push_response(facts_response(&["Lives in Porto"]));
    fx.model.push_response("Ana lives in Porto.");
    fx.service
        .process_immediate_signals(&[SignalType::Fact], "Porto", None, AGENT, CONVERSATION)
        .await;

    let prompt = fx.model.prompts().pop().unwrap();
    let edit = prompt.find("Call me Ana").unwrap();
    let fact = prompt.find("Lives in Porto").unwrap();
    assert!(edit < fact);

    let edits = fx.harness.storage().load_user_edits().await.unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].incorporated_in, None);
}

#[tokio::test]
async fn batch_consolidates_pending_signals_and_stores_a_summary() {
    let fx = fixture().await;
    turn(&fx, "{}".to_string(), "I prefer vim keybindings").await;

    fx.model.push_response(
        serde_json::json!({
            "entries": [{"type": "preference", "content": "User prefers vim keybindings"}],
            "summary": "We discussed editor themes and keybindings"
        })
        .to_string(),
    );
    let report = fx.service.process_post_activity(AGENT).await;
    let ExtractionReport::Completed(stats) = report.extraction else {
        panic!("expected completion, got {:?}", report.extraction);
    };
    assert_eq!(stats.signals, 1);
    assert!(stats.summary_stored);

    let storage = fx.harness.storage();
    assert!(storage.load_pending_signals(AGENT).await.unwrap().is_empty());
    let summaries = storage
        .load_summaries_since(AGENT, "2000-01-01T00:00:00.000Z")
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].conversation_id, CONVERSATION);
    assert!(fx.backend.contains(&summaries[0].index_id));
    assert!(fx.model.prompts().last().unwrap().contains("I prefer vim keybindings"));

    let again = fx.service.process_post_activity(AGENT).await;
    assert_eq!(
        again.extraction,
        ExtractionReport::Skipped {
            reason: SkipReason::NoPendingSignals
        }
    );
}

#[tokio::test]
async fn unavailable_model_keeps_signals_pending() {
    let fx = fixture().await;
    turn(&fx, "{}".to_string(), "remember my birthday is in May").await;

    fx.model.set_unavailable(true);
    let report = fx.service.process_post_activity(AGENT).await;
    assert!(matches!(
        report.extraction,
        ExtractionReport::Failed { ref kind, .. } if kind == "model_unavailable"
    ));
    assert_eq!(report.profile, None);
    assert_eq!(
        fx.harness
            .storage()
            .load_pending_signals(AGENT)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(fx.observer.count("extraction_failed"), 1);

    fx.model.set_unavailable(false);
    let retry = fx.service.process_post_activity(AGENT).await;
    assert!(retry.extraction.is_completed());
}

#[tokio::test]
async fn unparseable_batch_still_consumes_signals() {
    let fx = fixture().await;
    turn(&fx, "{}".to_string(), "note this").await;
    fx.model.push_response("no json here");

    let report = fx.service.process_post_activity(AGENT).await;
    assert!(report.extraction.is_completed());
    assert!(
        fx.harness
            .storage()
            .load_pending_signals(AGENT)
            .await
            .unwrap()
            .is_empty()
    );
}

/// Blocks inside `generate` until released.
struct GatedModel {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ModelInvoker for GatedModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<String, MnemaError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("{}".to_string())
    }
}

#[tokio::test]
async fn second_batch_for_a_busy_agent_is_skipped() {
    let harness = TestHarness::new().await;
    let observer = Arc::new(RecordingObserver::new());
    let model = Arc::new(GatedModel {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let index = Arc::new(HybridSearchIndex::disabled(observer.clone()));
    let service = MemoryService::new(
        harness.storage(),
        model.clone(),
        index,
        observer.clone(),
        &MnemaConfig::default(),
    );
    harness
        .storage()
        .insert_signal(&mnema_core::types::NewSignal {
            agent_id: AGENT.into(),
            conversation_id: CONVERSATION.into(),
            signal_type: SignalType::Decision,
            user_message: "ship on Friday".into(),
            assistant_message: None,
        })
        .await
        .unwrap();

    let first = service.process_post_activity(AGENT);
    let second = async {
        model.entered.notified().await;
        let report = service.process_post_activity(AGENT).await;
        model.release.notify_one();
        report
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.extraction.is_completed());
    assert_eq!(
        second.extraction,
        ExtractionReport::Skipped {
            reason: SkipReason::AlreadyProcessing
        }
    );
    assert_eq!(observer.count("batch_skipped"), 1);

    // A new signal shows the agent back at idle.
    harness
        .storage()
        .insert_signal(&mnema_core::types::NewSignal {
            agent_id: AGENT.into(),
            conversation_id: CONVERSATION.into(),
            signal_type: SignalType::Fact,
            user_message: "one more".into(),
            assistant_message: None,
        })
        .await
        .unwrap();
    let status = service.status().await.unwrap();
    assert_eq!(status.agents.len(), 1);
    assert_eq!(status.agents[0].processing, ProcessingStatus::Idle);
}

#[tokio::test]
async fn sync_processes_every_agent_then_regenerates() {
    let mut config = MnemaConfig::default();
    config.memory.profile_regeneration_threshold = 5;
    let fx = fixture_with(config, MockVectorIndex::new()).await;

    for agent in ["agent-a", "agent-b"] {
        fx.model.push_response("{}");
        fx.service
            .process_immediate_signals(&[SignalType::Fact], "hi", None, agent, CONVERSATION)
            .await;
    }
    fx.model.push_response(facts_response(&["Speaks Portuguese"]));
    fx.model.push_response(facts_response(&["Has two children"]));
    fx.model.push_response("Speaks Portuguese and has two children.");

    let report = fx.service.sync_now().await;

    let agents: Vec<&str> = report.agents.iter().map(|a| a.agent_id.as_str()).collect();
    assert_eq!(agents, vec!["agent-a", "agent-b"]);
    assert!(report.agents.iter().all(|a| a.extraction.is_completed()));
    assert_eq!(
        report.profile,
        Some(RegenerationOutcome::Regenerated {
            version: 1,
            contributions: 2
        })
    );

    let status = fx.service.status().await.unwrap();
    assert!(status.agents.is_empty());
    assert_eq!(status.unincorporated_contributions, 0);
    assert_eq!(status.profile_version, Some(1));
    assert!(status.index_available);
}
