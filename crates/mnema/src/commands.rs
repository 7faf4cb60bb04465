// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.
//!
//! Every command opens storage, connects the search index, wires a
//! [`MemoryService`] and prints its result. Reports are printed as pretty
//! JSON; `status` and `profile show` also have a plain text form.

use std::sync::Arc;

use mnema_config::model::MnemaConfig;
use mnema_core::{MemoryObserver, MemoryStorage, MnemaError, ModelInvoker, VectorIndex};
use mnema_memory::observer::register_metrics;
use mnema_memory::service::StatusReport;
use mnema_memory::{HybridSearchIndex, MemoryService, SearchOptions, TracingObserver};
use mnema_storage::{Fts5Index, SqliteStorage};
use serde::Serialize;
use tracing::debug;

use crate::invoker::HttpModelInvoker;
use crate::{Commands, IndexCommands, ProfileCommands, SearchScope};

/// Storage and service opened for one command.
pub(crate) struct Runtime {
    storage: Arc<SqliteStorage>,
    service: MemoryService,
}

impl Runtime {
    /// Open storage and the index and wire the pipeline around `model`.
    pub(crate) async fn open(
        config: &MnemaConfig,
        model: Arc<dyn ModelInvoker>,
    ) -> Result<Self, MnemaError> {
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let observer: Arc<dyn MemoryObserver> = Arc::new(TracingObserver);
        let index = if config.index.enabled {
            let backend = match config.index.database_path.as_deref() {
                Some(path) => Fts5Index::open(path).await?,
                None => Fts5Index::with_database(storage.database()?),
            };
            let backend: Arc<dyn VectorIndex> = Arc::new(backend);
            HybridSearchIndex::connect(Some(backend), observer.clone()).await
        } else {
            debug!("search index disabled, using text search");
            HybridSearchIndex::disabled(observer.clone())
        };

        let service = MemoryService::new(
            storage.clone() as Arc<dyn MemoryStorage>,
            model,
            Arc::new(index),
            observer,
            config,
        );
        Ok(Self { storage, service })
    }

    pub(crate) fn service(&self) -> &MemoryService {
        &self.service
    }

    pub(crate) async fn close(&self) -> Result<(), MnemaError> {
        self.storage.close().await
    }
}

/// Execute one subcommand against the configured backends.
pub(crate) async fn run(command: Commands, config: MnemaConfig) -> Result<(), MnemaError> {
    register_metrics();
    let model: Arc<dyn ModelInvoker> = Arc::new(HttpModelInvoker::new(&config.model)?);
    let runtime = Runtime::open(&config, model).await?;
    let result = execute(runtime.service(), command).await;
    runtime.close().await?;
    result
}

async fn execute(service: &MemoryService, command: Commands) -> Result<(), MnemaError> {
    match command {
        Commands::Sync => print_json(&service.sync_now().await),
        Commands::Process { agent } => print_json(&service.process_post_activity(&agent).await),
        Commands::Profile { action } => match action {
            ProfileCommands::Show => {
                match service.current_profile().await? {
                    Some(profile) => {
                        println!("# profile v{} ({})", profile.version, profile.generated_at);
                        println!("{}", profile.content);
                    }
                    None => println!("no profile yet"),
                }
                Ok(())
            }
            ProfileCommands::Regenerate => print_json(&service.regenerate_profile().await),
            ProfileCommands::Edit { text } => {
                let id = service.record_user_edit(&text).await?;
                println!("recorded user edit {id}");
                Ok(())
            }
        },
        Commands::Search {
            scope,
            query,
            agent,
            top_k,
            lambda,
        } => {
            let options = SearchOptions {
                top_k,
                lambda,
                ..SearchOptions::default()
            };
            let agent = agent.as_deref();
            match scope {
                SearchScope::Entries => {
                    print_json(&service.search_memory_entries(&query, agent, options).await?)
                }
                SearchScope::Conversations => {
                    print_json(&service.search_conversations(&query, agent, options).await?)
                }
                SearchScope::Summaries => {
                    print_json(&service.search_summaries(&query, agent, options).await?)
                }
            }
        }
        Commands::Graph {
            entity,
            relation,
            depth,
        } => print_json(
            &service
                .search_graph(entity.as_deref(), relation.as_deref(), depth)
                .await?,
        ),
        Commands::Context { agent } => {
            let block = service
                .assemble_context(&agent, service.context_config())
                .await?;
            if block.is_empty() {
                println!("(no context for {agent})");
            } else {
                println!("{block}");
            }
            Ok(())
        }
        Commands::Index { action } => match action {
            IndexCommands::Rebuild => match service.rebuild_index().await? {
                Some(count) => {
                    println!("re-indexed {count} entries");
                    Ok(())
                }
                None => Err(MnemaError::search_index("index unavailable or rebuild failed")),
            },
            IndexCommands::Reset => {
                if service.reset_index().await {
                    println!("index reset");
                    Ok(())
                } else {
                    Err(MnemaError::search_index("index unavailable or reset failed"))
                }
            }
        },
        Commands::Status { json } => {
            let report = service.status().await?;
            if json {
                print_json(&report)
            } else {
                print!("{}", format_status(&report));
                Ok(())
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), MnemaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MnemaError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Plain text rendering of a status report.
fn format_status(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str("\n  mnema status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));
    let profile = report
        .profile_version
        .map(|v| format!("v{v}"))
        .unwrap_or_else(|| "none".to_string());
    out.push_str(&format!("    Profile:  {profile}\n"));
    out.push_str(&format!(
        "    Pending:  {} contribution(s)\n",
        report.unincorporated_contributions
    ));
    let index = if report.index_available {
        "[OK] available"
    } else {
        "[--] text fallback"
    };
    out.push_str(&format!("    Index:    {index}\n"));
    if report.agents.is_empty() {
        out.push_str("    Agents:   no pending signals\n");
    } else {
        out.push_str("    Agents:\n");
        for agent in &report.agents {
            out.push_str(&format!(
                "      {:<20} {:>4} signal(s)  {}\n",
                agent.agent_id, agent.pending_signals, agent.processing
            ));
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnema_core::ProcessingStatus;
    use mnema_memory::service::AgentStatus;
    use mnema_test_utils::MockModel;

    fn temp_config(dir: &tempfile::TempDir) -> MnemaConfig {
        let mut config = MnemaConfig::default();
        config.storage.database_path = dir.path().join("mnema.db").to_string_lossy().into_owned();
        config
    }

    #[test]
    fn format_status_lists_agents() {
        let report = StatusReport {
            agents: vec![AgentStatus {
                agent_id: "coder".into(),
                pending_signals: 4,
                processing: ProcessingStatus::Idle,
            }],
            unincorporated_contributions: 2,
            profile_version: Some(3),
            index_available: true,
        };
        let text = format_status(&report);
        assert!(text.contains("Profile:  v3"));
        assert!(text.contains("2 contribution(s)"));
        assert!(text.contains("[OK] available"));
        assert!(text.contains("coder"));
        assert!(text.contains("4 signal(s)"));
    }

    #[test]
    fn format_status_without_profile_or_agents() {
        let report = StatusReport {
            agents: vec![],
            unincorporated_contributions: 0,
            profile_version: None,
            index_available: false,
        };
        let text = format_status(&report);
        assert!(text.contains("Profile:  none"));
        assert!(text.contains("no pending signals"));
        assert!(text.contains("text fallback"));
    }

    #[tokio::test]
    async fn runtime_shares_the_storage_database_for_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        let runtime = Runtime::open(&config, Arc::new(MockModel::new()))
            .await
            .unwrap();

        let status = runtime.service().status().await.unwrap();
        assert!(status.index_available);
        assert_eq!(status.profile_version, None);

        runtime
            .service()
            .record_conversation_chunk("coder", "c1", 0, "user", "borrow checker question")
            .await
            .unwrap();
        let found = runtime
            .service()
            .search_conversations("borrow", None, SearchOptions::default())
            .await
            .unwrap();
        assert!(!found.fallback);
        assert_eq!(found.results.len(), 1);
        runtime.close().await.unwrap();
    }

    #[tokio::test]
    async fn runtime_with_index_disabled_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        config.index.enabled = false;
        let runtime = Runtime::open(&config, Arc::new(MockModel::new()))
            .await
            .unwrap();

        assert!(!runtime.service().status().await.unwrap().index_available);
        assert_eq!(runtime.service().rebuild_index().await.unwrap(), None);
        runtime.close().await.unwrap();
    }

    #[tokio::test]
    async fn runtime_with_separate_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        let index_path = dir.path().join("index.db");
        config.index.database_path = Some(index_path.to_string_lossy().into_owned());
        let runtime = Runtime::open(&config, Arc::new(MockModel::new()))
            .await
            .unwrap();

        assert!(runtime.service().status().await.unwrap().index_available);
        assert_eq!(runtime.service().rebuild_index().await.unwrap(), Some(0));
        assert!(index_path.exists());
        runtime.close().await.unwrap();
    }
}
