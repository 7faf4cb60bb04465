// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mnema - long-term memory for conversational agents.
//!
//! Operator CLI over the memory pipeline: drain pending signals, inspect and
//! edit the user profile, search, preview context blocks, and maintain the
//! search index.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod invoker;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Mnema - long-term memory for conversational agents.
#[derive(Parser, Debug)]
#[command(name = "mnema", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run batched extraction for every agent with pending signals.
    Sync,
    /// Run batched extraction for one agent.
    Process {
        /// Agent whose pending signals should be processed.
        agent: String,
    },
    /// Inspect or maintain the user profile.
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
    /// Search entries, conversation chunks or summaries.
    Search {
        /// What to search.
        #[arg(value_enum)]
        scope: SearchScope,
        /// Query text.
        query: String,
        /// Restrict results to one agent.
        #[arg(long)]
        agent: Option<String>,
        /// Number of results to return.
        #[arg(long)]
        top_k: Option<usize>,
        /// Relevance/diversity trade-off (1.0 = pure relevance).
        #[arg(long)]
        lambda: Option<f64>,
    },
    /// Look up knowledge graph edges.
    Graph {
        /// Start traversal from this entity.
        #[arg(long)]
        entity: Option<String>,
        /// Only follow edges with this relation.
        #[arg(long)]
        relation: Option<String>,
        /// Traversal depth.
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },
    /// Print the context block that would be injected for an agent.
    Context {
        /// Agent to assemble context for.
        agent: String,
    },
    /// Maintain the search index.
    Index {
        #[command(subcommand)]
        action: IndexCommands,
    },
    /// Show pending signals, processing state and profile version.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommands {
    /// Print the current profile.
    Show,
    /// Regenerate the profile now, regardless of the threshold.
    Regenerate,
    /// Record a user override that every future profile must honor.
    Edit {
        /// Override text.
        text: String,
    },
}

#[derive(Subcommand, Debug)]
enum IndexCommands {
    /// Re-index every active entry.
    Rebuild,
    /// Drop every indexed document.
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SearchScope {
    Entries,
    Conversations,
    Summaries,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => mnema_config::load_and_validate_path(path),
        None => mnema_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            mnema_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let Some(command) = cli.command else {
        println!("mnema: use --help for available commands");
        return;
    };

    if let Err(e) = commands::run(command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnema={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
