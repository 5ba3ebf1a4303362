//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use cflow_graph::{GraphClient, GraphStore, MemoryGraph};

use crate::config::Config;

pub mod code;
pub mod graph;
pub mod schema;
pub mod sync;

/// ContextFlow - sync GitHub, Jira and architecture data into a graph
#[derive(Parser)]
#[command(name = "cflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to ./contextflow.toml when present)
    #[arg(short, long, global = true, env = "CFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create graph constraints and indexes
    Schema(schema::SchemaArgs),

    /// Collect from trackers into the graph
    #[command(subcommand)]
    Sync(sync::SyncCommands),

    /// Query the graph
    #[command(subcommand)]
    Graph(graph::GraphCommands),

    /// Inspect source files
    #[command(subcommand)]
    Code(code::CodeCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Schema(args) => schema::execute(args, &config).await,
            Commands::Sync(cmd) => sync::execute(cmd, &config).await,
            Commands::Graph(cmd) => graph::execute(cmd, &config).await,
            Commands::Code(cmd) => code::execute(cmd),
        }
    }
}

/// Neo4j, or an in-memory graph for dry runs.
pub(crate) async fn open_store(config: &Config, dry_run: bool) -> Result<Arc<dyn GraphStore>> {
    if dry_run {
        eprintln!("{}", "Dry run: writing to an in-memory graph".yellow());
        return Ok(Arc::new(MemoryGraph::new()));
    }
    Ok(Arc::new(GraphClient::connect(&config.graph).await?))
}
