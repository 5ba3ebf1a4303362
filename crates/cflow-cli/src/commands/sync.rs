//! `cflow sync` commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::info;

use cflow_collect::{
    collect_architecture, CollectionSummary, GitHubClient, GitHubCollector, GitHubSource, JiraClient, JiraCollector,
    JiraSource, RetryClient,
};
use cflow_core::ArchitectureManifest;
use cflow_graph::{ensure_schema, GraphStore};

use super::open_store;
use crate::config::Config;
use crate::output;

#[derive(Args, Clone, Copy)]
pub struct SyncFlags {
    /// Write to an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Collect GitHub repositories
    Github {
        /// Repositories as owner/repo (defaults to [github].repositories)
        repos: Vec<String>,
        #[command(flatten)]
        flags: SyncFlags,
    },

    /// Collect Jira projects
    Jira {
        /// Project keys (defaults to [jira].projects)
        keys: Vec<String>,
        #[command(flatten)]
        flags: SyncFlags,
    },

    /// Collect an architecture manifest
    Architecture {
        /// Manifest file (defaults to [architecture].manifest)
        file: Option<PathBuf>,
        #[command(flatten)]
        flags: SyncFlags,
    },

    /// Collect everything configured
    All {
        #[command(flatten)]
        flags: SyncFlags,
    },
}

pub async fn execute(cmd: SyncCommands, config: &Config) -> Result<()> {
    match cmd {
        SyncCommands::Github { repos, flags } => {
            let repos = or_configured(repos, &config.github.repositories, "[github].repositories")?;
            let store = prepare(config, flags).await?;
            let summary = sync_github(config, store.clone(), &repos).await?;
            finish(store.as_ref(), summary, flags).await
        }
        SyncCommands::Jira { keys, flags } => {
            let keys = or_configured(keys, &config.jira.projects, "[jira].projects")?;
            let store = prepare(config, flags).await?;
            let summary = sync_jira(config, store.clone(), &keys).await?;
            finish(store.as_ref(), summary, flags).await
        }
        SyncCommands::Architecture { file, flags } => {
            let file = file
                .or_else(|| config.architecture.manifest.clone())
                .context("No manifest given and [architecture].manifest is not set")?;
            let store = prepare(config, flags).await?;
            let summary = sync_architecture(store.as_ref(), &file).await?;
            finish(store.as_ref(), summary, flags).await
        }
        SyncCommands::All { flags } => {
            let store = prepare(config, flags).await?;
            let mut summary = CollectionSummary::new();

            if !config.github.repositories.is_empty() {
                summary.extend(sync_github(config, store.clone(), &config.github.repositories).await?);
            }
            if !config.jira.projects.is_empty() {
                summary.extend(sync_jira(config, store.clone(), &config.jira.projects).await?);
            }
            if let Some(manifest) = &config.architecture.manifest {
                summary.extend(sync_architecture(store.as_ref(), manifest).await?);
            }

            if summary.scopes.is_empty() {
                println!("{}", "Nothing configured to collect.".dimmed());
                return Ok(());
            }
            finish(store.as_ref(), summary, flags).await
        }
    }
}

fn or_configured(given: Vec<String>, configured: &[String], key: &str) -> Result<Vec<String>> {
    if !given.is_empty() {
        return Ok(given);
    }
    if configured.is_empty() {
        bail!("Nothing to collect: pass scopes or set {}", key);
    }
    Ok(configured.to_vec())
}

/// Open the store and make sure the schema is in place.
async fn prepare(config: &Config, flags: SyncFlags) -> Result<Arc<dyn GraphStore>> {
    let store = open_store(config, flags.dry_run).await?;
    let schema = ensure_schema(store.as_ref()).await;
    if !schema.is_complete() {
        println!(
            "{} {} schema declaration(s) failed, continuing",
            "warning:".yellow().bold(),
            schema.failed.len()
        );
    }
    Ok(store)
}

async fn sync_github(config: &Config, store: Arc<dyn GraphStore>, repos: &[String]) -> Result<CollectionSummary> {
    let client = GitHubClient::new(&config.github)?;
    let source = GitHubSource::new(Arc::new(client), RetryClient::new(config.collection.retry_policy()));
    let collector = GitHubCollector::new(source, store, config.collection.clone());
    Ok(collector.collect_all(repos).await)
}

async fn sync_jira(config: &Config, store: Arc<dyn GraphStore>, keys: &[String]) -> Result<CollectionSummary> {
    let client = JiraClient::new(&config.jira)?;
    let source = JiraSource::new(Arc::new(client), RetryClient::new(config.collection.retry_policy()));
    let collector = JiraCollector::new(source, store);
    Ok(collector.collect_all(keys).await)
}

async fn sync_architecture(store: &dyn GraphStore, path: &Path) -> Result<CollectionSummary> {
    let manifest = ArchitectureManifest::load(path)
        .with_context(|| format!("Failed to load architecture manifest {}", path.display()))?;
    info!(path = %path.display(), elements = manifest.len(), "Loaded architecture manifest");

    let mut summary = CollectionSummary::new();
    summary.push(collect_architecture(store, &manifest).await);
    Ok(summary)
}

async fn finish(store: &dyn GraphStore, summary: CollectionSummary, flags: SyncFlags) -> Result<()> {
    if flags.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::print_summary(&summary);
        let counts = store.counts().await?;
        println!(
            "  Graph now holds {} nodes, {} relationships",
            counts.nodes.to_string().cyan(),
            counts.relationships.to_string().cyan()
        );
    }

    if summary.failed() > 0 {
        bail!("{} scope(s) failed", summary.failed());
    }
    Ok(())
}
