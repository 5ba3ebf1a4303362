//! `cflow graph` read commands.

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use cflow_core::StateFilter;
use cflow_graph::queries::{self, issues};
use cflow_graph::GraphClient;

use crate::config::Config;
use crate::output;

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Show node and relationship counts
    Status,

    /// List issues of a repository
    Issues {
        /// Repository as owner/repo
        repo: String,
        /// open, closed or all
        #[arg(long, default_value = "open")]
        state: StateFilter,
        /// Only open issues carrying any of these labels
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Count nodes per label
    Labels,

    /// Show milestone progress
    Milestones {
        repo: String,
        /// Milestone number
        #[arg(long)]
        number: Option<i64>,
    },

    /// Show project boards and their columns
    Board {
        repo: String,
        /// Project number
        #[arg(long)]
        number: Option<i64>,
    },

    /// Search issue titles and bodies
    Search {
        query: String,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub async fn execute(cmd: GraphCommands, config: &Config) -> Result<()> {
    let client = GraphClient::connect(&config.graph).await?;

    match cmd {
        GraphCommands::Status => cmd_status(&client).await,
        GraphCommands::Issues {
            repo,
            state,
            labels,
            limit,
        } => cmd_issues(&client, &repo, state, &labels, limit).await,
        GraphCommands::Labels => cmd_labels(&client).await,
        GraphCommands::Milestones { repo, number } => cmd_milestones(&client, &repo, number).await,
        GraphCommands::Board { repo, number } => cmd_board(&client, &repo, number).await,
        GraphCommands::Search { query, repo, limit } => cmd_search(&client, &query, repo.as_deref(), limit).await,
    }
}

async fn cmd_status(client: &GraphClient) -> Result<()> {
    println!("{}", "Graph Status".bold());
    println!("{}", "─".repeat(40));

    let counts = client.get_counts().await?;
    println!("  Nodes:         {}", counts.nodes.to_string().cyan());
    println!("  Relationships: {}", counts.relationships.to_string().cyan());

    println!("{}", "─".repeat(40));
    Ok(())
}

async fn cmd_issues(client: &GraphClient, repo: &str, state: StateFilter, labels: &[String], limit: usize) -> Result<()> {
    let found = if labels.is_empty() {
        issues::find_issues_by_repo(client, repo, state, limit).await?
    } else {
        issues::find_open_issues_with_labels(client, labels, Some(repo), limit).await?
    };

    println!("{} {}", "Issues of".bold(), repo.cyan());
    output::print_issues_table(&found);
    Ok(())
}

async fn cmd_labels(client: &GraphClient) -> Result<()> {
    let counts = queries::label_counts(client).await?;
    if counts.is_empty() {
        println!("{}", "Graph is empty.".dimmed());
        return Ok(());
    }

    for (label, count) in counts {
        println!("  {:<20} {}", label, count.to_string().cyan());
    }
    Ok(())
}

async fn cmd_milestones(client: &GraphClient, repo: &str, number: Option<i64>) -> Result<()> {
    let milestones = issues::get_milestone_progress(client, repo, number).await?;
    output::print_milestones(&milestones);
    Ok(())
}

async fn cmd_board(client: &GraphClient, repo: &str, number: Option<i64>) -> Result<()> {
    let boards = issues::get_project_board(client, repo, number).await?;
    output::print_boards(&boards);
    Ok(())
}

async fn cmd_search(client: &GraphClient, text: &str, repo: Option<&str>, limit: usize) -> Result<()> {
    let found = issues::search_issues(client, text, repo, limit).await?;
    println!("{} \"{}\"", "Results for".bold(), text.yellow());
    output::print_issues_table(&found);
    Ok(())
}
