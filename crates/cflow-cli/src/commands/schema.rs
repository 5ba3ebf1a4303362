//! `cflow schema`

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use cflow_graph::ensure_schema;

use super::open_store;
use crate::config::Config;
use crate::output;

#[derive(Args)]
pub struct SchemaArgs {
    /// Apply against an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: SchemaArgs, config: &Config) -> Result<()> {
    println!("{}", "Applying graph schema...".bold());

    let store = open_store(config, args.dry_run).await?;
    let report = ensure_schema(store.as_ref()).await;
    output::print_schema_report(&report);

    if !report.is_complete() {
        bail!("{} schema declaration(s) failed", report.failed.len());
    }
    Ok(())
}
