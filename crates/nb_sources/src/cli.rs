use clap::{Args, Subcommand};
use nb_core::Result;

use crate::orchestrator::FetchOrchestrator;

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub command: SourceCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SourceCommands {
    /// List registered sources with availability and freshness
    List,
    /// Show whether one source needs a refresh
    Status {
        /// Source tag, e.g. newsapi
        tag: String,
    },
}

pub async fn handle_command(args: SourceArgs, orchestrator: &FetchOrchestrator) -> Result<()> {
    let statuses = orchestrator.source_statuses().await?;
    match args.command {
        SourceCommands::List => {
            println!("Registered sources:");
            for status in statuses {
                let availability = if status.available { "configured" } else { "not configured" };
                let freshness = if status.stale { "stale" } else { "fresh" };
                let last = status
                    .last_fetched_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "  - {} ({}, {}, max-age {}m, last fetch {})",
                    status.tag,
                    availability,
                    freshness,
                    status.max_age_secs / 60,
                    last
                );
            }
        }
        SourceCommands::Status { tag } => {
            let status = statuses
                .into_iter()
                .find(|s| s.tag == tag)
                .ok_or_else(|| nb_core::Error::Config(format!("unknown source '{tag}'")))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
