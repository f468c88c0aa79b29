//! learnsync CLI - operate the offline sync engine from the terminal
//!
//! Queue records, run passes, and settle conflicts against the local database.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, ConflictCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::conflicts::{run_conflicts_clear, run_conflicts_list, run_conflicts_resolve};
use crate::commands::enqueue::run_enqueue;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "learnsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Sync { json } => run_sync(json, &db_path).await?,
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Enqueue { kind, file } => {
            run_enqueue(&kind, file.as_deref(), &db_path).await?;
        }
        Commands::Conflicts { command } => match command {
            ConflictCommands::List { json } => run_conflicts_list(json, &db_path).await?,
            ConflictCommands::Resolve { id, resolution } => {
                run_conflicts_resolve(&id, resolution.into(), &db_path).await?;
            }
            ConflictCommands::Clear => run_conflicts_clear(&db_path).await?,
        },
        Commands::Watch { json } => run_watch(json, &db_path).await?,
    }

    Ok(())
}
