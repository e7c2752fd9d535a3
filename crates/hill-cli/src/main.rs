use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hill_storage::PgStore;
use hill_sync::{RunScope, SyncConfig, SyncPipeline};

#[derive(Debug, Parser)]
#[command(name = "hill-cli")]
#[command(about = "Congressional record ingester")]
struct Cli {
    /// Congress number to ingest
    #[arg(long, env = "HILL_CONGRESS")]
    congress: Option<i32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bills, actions and summaries, then house votes
    Sync,
    /// Bills, actions and summaries only
    Bills,
    /// House roll-call votes and member votes only
    Votes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hill_sync=info,hill_storage=info,hill_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::from_env();
    if let Some(congress) = cli.congress {
        config.congress = congress;
    }

    let scope = match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => RunScope::All,
        Commands::Bills => RunScope::Bills,
        Commands::Votes => RunScope::Votes,
    };

    info!(congress = config.congress, "connecting to store");
    let store = Arc::new(
        PgStore::connect(&config.database_url)
            .await
            .context("connecting to the store")?,
    );

    // run failures are logged inside run(); the store is closed either way
    let pipeline = SyncPipeline::new(config, Arc::clone(&store))?;
    let summary = pipeline.run(scope).await;
    store.close().await;

    println!(
        "sync complete: run_id={} bills={}/{} actions={}/{} summaries={}/{} votes={}/{} member_votes={}/{}",
        summary.run_id,
        summary.bills.succeeded,
        summary.bills.total(),
        summary.actions.succeeded,
        summary.actions.total(),
        summary.summaries.succeeded,
        summary.summaries.total(),
        summary.votes.succeeded,
        summary.votes.total(),
        summary.member_votes.succeeded,
        summary.member_votes.total(),
    );

    Ok(())
}
