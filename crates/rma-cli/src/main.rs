use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::Connection;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rma-cli")]
#[command(about = "Rental marketplace analytics sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy all entities from the production database into the analytics database.
    Sync {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Create the analytics schema without syncing any data.
    Migrate,
    /// Run the sync on the configured cron schedule until interrupted.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync { yes: false }) {
        Commands::Sync { yes } => {
            if !yes && !confirm_sync()? {
                eprintln!("sync cancelled");
                return Ok(());
            }
            match rma_sync::run_sync_once_from_env().await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report.counts_json())?);
                }
                Err(err) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&rma_sync::error_json(&err.to_string()))?
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Migrate => {
            let settings = rma_storage::SyncSettings::from_env()?;
            let mut conn = rma_storage::connect(&settings.target)
                .await
                .context("connecting to analytics database")?;
            rma_storage::ensure_schema(&mut conn)
                .await
                .context("creating analytics schema")?;
            conn.close().await.context("closing connection")?;
            println!("analytics schema is up to date");
        }
        Commands::Schedule => {
            let settings = rma_storage::SyncSettings::from_env()?;
            let schedule = rma_sync::ScheduleConfig::from_env();
            match rma_sync::maybe_build_scheduler(settings, &schedule).await? {
                Some(mut sched) => {
                    sched.start().await.context("starting scheduler")?;
                    eprintln!("scheduler running ({}); press Ctrl-C to stop", schedule.cron);
                    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
                }
                None => eprintln!("scheduler disabled; set RMA_SCHEDULER_ENABLED=1"),
            }
        }
    }

    Ok(())
}

/// The gate runs before any database connection is opened; declining here
/// is the only way to cancel a sync.
fn confirm_sync() -> Result<bool> {
    eprint!("This copies data from the production database into the analytics database. Continue? (y/N): ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
