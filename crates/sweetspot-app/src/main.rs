// Sweet-spot screener entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; stdout carries the JSON report)
// 2. Load config, copying defaults on first run
// 3. Open the store
// 4. Dispatch the subcommand on a blocking task

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use sweetspot_app::config;
use sweetspot_app::runner::{self, Feed};
use sweetspot_core::db::Database;
use sweetspot_engine::RunRequest;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "sweetspot", version, about = "Screen player props for sweet-spot picks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load one CSV feed into the store.
    Import {
        #[arg(value_enum)]
        feed: Feed,
        path: PathBuf,
    },
    /// Run the screener and print the report as JSON.
    Run {
        /// Analysis date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only screen this category.
        #[arg(long)]
        category: Option<String>,
        /// Override every category's minimum hit rate.
        #[arg(long)]
        min_hit_rate: Option<f64>,
        /// Ignore a cached report for the same date.
        #[arg(long)]
        force_refresh: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("sweetspot starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} categories (rules {}), store at {}",
        config.rules.len(),
        config.rules.version,
        config.db_path.display()
    );

    let db_path = config.db_path.to_string_lossy().into_owned();
    let db = Arc::new(Database::open(&db_path).context("failed to open database")?);

    match cli.command {
        Command::Import { feed, path } => {
            let db = Arc::clone(&db);
            let written = tokio::task::spawn_blocking(move || runner::import_feed(&db, feed, &path))
                .await
                .context("import task panicked")??;
            println!("{written}");
        }
        Command::Run {
            date,
            category,
            min_hit_rate,
            force_refresh,
        } => {
            let request = RunRequest {
                analysis_date: date.unwrap_or_else(|| Local::now().date_naive()),
                category,
                min_hit_rate,
                force_refresh,
            };
            let db = Arc::clone(&db);
            let report = tokio::task::spawn_blocking(move || {
                runner::run_cached(&db, &config.rules, &config.engine, &request)
            })
            .await
            .context("run task panicked")?;

            let report = match report {
                Ok(report) => report,
                Err(e) => {
                    error!("run failed: {e:#}");
                    return Err(e);
                }
            };
            let json = serde_json::to_string_pretty(&report).context("failed to render report")?;
            println!("{json}");
        }
    }

    info!("sweetspot finished");
    Ok(())
}

/// Initialize tracing to log to a file so stdout stays machine-readable.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("sweetspot.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sweetspot=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
