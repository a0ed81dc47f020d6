use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dataset;
mod episodes;
mod error;
mod models;
mod pipeline;
mod ratings;
mod services;

use config::AppConfig;
use pipeline::RunOptions;

#[derive(Parser)]
#[command(name = "friendly-fire-tracker")]
#[command(about = "Builds the Friendly Fire movie dataset and merges host ratings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape episodes, enrich them and publish movies.json / metadata.json
    Refresh {
        /// Reuse the episode list from the previous dataset
        #[arg(long)]
        skip_scraping: bool,

        /// Reuse metadata and streaming data from the previous dataset
        #[arg(long)]
        skip_apis: bool,

        /// Reuse streaming data from the previous dataset
        #[arg(long)]
        skip_streaming: bool,
    },

    /// Fuzzy-merge a ratings CSV export into the dataset
    MergeRatings {
        /// Ratings CSV (Title or Name, Year, AR, BR, JR, Rating, Rating Notes)
        csv_file: PathBuf,

        /// Write the merged dataset here instead of over movies.json
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report matches without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "friendly_fire_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load();
    config.log_config();

    match cli.command {
        Commands::Refresh {
            skip_scraping,
            skip_apis,
            skip_streaming,
        } => {
            let options = RunOptions {
                skip_scraping,
                skip_apis,
                skip_streaming,
            };
            tracing::info!("Starting refresh ({:?})", options);

            match pipeline::refresh(&config, options).await {
                Ok(summary) => summary.log(),
                Err(e) => {
                    tracing::error!("Pipeline failed at the {} stage: {}", e.stage(), e);
                    return Err(e).context("refresh failed");
                }
            }
        }

        Commands::MergeRatings {
            csv_file,
            output,
            dry_run,
        } => {
            let report = pipeline::merge_ratings_file(&config, &csv_file, output.as_deref(), dry_run)
                .await
                .map_err(|e| {
                    tracing::error!("Rating merge failed at the {} stage: {}", e.stage(), e);
                    e
                })
                .with_context(|| format!("failed to merge ratings from {}", csv_file.display()))?;

            println!("{}", report);
        }
    }

    Ok(())
}
