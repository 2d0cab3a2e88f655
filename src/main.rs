//! Second Brain CLI - main entry point
//!
//! Runs the Telegram bot, batch import, or one-shot ingest/ask.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use second_brain::commands::{self, Services};
use second_brain::knowledge::record::SourceType;
use second_brain::ratelimit::RateLimiter;
use second_brain::{metrics, Secrets, Settings};

#[derive(Parser)]
#[command(name = "second_brain")]
#[command(about = "Telegram Second Brain assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (long polling)
    Bot,

    /// Batch-import a directory of notes, screenshots and recordings
    Import {
        /// Directory to import (one level, non-recursive)
        directory: PathBuf,

        /// Requests per minute for the import rate limiter
        #[arg(long)]
        rate_per_minute: Option<f64>,
    },

    /// Ask a question against the stored knowledge
    Ask {
        /// The question
        query: String,
    },

    /// Ingest a single piece of text
    Ingest {
        /// The raw text to structure and store
        text: String,

        /// Source label for the entry
        #[arg(short, long, default_value = "Personal Thought")]
        source: String,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Bot => "bot",
            Commands::Import { .. } => "import",
            Commands::Ask { .. } => "ask",
            Commands::Ingest { .. } => "ingest",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("second_brain=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    metrics::record_pipeline_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command).await;

    metrics::record_pipeline_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    let secrets = Secrets::from_env()?;
    let settings = Settings::from_env();

    match command {
        Commands::Bot => {
            let services = Services::init(&secrets, &settings).await?;
            commands::bot::run(&secrets.telegram_bot_token, services).await?;
        }

        Commands::Import {
            directory,
            rate_per_minute,
        } => {
            let services = Services::init(&secrets, &settings).await?;
            let limiter = RateLimiter::per_minute(
                rate_per_minute.unwrap_or(settings.import_rate_per_minute),
            );

            let summary = commands::import::run(
                &directory,
                &services.media,
                &services.ingest,
                &limiter,
            )
            .await?;

            println!("{}", summary.report());
        }

        Commands::Ask { query } => {
            let services = Services::init(&secrets, &settings).await?;
            let answer = services.retrieval.answer(&query).await;
            println!("{}", answer);
        }

        Commands::Ingest { text, source } => {
            let source = SourceType::from_label(&source)
                .ok_or_else(|| anyhow::anyhow!("Unknown source label: '{}'", source))?;

            let services = Services::init(&secrets, &settings).await?;
            match services.ingest.ingest(&text, source).await {
                Ok(stored) => {
                    println!(
                        "Stored '{}' as {}",
                        stored.record.core_content.title, stored.id
                    );
                }
                Err(e) => {
                    anyhow::bail!("{} ({})", e.user_message(), e);
                }
            }
        }
    }

    Ok(())
}
