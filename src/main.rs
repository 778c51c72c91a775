//! # newswire
//!
//! Entry point: parses the CLI, opens the store and runs one command.
//!
//! ```sh
//! NEWS_API_KEY=... newswire serve --start-scheduler
//! newswire fetch -c business -l 5
//! ```

use clap::Parser;
use newswire::cli::{Cli, Command};
use newswire::pipeline::{DedupeMode, Ingestor, RetentionSweeper};
use newswire::scheduler::Scheduler;
use newswire::scrapers::extractor::ContentExtractor;
use newswire::server::{self, AppState};
use newswire::source::NewsApiClient;
use newswire::store::{JsonStore, Store};
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(store = %args.store.display(), command = ?args.command, "Parsed CLI arguments");

    let store: Arc<dyn Store> = match JsonStore::open(&args.store).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(
                path = %args.store.display(),
                error = %e,
                "Could not open store (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    };

    match &args.command {
        Command::Serve {
            bind,
            start_scheduler,
        } => {
            let ingestor = Arc::new(build_ingestor(&args, store)?);
            let scheduler = Arc::new(Scheduler::new(Arc::clone(&ingestor))?);
            if *start_scheduler {
                scheduler.start();
            }
            let state = AppState::new(ingestor, Arc::clone(&scheduler));
            server::serve(state, *bind, shutdown_signal()).await?;
            scheduler.stop().await;
        }
        Command::Fetch(batch) => {
            let ingestor = build_ingestor(&args, store)?;
            let report = ingestor
                .ingest(batch.category, batch.limit, DedupeMode::TitleOrSource)
                .await?;
            print_json(&report)?;
        }
        Command::Preview(batch) => {
            let ingestor = build_ingestor(&args, store)?;
            print_json(&ingestor.preview(batch.category, batch.limit).await?)?;
        }
        Command::Sweep => {
            let report = RetentionSweeper::default().sweep(store.as_ref()).await?;
            print_json(&report)?;
        }
        Command::Backfill { limit } => {
            let ingestor = build_ingestor(&args, store)?;
            print_json(&ingestor.backfill(*limit).await?)?;
        }
    }

    info!(elapsed = ?start_time.elapsed(), "newswire finished");
    Ok(())
}

fn build_ingestor(args: &Cli, store: Arc<dyn Store>) -> Result<Ingestor, Box<dyn Error>> {
    let source = NewsApiClient::new(args.source_config())?;
    let extractor = ContentExtractor::new(args.extractor_config())?;
    Ok(Ingestor::new(source, extractor, store, args.ingestor_config()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
