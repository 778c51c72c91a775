//! Command-line interface definitions for newswire.
//!
//! Every global option can also be supplied through the environment, so the
//! same binary works from a shell, a container or a systemd unit.

use crate::models::Category;
use crate::pipeline::{DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_NAME, DEFAULT_BACKFILL_LIMIT, IngestorConfig};
use crate::scrapers::extractor::ExtractorConfig;
use crate::source::{DEFAULT_BASE_URL, SourceConfig};
use clap::{Args, Parser, Subcommand};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Scheduled news ingestion.
///
/// # Examples
///
/// ```sh
/// # Serve the HTTP API and start the cron jobs
/// NEWS_API_KEY=... newswire serve --start-scheduler
///
/// # One-off ingestion of five business headlines
/// newswire --news-api-key ... fetch -c business -l 5
///
/// # Trim ingested posts to the newest 50
/// newswire sweep
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// News API key. Needed by every command except `sweep`
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Base URL of the news API
    #[arg(long, env = "NEWS_API_URL", default_value = DEFAULT_BASE_URL)]
    pub news_api_url: String,

    /// Path of the JSON store file
    #[arg(long, env = "NEWSWIRE_STORE", default_value = "data/newswire.json")]
    pub store: PathBuf,

    /// Email of the admin user ingested posts are attributed to
    #[arg(long, env = "NEWSWIRE_ADMIN_EMAIL", default_value = DEFAULT_ADMIN_EMAIL)]
    pub admin_email: String,

    /// Display name of that admin user
    #[arg(long, env = "NEWSWIRE_ADMIN_NAME", default_value = DEFAULT_ADMIN_NAME)]
    pub admin_name: String,

    /// Timeout in seconds for article page fetches
    #[arg(long, env = "NEWSWIRE_FETCH_TIMEOUT_SECS", default_value_t = 15)]
    pub fetch_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = "NEWSWIRE_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Start the cron jobs immediately instead of waiting for the API
        #[arg(long)]
        start_scheduler: bool,
    },
    /// Fetch a category and store the new articles
    Fetch(BatchArgs),
    /// Fetch a category without storing anything
    Preview(BatchArgs),
    /// Delete ingested posts beyond the newest 50
    Sweep,
    /// Retry content extraction for posts with placeholder bodies
    Backfill {
        #[arg(short, long, default_value_t = DEFAULT_BACKFILL_LIMIT)]
        limit: usize,
    },
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// tech, business, health or science (anything else means tech)
    #[arg(short, long, default_value = "tech", value_parser = parse_category)]
    pub category: Category,

    /// Maximum number of articles to request
    #[arg(short, long, default_value_t = 10)]
    pub limit: u32,
}

fn parse_category(raw: &str) -> Result<Category, Infallible> {
    Ok(Category::parse(raw))
}

impl Cli {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig::new(self.news_api_key.clone().unwrap_or_default())
            .with_base_url(self.news_api_url.clone())
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..Default::default()
        }
    }

    pub fn ingestor_config(&self) -> IngestorConfig {
        IngestorConfig {
            admin_email: self.admin_email.clone(),
            admin_name: self.admin_name.clone(),
            ..Default::default()
        }
    }
}
