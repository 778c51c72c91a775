//! # newswire
//!
//! A scheduled news-ingestion pipeline. Articles are pulled from a news
//! search API, deduplicated against what is already stored, given a full
//! body by scraping the article page when the API only returned a snippet,
//! normalized into posts and persisted. A retention sweep keeps the number
//! of ingested posts bounded.
//!
//! ## Architecture
//!
//! 1. **Fetch**: [`source::NewsApiClient`] maps a [`models::Category`] onto an upstream query
//! 2. **Dedupe**: [`pipeline::DedupeGate`] skips articles already stored
//! 3. **Extract**: [`scrapers::extractor::ContentExtractor`] scrapes missing bodies
//! 4. **Normalize**: [`normalize::to_post`] derives slug, tags, keywords and read time
//! 5. **Persist**: [`store::Store`], backed by [`store::JsonStore`]
//!
//! [`scheduler::Scheduler`] runs fetches and sweeps on cron timers and
//! [`server`] exposes the jobs over HTTP.

pub mod cache;
pub mod cli;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod scrapers;
pub mod server;
pub mod source;
pub mod store;
pub mod utils;
