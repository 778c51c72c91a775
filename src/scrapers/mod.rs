//! Page scrapers used by the ingestion pipeline.
//!
//! The news API is the primary source of article metadata; scraping is only
//! a fallback for filling in article bodies the API did not provide.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`extractor`] | Fetch an article page and heuristically extract its main text |
//!
//! Scrapers never fail the pipeline: fetch or parse problems are logged and
//! degrade to a fixed placeholder string.

pub mod extractor;
