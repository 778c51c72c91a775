//! Error types for the ingestion pipeline.
//!
//! Content extraction has no error type on purpose: it degrades to a sentinel
//! string instead (see [`crate::scrapers::extractor`]).

use thiserror::Error;
use uuid::Uuid;

/// Failures talking to the news API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("news API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("news API returned status {status:?}: {message}")]
    Status { status: String, message: String },

    #[error("news API returned an undecodable body (HTTP {http_status}): {source}")]
    Decode {
        http_status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("news API misconfigured: {0}")]
    Config(String),
}

/// Failures reported by a [`crate::store::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A post with the same title or source URL already exists.
    #[error("duplicate post: {0}")]
    Duplicate(String),

    /// A record was rejected before it reached storage.
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is corrupt: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures that abort a whole pipeline operation.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expression:?}: {source}")]
    Cron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let e = SourceError::Status {
            status: "error".to_string(),
            message: "Your API key is invalid.".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "news API returned status \"error\": Your API key is invalid."
        );
    }

    #[test]
    fn test_ingest_error_is_transparent() {
        let e: IngestError = StoreError::Duplicate("Same title".to_string()).into();
        assert_eq!(e.to_string(), "duplicate post: Same title");
    }
}
