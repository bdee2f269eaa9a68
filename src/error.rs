use std::time::Duration;
use thiserror::Error;

/// Errors raised by the routing core and the adapters it consumes
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to fetch documents: {0}")]
    Fetch(String),

    #[error("Failed to write document: {0}")]
    Write(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Completion failed: {0}")]
    Completion(String),

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("{operation} task failed: {reason}")]
    Task {
        operation: &'static str,
        reason: String,
    },

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Embedding dimension mismatch: got {got}, expected {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("A reindex is already running")]
    ReindexInProgress,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Timeouts are the only failures the router retries
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
