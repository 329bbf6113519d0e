//! Error types for loaders and the query cache

use thiserror::Error;

use super::key::QueryKey;

/// A loader (or mutation function) failed
///
/// Cloneable so one failure can be handed to every awaiter of a
/// deduplicated fetch and stored on the cache entry at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// Transport-level failure (connection refused, DNS, timeout, ...)
    #[error("Network error: {0}")]
    Request(String),

    /// The server answered with a non-2xx status
    #[error("Request failed with status code {status}")]
    Status { status: u16 },

    /// The response body could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The loader task panicked or was torn down before finishing
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

impl LoaderError {
    /// Whether trying again could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LoaderError::Request(_) => true,
            LoaderError::Status { status } => *status >= 500,
            LoaderError::Parse(_) | LoaderError::Aborted(_) => false,
        }
    }
}

impl From<reqwest::Error> for LoaderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            LoaderError::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            LoaderError::Parse(err.to_string())
        } else {
            LoaderError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LoaderError {
    fn from(err: serde_json::Error) -> Self {
        LoaderError::Parse(err.to_string())
    }
}

/// Errors raised by the query cache itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A fetch finished after a newer fetch for the same key already landed.
    /// Never shown to users; the result is dropped and logged.
    #[error("Ignored stale result for {key} (fetch #{fetch_id}, current #{current})")]
    StaleReadIgnored {
        key: QueryKey,
        fetch_id: u64,
        current: u64,
    },
}
