//! Error types for remote-store operations.

use thiserror::Error;

/// Errors from the remote tabular store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a non-success status that is not retried.
    #[error("store request to {url} failed with HTTP {status}: {body}")]
    Http { url: String, status: u16, body: String },

    /// Transport-level failure (DNS, connect, TLS, read).
    #[error("store request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A transient failure persisted through every allowed attempt.
    #[error("store request to {url} still failing after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    /// The store answered 2xx but the body did not match the expected shape.
    #[error("unexpected store response from {url}: {detail}")]
    InvalidResponse { url: String, detail: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },
}

impl StoreError {
    /// Creates an HTTP status error.
    pub fn http(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a retries-exhausted error.
    pub fn retries_exhausted(url: impl Into<String>, attempts: u32) -> Self {
        Self::RetriesExhausted {
            url: url.into(),
            attempts,
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            detail: detail.into(),
        }
    }
}
