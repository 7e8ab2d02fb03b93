//! Error types for CDS retrieval.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for CDS operations.
pub type CdsResult<T> = Result<T, CdsError>;

/// Errors raised while talking to the Climate Data Store.
#[derive(Error, Debug)]
pub enum CdsError {
    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status, including authorization failures
    #[error("CDS returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The job ended without producing a result
    #[error("CDS job {job_id} ended as {status}: {message}")]
    JobFailed {
        job_id: String,
        status: String,
        message: String,
    },

    /// The job did not finish in the configured time
    #[error("CDS job {job_id} still {status} after {waited_secs}s")]
    JobTimeout {
        job_id: String,
        status: String,
        waited_secs: u64,
    },

    /// A response was missing a field the protocol requires
    #[error("unexpected CDS response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CDS configuration: {0}")]
    InvalidConfig(String),
}

impl CdsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
