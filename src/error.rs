//! Error types for scanpost
//!
//! This module provides error handling for the whole export/upload workflow:
//! - Configuration errors with the offending environment variable named
//! - HTTP-level failures (transport errors, non-success statuses, bad bodies)
//! - Report-job and object-storage failures from the findings collector

use std::time::Duration;
use thiserror::Error;

/// Result type alias for scanpost operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scanpost
///
/// Each variant carries enough context to tell the operator which external
/// collaborator failed and why.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment variable that caused the error (e.g., "SONAR_TOKEN")
        key: Option<String>,
    },

    /// HTTP transport error (timeout, connection refused, TLS, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A remote API answered with a non-success status
    #[error("{context} returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code returned by the remote
        status: u16,
        /// Which request failed (e.g., "SonarQube issue search")
        context: String,
        /// Response body, for diagnosis
        body: String,
    },

    /// A remote API answered 200 but the body could not be interpreted
    #[error("{context}: malformed response: {message}")]
    MalformedResponse {
        /// Which request produced the body
        context: String,
        /// What was wrong with it
        message: String,
    },

    /// The report destination bucket contained no objects at retrieval time
    #[error("no objects found in bucket {bucket}")]
    EmptyBucket {
        /// The bucket that was listed
        bucket: String,
    },

    /// The findings report job failed or was cancelled remotely
    #[error("findings report job {report_id} {reason}")]
    ReportJob {
        /// Identifier of the report job
        report_id: String,
        /// What happened to it ("failed", "was cancelled", ...)
        reason: String,
    },

    /// Polling gave up before the probed condition was reached
    #[error("gave up polling after {waited:?}")]
    PollTimeout {
        /// How long was spent waiting in total
        waited: Duration,
    },

    /// An object-storage or vulnerability-API call failed
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tabular artifact writing failed
    #[error("artifact write error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Construct a configuration error for a specific environment variable
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
