//! Error types for the lot reconciler.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that can occur during a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A required environment variable is absent or empty
    #[error("Missing required environment variable: {0}")]
    MissingEnv(&'static str),

    /// An environment variable holds a value we don't understand
    #[error("Invalid value {value:?} for {key}: expected one of {expected}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A local input file does not exist
    #[error("{} file not found", .path.display())]
    MissingFile { path: PathBuf },

    /// Failed to read or write a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding or encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed after exhausting retries
    #[error("Request to {url} failed after {attempts} attempt(s): {source}")]
    Request {
        url: String,
        attempts: usize,
        #[source]
        source: HttpError,
    },

    /// A request URL could not be built from the base URL
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Token endpoint answered without an access token
    #[error("Token response did not contain an access_token")]
    MissingToken,

    /// More than one orderable carries the same id
    #[error("Orderable id {id} is not unique ({count} matches)")]
    DuplicateOrderable { id: String, count: usize },
}

/// A single failed HTTP attempt.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Connection, DNS, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Server answered with a non-2xx status
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not valid JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}
