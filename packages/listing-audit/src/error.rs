//! Typed errors for the audit pipeline.
//!
//! Per-image failures (download, scoring) never surface as `AuditError`:
//! they are folded into sentinel analyses. Only document, staging and
//! persistence failures are returned to callers.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ListingId;

/// Errors that can occur while running the batch.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Listing document exists but could not be read
    #[error("failed to read listing {listing_id} from {path}: {source}")]
    ReadDocument {
        listing_id: ListingId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report could not be written; the rendered text is kept so the
    /// listing's analyses are not lost
    #[error("failed to write report for listing {listing_id} to {path}: {source}")]
    Persist {
        listing_id: ListingId,
        path: PathBuf,
        report: String,
        #[source]
        source: std::io::Error,
    },

    /// Staging directory could not be created
    #[error("staging directory {path} unavailable: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable present but not parseable
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// Id range is empty
    #[error("id range is empty: start {start} > end {end}")]
    EmptyRange { start: ListingId, end: ListingId },

    /// A field that must be positive is zero
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Errors from a single image download attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or is not http(s)
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Request exceeded the download timeout
    #[error("timeout downloading {url}")]
    Timeout { url: String },

    /// Connection-level failure
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Non-2xx response
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Writing the staged file failed
    #[error("I/O error staging {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::InvalidUrl { .. } | FetchError::Io { .. } => false,
        }
    }
}

/// Errors from the remote scoring capability.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing credentials or invalid settings
    #[error("model configuration error: {0}")]
    Config(String),

    /// The remote call failed
    #[error("model request failed: {0}")]
    Request(String),

    /// The remote call did not return in time
    #[error("model call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The model answered with nothing usable
    #[error("model returned no text: {0}")]
    Empty(String),
}

impl From<gemini_client::GeminiError> for ModelError {
    fn from(err: gemini_client::GeminiError) -> Self {
        use gemini_client::GeminiError;
        match err {
            GeminiError::Config(msg) => ModelError::Config(msg),
            GeminiError::EmptyResponse(msg) => ModelError::Empty(msg),
            other => ModelError::Request(other.to_string()),
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for download operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
