//! Error types for the Metallum scraper
//!
//! This module defines all error types used throughout the library.
//! Fetch failures always carry the offending URL so callers can act on them.

use thiserror::Error;

/// Error type for Metallum scraper operations
#[derive(Error, Debug)]
pub enum MetallumError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport failure while fetching a page
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} while fetching {url}")]
    Status { url: String, status: u16 },

    /// Requested resource was not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Fetch did not complete before its deadline
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// Failed to parse HTML content
    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    /// Required HTML element was not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid Metal Archives ID provided
    #[error("Invalid Metal Archives ID: {0}")]
    InvalidId(u64),

    /// A search row had fewer cells than its kind requires
    #[error("Malformed {kind} row: expected at least {expected} cells, found {found}")]
    MalformedRow {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    /// Collection filtered by a name the entity does not expose
    #[error("Unknown filter attribute '{attribute}' for {entity}")]
    UnknownFilterAttribute {
        attribute: String,
        entity: &'static str,
    },

    /// Search response was not a valid JSON envelope
    #[error("Failed to decode search response: {0}")]
    Json(#[from] serde_json::Error),

    /// Response from `url` did not have the expected format
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: Box<MetallumError>,
    },

    /// Cache directory could not be written
    #[error("Cache I/O error: {0}")]
    Cache(#[from] std::io::Error),
}

impl MetallumError {
    /// Whether this error came from talking to the origin.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Status { .. } | Self::NotFound(_) | Self::Timeout { .. }
        )
    }
}

/// Result type alias for Metallum scraper operations
pub type Result<T> = std::result::Result<T, MetallumError>;
