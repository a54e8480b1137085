//! Error types for catalog API clients

use reqwest::{Response, StatusCode};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors returned by the Spotify and Tidal clients
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert rejected because the item is already present
    #[error("Item already exists: {0}")]
    Conflict(String),

    /// Version token no longer matches the playlist (HTTP 412)
    #[error("ETag is stale, needs refresh")]
    StaleToken,

    /// Too many requests (HTTP 429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Map a non-success status to an error
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown");
        match status.as_u16() {
            401 | 403 => CatalogError::Auth(format!("{} ({} {})", context, status.as_u16(), reason)),
            404 => CatalogError::NotFound(context.to_string()),
            409 => CatalogError::Conflict(context.to_string()),
            412 => CatalogError::StaleToken,
            429 => CatalogError::RateLimited,
            code => CatalogError::Http {
                status: code,
                message: format!("{}: {}", context, reason),
            },
        }
    }

    /// Classify into the sync error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Auth(_) => ErrorKind::Auth,
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Conflict(_) => ErrorKind::Conflict,
            CatalogError::StaleToken => ErrorKind::StaleToken,
            CatalogError::RateLimited
            | CatalogError::Http { .. }
            | CatalogError::Network(_)
            | CatalogError::Parse(_) => ErrorKind::Transient,
        }
    }
}

/// Pass successful responses through, turn the rest into errors
pub(crate) fn check_status(response: Response, context: &str) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CatalogError::from_status(status, context))
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
