//! Sync error handling
//!
//! Typed errors for the sync pipeline. Every failure is classified into an
//! [`ErrorKind`] which decides how far it propagates: per-song failures stay
//! inside reconciliation, per-playlist failures stay inside the batch, and
//! only authentication and storage failures abort a whole run.

use thiserror::Error;

use crate::catalog::CatalogError;

/// Classification of a sync failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (e.g. a song without title or artists)
    Validation,
    /// Playlist or song missing locally or remotely
    NotFound,
    /// Duplicate insert, not fatal
    Conflict,
    /// Version token rejected, triggers a single retry
    StaleToken,
    /// Generic HTTP / network failure
    Transient,
    /// Missing or invalid credentials
    Auth,
    /// Local store unavailable
    Storage,
}

impl ErrorKind {
    /// Whether this failure must abort the whole run
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Auth | ErrorKind::Storage)
    }

    /// What the user can do about it
    pub fn recovery_suggestion(self) -> Option<&'static str> {
        match self {
            ErrorKind::Auth => Some("Run `syncify login` and check the Tidal token in the config."),
            ErrorKind::NotFound => {
                Some("Re-add the playlist with `syncify add <spotify-playlist-id>`.")
            }
            ErrorKind::Storage => Some("Check that the data directory is writable."),
            _ => None,
        }
    }
}

/// Errors raised by the sync pipeline
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Duplicate item: {0}")]
    Conflict(String),

    #[error("Version token is stale: {0}")]
    StaleToken(String),

    #[error("Request failed: {0}")]
    Transient(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl SyncError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::StaleToken(_) => ErrorKind::StaleToken,
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::Auth(_) => ErrorKind::Auth,
            SyncError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<CatalogError> for SyncError {
    fn from(error: CatalogError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ErrorKind::Validation => SyncError::Validation(message),
            ErrorKind::NotFound => SyncError::NotFound(message),
            ErrorKind::Conflict => SyncError::Conflict(message),
            ErrorKind::StaleToken => SyncError::StaleToken(message),
            ErrorKind::Auth => SyncError::Auth(message),
            ErrorKind::Transient | ErrorKind::Storage => SyncError::Transient(message),
        }
    }
}

/// Find the classification of the first typed error in an `anyhow` chain
pub fn classify(error: &anyhow::Error) -> Option<ErrorKind> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<CatalogError>() {
            Some(e.kind())
        } else if cause.downcast_ref::<rusqlite::Error>().is_some() {
            Some(ErrorKind::Storage)
        } else {
            None
        }
    })
}

/// Render an error as `context: underlying message`
pub fn user_message(context: &str, error: &anyhow::Error) -> String {
    format!("{}: {:#}", context, error)
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_catalog_error_classification() {
        let err: SyncError = CatalogError::StaleToken.into();
        assert_eq!(err.kind(), ErrorKind::StaleToken);

        let err: SyncError = CatalogError::Auth("401 Unauthorized".into()).into();
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err: SyncError = CatalogError::Http {
            status: 500,
            message: "Internal Server Error".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_only_auth_and_storage_are_fatal() {
        assert!(ErrorKind::Auth.is_fatal());
        assert!(ErrorKind::Storage.is_fatal());
        assert!(!ErrorKind::Transient.is_fatal());
        assert!(!ErrorKind::NotFound.is_fatal());
        assert!(ErrorKind::Auth.recovery_suggestion().is_some());
        assert!(ErrorKind::Conflict.recovery_suggestion().is_none());
    }

    #[test]
    fn test_classify_walks_context_chain() {
        let err = anyhow::Error::new(SyncError::Auth("no token".into()))
            .context("Failed to load playlists");
        assert_eq!(classify(&err), Some(ErrorKind::Auth));

        let err: anyhow::Result<()> = Err(CatalogError::NotFound("playlist p1".into()))
            .context("Failed to fetch items");
        assert_eq!(classify(&err.unwrap_err()), Some(ErrorKind::NotFound));

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(classify(&err), None);
    }

    #[test]
    fn test_user_message_format() {
        let err = anyhow::anyhow!("HTTP 500").context("Fetching items");
        let msg = user_message("Failed to update playlist p1", &err);
        assert_eq!(msg, "Failed to update playlist p1: Fetching items: HTTP 500");
    }
}
