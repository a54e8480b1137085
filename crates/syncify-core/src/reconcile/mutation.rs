//! Version-token guarded playlist writes
//!
//! Every add and delete carries the playlist's current ETag. A stale
//! token is refreshed and the same operation retried once; an insert the
//! playlist already holds counts as a duplicate.

use std::time::Duration;

use tracing::{error, warn};

use crate::catalog::{CatalogError, CatalogResult, DestinationCatalog};
use crate::retry::RetryPolicy;

/// Result of a successful insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Added,
    Duplicate,
}

/// Writes to one destination playlist, tracking its ETag
pub struct PlaylistWriter<'a> {
    catalog: &'a dyn DestinationCatalog,
    playlist_id: &'a str,
    etag: String,
    stale_retry: RetryPolicy,
    failure_pause: Duration,
}

impl<'a> PlaylistWriter<'a> {
    /// Fetch the current ETag and start writing
    pub async fn open(
        catalog: &'a dyn DestinationCatalog,
        playlist_id: &'a str,
        stale_retry: RetryPolicy,
        failure_pause: Duration,
    ) -> CatalogResult<PlaylistWriter<'a>> {
        let etag = catalog.playlist_etag(playlist_id).await?;
        Ok(Self {
            catalog,
            playlist_id,
            etag,
            stale_retry,
            failure_pause,
        })
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    async fn refresh(&mut self) -> CatalogResult<()> {
        self.etag = self.catalog.playlist_etag(self.playlist_id).await?;
        Ok(())
    }

    /// Wait for the stale-token delay and fetch a fresh ETag
    async fn refresh_after_stale(&mut self, attempt: u32, action: &str) -> CatalogResult<()> {
        warn!("ETag is stale during {}, refreshing...", action);
        tokio::time::sleep(self.stale_retry.delay_for(attempt)).await;
        self.refresh().await
    }

    /// Append a track to the playlist
    ///
    /// Without a new token in the response the current one is kept.
    pub async fn insert(&mut self, track_id: &str) -> CatalogResult<InsertOutcome> {
        let mut attempt = 0;
        loop {
            match self.catalog.add_track(self.playlist_id, track_id, &self.etag).await {
                Ok(new_etag) => {
                    if let Some(etag) = new_etag {
                        self.etag = etag;
                    }
                    return Ok(InsertOutcome::Added);
                }
                Err(CatalogError::Conflict(_)) => return Ok(InsertOutcome::Duplicate),
                Err(e) if self.stale_retry.should_retry(attempt, &e) => {
                    self.refresh_after_stale(attempt, "add").await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove the item at `index`
    ///
    /// A delete always changes the playlist version, so without a new
    /// token in the response the ETag is fetched again.
    pub async fn delete(&mut self, index: usize) -> CatalogResult<()> {
        let mut attempt = 0;
        loop {
            match self.catalog.remove_item(self.playlist_id, index, &self.etag).await {
                Ok(Some(etag)) => {
                    self.etag = etag;
                    return Ok(());
                }
                Ok(None) => {
                    if let Err(e) = self.refresh().await {
                        warn!("Failed to refresh ETag after delete: {}", e);
                    }
                    return Ok(());
                }
                Err(e) if self.stale_retry.should_retry(attempt, &e) => {
                    self.refresh_after_stale(attempt, "delete").await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// After a failed write: pause, then fetch a fresh ETag
    ///
    /// A failed refresh keeps the old token; the next write reports it.
    pub async fn recover(&mut self) {
        tokio::time::sleep(self.failure_pause).await;
        if let Err(e) = self.refresh().await {
            error!("Failed to refresh ETag for playlist {}: {}", self.playlist_id, e);
        }
    }
}
