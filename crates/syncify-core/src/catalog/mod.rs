//! Catalog clients
//!
//! The sync engine talks to two services through the traits defined here:
//!
//! - [`SourceCatalog`]: the service playlists are read from (Spotify)
//! - [`DestinationCatalog`]: the service playlists are written to (Tidal)
//!
//! Destination mutations are guarded by a version token (the playlist
//! ETag). A stale token is reported as [`CatalogError::StaleToken`], a
//! duplicate insert as [`CatalogError::Conflict`].

use async_trait::async_trait;

use crate::models::{SourcePlaylist, SourceSong};

mod error;
pub mod spotify;
pub mod tidal;

pub use error::{CatalogError, CatalogResult};
pub use spotify::SpotifyClient;
pub use tidal::TidalClient;

/// Best search hit in the destination catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMatch {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
}

/// Read access to the source catalog
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Make sure the client holds a usable access token
    async fn authenticate(&self) -> CatalogResult<()>;

    /// All playlists of the current user (every page)
    async fn playlists(&self) -> CatalogResult<Vec<SourcePlaylist>>;

    /// All songs of a playlist (every page), in playlist order
    async fn playlist_songs(&self, playlist: &SourcePlaylist) -> CatalogResult<Vec<SourceSong>>;
}

/// Search and playlist mutation in the destination catalog
#[async_trait]
pub trait DestinationCatalog: Send + Sync {
    /// Free-text track search; the first ranked result wins
    async fn search_track(&self, query: &str) -> CatalogResult<Option<TrackMatch>>;

    /// Whether a track ID still resolves to a playable track
    async fn track_exists(&self, track_id: &str) -> CatalogResult<bool>;

    /// Create a playlist and return its ID
    async fn create_playlist(&self, name: &str, description: &str) -> CatalogResult<String>;

    /// Current version token of a playlist
    async fn playlist_etag(&self, playlist_id: &str) -> CatalogResult<String>;

    /// Track IDs currently in a playlist, in order
    async fn playlist_items(&self, playlist_id: &str) -> CatalogResult<Vec<String>>;

    /// Append a track; returns the new version token if the service sent one
    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        etag: &str,
    ) -> CatalogResult<Option<String>>;

    /// Remove the item at a position (ascending index order); returns the
    /// new version token if the service sent one
    async fn remove_item(
        &self,
        playlist_id: &str,
        index: usize,
        etag: &str,
    ) -> CatalogResult<Option<String>>;
}
