//! Spotify Web API client
//!
//! Implements [`SourceCatalog`]: paginated listing of the user's playlists
//! and of a playlist's tracks, bearer-token authenticated.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::check_status;
use super::{CatalogError, CatalogResult, SourceCatalog};
use crate::auth::{OAuthTokens, SpotifyAuth};
use crate::models::{SourcePlaylist, SourceSong};

/// Page size for the playlist listing (API maximum)
const PLAYLIST_PAGE_SIZE: usize = 50;

/// Page size for playlist tracks (API maximum)
const TRACK_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    id: String,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    track: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: Option<String>,
    name: Option<String>,
    artists: Option<Vec<Artist>>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

impl TrackItem {
    /// Local files and removed tracks come without ID, name or artists
    fn into_song(self) -> Option<SourceSong> {
        let track = self.track?;
        let id = track.id.filter(|id| !id.is_empty())?;
        let name = track.name.filter(|name| !name.is_empty())?;
        let artists = track.artists?;
        Some(SourceSong::new(
            name,
            artists.into_iter().map(|a| a.name).collect(),
            id,
        ))
    }
}

/// Spotify client holding the user's tokens
pub struct SpotifyClient {
    http: Client,
    api_base: String,
    tokens: Mutex<Option<OAuthTokens>>,
    auth: Option<SpotifyAuth>,
}

impl SpotifyClient {
    /// Create a client
    ///
    /// `auth` is used to refresh the access token before each run; without
    /// it the stored access token is used as-is.
    pub fn new(
        http: Client,
        api_base: impl Into<String>,
        tokens: Option<OAuthTokens>,
        auth: Option<SpotifyAuth>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            tokens: Mutex::new(tokens),
            auth,
        }
    }

    /// Current tokens (after any refresh), for persisting
    pub async fn tokens(&self) -> Option<OAuthTokens> {
        self.tokens.lock().await.clone()
    }

    async fn bearer(&self) -> CatalogResult<String> {
        let tokens = self.tokens.lock().await;
        match tokens.as_ref() {
            Some(t) if !t.access_token.is_empty() => Ok(t.access_token.clone()),
            _ => Err(CatalogError::Auth(
                "User is not logged in. Please log in to Spotify first.".to_string(),
            )),
        }
    }

    /// Fetch every page of a listing
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        limit: usize,
    ) -> CatalogResult<Vec<T>> {
        let token = self.bearer().await?;
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let url = format!("{}{}", self.api_base, path);
            let context = format!("Failed to fetch {} at offset {}", path, offset);
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("limit", limit), ("offset", offset)])
                .send()
                .await?;
            let page: Page<T> = check_status(response, &context)?
                .json()
                .await
                .map_err(|e| CatalogError::Parse(e.to_string()))?;

            let count = page.items.len();
            items.extend(page.items);

            if page.next.is_none() || count == 0 {
                break;
            }
            offset += limit;
        }

        Ok(items)
    }
}

#[async_trait]
impl SourceCatalog for SpotifyClient {
    async fn authenticate(&self) -> CatalogResult<()> {
        let mut tokens = self.tokens.lock().await;
        let Some(current) = tokens.as_ref() else {
            return Err(CatalogError::Auth(
                "User is not logged in. Please log in to Spotify first.".to_string(),
            ));
        };

        let Some(ref auth) = self.auth else {
            debug!("No Spotify app credentials, using stored access token");
            return Ok(());
        };

        match auth.refresh(current).await {
            Ok(fresh) => {
                *tokens = Some(fresh);
                Ok(())
            }
            Err(e) => {
                // The stored access token may still be valid
                warn!("Failed to refresh Spotify token: {}", e);
                Ok(())
            }
        }
    }

    async fn playlists(&self) -> CatalogResult<Vec<SourcePlaylist>> {
        let items: Vec<PlaylistItem> = self
            .get_all("/v1/me/playlists", PLAYLIST_PAGE_SIZE)
            .await?;

        info!("Fetched {} Spotify playlists", items.len());
        Ok(items
            .into_iter()
            .map(|item| SourcePlaylist {
                name: item.name,
                source_id: item.id,
                description: item.description.unwrap_or_default(),
            })
            .collect())
    }

    async fn playlist_songs(&self, playlist: &SourcePlaylist) -> CatalogResult<Vec<SourceSong>> {
        let path = format!("/v1/playlists/{}/tracks", playlist.source_id);
        let items: Vec<TrackItem> = self.get_all(&path, TRACK_PAGE_SIZE).await?;

        let total = items.len();
        let songs: Vec<SourceSong> = items.into_iter().filter_map(TrackItem::into_song).collect();
        if songs.len() < total {
            debug!(
                "Skipped {} unplayable items in '{}'",
                total - songs.len(),
                playlist.name
            );
        }
        Ok(songs)
    }
}
