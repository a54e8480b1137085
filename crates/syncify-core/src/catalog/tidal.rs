//! Tidal API client
//!
//! Implements [`DestinationCatalog`]. Playlist mutations send the current
//! ETag in `If-None-Match`; Tidal answers 412 when it is stale and 409
//! when `onDupes=FAIL` rejects a track already in the playlist.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ETAG, IF_NONE_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::check_status;
use super::{CatalogError, CatalogResult, DestinationCatalog, TrackMatch};
use crate::config::Config;

/// Maximum search results requested
const SEARCH_LIMIT: usize = 20;

/// Page size when listing playlist items
const ITEMS_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<SearchTracks>,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    #[serde(default)]
    items: Vec<SearchTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchTrack {
    id: Option<Value>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artists: Vec<NamedArtist>,
}

#[derive(Debug, Deserialize)]
struct NamedArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsPage {
    #[serde(default)]
    items: Vec<PlaylistEntry>,
    total_number_of_items: Option<usize>,
}

impl ItemsPage {
    /// Whether another page follows, given `count` items on this page and
    /// `offset` items read so far
    ///
    /// A short page ends the listing; so does reaching the total when the
    /// service reports one.
    fn has_more(&self, count: usize, offset: usize) -> bool {
        if count < ITEMS_PAGE_SIZE {
            return false;
        }
        self.total_number_of_items
            .map_or(true, |total| offset < total)
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    item: Option<EntryItem>,
}

#[derive(Debug, Deserialize)]
struct EntryItem {
    id: Value,
}

/// Tidal IDs come back as numbers or strings depending on the endpoint
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SearchResponse {
    fn first_match(self) -> Option<TrackMatch> {
        let first = self.tracks?.items.into_iter().next()?;
        let id = first.id.as_ref().and_then(id_string)?;
        Some(TrackMatch {
            id,
            title: first.title,
            artists: first.artists.into_iter().map(|a| a.name).collect(),
        })
    }
}

/// Tidal client authenticated with a bearer token
pub struct TidalClient {
    http: Client,
    api_base: String,
    openapi_base: String,
    token: String,
    country_code: String,
}

impl TidalClient {
    pub fn new(
        http: Client,
        api_base: impl Into<String>,
        openapi_base: impl Into<String>,
        token: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            openapi_base: openapi_base.into(),
            token: token.into(),
            country_code: country_code.into(),
        }
    }

    /// Build from configuration; fails when no Tidal token is set
    pub fn from_config(http: Client, config: &Config) -> CatalogResult<Self> {
        let token = config
            .tidal_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CatalogError::Auth("No valid Tidal credentials found".to_string()))?;

        Ok(Self::new(
            http,
            config.tidal_api_base.clone(),
            config.tidal_openapi_base.clone(),
            token,
            config.country_code.clone(),
        ))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.get(format!("{}{}", self.api_base, path)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .query(&[("countryCode", self.country_code.as_str())])
    }

    fn items_path(playlist_id: &str) -> String {
        format!("/v1/playlists/{}/items", playlist_id)
    }
}

fn etag_header(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl DestinationCatalog for TidalClient {
    async fn search_track(&self, query: &str) -> CatalogResult<Option<TrackMatch>> {
        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .get("/v2/search/")
            .query(&[
                ("includeContributors", "true"),
                ("includeDidYouMean", "true"),
                ("includeUserPlaylists", "false"),
                ("limit", limit.as_str()),
                ("query", query),
                ("supportsUserData", "true"),
                ("types", "TRACKS"),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(response, "Search failed")?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(body.first_match())
    }

    async fn track_exists(&self, track_id: &str) -> CatalogResult<bool> {
        let response = self.get(&format!("/v1/tracks/{}", track_id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response, &format!("Failed to resolve track {}", track_id))?;
        Ok(true)
    }

    async fn create_playlist(&self, name: &str, description: &str) -> CatalogResult<String> {
        let body = json!({
            "data": {
                "attributes": {
                    "accessType": "UNLISTED",
                    "description": description,
                    "name": name
                },
                "type": "playlists"
            }
        });

        let request = self
            .http
            .post(format!("{}/v2/playlists", self.openapi_base));
        let response = self.authorized(request).json(&body).send().await?;
        let created: Value = check_status(response, "Failed to create Tidal playlist")?
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        let id = id_string(&created["data"]["id"])
            .ok_or_else(|| CatalogError::Parse("playlist response has no data.id".to_string()))?;
        info!("Created Tidal playlist '{}' ({})", name, id);
        Ok(id)
    }

    async fn playlist_etag(&self, playlist_id: &str) -> CatalogResult<String> {
        let response = self
            .get(&Self::items_path(playlist_id))
            .query(&[("limit", "1")])
            .send()
            .await?;
        let response = check_status(response, "Failed to fetch ETag")?;

        etag_header(&response)
            .ok_or_else(|| CatalogError::Parse("ETag header not found in response".to_string()))
    }

    async fn playlist_items(&self, playlist_id: &str) -> CatalogResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut offset = 0;

        loop {
            let response = self
                .get(&Self::items_path(playlist_id))
                .query(&[("offset", offset), ("limit", ITEMS_PAGE_SIZE)])
                .send()
                .await?;
            let page: ItemsPage = check_status(response, "Failed to fetch playlist items")?
                .json()
                .await
                .map_err(|e| CatalogError::Parse(e.to_string()))?;

            let count = page.items.len();
            offset += count;
            let more = page.has_more(count, offset);
            ids.extend(
                page.items
                    .into_iter()
                    .filter_map(|entry| entry.item)
                    .filter_map(|item| id_string(&item.id)),
            );

            if !more {
                break;
            }
        }

        debug!("Playlist {} has {} items", playlist_id, ids.len());
        Ok(ids)
    }

    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        etag: &str,
    ) -> CatalogResult<Option<String>> {
        let request = self
            .http
            .post(format!("{}{}", self.api_base, Self::items_path(playlist_id)));
        let response = self
            .authorized(request)
            .header(IF_NONE_MATCH, etag)
            .form(&[
                ("onArtifactNotFound", "FAIL"),
                ("onDupes", "FAIL"),
                ("trackIds", track_id),
            ])
            .send()
            .await?;

        let response = check_status(response, &format!("Failed to add track {}", track_id))?;
        Ok(etag_header(&response))
    }

    async fn remove_item(
        &self,
        playlist_id: &str,
        index: usize,
        etag: &str,
    ) -> CatalogResult<Option<String>> {
        let url = format!(
            "{}{}/{}",
            self.api_base,
            Self::items_path(playlist_id),
            index
        );
        let response = self
            .authorized(self.http.delete(url))
            .header(IF_NONE_MATCH, etag)
            .query(&[("order", "INDEX"), ("orderDirection", "ASC")])
            .send()
            .await?;

        let response = check_status(response, &format!("Failed to remove item {}", index))?;
        Ok(etag_header(&response))
    }
}
