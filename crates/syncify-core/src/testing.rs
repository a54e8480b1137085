//! In-process catalog fakes for tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::catalog::{
    CatalogError, CatalogResult, DestinationCatalog, SourceCatalog, TrackMatch,
};
use crate::models::{SourcePlaylist, SourceSong};
use crate::reconcile::SyncOptions;

/// Options with every delay set to zero
pub(crate) fn fast_options() -> SyncOptions {
    let defaults = SyncOptions::default();
    SyncOptions {
        pacing: Duration::ZERO,
        search_retry: defaults.search_retry.with_delays(Duration::ZERO, Duration::ZERO),
        stale_retry: defaults.stale_retry.with_delays(Duration::ZERO, Duration::ZERO),
        failure_pause: Duration::ZERO,
        verify_live_order: false,
    }
}

/// Source song `id` titled "Song <id>" by "Artist"; its destination track is `t-<id>`
pub(crate) fn source_song(id: &str) -> SourceSong {
    SourceSong::new(format!("Song {}", id), vec!["Artist".to_string()], id)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ==================== Source ====================

#[derive(Default)]
struct SourceState {
    playlists: Vec<SourcePlaylist>,
    songs: HashMap<String, Vec<SourceSong>>,
    failing: HashSet<String>,
    auth_error: bool,
    listing_calls: usize,
}

pub(crate) struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SourceState::default()),
        }
    }

    pub fn add_playlist(&self, name: &str, source_id: &str, songs: Vec<SourceSong>) {
        let mut state = lock(&self.state);
        state.playlists.push(SourcePlaylist {
            name: name.to_string(),
            source_id: source_id.to_string(),
            description: format!("{} description", name),
        });
        state.songs.insert(source_id.to_string(), songs);
    }

    pub fn set_songs(&self, source_id: &str, songs: Vec<SourceSong>) {
        lock(&self.state).songs.insert(source_id.to_string(), songs);
    }

    /// Make fetching the songs of `source_id` fail
    pub fn fail_songs_of(&self, source_id: &str) {
        lock(&self.state).failing.insert(source_id.to_string());
    }

    pub fn reject_auth(&self) {
        lock(&self.state).auth_error = true;
    }

    pub fn listing(&self) -> Vec<SourcePlaylist> {
        lock(&self.state).playlists.clone()
    }

    pub fn listing_calls(&self) -> usize {
        lock(&self.state).listing_calls
    }
}

#[async_trait]
impl SourceCatalog for FakeSource {
    async fn authenticate(&self) -> CatalogResult<()> {
        // Gives concurrent callers a chance to run
        tokio::task::yield_now().await;
        if lock(&self.state).auth_error {
            return Err(CatalogError::Auth("refresh token revoked".into()));
        }
        Ok(())
    }

    async fn playlists(&self) -> CatalogResult<Vec<SourcePlaylist>> {
        let mut state = lock(&self.state);
        state.listing_calls += 1;
        Ok(state.playlists.clone())
    }

    async fn playlist_songs(&self, playlist: &SourcePlaylist) -> CatalogResult<Vec<SourceSong>> {
        let state = lock(&self.state);
        if state.failing.contains(&playlist.source_id) {
            return Err(CatalogError::Http {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        Ok(state
            .songs
            .get(&playlist.source_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ==================== Destination ====================

/// Calls recorded by [`FakeDestination`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Search(String),
    Exists(String),
    Create(String),
    Etag,
    Items,
    Add(String),
    Remove(usize),
}

#[derive(Default)]
struct DestinationState {
    hits: HashMap<String, TrackMatch>,
    lists: HashMap<String, Vec<String>>,
    version: u64,
    missing: HashSet<String>,
    duplicates: HashSet<String>,
    failing_adds: HashSet<String>,
    stale_adds: usize,
    always_stale: bool,
    withhold_etags: bool,
    stale_rejections: usize,
    calls: Vec<Call>,
}

impl DestinationState {
    fn etag(&self) -> String {
        format!("W/\"{}\"", self.version)
    }

    /// Reject writes carrying anything but the current version
    fn check_etag(&self, etag: &str) -> CatalogResult<()> {
        if etag != self.etag() {
            return Err(CatalogError::StaleToken);
        }
        Ok(())
    }

    /// Bump the version after a write and hand out the new token
    fn bump(&mut self) -> Option<String> {
        self.version += 1;
        (!self.withhold_etags).then(|| self.etag())
    }
}

pub(crate) struct FakeDestination {
    state: Mutex<DestinationState>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DestinationState::default()),
        }
    }

    pub fn create_list(&self, playlist_id: &str) {
        lock(&self.state).lists.insert(playlist_id.to_string(), Vec::new());
    }

    /// Make the first search strategy for `song` return `t-<source_id>`
    pub fn add_search_hit(&self, song: &SourceSong) {
        let query = crate::converter::search_strategies(song).remove(0);
        lock(&self.state).hits.insert(
            query,
            TrackMatch {
                id: format!("t-{}", song.source_id),
                title: song.title.clone(),
                artists: song.artists.clone(),
            },
        );
    }

    pub fn items(&self, playlist_id: &str) -> Vec<String> {
        lock(&self.state)
            .lists
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_items(&self, playlist_id: &str, items: Vec<String>) {
        lock(&self.state).lists.insert(playlist_id.to_string(), items);
    }

    pub fn mark_missing(&self, track_id: &str) {
        lock(&self.state).missing.insert(track_id.to_string());
    }

    pub fn reject_as_duplicate(&self, track_id: &str) {
        lock(&self.state).duplicates.insert(track_id.to_string());
    }

    pub fn fail_adds_of(&self, track_id: &str) {
        lock(&self.state).failing_adds.insert(track_id.to_string());
    }

    /// Edit the playlist behind the writer's back before each of the next
    /// `n` adds, so the token they carry is stale
    pub fn stale_next_adds(&self, n: usize) {
        lock(&self.state).stale_adds = n;
    }

    pub fn always_stale(&self) {
        lock(&self.state).always_stale = true;
    }

    /// Answer writes without a new token
    pub fn withhold_etags(&self) {
        lock(&self.state).withhold_etags = true;
    }

    /// Current version token
    pub fn etag(&self) -> String {
        lock(&self.state).etag()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Add and remove calls, in order
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Add(_) | Call::Remove(_)))
            .collect()
    }

    /// Writes rejected because they carried an outdated token
    pub fn stale_rejections(&self) -> usize {
        lock(&self.state).stale_rejections
    }

    pub fn search_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Search(_)))
            .count()
    }
}

#[async_trait]
impl DestinationCatalog for FakeDestination {
    async fn search_track(&self, query: &str) -> CatalogResult<Option<TrackMatch>> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Search(query.to_string()));
        Ok(state.hits.get(query).cloned())
    }

    async fn track_exists(&self, track_id: &str) -> CatalogResult<bool> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Exists(track_id.to_string()));
        Ok(!state.missing.contains(track_id))
    }

    async fn create_playlist(&self, name: &str, _description: &str) -> CatalogResult<String> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Create(name.to_string()));
        let id = format!("td-new-{}", state.lists.len() + 1);
        state.lists.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn playlist_etag(&self, playlist_id: &str) -> CatalogResult<String> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Etag);
        if !state.lists.contains_key(playlist_id) {
            return Err(CatalogError::NotFound(playlist_id.to_string()));
        }
        Ok(state.etag())
    }

    async fn playlist_items(&self, playlist_id: &str) -> CatalogResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Items);
        state
            .lists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))
    }

    async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        etag: &str,
    ) -> CatalogResult<Option<String>> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Add(track_id.to_string()));

        if state.always_stale {
            return Err(CatalogError::StaleToken);
        }
        if state.stale_adds > 0 {
            state.stale_adds -= 1;
            state.version += 1;
        }
        if let Err(e) = state.check_etag(etag) {
            state.stale_rejections += 1;
            return Err(e);
        }
        if state.duplicates.contains(track_id) {
            return Err(CatalogError::Conflict(track_id.to_string()));
        }
        if state.failing_adds.contains(track_id) {
            return Err(CatalogError::Http {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }

        state
            .lists
            .get_mut(playlist_id)
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?
            .push(track_id.to_string());
        Ok(state.bump())
    }

    async fn remove_item(
        &self,
        playlist_id: &str,
        index: usize,
        etag: &str,
    ) -> CatalogResult<Option<String>> {
        let mut state = lock(&self.state);
        state.calls.push(Call::Remove(index));

        if let Err(e) = state.check_etag(etag) {
            state.stale_rejections += 1;
            return Err(e);
        }
        let items = state
            .lists
            .get_mut(playlist_id)
            .ok_or_else(|| CatalogError::NotFound(playlist_id.to_string()))?;
        if index >= items.len() {
            return Err(CatalogError::NotFound(format!("item {}", index)));
        }
        items.remove(index);
        Ok(state.bump())
    }
}
