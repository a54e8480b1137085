//! Which playlists take part in a sync
//!
//! Adding a source playlist for the first time creates its destination
//! playlist (unlisted, same name and description) and records the pair
//! with an empty snapshot. Removing a playlist only deactivates it: the
//! destination playlist and the stored pair stay, so adding it back does
//! not create a second copy.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::catalog::{DestinationCatalog, SourceCatalog};
use crate::error::SyncError;
use crate::models::SyncedPlaylist;
use crate::store::Store;

/// Manages the set of active playlists
pub struct PlaylistManager<'a> {
    store: &'a Store,
    source: &'a dyn SourceCatalog,
    destination: &'a dyn DestinationCatalog,
}

impl<'a> PlaylistManager<'a> {
    pub fn new(
        store: &'a Store,
        source: &'a dyn SourceCatalog,
        destination: &'a dyn DestinationCatalog,
    ) -> Self {
        Self {
            store,
            source,
            destination,
        }
    }

    /// Start syncing a source playlist
    ///
    /// Returns the synced playlist, creating the destination side if
    /// needed.
    pub async fn add_playlist_to_sync(&self, source_id: &str) -> Result<SyncedPlaylist> {
        if let Some(existing) = self.store.get_playlist_by_source_id(source_id)? {
            if !self.store.activate_playlist(&existing.destination_id)? {
                warn!("Playlist '{}' is already being synced", existing.name);
            }
            return Ok(existing);
        }

        let playlists = self
            .source
            .playlists()
            .await
            .context("Failed to fetch Spotify playlists")?;
        let source = playlists
            .into_iter()
            .find(|p| p.source_id == source_id)
            .ok_or_else(|| SyncError::NotFound(format!("Spotify playlist {} not found", source_id)))?;

        let destination_id = self
            .destination
            .create_playlist(&source.name, &source.description)
            .await
            .with_context(|| format!("Failed to create Tidal playlist '{}'", source.name))?;

        let playlist = SyncedPlaylist::new(source.name, source.source_id, destination_id);
        if !self.store.add_playlist(&playlist)? {
            return Err(SyncError::Conflict(format!(
                "Playlist '{}' is already stored",
                playlist.name
            ))
            .into());
        }
        self.store.activate_playlist(&playlist.destination_id)?;

        info!(
            "Added playlist '{}' ({} -> {})",
            playlist.name, playlist.source_id, playlist.destination_id
        );
        Ok(playlist)
    }

    /// Stop syncing a destination playlist; returns `false` if it was not active
    pub fn remove_playlist_from_sync(&self, destination_id: &str) -> Result<bool> {
        let removed = self.store.deactivate_playlist(destination_id)?;
        if removed {
            info!("Removed playlist {} from sync", destination_id);
        } else {
            warn!("Playlist {} is not being synced", destination_id);
        }
        Ok(removed)
    }

    /// Stop syncing and drop the stored pairing and snapshot
    ///
    /// The destination playlist itself is left alone. Returns `false` if
    /// no playlist is stored under `destination_id`.
    pub fn forget_playlist(&self, destination_id: &str) -> Result<bool> {
        let Some(playlist) = self.store.get_playlist_by_destination_id(destination_id)? else {
            warn!("Playlist {} is not stored", destination_id);
            return Ok(false);
        };
        self.store.deactivate_playlist(destination_id)?;
        let deleted = self.store.delete_playlist(&playlist.source_id)?;
        info!("Forgot playlist '{}' ({})", playlist.name, destination_id);
        Ok(deleted)
    }

    /// Make the selected source playlists exactly the active set
    ///
    /// Returns the synced playlists now active, in selection order.
    pub async fn update_active_playlists(
        &self,
        selected_source_ids: &[String],
    ) -> Result<Vec<SyncedPlaylist>> {
        let selected: HashSet<&str> = selected_source_ids.iter().map(String::as_str).collect();

        for destination_id in self.store.active_playlists()? {
            let keep = self
                .store
                .get_playlist_by_destination_id(&destination_id)?
                .is_some_and(|p| selected.contains(p.source_id.as_str()));
            if !keep {
                self.store.deactivate_playlist(&destination_id)?;
            }
        }

        let mut active = Vec::with_capacity(selected_source_ids.len());
        for source_id in selected_source_ids {
            active.push(self.add_playlist_to_sync(source_id).await?);
        }
        Ok(active)
    }

    /// Deactivate every playlist
    pub fn clear_sync(&self) -> Result<()> {
        self.store.set_active_playlists(&[])?;
        info!("Cleared all playlists from sync");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeDestination, FakeSource};

    fn fixture() -> (Store, FakeSource, FakeDestination) {
        let source = FakeSource::new();
        source.add_playlist("Road Trip", "sp-1", vec![]);
        source.add_playlist("Focus", "sp-2", vec![]);
        (Store::open_in_memory().unwrap(), source, FakeDestination::new())
    }

    #[tokio::test]
    async fn test_add_creates_destination_playlist_once() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);

        let first = manager.add_playlist_to_sync("sp-1").await.unwrap();
        assert_eq!(first.name, "Road Trip");
        assert!(first.songs.is_empty());
        assert_eq!(store.active_playlists().unwrap(), vec![first.destination_id.clone()]);

        let again = manager.add_playlist_to_sync("sp-1").await.unwrap();
        assert_eq!(again.destination_id, first.destination_id);

        let creates = destination
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_add_unknown_source_playlist_fails() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);

        let err = manager.add_playlist_to_sync("sp-404").await.unwrap_err();
        assert_eq!(
            crate::error::classify(&err),
            Some(crate::error::ErrorKind::NotFound)
        );
        assert_eq!(store.playlist_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_keeps_record() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);
        let playlist = manager.add_playlist_to_sync("sp-1").await.unwrap();

        assert!(manager.remove_playlist_from_sync(&playlist.destination_id).unwrap());
        assert!(!manager.remove_playlist_from_sync(&playlist.destination_id).unwrap());

        assert!(store.active_playlists().unwrap().is_empty());
        assert_eq!(store.playlist_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_forget_drops_record() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);
        let playlist = manager.add_playlist_to_sync("sp-1").await.unwrap();

        assert!(manager.forget_playlist(&playlist.destination_id).unwrap());
        assert!(!manager.forget_playlist(&playlist.destination_id).unwrap());

        assert!(store.active_playlists().unwrap().is_empty());
        assert_eq!(store.playlist_count().unwrap(), 0);

        // Adding it back creates a fresh destination playlist
        let again = manager.add_playlist_to_sync("sp-1").await.unwrap();
        assert_ne!(again.destination_id, playlist.destination_id);
    }

    #[tokio::test]
    async fn test_update_active_playlists_replaces_selection() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);
        let one = manager.add_playlist_to_sync("sp-1").await.unwrap();

        let active = manager
            .update_active_playlists(&["sp-2".to_string()])
            .await
            .unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].source_id, "sp-2");
        let ids = store.active_playlists().unwrap();
        assert_eq!(ids, vec![active[0].destination_id.clone()]);
        assert!(!ids.contains(&one.destination_id));
    }

    #[tokio::test]
    async fn test_clear_sync() {
        let (store, source, destination) = fixture();
        let manager = PlaylistManager::new(&store, &source, &destination);
        manager.add_playlist_to_sync("sp-1").await.unwrap();
        manager.add_playlist_to_sync("sp-2").await.unwrap();

        manager.clear_sync().unwrap();

        assert!(store.active_playlists().unwrap().is_empty());
        assert_eq!(store.playlist_count().unwrap(), 2);
    }
}
