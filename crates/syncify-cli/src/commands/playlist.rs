//! Playlist selection command handlers

use std::collections::HashSet;

use anyhow::{Context, Result};

use syncify_core::{PlaylistManager, SourceCatalog, Store, SyncedPlaylist};

use super::{catalogs, http_client, spotify_client};
use crate::output::{Output, OutputFormat, PlaylistRow};

/// List the user's Spotify playlists with their sync state
pub async fn list(store: &Store, output: &Output) -> Result<()> {
    let spotify = spotify_client(&http_client()?, store)?;
    spotify
        .authenticate()
        .await
        .context("Failed to authenticate with Spotify")?;
    let playlists = spotify
        .playlists()
        .await
        .context("Failed to fetch Spotify playlists")?;

    let active: HashSet<String> = store.active_playlists()?.into_iter().collect();
    let mut rows = Vec::with_capacity(playlists.len());
    for playlist in playlists {
        let destination_id = store
            .get_playlist_by_source_id(&playlist.source_id)?
            .map(|p| p.destination_id);
        rows.push(PlaylistRow {
            active: destination_id.as_ref().is_some_and(|id| active.contains(id)),
            name: playlist.name,
            source_id: playlist.source_id,
            destination_id,
        });
    }

    output.print_playlists(&rows);
    Ok(())
}

/// Start syncing a Spotify playlist
pub async fn add(store: &Store, source_id: String, output: &Output) -> Result<()> {
    let (spotify, tidal) = catalogs(store)?;
    spotify.authenticate().await?;
    let manager = PlaylistManager::new(store, &spotify, &tidal);

    let playlist = manager.add_playlist_to_sync(&source_id).await?;
    print_synced(&playlist, output);
    Ok(())
}

/// Stop syncing a playlist
///
/// Accepts either the Tidal playlist ID or the Spotify one. With `forget`
/// the stored pairing is dropped too.
pub fn remove(store: &Store, id: String, forget: bool, output: &Output) -> Result<()> {
    let destination_id = match store.get_playlist_by_source_id(&id)? {
        Some(playlist) => playlist.destination_id,
        None => id,
    };

    let (spotify, tidal) = catalogs(store)?;
    let manager = PlaylistManager::new(store, &spotify, &tidal);

    if forget {
        if manager.forget_playlist(&destination_id)? {
            output.success(&format!("Forgot playlist {}", destination_id));
        } else {
            output.message(&format!("Playlist {} is not stored", destination_id));
        }
        return Ok(());
    }

    if manager.remove_playlist_from_sync(&destination_id)? {
        output.success(&format!("Stopped syncing {}", destination_id));
    } else {
        output.message(&format!("Playlist {} is not being synced", destination_id));
    }
    Ok(())
}

/// Make the given Spotify playlists exactly the synced set
pub async fn select(store: &Store, source_ids: Vec<String>, output: &Output) -> Result<()> {
    let (spotify, tidal) = catalogs(store)?;
    spotify.authenticate().await?;
    let manager = PlaylistManager::new(store, &spotify, &tidal);

    let active = manager.update_active_playlists(&source_ids).await?;
    match output.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&active)?),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            for playlist in &active {
                print_synced(playlist, output);
            }
            output.success(&format!("{} playlist(s) selected", active.len()));
        }
    }
    Ok(())
}

/// Stop syncing every playlist
pub fn clear(store: &Store, output: &Output) -> Result<()> {
    let (spotify, tidal) = catalogs(store)?;
    PlaylistManager::new(store, &spotify, &tidal).clear_sync()?;
    output.success("Cleared all playlists from sync");
    Ok(())
}

fn print_synced(playlist: &SyncedPlaylist, output: &Output) {
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "name": playlist.name,
                    "source_id": playlist.source_id,
                    "destination_id": playlist.destination_id,
                })
            );
        }
        OutputFormat::Quiet => println!("{}", playlist.destination_id),
        OutputFormat::Human => output.success(&format!(
            "Syncing '{}' ({} -> {})",
            playlist.name, playlist.source_id, playlist.destination_id
        )),
    }
}
