//! Status command handler

use anyhow::Result;

use syncify_core::{Store, SyncedPlaylist};

use crate::output::{Output, OutputFormat};

/// Show login state, local database contents and the synced playlists
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let logged_in = store.load_tokens()?.is_some();
    let active = active_playlists(store)?;

    match output.format {
        OutputFormat::Json => {
            let playlists: Vec<_> = active
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name,
                        "source_id": p.source_id,
                        "destination_id": p.destination_id,
                        "songs": p.songs.len(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "spotify": {
                        "app_configured": config.has_spotify_app(),
                        "logged_in": logged_in,
                    },
                    "tidal": {
                        "token_configured": config.tidal_token.is_some(),
                        "country_code": config.country_code,
                    },
                    "storage": {
                        "location": config.sqlite_path(),
                        "songs": store.song_count().unwrap_or(0),
                        "playlists": store.playlist_count().unwrap_or(0),
                    },
                    "active_playlists": playlists,
                })
            );
        }
        OutputFormat::Quiet => {
            for playlist in &active {
                println!("{}", playlist.destination_id);
            }
        }
        OutputFormat::Human => {
            println!("Syncify Status");
            println!("==============");
            println!();
            println!("Spotify:");
            println!(
                "  App:     {}",
                if config.has_spotify_app() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!("  Login:   {}", if logged_in { "logged in" } else { "logged out" });
            println!();
            println!("Tidal:");
            println!(
                "  Token:   {}",
                if config.tidal_token.is_some() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!("  Country: {}", config.country_code);
            println!();
            println!("Storage:");
            println!("  Location:  {}", config.sqlite_path().display());
            println!("  Songs:     {}", store.song_count().unwrap_or(0));
            println!("  Playlists: {}", store.playlist_count().unwrap_or(0));
            println!();
            if active.is_empty() {
                println!("No playlists are being synced.");
            } else {
                println!("Syncing:");
                for playlist in &active {
                    println!(
                        "  {} ({} songs) {} -> {}",
                        playlist.name,
                        playlist.songs.len(),
                        playlist.source_id,
                        playlist.destination_id
                    );
                }
            }
        }
    }

    Ok(())
}

/// Active playlists in order, skipping IDs with no stored record
fn active_playlists(store: &Store) -> Result<Vec<SyncedPlaylist>> {
    let mut playlists = Vec::new();
    for destination_id in store.active_playlists()? {
        if let Some(playlist) = store.get_playlist_by_destination_id(&destination_id)? {
            playlists.push(playlist);
        }
    }
    Ok(playlists)
}
