//! Local store
//!
//! The `Store` persists matched songs, synced playlists (with their
//! last-synced snapshot), the list of active playlists and the stored
//! OAuth tokens in a single SQLite database.
//!
//! ## Semantics
//!
//! - Adds report `false` instead of failing when the external ID is
//!   already present, updates report `false` when the record is missing.
//! - Writes are last-writer-wins. The orchestrator never runs two passes
//!   at once, so there is no contention to guard against.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;
//!
//! if store.get_song_by_source_id("4uLU6hMCjMI75M1A2tKUQC")?.is_none() {
//!     store.add_song(&song)?;
//! }
//! ```

use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::OAuthTokens;
use crate::config::Config;
use crate::models::{DestinationSong, SyncedPlaylist};
use crate::storage::schema::{init_schema, needs_init};

const SONG_COLUMNS: &str = "id, title, artist, destination_id, source_id";

/// SQLite-backed local store
pub struct Store {
    conn: Connection,
    config: Config,
}

impl Store {
    /// Open the store using the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open or create the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;

        Self::from_connection(conn, config)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, Config::default())
    }

    fn from_connection(conn: Connection, config: Config) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        if needs_init(&conn) {
            init_schema(&conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self { conn, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ==================== Song Operations ====================

    /// Get all songs
    pub fn get_all_songs(&self) -> Result<Vec<DestinationSong>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM songs ORDER BY rowid", SONG_COLUMNS))?;
        let songs = stmt
            .query_map([], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to get songs")?;
        Ok(songs)
    }

    /// Get a song by its source catalog ID
    pub fn get_song_by_source_id(&self, source_id: &str) -> Result<Option<DestinationSong>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM songs WHERE source_id = ?", SONG_COLUMNS),
                params![source_id],
                song_from_row,
            )
            .optional()
            .context("Failed to get song")
    }

    /// Get a song by its destination catalog ID
    pub fn get_song_by_destination_id(
        &self,
        destination_id: &str,
    ) -> Result<Option<DestinationSong>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM songs WHERE destination_id = ? ORDER BY rowid LIMIT 1",
                    SONG_COLUMNS
                ),
                params![destination_id],
                song_from_row,
            )
            .optional()
            .context("Failed to get song")
    }

    /// Add a song
    ///
    /// Returns `false` if a song with the same source ID already exists.
    pub fn add_song(&self, song: &DestinationSong) -> Result<bool> {
        let inserted = insert_song(&self.conn, song).context("Failed to add song")?;
        if !inserted {
            warn!("Song with Spotify ID '{}' already exists", song.source_id);
        }
        Ok(inserted)
    }

    /// Add multiple songs, skipping any whose source ID is already stored
    ///
    /// Returns the number of songs actually inserted.
    pub fn add_songs(&self, songs: &[DestinationSong]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        for song in songs {
            if insert_song(&tx, song)? {
                inserted += 1;
            }
        }
        tx.commit().context("Failed to add songs")?;

        debug!("Bulk add: {} of {} songs inserted", inserted, songs.len());
        Ok(inserted)
    }

    /// Count stored songs
    pub fn song_count(&self) -> Result<i64> {
        count(&self.conn, "songs")
    }

    // ==================== Playlist Operations ====================

    /// Get all playlists (with snapshots)
    pub fn get_all_playlists(&self) -> Result<Vec<SyncedPlaylist>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, source_id, destination_id FROM playlists ORDER BY rowid")?;
        let rows = stmt
            .query_map([], playlist_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|playlist| self.hydrate_playlist(playlist))
            .collect::<Result<Vec<_>>>()
            .context("Failed to get playlists")
    }

    /// Get a playlist by its source catalog ID
    pub fn get_playlist_by_source_id(&self, source_id: &str) -> Result<Option<SyncedPlaylist>> {
        self.find_playlist("source_id", source_id)
    }

    /// Get a playlist by its destination catalog ID
    pub fn get_playlist_by_destination_id(
        &self,
        destination_id: &str,
    ) -> Result<Option<SyncedPlaylist>> {
        self.find_playlist("destination_id", destination_id)
    }

    /// Add a playlist
    ///
    /// Returns `false` if the source or destination ID is already present.
    pub fn add_playlist(&self, playlist: &SyncedPlaylist) -> Result<bool> {
        let exists: bool = self
            .conn
            .prepare("SELECT 1 FROM playlists WHERE source_id = ? OR destination_id = ?")?
            .exists(params![playlist.source_id, playlist.destination_id])?;
        if exists {
            warn!(
                "Playlist with Spotify ID '{}' already exists",
                playlist.source_id
            );
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO playlists (source_id, destination_id, name) VALUES (?, ?, ?)",
            params![playlist.source_id, playlist.destination_id, playlist.name],
        )?;
        write_snapshot(&tx, playlist)?;
        tx.commit().context("Failed to add playlist")?;
        Ok(true)
    }

    /// Update a playlist's name, destination ID and snapshot
    ///
    /// Returns `false` if no playlist with this source ID exists.
    pub fn update_playlist(&self, playlist: &SyncedPlaylist) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE playlists SET destination_id = ?, name = ? WHERE source_id = ?",
            params![playlist.destination_id, playlist.name, playlist.source_id],
        )?;
        if updated == 0 {
            warn!(
                "Playlist with Spotify ID '{}' not found for update",
                playlist.source_id
            );
            return Ok(false);
        }

        write_snapshot(&tx, playlist)?;
        tx.commit().context("Failed to update playlist")?;
        Ok(true)
    }

    /// Delete a playlist record (the destination playlist is left alone)
    ///
    /// Returns `false` if no playlist with this source ID exists.
    pub fn delete_playlist(&self, source_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM playlists WHERE source_id = ?", params![source_id])
            .context("Failed to delete playlist")?;
        if deleted == 0 {
            warn!(
                "Playlist with Spotify ID '{}' not found for deletion",
                source_id
            );
        }
        Ok(deleted > 0)
    }

    /// Count stored playlists
    pub fn playlist_count(&self) -> Result<i64> {
        count(&self.conn, "playlists")
    }

    // ==================== Active Playlists ====================

    /// Destination IDs of the playlists selected for syncing, in order
    pub fn active_playlists(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT destination_id FROM active_playlists ORDER BY position")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .context("Failed to get active playlists")?;
        Ok(ids)
    }

    /// Mark a playlist as active
    ///
    /// Returns `false` if it already was.
    pub fn activate_playlist(&self, destination_id: &str) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO active_playlists (destination_id, position)
                 VALUES (?, (SELECT COALESCE(MAX(position), -1) + 1 FROM active_playlists))",
                params![destination_id],
            )
            .context("Failed to activate playlist")?;
        Ok(inserted > 0)
    }

    /// Remove a playlist from the active list
    ///
    /// Returns `false` if it was not active.
    pub fn deactivate_playlist(&self, destination_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM active_playlists WHERE destination_id = ?",
                params![destination_id],
            )
            .context("Failed to deactivate playlist")?;
        Ok(deleted > 0)
    }

    /// Replace the active list
    pub fn set_active_playlists(&self, destination_ids: &[String]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM active_playlists", [])?;
        let mut seen = HashSet::new();
        let unique = destination_ids.iter().filter(|id| seen.insert(id.as_str()));
        for (position, id) in unique.enumerate() {
            tx.execute(
                "INSERT INTO active_playlists (destination_id, position) VALUES (?, ?)",
                params![id, position as i64],
            )?;
        }
        tx.commit().context("Failed to set active playlists")?;
        Ok(())
    }

    // ==================== Credentials ====================

    /// Load stored Spotify tokens
    pub fn load_tokens(&self) -> Result<Option<OAuthTokens>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM credentials WHERE key = 'spotify'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load credentials")?;

        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Stored credentials are corrupted")?,
            )),
            None => Ok(None),
        }
    }

    /// Save Spotify tokens, replacing any previous ones
    pub fn save_tokens(&self, tokens: &OAuthTokens) -> Result<()> {
        let json = serde_json::to_string(tokens)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO credentials (key, value) VALUES ('spotify', ?)",
                params![json],
            )
            .context("Failed to save credentials")?;
        Ok(())
    }

    /// Forget stored Spotify tokens
    pub fn clear_tokens(&self) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM credentials WHERE key = 'spotify'", [])
            .context("Failed to clear credentials")?;
        Ok(deleted > 0)
    }

    // ==================== Helpers ====================

    fn find_playlist(&self, column: &str, value: &str) -> Result<Option<SyncedPlaylist>> {
        let playlist = self
            .conn
            .query_row(
                &format!(
                    "SELECT name, source_id, destination_id FROM playlists WHERE {} = ?",
                    column
                ),
                params![value],
                playlist_from_row,
            )
            .optional()
            .context("Failed to get playlist")?;

        playlist.map(|p| self.hydrate_playlist(p)).transpose()
    }

    fn hydrate_playlist(&self, mut playlist: SyncedPlaylist) -> Result<SyncedPlaylist> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, s.title, s.artist, s.destination_id, s.source_id
            FROM playlist_songs ps
            JOIN songs s ON s.source_id = ps.song_source_id
            WHERE ps.playlist_source_id = ?
            ORDER BY ps.position
            "#,
        )?;
        playlist.songs = stmt
            .query_map(params![playlist.source_id], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlist)
    }
}

/// Insert a song unless its source ID is taken; returns whether it was inserted
fn insert_song(conn: &Connection, song: &DestinationSong) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO songs (id, title, artist, destination_id, source_id)
         VALUES (?, ?, ?, ?, ?)",
        params![
            song.id.to_string(),
            song.title,
            song.artist,
            song.destination_id,
            song.source_id
        ],
    )?;
    Ok(inserted > 0)
}

/// Replace the stored snapshot for a playlist
fn write_snapshot(conn: &Connection, playlist: &SyncedPlaylist) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM playlist_songs WHERE playlist_source_id = ?",
        params![playlist.source_id],
    )?;

    for (position, song) in playlist.songs.iter().enumerate() {
        // Snapshot rows reference songs by source ID
        insert_song(conn, song)?;
        conn.execute(
            "INSERT INTO playlist_songs (playlist_source_id, position, song_source_id)
             VALUES (?, ?, ?)",
            params![playlist.source_id, position as i64, song.source_id],
        )?;
    }
    Ok(())
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .with_context(|| format!("Failed to count {}", table))
}

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<DestinationSong> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(DestinationSong {
        id,
        title: row.get(1)?,
        artist: row.get(2)?,
        destination_id: row.get(3)?,
        source_id: row.get(4)?,
    })
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<SyncedPlaylist> {
    Ok(SyncedPlaylist {
        name: row.get(0)?,
        source_id: row.get(1)?,
        destination_id: row.get(2)?,
        songs: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn song(source_id: &str) -> DestinationSong {
        DestinationSong::new(
            format!("Song {}", source_id),
            "Artist",
            format!("tidal-{}", source_id),
            source_id,
        )
    }

    #[test]
    fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let store = Store::open_with_config(config.clone()).unwrap();

        assert!(config.sqlite_path().exists());
        assert_eq!(store.song_count().unwrap(), 0);
        assert_eq!(store.playlist_count().unwrap(), 0);
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        {
            let store = Store::open_with_config(config.clone()).unwrap();
            let mut playlist = SyncedPlaylist::new("Mix", "sp-1", "td-1");
            playlist.songs = vec![song("a"), song("b")];
            store.add_playlist(&playlist).unwrap();
            store.activate_playlist("td-1").unwrap();
        }

        let store = Store::open_with_config(config).unwrap();
        let playlist = store.get_playlist_by_destination_id("td-1").unwrap().unwrap();
        assert_eq!(playlist.songs.len(), 2);
        assert_eq!(store.active_playlists().unwrap(), vec!["td-1".to_string()]);
    }

    #[test]
    fn test_add_and_get_song() {
        let store = Store::open_in_memory().unwrap();
        let s = song("a");

        assert!(store.add_song(&s).unwrap());

        let by_source = store.get_song_by_source_id("a").unwrap().unwrap();
        assert_eq!(by_source, s);
        let by_destination = store.get_song_by_destination_id("tidal-a").unwrap().unwrap();
        assert_eq!(by_destination.id, s.id);
        assert!(store.get_song_by_source_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_add_song_rejects_duplicate_source_id() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.add_song(&song("a")).unwrap());
        // Same source ID, new local ID
        assert!(!store.add_song(&song("a")).unwrap());
        assert_eq!(store.song_count().unwrap(), 1);
    }

    #[test]
    fn test_bulk_add_filters_existing() {
        let store = Store::open_in_memory().unwrap();
        store.add_song(&song("a")).unwrap();

        let inserted = store
            .add_songs(&[song("a"), song("b"), song("c"), song("b")])
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(store.song_count().unwrap(), 3);
    }

    #[test]
    fn test_bulk_add_of_known_id_inserts_nothing() {
        let store = Store::open_in_memory().unwrap();
        let original = song("a");
        store.add_song(&original).unwrap();

        assert_eq!(store.add_songs(&[song("a")]).unwrap(), 0);
        // The original record is kept
        let stored = store.get_song_by_source_id("a").unwrap().unwrap();
        assert_eq!(stored.id, original.id);
    }

    #[test]
    fn test_get_all_songs_keeps_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        store.add_songs(&[song("c"), song("a"), song("b")]).unwrap();

        let ids: Vec<_> = store
            .get_all_songs()
            .unwrap()
            .into_iter()
            .map(|s| s.source_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_add_playlist_rejects_duplicates() {
        let store = Store::open_in_memory().unwrap();

        assert!(store
            .add_playlist(&SyncedPlaylist::new("Mix", "sp-1", "td-1"))
            .unwrap());
        // Same source ID
        assert!(!store
            .add_playlist(&SyncedPlaylist::new("Other", "sp-1", "td-2"))
            .unwrap());
        // Same destination ID
        assert!(!store
            .add_playlist(&SyncedPlaylist::new("Other", "sp-2", "td-1"))
            .unwrap());
        assert_eq!(store.playlist_count().unwrap(), 1);
    }

    #[test]
    fn test_update_playlist_replaces_snapshot() {
        let store = Store::open_in_memory().unwrap();
        let mut playlist = SyncedPlaylist::new("Mix", "sp-1", "td-1");
        playlist.songs = vec![song("a"), song("b"), song("c")];
        store.add_playlist(&playlist).unwrap();

        let b = store.get_song_by_source_id("b").unwrap().unwrap();
        let a = store.get_song_by_source_id("a").unwrap().unwrap();
        playlist.songs = vec![b, a];
        assert!(store.update_playlist(&playlist).unwrap());

        let stored = store.get_playlist_by_source_id("sp-1").unwrap().unwrap();
        let order: Vec<_> = stored.songs.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_update_missing_playlist_returns_false() {
        let store = Store::open_in_memory().unwrap();
        let playlist = SyncedPlaylist::new("Mix", "sp-1", "td-1");
        assert!(!store.update_playlist(&playlist).unwrap());
    }

    #[test]
    fn test_snapshot_may_repeat_a_song() {
        let store = Store::open_in_memory().unwrap();
        let s = song("a");
        let mut playlist = SyncedPlaylist::new("Mix", "sp-1", "td-1");
        playlist.songs = vec![s.clone(), s];
        store.add_playlist(&playlist).unwrap();

        let stored = store.get_playlist_by_source_id("sp-1").unwrap().unwrap();
        assert_eq!(stored.songs.len(), 2);
        assert_eq!(store.song_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_playlist_keeps_songs() {
        let store = Store::open_in_memory().unwrap();
        let mut playlist = SyncedPlaylist::new("Mix", "sp-1", "td-1");
        playlist.songs = vec![song("a")];
        store.add_playlist(&playlist).unwrap();

        assert!(store.delete_playlist("sp-1").unwrap());
        assert!(!store.delete_playlist("sp-1").unwrap());
        assert!(store.get_playlist_by_source_id("sp-1").unwrap().is_none());
        assert_eq!(store.song_count().unwrap(), 1);
    }

    #[test]
    fn test_active_playlists() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.activate_playlist("td-1").unwrap());
        assert!(store.activate_playlist("td-2").unwrap());
        assert!(!store.activate_playlist("td-1").unwrap());
        assert_eq!(store.active_playlists().unwrap(), vec!["td-1", "td-2"]);

        assert!(store.deactivate_playlist("td-1").unwrap());
        assert!(!store.deactivate_playlist("td-1").unwrap());
        assert!(store.activate_playlist("td-1").unwrap());
        assert_eq!(store.active_playlists().unwrap(), vec!["td-2", "td-1"]);

        store
            .set_active_playlists(&["td-3".to_string(), "td-3".to_string()])
            .unwrap();
        assert_eq!(store.active_playlists().unwrap(), vec!["td-3"]);
    }

    #[test]
    fn test_tokens_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.load_tokens().unwrap().is_none());

        let tokens = OAuthTokens::new("access", "refresh");
        store.save_tokens(&tokens).unwrap();
        assert_eq!(store.load_tokens().unwrap(), Some(tokens));

        assert!(store.clear_tokens().unwrap());
        assert!(store.load_tokens().unwrap().is_none());
    }
}
