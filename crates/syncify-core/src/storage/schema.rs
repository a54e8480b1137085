//! SQLite schema for the local store
//!
//! Two logical tables keyed by catalog IDs (`songs`, `playlists`), the
//! ordered playlist snapshot, the active-playlist list and stored OAuth
//! credentials.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Source tracks matched to destination tracks
        CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            destination_id TEXT NOT NULL,
            source_id TEXT UNIQUE NOT NULL
        );

        -- Source playlists paired with destination playlists
        CREATE TABLE IF NOT EXISTS playlists (
            source_id TEXT PRIMARY KEY,
            destination_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL
        );

        -- Last-synced destination order (one-to-many, ordered)
        CREATE TABLE IF NOT EXISTS playlist_songs (
            playlist_source_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            song_source_id TEXT NOT NULL,
            PRIMARY KEY (playlist_source_id, position),
            FOREIGN KEY (playlist_source_id) REFERENCES playlists(source_id) ON DELETE CASCADE,
            FOREIGN KEY (song_source_id) REFERENCES songs(source_id)
        );

        -- Destination playlists the user has selected for syncing
        CREATE TABLE IF NOT EXISTS active_playlists (
            destination_id TEXT PRIMARY KEY,
            position INTEGER NOT NULL
        );

        -- OAuth tokens and similar secrets
        CREATE TABLE IF NOT EXISTS credentials (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_songs_destination_id ON songs(destination_id);
        CREATE INDEX IF NOT EXISTS idx_playlist_songs_song ON playlist_songs(song_source_id);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
