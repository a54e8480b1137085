//! Data models for Syncify
//!
//! Defines the records exchanged with the catalogs and persisted in the
//! local store: source songs and playlists (Spotify side), destination
//! songs and synced playlists (Tidal side), and per-playlist sync stats.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A song as listed by the source catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSong {
    /// Track title
    pub title: String,
    /// Artist names, in catalog order
    pub artists: Vec<String>,
    /// Source catalog track ID
    pub source_id: String,
}

impl SourceSong {
    pub fn new(
        title: impl Into<String>,
        artists: Vec<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artists,
            source_id: source_id.into(),
        }
    }

    /// Human-readable label, e.g. `Song by A, B`
    pub fn label(&self) -> String {
        format!("{} by {}", self.title, self.artists.join(", "))
    }
}

/// A playlist as listed by the source catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcePlaylist {
    pub name: String,
    pub source_id: String,
    #[serde(default)]
    pub description: String,
}

/// A source song matched to a destination catalog track
///
/// Created once per distinct `source_id` and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationSong {
    /// Locally generated identifier
    pub id: Uuid,
    /// Title as reported by the destination catalog
    pub title: String,
    /// Artist names joined with ", "
    pub artist: String,
    /// Destination catalog track ID
    pub destination_id: String,
    /// Source catalog track ID this song was matched from
    pub source_id: String,
}

impl DestinationSong {
    /// Create a new destination song with a fresh local ID
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        destination_id: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            artist: artist.into(),
            destination_id: destination_id.into(),
            source_id: source_id.into(),
        }
    }

    /// Human-readable label, e.g. `Song - Artist`
    pub fn label(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

/// A source playlist paired with its destination playlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncedPlaylist {
    pub name: String,
    pub source_id: String,
    pub destination_id: String,
    /// Destination track order as of the last successful reconciliation
    pub songs: Vec<DestinationSong>,
}

impl SyncedPlaylist {
    /// Create a synced playlist with an empty snapshot
    pub fn new(
        name: impl Into<String>,
        source_id: impl Into<String>,
        destination_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            destination_id: destination_id.into(),
            songs: Vec::new(),
        }
    }

    /// Whether `desired` differs from the stored snapshot
    ///
    /// Compared positionally by source ID.
    pub fn differs_from(&self, desired: &[DestinationSong]) -> bool {
        self.songs.len() != desired.len()
            || self
                .songs
                .iter()
                .zip(desired)
                .any(|(stored, wanted)| stored.source_id != wanted.source_id)
    }
}

/// Outcome counters for one reconciled playlist
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    pub added: usize,
    pub removed: usize,
    pub skipped: usize,
    pub duplicates: usize,
}

impl SyncStats {
    /// Stats for a playlist that needed no changes
    pub fn unchanged(count: usize) -> Self {
        Self {
            skipped: count,
            ..Self::default()
        }
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} unchanged",
            self.added, self.removed, self.skipped
        )?;
        if self.duplicates > 0 {
            write!(f, ", {} duplicates", self.duplicates)?;
        }
        Ok(())
    }
}
