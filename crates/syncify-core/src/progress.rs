//! Sync progress reporting
//!
//! The orchestrator pushes state changes to a [`ProgressReporter`]. Calls
//! are fire-and-forget: a reporter cannot fail or slow down the sync.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::SyncStats;

/// Per-playlist sync phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Syncing,
    Resolving,
    Adding,
    Completed,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Pending => "pending",
            Phase::Syncing => "syncing",
            Phase::Resolving => "resolving",
            Phase::Adding => "adding",
            Phase::Completed => "completed",
            Phase::Error => "error",
        };
        f.write_str(name)
    }
}

/// Receives progress notifications during a sync run
pub trait ProgressReporter: Send + Sync {
    /// A run is starting with these playlists
    fn start(&self, playlist_names: &[String]);

    /// A playlist moved to a new phase; `progress` is `(done, total)` songs
    fn playlist_status(&self, name: &str, phase: Phase, progress: Option<(usize, usize)>);

    fn playlist_complete(&self, name: &str, stats: &SyncStats);

    fn playlist_error(&self, name: &str, message: &str);

    /// A song could not be matched in the destination catalog
    fn failed_song(&self, _playlist: &str, _label: &str, _reason: &str) {}

    fn end(&self);
}

/// Reporter that ignores everything
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _playlist_names: &[String]) {}
    fn playlist_status(&self, _name: &str, _phase: Phase, _progress: Option<(usize, usize)>) {}
    fn playlist_complete(&self, _name: &str, _stats: &SyncStats) {}
    fn playlist_error(&self, _name: &str, _message: &str) {}
    fn end(&self) {}
}

/// Reporter that writes to the tracing log
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn start(&self, playlist_names: &[String]) {
        info!("Syncing {} playlists", playlist_names.len());
    }

    fn playlist_status(&self, name: &str, phase: Phase, progress: Option<(usize, usize)>) {
        match progress {
            Some((done, total)) => info!("{}: {} ({}/{})", name, phase, done, total),
            None => info!("{}: {}", name, phase),
        }
    }

    fn playlist_complete(&self, name: &str, stats: &SyncStats) {
        info!("{}: {}", name, stats);
    }

    fn playlist_error(&self, name: &str, message: &str) {
        warn!("{}: {}", name, message);
    }

    fn end(&self) {
        info!("Sync finished");
    }
}

/// Transient counters for the playlist currently being synced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateProgress {
    pub current_playlist: Option<String>,
    pub processed_songs: usize,
    pub total_songs: usize,
    pub is_converting: bool,
}

impl UpdateProgress {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
