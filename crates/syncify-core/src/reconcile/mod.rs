//! Playlist reconciliation
//!
//! Brings one destination playlist in line with its source playlist:
//!
//! 1. Fetch the source songs and resolve each to a destination song
//!    (store hit by source ID, otherwise converted and stored).
//! 2. Compare the result with the stored snapshot; stop if unchanged.
//! 3. Confirm every destination track still resolves.
//! 4. Walk the live playlist against the desired order and apply the
//!    deletes and inserts (see [`walk`]), each guarded by the playlist
//!    ETag (see [`mutation`]).
//! 5. Store the new snapshot.
//!
//! Failures of single songs or single writes are logged and counted; they
//! never abort the playlist.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::catalog::{CatalogError, DestinationCatalog, SourceCatalog};
use crate::config::Config;
use crate::converter::{ConversionResult, SongConverter};
use crate::error::{ErrorKind, SyncError};
use crate::models::{DestinationSong, SourcePlaylist, SourceSong, SyncStats, SyncedPlaylist};
use crate::progress::{Phase, ProgressReporter, UpdateProgress};
use crate::retry::RetryPolicy;
use crate::store::Store;

pub mod mutation;
pub mod walk;

pub use mutation::{InsertOutcome, PlaylistWriter};
pub use walk::{Cursor, Walk, WalkState, WalkStep};

/// Failures listed individually before summarizing
const FAILURE_LOG_LIMIT: usize = 5;

/// Timing and policy knobs for a sync run
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Pause between song conversions
    pub pacing: Duration,
    pub search_retry: RetryPolicy,
    pub stale_retry: RetryPolicy,
    /// Pause before refreshing the ETag after a failed write
    pub failure_pause: Duration,
    /// Compare against the live playlist instead of the stored snapshot
    pub verify_live_order: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(500),
            search_retry: RetryPolicy::search(),
            stale_retry: RetryPolicy::stale_token(),
            failure_pause: Duration::from_millis(300),
            verify_live_order: false,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pacing: config.pacing(),
            verify_live_order: config.verify_live_order,
            ..Self::default()
        }
    }
}

/// Lock the progress counters, recovering from a poisoned lock
pub(crate) fn with_progress(progress: &Mutex<UpdateProgress>, f: impl FnOnce(&mut UpdateProgress)) {
    let mut guard = progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard);
}

fn abort_on_auth(error: CatalogError) -> Option<anyhow::Error> {
    (error.kind() == ErrorKind::Auth).then(|| anyhow::Error::new(error))
}

/// Reconciles destination playlists against their source playlists
pub struct Reconciler<'a> {
    store: &'a Store,
    source: &'a dyn SourceCatalog,
    destination: &'a dyn DestinationCatalog,
    reporter: &'a dyn ProgressReporter,
    progress: &'a Mutex<UpdateProgress>,
    options: SyncOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a Store,
        source: &'a dyn SourceCatalog,
        destination: &'a dyn DestinationCatalog,
        reporter: &'a dyn ProgressReporter,
        progress: &'a Mutex<UpdateProgress>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            source,
            destination,
            reporter,
            progress,
            options,
        }
    }

    /// Sync the playlist stored under `destination_id`
    ///
    /// `source_playlists` is the source listing fetched for this run.
    pub async fn reconcile(
        &self,
        destination_id: &str,
        source_playlists: &[SourcePlaylist],
    ) -> Result<SyncStats> {
        let mut playlist = self
            .store
            .get_playlist_by_destination_id(destination_id)?
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "Data playlist with ID {} not found. Please re-add it in the settings.",
                    destination_id
                ))
            })?;

        let name = playlist.name.clone();
        with_progress(self.progress, |p| p.current_playlist = Some(name.clone()));
        self.reporter.playlist_status(&name, Phase::Syncing, None);
        info!("Processing playlist: {}", name);

        let source = source_playlists
            .iter()
            .find(|p| p.source_id == playlist.source_id)
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "Playlist '{}' not found in Spotify playlists. Has it been deleted on Spotify?",
                    name
                ))
            })?;

        let songs = self
            .source
            .playlist_songs(source)
            .await
            .with_context(|| format!("Failed to fetch songs of '{}'", source.name))?;

        if songs.is_empty() {
            warn!("No songs found in Spotify playlist '{}'", source.name);
            return Ok(SyncStats::default());
        }
        info!("Found {} songs in Spotify playlist", songs.len());

        let desired = self.resolve_songs(&name, &songs).await?;
        if desired.is_empty() {
            return Err(SyncError::Validation(format!(
                "No valid songs found for playlist '{}'. All conversions failed.",
                source.name
            ))
            .into());
        }
        info!(
            "Converted or found {}/{} songs",
            desired.len(),
            songs.len()
        );

        let mut live = None;
        let changed = if self.options.verify_live_order {
            let items = self.live_items(destination_id).await?;
            let changed = items.len() != desired.len()
                || items
                    .iter()
                    .zip(&desired)
                    .any(|(l, d)| *l != d.destination_id);
            live = Some(items);
            changed
        } else {
            playlist.differs_from(&desired)
        };

        if !changed {
            info!("No changes detected for playlist '{}', skipping update", name);
            return Ok(SyncStats::unchanged(desired.len()));
        }

        let tracks = self.resolve_tracks(&name, &desired).await?;
        let live = match live {
            Some(items) => items,
            None => self.live_items(destination_id).await?,
        };

        let stats = self.apply(&playlist, &live, &tracks).await?;

        playlist.songs = desired;
        self.store
            .update_playlist(&playlist)
            .context("Failed to save playlist snapshot")?;

        info!("Playlist '{}' synced: {}", name, stats);
        Ok(stats)
    }

    async fn live_items(&self, destination_id: &str) -> Result<Vec<String>> {
        self.destination
            .playlist_items(destination_id)
            .await
            .with_context(|| format!("Failed to fetch items of playlist {}", destination_id))
    }

    /// Resolve source songs to destination songs, in source order
    ///
    /// Songs that cannot be matched are reported and left out.
    async fn resolve_songs(&self, name: &str, songs: &[SourceSong]) -> Result<Vec<DestinationSong>> {
        let mut known: HashMap<String, DestinationSong> = self
            .store
            .get_all_songs()?
            .into_iter()
            .map(|s| (s.source_id.clone(), s))
            .collect();

        let mut queued = HashSet::new();
        let to_convert: Vec<SourceSong> = songs
            .iter()
            .filter(|s| !known.contains_key(&s.source_id) && queued.insert(s.source_id.clone()))
            .cloned()
            .collect();

        if !to_convert.is_empty() {
            info!("Converting {} new songs...", to_convert.len());
            with_progress(self.progress, |p| {
                p.is_converting = true;
                p.processed_songs = 0;
                p.total_songs = to_convert.len();
            });

            let converter =
                SongConverter::new(self.destination, self.options.search_retry, self.options.pacing);
            let results = converter
                .convert_all(&to_convert, |index, total, song| {
                    with_progress(self.progress, |p| p.processed_songs = index + 1);
                    self.reporter
                        .playlist_status(name, Phase::Syncing, Some((index + 1, total)));
                    info!("Converting: {} ({}/{})...", song.title, index + 1, total);
                })
                .await;

            with_progress(self.progress, |p| p.is_converting = false);
            self.record_conversions(name, results, &mut known)?;
        }

        Ok(songs
            .iter()
            .filter_map(|s| known.get(&s.source_id).cloned())
            .collect())
    }

    fn record_conversions(
        &self,
        name: &str,
        results: Vec<ConversionResult>,
        known: &mut HashMap<String, DestinationSong>,
    ) -> Result<()> {
        let mut converted = Vec::new();
        let mut failed = Vec::new();

        for ConversionResult { source, result } in results {
            match result {
                Ok(song) => converted.push(song),
                Err(e) if e.is_fatal() => {
                    return Err(SyncError::Auth(e.to_string()))
                        .context("Song conversion aborted");
                }
                Err(e) => failed.push((source.label(), e.to_string())),
            }
        }

        if !converted.is_empty() {
            let added = self
                .store
                .add_songs(&converted)
                .context("Failed to save converted songs")?;
            info!("Converted and saved {} new songs", added);
            known.extend(converted.into_iter().map(|s| (s.source_id.clone(), s)));
        }

        if !failed.is_empty() {
            warn!("Failed to convert {} songs:", failed.len());
            for (label, reason) in failed.iter().take(FAILURE_LOG_LIMIT) {
                warn!("  • {} - {}", label, reason);
            }
            if failed.len() > FAILURE_LOG_LIMIT {
                warn!("  ... and {} more", failed.len() - FAILURE_LOG_LIMIT);
            }
            for (label, reason) in &failed {
                self.reporter.failed_song(name, label, reason);
            }
        }

        Ok(())
    }

    /// Destination track IDs that still resolve, in desired order
    async fn resolve_tracks(&self, name: &str, desired: &[DestinationSong]) -> Result<Vec<String>> {
        let total = desired.len();
        let mut tracks = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (index, song) in desired.iter().enumerate() {
            self.reporter
                .playlist_status(name, Phase::Resolving, Some((index + 1, total)));

            match self.destination.track_exists(&song.destination_id).await {
                Ok(true) => tracks.push(song.destination_id.clone()),
                Ok(false) => failed.push(song.label()),
                Err(e) => {
                    if let Some(fatal) = abort_on_auth(e) {
                        return Err(fatal.context("Failed to resolve tracks"));
                    }
                    failed.push(song.label());
                }
            }
        }

        if !failed.is_empty() {
            warn!("Failed to resolve {} media items:", failed.len());
            for label in failed.iter().take(FAILURE_LOG_LIMIT) {
                warn!("  • {}", label);
            }
            if failed.len() > FAILURE_LOG_LIMIT {
                warn!("  ... and {} more", failed.len() - FAILURE_LOG_LIMIT);
            }
        }

        if tracks.is_empty() {
            return Err(SyncError::Validation(format!(
                "No valid media items found for playlist. All {} items failed to resolve.",
                total
            ))
            .into());
        }

        Ok(tracks)
    }

    /// Apply the walk's deletes and inserts to the destination playlist
    async fn apply(
        &self,
        playlist: &SyncedPlaylist,
        live: &[String],
        tracks: &[String],
    ) -> Result<SyncStats> {
        info!("Syncing {} songs to Tidal playlist...", tracks.len());

        let mut writer = PlaylistWriter::open(
            self.destination,
            &playlist.destination_id,
            self.options.stale_retry,
            self.options.failure_pause,
        )
        .await
        .context("Failed to fetch playlist ETag")?;

        let mut stats = SyncStats::default();
        let mut walk = Walk::new(live, tracks);
        let total = tracks.len();

        loop {
            match walk.next_step() {
                WalkStep::Skip { position } => {
                    stats.skipped += 1;
                    self.reporter
                        .playlist_status(&playlist.name, Phase::Adding, Some((position + 1, total)));
                }
                WalkStep::Delete { position, index } => {
                    self.reporter
                        .playlist_status(&playlist.name, Phase::Adding, Some((position + 1, total)));
                    match writer.delete(index).await {
                        Ok(()) => {
                            stats.removed += 1;
                            walk.complete(true);
                        }
                        Err(e) => {
                            error!("Failed to remove item at position {}: {}", position, e);
                            if let Some(fatal) = abort_on_auth(e) {
                                return Err(fatal);
                            }
                            writer.recover().await;
                            walk.complete(false);
                        }
                    }
                }
                WalkStep::Insert { position } => {
                    let track_id = &tracks[position];
                    match writer.insert(track_id).await {
                        Ok(InsertOutcome::Added) => {
                            stats.added += 1;
                            walk.complete(true);
                        }
                        Ok(InsertOutcome::Duplicate) => {
                            stats.duplicates += 1;
                            walk.complete(true);
                        }
                        Err(e) => {
                            error!("Failed to add track {} to playlist: {}", track_id, e);
                            if let Some(fatal) = abort_on_auth(e) {
                                return Err(fatal);
                            }
                            writer.recover().await;
                            walk.complete(false);
                        }
                    }
                }
                WalkStep::Cleanup { index } => match writer.delete(index).await {
                    Ok(()) => {
                        stats.removed += 1;
                        walk.complete(true);
                    }
                    Err(e) => {
                        error!("Failed to remove extra item: {}", e);
                        if let Some(fatal) = abort_on_auth(e) {
                            return Err(fatal);
                        }
                        writer.recover().await;
                        walk.complete(false);
                    }
                },
                WalkStep::Done => break,
            }
        }

        Ok(stats)
    }
}
