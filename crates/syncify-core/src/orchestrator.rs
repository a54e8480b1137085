//! Sync orchestration
//!
//! A [`SyncSession`] runs the reconciler over every active playlist, one
//! after another. Only one run can be in flight per session; a second
//! call while a run is active returns [`SyncRun::AlreadyRunning`].
//!
//! A failing playlist is reported and the batch moves on. Failures that
//! no later playlist can recover from (rejected credentials, an unusable
//! store) end the run with an error.
//!
//! ## Usage
//!
//! ```ignore
//! let session = SyncSession::new(store, spotify, tidal, Arc::new(LogReporter), options);
//! match session.sync_all().await? {
//!     SyncRun::Completed(summary) => println!("{}", summary.totals()),
//!     SyncRun::AlreadyRunning => {}
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::{DestinationCatalog, SourceCatalog};
use crate::error::{classify, user_message, ErrorKind};
use crate::models::SyncStats;
use crate::progress::{ProgressReporter, UpdateProgress};
use crate::reconcile::{with_progress, Reconciler, SyncOptions};
use crate::store::Store;

/// Result of one playlist in a run
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistOutcome {
    pub name: String,
    pub destination_id: String,
    pub stats: Option<SyncStats>,
    pub error: Option<String>,
}

impl PlaylistOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub playlists: Vec<PlaylistOutcome>,
}

impl SyncSummary {
    fn empty(started_at: DateTime<Utc>, timer: Instant) -> Self {
        Self {
            started_at,
            elapsed: timer.elapsed(),
            playlists: Vec::new(),
        }
    }

    /// Stats summed over the successful playlists
    pub fn totals(&self) -> SyncStats {
        self.playlists
            .iter()
            .filter_map(|p| p.stats)
            .fold(SyncStats::default(), |acc, s| SyncStats {
                added: acc.added + s.added,
                removed: acc.removed + s.removed,
                skipped: acc.skipped + s.skipped,
                duplicates: acc.duplicates + s.duplicates,
            })
    }

    pub fn failed(&self) -> usize {
        self.playlists.iter().filter(|p| !p.is_success()).count()
    }
}

/// Outcome of [`SyncSession::sync_all`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncRun {
    AlreadyRunning,
    Completed(SyncSummary),
}

/// Clears the in-flight flag and the progress counters when a run ends
struct RunGuard<'a> {
    running: &'a AtomicBool,
    progress: &'a Mutex<UpdateProgress>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        with_progress(self.progress, UpdateProgress::reset);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Owns everything a sync run needs
pub struct SyncSession {
    store: Store,
    source: Arc<dyn SourceCatalog>,
    destination: Arc<dyn DestinationCatalog>,
    reporter: Arc<dyn ProgressReporter>,
    options: SyncOptions,
    running: AtomicBool,
    progress: Mutex<UpdateProgress>,
}

impl SyncSession {
    pub fn new(
        store: Store,
        source: Arc<dyn SourceCatalog>,
        destination: Arc<dyn DestinationCatalog>,
        reporter: Arc<dyn ProgressReporter>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            source,
            destination,
            reporter,
            options,
            running: AtomicBool::new(false),
            progress: Mutex::new(UpdateProgress::default()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the current progress counters
    pub fn progress(&self) -> UpdateProgress {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sync every active playlist
    pub async fn sync_all(&self) -> Result<SyncRun> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Playlist update already in progress. Please wait until the current update is finished.");
            return Ok(SyncRun::AlreadyRunning);
        }
        let _guard = RunGuard {
            running: &self.running,
            progress: &self.progress,
        };

        info!("Starting playlist update...");
        let timer = Instant::now();

        match self.run_batch(timer).await {
            Ok(summary) => {
                info!(
                    "Playlist update completed in {:.1}s",
                    summary.elapsed.as_secs_f64()
                );
                Ok(SyncRun::Completed(summary))
            }
            Err(e) => {
                error!("{}", user_message("Playlist update failed", &e));
                self.reporter.end();
                Err(e)
            }
        }
    }

    async fn run_batch(&self, timer: Instant) -> Result<SyncSummary> {
        let started_at = Utc::now();

        self.source
            .authenticate()
            .await
            .context("Failed to authenticate with Spotify")?;

        let source_playlists = self
            .source
            .playlists()
            .await
            .context("Failed to fetch Spotify playlists")?;
        if source_playlists.is_empty() {
            warn!("No Spotify playlists found.");
            self.reporter.end();
            return Ok(SyncSummary::empty(started_at, timer));
        }

        let active = self.store.active_playlists()?;
        if active.is_empty() {
            warn!("No active playlists to sync. Please select playlists first.");
            self.reporter.end();
            return Ok(SyncSummary::empty(started_at, timer));
        }

        info!("Syncing {} playlist(s)...", active.len());
        let mut names = Vec::with_capacity(active.len());
        for id in &active {
            let name = self
                .store
                .get_playlist_by_destination_id(id)?
                .map(|p| p.name);
            names.push(name);
        }
        let known: Vec<String> = names.iter().flatten().cloned().collect();
        self.reporter.start(&known);

        let reconciler = Reconciler::new(
            &self.store,
            self.source.as_ref(),
            self.destination.as_ref(),
            self.reporter.as_ref(),
            &self.progress,
            self.options,
        );

        let mut outcomes = Vec::with_capacity(active.len());
        for (id, name) in active.iter().zip(names) {
            let result = reconciler.reconcile(id, &source_playlists).await;
            with_progress(&self.progress, UpdateProgress::reset);
            let name = name.unwrap_or_else(|| id.clone());

            match result {
                Ok(stats) => {
                    self.reporter.playlist_complete(&name, &stats);
                    outcomes.push(PlaylistOutcome {
                        name,
                        destination_id: id.clone(),
                        stats: Some(stats),
                        error: None,
                    });
                }
                Err(e) => {
                    let message = user_message(&format!("Failed to update playlist {}", id), &e);
                    error!("{}", message);
                    self.reporter.playlist_error(&name, &message);

                    if classify(&e).is_some_and(ErrorKind::is_fatal) {
                        return Err(e.context(format!("Sync aborted at playlist '{}'", name)));
                    }
                    outcomes.push(PlaylistOutcome {
                        name,
                        destination_id: id.clone(),
                        stats: None,
                        error: Some(message),
                    });
                }
            }
        }

        self.reporter.end();
        Ok(SyncSummary {
            started_at,
            elapsed: timer.elapsed(),
            playlists: outcomes,
        })
    }
}
