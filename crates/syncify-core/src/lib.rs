//! Syncify Core Library
//!
//! This crate provides the core functionality for Syncify, which keeps
//! Tidal playlists in sync with their Spotify counterparts.
//!
//! # Architecture
//!
//! - **Catalogs**: Spotify is read, Tidal is written, both behind traits
//! - **Store**: SQLite holds matched songs, playlist pairs and snapshots
//! - **Reconciler**: positional diff applied under ETag concurrency control
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//! let session = SyncSession::new(store, spotify, tidal, reporter, options);
//!
//! if let SyncRun::Completed(summary) = session.sync_all().await? {
//!     println!("{}", summary.totals());
//! }
//! ```
//!
//! # Modules
//!
//! - `orchestrator`: Runs a sync over all active playlists (main entry point)
//! - `reconcile`: Per-playlist reconciliation, walk and guarded writes
//! - `converter`: Source-to-destination song matching
//! - `catalog`: Spotify and Tidal API clients
//! - `membership`: Selecting which playlists are synced
//! - `store`: Local persistence
//! - `config`: Application configuration

pub mod auth;
pub mod catalog;
pub mod config;
pub mod converter;
pub mod error;
pub mod membership;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod retry;
pub mod storage;
pub mod store;

#[cfg(test)]
mod testing;

pub use auth::{OAuthTokens, SpotifyAuth};
pub use catalog::{
    CatalogError, DestinationCatalog, SourceCatalog, SpotifyClient, TidalClient, TrackMatch,
};
pub use config::Config;
pub use converter::{ConversionError, ConversionResult, SongConverter};
pub use error::{ErrorKind, SyncError};
pub use membership::PlaylistManager;
pub use models::{DestinationSong, SourcePlaylist, SourceSong, SyncStats, SyncedPlaylist};
pub use orchestrator::{PlaylistOutcome, SyncRun, SyncSession, SyncSummary};
pub use progress::{LogReporter, NoopReporter, Phase, ProgressReporter, UpdateProgress};
pub use reconcile::{Reconciler, SyncOptions};
pub use retry::RetryPolicy;
pub use store::Store;
