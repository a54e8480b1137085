//! Sync command handler

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::warn;

use syncify_core::{LogReporter, ProgressReporter, Store, SyncOptions, SyncRun, SyncSession};

use super::catalogs;
use crate::output::Output;
use crate::progress::ConsoleReporter;

/// Sync every active playlist from Spotify to Tidal
pub async fn sync(store: Store, output: &Output) -> Result<()> {
    if store.load_tokens()?.is_none() {
        bail!("Not logged in to Spotify. Run `syncify login` first.");
    }

    let (spotify, tidal) = catalogs(&store)?;
    let spotify = Arc::new(spotify);
    let options = SyncOptions::from_config(store.config());

    let reporter: Arc<dyn ProgressReporter> = if output.is_json() || output.is_quiet() {
        Arc::new(LogReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    };

    let session = SyncSession::new(store, spotify.clone(), Arc::new(tidal), reporter, options);
    let result = session.sync_all().await;

    // The access token may have been refreshed during the run
    if let Some(tokens) = spotify.tokens().await {
        if let Err(e) = session.store().save_tokens(&tokens) {
            warn!("Failed to save refreshed Spotify tokens: {}", e);
        }
    }

    let run = result?;
    output.print_sync_run(&run);

    if let SyncRun::Completed(summary) = &run {
        if summary.failed() > 0 {
            bail!("{} playlist(s) failed to sync", summary.failed());
        }
    }
    Ok(())
}
