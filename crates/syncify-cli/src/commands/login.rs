//! Spotify login and logout

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use syncify_core::{SpotifyAuth, Store};

use super::http_client;
use crate::oauth::{router, OAuthState};
use crate::output::Output;

/// How long to wait for the user to finish the consent flow
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

/// Run the browser OAuth flow and store the tokens
pub async fn login(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let auth = SpotifyAuth::from_config(http_client()?, config).map_err(|e| {
        anyhow!(
            "{}. Set them with `syncify config set spotify_client_id <id>` \
             and `syncify config set spotify_client_secret <secret>`",
            e
        )
    })?;

    let state = OAuthState::new(Some(auth));
    let addr = SocketAddr::from(([127, 0, 0, 1], config.oauth_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to start OAuth server on {}", addr))?;
    info!("OAuth server listening on {}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let login_url = format!("http://{}/login", addr);
    output.message(&format!("Opening {} in your browser...", login_url));
    if let Err(e) = open::that(&login_url) {
        warn!("Failed to open browser: {}", e);
        output.message(&format!("Open this URL to log in: {}", login_url));
    }

    let tokens = tokio::select! {
        tokens = state.wait_for_tokens() => tokens,
        _ = tokio::time::sleep(LOGIN_TIMEOUT) => None,
        _ = tokio::signal::ctrl_c() => None,
    };

    // Let the browser load the success page before the server goes away
    tokio::time::sleep(Duration::from_secs(1)).await;
    let _ = shutdown_tx.send(());
    match server.await {
        Ok(Err(e)) => warn!("OAuth server error: {}", e),
        Err(e) => warn!("OAuth server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    let Some(tokens) = tokens else {
        bail!("Spotify login did not complete");
    };
    store.save_tokens(&tokens)?;
    output.success("Logged in to Spotify");
    Ok(())
}

/// Forget the stored Spotify tokens
pub fn logout(store: &Store, output: &Output) -> Result<()> {
    if store.clear_tokens()? {
        output.success("Logged out of Spotify");
    } else {
        output.message("Not logged in to Spotify");
    }
    Ok(())
}
