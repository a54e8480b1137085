//! Command handlers

pub mod config;
pub mod login;
pub mod playlist;
pub mod status;
pub mod sync;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;

use syncify_core::{Config, SpotifyAuth, SpotifyClient, Store, TidalClient};

/// Shared HTTP client for both catalogs
fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("syncify/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Spotify client using the stored tokens
///
/// Token refresh is only possible when the app credentials are configured.
fn spotify_client(http: &Client, store: &Store) -> Result<SpotifyClient> {
    let config = store.config();
    let tokens = store.load_tokens()?;
    let auth = if config.has_spotify_app() {
        Some(SpotifyAuth::from_config(http.clone(), config)?)
    } else {
        None
    };
    Ok(SpotifyClient::new(
        http.clone(),
        config.spotify_api_base.clone(),
        tokens,
        auth,
    ))
}

fn tidal_client(http: &Client, config: &Config) -> Result<TidalClient> {
    TidalClient::from_config(http.clone(), config)
        .map_err(|e| anyhow!("{}. Set one with `syncify config set tidal_token <token>`", e))
}

/// Both catalog clients, for commands that talk to Spotify and Tidal
fn catalogs(store: &Store) -> Result<(SpotifyClient, TidalClient)> {
    let http = http_client()?;
    Ok((spotify_client(&http, store)?, tidal_client(&http, store.config())?))
}
