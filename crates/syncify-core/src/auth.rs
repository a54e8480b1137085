//! Spotify OAuth
//!
//! Authorization-code flow against the Spotify accounts service: building
//! the authorize URL, exchanging the redirect code and refreshing the
//! access token. The loopback listener that receives the redirect lives
//! in the CLI.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{CatalogError, CatalogResult};
use crate::config::Config;

/// Scopes needed to read private and collaborative playlists
pub const SCOPES: &[&str] = &["playlist-read-private", "playlist-read-collaborative"];

/// Access and refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl OAuthTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Client for the Spotify accounts service
#[derive(Clone)]
pub struct SpotifyAuth {
    http: Client,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyAuth {
    pub fn new(
        http: Client,
        accounts_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            accounts_base: accounts_base.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Build from configuration; fails when the client ID or secret is unset
    pub fn from_config(http: Client, config: &Config) -> CatalogResult<Self> {
        let (Some(client_id), Some(client_secret)) =
            (&config.spotify_client_id, &config.spotify_client_secret)
        else {
            return Err(CatalogError::Auth(
                "Client ID and Secret are not set".to_string(),
            ));
        };

        Ok(Self::new(
            http,
            config.spotify_accounts_base.clone(),
            client_id.clone(),
            client_secret.clone(),
            config.redirect_uri(),
        ))
    }

    /// URL the user visits to grant access
    pub fn authorize_url(&self) -> CatalogResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", &SCOPES.join(" ")),
            ],
        )
        .map_err(|e| CatalogError::Parse(format!("invalid accounts URL: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> CatalogResult<OAuthTokens> {
        debug!("Exchanging authorization code");
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;

        let access_token = response
            .access_token
            .ok_or_else(|| CatalogError::Auth("No access token received".to_string()))?;
        Ok(OAuthTokens {
            access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
        })
    }

    /// Refresh an access token
    ///
    /// Spotify may omit the refresh token in the response; the old one is
    /// kept in that case.
    pub async fn refresh(&self, tokens: &OAuthTokens) -> CatalogResult<OAuthTokens> {
        if tokens.refresh_token.is_empty() {
            return Err(CatalogError::Auth("No refresh token stored".to_string()));
        }

        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", tokens.refresh_token.as_str()),
            ])
            .await?;

        let access_token = response
            .access_token
            .ok_or_else(|| CatalogError::Auth("No access token received".to_string()))?;
        info!("Successfully refreshed Spotify token");

        Ok(OAuthTokens {
            access_token,
            refresh_token: response
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| tokens.refresh_token.clone()),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> CatalogResult<TokenResponse> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!(
                "Token request failed: {} - {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}
