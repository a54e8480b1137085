//! Loopback HTTP server capturing the Spotify OAuth redirect
//!
//! Routes:
//! - `/login` redirects to the Spotify consent page
//! - `/callback` exchanges the authorization code for tokens
//! - `/token` returns the captured tokens
//! - `/success.html` and `/error.html?error=...` are shown to the user

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::Notify;
use tracing::{error, info};

use syncify_core::{CatalogError, OAuthTokens, SpotifyAuth};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Syncify</title></head>
<body>
<h1>Logged in to Spotify</h1>
<p>You can close this window and return to the terminal.</p>
</body>
</html>
"#;

const ERROR_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Syncify</title></head>
<body>
<h1>Login failed</h1>
<p>{{error}}</p>
</body>
</html>
"#;

/// Shared state of the OAuth server
#[derive(Clone)]
pub struct OAuthState {
    auth: Option<SpotifyAuth>,
    tokens: Arc<Mutex<Option<OAuthTokens>>>,
    received: Arc<Notify>,
}

impl OAuthState {
    /// `auth` is `None` when the Spotify app credentials are not configured
    pub fn new(auth: Option<SpotifyAuth>) -> Self {
        Self {
            auth,
            tokens: Arc::new(Mutex::new(None)),
            received: Arc::new(Notify::new()),
        }
    }

    fn tokens(&self) -> Option<OAuthTokens> {
        self.tokens
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn store_tokens(&self, tokens: OAuthTokens) {
        *self.tokens.lock().unwrap_or_else(|p| p.into_inner()) = Some(tokens);
        self.received.notify_one();
    }

    /// Wait until the callback has captured tokens
    pub async fn wait_for_tokens(&self) -> Option<OAuthTokens> {
        self.received.notified().await;
        self.tokens()
    }
}

pub fn router(state: OAuthState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/success.html", get(success_page))
        .route("/error.html", get(error_page))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/token", get(token))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ErrorParams {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

async fn index() -> &'static str {
    "Syncify OAuth server is running. Open /login to connect Spotify."
}

async fn success_page() -> Html<&'static str> {
    Html(SUCCESS_PAGE)
}

async fn error_page(Query(params): Query<ErrorParams>) -> Html<String> {
    let message = params.error.as_deref().unwrap_or("Unknown error");
    Html(ERROR_PAGE.replace("{{error}}", &escape_html(message)))
}

async fn login(State(state): State<OAuthState>) -> Redirect {
    let Some(auth) = &state.auth else {
        return error_redirect("Client ID and Secret are not set");
    };
    match auth.authorize_url() {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            error!("Failed to build authorize URL: {}", e);
            error_redirect("Failed to build authorization URL")
        }
    }
}

async fn callback(
    State(state): State<OAuthState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return error_redirect("Missing code parameter");
    };
    let Some(auth) = &state.auth else {
        return error_redirect("Client ID and Secret are not set");
    };

    match auth.exchange_code(&code).await {
        Ok(tokens) if tokens.access_token.is_empty() => error_redirect("No access token received"),
        Ok(tokens) => {
            info!("Received Spotify tokens");
            state.store_tokens(tokens);
            Redirect::to("/success.html")
        }
        Err(CatalogError::Auth(message)) => {
            error!("Token exchange rejected: {}", message);
            error_redirect(&message)
        }
        Err(e) => {
            error!("Token exchange failed: {}", e);
            error_redirect("Failed to fetch token")
        }
    }
}

async fn token(State(state): State<OAuthState>) -> Response {
    match state.tokens() {
        Some(tokens) if !tokens.access_token.is_empty() => Json(serde_json::json!({
            "accessToken": tokens.access_token,
            "refreshToken": tokens.refresh_token,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "No token available. Please authenticate first."
            })),
        )
            .into_response(),
    }
}

fn error_redirect(message: &str) -> Redirect {
    let location = Url::parse_with_params("http://localhost/error.html", &[("error", message)])
        .map(|url| format!("{}?{}", url.path(), url.query().unwrap_or_default()))
        .unwrap_or_else(|_| "/error.html".to_string());
    Redirect::to(&location)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header::LOCATION;

    fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        response.headers()[LOCATION].to_str().unwrap().to_string()
    }

    fn configured() -> OAuthState {
        OAuthState::new(Some(SpotifyAuth::new(
            reqwest::Client::new(),
            "https://accounts.spotify.com",
            "client-id",
            "client-secret",
            "http://127.0.0.1:8888/callback",
        )))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_login_without_credentials() {
        let redirect = login(State(OAuthState::new(None))).await;
        assert_eq!(
            location(redirect),
            "/error.html?error=Client+ID+and+Secret+are+not+set"
        );
    }

    #[tokio::test]
    async fn test_login_redirects_to_spotify() {
        let url = location(login(State(configured())).await);
        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("response_type=code"));
    }

    #[tokio::test]
    async fn test_callback_requires_code() {
        let params = CallbackParams { code: None };
        let redirect = callback(State(configured()), Query(params)).await;
        assert_eq!(location(redirect), "/error.html?error=Missing+code+parameter");
    }

    #[tokio::test]
    async fn test_token_before_login() {
        let response = token(State(OAuthState::new(None))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "No token available. Please authenticate first."
        );
    }

    #[tokio::test]
    async fn test_token_after_login() {
        let state = OAuthState::new(None);
        state.store_tokens(OAuthTokens::new("access", "refresh"));

        let response = token(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["accessToken"], "access");
        assert_eq!(body["refreshToken"], "refresh");

        let waited = state.wait_for_tokens().await.unwrap();
        assert_eq!(waited.access_token, "access");
    }

    #[tokio::test]
    async fn test_error_page_escapes_message() {
        let params = ErrorParams {
            error: Some("<script>".to_string()),
        };
        let Html(page) = error_page(Query(params)).await;
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
