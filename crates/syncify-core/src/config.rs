//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/syncify/config.toml)
//! 3. Environment variables (SYNCIFY_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "SYNCIFY";

/// Keys accepted by `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "data_dir",
    "spotify_client_id",
    "spotify_client_secret",
    "tidal_token",
    "country_code",
    "oauth_port",
    "pacing_ms",
    "verify_live_order",
    "spotify_api_base",
    "spotify_accounts_base",
    "tidal_api_base",
    "tidal_openapi_base",
    "log_file",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Spotify OAuth application client ID
    #[serde(default)]
    pub spotify_client_id: Option<String>,

    /// Spotify OAuth application client secret
    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    /// Tidal bearer token
    #[serde(default)]
    pub tidal_token: Option<String>,

    /// Country code sent with Tidal requests
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Port of the local OAuth capture server
    #[serde(default = "default_oauth_port")]
    pub oauth_port: u16,

    /// Delay between song conversions, in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Compare against the live Tidal playlist instead of the stored snapshot
    #[serde(default)]
    pub verify_live_order: bool,

    #[serde(default = "default_spotify_api_base")]
    pub spotify_api_base: String,

    #[serde(default = "default_spotify_accounts_base")]
    pub spotify_accounts_base: String,

    #[serde(default = "default_tidal_api_base")]
    pub tidal_api_base: String,

    #[serde(default = "default_tidal_openapi_base")]
    pub tidal_openapi_base: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            spotify_client_id: None,
            spotify_client_secret: None,
            tidal_token: None,
            country_code: default_country_code(),
            oauth_port: default_oauth_port(),
            pacing_ms: default_pacing_ms(),
            verify_live_order: false,
            spotify_api_base: default_spotify_api_base(),
            spotify_accounts_base: default_spotify_accounts_base(),
            tidal_api_base: default_tidal_api_base(),
            tidal_openapi_base: default_tidal_openapi_base(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SYNCIFY_DATA_DIR, SYNCIFY_TIDAL_TOKEN, ...)
    /// 2. Config file (~/.config/syncify/config.toml or SYNCIFY_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_var("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
        if let Some(val) = env_var("SPOTIFY_CLIENT_ID") {
            self.spotify_client_id = non_empty(val);
        }
        if let Some(val) = env_var("SPOTIFY_CLIENT_SECRET") {
            self.spotify_client_secret = non_empty(val);
        }
        if let Some(val) = env_var("TIDAL_TOKEN") {
            self.tidal_token = non_empty(val);
        }
        if let Some(val) = env_var("COUNTRY_CODE") {
            if !val.is_empty() {
                self.country_code = val;
            }
        }
        if let Some(val) = env_var("PACING_MS") {
            if let Ok(ms) = val.parse() {
                self.pacing_ms = ms;
            }
        }
        if let Some(val) = env_var("VERIFY_LIVE_ORDER") {
            self.verify_live_order = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Set a configuration value from its string form
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = value.into(),
            "spotify_client_id" => self.spotify_client_id = optional(value),
            "spotify_client_secret" => self.spotify_client_secret = optional(value),
            "tidal_token" => self.tidal_token = optional(value),
            "country_code" => self.country_code = value.to_uppercase(),
            "oauth_port" => {
                self.oauth_port = value
                    .parse()
                    .context("Invalid value for oauth_port. Use a port number.")?
            }
            "pacing_ms" => {
                self.pacing_ms = value
                    .parse()
                    .context("Invalid value for pacing_ms. Use a number of milliseconds.")?
            }
            "verify_live_order" => {
                self.verify_live_order = value
                    .parse()
                    .context("Invalid value for verify_live_order. Use 'true' or 'false'.")?
            }
            "spotify_api_base" => self.spotify_api_base = value.to_string(),
            "spotify_accounts_base" => self.spotify_accounts_base = value.to_string(),
            "tidal_api_base" => self.tidal_api_base = value.to_string(),
            "tidal_openapi_base" => self.tidal_openapi_base = value.to_string(),
            "log_file" => self.log_file = optional(value).map(PathBuf::from),
            _ => anyhow::bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SYNCIFY_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syncify")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("syncify.db")
    }

    /// Redirect URI registered with the Spotify application
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.oauth_port)
    }

    /// Delay between song conversions
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Whether both Spotify client credentials are set
    pub fn has_spotify_app(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("syncify")
}

fn default_country_code() -> String {
    "US".to_string()
}

fn default_oauth_port() -> u16 {
    2402
}

fn default_pacing_ms() -> u64 {
    500
}

fn default_spotify_api_base() -> String {
    "https://api.spotify.com".to_string()
}

fn default_spotify_accounts_base() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_tidal_api_base() -> String {
    "https://api.tidal.com".to_string()
}

fn default_tidal_openapi_base() -> String {
    "https://openapi.tidal.com".to_string()
}
