//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use syncify_core::config::CONFIG_KEYS;
use syncify_core::Config;

use crate::output::{Output, OutputFormat};

/// Keys whose values are never printed
const SECRET_KEYS: &[&str] = &["spotify_client_secret", "tidal_token"];

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let entries = entries(&config);

    match output.format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = entries
                .into_iter()
                .map(|(key, value)| {
                    let value = value.map(serde_json::Value::String).unwrap_or_default();
                    (key.to_string(), value)
                })
                .collect();
            println!("{}", serde_json::Value::Object(map));
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            let width = CONFIG_KEYS.iter().map(|k| k.len()).max().unwrap_or(0) + 1;
            println!("Configuration:");
            for (key, value) in entries {
                println!(
                    "  {:<width$} {}",
                    format!("{}:", key),
                    value.as_deref().unwrap_or("(not set)"),
                    width = width
                );
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set_value(&key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config.save_to_path(&save_path)?;

    let shown = if SECRET_KEYS.contains(&key.as_str()) {
        "********"
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));
    Ok(())
}

/// Every key with its display value, secrets masked
fn entries(config: &Config) -> Vec<(&'static str, Option<String>)> {
    let path = |p: &PathBuf| p.display().to_string();
    let secret = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());

    vec![
        ("data_dir", Some(path(&config.data_dir))),
        ("spotify_client_id", config.spotify_client_id.clone()),
        ("spotify_client_secret", secret(&config.spotify_client_secret)),
        ("tidal_token", secret(&config.tidal_token)),
        ("country_code", Some(config.country_code.clone())),
        ("oauth_port", Some(config.oauth_port.to_string())),
        ("pacing_ms", Some(config.pacing_ms.to_string())),
        ("verify_live_order", Some(config.verify_live_order.to_string())),
        ("spotify_api_base", Some(config.spotify_api_base.clone())),
        ("spotify_accounts_base", Some(config.spotify_accounts_base.clone())),
        ("tidal_api_base", Some(config.tidal_api_base.clone())),
        ("tidal_openapi_base", Some(config.tidal_openapi_base.clone())),
        ("log_file", config.log_file.as_ref().map(path)),
    ]
}
