/// `load_config` module: loads the optional YAML settings file and the API key from the environment.
///
/// This is the only place where user-supplied YAML is parsed. A missing file
/// argument means built-in defaults; the API key never lives in the file.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use creative_provisioner_core::contract::Credentials;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;

pub const API_KEY_ENV: &str = "CREATIVE_API_KEY";
pub const BASE_URL_ENV: &str = "CREATIVE_API_BASE_URL";

/// Reads `path` (if any) into a [`Config`] and applies the base URL override
/// from `CREATIVE_API_BASE_URL`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        None => {
            info!("No config file given, using defaults");
            Config::default()
        }
        Some(path_ref) => {
            info!(config_path = ?path_ref, "Loading configuration from file");
            let config_content = match fs::read_to_string(path_ref) {
                Ok(content) => content,
                Err(e) => {
                    error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
                    return Err(anyhow::anyhow!(
                        "Failed to read config file {:?}: {}",
                        path_ref,
                        e
                    ));
                }
            };
            match serde_yaml::from_str::<Option<Config>>(&config_content) {
                Ok(conf) => {
                    info!(config_path = ?path_ref, "Parsed config YAML successfully");
                    conf.unwrap_or_default()
                }
                Err(e) => {
                    error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                    return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
                }
            }
        }
    };

    if let Ok(base_url) = env::var(BASE_URL_ENV) {
        if !base_url.trim().is_empty() {
            info!(base_url = %base_url, "Base URL overridden from environment");
            config.api_base_url = base_url.trim().to_string();
        }
    }

    config.trace_loaded();
    Ok(config)
}

/// Resolves the API key: an explicit value wins, otherwise `CREATIVE_API_KEY`.
pub fn load_credentials(explicit: Option<String>) -> Result<Credentials> {
    let key = explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()));
    match key {
        Some(key) => Ok(Credentials::new(key.trim())),
        None => {
            warn!(env = API_KEY_ENV, "No API key available");
            Err(anyhow::anyhow!(
                "Missing API key: pass --api-key or set {API_KEY_ENV}"
            ))
        }
    }
}
