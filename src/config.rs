// src/config.rs

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::models::Credential;
use crate::core::scanner::login_scanner::{default_credentials, DEFAULT_SUCCESS_MARKER};
use crate::core::scanner::{LoginTarget, DEFAULT_WORKERS};
use crate::logging::get_config_dir;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_MODEL_PATH: &str = "models/phishing_url_detector.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime settings. Every service credential is optional; a missing one
/// disables the stage that needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dnsdumpster_api_key: Option<String>,
    pub misp_url: Option<String>,
    pub misp_api_key: Option<String>,
    pub misp_verify_tls: bool,
    pub model_path: PathBuf,
    pub workers: usize,
    pub enrich_features: bool,
    pub login_url: Option<String>,
    pub login_credentials: Option<Vec<Credential>>,
    pub login_success_marker: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dnsdumpster_api_key: None,
            misp_url: None,
            misp_api_key: None,
            misp_verify_tls: true,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            workers: DEFAULT_WORKERS,
            enrich_features: false,
            login_url: None,
            login_credentials: None,
            login_success_marker: None,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file, then the environment.
    ///
    /// An explicit `path` must exist. Without one, `config.json` in the
    /// project config directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = get_config_dir().join(CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "Configuration file loaded.");
        Ok(config)
    }

    /// Overrides fields from `WEBGUARD_*` variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = var("WEBGUARD_DNSDUMPSTER_API_KEY") {
            self.dnsdumpster_api_key = Some(key);
        }
        if let Some(url) = var("WEBGUARD_MISP_URL") {
            self.misp_url = Some(url);
        }
        if let Some(key) = var("WEBGUARD_MISP_API_KEY") {
            self.misp_api_key = Some(key);
        }
        if let Some(path) = var("WEBGUARD_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
    }

    /// The threat-intel URL and key, when both are set.
    pub fn misp_credentials(&self) -> Option<(&str, &str)> {
        match (self.misp_url.as_deref(), self.misp_api_key.as_deref()) {
            (Some(url), Some(key)) => Some((url, key)),
            (None, None) => None,
            _ => {
                warn!("Only one of the threat-intel URL and API key is set; lookup disabled.");
                None
            }
        }
    }

    pub fn login_target(&self) -> Option<LoginTarget> {
        let url = self.login_url.clone()?;
        Some(LoginTarget {
            url,
            credentials: self.login_credentials.clone().unwrap_or_else(default_credentials),
            success_marker: self
                .login_success_marker
                .clone()
                .unwrap_or_else(|| DEFAULT_SUCCESS_MARKER.to_string()),
        })
    }
}
