//! Configuration file loading with environment variable overrides.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::{DEFAULT_ENDPOINT, DEFAULT_SPACE};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Credential configuration.
    #[serde(default)]
    pub keys: KeysConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote model settings.
    #[serde(default)]
    pub model: ModelConfig,
}

/// Credential configuration.
#[derive(Debug, Default, Deserialize)]
pub struct KeysConfig {
    /// Hugging Face access token.
    pub hf_token: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Generation requests handled at once; further requests wait.
    pub max_in_flight: usize,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_in_flight: 4,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Remote model settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face Space id (`owner/name`).
    pub space: String,
    /// Named endpoint to invoke.
    pub endpoint: String,
    /// Base URL override for the Gradio app (e.g. a local instance).
    pub base_url: Option<String>,
    /// Timeout for each remote request. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            space: DEFAULT_SPACE.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            base_url: None,
            timeout_secs: None,
        }
    }
}

/// A Hugging Face access token recognized by its `hf_` prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct HfToken(String);

impl HfToken {
    /// Prefix every Hugging Face user access token starts with.
    pub const PREFIX: &'static str = "hf_";

    /// Accept a raw value if it carries the token prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialIssue::Malformed`] when the prefix is missing.
    pub fn parse(raw: &str) -> Result<Self, CredentialIssue> {
        if raw.starts_with(Self::PREFIX) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CredentialIssue::Malformed)
        }
    }

    /// The secret value, for building the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HfToken(hf_***)")
    }
}

/// Why no usable credential is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialIssue {
    /// Nothing configured.
    Missing,
    /// A value is configured but lacks the `hf_` prefix.
    Malformed,
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// The raw token value, preferring the `HF_TOKEN` environment variable.
    #[must_use]
    pub fn raw_hf_token(&self) -> Option<String> {
        std::env::var("HF_TOKEN").ok().or_else(|| self.keys.hf_token.clone())
    }

    /// Resolve and validate the credential. Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns the reason no usable token is available.
    pub fn hf_token(&self) -> Result<HfToken, CredentialIssue> {
        match self.raw_hf_token() {
            Some(raw) => HfToken::parse(&raw),
            None => Err(CredentialIssue::Missing),
        }
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `DREAMGATE_CONFIG` environment variable
/// 3. `~/.config/dreamgate/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("DREAMGATE_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/dreamgate/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/dreamgate/config.toml")
    } else {
        PathBuf::from("dreamgate.toml")
    }
}
