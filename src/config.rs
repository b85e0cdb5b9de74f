//! Process configuration: credentials, service endpoints, timeouts.
//!
//! Built once at startup and passed by reference into the gateway and
//! terminology clients. The core never reads ambient global state.

use std::path::Path;

use serde::Deserialize;

/// Application-level constants
pub const APP_NAME: &str = "Exeat";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Placeholder token the synthesizer instructs the model to write in place
/// of the patient's name. The rehydrator replaces it case-insensitively.
pub const PLACEHOLDER_TOKEN: &str = "YYYYY";

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("{}=info,audit=info", env!("CARGO_PKG_NAME"))
}

/// Errors while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read credentials file {path}: {source}")]
    CredentialsRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Credentials file {path} is not valid JSON: {source}")]
    CredentialsParse {
        path: String,
        source: serde_json::Error,
    },
}

/// API credentials loaded from a local JSON file.
///
/// Expected shape: `{"openai_api_key": "...", "umls_api_key": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub openai_api_key: String,
    pub umls_api_key: String,
}

impl Credentials {
    /// Load credentials from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::CredentialsRead {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::CredentialsParse {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Full runtime configuration for one process.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub gateway_base_url: String,
    /// Model name sent with every completion request.
    pub gateway_model: String,
    /// Base URL of the UMLS-style terminology REST service.
    pub terminology_base_url: String,
    /// Per-request timeout for gateway calls.
    pub gateway_timeout_secs: u64,
    /// Per-request timeout for terminology calls.
    pub terminology_timeout_secs: u64,
}

impl Config {
    /// Build a config with default endpoints around loaded credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            gateway_base_url: "https://api.openai.com".to_string(),
            gateway_model: "gpt-3.5-turbo".to_string(),
            terminology_base_url: "https://uts-ws.nlm.nih.gov/rest".to_string(),
            gateway_timeout_secs: 120,
            terminology_timeout_secs: 30,
        }
    }

    /// Load credentials from `path` and apply default endpoints.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(Credentials::load(path)?))
    }
}
