//! # Client Configuration
//!
//! Connection settings for a Wallabag instance, loadable from a TOML file and
//! overridable through `WALLABAG_*` environment variables.
//!
//! ```rust,no_run
//! use wallabag_core::{ClientConfig, Wallabag};
//!
//! let config = ClientConfig::load(Some("wallabag.toml".as_ref()))?;
//! let wallabag = Wallabag::from_config(&config)?;
//! # Ok::<(), wallabag_core::ApiError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::DEFAULT_USER_AGENT;
use crate::error::{ApiError, ApiResult};

/// Settings needed to talk to one Wallabag instance.
///
/// `format` is kept as text here and only validated when a client is built
/// from the configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the instance, e.g. `https://app.wallabag.it`.
    pub host: String,
    pub token: String,
    pub client_id: String,
    pub client_secret: String,
    /// Response format extension: xml, json, txt, csv, pdf, epub, mobi or html.
    pub format: String,
    pub user_agent: String,
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8080".to_string(),
            token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            format: "json".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("format", &self.format)
            .field("user_agent", &self.user_agent)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Load configuration with precedence (highest first):
    /// 1. `WALLABAG_*` environment variables
    /// 2. the TOML file at `path`, when given
    /// 3. defaults
    pub fn load(path: Option<&Path>) -> ApiResult<Self> {
        let mut config = match path {
            Some(path) => {
                debug!("Loading config from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        debug!("Loaded client configuration: {:?}", config);
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> ApiResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::config(format!("Failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| ApiError::config(format!("Failed to parse config file: {e}")))
    }

    pub fn save_to_file(&self, path: &Path) -> ApiResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::config(format!("Failed to create config directory: {e}"))
            })?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ApiError::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| ApiError::config(format!("Failed to write config file: {e}")))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 6] = [
            ("WALLABAG_HOST", &mut self.host),
            ("WALLABAG_TOKEN", &mut self.token),
            ("WALLABAG_CLIENT_ID", &mut self.client_id),
            ("WALLABAG_CLIENT_SECRET", &mut self.client_secret),
            ("WALLABAG_FORMAT", &mut self.format),
            ("WALLABAG_USER_AGENT", &mut self.user_agent),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
        if let Some(timeout) = lookup("WALLABAG_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(timeout_ms) => self.timeout_ms = timeout_ms,
                Err(_) => debug!(value = %timeout, "ignoring unparseable WALLABAG_TIMEOUT_MS"),
            }
        }
    }
}
