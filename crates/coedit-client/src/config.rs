//! Client configuration, loaded from a RON file.
//!
//! ```ron
//! (
//!     server_url: "https://pages.example.com",
//!     debounce_ms: 3000,
//!     live_updates: true,
//! )
//! ```
//!
//! Every field is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_DEBOUNCE, DEFAULT_PATH_PREFIX, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVER_URL,
    MAX_DEBOUNCE, MAX_REQUEST_TIMEOUT,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the page server (`http` or `https`).
    pub server_url: Url,
    /// Navigation prefix stripped to derive the document reference.
    pub path_prefix: String,
    /// Autosave quiet period in milliseconds.
    pub debounce_ms: u64,
    /// Open the push channel for live updates.
    pub live_updates: bool,
    /// Timeout for each save/fetch request, in seconds.
    pub request_timeout_secs: u64,
    /// Where the actor token is persisted. `None` uses the platform data dir.
    pub identity_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server url is valid"),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            live_updates: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            identity_file: None,
        }
    }
}

impl ClientConfig {
    /// Default config file location: `$XDG_CONFIG_HOME/coedit/client.ron`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("coedit").join("client.ron"))
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_ron(&text)
    }

    /// Load from the default location, or defaults when there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate a RON document.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.server_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "server_url must be http or https, got {other}"
                )));
            }
        }
        if !self.path_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "path_prefix must start with '/', got {:?}",
                self.path_prefix
            )));
        }
        if self.debounce_ms == 0 || self.debounce_ms > MAX_DEBOUNCE.as_millis() as u64 {
            return Err(ConfigError::Invalid(format!(
                "debounce_ms must be between 1 and {}, got {}",
                MAX_DEBOUNCE.as_millis(),
                self.debounce_ms
            )));
        }
        if self.request_timeout_secs == 0
            || self.request_timeout_secs > MAX_REQUEST_TIMEOUT.as_secs()
        {
            return Err(ConfigError::Invalid(format!(
                "request_timeout_secs must be between 1 and {}, got {}",
                MAX_REQUEST_TIMEOUT.as_secs(),
                self.request_timeout_secs
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolved identity file: explicit setting, else
    /// `$XDG_DATA_HOME/coedit/identity.ron`.
    pub fn identity_path(&self) -> Option<PathBuf> {
        self.identity_file
            .clone()
            .or_else(|| dirs::data_local_dir().map(|p| p.join("coedit").join("identity.ron")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = ClientConfig::from_ron("()").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(5000));
        assert_eq!(config.path_prefix, "/editor/");
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig::from_ron(
            r#"(server_url: "https://pages.example.com/", debounce_ms: 1500, live_updates: false)"#,
        )
        .unwrap();
        assert_eq!(config.server_url.as_str(), "https://pages.example.com/");
        assert_eq!(config.debounce(), Duration::from_millis(1500));
        assert!(!config.live_updates);
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = ClientConfig::from_ron(r#"(server_url: "ftp://example.com")"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_debounce() {
        let err = ClientConfig::from_ron("(debounce_ms: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let err = ClientConfig::from_ron("(debounce_ms: 18446744073709551615)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ClientConfig::from_ron("(request_timeout_secs: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ClientConfig::from_ron("(request_timeout_secs: 18446744073709551615)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = ClientConfig::from_ron("(debounce_ms: 3600000)").unwrap();
        assert_eq!(config.debounce(), MAX_DEBOUNCE);
    }

    #[test]
    fn test_malformed_is_parse_error() {
        let err = ClientConfig::from_ron("(debounce_ms: \"soon\")").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("nope.ron")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.ron");
        std::fs::write(&path, r#"(identity_file: Some("/tmp/coedit-id.ron"))"#).unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.identity_path(), Some(PathBuf::from("/tmp/coedit-id.ron")));
    }
}
