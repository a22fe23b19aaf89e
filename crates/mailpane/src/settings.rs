//! Persistent application settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use mailpane_api::{Config, DEFAULT_BASE_URL};
use mailpane_core::Identity;

/// Environment variable that overrides the configured server URL.
pub const SERVER_URL_ENV: &str = "MAILPANE_SERVER_URL";

const APP_DIR: &str = "mailpane";
const SETTINGS_FILE: &str = "settings.json";

/// Application settings, stored as JSON in the user's config directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Base URL of the mail store.
    pub server_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Name and address used as the sender of outgoing mail.
    pub identity: Identity,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            identity: Identity::new("Richard Brown", "richard.brown@business.com"),
            log_filter: None,
        }
    }
}

impl AppSettings {
    /// Applies the `MAILPANE_SERVER_URL` override, if set and non-empty.
    #[must_use]
    pub fn with_env_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.filter(|url| !url.trim().is_empty()) {
            self.server_url = url;
        }
        self
    }

    /// Builds the HTTP client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid.
    pub fn api_config(&self) -> anyhow::Result<Config> {
        Config::builder(&self.server_url)
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .with_context(|| format!("invalid server URL {:?}", self.server_url))
    }
}

/// Returns the path of the settings file.
#[must_use]
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(SETTINGS_FILE)
}

/// Loads settings from `path`, falling back to defaults when the file is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub async fn load_settings(path: &Path) -> anyhow::Result<AppSettings> {
    if !settings_exist(path).await? {
        return Ok(AppSettings::default());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Returns whether a settings file exists at `path`.
///
/// # Errors
///
/// Returns an error if the existence of the file cannot be determined.
pub async fn settings_exist(path: &Path) -> anyhow::Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("failed to check {}", path.display()))
}

/// Saves settings to `path`, creating its directory if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub async fn save_settings(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("mailpane-test-{}-{name}", std::process::id()))
            .join(SETTINGS_FILE)
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"server_url": "http://mail.internal:9000"}"#).unwrap();
        assert_eq!(settings.server_url, "http://mail.internal:9000");
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.identity.email, "richard.brown@business.com");
    }

    #[test]
    fn test_env_override() {
        let settings = AppSettings::default().with_env_override(Some("http://other:1".into()));
        assert_eq!(settings.server_url, "http://other:1");

        let settings = AppSettings::default().with_env_override(Some("  ".into()));
        assert_eq!(settings.server_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_config() {
        let config = AppSettings::default().api_config().unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        let bad = AppSettings {
            server_url: "not a url".into(),
            ..AppSettings::default()
        };
        assert!(bad.api_config().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let path = temp_settings_path("missing");
        assert!(!settings_exist(&path).await.unwrap());
        assert_eq!(load_settings(&path).await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let path = temp_settings_path("saved");
        let settings = AppSettings {
            log_filter: Some("mailpane=debug".into()),
            ..AppSettings::default()
        };

        save_settings(&path, &settings).await.unwrap();
        assert!(settings_exist(&path).await.unwrap());
        assert_eq!(load_settings(&path).await.unwrap(), settings);

        tokio::fs::remove_dir_all(path.parent().unwrap()).await.ok();
    }
}
