//! Connection settings for the mail store's HTTP API.

use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Address the mail store listens on by default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP API configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL; endpoint paths are resolved against it.
    pub base_url: Url,
    /// Timeout for a whole request, including reading the body.
    pub request_timeout: Duration,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::builder(base_url).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(base_url: impl AsRef<str>) -> ConfigBuilder {
        ConfigBuilder::new(base_url)
    }

    /// URL of the message collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base URL.
    pub fn emails_url(&self) -> Result<Url> {
        Ok(self.base_url.join("emails")?)
    }

    /// URL of a single message.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the base URL.
    pub fn email_url(&self, id: impl std::fmt::Display) -> Result<Url> {
        Ok(self.base_url.join(&format!("emails/{id}"))?)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    base_url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder for the given base URL.
    #[must_use]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn build(self) -> Result<Config> {
        // A base without a trailing slash would lose its last path segment
        // when endpoint paths are joined onto it.
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Config {
            base_url: Url::parse(&raw)?,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new(DEFAULT_BASE_URL).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_timeouts() {
        let config = Config::builder("http://mail.local:9000")
            .request_timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_endpoint_urls_keep_base_path() {
        let config = Config::new("https://example.com/api").unwrap();
        assert_eq!(
            config.emails_url().unwrap().as_str(),
            "https://example.com/api/emails"
        );
        assert_eq!(
            config.email_url(42).unwrap().as_str(),
            "https://example.com/api/emails/42"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(Config::new("not a url").is_err());
    }
}
