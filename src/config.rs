//! Cloud account configuration
//!
//! Raw credential inputs for the signing engine and URL builders. The
//! secret is held in a [`SecretString`] so it never shows up in debug
//! output or logs. Missing credentials fail fast here, before any
//! request is built.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{MediaError, Result};

/// Default API endpoint for uploads and admin calls
pub const DEFAULT_UPLOAD_BASE: &str = "https://api.mediaflow.io";
/// Default CDN endpoint for delivery URLs
pub const DEFAULT_DELIVERY_BASE: &str = "https://res.mediaflow.io";

/// Account credentials and endpoints
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Cloud (account) name, part of every URL
    pub cloud_name: String,
    /// Public API key, sent with every signed request
    pub api_key: String,
    api_secret: SecretString,
    /// Base address for API calls
    pub upload_base: String,
    /// Base address for delivery URLs
    pub delivery_base: String,
}

impl CloudConfig {
    /// Build a configuration from explicit credentials
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self> {
        let cloud_name = cloud_name.into();
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if cloud_name.is_empty() {
            return Err(MediaError::ConfigurationError("cloud_name is required".into()));
        }
        if api_key.is_empty() {
            return Err(MediaError::ConfigurationError("api_key is required".into()));
        }
        if api_secret.is_empty() {
            return Err(MediaError::ConfigurationError("api_secret is required".into()));
        }
        Ok(Self {
            cloud_name,
            api_key,
            api_secret: SecretString::from(api_secret),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            delivery_base: DEFAULT_DELIVERY_BASE.to_string(),
        })
    }

    /// Read `MEDIAFLOW_CLOUD_NAME`, `MEDIAFLOW_API_KEY` and
    /// `MEDIAFLOW_API_SECRET` from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_env_lookup(|name| std::env::var(name).ok())
    }

    fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name).ok_or_else(|| {
                MediaError::ConfigurationError(format!("environment variable {name} is not set"))
            })
        };
        Self::new(
            var("MEDIAFLOW_CLOUD_NAME")?,
            var("MEDIAFLOW_API_KEY")?,
            var("MEDIAFLOW_API_SECRET")?,
        )
    }

    /// Override the API base address
    pub fn with_upload_base(mut self, base: impl Into<String>) -> Self {
        self.upload_base = base.into();
        self
    }

    /// Override the delivery base address
    pub fn with_delivery_base(mut self, base: impl Into<String>) -> Self {
        self.delivery_base = base.into();
        self
    }

    /// Expose the API secret for signing
    pub(crate) fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(CloudConfig::new("", "key", "secret").is_err());
        assert!(CloudConfig::new("demo", "", "secret").is_err());
        assert!(CloudConfig::new("demo", "key", "").is_err());
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let config = CloudConfig::new("demo", "key", "hunter2").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn env_loading_errors_name_the_missing_variable() {
        let err = CloudConfig::from_env_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("MEDIAFLOW_CLOUD_NAME"));

        let err = CloudConfig::from_env_lookup(|name| {
            (name != "MEDIAFLOW_API_SECRET").then(|| "x".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("MEDIAFLOW_API_SECRET"));
    }

    #[test]
    fn env_loading_builds_a_config_when_all_variables_are_set() {
        let config = CloudConfig::from_env_lookup(|name| Some(name.to_lowercase())).unwrap();
        assert_eq!(config.cloud_name, "mediaflow_cloud_name");
        assert_eq!(config.api_key, "mediaflow_api_key");
    }

    #[test]
    fn base_addresses_default_and_override() {
        let config = CloudConfig::new("demo", "key", "secret").unwrap();
        assert_eq!(config.upload_base, DEFAULT_UPLOAD_BASE);
        let config = config.with_upload_base("http://localhost:9999");
        assert_eq!(config.upload_base, "http://localhost:9999");
    }
}
