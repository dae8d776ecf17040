//! Gateway configuration as stored in the `gateways:` section of `helcim.yaml`.
//!
//! ```yaml
//! gateways:
//!   helcim:
//!     mode: test
//!     hosted_page_url: https://secure.myhelcim.com/pay/example
//! ```
//!
//! Credentials may be left out of the file and supplied through the
//! environment instead; an empty token fails [`GatewayConfig::validate`].

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Shortest api token accepted by [`GatewayConfig::validate`]
pub const MIN_API_TOKEN_LEN: usize = 10;

/// Shortest secret key accepted by [`GatewayConfig::validate`]
pub const MIN_SECRET_KEY_LEN: usize = 20;

pub const DEFAULT_DISPLAY_LABEL: &str = "Credit Card";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    #[default]
    Test,
    Live,
}

impl GatewayMode {
    pub fn is_test(&self) -> bool {
        matches!(self, GatewayMode::Test)
    }
}

impl fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayMode::Test => write!(f, "test"),
            GatewayMode::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API Token is required.")]
    MissingApiToken,
    #[error("Secret Key is required.")]
    MissingSecretKey,
    #[error("API Token appears to be invalid. Please check your Helcim account settings.")]
    InvalidApiToken,
    #[error("Secret Key appears to be invalid. Please check your Helcim account settings.")]
    InvalidSecretKey,
    #[error("URL of Hosted Page is required for the hosted page flow.")]
    MissingHostedPageUrl,
}

/// Helcim gateway settings, immutable for the duration of a request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: GatewayMode,

    #[serde(default)]
    pub api_token: String,

    /// Secret key handed to the card tokenizer and used for amount hashes
    #[serde(default)]
    pub secret_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,

    #[serde(default = "default_display_label")]
    pub display_label: String,

    /// Hosted payment page the redirect form posts to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_page_url: Option<Url>,

    /// Hash key shown in the hosted page settings; `secret_key` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_hash_key: Option<String>,
}

fn default_display_label() -> String {
    DEFAULT_DISPLAY_LABEL.to_string()
}

impl GatewayConfig {
    pub fn new(
        mode: GatewayMode,
        api_token: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            api_token: api_token.into(),
            secret_key: secret_key.into(),
            terminal_id: None,
            display_label: default_display_label(),
            hosted_page_url: None,
            secret_hash_key: None,
        }
    }

    pub fn with_terminal_id(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    pub fn with_hosted_page(mut self, url: Url, secret_hash_key: Option<String>) -> Self {
        self.hosted_page_url = Some(url);
        self.secret_hash_key = secret_hash_key;
        self
    }

    /// Key used to compute amount hashes for the hosted page
    pub fn hash_key(&self) -> &str {
        self.secret_hash_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .unwrap_or(&self.secret_key)
    }

    /// Check credentials have a plausible shape
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_token.is_empty() {
            return Err(ConfigError::MissingApiToken);
        }
        if self.api_token.len() < MIN_API_TOKEN_LEN {
            return Err(ConfigError::InvalidApiToken);
        }
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }
        if self.secret_key.len() < MIN_SECRET_KEY_LEN {
            return Err(ConfigError::InvalidSecretKey);
        }
        Ok(())
    }

    pub fn hosted_page_url(&self) -> Result<&Url, ConfigError> {
        self.hosted_page_url
            .as_ref()
            .ok_or(ConfigError::MissingHostedPageUrl)
    }
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}…", visible)
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("mode", &self.mode)
            .field("api_token", &redact(&self.api_token))
            .field("secret_key", &redact(&self.secret_key))
            .field("terminal_id", &self.terminal_id)
            .field("display_label", &self.display_label)
            .field("hosted_page_url", &self.hosted_page_url)
            .field(
                "secret_hash_key",
                &self.secret_hash_key.as_deref().map(redact),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig::new(
            GatewayMode::Test,
            "aB3dE5gH7jK9",
            "s3cr3t-key-with-twenty-chars",
        )
    }

    #[test]
    fn test_validate_accepts_plausible_credentials() {
        assert_eq!(config().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_short_credentials() {
        let mut short_token = config();
        short_token.api_token = "short".into();
        assert_eq!(short_token.validate(), Err(ConfigError::InvalidApiToken));

        let mut short_secret = config();
        short_secret.secret_key = "tiny".into();
        assert_eq!(short_secret.validate(), Err(ConfigError::InvalidSecretKey));

        let mut missing = config();
        missing.api_token.clear();
        assert_eq!(missing.validate(), Err(ConfigError::MissingApiToken));
    }

    #[test]
    fn test_hash_key_falls_back_to_secret_key() {
        let cfg = config();
        assert_eq!(cfg.hash_key(), "s3cr3t-key-with-twenty-chars");

        let url = Url::parse("https://secure.myhelcim.com/pay/example").unwrap();
        let cfg = config().with_hosted_page(url, Some("hosted-hash".into()));
        assert_eq!(cfg.hash_key(), "hosted-hash");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let cfg: GatewayConfig = serde_json::from_value(serde_json::json!({
            "api_token": "aB3dE5gH7jK9",
            "secret_key": "s3cr3t-key-with-twenty-chars",
        }))
        .unwrap();
        assert_eq!(cfg.mode, GatewayMode::Test);
        assert_eq!(cfg.display_label, DEFAULT_DISPLAY_LABEL);
        assert!(cfg.hosted_page_url().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("s3cr3t-key-with-twenty-chars"));
        assert!(rendered.contains("s3cr…"));
    }
}
