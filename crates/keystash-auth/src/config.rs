//! Authorization configuration.
//!
//! Loaded once at process start and shared read-only (through `Arc`) by every
//! entity the factory creates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::nonce::DEFAULT_NONCE_LENGTH;

/// Minimum accepted length of the application secret, in bytes.
pub const MIN_SECRET_KEY_LEN: usize = 16;

/// Minimum accepted nonce length.
pub const MIN_NONCE_LENGTH: usize = 8;

/// Top-level authorization configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Application secret mixed into every credential encryption key.
    ///
    /// Must be supplied externally (config file or `KEYSTASH__AUTH__SECRET_KEY`).
    pub secret_key: String,

    /// Length of generated identifiers, codes and tokens.
    pub nonce_length: usize,

    /// OAuth 2.0 grant settings.
    pub oauth: OAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            nonce_length: DEFAULT_NONCE_LENGTH,
            oauth: OAuthConfig::default(),
        }
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("nonce_length", &self.nonce_length)
            .field("oauth", &self.oauth)
            .finish()
    }
}

/// OAuth 2.0 authorization server configuration.
///
/// Controls token lifetimes and refresh token behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    /// Codes should be short-lived for security.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Issue a refresh token alongside each access token.
    pub refresh_tokens_enabled: bool,

    /// Rotate refresh tokens on use.
    /// When enabled, a new refresh token is issued with each refresh and the
    /// old one stops working.
    pub refresh_token_rotation: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 1 hour
            refresh_token_lifetime: Duration::from_secs(90 * 24 * 3600), // 90 days
            refresh_tokens_enabled: true,
            refresh_token_rotation: true,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Builds a configuration with the given secret and default settings.
    #[must_use]
    pub fn with_secret(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no secret key is set, and
    /// `ConfigError::InvalidValue` if:
    /// - The secret key is shorter than [`MIN_SECRET_KEY_LEN`] bytes
    /// - The nonce length is below [`MIN_NONCE_LENGTH`]
    /// - Any lifetime is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Missing("auth.secret_key".to_string()));
        }
        if self.secret_key.len() < MIN_SECRET_KEY_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "auth.secret_key must be at least {MIN_SECRET_KEY_LEN} bytes"
            )));
        }
        if self.nonce_length < MIN_NONCE_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.nonce_length must be at least {MIN_NONCE_LENGTH}"
            )));
        }

        let lifetimes = [
            (
                "authorization_code_lifetime",
                self.oauth.authorization_code_lifetime,
            ),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth.refresh_token_lifetime),
        ];
        for (name, lifetime) in lifetimes {
            if lifetime.is_zero() {
                return Err(ConfigError::InvalidValue(format!(
                    "auth.oauth.{name} must be > 0"
                )));
            }
        }

        Ok(())
    }
}
