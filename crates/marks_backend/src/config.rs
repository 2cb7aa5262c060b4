//! Platform configuration.

use std::fmt;
use std::time::Duration;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key used to sign session tokens.
///
/// The key is zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Generates a random 32-byte key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = Vec::with_capacity(32);
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Returns the key bytes. Do not log the result.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: SigningKey,
    /// Session token lifetime.
    pub token_expiry: Duration,
    /// How long an authorization code stays exchangeable.
    pub code_ttl: Duration,
}

impl AuthConfig {
    /// Creates an auth configuration with the given secret.
    pub fn new(secret: SigningKey) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(60 * 60), // 1 hour
            code_ttl: Duration::from_secs(5 * 60),
        }
    }

    /// Sets the session token lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the authorization code lifetime.
    pub fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(SigningKey::generate())
    }
}

/// Configuration for the reference platform.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Public URL of the site, used to build redirects.
    pub site_url: String,
    /// Path of the OAuth callback route.
    pub callback_path: String,
    /// Path prefix of the REST endpoint.
    pub rest_path: String,
    /// Maximum rows returned by one query.
    pub max_rows: u32,
    /// Change events retained for subscription backfill.
    pub feed_history: usize,
    /// Authentication settings.
    pub auth: AuthConfig,
}

impl PlatformConfig {
    /// Creates a configuration for a site.
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            callback_path: "/auth/callback".into(),
            rest_path: "/rest/v1".into(),
            max_rows: 1000,
            feed_history: 10_000,
            auth: AuthConfig::default(),
        }
    }

    /// Sets the callback route path.
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    /// Sets the REST path prefix.
    pub fn with_rest_path(mut self, path: impl Into<String>) -> Self {
        self.rest_path = path.into();
        self
    }

    /// Sets the per-query row cap.
    pub fn with_max_rows(mut self, max: u32) -> Self {
        self.max_rows = max;
        self
    }

    /// Sets the change feed history size.
    pub fn with_feed_history(mut self, events: usize) -> Self {
        self.feed_history = events;
        self
    }

    /// Sets the authentication settings.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Returns the absolute callback URL.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.site_url, self.callback_path)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlatformConfig::default();
        assert_eq!(config.callback_url(), "http://localhost:3000/auth/callback");
        assert_eq!(config.rest_path, "/rest/v1");
        assert_eq!(config.auth.secret.as_bytes().len(), 32);
    }

    #[test]
    fn config_builder() {
        let config = PlatformConfig::new("https://marks.example.com/")
            .with_max_rows(50)
            .with_feed_history(10)
            .with_auth(
                AuthConfig::new(SigningKey::from_bytes(b"test-secret-key-32-bytes-long!!"))
                    .with_expiry(Duration::from_secs(60)),
            );

        assert_eq!(config.site_url, "https://marks.example.com");
        assert_eq!(config.max_rows, 50);
        assert_eq!(config.feed_history, 10);
        assert_eq!(config.auth.token_expiry, Duration::from_secs(60));
    }

    #[test]
    fn signing_key_debug_is_redacted() {
        let key = SigningKey::from_bytes(b"super-secret");
        assert_eq!(format!("{key:?}"), "SigningKey(..)");
    }
}
