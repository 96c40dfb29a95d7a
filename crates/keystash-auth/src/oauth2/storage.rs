//! Capability set shared by every OAuth 2.0 entity.

use std::sync::Arc;

use keystash_cache::CacheHandler;

use crate::config::AuthConfig;
use crate::crypto::{Cryptograph, NonceGenerator};
use crate::{AuthError, AuthResult};

// =============================================================================
// OAuth2 Storage Trait
// =============================================================================

/// What an entity needs to load and persist itself.
///
/// Entities hold an `Arc<dyn OAuth2Storage>`, so the concrete cache backend
/// is chosen once when the [`OAuth2Factory`](super::OAuth2Factory) is built.
pub trait OAuth2Storage: Send + Sync {
    /// Record store.
    fn cache(&self) -> &dyn CacheHandler;

    /// Encryption for secrets and passwords.
    fn cryptograph(&self) -> &Cryptograph;

    /// Source of ids, secrets, codes and tokens.
    fn nonce_generator(&self) -> &NonceGenerator;

    /// Shared configuration.
    fn config(&self) -> &AuthConfig;
}

/// [`OAuth2Storage`] over any [`CacheHandler`].
pub struct CacheStorage {
    cache: Arc<dyn CacheHandler>,
    cryptograph: Cryptograph,
    nonce_generator: NonceGenerator,
    config: Arc<AuthConfig>,
}

impl CacheStorage {
    /// Builds the capability set from a cache and a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration is invalid and
    /// `AuthError::CryptoFailure` if the secret key is unusable.
    pub fn new(cache: Arc<dyn CacheHandler>, config: Arc<AuthConfig>) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let cryptograph = Cryptograph::new(config.secret_key.as_bytes())?;
        let nonce_generator = NonceGenerator::new(config.nonce_length);

        Ok(Self {
            cache,
            cryptograph,
            nonce_generator,
            config,
        })
    }
}

impl std::fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage")
            .field("backend", &self.cache.backend_name())
            .field("nonce_generator", &self.nonce_generator)
            .finish_non_exhaustive()
    }
}

impl OAuth2Storage for CacheStorage {
    fn cache(&self) -> &dyn CacheHandler {
        self.cache.as_ref()
    }

    fn cryptograph(&self) -> &Cryptograph {
        &self.cryptograph
    }

    fn nonce_generator(&self) -> &NonceGenerator {
        &self.nonce_generator
    }

    fn config(&self) -> &AuthConfig {
        &self.config
    }
}
