//! Entity construction.

use std::sync::Arc;

use keystash_cache::{CacheConfig, CacheHandler, create_cache_handler};

use super::authorization::Authorization;
use super::client::Client;
use super::code::Code;
use super::grant::GrantType;
use super::keys;
use super::params::OAuth2Parameters;
use super::storage::{CacheStorage, OAuth2Storage};
use super::user::User;
use crate::AuthResult;
use crate::config::AuthConfig;

/// Builds OAuth 2.0 entities over one storage backend.
///
/// Cloning is cheap; every clone shares the same storage.
#[derive(Clone)]
pub struct OAuth2Factory {
    storage: Arc<dyn OAuth2Storage>,
}

impl std::fmt::Debug for OAuth2Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Factory")
            .field("backend", &self.storage.cache().backend_name())
            .finish()
    }
}

impl OAuth2Factory {
    #[must_use]
    pub fn new(storage: Arc<dyn OAuth2Storage>) -> Self {
        Self { storage }
    }

    /// Builds a factory over an existing cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn with_cache(cache: Arc<dyn CacheHandler>, config: Arc<AuthConfig>) -> AuthResult<Self> {
        Ok(Self::new(Arc::new(CacheStorage::new(cache, config)?)))
    }

    /// Builds a factory over the cache backend selected by `cache_config`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StorageUnavailable` if the backend cannot be
    /// reached and `AuthError::Configuration` if `config` is invalid.
    pub async fn from_config(cache_config: &CacheConfig, config: Arc<AuthConfig>) -> AuthResult<Self> {
        let cache = create_cache_handler(cache_config).await?;
        Self::with_cache(cache, config)
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn OAuth2Storage> {
        &self.storage
    }

    /// The underlying record store.
    #[must_use]
    pub fn cache(&self) -> &dyn CacheHandler {
        self.storage.cache()
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        self.storage.config()
    }

    /// An unloaded client.
    #[must_use]
    pub fn client(&self) -> Client {
        Client::new(Arc::clone(&self.storage))
    }

    /// The client registered as `id`; check `is_loaded()` for existence.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn load_client(&self, id: &str) -> AuthResult<Client> {
        Client::with_id(Arc::clone(&self.storage), id).await
    }

    /// Registers a new client. See [`Client::register`].
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is invalid or cannot be saved.
    pub async fn register_client(
        &self,
        name: &str,
        redirect_uris: Vec<String>,
        grant_types: Vec<GrantType>,
    ) -> AuthResult<Client> {
        Client::register(Arc::clone(&self.storage), name, redirect_uris, grant_types).await
    }

    /// Ids of every registered client, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be listed.
    pub async fn client_ids(&self) -> AuthResult<Vec<String>> {
        let pattern = format!("{}*", keys::CLIENT_PREFIX);
        Ok(self
            .cache()
            .keys(&pattern)
            .await?
            .filter_map(|key| key.strip_prefix(keys::CLIENT_PREFIX).map(str::to_string))
            .collect())
    }

    /// An unloaded user.
    #[must_use]
    pub fn user(&self) -> User {
        User::new(Arc::clone(&self.storage))
    }

    /// The user named `username`; check `is_loaded()` for existence.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn load_user(&self, username: &str) -> AuthResult<User> {
        User::with_username(Arc::clone(&self.storage), username).await
    }

    /// Creates a new user. See [`User::create`].
    ///
    /// # Errors
    ///
    /// Returns an error if the user exists or cannot be saved.
    pub async fn create_user(&self, username: &str, password: &str) -> AuthResult<User> {
        User::create(Arc::clone(&self.storage), username, password).await
    }

    /// An unloaded code.
    #[must_use]
    pub fn code(&self) -> Code {
        Code::new(Arc::clone(&self.storage))
    }

    /// The unclaimed code `code`; check `is_loaded()` for existence.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn load_code(&self, code: &str) -> AuthResult<Code> {
        Code::with_code(Arc::clone(&self.storage), code).await
    }

    /// Starts an authorization driven by `params`.
    #[must_use]
    pub fn authorization(&self, params: OAuth2Parameters) -> Authorization<'_> {
        Authorization::new(self, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::test_support::factory;

    #[tokio::test]
    async fn test_client_ids() {
        let factory = factory();
        let a = factory
            .register_client("A", vec!["https://a/cb".into()], vec![])
            .await
            .unwrap();
        let b = factory
            .register_client("B", vec!["https://b/cb".into()], vec![])
            .await
            .unwrap();

        let mut expected = vec![a.id().to_string(), b.id().to_string()];
        expected.sort();
        assert_eq!(factory.client_ids().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_unloaded_entities() {
        let factory = factory();
        assert!(!factory.client().is_loaded());
        assert!(!factory.user().is_loaded());
        assert!(!factory.code().is_loaded());
        assert!(!factory.load_user("ghost").await.unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_from_config_uses_memory_by_default() {
        let config = Arc::new(AuthConfig::with_secret("0123456789abcdef"));
        let factory = OAuth2Factory::from_config(&CacheConfig::default(), config)
            .await
            .unwrap();
        assert_eq!(factory.cache().backend_name(), "memory");
    }
}
