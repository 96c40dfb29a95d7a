//! Resource owners and their consents.
//!
//! Stored as a field record under `user:<username>`. The password is
//! encrypted with the username as password. Each consent is a field named
//! `consent:<client_id>` holding the granted scope.

use std::sync::Arc;

use super::storage::OAuth2Storage;
use super::{constant_time_eq, keys};
use crate::{AuthError, AuthResult};

const FIELD_USERNAME: &str = "username";
const FIELD_PASSWORD: &str = "password";

/// Resource owner backed by a cache record.
#[derive(Clone)]
pub struct User {
    storage: Arc<dyn OAuth2Storage>,
    username: String,
    password: String,
    loaded: bool,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl User {
    /// Creates an unloaded user with no username.
    #[must_use]
    pub fn new(storage: Arc<dyn OAuth2Storage>) -> Self {
        Self {
            storage,
            username: String::new(),
            password: String::new(),
            loaded: false,
        }
    }

    /// Creates a user for `username` and loads it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `username` is not a valid identifier or the record
    /// cannot be read.
    pub async fn with_username(storage: Arc<dyn OAuth2Storage>, username: &str) -> AuthResult<Self> {
        let mut user = Self::new(storage);
        user.username = username.to_string();
        user.load().await?;
        Ok(user)
    }

    /// Creates and saves a new user.
    ///
    /// The password field is claimed with a single conditional write, so
    /// when several callers create the same username only the first wins and
    /// its password is kept.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the user already exists.
    pub async fn create(
        storage: Arc<dyn OAuth2Storage>,
        username: &str,
        password: &str,
    ) -> AuthResult<Self> {
        let key = keys::user(username)?;
        let sealed = storage.cryptograph().encrypt(password, username)?;

        let cache = storage.cache();
        if !cache
            .write_field_if_absent(&key, FIELD_PASSWORD, &sealed)
            .await?
        {
            return Err(AuthError::invalid_request(format!(
                "user '{username}' already exists"
            )));
        }
        cache.write_field(&key, FIELD_USERNAME, username).await?;

        let mut user = Self::new(storage);
        user.username = username.to_string();
        user.password = password.to_string();
        user.loaded = true;

        tracing::info!(username = %username, "User created");
        Ok(user)
    }

    /// Reads the record into this user. A missing record leaves the user
    /// unloaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decrypted.
    pub async fn load(&mut self) -> AuthResult<()> {
        if self.username.is_empty() {
            return Ok(());
        }
        let key = keys::user(&self.username)?;
        let cache = self.storage.cache();

        if !cache.exists(&key).await? {
            self.password.clear();
            self.loaded = false;
            return Ok(());
        }

        let sealed = cache.read_field(&key, FIELD_PASSWORD).await?;
        self.password = if sealed.is_empty() {
            String::new()
        } else {
            self.storage
                .cryptograph()
                .decrypt(&sealed, &self.username)?
        };
        self.loaded = true;
        Ok(())
    }

    /// Writes the username and encrypted password. Consents are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the user has no username, the password is too long
    /// to encrypt, or the write fails.
    pub async fn save(&self) -> AuthResult<()> {
        let key = keys::user(&self.username)?;
        let sealed = self
            .storage
            .cryptograph()
            .encrypt(&self.password, &self.username)?;

        let cache = self.storage.cache();
        cache.write_field(&key, FIELD_USERNAME, &self.username).await?;
        cache.write_field(&key, FIELD_PASSWORD, &sealed).await?;
        Ok(())
    }

    /// Deletes the user together with every consent.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn destroy(&mut self) -> AuthResult<()> {
        let key = keys::user(&self.username)?;
        self.storage.cache().destroy(&key).await?;
        tracing::info!(username = %self.username, "User deleted");
        self.password.clear();
        self.loaded = false;
        Ok(())
    }

    /// Returns `true` if a record exists for this username.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn exists(&self) -> AuthResult<bool> {
        if self.username.is_empty() {
            return Ok(false);
        }
        Ok(self
            .storage
            .cache()
            .exists(&keys::user(&self.username)?)
            .await?)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Compares `candidate` with the stored password in constant time.
    #[must_use]
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.loaded && constant_time_eq(self.password.as_bytes(), candidate.as_bytes())
    }

    /// Records that this user authorized `client_id` for `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn add_consent(&self, client_id: &str, scope: &str) -> AuthResult<()> {
        let key = keys::user(&self.username)?;
        self.storage
            .cache()
            .write_field(&key, &keys::consent_field(client_id), scope)
            .await?;
        Ok(())
    }

    /// Withdraws the consent given to `client_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn revoke_consent(&self, client_id: &str) -> AuthResult<()> {
        let key = keys::user(&self.username)?;
        self.storage
            .cache()
            .destroy_field(&key, &keys::consent_field(client_id))
            .await?;
        Ok(())
    }

    /// Scope granted to `client_id`, or `None` without consent.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn consent_scope(&self, client_id: &str) -> AuthResult<Option<String>> {
        let key = keys::user(&self.username)?;
        let field = keys::consent_field(client_id);
        let cache = self.storage.cache();
        if !cache.field_exists(&key, &field).await? {
            return Ok(None);
        }
        Ok(Some(cache.read_field(&key, &field).await?))
    }

    /// Client ids this user has authorized, sorted.
    ///
    /// Consents given to clients that have since been deleted are dropped
    /// from the record and not reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn consented_clients(&self) -> AuthResult<Vec<String>> {
        let key = keys::user(&self.username)?;
        let cache = self.storage.cache();
        let consented: Vec<String> = cache
            .fields(&key)
            .await?
            .filter_map(|field| {
                field
                    .strip_prefix(keys::CONSENT_FIELD_PREFIX)
                    .map(str::to_string)
            })
            .collect();

        let mut clients = Vec::with_capacity(consented.len());
        for client_id in consented {
            if cache.exists(&keys::client(&client_id)?).await? {
                clients.push(client_id);
            } else {
                tracing::debug!(client_id = %client_id, "Dropping consent for deleted client");
                cache
                    .destroy_field(&key, &keys::consent_field(&client_id))
                    .await?;
            }
        }
        clients.sort_unstable();
        Ok(clients)
    }
}
