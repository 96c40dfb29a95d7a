//! Authorization codes.
//!
//! A code lives under `code:<code>` until an exchange claims it by renaming
//! the record to `consumed_code:<code>`. The rename succeeds for exactly one
//! caller, which makes the code single-use even when several exchanges race.
//! Expiry is checked against `created_at`; the cache never expires records.

use std::sync::Arc;
use std::time::Duration;

use super::storage::OAuth2Storage;
use super::{keys, now_unix};
use crate::{AuthError, AuthResult};

const FIELD_CLIENT_ID: &str = "client_id";
const FIELD_USERNAME: &str = "username";
const FIELD_SCOPE: &str = "scope";
const FIELD_REDIRECT_URI: &str = "redirect_uri";
const FIELD_STATE: &str = "state";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_CONSUMED: &str = "consumed";

/// Authorization code backed by a cache record.
#[derive(Clone)]
pub struct Code {
    storage: Arc<dyn OAuth2Storage>,
    code: String,
    client_id: String,
    username: String,
    scope: String,
    redirect_uri: String,
    state: String,
    created_at: i64,
    consumed: bool,
    loaded: bool,
}

impl std::fmt::Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Code")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .field("created_at", &self.created_at)
            .field("consumed", &self.consumed)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl Code {
    /// Creates an unloaded code with no value.
    #[must_use]
    pub fn new(storage: Arc<dyn OAuth2Storage>) -> Self {
        Self {
            storage,
            code: String::new(),
            client_id: String::new(),
            username: String::new(),
            scope: String::new(),
            redirect_uri: String::new(),
            state: String::new(),
            created_at: 0,
            consumed: false,
            loaded: false,
        }
    }

    /// Creates a code for `code` and loads it if it exists and has not been
    /// claimed.
    ///
    /// # Errors
    ///
    /// Returns an error if `code` is not a valid identifier or the record
    /// cannot be read.
    pub async fn with_code(storage: Arc<dyn OAuth2Storage>, code: &str) -> AuthResult<Self> {
        let mut entity = Self::new(storage);
        entity.code = code.to_string();
        entity.load().await?;
        Ok(entity)
    }

    /// Generates and saves a fresh code bound to a client, user and redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn issue(
        storage: Arc<dyn OAuth2Storage>,
        client_id: &str,
        username: &str,
        scope: &str,
        redirect_uri: &str,
        state: &str,
    ) -> AuthResult<Self> {
        let mut entity = Self::new(storage);
        entity.code = entity.storage.nonce_generator().generate();
        entity.client_id = client_id.to_string();
        entity.username = username.to_string();
        entity.scope = scope.to_string();
        entity.redirect_uri = redirect_uri.to_string();
        entity.state = state.to_string();
        entity.created_at = now_unix();
        entity.save().await?;
        entity.loaded = true;
        Ok(entity)
    }

    /// Reads the unclaimed record into this code.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or is corrupt.
    pub async fn load(&mut self) -> AuthResult<()> {
        if self.code.is_empty() {
            return Ok(());
        }
        let key = keys::code(&self.code)?;
        let cache = self.storage.cache();

        // An empty created_at means the record was claimed after the
        // existence check.
        let created_at = cache.read_field(&key, FIELD_CREATED_AT).await?;
        if created_at.is_empty() {
            self.loaded = false;
            return Ok(());
        }
        self.created_at = created_at
            .parse()
            .map_err(|_| AuthError::storage_unavailable("corrupt created_at on code record"))?;

        self.client_id = cache.read_field(&key, FIELD_CLIENT_ID).await?;
        self.username = cache.read_field(&key, FIELD_USERNAME).await?;
        self.scope = cache.read_field(&key, FIELD_SCOPE).await?;
        self.redirect_uri = cache.read_field(&key, FIELD_REDIRECT_URI).await?;
        self.state = cache.read_field(&key, FIELD_STATE).await?;
        self.consumed = cache.read_field(&key, FIELD_CONSUMED).await? == "1";
        self.loaded = true;
        Ok(())
    }

    /// Writes every field of this code to `code:<code>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn save(&self) -> AuthResult<()> {
        let key = keys::code(&self.code)?;
        let cache = self.storage.cache();
        let created_at = self.created_at.to_string();
        let consumed = if self.consumed { "1" } else { "0" };

        for (field, value) in [
            (FIELD_CLIENT_ID, self.client_id.as_str()),
            (FIELD_USERNAME, self.username.as_str()),
            (FIELD_SCOPE, self.scope.as_str()),
            (FIELD_REDIRECT_URI, self.redirect_uri.as_str()),
            (FIELD_STATE, self.state.as_str()),
            (FIELD_CREATED_AT, created_at.as_str()),
            (FIELD_CONSUMED, consumed),
        ] {
            cache.write_field(&key, field, value).await?;
        }
        Ok(())
    }

    /// Deletes the code, whether claimed or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn destroy(&mut self) -> AuthResult<()> {
        let cache = self.storage.cache();
        cache.destroy(&keys::code(&self.code)?).await?;
        cache.destroy(&keys::consumed_code(&self.code)?).await?;
        self.loaded = false;
        Ok(())
    }

    /// Returns `true` if the unclaimed record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn exists(&self) -> AuthResult<bool> {
        if self.code.is_empty() {
            return Ok(false);
        }
        Ok(self.storage.cache().exists(&keys::code(&self.code)?).await?)
    }

    /// Claims the code for the caller.
    ///
    /// Returns `false` if another caller claimed it first or it no longer
    /// exists. The claimed record stays under `consumed_code:<code>` until
    /// [`destroy`](Self::destroy).
    ///
    /// # Errors
    ///
    /// Returns an error if the cache fails.
    pub async fn consume(&mut self) -> AuthResult<bool> {
        let from = keys::code(&self.code)?;
        let to = keys::consumed_code(&self.code)?;
        let cache = self.storage.cache();

        if !cache.rename(&from, &to).await? {
            return Ok(false);
        }
        cache.write_field(&to, FIELD_CONSUMED, "1").await?;
        self.consumed = true;
        Ok(true)
    }

    /// Returns `true` once `lifetime` has elapsed since the code was issued.
    #[must_use]
    pub fn is_expired(&self, lifetime: Duration) -> bool {
        self.is_expired_at(lifetime, now_unix())
    }

    pub(crate) fn is_expired_at(&self, lifetime: Duration, now: i64) -> bool {
        let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
        now >= self.created_at.saturating_add(lifetime)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// The code value handed to the client.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Issue time, in unix seconds.
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}
