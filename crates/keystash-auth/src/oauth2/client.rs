//! Registered OAuth 2.0 clients.
//!
//! Stored as a field record under `client:<id>`:
//!
//! | Field | Value |
//! |-------|-------|
//! | `name` | application name |
//! | `secret` | client secret, encrypted with the client id as password |
//! | `redirect_uris` | JSON array of registered redirect URIs |
//! | `grant_types` | space separated grant type names |

use std::sync::Arc;

use super::grant::GrantType;
use super::storage::OAuth2Storage;
use super::{constant_time_eq, keys};
use crate::{AuthError, AuthResult};

const FIELD_NAME: &str = "name";
const FIELD_SECRET: &str = "secret";
const FIELD_REDIRECT_URIS: &str = "redirect_uris";
const FIELD_GRANT_TYPES: &str = "grant_types";

// Attempts at finding an unused generated client id.
const MAX_ID_ATTEMPTS: usize = 4;

/// OAuth 2.0 client backed by a cache record.
#[derive(Clone)]
pub struct Client {
    storage: Arc<dyn OAuth2Storage>,
    id: String,
    secret: String,
    name: String,
    redirect_uris: Vec<String>,
    grant_types: Vec<GrantType>,
    loaded: bool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("redirect_uris", &self.redirect_uris)
            .field("grant_types", &self.grant_types)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates an unloaded client with no identifier.
    #[must_use]
    pub fn new(storage: Arc<dyn OAuth2Storage>) -> Self {
        Self {
            storage,
            id: String::new(),
            secret: String::new(),
            name: String::new(),
            redirect_uris: Vec::new(),
            grant_types: Vec::new(),
            loaded: false,
        }
    }

    /// Creates a client for `id` and loads it if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier or the record cannot
    /// be read.
    pub async fn with_id(storage: Arc<dyn OAuth2Storage>, id: &str) -> AuthResult<Self> {
        let mut client = Self::new(storage);
        client.id = id.to_string();
        client.load().await?;
        Ok(client)
    }

    /// Registers a new client with a generated id and secret.
    ///
    /// The returned client carries the plaintext secret; this is the only
    /// time it is handed out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if no redirect URI is given or one
    /// of them is not an absolute URL.
    pub async fn register(
        storage: Arc<dyn OAuth2Storage>,
        name: &str,
        redirect_uris: Vec<String>,
        grant_types: Vec<GrantType>,
    ) -> AuthResult<Self> {
        if redirect_uris.is_empty() {
            return Err(AuthError::invalid_request(
                "at least one redirect_uri is required",
            ));
        }
        for uri in &redirect_uris {
            url::Url::parse(uri).map_err(|e| {
                AuthError::invalid_request(format!("invalid redirect_uri '{uri}': {e}"))
            })?;
        }

        let id = generate_unused_id(storage.as_ref()).await?;
        let secret = storage.nonce_generator().generate();

        let mut client = Self::new(storage);
        client.id = id;
        client.secret = secret;
        client.name = name.to_string();
        client.redirect_uris = redirect_uris;
        client.grant_types = if grant_types.is_empty() {
            GrantType::defaults()
        } else {
            grant_types
        };
        client.save().await?;
        client.loaded = true;

        tracing::info!(client_id = %client.id, name = %client.name, "Client registered");
        Ok(client)
    }

    /// Reads the record into this client.
    ///
    /// A missing record leaves every field empty and `is_loaded()` false.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or the stored secret
    /// cannot be decrypted.
    pub async fn load(&mut self) -> AuthResult<()> {
        if self.id.is_empty() {
            return Ok(());
        }
        let key = keys::client(&self.id)?;
        let cache = self.storage.cache();

        if !cache.exists(&key).await? {
            self.clear();
            return Ok(());
        }

        self.name = cache.read_field(&key, FIELD_NAME).await?;

        let sealed = cache.read_field(&key, FIELD_SECRET).await?;
        self.secret = if sealed.is_empty() {
            String::new()
        } else {
            self.storage.cryptograph().decrypt(&sealed, &self.id)?
        };

        let uris = cache.read_field(&key, FIELD_REDIRECT_URIS).await?;
        self.redirect_uris = if uris.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&uris).map_err(|e| {
                AuthError::storage_unavailable(format!("corrupt redirect_uris for client: {e}"))
            })?
        };

        self.grant_types = cache
            .read_field(&key, FIELD_GRANT_TYPES)
            .await?
            .split_whitespace()
            .map(str::parse::<GrantType>)
            .collect::<AuthResult<Vec<_>>>()?;

        self.loaded = true;
        Ok(())
    }

    /// Writes every field of this client to its record.
    ///
    /// # Errors
    ///
    /// Returns an error if the client has no id, the secret is too long to
    /// encrypt, or the write fails.
    pub async fn save(&self) -> AuthResult<()> {
        let key = keys::client(&self.id)?;
        let cache = self.storage.cache();

        let sealed = self.storage.cryptograph().encrypt(&self.secret, &self.id)?;
        let uris = serde_json::to_string(&self.redirect_uris)
            .map_err(|e| AuthError::invalid_request(format!("redirect_uris: {e}")))?;
        let grants = self
            .grant_types
            .iter()
            .map(GrantType::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        cache.write_field(&key, FIELD_NAME, &self.name).await?;
        cache.write_field(&key, FIELD_SECRET, &sealed).await?;
        cache.write_field(&key, FIELD_REDIRECT_URIS, &uris).await?;
        cache.write_field(&key, FIELD_GRANT_TYPES, &grants).await?;
        Ok(())
    }

    /// Deletes the record. Loading afterwards finds nothing.
    ///
    /// Consents and access tokens issued to the client are not swept here;
    /// they stop counting as soon as the record is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn destroy(&mut self) -> AuthResult<()> {
        let key = keys::client(&self.id)?;
        self.storage.cache().destroy(&key).await?;
        tracing::info!(client_id = %self.id, "Client deleted");
        self.clear();
        Ok(())
    }

    /// Returns `true` if a record exists for this client's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn exists(&self) -> AuthResult<bool> {
        if self.id.is_empty() {
            return Ok(false);
        }
        Ok(self.storage.cache().exists(&keys::client(&self.id)?).await?)
    }

    fn clear(&mut self) {
        self.secret.clear();
        self.name.clear();
        self.redirect_uris.clear();
        self.grant_types.clear();
        self.loaded = false;
    }

    /// Returns `true` if the last load found a record.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Plaintext client secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn set_secret(&mut self, secret: impl Into<String>) {
        self.secret = secret.into();
    }

    #[must_use]
    pub fn redirect_uris(&self) -> &[String] {
        &self.redirect_uris
    }

    pub fn set_redirect_uris(&mut self, uris: Vec<String>) {
        self.redirect_uris = uris;
    }

    #[must_use]
    pub fn grant_types(&self) -> &[GrantType] {
        &self.grant_types
    }

    pub fn set_grant_types(&mut self, grant_types: Vec<GrantType>) {
        self.grant_types = grant_types;
    }

    /// Compares `candidate` with the secret in constant time.
    #[must_use]
    pub fn verify_secret(&self, candidate: &str) -> bool {
        !self.secret.is_empty() && constant_time_eq(self.secret.as_bytes(), candidate.as_bytes())
    }

    /// Redirect URIs must match a registered URI exactly.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

async fn generate_unused_id(storage: &dyn OAuth2Storage) -> AuthResult<String> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = storage.nonce_generator().generate();
        if !storage.cache().exists(&keys::client(&id)?).await? {
            return Ok(id);
        }
    }
    Err(AuthError::configuration(
        "could not generate an unused client id; increase auth.nonce_length",
    ))
}
