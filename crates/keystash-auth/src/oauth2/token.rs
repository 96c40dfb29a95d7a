//! Issued tokens and the values exchanged with the transport layer.
//!
//! Access and refresh tokens are field records:
//!
//! | Key | Fields |
//! |-----|--------|
//! | `access_token:<t>` | `client_id`, `username`, `scope`, `expires_at`, `refresh_token` |
//! | `refresh_token:<r>` | `client_id`, `username`, `scope`, `expires_at`, `issued:<t>`... |
//!
//! An access token names the refresh token it was minted with. A refresh
//! token carries one `issued:<t>` field per access token minted from it, so
//! concurrent refreshes never overwrite each other's link and revoking the
//! refresh token reaches every one of them.

use keystash_cache::CacheHandler;
use serde::Serialize;

use crate::{AuthError, AuthResult};

const FIELD_CLIENT_ID: &str = "client_id";
const FIELD_USERNAME: &str = "username";
const FIELD_SCOPE: &str = "scope";
const FIELD_EXPIRES_AT: &str = "expires_at";
pub(crate) const FIELD_REFRESH_TOKEN: &str = "refresh_token";

const ISSUED_FIELD_PREFIX: &str = "issued:";

/// Successful token response.
///
/// # Example
///
/// ```json
/// {
///   "access_token": "8xLOxBtZp8",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "refresh_token": "tGzv3JOkF0",
///   "scope": "openid"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBundle {
    /// The access token.
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Refresh token, when refresh tokens are enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,
}

/// What an access or refresh token was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub client_id: String,
    pub username: String,
    pub scope: String,
    /// Expiry, in unix seconds.
    pub expires_at: i64,
}

impl TokenInfo {
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Seconds left before expiry, zero once expired.
    #[must_use]
    pub fn expires_in(&self, now: i64) -> u64 {
        u64::try_from(self.expires_at.saturating_sub(now)).unwrap_or(0)
    }
}

/// Client authentication presented with a token request.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Stored token record: what it grants and the token it is paired with.
#[derive(Debug, Clone)]
pub(crate) struct TokenRecord {
    pub info: TokenInfo,
    /// The paired token, empty if none.
    pub linked: String,
}

impl TokenRecord {
    /// Reads the record under `key`; `None` if it does not exist.
    ///
    /// `link_field` names the field holding the paired token. Refresh
    /// records pass `None` and list theirs with [`issued_access_tokens`].
    pub async fn read(
        cache: &dyn CacheHandler,
        key: &str,
        link_field: Option<&str>,
    ) -> AuthResult<Option<Self>> {
        // Missing, or removed by a concurrent refresh or revoke.
        let expires_at = cache.read_field(key, FIELD_EXPIRES_AT).await?;
        if expires_at.is_empty() {
            return Ok(None);
        }
        let expires_at = expires_at
            .parse()
            .map_err(|_| AuthError::storage_unavailable("corrupt expires_at on token record"))?;

        Ok(Some(Self {
            info: TokenInfo {
                client_id: cache.read_field(key, FIELD_CLIENT_ID).await?,
                username: cache.read_field(key, FIELD_USERNAME).await?,
                scope: cache.read_field(key, FIELD_SCOPE).await?,
                expires_at,
            },
            linked: match link_field {
                Some(field) => cache.read_field(key, field).await?,
                None => String::new(),
            },
        }))
    }

    pub async fn write(
        &self,
        cache: &dyn CacheHandler,
        key: &str,
        link_field: Option<&str>,
    ) -> AuthResult<()> {
        let expires_at = self.info.expires_at.to_string();
        for (field, value) in [
            (FIELD_CLIENT_ID, self.info.client_id.as_str()),
            (FIELD_USERNAME, self.info.username.as_str()),
            (FIELD_SCOPE, self.info.scope.as_str()),
            (FIELD_EXPIRES_AT, expires_at.as_str()),
        ] {
            cache.write_field(key, field, value).await?;
        }
        if let Some(field) = link_field {
            cache.write_field(key, field, &self.linked).await?;
        }
        Ok(())
    }

    /// Returns `true` while a complete record is stored under `key`.
    ///
    /// A stray link field written after the record was removed does not
    /// count.
    pub async fn is_present(cache: &dyn CacheHandler, key: &str) -> AuthResult<bool> {
        Ok(!cache.read_field(key, FIELD_EXPIRES_AT).await?.is_empty())
    }
}

/// Field on a refresh record naming one access token minted from it.
pub(crate) fn issued_field(access_token: &str) -> String {
    format!("{ISSUED_FIELD_PREFIX}{access_token}")
}

/// Access tokens minted from the refresh record under `key`.
pub(crate) async fn issued_access_tokens(
    cache: &dyn CacheHandler,
    key: &str,
) -> AuthResult<Vec<String>> {
    Ok(cache
        .fields(key)
        .await?
        .filter_map(|field| field.strip_prefix(ISSUED_FIELD_PREFIX).map(str::to_string))
        .collect())
}
