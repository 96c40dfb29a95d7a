//! Authorization-code grant flow.
//!
//! An [`Authorization`] drives one request through the grant:
//!
//! ```text
//! authorize(user) ──► code ──► exchange(code) ──► access (+ refresh) token
//!                                                   │
//!                              refresh(token) ◄─────┘
//!                              revoke(token)
//! ```
//!
//! # Security
//!
//! - Codes are claimed with an atomic rename, so only one exchange wins
//! - A claimed code is spent even if the exchange then fails
//! - A revoked refresh token is moved aside before its access tokens are
//!   destroyed, and a refresh re-checks its refresh token after linking the
//!   new access token, so no access token outlives its refresh token
//! - Codes, tokens and secrets are never logged

use std::time::Duration;

use super::factory::OAuth2Factory;
use super::grant::GrantType;
use super::keys;
use super::now_unix;
use super::params::OAuth2Parameters;
use super::session::SessionContext;
use super::token::{
    ClientCredentials, FIELD_REFRESH_TOKEN, TokenBundle, TokenInfo, TokenRecord, issued_field,
    issued_access_tokens,
};
use crate::{AuthError, AuthResult};

/// Bearer token type reported in every [`TokenBundle`].
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Result of a successful [`Authorization::authorize`].
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    /// The authorization code.
    pub code: String,
    /// Where the user agent is sent back to.
    pub redirect_uri: String,
    /// State echoed back to the client.
    pub state: String,
}

impl std::fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl AuthorizationGrant {
    /// Builds the redirect target carrying `code` and `state`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the redirect URI is not a URL.
    pub fn redirect_url(&self) -> AuthResult<String> {
        let mut url = url::Url::parse(&self.redirect_uri)
            .map_err(|e| AuthError::invalid_request(format!("invalid redirect_uri: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("code", &self.code);
            if !self.state.is_empty() {
                pairs.append_pair("state", &self.state);
            }
        }
        Ok(url.to_string())
    }
}

/// One pass through the authorization-code grant.
///
/// Borrows the factory that built it; the last issued token state is kept on
/// the authorization.
#[derive(Debug)]
pub struct Authorization<'f> {
    factory: &'f OAuth2Factory,
    params: OAuth2Parameters,
    access_token: Option<String>,
    expires_at: Option<i64>,
    refresh_token: Option<String>,
}

impl<'f> Authorization<'f> {
    pub(crate) fn new(factory: &'f OAuth2Factory, params: OAuth2Parameters) -> Self {
        Self {
            factory,
            params,
            access_token: None,
            expires_at: None,
            refresh_token: None,
        }
    }

    #[must_use]
    pub fn params(&self) -> &OAuth2Parameters {
        &self.params
    }

    /// The access token issued by the last exchange or refresh.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Expiry of [`access_token`](Self::access_token), in unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Approves the request on behalf of `username`.
    ///
    /// Records the user's consent for the client and issues a code bound to
    /// the client, user, scope and redirect URI.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `response_type` is not "code" (`InvalidRequest`)
    /// - `client_id` is missing (`InvalidRequest`)
    /// - `redirect_uri` is missing and the client has several (`InvalidRequest`)
    /// - The client is unknown (`UnauthorizedClient`)
    /// - The redirect URI is not registered (`UnauthorizedClient`)
    /// - The client may not use this grant (`UnauthorizedClient`)
    /// - The user does not exist (`NotFound`)
    pub async fn authorize(&self, username: &str) -> AuthResult<AuthorizationGrant> {
        let params = &self.params;

        if params.response_type() != "code" {
            return Err(AuthError::invalid_request(format!(
                "unsupported response_type '{}'",
                params.response_type()
            )));
        }
        if params.client_id().is_empty() {
            return Err(AuthError::invalid_request("missing client_id"));
        }

        let client = self.factory.load_client(params.client_id()).await?;
        if !client.is_loaded() {
            return Err(AuthError::unauthorized_client("unknown client"));
        }
        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized_client(
                "client is not authorized for the authorization_code grant",
            ));
        }

        let redirect_uri = if params.redirect_uri().is_empty() {
            match client.redirect_uris() {
                [only] => only.clone(),
                _ => return Err(AuthError::invalid_request("missing redirect_uri")),
            }
        } else if client.is_redirect_uri_allowed(params.redirect_uri()) {
            params.redirect_uri().to_string()
        } else {
            return Err(AuthError::unauthorized_client("redirect_uri is not registered"));
        };

        let user = self.factory.load_user(username).await?;
        if !user.is_loaded() {
            return Err(AuthError::not_found(format!("unknown user '{username}'")));
        }

        user.add_consent(client.id(), params.scope()).await?;

        let code = super::code::Code::issue(
            std::sync::Arc::clone(self.factory.storage()),
            client.id(),
            username,
            params.scope(),
            &redirect_uri,
            params.state(),
        )
        .await?;

        tracing::info!(
            client_id = %client.id(),
            username = %username,
            scope = %params.scope(),
            "Authorization code issued"
        );

        Ok(AuthorizationGrant {
            code: code.code().to_string(),
            redirect_uri,
            state: params.state().to_string(),
        })
    }

    /// Approves the request for whoever is logged in to `session`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` if nobody is logged in, otherwise
    /// the errors of [`authorize`](Self::authorize).
    pub async fn authorize_session(
        &self,
        session: &dyn SessionContext,
    ) -> AuthResult<AuthorizationGrant> {
        match session.current_user().await {
            Some(username) => self.authorize(&username).await,
            None => Err(AuthError::access_denied("no user is logged in")),
        }
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Client authentication fails (`InvalidClient`)
    /// - The code is unknown, already used, expired, issued to another client
    ///   or for another redirect URI (`InvalidGrant`)
    pub async fn exchange(
        &mut self,
        code: &str,
        credentials: &ClientCredentials,
    ) -> AuthResult<TokenBundle> {
        let client = self.authenticate(credentials).await?;
        if !client.is_grant_type_allowed(GrantType::AuthorizationCode) {
            return Err(AuthError::unauthorized_client(
                "client is not authorized for the authorization_code grant",
            ));
        }

        let mut code = self.factory.load_code(code).await?;
        if !code.is_loaded() {
            tracing::warn!(client_id = %client.id(), "Exchange with unknown or used code");
            return Err(AuthError::invalid_grant("authorization code is invalid or already used"));
        }
        if !code.consume().await? {
            tracing::warn!(client_id = %client.id(), "Exchange lost the race for a code");
            return Err(AuthError::invalid_grant("authorization code already used"));
        }

        // The code is spent from here on, whatever the outcome.
        let config = &self.factory.config().oauth;
        let rejection = if code.is_expired(config.authorization_code_lifetime) {
            Some("authorization code expired")
        } else if code.client_id() != client.id() {
            Some("authorization code was issued to another client")
        } else if !self.params.redirect_uri().is_empty()
            && self.params.redirect_uri() != code.redirect_uri()
        {
            Some("redirect_uri does not match the authorization request")
        } else {
            None
        };

        if let Some(reason) = rejection {
            code.destroy().await?;
            tracing::warn!(client_id = %client.id(), reason, "Exchange rejected");
            return Err(AuthError::invalid_grant(reason));
        }

        let bundle = self
            .mint(client.id(), code.username(), code.scope(), None)
            .await?;
        code.destroy().await?;

        tracing::info!(
            client_id = %client.id(),
            username = %code.username(),
            refresh = bundle.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(bundle)
    }

    /// Issues a new access token for a refresh token.
    ///
    /// Access tokens previously minted from the refresh token stop working.
    /// With rotation enabled the refresh token is replaced as well, and of
    /// several concurrent refreshes only one succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Refresh tokens are disabled (`InvalidRequest`)
    /// - Client authentication fails (`InvalidClient`)
    /// - The client may not use this grant (`UnauthorizedClient`)
    /// - The refresh token is unknown, expired, rotated away, revoked during
    ///   the refresh, or belongs to another client (`InvalidGrant`)
    pub async fn refresh(
        &mut self,
        refresh_token: &str,
        credentials: &ClientCredentials,
    ) -> AuthResult<TokenBundle> {
        let config = self.factory.config().oauth.clone();
        if !config.refresh_tokens_enabled {
            return Err(AuthError::invalid_request("refresh tokens are disabled"));
        }

        let client = self.authenticate(credentials).await?;
        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::unauthorized_client(
                "client is not authorized for the refresh_token grant",
            ));
        }

        let cache = self.factory.cache();
        let key = keys::refresh_token(refresh_token)?;
        let Some(record) = TokenRecord::read(cache, &key, None).await? else {
            tracing::warn!(client_id = %client.id(), "Refresh with unknown token");
            return Err(AuthError::invalid_grant("refresh token is invalid"));
        };

        if record.info.client_id != client.id() {
            tracing::warn!(client_id = %client.id(), "Refresh token presented by another client");
            return Err(AuthError::invalid_grant("refresh token was issued to another client"));
        }

        let now = now_unix();
        if record.info.is_expired_at(now) {
            self.revoke_refresh(&key, client.id()).await?;
            return Err(AuthError::invalid_grant("refresh token expired"));
        }

        let (refresh_key, refresh_token) = if config.refresh_token_rotation {
            let rotated = self.factory.storage().nonce_generator().generate();
            let rotated_key = keys::refresh_token(&rotated)?;
            if !cache.rename(&key, &rotated_key).await? {
                return Err(AuthError::invalid_grant("refresh token already used"));
            }
            let extended = TokenRecord {
                info: TokenInfo {
                    expires_at: expiry(now, config.refresh_token_lifetime),
                    ..record.info.clone()
                },
                linked: String::new(),
            };
            extended.write(cache, &rotated_key, None).await?;
            (rotated_key, rotated)
        } else {
            (key, refresh_token.to_string())
        };

        for previous in issued_access_tokens(cache, &refresh_key).await? {
            cache.destroy(&keys::access_token(&previous)?).await?;
            cache
                .destroy_field(&refresh_key, &issued_field(&previous))
                .await?;
        }

        let bundle = self
            .mint(
                client.id(),
                &record.info.username,
                &record.info.scope,
                Some(refresh_token),
            )
            .await?;

        tracing::info!(
            client_id = %client.id(),
            username = %record.info.username,
            rotated = config.refresh_token_rotation,
            "Access token refreshed"
        );
        Ok(bundle)
    }

    /// Revokes an access or refresh token.
    ///
    /// Revoking a refresh token also revokes every access token minted with
    /// it, including one minted by a refresh still in flight.
    /// Unknown tokens are ignored, so revoking twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` for an empty or malformed token and
    /// `AuthError::StorageUnavailable` if the cache fails.
    pub async fn revoke(&mut self, token: &str) -> AuthResult<()> {
        let cache = self.factory.cache();
        let refresh_key = keys::refresh_token(token)?;
        let access_key = keys::access_token(token)?;

        if let Some(record) = TokenRecord::read(cache, &refresh_key, None).await? {
            self.revoke_refresh(&refresh_key, &record.info.client_id).await?;
        }
        if cache.exists(&access_key).await? {
            let refresh_token = cache.read_field(&access_key, FIELD_REFRESH_TOKEN).await?;
            cache.destroy(&access_key).await?;
            if !refresh_token.is_empty() {
                cache
                    .destroy_field(&keys::refresh_token(&refresh_token)?, &issued_field(token))
                    .await?;
            }
            tracing::info!("Access token revoked");
        }

        if self.access_token.as_deref() == Some(token) {
            self.access_token = None;
            self.expires_at = None;
        }
        if self.refresh_token.as_deref() == Some(token) {
            self.refresh_token = None;
        }
        Ok(())
    }

    /// Client ids `username` has authorized, sorted.
    ///
    /// Clients deleted since the user authorized them are left out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the user does not exist.
    pub async fn info(&self, username: &str) -> AuthResult<Vec<String>> {
        let user = self.factory.load_user(username).await?;
        if !user.is_loaded() {
            return Err(AuthError::not_found(format!("unknown user '{username}'")));
        }
        user.consented_clients().await
    }

    /// Looks up a live access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidGrant` if the token is unknown, expired or
    /// was issued to a client that has since been deleted.
    pub async fn validate(&self, access_token: &str) -> AuthResult<TokenInfo> {
        let cache = self.factory.cache();
        let key = keys::access_token(access_token)?;
        let Some(record) = TokenRecord::read(cache, &key, Some(FIELD_REFRESH_TOKEN)).await? else {
            return Err(AuthError::invalid_grant("access token is invalid"));
        };
        if record.info.is_expired_at(now_unix()) {
            cache.destroy(&key).await?;
            return Err(AuthError::invalid_grant("access token expired"));
        }
        if !cache.exists(&keys::client(&record.info.client_id)?).await? {
            cache.destroy(&key).await?;
            return Err(AuthError::invalid_grant("access token belongs to a deleted client"));
        }
        Ok(record.info)
    }

    async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> AuthResult<super::client::Client> {
        if credentials.client_id.is_empty() {
            return Err(AuthError::invalid_client("missing client_id"));
        }
        let client = self.factory.load_client(&credentials.client_id).await?;
        if !client.is_loaded() || !client.verify_secret(&credentials.client_secret) {
            tracing::warn!(client_id = %credentials.client_id, "Client authentication failed");
            return Err(AuthError::invalid_client("client authentication failed"));
        }
        Ok(client)
    }

    // The record is moved aside before its access tokens are listed. A
    // refresh that links a token after the move finds no record and
    // withdraws that token itself.
    async fn revoke_refresh(&self, key: &str, client_id: &str) -> AuthResult<()> {
        let cache = self.factory.cache();
        let nonce = self.factory.storage().nonce_generator().generate();
        let claimed = keys::revoked_refresh_token(&nonce)?;
        if !cache.rename(key, &claimed).await? {
            return Ok(());
        }
        for access_token in issued_access_tokens(cache, &claimed).await? {
            cache.destroy(&keys::access_token(&access_token)?).await?;
        }
        cache.destroy(&claimed).await?;
        tracing::info!(client_id = %client_id, "Refresh token revoked");
        Ok(())
    }

    // Writes a new access token, pairing it with `refresh_token` or with a
    // freshly generated one when refresh tokens are enabled. The access
    // record is written before the link so a revoke that sees the link can
    // always destroy it.
    async fn mint(
        &mut self,
        client_id: &str,
        username: &str,
        scope: &str,
        refresh_token: Option<String>,
    ) -> AuthResult<TokenBundle> {
        let config = self.factory.config().oauth.clone();
        let cache = self.factory.cache();
        let nonce = self.factory.storage().nonce_generator();
        let now = now_unix();

        let access_token = nonce.generate();
        let access_key = keys::access_token(&access_token)?;
        let expires_at = expiry(now, config.access_token_lifetime);

        let refresh_token = match refresh_token {
            Some(existing) => Some(existing),
            None if config.refresh_tokens_enabled => {
                let token = nonce.generate();
                let record = TokenRecord {
                    info: TokenInfo {
                        client_id: client_id.to_string(),
                        username: username.to_string(),
                        scope: scope.to_string(),
                        expires_at: expiry(now, config.refresh_token_lifetime),
                    },
                    linked: String::new(),
                };
                record
                    .write(cache, &keys::refresh_token(&token)?, None)
                    .await?;
                Some(token)
            }
            None => None,
        };

        let record = TokenRecord {
            info: TokenInfo {
                client_id: client_id.to_string(),
                username: username.to_string(),
                scope: scope.to_string(),
                expires_at,
            },
            linked: refresh_token.clone().unwrap_or_default(),
        };
        record
            .write(cache, &access_key, Some(FIELD_REFRESH_TOKEN))
            .await?;

        if let Some(refresh) = &refresh_token {
            let refresh_key = keys::refresh_token(refresh)?;
            cache
                .write_field(&refresh_key, &issued_field(&access_token), &expires_at.to_string())
                .await?;
            // The refresh token was revoked meanwhile; the revoke may have
            // listed its access tokens before this link landed.
            if !TokenRecord::is_present(cache, &refresh_key).await? {
                cache.destroy(&access_key).await?;
                cache.destroy(&refresh_key).await?;
                return Err(AuthError::invalid_grant("refresh token was revoked"));
            }
        }

        self.access_token = Some(access_token.clone());
        self.expires_at = Some(expires_at);
        self.refresh_token = refresh_token.clone();

        Ok(TokenBundle {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: config.access_token_lifetime.as_secs(),
            refresh_token,
            scope: scope.to_string(),
        })
    }
}

fn expiry(now: i64, lifetime: Duration) -> i64 {
    now.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
}
