//! Keystash authorization server.
//!
//! OAuth 2.0 authorization-code grant over the record store in
//! `keystash-cache`:
//!
//! - **crypto**: deterministic credential encryption and nonce generation
//! - **oauth2**: clients, users, codes, tokens and the grant flow
//! - **config**: secret key, nonce length and token lifetimes
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keystash_auth::{AuthConfig, ClientCredentials, OAuth2Factory, OAuth2Parameters};
//! use keystash_cache::CacheConfig;
//!
//! let config = Arc::new(AuthConfig::with_secret("change-me-in-production"));
//! let factory = OAuth2Factory::from_config(&CacheConfig::default(), config).await?;
//!
//! let client = factory
//!     .register_client("Demo", vec!["https://app/cb".into()], vec![])
//!     .await?;
//! factory.create_user("alice", "wonderland").await?;
//!
//! let mut auth = factory.authorization(OAuth2Parameters::authorization_code(
//!     client.id(),
//!     "https://app/cb",
//! ));
//! let grant = auth.authorize("alice").await?;
//! let tokens = auth
//!     .exchange(&grant.code, &ClientCredentials::new(client.id(), client.secret()))
//!     .await?;
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod oauth2;

pub use config::{AuthConfig, ConfigError, OAuthConfig};
pub use crypto::{CryptoError, Cryptograph, NonceGenerator};
pub use error::{AuthError, ErrorCategory};
pub use oauth2::{
    Authorization, AuthorizationGrant, CacheStorage, Client, ClientCredentials, Code,
    FixedSession, GrantType, OAuth2Factory, OAuth2Parameters, OAuth2Storage, SessionContext,
    TokenBundle, TokenInfo, User,
};

/// Result type for authorization operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;
