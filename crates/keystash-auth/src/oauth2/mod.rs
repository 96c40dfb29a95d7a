//! OAuth 2.0 authorization-code grant.
//!
//! Entities are plain values that load and persist themselves through an
//! [`OAuth2Storage`]. The [`OAuth2Factory`] hands them out, and
//! [`Authorization`] runs the grant:
//!
//! - `authorize` issues a code after recording the user's consent
//! - `exchange` trades a code for an access token and a refresh token
//! - `refresh` trades a refresh token for a new access token
//! - `revoke` withdraws a token
//! - `info` lists the clients a user has authorized

pub mod authorization;
pub mod client;
pub mod code;
pub mod factory;
pub mod grant;
pub mod keys;
pub mod params;
pub mod session;
pub mod storage;
pub mod token;
pub mod user;

pub use authorization::{Authorization, AuthorizationGrant, TOKEN_TYPE_BEARER};
pub use client::Client;
pub use code::Code;
pub use factory::OAuth2Factory;
pub use grant::GrantType;
pub use params::OAuth2Parameters;
pub use session::{FixedSession, SessionContext};
pub use storage::{CacheStorage, OAuth2Storage};
pub use token::{ClientCredentials, TokenBundle, TokenInfo};
pub use user::User;

use subtle::ConstantTimeEq;

/// Compares two byte strings in constant time.
///
/// Only the length leaks: slices of different lengths compare unequal
/// straight away.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Current time in unix seconds.
pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
