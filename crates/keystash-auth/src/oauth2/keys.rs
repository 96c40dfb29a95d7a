//! Cache key layout for OAuth 2.0 records.
//!
//! | Key | Record |
//! |-----|--------|
//! | `client:<id>` | registered client |
//! | `user:<username>` | resource owner and consents |
//! | `code:<code>` | unused authorization code |
//! | `consumed_code:<code>` | code claimed by an exchange in progress |
//! | `access_token:<token>` | issued access token |
//! | `refresh_token:<token>` | issued refresh token |
//! | `revoked_refresh_token:<nonce>` | refresh token being revoked |

use keystash_cache::has_wildcard;

use crate::{AuthError, AuthResult};

pub const CLIENT_PREFIX: &str = "client:";
pub const USER_PREFIX: &str = "user:";
pub const CODE_PREFIX: &str = "code:";
pub const CONSUMED_CODE_PREFIX: &str = "consumed_code:";
pub const ACCESS_TOKEN_PREFIX: &str = "access_token:";
pub const REFRESH_TOKEN_PREFIX: &str = "refresh_token:";
pub const REVOKED_REFRESH_TOKEN_PREFIX: &str = "revoked_refresh_token:";

/// Field prefix for consents stored on a user record.
pub const CONSENT_FIELD_PREFIX: &str = "consent:";

// Identifiers come from requests. A `*` would turn a single-record destroy
// into a wildcard delete.
fn record_key(prefix: &str, kind: &str, id: &str) -> AuthResult<String> {
    if id.is_empty() {
        return Err(AuthError::invalid_request(format!("{kind} must not be empty")));
    }
    if has_wildcard(id) {
        return Err(AuthError::invalid_request(format!(
            "{kind} contains a reserved character"
        )));
    }
    Ok(format!("{prefix}{id}"))
}

pub fn client(id: &str) -> AuthResult<String> {
    record_key(CLIENT_PREFIX, "client_id", id)
}

pub fn user(username: &str) -> AuthResult<String> {
    record_key(USER_PREFIX, "username", username)
}

pub fn code(code: &str) -> AuthResult<String> {
    record_key(CODE_PREFIX, "code", code)
}

pub fn consumed_code(code: &str) -> AuthResult<String> {
    record_key(CONSUMED_CODE_PREFIX, "code", code)
}

pub fn access_token(token: &str) -> AuthResult<String> {
    record_key(ACCESS_TOKEN_PREFIX, "access token", token)
}

pub fn refresh_token(token: &str) -> AuthResult<String> {
    record_key(REFRESH_TOKEN_PREFIX, "refresh token", token)
}

pub fn revoked_refresh_token(nonce: &str) -> AuthResult<String> {
    record_key(REVOKED_REFRESH_TOKEN_PREFIX, "nonce", nonce)
}

pub fn consent_field(client_id: &str) -> String {
    format!("{CONSENT_FIELD_PREFIX}{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(client("c1").unwrap(), "client:c1");
        assert_eq!(user("u1").unwrap(), "user:u1");
        assert_eq!(code("abc").unwrap(), "code:abc");
        assert_eq!(consumed_code("abc").unwrap(), "consumed_code:abc");
        assert_eq!(access_token("t").unwrap(), "access_token:t");
        assert_eq!(refresh_token("r").unwrap(), "refresh_token:r");
        assert_eq!(
            revoked_refresh_token("n").unwrap(),
            "revoked_refresh_token:n"
        );
        assert_eq!(consent_field("c1"), "consent:c1");
    }

    #[test]
    fn test_wildcard_identifiers_rejected() {
        let err = access_token("*").unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest { .. }));
        assert!(user("adm*").is_err());
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        assert!(client("").is_err());
        assert!(code("").is_err());
    }
}
