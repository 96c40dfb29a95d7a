use serde::{Deserialize, Serialize};

/// The standard authorization request parameters.
///
/// Deserializes from a query string or form map; absent parameters are empty
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuth2Parameters {
    response_type: String,
    scope: String,
    client_id: String,
    redirect_uri: String,
    state: String,
}

impl OAuth2Parameters {
    #[must_use]
    pub fn new(
        response_type: impl Into<String>,
        scope: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            response_type: response_type.into(),
            scope: scope.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            state: state.into(),
        }
    }

    /// Parameters for a `response_type=code` request with no scope or state.
    #[must_use]
    pub fn authorization_code(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self::new("code", "", client_id, redirect_uri, "")
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    #[must_use]
    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let params = OAuth2Parameters::authorization_code("c1", "https://app/cb")
            .with_scope("openid")
            .with_state("s");
        assert_eq!(params.response_type(), "code");
        assert_eq!(params.client_id(), "c1");
        assert_eq!(params.redirect_uri(), "https://app/cb");
        assert_eq!(params.scope(), "openid");
        assert_eq!(params.state(), "s");
    }

    #[test]
    fn test_deserialize_partial() {
        let params: OAuth2Parameters =
            serde_json::from_str(r#"{"response_type": "code", "client_id": "c1"}"#).unwrap();
        assert_eq!(params.client_id(), "c1");
        assert_eq!(params.redirect_uri(), "");
        assert_eq!(params.state(), "");
    }
}
