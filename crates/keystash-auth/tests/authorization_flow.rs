//! End-to-end authorization-code grant over the in-memory cache.

use std::sync::Arc;

use async_trait::async_trait;
use keystash_auth::{
    AuthConfig, AuthError, AuthResult, Client, ClientCredentials, FixedSession, GrantType,
    OAuth2Factory, OAuth2Parameters, TokenBundle,
};
use keystash_cache::{CacheHandler, CacheResult, KeyIterator, MemoryCache};

const REDIRECT: &str = "https://app/cb";

/// Memory cache that yields to the scheduler before every call, so flows
/// joined on one task interleave at each cache operation.
#[derive(Default)]
struct YieldingCache(MemoryCache);

#[async_trait]
impl CacheHandler for YieldingCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        tokio::task::yield_now().await;
        self.0.exists(key).await
    }

    async fn field_exists(&self, key: &str, field: &str) -> CacheResult<bool> {
        tokio::task::yield_now().await;
        self.0.field_exists(key, field).await
    }

    async fn read(&self, key: &str) -> CacheResult<String> {
        tokio::task::yield_now().await;
        self.0.read(key).await
    }

    async fn read_field(&self, key: &str, field: &str) -> CacheResult<String> {
        tokio::task::yield_now().await;
        self.0.read_field(key, field).await
    }

    async fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.0.write(key, value).await
    }

    async fn write_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.0.write_field(key, field, value).await
    }

    async fn write_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> CacheResult<bool> {
        tokio::task::yield_now().await;
        self.0.write_field_if_absent(key, field, value).await
    }

    async fn destroy(&self, key: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.0.destroy(key).await
    }

    async fn destroy_field(&self, key: &str, field: &str) -> CacheResult<()> {
        tokio::task::yield_now().await;
        self.0.destroy_field(key, field).await
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> CacheResult<bool> {
        tokio::task::yield_now().await;
        self.0.rename(old_key, new_key).await
    }

    async fn keys(&self, pattern: &str) -> CacheResult<KeyIterator> {
        tokio::task::yield_now().await;
        self.0.keys(pattern).await
    }

    async fn fields(&self, key: &str) -> CacheResult<KeyIterator> {
        tokio::task::yield_now().await;
        self.0.fields(key).await
    }

    fn backend_name(&self) -> &'static str {
        "yielding-memory"
    }
}

fn factory_with(config: AuthConfig) -> OAuth2Factory {
    OAuth2Factory::with_cache(Arc::new(MemoryCache::new()), Arc::new(config)).unwrap()
}

fn interleaving_factory(rotation: bool) -> OAuth2Factory {
    let mut config = AuthConfig::with_secret("integration-test-secret");
    config.oauth.refresh_token_rotation = rotation;
    OAuth2Factory::with_cache(Arc::new(YieldingCache::default()), Arc::new(config)).unwrap()
}

fn factory() -> OAuth2Factory {
    factory_with(AuthConfig::with_secret("integration-test-secret"))
}

async fn setup(factory: &OAuth2Factory) -> (Client, ClientCredentials) {
    let client = factory
        .register_client("Demo App", vec![REDIRECT.to_string()], vec![])
        .await
        .unwrap();
    factory.create_user("u1", "hunter22").await.unwrap();
    let creds = ClientCredentials::new(client.id(), client.secret());
    (client, creds)
}

fn params(client: &Client) -> OAuth2Parameters {
    OAuth2Parameters::authorization_code(client.id(), REDIRECT)
        .with_scope("openid profile")
        .with_state("xyz")
}

#[tokio::test]
async fn test_full_grant_lifecycle() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    assert_eq!(grant.redirect_uri, REDIRECT);
    assert_eq!(grant.state, "xyz");
    assert!(grant.redirect_url().unwrap().contains("state=xyz"));

    let first = auth.exchange(&grant.code, &creds).await.unwrap();
    assert_eq!(first.token_type, "Bearer");
    assert_eq!(first.expires_in, 3600);
    assert_eq!(first.scope, "openid profile");
    let r1 = first.refresh_token.clone().unwrap();
    assert_eq!(auth.access_token(), Some(first.access_token.as_str()));

    let info = auth.validate(&first.access_token).await.unwrap();
    assert_eq!(info.client_id, client.id());
    assert_eq!(info.username, "u1");

    let second = auth.refresh(&r1, &creds).await.unwrap();
    assert_ne!(second.access_token, first.access_token);
    assert_ne!(second.refresh_token.as_deref(), Some(r1.as_str()));

    // The old pair stops working.
    assert!(matches!(
        auth.validate(&first.access_token).await.unwrap_err(),
        AuthError::InvalidGrant { .. }
    ));
    assert!(matches!(
        auth.refresh(&r1, &creds).await.unwrap_err(),
        AuthError::InvalidGrant { .. }
    ));

    auth.revoke(&second.access_token).await.unwrap();
    assert!(auth.access_token().is_none());
    assert!(auth.validate(&second.access_token).await.is_err());

    assert_eq!(auth.info("u1").await.unwrap(), vec![client.id().to_string()]);
}

#[tokio::test]
async fn test_code_is_single_use() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    auth.exchange(&grant.code, &creds).await.unwrap();

    let err = auth.exchange(&grant.code, &creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
    assert_eq!(err.oauth_error_code(), "invalid_grant");
}

#[tokio::test]
async fn test_expired_code_is_rejected_and_spent() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    factory
        .cache()
        .write_field(&format!("code:{}", grant.code), "created_at", "0")
        .await
        .unwrap();

    let err = auth.exchange(&grant.code, &creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
    assert!(!factory.load_code(&grant.code).await.unwrap().is_loaded());
    assert!(factory.cache().keys("*code:*").await.unwrap().next().is_none());
}

#[tokio::test]
async fn test_code_bound_to_client_and_redirect() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let other = factory
        .register_client("Other", vec![REDIRECT.to_string()], vec![])
        .await
        .unwrap();
    let other_creds = ClientCredentials::new(other.id(), other.secret());

    let mut auth = factory.authorization(params(&client));
    let grant = auth.authorize("u1").await.unwrap();
    let err = auth.exchange(&grant.code, &other_creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));

    // The failed attempt spent the code.
    let err = auth.exchange(&grant.code, &creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchange_has_one_winner() {
    let factory = Arc::new(factory());
    let (client, creds) = setup(&factory).await;
    let grant = factory
        .authorization(params(&client))
        .authorize("u1")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let factory = Arc::clone(&factory);
        let params = params(&client);
        let creds = creds.clone();
        let code = grant.code.clone();
        handles.push(tokio::spawn(async move {
            let mut auth = factory.authorization(params);
            auth.exchange(&code, &creds).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(matches!(err, AuthError::InvalidGrant { .. }), "{err}"),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_revoking_refresh_token_revokes_access_token() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    let tokens = auth.exchange(&grant.code, &creds).await.unwrap();
    let refresh = tokens.refresh_token.unwrap();

    auth.revoke(&refresh).await.unwrap();
    assert!(auth.refresh_token().is_none());
    assert!(auth.validate(&tokens.access_token).await.is_err());
    assert!(auth.refresh(&refresh, &creds).await.is_err());

    // Unknown and already revoked tokens are fine.
    auth.revoke(&refresh).await.unwrap();
    auth.revoke("never-issued").await.unwrap();
}

#[tokio::test]
async fn test_refresh_without_rotation_keeps_token() {
    let mut config = AuthConfig::with_secret("integration-test-secret");
    config.oauth.refresh_token_rotation = false;
    let factory = factory_with(config);
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    let first = auth.exchange(&grant.code, &creds).await.unwrap();
    let refresh = first.refresh_token.clone().unwrap();

    let second = auth.refresh(&refresh, &creds).await.unwrap();
    assert_eq!(second.refresh_token.as_deref(), Some(refresh.as_str()));
    assert_ne!(second.access_token, first.access_token);
    assert!(auth.validate(&first.access_token).await.is_err());
    assert!(auth.validate(&second.access_token).await.is_ok());
}

#[tokio::test]
async fn test_refresh_tokens_disabled() {
    let mut config = AuthConfig::with_secret("integration-test-secret");
    config.oauth.refresh_tokens_enabled = false;
    let factory = factory_with(config);
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    let tokens = auth.exchange(&grant.code, &creds).await.unwrap();
    assert!(tokens.refresh_token.is_none());

    let err = auth.refresh("anything", &creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let factory = factory();
    let (client, creds) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));

    let grant = auth.authorize("u1").await.unwrap();
    let tokens = auth.exchange(&grant.code, &creds).await.unwrap();
    let refresh = tokens.refresh_token.unwrap();
    factory
        .cache()
        .write_field(&format!("refresh_token:{refresh}"), "expires_at", "0")
        .await
        .unwrap();

    let err = auth.refresh(&refresh, &creds).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
    assert!(auth.validate(&tokens.access_token).await.is_err());
}

#[tokio::test]
async fn test_client_authentication() {
    let factory = factory();
    let (client, _) = setup(&factory).await;
    let mut auth = factory.authorization(params(&client));
    let grant = auth.authorize("u1").await.unwrap();

    let wrong = ClientCredentials::new(client.id(), "not-the-secret");
    let err = auth.exchange(&grant.code, &wrong).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClient { .. }));
    assert_eq!(err.oauth_error_code(), "invalid_client");

    // A failed authentication does not spend the code.
    assert!(factory.load_code(&grant.code).await.unwrap().is_loaded());

    let unknown = ClientCredentials::new("nobody", "x");
    let err = auth.exchange(&grant.code, &unknown).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClient { .. }));
}

#[tokio::test]
async fn test_authorize_validation() {
    let factory = factory();
    let (client, _) = setup(&factory).await;

    let err = factory
        .authorization(OAuth2Parameters::authorization_code(client.id(), "https://evil/cb"))
        .authorize("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnauthorizedClient { .. }));

    let err = factory
        .authorization(OAuth2Parameters::authorization_code("unknown", REDIRECT))
        .authorize("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnauthorizedClient { .. }));

    let err = factory
        .authorization(OAuth2Parameters::new("token", "", client.id(), REDIRECT, ""))
        .authorize("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest { .. }));

    let err = factory
        .authorization(params(&client))
        .authorize("ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound { .. }));
}

#[tokio::test]
async fn test_authorize_defaults_to_single_redirect() {
    let factory = factory();
    let (client, _) = setup(&factory).await;

    let grant = factory
        .authorization(OAuth2Parameters::authorization_code(client.id(), ""))
        .authorize("u1")
        .await
        .unwrap();
    assert_eq!(grant.redirect_uri, REDIRECT);

    let multi = factory
        .register_client(
            "Multi",
            vec![REDIRECT.to_string(), "https://app/other".to_string()],
            vec![],
        )
        .await
        .unwrap();
    let err = factory
        .authorization(OAuth2Parameters::authorization_code(multi.id(), ""))
        .authorize("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidRequest { .. }));
}

#[tokio::test]
async fn test_grant_types_are_enforced() {
    let factory = factory();
    factory.create_user("u1", "pw").await.unwrap();
    let client = factory
        .register_client(
            "Machine",
            vec![REDIRECT.to_string()],
            vec![GrantType::ClientCredentials],
        )
        .await
        .unwrap();

    let err = factory
        .authorization(OAuth2Parameters::authorization_code(client.id(), REDIRECT))
        .authorize("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnauthorizedClient { .. }));
}

#[tokio::test]
async fn test_session_authorization() {
    let factory = factory();
    let (client, _) = setup(&factory).await;
    let auth = factory.authorization(params(&client));

    let grant = auth
        .authorize_session(&FixedSession::logged_in("u1"))
        .await
        .unwrap();
    assert!(!grant.code.is_empty());

    let err = auth
        .authorize_session(&FixedSession::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccessDenied { .. }));
}

#[tokio::test]
async fn test_info_lists_consents() {
    let factory = factory();
    let (first, _) = setup(&factory).await;
    let second = factory
        .register_client("Second", vec![REDIRECT.to_string()], vec![])
        .await
        .unwrap();

    let auth = factory.authorization(OAuth2Parameters::default());
    assert!(auth.info("u1").await.unwrap().is_empty());

    factory.authorization(params(&first)).authorize("u1").await.unwrap();
    factory.authorization(params(&second)).authorize("u1").await.unwrap();

    let mut expected = vec![first.id().to_string(), second.id().to_string()];
    expected.sort();
    assert_eq!(auth.info("u1").await.unwrap(), expected);

    let err = auth.info("ghost").await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound { .. }));
}

// Exchanges a fresh code and returns the tokens.
async fn issue_tokens(
    factory: &OAuth2Factory,
    client: &Client,
    creds: &ClientCredentials,
) -> TokenBundle {
    let mut auth = factory.authorization(params(client));
    let grant = auth.authorize("u1").await.unwrap();
    auth.exchange(&grant.code, creds).await.unwrap()
}

async fn refresh_many(
    factory: &Arc<OAuth2Factory>,
    client: &Client,
    creds: &ClientCredentials,
    refresh: &str,
    n: usize,
) -> Vec<AuthResult<TokenBundle>> {
    let mut handles = Vec::new();
    for _ in 0..n {
        let factory = Arc::clone(factory);
        let params = params(client);
        let creds = creds.clone();
        let refresh = refresh.to_string();
        handles.push(tokio::spawn(async move {
            let mut auth = factory.authorization(params);
            auth.refresh(&refresh, &creds).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_interleaved_refreshes_are_all_revoked() {
    let factory = interleaving_factory(false);
    let (client, creds) = setup(&factory).await;
    let tokens = issue_tokens(&factory, &client, &creds).await;
    let refresh = tokens.refresh_token.clone().unwrap();

    let mut first = factory.authorization(params(&client));
    let mut second = factory.authorization(params(&client));
    let (a, b) = tokio::join!(
        first.refresh(&refresh, &creds),
        second.refresh(&refresh, &creds)
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_ne!(a.access_token, b.access_token);

    let mut auth = factory.authorization(params(&client));
    auth.revoke(&refresh).await.unwrap();
    for token in [&tokens.access_token, &a.access_token, &b.access_token] {
        assert!(auth.validate(token).await.is_err());
    }
}

#[tokio::test]
async fn test_refresh_racing_revoke_leaves_no_live_token() {
    let factory = interleaving_factory(false);
    let (client, creds) = setup(&factory).await;
    let tokens = issue_tokens(&factory, &client, &creds).await;
    let refresh = tokens.refresh_token.clone().unwrap();

    let mut refresher = factory.authorization(params(&client));
    let mut revoker = factory.authorization(params(&client));
    let (refreshed, revoked) = tokio::join!(
        refresher.refresh(&refresh, &creds),
        revoker.revoke(&refresh)
    );
    revoked.unwrap();

    let auth = factory.authorization(params(&client));
    match refreshed {
        Ok(bundle) => assert!(auth.validate(&bundle.access_token).await.is_err()),
        Err(err) => assert!(matches!(err, AuthError::InvalidGrant { .. }), "{err}"),
    }
    assert!(auth.validate(&tokens.access_token).await.is_err());
    let leftovers = factory.cache().keys("revoked_refresh_token:*").await.unwrap();
    assert_eq!(leftovers.len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_with_rotation_has_one_winner() {
    let factory = Arc::new(interleaving_factory(true));
    let (client, creds) = setup(&factory).await;
    let tokens = issue_tokens(&factory, &client, &creds).await;
    let refresh = tokens.refresh_token.clone().unwrap();

    let results = refresh_many(&factory, &client, &creds, &refresh, 16).await;

    let mut winners = Vec::new();
    for result in results {
        match result {
            Ok(bundle) => winners.push(bundle),
            Err(err) => assert!(matches!(err, AuthError::InvalidGrant { .. }), "{err}"),
        }
    }
    assert_eq!(winners.len(), 1);
    let winner = &winners[0];
    assert_ne!(winner.refresh_token.as_deref(), Some(refresh.as_str()));

    let mut auth = factory.authorization(params(&client));
    assert!(auth.validate(&tokens.access_token).await.is_err());
    assert!(auth.validate(&winner.access_token).await.is_ok());

    auth.revoke(winner.refresh_token.as_deref().unwrap()).await.unwrap();
    assert!(auth.validate(&winner.access_token).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_without_rotation_revokes_every_token() {
    let factory = Arc::new(interleaving_factory(false));
    let (client, creds) = setup(&factory).await;
    let tokens = issue_tokens(&factory, &client, &creds).await;
    let refresh = tokens.refresh_token.clone().unwrap();

    let results = refresh_many(&factory, &client, &creds, &refresh, 16).await;
    let minted: Vec<TokenBundle> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(minted.len(), 16);
    assert!(
        minted
            .iter()
            .all(|bundle| bundle.refresh_token.as_deref() == Some(refresh.as_str()))
    );

    let mut auth = factory.authorization(params(&client));
    auth.revoke(&refresh).await.unwrap();
    for bundle in &minted {
        assert!(auth.validate(&bundle.access_token).await.is_err());
    }
    assert!(auth.validate(&tokens.access_token).await.is_err());
    assert!(auth.refresh(&refresh, &creds).await.is_err());
}

#[tokio::test]
async fn test_deleted_client_loses_consents_and_tokens() {
    let factory = factory();
    let (mut client, creds) = setup(&factory).await;
    let tokens = issue_tokens(&factory, &client, &creds).await;

    let auth = factory.authorization(params(&client));
    assert_eq!(auth.info("u1").await.unwrap(), vec![client.id().to_string()]);

    client.destroy().await.unwrap();

    assert!(auth.info("u1").await.unwrap().is_empty());
    let err = auth.validate(&tokens.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidGrant { .. }));
}

