//! Walks through the authorization-code grant against the configured cache.
//!
//! The client and user created for the run are deleted afterwards, so the
//! demo is safe to point at a shared Redis.

use std::sync::Arc;

use keystash_auth::{
    AuthError, Client, ClientCredentials, FixedSession, NonceGenerator, OAuth2Factory,
    OAuth2Parameters,
};
use keystash_cache::create_cache_handler;
use serde_json::{Value, json};

use super::Context;
use crate::cli::OutputFormat;
use crate::output::{print_step, print_success, print_value};

const DEMO_REDIRECT_URI: &str = "https://client.example/callback";
const DEMO_SCOPE: &str = "openid profile";

pub async fn run(ctx: &Context) -> anyhow::Result<()> {
    let mut auth_config = ctx.config.auth.clone();
    if auth_config.secret_key.is_empty() {
        auth_config.secret_key = NonceGenerator::new(32).generate();
        tracing::warn!("auth.secret_key is not set; the demo uses a throwaway key");
    }

    let cache = create_cache_handler(&ctx.config.cache).await?;
    let factory = OAuth2Factory::with_cache(cache, Arc::new(auth_config))?;
    let report = Reporter::new(ctx.format);

    let mut client = factory
        .register_client("Keystash Demo", vec![DEMO_REDIRECT_URI.to_string()], vec![])
        .await?;
    report.step(&format!("Registered client {}", client.id()));

    let username = format!("demo-{}", NonceGenerator::new(8).generate());
    let mut user = match factory.create_user(&username, "demo-password").await {
        Ok(user) => user,
        Err(e) => {
            client.destroy().await?;
            return Err(e.into());
        }
    };
    report.step(&format!("Created user {username}"));

    let outcome = walk(&factory, &client, &username, &report).await;

    client.destroy().await?;
    user.destroy().await?;
    report.step("Removed the demo client and user");

    let summary = outcome?;
    match ctx.format {
        OutputFormat::Json => print_value(&summary, ctx.format)?,
        OutputFormat::Table => print_success("Authorization-code grant completed"),
    }
    Ok(())
}

async fn walk(
    factory: &OAuth2Factory,
    client: &Client,
    username: &str,
    report: &Reporter,
) -> anyhow::Result<Value> {
    let creds = ClientCredentials::new(client.id(), client.secret());
    let state = NonceGenerator::new(8).generate();
    let params = OAuth2Parameters::authorization_code(client.id(), DEMO_REDIRECT_URI)
        .with_scope(DEMO_SCOPE)
        .with_state(state);
    let mut auth = factory.authorization(params);

    let grant = auth
        .authorize_session(&FixedSession::logged_in(username))
        .await?;
    let redirect_url = grant.redirect_url()?;
    report.step(&format!("{username} approved the request; redirecting to {redirect_url}"));

    let tokens = auth.exchange(&grant.code, &creds).await?;
    report.step(&format!(
        "Exchanged the code for a {} token valid for {}s",
        tokens.token_type, tokens.expires_in
    ));

    let replay = match auth.exchange(&grant.code, &creds).await {
        Err(e @ AuthError::InvalidGrant { .. }) => e.oauth_error_code(),
        Err(e) => return Err(e.into()),
        Ok(_) => anyhow::bail!("the authorization code was accepted twice"),
    };
    report.step(&format!("Replaying the code was rejected with {replay}"));

    let info = auth.validate(&tokens.access_token).await?;
    report.step(&format!(
        "Access token belongs to {} with scope '{}'",
        info.username, info.scope
    ));

    let refreshed = match tokens.refresh_token.as_deref() {
        Some(refresh_token) => {
            let refreshed = auth.refresh(refresh_token, &creds).await?;
            report.step("Refreshed the access token; the previous one no longer validates");
            Some(refreshed)
        }
        None => {
            report.step("Refresh tokens are disabled; skipping refresh");
            None
        }
    };

    let consents = auth.info(username).await?;
    report.step(&format!("{username} has authorized: {}", consents.join(", ")));

    let current = refreshed.as_ref().unwrap_or(&tokens);
    let to_revoke = current
        .refresh_token
        .as_deref()
        .unwrap_or(&current.access_token);
    auth.revoke(to_revoke).await?;
    if auth.validate(&current.access_token).await.is_ok() {
        anyhow::bail!("the access token survived revocation");
    }
    report.step("Revoked the tokens; the access token is no longer accepted");

    Ok(json!({
        "client_id": client.id(),
        "username": username,
        "redirect_url": redirect_url,
        "token": tokens,
        "replay_error": replay,
        "refreshed": refreshed,
        "consents": consents,
        "revoked": true,
    }))
}

struct Reporter {
    format: OutputFormat,
    steps: std::cell::Cell<usize>,
}

impl Reporter {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            steps: std::cell::Cell::new(0),
        }
    }

    fn step(&self, msg: &str) {
        let n = self.steps.get() + 1;
        self.steps.set(n);
        if matches!(self.format, OutputFormat::Table) {
            print_step(n, msg);
        }
    }
}
