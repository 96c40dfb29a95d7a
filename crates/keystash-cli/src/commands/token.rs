use keystash_auth::{AuthError, OAuth2Parameters};
use serde_json::json;

use super::Context;
use crate::output::{print_success, print_value};

/// Prints what an access token grants, shaped like an introspection response.
pub async fn inspect(ctx: &Context, token: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let auth = factory.authorization(OAuth2Parameters::default());

    let value = match auth.validate(token).await {
        Ok(info) => {
            let now = time::OffsetDateTime::now_utc().unix_timestamp();
            let expires_in = info.expires_in(now);
            json!({
                "active": true,
                "client_id": info.client_id,
                "username": info.username,
                "scope": info.scope,
                "exp": info.expires_at,
                "expires_in": expires_in,
            })
        }
        Err(AuthError::InvalidGrant { .. }) => json!({ "active": false }),
        Err(e) => return Err(e.into()),
    };
    print_value(&value, ctx.format)
}

pub async fn revoke(ctx: &Context, token: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let mut auth = factory.authorization(OAuth2Parameters::default());
    auth.revoke(token).await?;
    print_success("Token revoked");
    Ok(())
}
