use std::io::BufRead;

use anyhow::Context as _;
use serde_json::{Value, json};

use super::Context;
use crate::output::{print_success, print_value};

/// Environment variable holding the password for `user create`.
pub const PASSWORD_ENV: &str = "KEYSTASH_USER_PASSWORD";

pub async fn create(ctx: &Context, username: &str, password_stdin: bool) -> anyhow::Result<()> {
    let password = if password_stdin {
        read_password(std::io::stdin().lock())?
    } else {
        std::env::var(PASSWORD_ENV)
            .with_context(|| format!("set {PASSWORD_ENV} or pass --password-stdin"))?
    };
    if password.is_empty() {
        anyhow::bail!("the password must not be empty");
    }

    let factory = ctx.factory().await?;
    factory.create_user(username, &password).await?;
    print_success(&format!("Created user {username}"));
    Ok(())
}

pub async fn delete(ctx: &Context, username: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let mut user = factory.load_user(username).await?;
    if !user.is_loaded() {
        anyhow::bail!("user '{username}' not found");
    }
    user.destroy().await?;
    print_success(&format!("Deleted user {username}"));
    Ok(())
}

pub async fn consents(ctx: &Context, username: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let user = factory.load_user(username).await?;
    if !user.is_loaded() {
        anyhow::bail!("user '{username}' not found");
    }

    let mut rows = Vec::new();
    for client_id in user.consented_clients().await? {
        let scope = user.consent_scope(&client_id).await?.unwrap_or_default();
        rows.push(json!({ "client_id": client_id, "scope": scope }));
    }
    print_value(&Value::Array(rows), ctx.format)
}

// First line of `input`, without its line ending.
fn read_password(mut input: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read the password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
