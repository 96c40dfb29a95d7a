use keystash_auth::{Client, OAuth2Factory};
use serde_json::{Value, json};

use super::Context;
use crate::cli::RegisterArgs;
use crate::output::{print_success, print_value};

pub async fn register(ctx: &Context, args: &RegisterArgs) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let client = factory
        .register_client(&args.name, args.redirect_uris.clone(), args.grant_types.clone())
        .await?;

    let mut value = describe(&client);
    value["client_secret"] = json!(client.secret());
    print_value(&value, ctx.format)?;
    print_success(&format!(
        "Registered client {}; store the secret now, it is not shown again",
        client.id()
    ));
    Ok(())
}

pub async fn show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let client = load(&factory, id).await?;
    print_value(&describe(&client), ctx.format)
}

pub async fn list(ctx: &Context) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let mut rows = Vec::new();
    for id in factory.client_ids().await? {
        let client = factory.load_client(&id).await?;
        // Deleted between the scan and the load.
        if client.is_loaded() {
            rows.push(describe(&client));
        }
    }
    print_value(&Value::Array(rows), ctx.format)
}

pub async fn delete(ctx: &Context, id: &str) -> anyhow::Result<()> {
    let factory = ctx.factory().await?;
    let mut client = load(&factory, id).await?;
    client.destroy().await?;
    print_success(&format!("Deleted client {id}"));
    Ok(())
}

async fn load(factory: &OAuth2Factory, id: &str) -> anyhow::Result<Client> {
    let client = factory.load_client(id).await?;
    if !client.is_loaded() {
        anyhow::bail!("client '{id}' not found");
    }
    Ok(client)
}

fn describe(client: &Client) -> Value {
    json!({
        "client_id": client.id(),
        "name": client.name(),
        "redirect_uris": client.redirect_uris(),
        "grant_types": client.grant_types(),
    })
}
