use serde_json::Value;

use super::Context;
use crate::output::print_value;

pub async fn list(ctx: &Context, pattern: &str) -> anyhow::Result<()> {
    let cache = ctx.cache().await?;
    let keys: Vec<Value> = cache.keys(pattern).await?.map(Value::String).collect();
    print_value(&Value::Array(keys), ctx.format)
}
