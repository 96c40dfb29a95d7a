pub mod client;
pub mod demo;
pub mod keys;
pub mod token;
pub mod user;

use std::sync::Arc;

use anyhow::Context as _;
use keystash_auth::OAuth2Factory;
use keystash_cache::{CacheBackendKind, CacheHandler, create_cache_handler};

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::output::print_warning;

/// What every command runs against.
pub struct Context {
    pub config: AppConfig,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config: AppConfig, format: OutputFormat) -> Self {
        Self { config, format }
    }

    /// Connects to the configured cache.
    pub async fn cache(&self) -> anyhow::Result<Arc<dyn CacheHandler>> {
        if self.config.cache.backend == CacheBackendKind::Memory {
            print_warning("memory backend: records are discarded when this command exits");
        }
        create_cache_handler(&self.config.cache)
            .await
            .context("failed to open the cache")
    }

    /// Builds a factory over the configured cache.
    pub async fn factory(&self) -> anyhow::Result<OAuth2Factory> {
        if self.config.auth.secret_key.is_empty() {
            anyhow::bail!("auth.secret_key is not set (use KEYSTASH__AUTH__SECRET_KEY)");
        }
        let cache = self.cache().await?;
        Ok(OAuth2Factory::with_cache(cache, Arc::new(self.config.auth.clone()))?)
    }
}
