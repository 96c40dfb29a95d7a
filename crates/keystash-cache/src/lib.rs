//! # keystash-cache
//!
//! Key-value storage for Keystash credentials.
//!
//! A record is addressed by a string key and holds either a scalar value or a
//! map of named fields. The [`CacheHandler`] trait is implemented by two
//! interchangeable backends:
//!
//! - [`MemoryCache`] - process-local map behind a single lock
//! - [`RedisCache`] - shared Redis instance through a connection pool
//!
//! Use [`create_cache_handler`] to pick the backend from configuration.

pub mod config;
pub mod error;
pub mod handler;
pub mod iter;
pub mod memory;
pub mod pattern;
pub mod redis_cache;

use std::sync::Arc;

pub use config::{CacheBackendKind, CacheConfig, RedisConfig};
pub use error::{CacheError, CacheResult};
pub use handler::{CacheHandler, SCALAR_FIELD};
pub use iter::KeyIterator;
pub use memory::MemoryCache;
pub use pattern::{GlobPattern, has_wildcard};
pub use redis_cache::RedisCache;

/// Create a cache handler based on configuration.
///
/// A Redis backend that cannot be reached is an error. Falling back to the
/// in-process map would split credential state between processes.
///
/// # Errors
///
/// Returns `CacheError::Configuration` for invalid settings and
/// `CacheError::Unavailable` if Redis does not answer.
pub async fn create_cache_handler(config: &CacheConfig) -> CacheResult<Arc<dyn CacheHandler>> {
    config.validate().map_err(CacheError::configuration)?;

    match config.backend {
        CacheBackendKind::Memory => {
            tracing::info!("Using in-memory cache backend");
            Ok(Arc::new(MemoryCache::new()))
        }
        CacheBackendKind::Redis => {
            tracing::info!(url = %config.redis.url, "Connecting to Redis");
            let cache = RedisCache::connect(&config.redis).await?;
            Ok(Arc::new(cache))
        }
    }
}
