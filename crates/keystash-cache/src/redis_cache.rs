//! Redis cache backend.
//!
//! Every record is a Redis hash. Scalars live in the [`SCALAR_FIELD`] field so
//! the record shape matches the in-process backend.
//!
//! Each trait method maps onto a single Redis command, except wildcard
//! destroys, which scan for matching keys and then issue one `DEL`. A record
//! written after the scan but before the `DEL` survives.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::handler::{CacheHandler, SCALAR_FIELD};
use crate::iter::KeyIterator;
use crate::pattern::GlobPattern;
use crate::{CacheError, CacheResult};

/// Cache backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RedisCache {
    /// Wraps an existing pool without checking connectivity.
    #[must_use]
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and verifies the server answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if the pool cannot be built and
    /// `CacheError::Unavailable` if the server cannot be reached.
    pub async fn connect(config: &RedisConfig) -> CacheResult<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::configuration(format!("redis pool: {e}")))?;

        let cache = Self::from_pool(pool);
        let mut conn = cache.conn().await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        tracing::info!(url = %config.url, pool_size = config.pool_size, "Connected to Redis");
        Ok(cache)
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            CacheError::from(e)
        })
    }

    async fn scan(conn: &mut Connection, pattern: &GlobPattern) -> CacheResult<Vec<String>> {
        let mut keys = Vec::new();
        {
            let mut iter: redis::AsyncIter<'_, String> =
                conn.scan_match(pattern.to_redis_match()).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }
        // SCAN may return a key more than once; the local filter also guards
        // against differences between Redis glob rules and ours.
        keys.retain(|k| pattern.matches(k));
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl CacheHandler for RedisCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn field_exists(&self, key: &str, field: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.hexists(key, field).await?)
    }

    async fn read(&self, key: &str) -> CacheResult<String> {
        self.read_field(key, SCALAR_FIELD).await
    }

    async fn read_field(&self, key: &str, field: &str) -> CacheResult<String> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.hget(key, field).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis HGET error");
            CacheError::from(e)
        })?;
        Ok(value.unwrap_or_default())
    }

    async fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        self.write_field(key, SCALAR_FIELD, value).await
    }

    async fn write_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis HSET error");
                CacheError::from(e)
            })
    }

    async fn write_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        conn.hset_nx(key, field, value).await.map_err(|e| {
            tracing::warn!(key = %key, error = %e, "Redis HSETNX error");
            CacheError::from(e)
        })
    }

    async fn destroy(&self, key: &str) -> CacheResult<()> {
        let pattern = GlobPattern::compile(key);
        let mut conn = self.conn().await?;

        if !pattern.is_wildcard() {
            conn.del::<_, ()>(key).await?;
            return Ok(());
        }

        let keys = Self::scan(&mut conn, &pattern).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await?;
        }
        tracing::debug!(pattern = %pattern, removed = keys.len(), "wildcard destroy");
        Ok(())
    }

    async fn destroy_field(&self, key: &str, field: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        conn.hdel::<_, _, ()>(key, field).await?;
        Ok(())
    }

    async fn rename(&self, old_key: &str, new_key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        match conn.rename::<_, _, ()>(old_key, new_key).await {
            Ok(()) => Ok(true),
            Err(e) if is_no_such_key(&e) => Ok(false),
            Err(e) => {
                tracing::warn!(key = %old_key, error = %e, "Redis RENAME error");
                Err(e.into())
            }
        }
    }

    async fn keys(&self, pattern: &str) -> CacheResult<KeyIterator> {
        let pattern = GlobPattern::compile(pattern);
        let mut conn = self.conn().await?;
        Ok(KeyIterator::new(Self::scan(&mut conn, &pattern).await?))
    }

    async fn fields(&self, key: &str) -> CacheResult<KeyIterator> {
        let mut conn = self.conn().await?;
        let mut fields: Vec<String> = conn.hkeys(key).await?;
        fields.retain(|f| f != SCALAR_FIELD);
        fields.sort_unstable();
        Ok(KeyIterator::new(fields))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

fn is_no_such_key(err: &redis::RedisError) -> bool {
    err.kind() == redis::ErrorKind::ResponseError
        && err.to_string().to_ascii_lowercase().contains("no such key")
}
