//! Cache backend configuration.

use serde::{Deserialize, Serialize};

/// Which backend stores cache records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Records live in process memory and vanish on exit.
    #[default]
    Memory,
    /// Records live in a shared Redis instance.
    Redis,
}

impl CacheBackendKind {
    /// Returns the configuration spelling of this backend.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl std::fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend selection. Default: memory
    pub backend: CacheBackendKind,

    /// Redis connection settings, used when `backend = "redis"`.
    pub redis: RedisConfig,
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Checks the configuration for values no backend can work with.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value found.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend == CacheBackendKind::Redis {
            if self.redis.url.trim().is_empty() {
                return Err("cache.redis.url is required when cache.backend = \"redis\"".into());
            }
            if self.redis.pool_size == 0 {
                return Err("cache.redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("cache.redis.timeout_ms must be > 0".into());
            }
        }
        Ok(())
    }
}
