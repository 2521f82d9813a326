use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use aqueduct_core::{AqueductError, CacheHealth, TaskCache};

/// Batch size for SCAN-based prefix invalidation.
const SCAN_COUNT: usize = 100;

/// Configuration for [`RedisCache`].
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    pub host: String,
    pub port: u16,
    /// Logical database index.
    pub db: u32,
    /// TTL applied by call sites that don't override it per operation.
    pub default_ttl: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
            db: 0,
            default_ttl: Duration::from_secs(86_400),
        }
    }
}

impl RedisCacheConfig {
    /// Build a config from the environment, falling back to defaults for any
    /// variable that is unset or unparseable.
    ///
    /// Recognized variables: `REDIS_HOST`, `REDIS_PORT`, `REDIS_DB`,
    /// `REDIS_CACHE_TTL` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: env_parse("REDIS_PORT", defaults.port),
            db: env_parse("REDIS_DB", defaults.db),
            default_ttl: Duration::from_secs(env_parse(
                "REDIS_CACHE_TTL",
                defaults.default_ttl.as_secs(),
            )),
        }
    }

    /// Connection URL for this config.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Redis-backed implementation of the [`TaskCache`] trait.
///
/// Values are stored as serialized JSON strings; expiry is delegated to Redis
/// via `SETEX`, so reads never have to check timestamps themselves.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Create a new `RedisCache` with an existing Redis client.
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Create a new `RedisCache` from a configuration.
    pub fn from_config(config: &RedisCacheConfig) -> Result<Self, AqueductError> {
        Self::from_url(&config.url())
    }

    /// Create a new `RedisCache` from a Redis URL.
    pub fn from_url(url: &str) -> Result<Self, AqueductError> {
        let client = redis::Client::open(url)
            .map_err(|e| AqueductError::Cache(format!("failed to connect to Redis: {e}")))?;
        Ok(Self { client })
    }

    async fn get_connection(
        &self,
    ) -> Result<redis::aio::MultiplexedConnection, AqueductError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AqueductError::Cache(format!("Redis connection error: {e}")))
    }
}

#[async_trait]
impl TaskCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AqueductError> {
        let mut con = self.get_connection().await?;
        let raw: Option<String> = con
            .get(key)
            .await
            .map_err(|e| AqueductError::Cache(format!("Redis GET error: {e}")))?;
        Ok(raw)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AqueductError> {
        let mut con = self.get_connection().await?;
        // SETEX with a zero TTL is an error; clamp to one second.
        let seconds = ttl.as_secs().max(1);
        con.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| AqueductError::Cache(format!("Redis SETEX error: {e}")))?;
        Ok(())
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<(), AqueductError> {
        let mut con = self.get_connection().await?;
        let pattern = format!("{prefix}*");

        // Collect matching keys via SCAN in bounded batches, deleting each batch.
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut con)
                .await
                .map_err(|e| AqueductError::Cache(format!("Redis SCAN error: {e}")))?;

            if !keys.is_empty() {
                con.del::<_, ()>(&keys)
                    .await
                    .map_err(|e| AqueductError::Cache(format!("Redis DEL error: {e}")))?;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        tracing::debug!(prefix, "cleared cache namespace");
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), AqueductError> {
        let mut con = self.get_connection().await?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut con)
            .await
            .map_err(|e| AqueductError::Cache(format!("Redis FLUSHDB error: {e}")))?;
        Ok(())
    }

    async fn ping(&self) -> CacheHealth {
        let mut con = match self.get_connection().await {
            Ok(con) => con,
            Err(error) => {
                tracing::warn!(%error, "Redis health check failed");
                return CacheHealth {
                    healthy: false,
                    detail: error.to_string(),
                };
            }
        };
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut con).await;
        match pong {
            Ok(_) => CacheHealth {
                healthy: true,
                detail: "Redis connection OK".to_string(),
            },
            Err(error) => {
                tracing::warn!(%error, "Redis health check failed");
                CacheHealth {
                    healthy: false,
                    detail: error.to_string(),
                }
            }
        }
    }
}
