//! Redis integration for Aqueduct.
//!
//! [`RedisCache`] implements the [`TaskCache`](aqueduct_core::TaskCache) trait
//! over a shared Redis instance: entries are stored with `SETEX` so expiry is
//! handled by Redis itself, prefix invalidation walks `SCAN`/`MATCH` in
//! bounded batches, and `ping` reports connectivity without failing.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use aqueduct_redis::{RedisCache, RedisCacheConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Host, port, db index and default TTL from REDIS_* environment variables.
//! let cache = RedisCache::from_config(&RedisCacheConfig::from_env())?;
//! # Ok(())
//! # }
//! ```

mod cache;

pub use cache::{RedisCache, RedisCacheConfig};

// Re-export core traits for convenience.
pub use aqueduct_core::{CacheHealth, TaskCache};
