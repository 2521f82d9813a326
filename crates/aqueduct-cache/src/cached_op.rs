use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use aqueduct_core::{AqueductError, TaskArgs, TaskCache, TaskOp};

use crate::key::cache_key;

/// Default entry lifetime: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

type InFlightMap = Mutex<HashMap<String, Arc<Mutex<()>>>>;

/// Wraps a [`TaskOp`] with response caching.
///
/// On each call the wrapper derives a key from the operation name and
/// arguments, serves a stored result when one is present and decodes to a
/// JSON object, and otherwise invokes the inner operation and stores its
/// result with the configured TTL. Results served from the store carry
/// `"cached": true`.
///
/// The cache is a performance layer, never a correctness dependency: any
/// failure in it — unreachable store, undecodable entry, entry that is not an
/// object — is logged and degrades to computing the result directly. Errors
/// from the inner operation are never stored and propagate unchanged.
///
/// Without single-flight, two concurrent calls for the same key during a miss
/// both compute and both write, last write wins. The wrapped operations are
/// pure functions of their input, so this race is accepted rather than locked
/// away; [`CachedOp::with_single_flight`] opts into per-key de-duplication
/// where the duplicate remote calls are worth avoiding.
pub struct CachedOp {
    inner: Arc<dyn TaskOp>,
    cache: Arc<dyn TaskCache>,
    ttl: Duration,
    in_flight: Option<InFlightMap>,
}

impl CachedOp {
    pub fn new(inner: Arc<dyn TaskOp>, cache: Arc<dyn TaskCache>) -> Self {
        Self {
            inner,
            cache,
            ttl: DEFAULT_TTL,
            in_flight: None,
        }
    }

    /// Override the per-entry TTL for this operation's cache namespace.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Share one in-progress computation among concurrent callers with the
    /// same key instead of letting each compute independently.
    pub fn with_single_flight(mut self) -> Self {
        self.in_flight = Some(Mutex::new(HashMap::new()));
        self
    }

    /// Drop every cached entry in this operation's namespace.
    pub async fn invalidate(&self) -> Result<(), AqueductError> {
        self.cache
            .clear_prefix(&format!("{}:", self.inner.name()))
            .await
    }

    async fn lookup_or_compute(
        &self,
        key: &str,
        args: TaskArgs,
    ) -> Result<Value, AqueductError> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(mut map)) => {
                    tracing::debug!(key, "cache hit");
                    map.insert("cached".to_string(), Value::Bool(true));
                    return Ok(Value::Object(map));
                }
                Ok(_) => {
                    tracing::warn!(key, "cached value is not an object, recomputing");
                }
                Err(error) => {
                    tracing::warn!(key, %error, "undecodable cache entry, recomputing");
                }
            },
            Ok(None) => {
                tracing::debug!(key, "cache miss");
            }
            Err(error) => {
                tracing::warn!(key, %error, "cache read failed, recomputing");
            }
        }

        let result = self.inner.run(args).await?;

        match serde_json::to_string(&result) {
            Ok(raw) => {
                if let Err(error) = self.cache.put(key, &raw, self.ttl).await {
                    tracing::warn!(key, %error, "cache write failed, returning fresh result");
                }
            }
            Err(error) => {
                tracing::warn!(key, %error, "result not serializable, skipping cache");
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl TaskOp for CachedOp {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError> {
        let key = match cache_key(self.inner.name(), &args) {
            Ok(key) => key,
            Err(error) => {
                tracing::warn!(op = self.inner.name(), %error, "cache key derivation failed, bypassing cache");
                return self.inner.run(args).await;
            }
        };

        let Some(in_flight) = &self.in_flight else {
            return self.lookup_or_compute(&key, args).await;
        };

        let gate = {
            let mut map = in_flight.lock().await;
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = gate.lock().await;
        let result = self.lookup_or_compute(&key, args).await;
        drop(guard);

        // Drop the gate once no other caller is waiting on it. `gate` is
        // still held here, so a count of two means map entry + us.
        let mut map = in_flight.lock().await;
        if let Some(existing) = map.get(&key) {
            if Arc::strong_count(existing) <= 2 {
                map.remove(&key);
            }
        }

        result
    }
}
