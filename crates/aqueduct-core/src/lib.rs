use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TaskArgs — canonical call arguments
// ---------------------------------------------------------------------------

/// Arguments for a task operation: positional values plus keyword values.
///
/// Keyword arguments live in a `BTreeMap`, so their serialized form is always
/// key-sorted regardless of insertion order. Cache keys derived from two
/// `TaskArgs` built with the same content are therefore identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional: Vec<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keyword: BTreeMap<String, Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Look up a keyword argument as a string slice.
    pub fn keyword_str(&self, name: &str) -> Option<&str> {
        self.keyword.get(name).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Aqueduct with variants covering all subsystems.
#[derive(Debug, Error)]
pub enum AqueductError {
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("rate limit: {0}")]
    RateLimit(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("server error: {0}")]
    Server(String),
    /// Non-transient remote failure (bad request, auth failure, content filter).
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Closed set of failure tags the retry policy operates on.
///
/// Collaborator errors are mapped into this set at the boundary; the retry
/// layer never inspects a remote client's own error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    RateLimited,
    ConnectionFailed,
    ServerError,
    Other,
}

impl AqueductError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AqueductError::Timeout(_) => FailureKind::Timeout,
            AqueductError::RateLimit(_) => FailureKind::RateLimited,
            AqueductError::Connection(_) => FailureKind::ConnectionFailed,
            AqueductError::Server(_) => FailureKind::ServerError,
            _ => FailureKind::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Core traits
// ---------------------------------------------------------------------------

/// An asynchronous task operation over user text.
///
/// Implementations are pure functions of their arguments: calling `run` twice
/// with equal `TaskArgs` yields structurally equal results (modulo remote
/// nondeterminism), which is what makes response caching sound. Results are
/// JSON objects.
#[async_trait]
pub trait TaskOp: Send + Sync {
    /// Logical operation name, used to namespace cache keys.
    fn name(&self) -> &str;

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError>;
}

/// Liveness report for a cache backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub healthy: bool,
    pub detail: String,
}

/// A shared key-value backing store for task responses.
///
/// Stores hold serialized JSON strings and own expiry: an entry written with a
/// TTL is simply absent once the TTL elapses. Implementations live in
/// `aqueduct-cache` (in-memory) and `aqueduct-redis`.
#[async_trait]
pub trait TaskCache: Send + Sync {
    /// Look up a raw cached value.
    async fn get(&self, key: &str) -> Result<Option<String>, AqueductError>;

    /// Store a raw value with a time-to-live.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AqueductError>;

    /// Delete all entries whose keys start with `prefix`.
    async fn clear_prefix(&self, prefix: &str) -> Result<(), AqueductError>;

    /// Delete every entry in the store.
    async fn clear_all(&self) -> Result<(), AqueductError>;

    /// Liveness probe. Never fails; connectivity problems are reported in the
    /// returned [`CacheHealth`].
    async fn ping(&self) -> CacheHealth;
}

/// Default timeout applied to a single remote AI call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote AI collaborator: a rate-limited, occasionally-unavailable
/// completion endpoint.
///
/// Implementations map their transport's failures into [`AqueductError`]
/// variants at this boundary (timeout, rate limit, connection, server error)
/// and carry their own per-call timeout, [`DEFAULT_REMOTE_TIMEOUT`] unless
/// configured otherwise.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Identifier of the underlying model, echoed into task results.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, AqueductError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyword_args_serialize_key_sorted() {
        let a = TaskArgs::new().kwarg("text", "hi").kwarg("lang", "en");
        let b = TaskArgs::new().kwarg("lang", "en").kwarg("text", "hi");
        assert_eq!(
            serde_json::to_string(&a.keyword).unwrap(),
            serde_json::to_string(&b.keyword).unwrap()
        );
    }

    #[test]
    fn keyword_str_returns_only_strings() {
        let args = TaskArgs::new().kwarg("text", "hello").kwarg("count", 3);
        assert_eq!(args.keyword_str("text"), Some("hello"));
        assert_eq!(args.keyword_str("count"), None);
        assert_eq!(args.keyword_str("missing"), None);
    }

    #[test]
    fn failure_kind_maps_transient_variants() {
        assert_eq!(
            AqueductError::Timeout("t".into()).failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            AqueductError::RateLimit("r".into()).failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            AqueductError::Connection("c".into()).failure_kind(),
            FailureKind::ConnectionFailed
        );
        assert_eq!(
            AqueductError::Server("s".into()).failure_kind(),
            FailureKind::ServerError
        );
        assert_eq!(
            AqueductError::Upstream("u".into()).failure_kind(),
            FailureKind::Other
        );
        assert_eq!(
            AqueductError::MissingParameter("text".into()).failure_kind(),
            FailureKind::Other
        );
    }

    #[test]
    fn positional_args_preserve_order() {
        let args = TaskArgs::new().arg("first").arg(json!({"k": 1}));
        assert_eq!(args.positional[0], json!("first"));
        assert_eq!(args.positional[1], json!({"k": 1}));
    }
}
