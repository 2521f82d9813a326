//! Retry with exponential backoff for task operations.
//!
//! [`RetryingOp`] wraps any [`TaskOp`] and re-drives it on transient failure:
//! timeouts, rate limits, connection failures, and server errors are retried
//! up to a bound with exponentially growing, jittered delays; everything else
//! propagates immediately. Only the calling task sleeps between attempts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;

use aqueduct_core::{AqueductError, FailureKind, TaskArgs, TaskOp};

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_JITTER: f64 = 0.1;

/// Substrings that mark an otherwise-unclassified error as transient.
///
/// Fallback for collaborators that surface provider errors as opaque strings
/// rather than mapped [`FailureKind`]s.
const RETRYABLE_MARKERS: &[&str] = &[
    "timeout",
    "rate limit",
    "exceeded",
    "server error",
    "connection",
    "503",
    "429",
];

/// Shape of the backoff curve and the retry bound.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `3` means four total attempts.
    pub max_retries: usize,
    pub base_delay: Duration,
    /// Cap applied to the pre-jitter delay.
    pub max_delay: Duration,
    /// Jitter fraction: the final delay is perturbed by a uniform draw in
    /// `[-jitter, +jitter] * delay`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the environment, falling back to defaults for any
    /// variable that is unset or unparseable.
    ///
    /// Recognized variables: `OPENAI_MAX_RETRIES`, `OPENAI_RETRY_DELAY_BASE`
    /// (seconds), `OPENAI_RETRY_DELAY_MAX` (seconds), `OPENAI_RETRY_JITTER`.
    pub fn from_env() -> Self {
        Self {
            max_retries: env_parse("OPENAI_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            base_delay: Duration::from_secs_f64(env_parse(
                "OPENAI_RETRY_DELAY_BASE",
                DEFAULT_BASE_DELAY.as_secs_f64(),
            )),
            max_delay: Duration::from_secs_f64(env_parse(
                "OPENAI_RETRY_DELAY_MAX",
                DEFAULT_MAX_DELAY.as_secs_f64(),
            )),
            jitter: env_parse("OPENAI_RETRY_JITTER", DEFAULT_JITTER),
        }
    }

    /// Pre-jitter delay for a 1-based attempt number:
    /// `min(max_delay, base_delay * 2^(attempt-1))`.
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.base_delay.as_secs_f64() * 2f64.powi(exp);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff delay with a uniform jitter draw applied, floored at zero.
    pub fn jittered_delay(&self, attempt: usize) -> Duration {
        let delay = self.backoff_delay(attempt).as_secs_f64();
        let perturbed = if self.jitter > 0.0 {
            delay + delay * self.jitter * rand::rng().random_range(-1.0..=1.0)
        } else {
            delay
        };
        Duration::from_secs_f64(perturbed.max(0.0))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Default retryability classification: transient failure kinds first, then
/// the message-marker heuristic for unclassified errors.
pub fn is_retryable(error: &AqueductError) -> bool {
    if error.failure_kind() != FailureKind::Other {
        return true;
    }
    let message = error.to_string().to_lowercase();
    RETRYABLE_MARKERS.iter().any(|m| message.contains(m))
}

/// Callback invoked before each retry with the 1-based attempt number that
/// just failed and the error it failed with.
pub type OnRetry = Arc<dyn Fn(usize, &AqueductError) + Send + Sync>;

/// Wraps a [`TaskOp`] with transparent retry.
pub struct RetryingOp {
    inner: Arc<dyn TaskOp>,
    policy: RetryPolicy,
    retryable_kinds: Option<Vec<FailureKind>>,
    on_retry: Option<OnRetry>,
}

impl RetryingOp {
    pub fn new(inner: Arc<dyn TaskOp>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            retryable_kinds: None,
            on_retry: None,
        }
    }

    /// Restrict retry to an explicit set of failure kinds, disabling the
    /// default classification (including the message heuristic).
    pub fn with_retryable_kinds(mut self, kinds: Vec<FailureKind>) -> Self {
        self.retryable_kinds = Some(kinds);
        self
    }

    pub fn with_on_retry(mut self, on_retry: OnRetry) -> Self {
        self.on_retry = Some(on_retry);
        self
    }

    fn should_retry(&self, error: &AqueductError) -> bool {
        match &self.retryable_kinds {
            Some(kinds) => kinds.contains(&error.failure_kind()),
            None => is_retryable(error),
        }
    }
}

#[async_trait]
impl TaskOp for RetryingOp {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, args: TaskArgs) -> Result<Value, AqueductError> {
        let mut last_error = None;
        for attempt in 1..=self.policy.max_retries + 1 {
            match self.inner.run(args.clone()).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.should_retry(&error) || attempt > self.policy.max_retries {
                        tracing::warn!(
                            op = self.inner.name(),
                            attempt,
                            kind = ?error.failure_kind(),
                            error = %error,
                            "not retryable or retries exhausted"
                        );
                        return Err(error);
                    }
                    let delay = self.policy.jittered_delay(attempt);
                    tracing::warn!(
                        op = self.inner.name(),
                        attempt,
                        max_retries = self.policy.max_retries,
                        kind = ?error.failure_kind(),
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    if let Some(on_retry) = &self.on_retry {
                        on_retry(attempt, &error);
                    }
                    last_error = Some(error);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        // Unreachable: every iteration either returns the result or returns
        // the error on its final attempt.
        Err(last_error
            .unwrap_or_else(|| AqueductError::Internal("retry loop exited without a result".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let policy = RetryPolicy {
            max_retries: 8,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: 0.0,
        };
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay >= previous, "delay decreased at attempt {attempt}");
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(policy.backoff_delay(8), policy.max_delay);
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(5), Duration::from_secs(10));
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: 0.25,
            ..RetryPolicy::default()
        };
        for attempt in 1..=4 {
            let base = policy.backoff_delay(attempt).as_secs_f64();
            for _ in 0..64 {
                let jittered = policy.jittered_delay(attempt).as_secs_f64();
                assert!(jittered >= base * 0.75 - f64::EPSILON);
                assert!(jittered <= base * 1.25 + f64::EPSILON);
            }
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.jittered_delay(2), policy.backoff_delay(2));
    }

    #[test]
    fn message_heuristic_classifies_opaque_errors() {
        assert!(is_retryable(&AqueductError::Upstream(
            "503 Service Unavailable".into()
        )));
        assert!(is_retryable(&AqueductError::Upstream(
            "quota exceeded for this key".into()
        )));
        assert!(!is_retryable(&AqueductError::Upstream(
            "invalid request payload".into()
        )));
        assert!(!is_retryable(&AqueductError::MissingParameter("text".into())));
    }

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(is_retryable(&AqueductError::Timeout("t".into())));
        assert!(is_retryable(&AqueductError::RateLimit("r".into())));
        assert!(is_retryable(&AqueductError::Connection("c".into())));
        assert!(is_retryable(&AqueductError::Server("s".into())));
    }

    #[test]
    fn policy_reads_environment_overrides() {
        std::env::set_var("OPENAI_MAX_RETRIES", "5");
        std::env::set_var("OPENAI_RETRY_DELAY_BASE", "0.5");
        std::env::set_var("OPENAI_RETRY_DELAY_MAX", "20");
        std::env::set_var("OPENAI_RETRY_JITTER", "0.2");
        let policy = RetryPolicy::from_env();
        std::env::remove_var("OPENAI_MAX_RETRIES");
        std::env::remove_var("OPENAI_RETRY_DELAY_BASE");
        std::env::remove_var("OPENAI_RETRY_DELAY_MAX");
        std::env::remove_var("OPENAI_RETRY_JITTER");

        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(20));
        assert!((policy.jitter - 0.2).abs() < f64::EPSILON);
    }
}
