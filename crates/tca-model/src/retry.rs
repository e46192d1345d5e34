//! Bounded exponential-backoff retry
//!
//! [`RetryExecutor`] wraps a single remote call. Transient failures are retried
//! after `initial_delay × multiplier^attempt`; anything else propagates at once.
//! A call is attempted at most `max_retries + 1` times.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Errors that can tell whether another attempt may succeed
pub trait Transient {
    /// True if the failure is temporary
    fn is_transient(&self) -> bool;
}

impl Transient for ModelError {
    fn is_transient(&self) -> bool {
        ModelError::is_transient(self)
    }
}

/// Suspension between attempts
///
/// Production code sleeps on the tokio timer; tests substitute a recorder.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff multiplier
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Create policy with default backoff multiplier (2)
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_ms: u64::try_from(initial_delay.as_millis()).unwrap_or(u64::MAX),
            multiplier: 2,
        }
    }

    /// Policy that never retries
    #[inline]
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// With backoff multiplier
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier)
            .checked_pow(attempt)
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.initial_delay_ms.saturating_mul(factor))
    }

    /// Every delay the policy can incur, in order
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for(attempt))
    }

    /// Upper bound on time spent sleeping before the last error propagates
    #[must_use]
    pub fn worst_case_delay(&self) -> Duration {
        self.delays().fold(Duration::ZERO, Duration::saturating_add)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 5_000,
            multiplier: 2,
        }
    }
}

/// Executes calls under a [`RetryPolicy`]
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Create executor sleeping on the tokio timer
    #[inline]
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    /// Create executor with custom sleeper
    #[inline]
    #[must_use]
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Get policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds, fails fatally, or retries run out
    ///
    /// # Errors
    /// - The first non-transient error, immediately
    /// - The last transient error once `max_retries` retries are spent
    pub async fn execute<T, E, F, Fut>(&self, mut call: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(attempts = attempt + 1, error = %err, "retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Sleeper for Recorder {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    fn executor(max_retries: u32) -> (RetryExecutor, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let policy = RetryPolicy::new(max_retries, Duration::from_millis(5_000));
        (RetryExecutor::with_sleeper(policy, recorder.clone()), recorder)
    }

    fn unavailable() -> ModelError {
        ModelError::classify(Some(503), "Service unavailable")
    }

    #[test]
    fn policy_doubles_delay() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20)
            ]
        );
        assert_eq!(policy.worst_case_delay(), Duration::from_secs(35));
    }

    #[test]
    fn policy_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(80, Duration::from_secs(1));
        assert_eq!(policy.delay_for(70), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let (executor, recorder) = executor(3);
        let calls = AtomicU32::new(0);

        let result: Result<&str, ModelError> = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(unavailable())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let slept = recorder.slept.lock().unwrap().clone();
        assert_eq!(slept.len(), 3);
        assert!(slept.windows(2).all(|w| w[1] == w[0] * 2));
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let (executor, recorder) = executor(3);
        let calls = AtomicU32::new(0);

        let result: Result<(), ModelError> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ModelError::classify(Some(401), "unauthorized")) }
            })
            .await;

        assert!(matches!(result, Err(ModelError::Fatal { status: Some(401), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(recorder.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let (executor, recorder) = executor(2);
        let calls = AtomicU32::new(0);

        let result: Result<(), ModelError> = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(ModelError::Transient {
                        message: format!("503 #{n}"),
                    })
                }
            })
            .await;

        assert_eq!(
            result,
            Err(ModelError::Transient {
                message: "503 #2".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_advances_timer() {
        let executor = RetryExecutor::new(RetryPolicy::new(1, Duration::from_secs(5)));
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let _: Result<(), ModelError> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(unavailable()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
