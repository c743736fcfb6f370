//! Retry orchestration with exponential backoff and jitter
//!
//! Runs a fallible operation up to a configured number of additional
//! times, waiting between attempts without blocking a thread. Which
//! failures are worth retrying is decided by kind, not by message
//! matching.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use snipd_error::{ErrorKind, SnipdError};

use crate::event_log::{EventLog, LogLevel};

/// Retry behaviour for one class of operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first (0 = run once)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap applied to exponentially grown delays
    pub max_delay: Duration,
    /// Double the delay after each failed attempt
    pub exponential_backoff: bool,
    /// Perturb each delay to avoid synchronized retries
    pub jitter: bool,
    /// Jitter magnitude as a fraction of the base delay (0.05 = ±5%)
    pub jitter_factor: f64,
    /// Error kinds eligible for retry
    pub retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            exponential_backoff: true,
            jitter: true,
            jitter_factor: 0.05,
            retryable_kinds: Self::default_retryable_kinds(),
        }
    }
}

impl RetryConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds retried unless the caller overrides the set.
    pub fn default_retryable_kinds() -> HashSet<ErrorKind> {
        [
            ErrorKind::Network,
            ErrorKind::StorageAccess,
            ErrorKind::SyncConflict,
        ]
        .into_iter()
        .collect()
    }

    /// Set the number of additional attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable exponential growth
    pub fn with_exponential_backoff(mut self, exponential: bool) -> Self {
        self.exponential_backoff = exponential;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the jitter magnitude (clamped to 0.0..=1.0)
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Replace the retryable kind set
    pub fn with_retryable_kinds(mut self, kinds: HashSet<ErrorKind>) -> Self {
        self.retryable_kinds = kinds;
        self
    }

    /// Add one retryable kind
    pub fn retry_on(mut self, kind: ErrorKind) -> Self {
        self.retryable_kinds.insert(kind);
        self
    }

    /// Create a config for fast, frequent retries
    pub fn aggressive() -> Self {
        Self::default()
            .with_max_retries(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
    }

    /// Create a config for slow, sparse retries
    pub fn conservative() -> Self {
        Self::default()
            .with_max_retries(2)
            .with_initial_delay(Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(60))
    }

    /// Base delay before the retry that follows 0-indexed `attempt`.
    ///
    /// `min(initial * 2^attempt, max)` when exponential, otherwise the
    /// initial delay unchanged.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.initial_delay;
        }
        let initial = self.initial_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(initial.saturating_mul(factor).min(max))
    }

    /// Perturb a delay by up to ±`jitter_factor`, truncating to whole
    /// milliseconds and never going negative.
    pub fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || self.jitter_factor <= 0.0 {
            return delay;
        }
        let mut rng = rand::thread_rng();
        let offset = rng.gen_range(-self.jitter_factor..=self.jitter_factor);
        let ms = delay.as_millis() as f64 * (1.0 + offset);
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Record of one attempt inside a retry run.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Delay slept after this attempt failed (zero for the last or a
    /// successful attempt)
    pub delay: Duration,
    /// The failure, when the attempt failed
    pub error: Option<SnipdError>,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a full retry run.
#[derive(Debug)]
pub struct RetryResult<T> {
    /// Whether any attempt succeeded
    pub success: bool,
    /// The produced value, on success
    pub value: Option<T>,
    /// The final attempt's error, on failure
    pub error: Option<SnipdError>,
    /// Every attempt, in order
    pub attempts: Vec<RetryAttempt>,
    /// Wall-clock time for the whole run, waits included
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    /// Convert into a plain `Result`, discarding attempt history.
    pub fn into_result(self) -> snipd_error::Result<T> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(SnipdError::unknown_failure()),
        }
    }
}

/// Executes operations under a [`RetryConfig`], recording every attempt
/// in the shared event log.
#[derive(Clone)]
pub struct RetryExecutor {
    log: Arc<EventLog>,
}

impl RetryExecutor {
    /// Create an executor recording into the given log.
    pub fn new(log: Arc<EventLog>) -> Self {
        Self { log }
    }

    /// Run `operation` up to `max_retries + 1` times.
    ///
    /// Success returns immediately. A failure whose kind is not in
    /// `retryable_kinds`, or whose `recoverable` flag is false, aborts the
    /// run regardless of remaining budget. The delay slept after a failed
    /// attempt is written back onto that attempt's record.
    pub async fn execute<F, Fut, T, E>(
        &self,
        name: &str,
        config: &RetryConfig,
        mut operation: F,
    ) -> RetryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<SnipdError>,
    {
        let started = Instant::now();
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    attempts.push(RetryAttempt {
                        attempt: attempt + 1,
                        delay: Duration::ZERO,
                        error: None,
                        timestamp: Utc::now(),
                    });
                    if attempt > 0 {
                        tracing::debug!(
                            operation = name,
                            attempt = attempt + 1,
                            "operation succeeded after retry"
                        );
                    }
                    return RetryResult {
                        success: true,
                        value: Some(value),
                        error: None,
                        attempts,
                        total_duration: started.elapsed(),
                    };
                }
                Err(e) => {
                    let error: SnipdError = e.into();
                    attempts.push(RetryAttempt {
                        attempt: attempt + 1,
                        delay: Duration::ZERO,
                        error: Some(error.clone()),
                        timestamp: Utc::now(),
                    });
                    self.log
                        .append(
                            LogLevel::from_severity(error.severity),
                            format!(
                                "Operation '{}' failed (attempt {}/{}): {}",
                                name,
                                attempt + 1,
                                config.max_retries + 1,
                                error.message
                            ),
                            Some(error.clone()),
                            None,
                            None,
                        )
                        .await;

                    let retryable =
                        error.recoverable && config.retryable_kinds.contains(&error.kind);
                    if !retryable {
                        tracing::debug!(
                            operation = name,
                            kind = %error.kind,
                            recoverable = error.recoverable,
                            "failure is not retryable, aborting"
                        );
                        return Self::failure(error, attempts, started);
                    }
                    if attempt == config.max_retries {
                        tracing::warn!(
                            operation = name,
                            attempts = attempts.len(),
                            "retries exhausted"
                        );
                        return Self::failure(error, attempts, started);
                    }

                    let delay = config.apply_jitter(config.base_delay(attempt));
                    let index = attempts.len() - 1;
                    let recorded = attempts[index].clone();
                    attempts[index] = RetryAttempt { delay, ..recorded };

                    tracing::debug!(
                        operation = name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "waiting before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn failure<T>(
        error: SnipdError,
        attempts: Vec<RetryAttempt>,
        started: Instant,
    ) -> RetryResult<T> {
        RetryResult {
            success: false,
            value: None,
            error: Some(error),
            attempts,
            total_duration: started.elapsed(),
        }
    }
}
