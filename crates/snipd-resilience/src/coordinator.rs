//! Resilience coordinator
//!
//! Facade composing the taxonomy, event log, retry orchestrator, and
//! recovery registry. Failures enter here, get normalized exactly once,
//! and leave as structured results; statistics are always derived from
//! the log so they cannot drift from it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use snipd_error::{ErrorContext, ErrorKind, Severity, SnipdError};

use crate::event_log::{EventLog, EventLogConfig, LogEntry};
use crate::recovery::{RecoveryAction, RecoveryOutcome, RecoveryRegistry};
use crate::retry::{RetryConfig, RetryExecutor, RetryResult};

/// How a failure should be handled.
///
/// Every field has a documented default; callers override with the
/// builder methods (struct-update style, no option bags).
#[derive(Debug, Clone)]
pub struct HandlingOptions {
    /// Additional attempts after the first (default 0 = no retry)
    pub max_retries: u32,
    /// Delay before the first retry (default 1000 ms)
    pub retry_delay: Duration,
    /// Double the delay after each failed attempt (default true)
    pub exponential_backoff: bool,
    /// Record the failure in the event log (default true)
    pub log_errors: bool,
    /// Attempt automatic recovery before surfacing (default true)
    pub auto_recover: bool,
    /// Retryable kinds; `None` uses the default set
    /// {network, storage-access, sync-conflict}
    pub retryable_kinds: Option<HashSet<ErrorKind>>,
}

impl Default for HandlingOptions {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_millis(1000),
            exponential_backoff: true,
            log_errors: true,
            auto_recover: true,
            retryable_kinds: None,
        }
    }
}

impl HandlingOptions {
    /// Create options with the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of additional attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enable or disable exponential growth
    pub fn with_exponential_backoff(mut self, exponential: bool) -> Self {
        self.exponential_backoff = exponential;
        self
    }

    /// Enable or disable logging of handled failures
    pub fn with_log_errors(mut self, log_errors: bool) -> Self {
        self.log_errors = log_errors;
        self
    }

    /// Enable or disable automatic recovery
    pub fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    /// Override the retryable kind set
    pub fn with_retryable_kinds(mut self, kinds: HashSet<ErrorKind>) -> Self {
        self.retryable_kinds = Some(kinds);
        self
    }

    /// Build the retry configuration these options describe.
    pub fn retry_config(&self) -> RetryConfig {
        let mut config = RetryConfig::default()
            .with_max_retries(self.max_retries)
            .with_initial_delay(self.retry_delay)
            .with_exponential_backoff(self.exponential_backoff);
        if let Some(kinds) = &self.retryable_kinds {
            config = config.with_retryable_kinds(kinds.clone());
        }
        config
    }
}

/// Structured outcome handed back to the caller.
#[derive(Debug)]
pub struct HandlingResult<T> {
    /// Whether the operation produced a value or recovery resolved the
    /// failure
    pub success: bool,
    /// The operation's value, when one was produced
    pub value: Option<T>,
    /// The surfaced failure; never populated on success
    pub error: Option<SnipdError>,
    /// Whether automatic recovery ran
    pub recovery_attempted: bool,
    /// Outcome of the recovery attempt, when one ran
    pub recovery: Option<RecoveryOutcome>,
    /// Full retry history, when the retry orchestrator ran
    pub retry: Option<RetryResult<T>>,
}

/// Statistics derived from the event log's error-bearing entries.
#[derive(Debug, Clone)]
pub struct ErrorStats {
    /// Total error entries retained
    pub total: usize,
    /// Error counts grouped by severity
    pub by_severity: HashMap<Severity, usize>,
    /// Error counts grouped by kind
    pub by_kind: HashMap<ErrorKind, usize>,
    /// Most recent error entries (at most 10), oldest first
    pub recent: Vec<LogEntry>,
}

/// Facade over the resilience core.
///
/// Constructed explicitly and handed down by the application; the process
/// may keep exactly one alive for its lifetime, but that choice is the
/// caller's, not hidden static state.
pub struct ResilienceCoordinator {
    log: Arc<EventLog>,
    registry: Arc<RecoveryRegistry>,
    retry: RetryExecutor,
}

impl ResilienceCoordinator {
    /// Create a coordinator with a fresh log and empty registry.
    pub fn new(log_config: EventLogConfig) -> Self {
        let log = Arc::new(EventLog::new(log_config));
        let registry = Arc::new(RecoveryRegistry::new(log.clone()));
        let retry = RetryExecutor::new(log.clone());
        Self {
            log,
            registry,
            retry,
        }
    }

    /// Create with default log config.
    pub fn default_config() -> Self {
        Self::new(EventLogConfig::default())
    }

    /// Create from pre-built parts (dependency injection).
    pub fn from_parts(log: Arc<EventLog>, registry: Arc<RecoveryRegistry>) -> Self {
        let retry = RetryExecutor::new(log.clone());
        Self {
            log,
            registry,
            retry,
        }
    }

    /// The shared event log.
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// The shared recovery registry, for strategy registration.
    pub fn recovery(&self) -> &Arc<RecoveryRegistry> {
        &self.registry
    }

    /// Build a context naming the component and operation.
    pub fn create_context(
        component: impl Into<String>,
        operation: impl Into<String>,
    ) -> ErrorContext {
        ErrorContext::new(component, operation)
    }

    /// Normalize, log, and attempt recovery for a failure.
    ///
    /// Recovery success short-circuits: the result is a success and the
    /// original error is not surfaced. Retry never runs on this path.
    pub async fn handle_error<T>(
        &self,
        failure: impl Into<SnipdError>,
        context: Option<ErrorContext>,
        options: &HandlingOptions,
    ) -> HandlingResult<T> {
        let mut error: SnipdError = failure.into();
        if error.context.is_none() {
            if let Some(ctx) = context.clone() {
                error = error.with_context(ctx);
            }
        }

        if options.log_errors {
            self.log.log_error(&error, context).await;
        }

        if options.auto_recover && self.registry.has_auto_strategy(error.kind).await {
            let outcome = self.registry.attempt_recovery(&error).await;
            if outcome.success {
                return HandlingResult {
                    success: true,
                    value: None,
                    error: None,
                    recovery_attempted: true,
                    recovery: Some(outcome),
                    retry: None,
                };
            }
            return HandlingResult {
                success: false,
                value: None,
                error: Some(error),
                recovery_attempted: true,
                recovery: Some(outcome),
                retry: None,
            };
        }

        HandlingResult {
            success: false,
            value: None,
            error: Some(error),
            recovery_attempted: false,
            recovery: None,
            retry: None,
        }
    }

    /// Run an operation with retry, logging, and recovery.
    ///
    /// With `max_retries > 0` the retry orchestrator drives the raw
    /// operation; exhaustion routes the final error through
    /// [`handle_error`](Self::handle_error) so logging and recovery still
    /// apply, with the full retry history attached. With `max_retries`
    /// of 0 the operation runs once.
    pub async fn execute_with_error_handling<F, Fut, T, E>(
        &self,
        mut operation: F,
        name: &str,
        context: Option<ErrorContext>,
        options: &HandlingOptions,
    ) -> HandlingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<SnipdError>,
    {
        if options.max_retries > 0 {
            let config = options.retry_config();
            let mut result = self.retry.execute(name, &config, operation).await;
            if result.success {
                let value = result.value.take();
                return HandlingResult {
                    success: true,
                    value,
                    error: None,
                    recovery_attempted: false,
                    recovery: None,
                    retry: Some(result),
                };
            }
            let final_error = result
                .error
                .clone()
                .unwrap_or_else(SnipdError::unknown_failure);
            let mut handled: HandlingResult<T> =
                self.handle_error(final_error, context, options).await;
            handled.retry = Some(result);
            return handled;
        }

        match operation().await {
            Ok(value) => HandlingResult {
                success: true,
                value: Some(value),
                error: None,
                recovery_attempted: false,
                recovery: None,
                retry: None,
            },
            Err(e) => self.handle_error(e, context, options).await,
        }
    }

    /// Message + suggested action + manual recovery option labels, ready
    /// for a UI layer to render.
    pub async fn user_friendly_message(&self, error: &SnipdError) -> String {
        let mut message = error.message.clone();
        if let Some(action) = &error.suggested_action {
            message.push_str("\nSuggested action: ");
            message.push_str(action);
        }
        let options: Vec<String> = self
            .registry
            .actions_for(error)
            .await
            .into_iter()
            .filter(|a| !a.automatic)
            .map(|a| a.label)
            .collect();
        if !options.is_empty() {
            message.push_str("\nRecovery options: ");
            message.push_str(&options.join(", "));
        }
        message
    }

    /// Every recovery action registered for the error's kind.
    pub async fn recovery_actions(&self, error: &SnipdError) -> Vec<RecoveryAction> {
        self.registry.actions_for(error).await
    }

    /// Run one recovery action by id.
    pub async fn execute_recovery_action(
        &self,
        error: &SnipdError,
        action_id: &str,
    ) -> RecoveryOutcome {
        self.registry.execute_action(error, action_id).await
    }

    /// Statistics over the log's error-bearing entries.
    ///
    /// Derived by scanning the log on every call, never cached, so they
    /// cannot diverge from it.
    pub async fn stats(&self) -> ErrorStats {
        let errors = self.log.errors_only().await;
        let mut by_severity: HashMap<Severity, usize> = HashMap::new();
        let mut by_kind: HashMap<ErrorKind, usize> = HashMap::new();
        for entry in &errors {
            if let Some(error) = &entry.error {
                *by_severity.entry(error.severity).or_insert(0) += 1;
                *by_kind.entry(error.kind).or_insert(0) += 1;
            }
        }
        let skip = errors.len().saturating_sub(10);
        let recent = errors[skip..].to_vec();
        ErrorStats {
            total: errors.len(),
            by_severity,
            by_kind,
            recent,
        }
    }
}
