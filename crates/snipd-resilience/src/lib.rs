//! # Snipd Resilience
//!
//! The resilience core of the snipd snippet manager: failure
//! classification, bounded event logging, retry with exponential backoff,
//! and automatic recovery.
//!
//! Surrounding subsystems (editor integration, storage, the web client)
//! hand this crate their fallible operations and receive structured
//! results; the core never reaches back into their internals.
//!
//! - **Event log**: append-only, capacity-bounded, level-filtered record
//!   of events and typed errors
//! - **Retry**: exponential backoff with bounded jitter, driven by a
//!   kind-based retryability set
//! - **Recovery**: prioritized remediation strategies per error kind,
//!   attempted before a failure is surfaced
//! - **Coordinator**: the facade composing all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snipd_resilience::{
//!     EventLogConfig, HandlingOptions, ResilienceCoordinator,
//! };
//! use snipd_error::SnipdError;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let coordinator = ResilienceCoordinator::new(EventLogConfig::default());
//!
//! let options = HandlingOptions::new()
//!     .with_max_retries(2)
//!     .with_retry_delay(Duration::from_millis(500));
//!
//! let result = coordinator
//!     .execute_with_error_handling(
//!         || async {
//!             // Your fallible operation here
//!             Ok::<_, SnipdError>("synced")
//!         },
//!         "push_snippet",
//!         None,
//!         &options,
//!     )
//!     .await;
//!
//! assert!(result.success);
//! # }
//! ```
//!
//! ## Recovery strategies
//!
//! Remediation logic belongs to the registering subsystem; the registry
//! only decides whether and when to run it:
//!
//! ```rust,no_run
//! use snipd_resilience::{
//!     EventLogConfig, RecoveryAction, RecoveryStrategy, ResilienceCoordinator,
//! };
//! use snipd_error::ErrorKind;
//!
//! # async fn example() {
//! let coordinator = ResilienceCoordinator::new(EventLogConfig::default());
//!
//! coordinator
//!     .recovery()
//!     .register(
//!         RecoveryStrategy::new(ErrorKind::StorageAccess)
//!             .with_priority(1)
//!             .with_auto_execute(true)
//!             .with_action(RecoveryAction::automatic(
//!                 "reopen-db",
//!                 "Reopen database",
//!                 "Close and reopen the snippet store",
//!                 || async { Ok(()) },
//!             )),
//!     )
//!     .await;
//! # }
//! ```
//!
//! ## Statistics
//!
//! [`ResilienceCoordinator::stats`] is derived from the event log on
//! every call, so counts can never diverge from what was recorded.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coordinator;
pub mod event_log;
pub mod recovery;
pub mod retry;

// Re-export main types
pub use coordinator::{ErrorStats, HandlingOptions, HandlingResult, ResilienceCoordinator};

pub use event_log::{
    EventLog, EventLogConfig, LogEntry, LogLevel, LogSink, SinkError,
};

pub use recovery::{
    ActionFuture, ActionHandler, RecoveryAction, RecoveryOutcome, RecoveryRegistry,
    RecoveryStrategy,
};

pub use retry::{RetryAttempt, RetryConfig, RetryExecutor, RetryResult};

pub use snipd_error::{ErrorContext, ErrorKind, Severity, SnipdError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_config_defaults() {
        let config = EventLogConfig::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.min_level, LogLevel::Info);
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.retryable_kinds.contains(&ErrorKind::Network));
    }

    #[test]
    fn test_handling_options_defaults() {
        let options = HandlingOptions::default();
        assert_eq!(options.max_retries, 0);
        assert!(options.auto_recover);
    }

    #[tokio::test]
    async fn test_coordinator_construction() {
        let coordinator = ResilienceCoordinator::new(
            EventLogConfig::new().with_console(false),
        );
        assert!(coordinator.log().is_empty().await);
        let stats = coordinator.stats().await;
        assert_eq!(stats.total, 0);
    }
}
