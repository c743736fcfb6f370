//! Recovery strategy registry
//!
//! Holds prioritized remediation strategies per error kind and attempts
//! automatic remediation before a failure is surfaced to the caller. What
//! a remediation action actually does belongs to the registering
//! subsystem; the registry only decides whether and when to run it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use snipd_error::{ErrorKind, SnipdError};
use tokio::sync::RwLock;

use crate::event_log::EventLog;

/// Boxed future produced by a recovery handler.
pub type ActionFuture = Pin<Box<dyn Future<Output = snipd_error::Result<()>> + Send>>;

/// Shared remediation procedure.
pub type ActionHandler = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// One remediation step.
///
/// `automatic` actions may be run by the registry without user
/// confirmation; manual actions only run through
/// [`RecoveryRegistry::execute_action`] after explicit selection.
#[derive(Clone)]
pub struct RecoveryAction {
    /// Stable identifier used to select the action
    pub id: String,
    /// Short human label
    pub label: String,
    /// Longer description for display
    pub description: String,
    /// Whether the registry may run this without confirmation
    pub automatic: bool,
    handler: ActionHandler,
}

impl std::fmt::Debug for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryAction")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("automatic", &self.automatic)
            .finish_non_exhaustive()
    }
}

impl RecoveryAction {
    /// Create an action with an explicit `automatic` flag.
    pub fn new<F, Fut>(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        automatic: bool,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = snipd_error::Result<()>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move || Box::pin(handler()) as ActionFuture);
        Self {
            id: id.into(),
            label: label.into(),
            description: description.into(),
            automatic,
            handler,
        }
    }

    /// Create an action the registry may run without confirmation.
    pub fn automatic<F, Fut>(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = snipd_error::Result<()>> + Send + 'static,
    {
        Self::new(id, label, description, true, handler)
    }

    /// Create an action that only runs on explicit user selection.
    pub fn manual<F, Fut>(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = snipd_error::Result<()>> + Send + 'static,
    {
        Self::new(id, label, description, false, handler)
    }

    /// Create a manual action whose procedure is user interaction itself.
    ///
    /// Running the placeholder yields a failed-with-reason value rather
    /// than panicking, so scan logic stays a plain conditional.
    pub fn placeholder(
        id: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let reason = SnipdError::unknown(format!(
            "Recovery action '{id}' requires user interaction"
        ))
        .with_code("MANUAL_ACTION_REQUIRED");
        Self::new(id, label, description, false, move || {
            let reason = reason.clone();
            async move { Err(reason) }
        })
    }

    /// Run the remediation procedure.
    pub async fn run(&self) -> snipd_error::Result<()> {
        (self.handler)().await
    }
}

/// Prioritized bundle of remediation actions for one error kind.
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    /// Kind this strategy applies to
    pub kind: ErrorKind,
    /// Actions in execution order
    pub actions: Vec<RecoveryAction>,
    /// Whether the registry may run this strategy unprompted
    pub auto_execute: bool,
    /// Lower runs first; ties keep registration order
    pub priority: i32,
}

impl RecoveryStrategy {
    /// Create an empty strategy for a kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            actions: Vec::new(),
            auto_execute: false,
            priority: 0,
        }
    }

    /// Append an action.
    pub fn with_action(mut self, action: RecoveryAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Allow the registry to run this strategy unprompted.
    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    /// Set the priority (lower runs first).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Outcome of a recovery attempt or an explicitly executed action.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Whether a remediation procedure completed
    pub success: bool,
    /// Id of the action that ran, on success
    pub action_executed: Option<String>,
    /// Why nothing ran, when nothing ran
    pub message: Option<String>,
    /// The remediation failure, when the action itself failed
    pub error: Option<SnipdError>,
}

impl RecoveryOutcome {
    /// An action completed.
    pub fn executed(action_id: impl Into<String>) -> Self {
        Self {
            success: true,
            action_executed: Some(action_id.into()),
            message: None,
            error: None,
        }
    }

    /// No applicable action was found.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            action_executed: None,
            message: Some(message.into()),
            error: None,
        }
    }

    /// An action ran and failed.
    pub fn failed(error: SnipdError) -> Self {
        Self {
            success: false,
            action_executed: None,
            message: None,
            error: Some(error),
        }
    }
}

/// Registry of recovery strategies keyed by error kind.
///
/// The table is read far more often than written; strategies are cloned
/// out before any handler runs, so no lock is ever held across an await.
pub struct RecoveryRegistry {
    strategies: RwLock<HashMap<ErrorKind, Vec<RecoveryStrategy>>>,
    log: Arc<EventLog>,
}

impl RecoveryRegistry {
    /// Create a registry recording into the given log.
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            log,
        }
    }

    /// Register a strategy, keeping the kind's list sorted ascending by
    /// priority (stable, so ties keep registration order).
    pub async fn register(&self, strategy: RecoveryStrategy) {
        let mut table = self.strategies.write().await;
        let list = table.entry(strategy.kind).or_default();
        list.push(strategy);
        list.sort_by_key(|s| s.priority);
    }

    /// Snapshot of the strategies registered for a kind, priority order.
    pub async fn strategies_for(&self, kind: ErrorKind) -> Vec<RecoveryStrategy> {
        let table = self.strategies.read().await;
        table.get(&kind).cloned().unwrap_or_default()
    }

    /// Every action registered for the error's kind, in priority order.
    ///
    /// Empty when nothing is registered; never an error.
    pub async fn actions_for(&self, error: &SnipdError) -> Vec<RecoveryAction> {
        self.strategies_for(error.kind)
            .await
            .into_iter()
            .flat_map(|s| s.actions)
            .collect()
    }

    /// Whether any strategy for the kind may run unprompted.
    pub async fn has_auto_strategy(&self, kind: ErrorKind) -> bool {
        let table = self.strategies.read().await;
        table
            .get(&kind)
            .map(|list| list.iter().any(|s| s.auto_execute))
            .unwrap_or(false)
    }

    /// Run the first automatic action that succeeds.
    ///
    /// Strategies are scanned in priority order, skipping those not marked
    /// `auto_execute`; within a strategy, non-automatic actions are
    /// skipped. A failing action is logged and the scan continues.
    pub async fn attempt_recovery(&self, error: &SnipdError) -> RecoveryOutcome {
        let strategies = self.strategies_for(error.kind).await;
        for strategy in strategies.iter().filter(|s| s.auto_execute) {
            for action in strategy.actions.iter().filter(|a| a.automatic) {
                match action.run().await {
                    Ok(()) => {
                        self.log
                            .log_info(format!(
                                "Recovery action '{}' resolved a {} error",
                                action.id, error.kind
                            ))
                            .await;
                        return RecoveryOutcome::executed(&action.id);
                    }
                    Err(e) => {
                        tracing::warn!(
                            action = %action.id,
                            kind = %error.kind,
                            error = %e,
                            "recovery action failed, trying next"
                        );
                        self.log
                            .log_warn(format!(
                                "Recovery action '{}' failed: {}",
                                action.id, e.message
                            ))
                            .await;
                    }
                }
            }
        }
        RecoveryOutcome::unavailable("No automatic recovery actions available")
    }

    /// Run one action by id, manual or automatic.
    ///
    /// An unknown id is a failure value, not a panic; a failing action is
    /// wrapped into the outcome. This path never retries.
    pub async fn execute_action(&self, error: &SnipdError, action_id: &str) -> RecoveryOutcome {
        let actions = self.actions_for(error).await;
        match actions.into_iter().find(|a| a.id == action_id) {
            None => RecoveryOutcome::unavailable(format!(
                "Recovery action '{action_id}' not found"
            )),
            Some(action) => match action.run().await {
                Ok(()) => {
                    self.log
                        .log_info(format!("Recovery action '{}' executed", action.id))
                        .await;
                    RecoveryOutcome::executed(&action.id)
                }
                Err(e) => {
                    self.log
                        .log_warn(format!(
                            "Recovery action '{}' failed: {}",
                            action.id, e.message
                        ))
                        .await;
                    RecoveryOutcome::failed(e)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::EventLogConfig;
    use std::sync::Mutex;

    fn registry() -> RecoveryRegistry {
        RecoveryRegistry::new(Arc::new(EventLog::new(
            EventLogConfig::new().with_console(false),
        )))
    }

    fn tracking_action(
        id: &str,
        automatic: bool,
        succeed: bool,
        ran: Arc<Mutex<Vec<String>>>,
    ) -> RecoveryAction {
        let id_owned = id.to_string();
        RecoveryAction::new(id, format!("{id} label"), "", automatic, move || {
            let ran = ran.clone();
            let id = id_owned.clone();
            async move {
                ran.lock()
                    .map_err(|_| SnipdError::unknown("tracking mutex poisoned"))?
                    .push(id.clone());
                if succeed {
                    Ok(())
                } else {
                    Err(SnipdError::unknown(format!("{id} broke")))
                }
            }
        })
    }

    #[tokio::test]
    async fn test_lower_priority_runs_first() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::StorageAccess)
                    .with_priority(2)
                    .with_auto_execute(true)
                    .with_action(tracking_action("second", true, true, ran.clone())),
            )
            .await;
        registry
            .register(
                RecoveryStrategy::new(ErrorKind::StorageAccess)
                    .with_priority(1)
                    .with_auto_execute(true)
                    .with_action(tracking_action("first", true, true, ran.clone())),
            )
            .await;

        let outcome = registry
            .attempt_recovery(&SnipdError::storage_access("locked"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.action_executed.as_deref(), Some("first"));
        assert_eq!(ran.lock().unwrap().as_slice(), &["first".to_string()]);
    }

    #[tokio::test]
    async fn test_ties_keep_registration_order() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        for id in ["a", "b"] {
            registry
                .register(
                    RecoveryStrategy::new(ErrorKind::Network)
                        .with_priority(1)
                        .with_auto_execute(true)
                        .with_action(tracking_action(id, true, id == "b", ran.clone())),
                )
                .await;
        }

        let outcome = registry.attempt_recovery(&SnipdError::network("down")).await;
        assert_eq!(outcome.action_executed.as_deref(), Some("b"));
        assert_eq!(
            ran.lock().unwrap().as_slice(),
            &["a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failing_action_continues_scan() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::Network)
                    .with_auto_execute(true)
                    .with_action(tracking_action("broken", true, false, ran.clone()))
                    .with_action(tracking_action("working", true, true, ran.clone())),
            )
            .await;

        let outcome = registry.attempt_recovery(&SnipdError::network("down")).await;
        assert!(outcome.success);
        assert_eq!(outcome.action_executed.as_deref(), Some("working"));
        assert_eq!(ran.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_manual_actions_are_skipped_by_auto_recovery() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::SyncConflict)
                    .with_auto_execute(true)
                    .with_action(tracking_action("manual", false, true, ran.clone())),
            )
            .await;

        let outcome = registry
            .attempt_recovery(&SnipdError::sync_conflict("diverged"))
            .await;

        assert!(!outcome.success);
        assert!(ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_auto_execute_strategy_is_skipped() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::Network)
                    .with_auto_execute(false)
                    .with_action(tracking_action("auto", true, true, ran.clone())),
            )
            .await;

        let outcome = registry.attempt_recovery(&SnipdError::network("down")).await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("No automatic recovery actions available")
        );
        assert!(ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_registered() {
        let registry = registry();
        let outcome = registry.attempt_recovery(&SnipdError::search("stale")).await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("No automatic recovery actions available")
        );
    }

    #[tokio::test]
    async fn test_actions_for_concatenates_in_priority_order() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::Network)
                    .with_priority(5)
                    .with_action(tracking_action("late", true, true, ran.clone())),
            )
            .await;
        registry
            .register(
                RecoveryStrategy::new(ErrorKind::Network)
                    .with_priority(1)
                    .with_action(tracking_action("early-a", true, true, ran.clone()))
                    .with_action(tracking_action("early-b", false, true, ran.clone())),
            )
            .await;

        let actions = registry.actions_for(&SnipdError::network("down")).await;
        let ids: Vec<_> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["early-a", "early-b", "late"]);

        let none = registry.actions_for(&SnipdError::validation("bad")).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_execute_action_by_id_runs_manual_actions() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::SyncConflict)
                    .with_action(tracking_action("merge", false, true, ran.clone())),
            )
            .await;

        let error = SnipdError::sync_conflict("diverged");
        let outcome = registry.execute_action(&error, "merge").await;
        assert!(outcome.success);
        assert_eq!(ran.lock().unwrap().as_slice(), &["merge".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_action_unknown_id() {
        let registry = registry();
        let outcome = registry
            .execute_action(&SnipdError::network("down"), "missing")
            .await;
        assert!(!outcome.success);
        assert!(outcome.message.unwrap().contains("missing"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_action_wraps_failure() {
        let registry = registry();
        let ran = Arc::new(Mutex::new(Vec::new()));

        registry
            .register(
                RecoveryStrategy::new(ErrorKind::Network)
                    .with_action(tracking_action("broken", true, false, ran.clone())),
            )
            .await;

        let outcome = registry
            .execute_action(&SnipdError::network("down"), "broken")
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_placeholder_fails_with_reason() {
        let action = RecoveryAction::placeholder("pick-version", "Pick a version", "");
        let result = action.run().await;
        let err = result.unwrap_err();
        assert_eq!(err.code, "MANUAL_ACTION_REQUIRED");
        assert!(!action.automatic);
    }

    #[tokio::test]
    async fn test_has_auto_strategy() {
        let registry = registry();
        assert!(!registry.has_auto_strategy(ErrorKind::Network).await);

        registry
            .register(RecoveryStrategy::new(ErrorKind::Network).with_auto_execute(true))
            .await;
        assert!(registry.has_auto_strategy(ErrorKind::Network).await);
        assert!(!registry.has_auto_strategy(ErrorKind::Validation).await);
    }
}
