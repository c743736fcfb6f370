//! # Snipd Error
//!
//! This crate provides the typed error taxonomy for the snipd snippet
//! manager. Every failure that enters the resilience core is normalized
//! into a [`SnipdError`] carrying a closed [`ErrorKind`], a [`Severity`],
//! a stable machine code, and diagnostic metadata, so downstream
//! components (logging, retry, recovery) never have to re-classify.
//!
//! ## Example
//!
//! ```
//! use snipd_error::{ErrorKind, Severity, SnipdError};
//!
//! let err = SnipdError::storage_access("database file is locked");
//! assert_eq!(err.kind, ErrorKind::StorageAccess);
//! assert_eq!(err.severity, Severity::High);
//! assert_eq!(err.code, "STORAGE_ACCESS_ERROR");
//! assert!(err.recoverable);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared handle to an underlying cause.
///
/// `Arc` rather than `Box` so a [`SnipdError`] stays cloneable when it is
/// copied into log entries and retry attempt records.
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of failure categories driving retry and recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Reading or writing the snippet store failed
    StorageAccess,
    /// Caller-supplied data failed validation
    Validation,
    /// Editor and web client disagree about a snippet's state
    SyncConflict,
    /// A remote endpoint could not be reached or answered badly
    Network,
    /// Importing or exporting a snippet collection failed
    ImportExport,
    /// A search query could not be executed
    Search,
    /// A snippet create/update/delete operation failed
    SnippetOperation,
    /// The application configuration is missing or invalid
    Configuration,
    /// Anything that could not be classified
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::StorageAccess,
        ErrorKind::Validation,
        ErrorKind::SyncConflict,
        ErrorKind::Network,
        ErrorKind::ImportExport,
        ErrorKind::Search,
        ErrorKind::SnippetOperation,
        ErrorKind::Configuration,
        ErrorKind::Unknown,
    ];

    /// Stable kebab-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StorageAccess => "storage-access",
            ErrorKind::Validation => "validation",
            ErrorKind::SyncConflict => "sync-conflict",
            ErrorKind::Network => "network",
            ErrorKind::ImportExport => "import-export",
            ErrorKind::Search => "search",
            ErrorKind::SnippetOperation => "snippet-operation",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Default machine code, `<KIND>_ERROR`.
    pub fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::StorageAccess => "STORAGE_ACCESS_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::SyncConflict => "SYNC_CONFLICT_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::ImportExport => "IMPORT_EXPORT_ERROR",
            ErrorKind::Search => "SEARCH_ERROR",
            ErrorKind::SnippetOperation => "SNIPPET_OPERATION_ERROR",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Default severity assigned at construction.
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorKind::StorageAccess | ErrorKind::Configuration => Severity::High,
            ErrorKind::Search => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Default remediation hint shown to users, if the kind has one.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            ErrorKind::StorageAccess => {
                Some("Check file permissions and available storage")
            }
            ErrorKind::Validation => Some("Review the provided input and try again"),
            ErrorKind::SyncConflict => {
                Some("Review both versions and merge the changes")
            }
            ErrorKind::Network => Some("Check your network connection and try again"),
            ErrorKind::ImportExport => Some("Verify the file format and try again"),
            ErrorKind::Search => Some("Simplify the search query"),
            ErrorKind::Configuration => Some("Review the application configuration"),
            ErrorKind::SnippetOperation | ErrorKind::Unknown => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an [`ErrorKind`] from its wire name fails.
#[derive(Debug, Clone, Error)]
#[error("unknown error kind: {0}")]
pub struct ParseKindError(
    /// The unrecognized wire name
    pub String,
);

impl FromStr for ErrorKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ErrorKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// Ordinal urgency of a failure, driving the log level it is recorded at.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Annoyance, operation can be transparently repeated
    Low,
    /// Operation failed but the application is unaffected
    Medium,
    /// A subsystem is impaired
    High,
    /// The application cannot continue safely
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Descriptive location of a failure, supplied by the caller.
///
/// The core records context verbatim and never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Component the failure originated in (e.g. "sync", "editor")
    pub component: String,
    /// Operation that was running (e.g. "push_snippet")
    pub operation: String,
    /// Session identifier, if one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// User identifier, if one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Free-form additional data
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl ErrorContext {
    /// Create a context naming the component and operation.
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            session_id: None,
            user_id: None,
            data: HashMap::new(),
        }
    }

    /// Attach a session identifier.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a user identifier.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach one free-form data entry.
    pub fn with_data(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Structured failure value used throughout the resilience core.
///
/// Constructed once at the point of failure and never mutated; components
/// pass it around by value (clones share the `cause` allocation).
#[derive(Debug, Clone)]
pub struct SnipdError {
    /// Human-readable description
    pub message: String,
    /// Failure category
    pub kind: ErrorKind,
    /// Urgency, fixed at construction
    pub severity: Severity,
    /// Stable machine code, fixed at construction
    pub code: String,
    /// Whether remediation or retry can plausibly help
    pub recoverable: bool,
    /// Remediation hint for display
    pub suggested_action: Option<String>,
    /// Opaque structured payload
    pub details: Option<serde_json::Value>,
    /// Where the failure happened
    pub context: Option<ErrorContext>,
    /// When the value was constructed
    pub timestamp: DateTime<Utc>,
    /// Underlying cause, if this error wraps another
    pub cause: Option<ErrorCause>,
}

impl SnipdError {
    /// Construct an error of the given kind with its kind defaults.
    ///
    /// Construction is total: every combination of inputs yields a value.
    pub fn new(message: impl Into<String>, kind: ErrorKind, severity: Severity) -> Self {
        Self {
            message: message.into(),
            kind,
            severity,
            code: kind.default_code().to_string(),
            recoverable: true,
            suggested_action: kind.suggested_action().map(str::to_string),
            details: None,
            context: None,
            timestamp: Utc::now(),
            cause: None,
        }
    }

    /// Storage read/write failure (high severity).
    pub fn storage_access(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::StorageAccess)
    }

    /// Input validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::Validation)
    }

    /// Editor/web state divergence.
    pub fn sync_conflict(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::SyncConflict)
    }

    /// Remote endpoint failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::Network)
    }

    /// Import/export failure.
    pub fn import_export(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::ImportExport)
    }

    /// Search failure (low severity).
    pub fn search(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::Search)
    }

    /// Snippet create/update/delete failure.
    pub fn snippet_operation(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::SnippetOperation)
    }

    /// Missing or invalid configuration (high severity).
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::Configuration)
    }

    /// Unclassifiable failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::of_kind(message, ErrorKind::Unknown)
    }

    /// The value produced when normalization has nothing to work with.
    pub fn unknown_failure() -> Self {
        Self::snippet_operation("Unknown error occurred")
    }

    /// A deliberately cancelled operation.
    ///
    /// Marked non-recoverable so the retry orchestrator aborts remaining
    /// attempts instead of retrying work nobody wants anymore.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        let mut err = Self::of_kind(
            format!("Operation '{}' was cancelled", operation.into()),
            ErrorKind::Unknown,
        );
        err.code = "CANCELLED".to_string();
        err.recoverable = false;
        err
    }

    /// Wrap an arbitrary error, preserving it as the cause.
    ///
    /// This is the normalization path for failures that are real errors
    /// but carry no taxonomy information of their own.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let message = err.to_string();
        Self::snippet_operation(message).with_cause(err)
    }

    fn of_kind(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self::new(message, kind, kind.default_severity())
    }

    /// Override the machine code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Mark the error as non-recoverable.
    pub fn non_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }

    /// Override the remediation hint.
    pub fn with_suggested_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = Some(action.into());
        self
    }

    /// Attach an opaque structured payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach caller-supplied context.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attach an underlying cause.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach an already-shared cause.
    pub fn with_shared_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Render the cause chain, outermost first.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            self.cause.as_deref().map(|c| c as _);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// Serialize every field for transport or persistence.
    ///
    /// The timestamp is RFC 3339 and the cause chain is rendered as text,
    /// outermost cause first.
    pub fn to_structured(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("message".into(), serde_json::json!(self.message));
        map.insert("kind".into(), serde_json::json!(self.kind.as_str()));
        map.insert("severity".into(), serde_json::json!(self.severity.to_string()));
        map.insert("code".into(), serde_json::json!(self.code));
        map.insert("recoverable".into(), serde_json::json!(self.recoverable));
        map.insert(
            "timestamp".into(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        if let Some(action) = &self.suggested_action {
            map.insert("suggested_action".into(), serde_json::json!(action));
        }
        if let Some(details) = &self.details {
            map.insert("details".into(), details.clone());
        }
        if let Some(context) = &self.context {
            map.insert(
                "context".into(),
                serde_json::to_value(context).unwrap_or(serde_json::Value::Null),
            );
        }
        let chain = self.cause_chain();
        if !chain.is_empty() {
            map.insert("cause".into(), serde_json::json!(chain));
        }
        serde_json::Value::Object(map)
    }
}

impl std::fmt::Display for SnipdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SnipdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as _)
    }
}

// ============ Normalization ============
//
// Failures are normalized exactly once, at the boundary where they enter
// the core. `From` impls cover the common shapes; everything downstream
// operates on `SnipdError` only. Normalizing an already-typed error is the
// identity, so normalization is idempotent.

impl From<String> for SnipdError {
    fn from(message: String) -> Self {
        SnipdError::snippet_operation(message)
    }
}

impl From<&str> for SnipdError {
    fn from(message: &str) -> Self {
        SnipdError::snippet_operation(message)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for SnipdError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        let message = err.to_string();
        SnipdError::snippet_operation(message).with_shared_cause(Arc::from(err))
    }
}

impl From<std::io::Error> for SnipdError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        SnipdError::storage_access(message).with_cause(err)
    }
}

impl From<serde_json::Error> for SnipdError {
    fn from(err: serde_json::Error) -> Self {
        let message = err.to_string();
        SnipdError::import_export(message).with_cause(err)
    }
}

/// Convenient Result type using SnipdError
pub type Result<T> = std::result::Result<T, SnipdError>;
