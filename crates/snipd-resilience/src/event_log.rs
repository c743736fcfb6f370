//! Bounded, level-filtered event log
//!
//! Append-only record of operational events and errors. Oldest entries are
//! evicted once the configured capacity is exceeded; reads take a
//! consistent snapshot.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use snipd_error::{ErrorContext, Severity, SnipdError};
use tokio::sync::RwLock;

/// Log levels, ordered by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Routine events
    Info,
    /// Something went wrong but was handled
    Warn,
    /// An operation failed
    Error,
    /// The application cannot continue safely
    Fatal,
}

impl LogLevel {
    /// Fixed mapping from error severity to log level.
    ///
    /// low→info, medium→warn, high→error, critical→fatal.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Low => LogLevel::Info,
            Severity::Medium => LogLevel::Warn,
            Severity::High => LogLevel::Error,
            Severity::Critical => LogLevel::Fatal,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded event.
///
/// Created only by [`EventLog::append`]; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
    /// Level it was recorded at
    pub level: LogLevel,
    /// Human-readable message
    pub message: String,
    /// Typed error, when the event is a failure
    pub error: Option<SnipdError>,
    /// Caller-supplied context
    pub context: Option<ErrorContext>,
    /// Free-form metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl LogEntry {
    /// Serialize the entry for export.
    pub fn to_structured(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(
            "timestamp".into(),
            serde_json::json!(self.timestamp.to_rfc3339()),
        );
        map.insert("level".into(), serde_json::json!(self.level.as_str()));
        map.insert("message".into(), serde_json::json!(self.message));
        if let Some(error) = &self.error {
            map.insert("error".into(), error.to_structured());
        }
        if let Some(context) = &self.context {
            map.insert(
                "context".into(),
                serde_json::to_value(context).unwrap_or(serde_json::Value::Null),
            );
        }
        if let Some(metadata) = &self.metadata {
            map.insert(
                "metadata".into(),
                serde_json::to_value(metadata).unwrap_or(serde_json::Value::Null),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Error returned by a sink that could not record an entry.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink's backing channel or device is gone
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    /// The sink refused this entry
    #[error("sink rejected entry: {0}")]
    Rejected(String),
}

/// Pluggable destination for log entries.
///
/// `write` must be cheap and non-blocking; sinks backed by something
/// inherently asynchronous are expected to enqueue (e.g. a channel
/// `try_send`) and surface queue failures through the returned error.
/// Sink failures never propagate to the logging caller.
pub trait LogSink: Send + Sync {
    /// Record one entry.
    fn write(&self, entry: &LogEntry) -> Result<(), SinkError>;
}

/// Configuration for the event log.
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Minimum level to record; lower levels are dropped
    pub min_level: LogLevel,
    /// Maximum number of retained entries
    pub max_entries: usize,
    /// Whether to mirror entries to the process logger (`tracing`)
    pub console: bool,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            max_entries: 1000,
            console: true,
        }
    }
}

impl EventLogConfig {
    /// Create a new config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum recorded level
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Set the retention capacity
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Enable or disable mirroring to `tracing`
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

/// Capacity-bounded, level-filtered event log.
///
/// A single lock guards the backing buffer; reads clone a snapshot so they
/// never observe a buffer mid-mutation, and no lock is held while sink
/// code runs.
pub struct EventLog {
    config: EventLogConfig,
    entries: RwLock<VecDeque<LogEntry>>,
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
}

impl EventLog {
    /// Create an event log with the given config.
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(VecDeque::new()),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Create with default config.
    pub fn default_config() -> Self {
        Self::new(EventLogConfig::default())
    }

    /// Register an additional sink.
    pub async fn add_sink(&self, sink: Arc<dyn LogSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Record an entry.
    ///
    /// No-op when `level` is below the configured minimum. Evicts
    /// oldest-first once capacity is exceeded.
    pub async fn append(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        error: Option<SnipdError>,
        context: Option<ErrorContext>,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) {
        if level < self.config.min_level {
            return;
        }
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            error,
            context,
            metadata,
        };

        if self.config.console {
            emit(&entry);
        }

        {
            let mut entries = self.entries.write().await;
            entries.push_back(entry.clone());
            while entries.len() > self.config.max_entries {
                entries.pop_front();
            }
        }

        let sinks: Vec<Arc<dyn LogSink>> = self.sinks.read().await.clone();
        for sink in sinks {
            if let Err(e) = sink.write(&entry) {
                tracing::debug!(error = %e, "log sink write failed");
            }
        }
    }

    /// Record a debug message.
    pub async fn log_debug(&self, message: impl Into<String>) {
        self.append(LogLevel::Debug, message, None, None, None).await;
    }

    /// Record an info message.
    pub async fn log_info(&self, message: impl Into<String>) {
        self.append(LogLevel::Info, message, None, None, None).await;
    }

    /// Record a warning message.
    pub async fn log_warn(&self, message: impl Into<String>) {
        self.append(LogLevel::Warn, message, None, None, None).await;
    }

    /// Record a fatal message.
    pub async fn log_fatal(&self, message: impl Into<String>) {
        self.append(LogLevel::Fatal, message, None, None, None).await;
    }

    /// Record a typed error at the level derived from its severity.
    pub async fn log_error(&self, error: &SnipdError, context: Option<ErrorContext>) {
        let level = LogLevel::from_severity(error.severity);
        let context = context.or_else(|| error.context.clone());
        self.append(level, error.message.clone(), Some(error.clone()), context, None)
            .await;
    }

    /// Entries at exactly the given level, or all entries.
    pub async fn query(&self, level: Option<LogLevel>) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        match level {
            Some(level) => entries.iter().filter(|e| e.level == level).cloned().collect(),
            None => entries.iter().cloned().collect(),
        }
    }

    /// The most recent `n` entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Entries that carry a typed error.
    pub async fn errors_only(&self) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        entries.iter().filter(|e| e.error.is_some()).cloned().collect()
    }

    /// Number of retained entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop all retained entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Serialize the full log.
    pub async fn export(&self) -> serde_json::Value {
        let entries = self.entries.read().await;
        serde_json::Value::Array(entries.iter().map(LogEntry::to_structured).collect())
    }
}

/// Mirror an entry to the process logger.
fn emit(entry: &LogEntry) {
    let kind = entry.error.as_ref().map(|e| e.kind.as_str());
    match entry.level {
        LogLevel::Debug => tracing::debug!(kind, "{}", entry.message),
        LogLevel::Info => tracing::info!(kind, "{}", entry.message),
        LogLevel::Warn => tracing::warn!(kind, "{}", entry.message),
        LogLevel::Error => tracing::error!(kind, "{}", entry.message),
        LogLevel::Fatal => tracing::error!(kind, fatal = true, "{}", entry.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct BufferSink {
        messages: Mutex<Vec<String>>,
    }

    impl BufferSink {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    impl LogSink for BufferSink {
        fn write(&self, entry: &LogEntry) -> Result<(), SinkError> {
            self.messages
                .lock()
                .map_err(|_| SinkError::Unavailable("buffer poisoned".into()))?
                .push(entry.message.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl LogSink for FailingSink {
        fn write(&self, _entry: &LogEntry) -> Result<(), SinkError> {
            Err(SinkError::Rejected("always fails".into()))
        }
    }

    fn quiet(max_entries: usize) -> EventLog {
        EventLog::new(
            EventLogConfig::new()
                .with_max_entries(max_entries)
                .with_console(false),
        )
    }

    #[test]
    fn test_severity_mapping_is_total() {
        assert_eq!(LogLevel::from_severity(Severity::Low), LogLevel::Info);
        assert_eq!(LogLevel::from_severity(Severity::Medium), LogLevel::Warn);
        assert_eq!(LogLevel::from_severity(Severity::High), LogLevel::Error);
        assert_eq!(LogLevel::from_severity(Severity::Critical), LogLevel::Fatal);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_first() {
        let log = quiet(3);
        log.log_info("one").await;
        log.log_info("two").await;
        log.log_info("three").await;
        log.log_info("four").await;

        let entries = log.query(None).await;
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_min_level_filters() {
        let log = EventLog::new(
            EventLogConfig::new()
                .with_min_level(LogLevel::Warn)
                .with_console(false),
        );
        log.log_info("dropped").await;
        log.log_warn("kept").await;

        let entries = log.query(None).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }

    #[tokio::test]
    async fn test_log_error_derives_level_from_severity() {
        let log = quiet(10);
        log.log_error(&SnipdError::search("no hits"), None).await; // low -> info
        log.log_error(&SnipdError::network("down"), None).await; // medium -> warn
        log.log_error(&SnipdError::storage_access("locked"), None).await; // high -> error
        log.log_error(
            &SnipdError::new("corrupt store", snipd_error::ErrorKind::StorageAccess,
                Severity::Critical),
            None,
        )
        .await; // critical -> fatal

        let entries = log.query(None).await;
        let levels: Vec<_> = entries.iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error, LogLevel::Fatal]
        );
    }

    #[tokio::test]
    async fn test_query_by_level() {
        let log = quiet(10);
        log.log_info("a").await;
        log.log_warn("b").await;
        log.log_info("c").await;

        let infos = log.query(Some(LogLevel::Info)).await;
        assert_eq!(infos.len(), 2);
        let warns = log.query(Some(LogLevel::Warn)).await;
        assert_eq!(warns.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_returns_last_n_in_order() {
        let log = quiet(10);
        for i in 0..5 {
            log.log_info(format!("msg-{i}")).await;
        }
        let recent = log.recent(2).await;
        let messages: Vec<_> = recent.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["msg-3", "msg-4"]);
    }

    #[tokio::test]
    async fn test_errors_only() {
        let log = quiet(10);
        log.log_info("plain").await;
        log.log_error(&SnipdError::validation("bad title"), None).await;

        let errors = log.errors_only().await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].error.is_some());
    }

    #[tokio::test]
    async fn test_clear() {
        let log = quiet(10);
        log.log_info("something").await;
        assert!(!log.is_empty().await);
        log.clear().await;
        assert!(log.is_empty().await);
    }

    #[tokio::test]
    async fn test_export_round_trips_fields() {
        let log = quiet(10);
        log.log_error(&SnipdError::network("gateway timeout"), None).await;

        let exported = log.export().await;
        let entries = exported.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["level"], "warn");
        assert_eq!(entries[0]["error"]["kind"], "network");
    }

    #[tokio::test]
    async fn test_sink_receives_entries() {
        let log = quiet(10);
        let sink = Arc::new(BufferSink::new());
        log.add_sink(sink.clone()).await;

        log.log_info("to the sink").await;
        assert_eq!(
            sink.messages.lock().unwrap().as_slice(),
            &["to the sink".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_propagate() {
        let log = quiet(10);
        log.add_sink(Arc::new(FailingSink)).await;

        log.log_info("still recorded").await;
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn test_filtered_entry_skips_sinks() {
        let log = EventLog::new(
            EventLogConfig::new()
                .with_min_level(LogLevel::Error)
                .with_console(false),
        );
        let sink = Arc::new(BufferSink::new());
        log.add_sink(sink.clone()).await;

        log.log_info("below threshold").await;
        assert!(sink.messages.lock().unwrap().is_empty());
    }
}
