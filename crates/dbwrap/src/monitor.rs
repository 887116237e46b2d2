//! Failure reporting for statement execution.
//!
//! The executor reports every [`DbError::QueryFailed`] and
//! [`DbError::ExecutionFailed`] exactly once to a [`FailureMonitor`]. The
//! default [`TracingMonitor`] turns it into a `tracing` error event on the
//! `dbwrap.sql` target; install a subscriber (see `logging`) to collect them.
//!
//! [`DbError::QueryFailed`]: crate::DbError::QueryFailed
//! [`DbError::ExecutionFailed`]: crate::DbError::ExecutionFailed

use crate::sql::truncate_sql_bytes;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use tracing::Level;

/// Maximum SQL length (in bytes) carried by a [`FailureEvent`].
const MAX_EVENT_SQL_LEN: usize = 512;

/// Which executor operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query,
    Execute,
    QueryRandom,
    Batch,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Execute => "execute",
            Operation::QueryRandom => "query_random",
            Operation::Batch => "batch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured failure event.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEvent {
    pub operation: Operation,
    /// Optional caller-supplied tag (e.g. `"users.delete"`).
    pub tag: Option<String>,
    /// The statement that failed, truncated.
    pub sql: String,
    /// Driver diagnostic text.
    pub cause: String,
}

impl FailureEvent {
    pub fn new(operation: Operation, sql: &str, cause: impl Into<String>) -> Self {
        let sql = if sql.len() > MAX_EVENT_SQL_LEN {
            format!("{}...", truncate_sql_bytes(sql, MAX_EVENT_SQL_LEN))
        } else {
            sql.to_string()
        };
        Self {
            operation,
            tag: None,
            sql,
            cause: cause.into(),
        }
    }

    pub fn with_tag(mut self, tag: Option<&str>) -> Self {
        self.tag = tag.map(str::to_string);
        self
    }
}

/// Receives failure events.
///
/// Implementations must not block for long; they run inline on the calling task.
pub trait FailureMonitor: Send + Sync {
    fn on_failure(&self, event: &FailureEvent);
}

/// Deliver `event` to `monitor`, containing any panic raised by the monitor.
pub(crate) fn report(monitor: &dyn FailureMonitor, event: &FailureEvent) {
    if catch_unwind(AssertUnwindSafe(|| monitor.on_failure(event))).is_err() {
        tracing::warn!(
            target: "dbwrap.sql",
            operation = %event.operation,
            "failure monitor panicked; event dropped"
        );
    }
}

/// Emits failure events through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    pub level: Level,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::ERROR,
        }
    }
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl FailureMonitor for TracingMonitor {
    fn on_failure(&self, event: &FailureEvent) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let tag = event.tag.as_deref().unwrap_or("-");
        emit_at_level!(
            self.level,
            target: "dbwrap.sql",
            operation = %event.operation,
            tag,
            sql = %event.sql,
            cause = %event.cause,
            "Error in {}: {}", event.operation, event.cause
        );
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl FailureMonitor for NoopMonitor {
    fn on_failure(&self, _event: &FailureEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingMonitor {
    events: Arc<Mutex<Vec<FailureEvent>>>,
}

impl CollectingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl FailureMonitor for CollectingMonitor {
    fn on_failure(&self, event: &FailureEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<M: FailureMonitor + ?Sized> FailureMonitor for Arc<M> {
    fn on_failure(&self, event: &FailureEvent) {
        (**self).on_failure(event);
    }
}
