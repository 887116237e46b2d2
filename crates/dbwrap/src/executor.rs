//! Statement execution against an injected [`Connection`].
//!
//! [`Executor`] owns the check → prepare → run → normalize path:
//!
//! 1. fail with [`DbError::NotConnected`] if the handle is closed;
//! 2. count `?` placeholders against the bound parameters
//!    ([`DbError::InvalidArgument`] on mismatch) and adapt them to the dialect;
//! 3. run the statement once (no retries, no timeouts);
//! 4. normalize driver failures to [`DbError::QueryFailed`] /
//!    [`DbError::ExecutionFailed`] and report each one to the
//!    [`FailureMonitor`].
//!
//! All methods are `async`. A future that is dropped before it is first polled
//! never reaches the driver; once the driver call has started, cancellation is
//! up to the driver.

use crate::clause::{build_where, join_fragments};
use crate::client::Connection;
use crate::error::{DbError, DbResult};
use crate::ident::TableRef;
use crate::monitor::{FailureEvent, FailureMonitor, Operation, TracingMonitor, report};
use crate::sql::Dialect;
use crate::value::{ExecutionOutcome, ResultSet, Value};
use std::sync::Arc;

/// Runs statements on a connection it holds (owned, or shared through `Arc<C>`).
pub struct Executor<C> {
    conn: C,
    monitor: Arc<dyn FailureMonitor>,
}

impl<C: Connection> Executor<C> {
    /// Wrap a connection. Failures are reported through [`TracingMonitor`].
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            monitor: Arc::new(TracingMonitor::default()),
        }
    }

    /// Replace the failure monitor.
    pub fn with_monitor(mut self, monitor: impl FailureMonitor + 'static) -> Self {
        self.monitor = Arc::new(monitor);
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    pub fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Run a read with positional parameters and fetch every row.
    ///
    /// Zero matching rows is an empty [`ResultSet`], not an error.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        self.run_query(Operation::Query, None, sql, params).await
    }

    /// [`Executor::query`] with a tag attached to log and failure events.
    pub async fn query_tagged(&self, tag: &str, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        self.run_query(Operation::Query, Some(tag), sql, params).await
    }

    /// Run an INSERT / UPDATE / DELETE with positional parameters.
    ///
    /// Zero affected rows is a successful outcome.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecutionOutcome> {
        self.run_execute(None, sql, params).await
    }

    /// [`Executor::execute`] with a tag attached to log and failure events.
    pub async fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[Value],
    ) -> DbResult<ExecutionOutcome> {
        self.run_execute(Some(tag), sql, params).await
    }

    /// Fetch one random row: `SELECT * FROM <table> [WHERE ..] ORDER BY RAND() LIMIT 1`.
    ///
    /// The shuffle function follows the dialect (`RAND()` / `RANDOM()`).
    /// The database evaluates it for every matching row, so this is a full
    /// scan of the filtered set; avoid it on large tables.
    pub async fn query_random(
        &self,
        table: &str,
        predicate: &str,
        params: &[Value],
    ) -> DbResult<ResultSet> {
        let table = TableRef::parse(table)?;
        let sql = self.random_select_sql(&table, predicate);
        self.run_query(Operation::QueryRandom, None, &sql, params).await
    }

    /// Run a parameterless script, which may hold several statements.
    pub async fn batch(&self, script: &str) -> DbResult<()> {
        self.ensure_connected()?;
        tracing::debug!(target: "dbwrap.sql", operation = "batch", sql = %script);
        match self.conn.batch_execute(script).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(Operation::Batch, None, script, err)),
        }
    }

    /// Close the underlying connection.
    pub async fn close(&self) -> DbResult<()> {
        self.conn.close().await
    }

    fn random_select_sql(&self, table: &TableRef, predicate: &str) -> String {
        join_fragments(&[
            "SELECT * FROM".to_string(),
            table.to_string(),
            build_where(predicate),
            format!("ORDER BY {}", self.dialect().random_function()),
            "LIMIT 1".to_string(),
        ])
    }

    async fn run_query(
        &self,
        op: Operation,
        tag: Option<&str>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<ResultSet> {
        self.ensure_connected()?;
        let exec_sql = self.dialect().prepare(sql, params.len())?;
        tracing::debug!(
            target: "dbwrap.sql",
            operation = %op,
            tag = tag.unwrap_or("-"),
            param_count = params.len(),
            sql = %exec_sql,
        );
        match self.conn.query(&exec_sql, params).await {
            Ok(rows) => Ok(rows),
            Err(err) => Err(self.fail(op, tag, &exec_sql, err)),
        }
    }

    async fn run_execute(
        &self,
        tag: Option<&str>,
        sql: &str,
        params: &[Value],
    ) -> DbResult<ExecutionOutcome> {
        self.ensure_connected()?;
        let exec_sql = self.dialect().prepare(sql, params.len())?;
        tracing::debug!(
            target: "dbwrap.sql",
            operation = "execute",
            tag = tag.unwrap_or("-"),
            param_count = params.len(),
            sql = %exec_sql,
        );
        match self.conn.execute(&exec_sql, params).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => Err(self.fail(Operation::Execute, tag, &exec_sql, err)),
        }
    }

    fn ensure_connected(&self) -> DbResult<()> {
        if self.conn.is_connected() {
            Ok(())
        } else {
            Err(DbError::NotConnected)
        }
    }

    /// Normalize a connection error for `op` and report driver failures once.
    fn fail(&self, op: Operation, tag: Option<&str>, sql: &str, err: DbError) -> DbError {
        let Some(cause) = err.cause().map(str::to_string) else {
            return err;
        };
        let event = FailureEvent::new(op, sql, cause.as_str()).with_tag(tag);
        report(self.monitor.as_ref(), &event);
        match op {
            Operation::Query | Operation::QueryRandom => DbError::QueryFailed { cause },
            Operation::Execute | Operation::Batch => DbError::ExecutionFailed { cause },
        }
    }
}
