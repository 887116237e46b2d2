//! The connection seam between the executor and a database driver.

use crate::error::DbResult;
use crate::sql::Dialect;
use crate::value::{ExecutionOutcome, ResultSet, Value};
use std::future::Future;
use std::sync::Arc;

/// A live connection handle supplied by the caller.
///
/// The executor only ever sees SQL that already matches [`Connection::dialect`]
/// (placeholders rewritten, parameter count checked). Implementations map
/// driver failures to [`DbError::QueryFailed`] for reads and
/// [`DbError::ExecutionFailed`] for writes, and return
/// [`DbError::NotConnected`] once the handle has been closed.
///
/// Non-reentrant drivers must serialize access internally (see
/// `MySqlConnection`); the trait only hands out `&self`.
///
/// [`DbError::QueryFailed`]: crate::DbError::QueryFailed
/// [`DbError::ExecutionFailed`]: crate::DbError::ExecutionFailed
/// [`DbError::NotConnected`]: crate::DbError::NotConnected
pub trait Connection: Send + Sync {
    /// SQL flavor spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Whether the handle is still open.
    fn is_connected(&self) -> bool;

    /// Run a read and fetch every row eagerly.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ResultSet>> + Send;

    /// Run a write and report the affected-row count.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ExecutionOutcome>> + Send;

    /// Run a parameterless, possibly multi-statement script.
    fn batch_execute(&self, script: &str) -> impl Future<Output = DbResult<()>> + Send;

    /// Close the handle. Later calls fail with `NotConnected`.
    fn close(&self) -> impl Future<Output = DbResult<()>> + Send;
}

impl<C: Connection> Connection for Arc<C> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ResultSet>> + Send {
        (**self).query(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = DbResult<ExecutionOutcome>> + Send {
        (**self).execute(sql, params)
    }

    fn batch_execute(&self, script: &str) -> impl Future<Output = DbResult<()>> + Send {
        (**self).batch_execute(script)
    }

    fn close(&self) -> impl Future<Output = DbResult<()>> + Send {
        (**self).close()
    }
}
