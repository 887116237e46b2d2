//! Table-level convenience operations.
//!
//! [`Database`] exposes the classic "wrapper" operations (select a column,
//! select everything, pick a random row, insert, update, delete) on top of
//! [`Executor`]. Table and column names are validated identifiers; values are
//! bound as parameters. Predicates are raw SQL (see [`crate::clause`]), so
//! keep untrusted input in the `params` slices.

use crate::clause::{ClauseSet, Direction, build_where, compose_select, join_fragments};
use crate::client::Connection;
use crate::error::{DbError, DbResult};
use crate::executor::Executor;
use crate::ident::{Columns, Ident, TableRef};
use crate::monitor::FailureMonitor;
use crate::value::{ExecutionOutcome, ResultSet, Value};

/// Order column used by [`Database::get_all_from_table`] when none is given.
pub const DEFAULT_ORDER_COLUMN: &str = "ID";

/// A connection plus the table-level operations.
pub struct Database<C> {
    executor: Executor<C>,
}

impl<C: Connection> Database<C> {
    pub fn new(conn: C) -> Self {
        Self {
            executor: Executor::new(conn),
        }
    }

    /// Replace the failure monitor.
    pub fn with_monitor(self, monitor: impl FailureMonitor + 'static) -> Self {
        Self {
            executor: self.executor.with_monitor(monitor),
        }
    }

    /// The underlying executor, for hand-written statements.
    pub fn executor(&self) -> &Executor<C> {
        &self.executor
    }

    pub fn is_connected(&self) -> bool {
        self.executor.is_connected()
    }

    /// `SELECT <columns> FROM <table> [WHERE ..] ORDER BY <col> <dir> [LIMIT n]`.
    ///
    /// `columns` is `*` or a comma list. With an empty `order_column`, rows
    /// are ordered by the first listed column; `*` with no order column
    /// leaves the rows unordered. An empty `direction` means `ASC`.
    pub async fn get_col_from_table(
        &self,
        table: &str,
        columns: &str,
        predicate: &str,
        order_column: &str,
        direction: &str,
        limit: Option<i64>,
    ) -> DbResult<ResultSet> {
        let table = TableRef::parse(table)?;
        let columns = Columns::parse(columns)?;
        let clauses = ClauseSet::new().filter(predicate).maybe_limit(limit);
        let clauses = match (order_column.trim(), columns.first()) {
            ("", None) => {
                Direction::parse(direction)?;
                clauses
            }
            (col, first) => {
                clauses.order_by_input(col, direction, first.map_or("", Ident::as_str))?
            }
        };
        let sql = compose_select(&columns, &table, &clauses)?;
        self.executor
            .query_tagged("get_col_from_table", &sql, &[])
            .await
    }

    /// `SELECT * FROM <table> [WHERE ..] ORDER BY <col> <dir> [LIMIT n]`.
    ///
    /// An empty `order_column` means [`DEFAULT_ORDER_COLUMN`]; an empty
    /// `direction` means `ASC`.
    pub async fn get_all_from_table(
        &self,
        table: &str,
        predicate: &str,
        order_column: &str,
        direction: &str,
        limit: Option<i64>,
    ) -> DbResult<ResultSet> {
        let table = TableRef::parse(table)?;
        let clauses = ClauseSet::new()
            .filter(predicate)
            .order_by_input(order_column, direction, DEFAULT_ORDER_COLUMN)?
            .maybe_limit(limit);
        let sql = compose_select(&Columns::All, &table, &clauses)?;
        self.executor
            .query_tagged("get_all_from_table", &sql, &[])
            .await
    }

    /// One random row of `table`, optionally filtered. Full scan; see
    /// [`Executor::query_random`].
    pub async fn get_all_random_from_table(&self, table: &str, predicate: &str) -> DbResult<ResultSet> {
        self.executor.query_random(table, predicate, &[]).await
    }

    /// `SELECT * FROM <table> [WHERE ..]` with `params` bound to the
    /// predicate's `?` placeholders.
    pub async fn get_all_from_table_prep(
        &self,
        table: &str,
        predicate: &str,
        params: &[Value],
    ) -> DbResult<ResultSet> {
        let table = TableRef::parse(table)?;
        let sql = compose_select(&Columns::All, &table, &ClauseSet::new().filter(predicate))?;
        self.executor
            .query_tagged("get_all_from_table_prep", &sql, params)
            .await
    }

    /// Run a hand-written read.
    pub async fn query(&self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        self.executor.query(sql, params).await
    }

    /// Run a hand-written write.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecutionOutcome> {
        self.executor.execute(sql, params).await
    }

    /// Run a parameterless multi-statement script (schema setup and the like).
    pub async fn batch(&self, script: &str) -> DbResult<()> {
        self.executor.batch(script).await
    }

    /// `INSERT INTO <table> (<cols>) VALUES (?, ..)` with every value bound.
    pub async fn insert_into_table(
        &self,
        table: &str,
        values: &[(&str, Value)],
    ) -> DbResult<ExecutionOutcome> {
        let table = TableRef::parse(table)?;
        if values.is_empty() {
            return Err(DbError::invalid_argument("insert needs at least one column"));
        }
        let columns = Columns::from_names(values.iter().map(|(c, _)| *c))?;
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.to_sql()
        );
        let params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
        self.executor
            .execute_tagged("insert_into_table", &sql, &params)
            .await
    }

    /// `UPDATE <table> SET col = ?, .. [WHERE ..]`.
    ///
    /// SET values are bound first, then `params` for the predicate.
    pub async fn update_table(
        &self,
        table: &str,
        set: &[(&str, Value)],
        predicate: &str,
        params: &[Value],
    ) -> DbResult<ExecutionOutcome> {
        let table = TableRef::parse(table)?;
        if set.is_empty() {
            return Err(DbError::invalid_argument("update needs at least one SET column"));
        }
        let assignments = set
            .iter()
            .map(|(col, _)| Ident::parse(col).map(|c| format!("{c} = ?")))
            .collect::<DbResult<Vec<_>>>()?
            .join(", ");
        let sql = join_fragments(&[
            format!("UPDATE {table} SET {assignments}"),
            build_where(predicate),
        ]);
        let bound: Vec<Value> = set
            .iter()
            .map(|(_, v)| v.clone())
            .chain(params.iter().cloned())
            .collect();
        self.executor
            .execute_tagged("update_table", &sql, &bound)
            .await
    }

    /// `DELETE FROM <table> [WHERE ..]`.
    ///
    /// A blank predicate deletes every row of the table.
    pub async fn delete_from_table(
        &self,
        table: &str,
        predicate: &str,
        params: &[Value],
    ) -> DbResult<ExecutionOutcome> {
        let table = TableRef::parse(table)?;
        let where_sql = build_where(predicate);
        if where_sql.is_empty() {
            tracing::warn!(target: "dbwrap.sql", %table, "DELETE without WHERE removes every row");
        }
        let sql = join_fragments(&[format!("DELETE FROM {table}"), where_sql]);
        self.executor
            .execute_tagged("delete_from_table", &sql, params)
            .await
    }

    /// Close the connection. Later calls fail with [`DbError::NotConnected`].
    pub async fn disconnect(&self) -> DbResult<()> {
        self.executor.close().await
    }
}

#[cfg(feature = "mysql")]
impl Database<crate::mysql::MySqlConnection> {
    /// Connect to MySQL with `opts`.
    pub async fn connect_mysql(opts: &crate::config::ConnectOptions) -> DbResult<Self> {
        crate::mysql::MySqlConnection::connect(opts).await.map(Self::new)
    }
}

#[cfg(feature = "postgres")]
impl Database<crate::postgres::PgConnection> {
    /// Connect to PostgreSQL with `opts`.
    pub async fn connect_postgres(opts: &crate::config::ConnectOptions) -> DbResult<Self> {
        crate::postgres::PgConnection::connect(opts).await.map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::CollectingMonitor;
    use crate::testing::{FakeConnection, users_rows};

    fn db(conn: &FakeConnection) -> Database<FakeConnection> {
        Database::new(conn.clone()).with_monitor(CollectingMonitor::new())
    }

    fn last_sql(conn: &FakeConnection) -> String {
        conn.calls().last().map(|c| c.sql.clone()).unwrap_or_default()
    }

    #[tokio::test]
    async fn get_col_defaults_order_to_first_column() {
        let conn = FakeConnection::mysql().with_rows(users_rows());
        let db = db(&conn);
        let rs = db
            .get_col_from_table("users", "username", "id > 0", "", "", Some(5))
            .await
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(
            last_sql(&conn),
            "SELECT username FROM users WHERE id > 0 ORDER BY username ASC LIMIT 5"
        );
    }

    #[tokio::test]
    async fn get_col_explicit_order_and_no_clauses() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        db.get_col_from_table("users", "id, email", "", "email", "", None)
            .await
            .unwrap();
        assert_eq!(last_sql(&conn), "SELECT id, email FROM users ORDER BY email ASC");

        db.get_col_from_table("users", "*", "", "", "", None).await.unwrap();
        assert_eq!(last_sql(&conn), "SELECT * FROM users");
    }

    #[tokio::test]
    async fn get_col_honors_direction() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        db.get_col_from_table("users", "username, email", "", "", "DESC", Some(3))
            .await
            .unwrap();
        assert_eq!(
            last_sql(&conn),
            "SELECT username, email FROM users ORDER BY username DESC LIMIT 3"
        );

        db.get_col_from_table("users", "*", "", "id", "desc", None)
            .await
            .unwrap();
        assert_eq!(last_sql(&conn), "SELECT * FROM users ORDER BY id DESC");

        let err = db
            .get_col_from_table("users", "*", "", "", "sideways", None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn get_all_defaults() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        db.get_all_from_table("users", "", "", "", None).await.unwrap();
        assert_eq!(last_sql(&conn), "SELECT * FROM users ORDER BY ID ASC");

        db.get_all_from_table("users", "id > 0", "id", "desc", Some(5))
            .await
            .unwrap();
        assert_eq!(
            last_sql(&conn),
            "SELECT * FROM users WHERE id > 0 ORDER BY id DESC LIMIT 5"
        );
    }

    #[tokio::test]
    async fn get_all_rejects_negative_limit_and_bad_names() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        assert!(
            db.get_all_from_table("users", "", "", "", Some(-1))
                .await
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(
            db.get_all_from_table("users u", "", "", "", None)
                .await
                .unwrap_err()
                .is_invalid_identifier()
        );
        assert!(
            db.get_col_from_table("users", "name FROM secrets --", "", "", "", None)
                .await
                .unwrap_err()
                .is_invalid_identifier()
        );
        assert!(conn.calls().is_empty());
    }

    #[tokio::test]
    async fn random_row() {
        let conn = FakeConnection::mysql().with_rows(users_rows());
        let db = db(&conn);
        let rs = db.get_all_random_from_table("users", "id > 0").await.unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(
            last_sql(&conn),
            "SELECT * FROM users WHERE id > 0 ORDER BY RAND() LIMIT 1"
        );
    }

    #[tokio::test]
    async fn prep_binds_params() {
        let conn = FakeConnection::mysql().with_rows(users_rows());
        let db = db(&conn);
        let rs = db
            .get_all_from_table_prep("users", "id > ?", &[Value::Int(0)])
            .await
            .unwrap();
        assert!(!rs.is_empty());
        let call = conn.calls().pop().unwrap();
        assert_eq!(call.sql, "SELECT * FROM users WHERE id > ?");
        assert_eq!(call.params, vec![Value::Int(0)]);
    }

    #[tokio::test]
    async fn insert_binds_every_value() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        let outcome = db
            .insert_into_table(
                "users",
                &[
                    ("username", Value::from("testuser")),
                    ("email", Value::from("testuser@example.com")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert_eq!(outcome.last_insert_id, Some(1));
        let call = conn.calls().pop().unwrap();
        assert_eq!(call.sql, "INSERT INTO users (username, email) VALUES (?, ?)");
        assert_eq!(
            call.params,
            vec![Value::from("testuser"), Value::from("testuser@example.com")]
        );
    }

    #[tokio::test]
    async fn insert_rejects_empty_and_bad_columns() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        assert!(db.insert_into_table("users", &[]).await.unwrap_err().is_invalid_argument());
        assert!(
            db.insert_into_table("users", &[("a) VALUES (1); --", Value::Null)])
                .await
                .unwrap_err()
                .is_invalid_identifier()
        );
    }

    #[tokio::test]
    async fn update_binds_set_then_predicate() {
        let conn = FakeConnection::postgres();
        let db = db(&conn);
        db.update_table(
            "users",
            &[("username", Value::from("newuser"))],
            "id = ?",
            &[Value::Int(1)],
        )
        .await
        .unwrap();
        let call = conn.calls().pop().unwrap();
        assert_eq!(call.sql, "UPDATE users SET username = $1 WHERE id = $2");
        assert_eq!(call.params, vec![Value::from("newuser"), Value::Int(1)]);
    }

    #[tokio::test]
    async fn update_requires_set() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        assert!(
            db.update_table("users", &[], "id = 1", &[])
                .await
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[tokio::test]
    async fn delete_by_username_then_again() {
        let conn = FakeConnection::mysql().with_users(&["testuser"]);
        let db = db(&conn);
        let first = db
            .delete_from_table("users", "username = ?", &[Value::from("testuser")])
            .await
            .unwrap();
        assert_eq!(first.affected, 1);
        let second = db
            .delete_from_table("users", "username = ?", &[Value::from("testuser")])
            .await
            .unwrap();
        assert_eq!(second.affected, 0);
    }

    #[tokio::test]
    async fn delete_without_predicate_has_no_where() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        db.delete_from_table("users", "  ", &[]).await.unwrap();
        assert_eq!(last_sql(&conn), "DELETE FROM users");
    }

    #[tokio::test]
    async fn disconnect_then_not_connected() {
        let conn = FakeConnection::mysql();
        let db = db(&conn);
        db.disconnect().await.unwrap();
        assert!(!db.is_connected());
        let err = db.get_all_from_table("users", "", "", "", None).await.unwrap_err();
        assert!(err.is_not_connected());
        let err = db.insert_into_table("users", &[("id", Value::Int(1))]).await.unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn failure_event_is_tagged_with_operation() {
        let conn = FakeConnection::mysql().fail_next("Unknown column 'nope'");
        let monitor = CollectingMonitor::new();
        let db = Database::new(conn.clone()).with_monitor(monitor.clone());
        let err = db
            .get_all_from_table("users", "nope = 1", "", "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::QueryFailed { .. }));
        let events = monitor.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag.as_deref(), Some("get_all_from_table"));
        assert_eq!(events[0].cause, "Unknown column 'nope'");
    }
}
