//! In-memory connection used by unit tests.

use crate::client::Connection;
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use crate::value::{ExecutionOutcome, ResultSet, Row, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub sql: String,
    pub params: Vec<Value>,
}

struct Inner {
    dialect: Dialect,
    connected: AtomicBool,
    rows: Mutex<ResultSet>,
    usernames: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
}

/// Returns `rows` for every read. Writes understand just enough SQL to
/// simulate a `users` table keyed by username.
#[derive(Clone)]
pub(crate) struct FakeConnection {
    inner: Arc<Inner>,
}

pub(crate) fn users_rows() -> ResultSet {
    let cols: Arc<[String]> = vec!["id".to_string(), "username".to_string(), "email".to_string()].into();
    let row = Row::new(
        cols,
        vec![
            Value::Int(1),
            Value::from("testuser"),
            Value::from("t@example.com"),
        ],
    )
    .unwrap();
    ResultSet::new(vec![row])
}

impl FakeConnection {
    fn new(dialect: Dialect) -> Self {
        Self {
            inner: Arc::new(Inner {
                dialect,
                connected: AtomicBool::new(true),
                rows: Mutex::new(ResultSet::default()),
                usernames: Mutex::new(Vec::new()),
                fail_next: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn mysql() -> Self {
        Self::new(Dialect::MySql)
    }

    pub fn postgres() -> Self {
        Self::new(Dialect::Postgres)
    }

    pub fn with_rows(self, rows: ResultSet) -> Self {
        *self.inner.rows.lock().unwrap() = rows;
        self
    }

    pub fn with_users(self, names: &[&str]) -> Self {
        *self.inner.usernames.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// The next driver call fails with `cause`.
    pub fn fail_next(self, cause: &str) -> Self {
        *self.inner.fail_next.lock().unwrap() = Some(cause.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[Value]) -> Result<(), String> {
        self.inner.calls.lock().unwrap().push(Call {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match self.inner.fail_next.lock().unwrap().take() {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    fn check_open(&self) -> DbResult<()> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::NotConnected)
        }
    }
}

impl Connection for FakeConnection {
    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        self.check_open()?;
        self.record(sql, params).map_err(DbError::query_failed)?;
        Ok(self.inner.rows.lock().unwrap().clone())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecutionOutcome> {
        self.check_open()?;
        self.record(sql, params).map_err(DbError::execution_failed)?;

        if sql.starts_with("INSERT") {
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            return Ok(ExecutionOutcome {
                affected: 1,
                last_insert_id: Some(id),
            });
        }
        if sql.starts_with("DELETE FROM users WHERE username = ") {
            let Some(Value::Text(name)) = params.first() else {
                return Ok(ExecutionOutcome::affected(0));
            };
            let mut users = self.inner.usernames.lock().unwrap();
            let before = users.len();
            users.retain(|u| u != name);
            return Ok(ExecutionOutcome::affected((before - users.len()) as u64));
        }
        Ok(ExecutionOutcome::affected(0))
    }

    async fn batch_execute(&self, script: &str) -> DbResult<()> {
        self.check_open()?;
        self.record(script, &[]).map_err(DbError::execution_failed)
    }

    async fn close(&self) -> DbResult<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
