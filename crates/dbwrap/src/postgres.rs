//! PostgreSQL backend over `tokio-postgres`.

use crate::client::Connection;
use crate::config::ConnectOptions;
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use crate::value::{ExecutionOutcome, ResultSet, Row, Value, widen_f32};
use bytes::BytesMut;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls};

/// A single PostgreSQL connection.
///
/// `tokio_postgres::Client` pipelines concurrent requests itself, so queries
/// only take a shared read guard; [`Connection::close`] takes the write guard.
pub struct PgConnection {
    client: RwLock<Option<Client>>,
    task: StdMutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
}

impl PgConnection {
    /// Open a connection (no TLS) and set the client encoding.
    pub async fn connect(opts: &ConnectOptions) -> DbResult<Self> {
        let encoding = client_encoding(&opts.charset)?;

        let mut config = tokio_postgres::Config::new();
        config
            .host(&opts.host)
            .port(opts.port)
            .user(&opts.user)
            .password(&opts.password);
        if let Some(db) = opts.effective_database() {
            config.dbname(db);
        }

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            tracing::error!(target: "dbwrap", host = %opts.host, port = opts.port, "Connection failed: {e}");
            DbError::Connection(e.to_string())
        })?;
        let task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "dbwrap", "tokio-postgres connection error: {e}");
            }
        });

        client
            .batch_execute(&format!("SET client_encoding TO '{encoding}'"))
            .await
            .map_err(|e| DbError::Connection(format!("failed to set client encoding: {e}")))?;

        tracing::debug!(target: "dbwrap", host = %opts.host, port = opts.port, "Database connection established");
        Ok(Self {
            client: RwLock::new(Some(client)),
            task: StdMutex::new(Some(task)),
            open: AtomicBool::new(true),
        })
    }

    /// Wrap a client whose connection future is driven elsewhere.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            task: StdMutex::new(None),
            open: AtomicBool::new(true),
        }
    }
}

/// Map a MySQL-style charset name to a PostgreSQL client encoding.
fn client_encoding(charset: &str) -> DbResult<String> {
    match charset.to_ascii_lowercase().as_str() {
        "utf8" | "utf8mb3" | "utf8mb4" => Ok("UTF8".to_string()),
        "latin1" => Ok("LATIN1".to_string()),
        other if !other.is_empty() && other.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Ok(other.to_ascii_uppercase())
        }
        other => Err(DbError::Config(format!("invalid charset '{other}'"))),
    }
}

type BoxError = Box<dyn StdError + Sync + Send>;

fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => v.to_string().to_sql(ty, out),
        _ => v.to_sql(ty, out),
    }
}

/// Values adapt to the parameter type the server inferred for each `$n`.
impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Int(v) => int_to_sql(*v, ty, out),
            Value::UInt(v) => int_to_sql(i64::try_from(*v)?, ty, out),
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Bytes(b) => b.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn cell<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, f: F) -> Result<Value, tokio_postgres::Error>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    Ok(row.try_get::<_, Option<T>>(idx)?.map_or(Value::Null, f))
}

fn to_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    match *ty {
        Type::BOOL => cell(row, idx, Value::Bool),
        Type::INT2 => cell(row, idx, |v: i16| Value::Int(i64::from(v))),
        Type::INT4 => cell(row, idx, |v: i32| Value::Int(i64::from(v))),
        Type::INT8 => cell(row, idx, Value::Int),
        Type::OID => cell(row, idx, |v: u32| Value::UInt(u64::from(v))),
        Type::FLOAT4 => cell(row, idx, |v: f32| Value::Float(widen_f32(v))),
        Type::FLOAT8 => cell(row, idx, Value::Float),
        Type::BYTEA => cell(row, idx, Value::Bytes),
        Type::JSON | Type::JSONB => cell(row, idx, |v: serde_json::Value| Value::Text(v.to_string())),
        Type::TIMESTAMP => cell(row, idx, |v: chrono::NaiveDateTime| Value::Text(v.to_string())),
        Type::TIMESTAMPTZ => cell(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            Value::Text(v.to_rfc3339())
        }),
        Type::DATE => cell(row, idx, |v: chrono::NaiveDate| Value::Text(v.to_string())),
        Type::TIME => cell(row, idx, |v: chrono::NaiveTime| Value::Text(v.to_string())),
        // Text-like types; anything else must be cast to text in SQL.
        _ => cell(row, idx, Value::Text),
    }
}

fn to_result_set(rows: Vec<tokio_postgres::Row>) -> DbResult<ResultSet> {
    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };
    let names: Arc<[String]> = first.columns().iter().map(|c| c.name().to_string()).collect();
    let types: Vec<Type> = first.columns().iter().map(|c| c.type_().clone()).collect();

    rows.iter()
        .map(|row| {
            let values = types
                .iter()
                .enumerate()
                .map(|(idx, ty)| {
                    to_value(row, idx, ty).map_err(|e| DbError::decode(names[idx].as_str(), e.to_string()))
                })
                .collect::<DbResult<Vec<_>>>()?;
            Row::new(Arc::clone(&names), values)
        })
        .collect::<DbResult<Vec<_>>>()
        .map(ResultSet::new)
}

fn bind_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Connection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        let guard = self.client.read().await;
        let client = guard.as_ref().filter(|c| !c.is_closed()).ok_or(DbError::NotConnected)?;
        let rows = client
            .query(sql, &bind_refs(params))
            .await
            .map_err(DbError::query_failed)?;
        to_result_set(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecutionOutcome> {
        let guard = self.client.read().await;
        let client = guard.as_ref().filter(|c| !c.is_closed()).ok_or(DbError::NotConnected)?;
        let affected = client
            .execute(sql, &bind_refs(params))
            .await
            .map_err(DbError::execution_failed)?;
        Ok(ExecutionOutcome::affected(affected))
    }

    async fn batch_execute(&self, script: &str) -> DbResult<()> {
        let guard = self.client.read().await;
        let client = guard.as_ref().filter(|c| !c.is_closed()).ok_or(DbError::NotConnected)?;
        client
            .batch_execute(script)
            .await
            .map_err(DbError::execution_failed)
    }

    async fn close(&self) -> DbResult<()> {
        self.open.store(false, Ordering::Release);
        // Dropping the client ends the connection task.
        drop(self.client.write().await.take());
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            task.await
                .map_err(|e| DbError::Connection(format!("connection task failed: {e}")))?;
        }
        Ok(())
    }
}
