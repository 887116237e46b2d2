//! MySQL / MariaDB backend over `mysql_async`.

use crate::client::Connection;
use crate::config::ConnectOptions;
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use crate::value::{ExecutionOutcome, ResultSet, Row, Value, widen_f32};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Character set id MySQL reports for binary strings (and for DECIMAL, JSON
/// and numeric aggregates, which are still text).
const BINARY_CHARSET: u16 = 63;

/// A single MySQL connection.
///
/// `mysql_async::Conn` is not reentrant, so every call takes an async mutex
/// for its whole round trip. Statements on one `MySqlConnection` therefore
/// run one at a time, in call order.
pub struct MySqlConnection {
    conn: Mutex<Option<Conn>>,
    open: AtomicBool,
}

impl MySqlConnection {
    /// Open a connection and negotiate charset and collation.
    ///
    /// Fails with [`DbError::Connection`] if the server can't be reached or
    /// rejects the handshake.
    pub async fn connect(opts: &ConnectOptions) -> DbResult<Self> {
        let set_names = opts.set_names_sql()?;
        let builder = OptsBuilder::default()
            .ip_or_hostname(opts.host.clone())
            .tcp_port(opts.port)
            .user(Some(opts.user.clone()))
            .pass(Some(opts.password.clone()))
            .db_name(opts.effective_database().map(str::to_string));

        let mut conn = Conn::new(builder).await.map_err(|e| {
            tracing::error!(target: "dbwrap", host = %opts.host, port = opts.port, "Connection failed: {e}");
            DbError::Connection(e.to_string())
        })?;
        conn.query_drop(set_names)
            .await
            .map_err(|e| DbError::Connection(format!("failed to set charset: {e}")))?;

        tracing::debug!(target: "dbwrap", host = %opts.host, port = opts.port, "Database connection established");
        Ok(Self::from_conn(conn))
    }

    /// Wrap an already-open connection.
    pub fn from_conn(conn: Conn) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            open: AtomicBool::new(true),
        }
    }
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql_value).collect())
    }
}

fn to_mysql_value(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as My;
    match value {
        Value::Null => My::NULL,
        Value::Bool(b) => My::Int(i64::from(*b)),
        Value::Int(v) => My::Int(*v),
        Value::UInt(v) => My::UInt(*v),
        Value::Float(v) => My::Double(*v),
        Value::Text(s) => My::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => My::Bytes(b.clone()),
    }
}

/// How a column's byte payload is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Text,
    Binary,
}

/// BIT and GEOMETRY are always binary; the string and BLOB families only with
/// the binary charset. Everything else arriving as bytes is text.
fn cell_kind(column_type: ColumnType, charset: u16) -> CellKind {
    match column_type {
        ColumnType::MYSQL_TYPE_BIT | ColumnType::MYSQL_TYPE_GEOMETRY => CellKind::Binary,
        ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
            if charset == BINARY_CHARSET =>
        {
            CellKind::Binary
        }
        _ => CellKind::Text,
    }
}

fn from_mysql_value(value: mysql_async::Value, kind: CellKind) -> Value {
    use mysql_async::Value as My;
    match value {
        My::NULL => Value::Null,
        My::Int(v) => Value::Int(v),
        My::UInt(v) => Value::UInt(v),
        My::Float(v) => Value::Float(widen_f32(v)),
        My::Double(v) => Value::Float(v),
        My::Bytes(b) if kind == CellKind::Binary => Value::Bytes(b),
        My::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        My::Date(y, mo, d, h, mi, s, us) => Value::Text(format_date(y, mo, d, h, mi, s, us)),
        My::Time(neg, days, h, mi, s, us) => Value::Text(format_time(neg, days, h, mi, s, us)),
    }
}

fn format_date(y: u16, mo: u8, d: u8, h: u8, mi: u8, s: u8, us: u32) -> String {
    let date = format!("{y:04}-{mo:02}-{d:02}");
    match (h, mi, s, us) {
        (0, 0, 0, 0) => date,
        (_, _, _, 0) => format!("{date} {h:02}:{mi:02}:{s:02}"),
        _ => format!("{date} {h:02}:{mi:02}:{s:02}.{us:06}"),
    }
}

fn format_time(neg: bool, days: u32, h: u8, mi: u8, s: u8, us: u32) -> String {
    let sign = if neg { "-" } else { "" };
    let hours = days * 24 + u32::from(h);
    if us == 0 {
        format!("{sign}{hours:02}:{mi:02}:{s:02}")
    } else {
        format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}")
    }
}

fn to_result_set(rows: Vec<mysql_async::Row>) -> DbResult<ResultSet> {
    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };
    let meta = first.columns();
    let names: Arc<[String]> = meta.iter().map(|c| c.name_str().into_owned()).collect();
    let kinds: Vec<CellKind> = meta
        .iter()
        .map(|c| cell_kind(c.column_type(), c.character_set()))
        .collect();

    decode_rows(names, &kinds, rows.into_iter().map(mysql_async::Row::unwrap))
}

fn decode_rows(
    names: Arc<[String]>,
    kinds: &[CellKind],
    rows: impl IntoIterator<Item = Vec<mysql_async::Value>>,
) -> DbResult<ResultSet> {
    rows.into_iter()
        .map(|values| {
            let values = values
                .into_iter()
                .zip(kinds.iter())
                .map(|(v, &kind)| from_mysql_value(v, kind))
                .collect();
            Row::new(Arc::clone(&names), values)
        })
        .collect::<DbResult<Vec<_>>>()
        .map(ResultSet::new)
}

impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> DbResult<ResultSet> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::NotConnected)?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, to_params(params))
            .await
            .map_err(DbError::query_failed)?;
        to_result_set(rows)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<ExecutionOutcome> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::NotConnected)?;
        conn.exec_drop(sql, to_params(params))
            .await
            .map_err(DbError::execution_failed)?;
        Ok(ExecutionOutcome {
            affected: conn.affected_rows(),
            last_insert_id: conn.last_insert_id().filter(|&id| id != 0),
        })
    }

    async fn batch_execute(&self, script: &str) -> DbResult<()> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(DbError::NotConnected)?;
        conn.query_drop(script)
            .await
            .map_err(DbError::execution_failed)
    }

    async fn close(&self) -> DbResult<()> {
        self.open.store(false, Ordering::Release);
        let conn = self.conn.lock().await.take();
        match conn {
            Some(conn) => conn
                .disconnect()
                .await
                .map_err(|e| DbError::Connection(e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::Value as My;

    #[test]
    fn binds_every_value_kind() {
        let params = to_params(&[
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::UInt(7),
            Value::Float(1.5),
            Value::from("héllo"),
            Value::Bytes(vec![0, 1]),
        ]);
        let Params::Positional(values) = params else {
            panic!("expected positional params");
        };
        assert_eq!(
            values,
            vec![
                My::NULL,
                My::Int(1),
                My::Int(-3),
                My::UInt(7),
                My::Double(1.5),
                My::Bytes("héllo".as_bytes().to_vec()),
                My::Bytes(vec![0, 1]),
            ]
        );
    }

    #[test]
    fn no_params_is_empty() {
        assert!(matches!(to_params(&[]), Params::Empty));
    }

    #[test]
    fn text_and_binary_columns() {
        use CellKind::{Binary, Text};
        assert_eq!(from_mysql_value(My::Bytes(b"abc".to_vec()), Text), Value::from("abc"));
        assert_eq!(
            from_mysql_value(My::Bytes(b"abc".to_vec()), Binary),
            Value::Bytes(b"abc".to_vec())
        );
        assert_eq!(
            from_mysql_value(My::Bytes(vec![0xff, 0xfe]), Text),
            Value::Bytes(vec![0xff, 0xfe])
        );
        assert_eq!(from_mysql_value(My::Float(0.5), Text), Value::Float(0.5));
        assert_eq!(from_mysql_value(My::Float(0.1), Text), Value::Float(0.1));
    }

    #[test]
    fn binary_charset_alone_does_not_make_a_column_binary() {
        use ColumnType::*;
        assert_eq!(cell_kind(MYSQL_TYPE_NEWDECIMAL, BINARY_CHARSET), CellKind::Text);
        assert_eq!(cell_kind(MYSQL_TYPE_DECIMAL, BINARY_CHARSET), CellKind::Text);
        assert_eq!(cell_kind(MYSQL_TYPE_JSON, BINARY_CHARSET), CellKind::Text);
        assert_eq!(cell_kind(MYSQL_TYPE_BLOB, BINARY_CHARSET), CellKind::Binary);
        assert_eq!(cell_kind(MYSQL_TYPE_VAR_STRING, BINARY_CHARSET), CellKind::Binary);
        assert_eq!(cell_kind(MYSQL_TYPE_BIT, BINARY_CHARSET), CellKind::Binary);
        // utf8mb4 TEXT / VARCHAR
        assert_eq!(cell_kind(MYSQL_TYPE_BLOB, 45), CellKind::Text);
        assert_eq!(cell_kind(MYSQL_TYPE_VAR_STRING, 45), CellKind::Text);
    }

    #[test]
    fn decimal_column_decodes_as_number() {
        let names: Arc<[String]> = vec!["total".to_string()].into();
        let kinds = [cell_kind(ColumnType::MYSQL_TYPE_NEWDECIMAL, BINARY_CHARSET)];
        let rs = decode_rows(names, &kinds, vec![vec![My::Bytes(b"12.50".to_vec())]]).unwrap();

        let row = rs.first().unwrap();
        assert_eq!(row.get("total"), Some(&Value::from("12.50")));
        assert_eq!(row.try_get::<f64>("total").unwrap(), 12.5);
        assert_eq!(rs.to_json(), serde_json::json!([{"total": "12.50"}]));
    }

    #[test]
    fn dates_render_as_text() {
        assert_eq!(
            from_mysql_value(My::Date(2024, 2, 29, 0, 0, 0, 0), CellKind::Text),
            Value::from("2024-02-29")
        );
        assert_eq!(
            from_mysql_value(My::Date(2024, 2, 29, 13, 5, 9, 0), CellKind::Text),
            Value::from("2024-02-29 13:05:09")
        );
        assert_eq!(
            from_mysql_value(My::Date(2024, 2, 29, 13, 5, 9, 120), CellKind::Text),
            Value::from("2024-02-29 13:05:09.000120")
        );
        assert_eq!(
            from_mysql_value(My::Time(true, 1, 2, 3, 4, 0), CellKind::Text),
            Value::from("-26:03:04")
        );
    }

    #[test]
    fn empty_rows_make_empty_set() {
        assert!(to_result_set(Vec::new()).unwrap().is_empty());
    }
}
