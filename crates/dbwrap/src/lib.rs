//! # dbwrap
//!
//! A small SQL wrapper over MySQL or PostgreSQL.
//!
//! ## Features
//!
//! - **Safe clause composition**: table, column and ORDER BY names are validated identifiers
//! - **Bound parameters**: values travel as `?` placeholders, rewritten to `$n` for PostgreSQL
//! - **Injected connections**: anything implementing [`Connection`] can back an [`Executor`]
//! - **Failure reporting**: every driver failure is reported once to a [`FailureMonitor`]
//! - **Env configuration**: connection and logging settings come from `.env` / the environment
//!
//! ## Example
//!
//! ```ignore
//! use dbwrap::{ConnectOptions, Database, Value};
//!
//! let opts = ConnectOptions::from_env()?;
//! let db = Database::connect_mysql(&opts).await?;
//!
//! db.insert_into_table("users", &[("username", Value::from("alice"))]).await?;
//! let rows = db.get_all_from_table("users", "", "id", "DESC", Some(10)).await?;
//! for row in &rows {
//!     let name: String = row.try_get("username")?;
//!     println!("{name}");
//! }
//! db.disconnect().await?;
//! ```

pub mod clause;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod ident;
pub mod monitor;
pub mod sql;
pub mod value;

pub use clause::{ClauseSet, Direction, OrderBy, build_limit, build_order, build_where, compose_select};
pub use client::Connection;
pub use config::{ConnectOptions, Driver, LogSettings, load_env_file};
pub use database::{DEFAULT_ORDER_COLUMN, Database};
pub use error::{DbError, DbResult};
pub use executor::Executor;
pub use ident::{Columns, Ident, IntoIdent, TableRef};
pub use monitor::{
    CollectingMonitor, FailureEvent, FailureMonitor, NoopMonitor, Operation, TracingMonitor,
};
pub use sql::Dialect;
pub use value::{ExecutionOutcome, FromValue, ResultSet, Row, Value};

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "mysql")]
pub use mysql::MySqlConnection;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgConnection;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{ensure_log_file, init_file_logging};

#[cfg(test)]
mod testing;
