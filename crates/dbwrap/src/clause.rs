//! Clause fragments: `WHERE`, `ORDER BY`, `LIMIT`.
//!
//! Every builder returns either a complete fragment or an empty string, and
//! [`compose_select`] joins the non-empty fragments with exactly one space, so
//! an absent clause never leaves a dangling keyword or doubled whitespace.
//!
//! # Raw predicates
//!
//! The predicate passed to [`build_where`] / [`ClauseSet::filter`] is spliced
//! into the statement **verbatim**. It is not validated or escaped. Never build
//! it from untrusted input; put values behind `?` placeholders and bind them
//! instead:
//!
//! ```
//! use dbwrap::{ClauseSet, Columns, OrderBy, TableRef, compose_select};
//!
//! let sql = compose_select(
//!     &Columns::parse("id, username")?,
//!     &TableRef::parse("users")?,
//!     &ClauseSet::new()
//!         .filter("username = ?")
//!         .order_by(OrderBy::desc("id")?)
//!         .limit(5),
//! )?;
//! assert_eq!(sql, "SELECT id, username FROM users WHERE username = ? ORDER BY id DESC LIMIT 5");
//! # Ok::<(), dbwrap::DbError>(())
//! ```

use crate::error::{DbError, DbResult};
use crate::ident::{Columns, Ident, IntoIdent, TableRef};
use std::fmt;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `ASC` / `DESC` (any case). Empty input means ascending.
    pub fn parse(s: &str) -> DbResult<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("ASC") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("DESC") {
            Ok(Direction::Desc)
        } else {
            Err(DbError::invalid_argument(format!(
                "invalid sort direction '{s}', expected ASC or DESC"
            )))
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: Ident,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(column: impl IntoIdent, direction: Direction) -> DbResult<Self> {
        Ok(Self {
            column: column.into_ident()?,
            direction,
        })
    }

    pub fn asc(column: impl IntoIdent) -> DbResult<Self> {
        Self::new(column, Direction::Asc)
    }

    pub fn desc(column: impl IntoIdent) -> DbResult<Self> {
        Self::new(column, Direction::Desc)
    }

    /// Resolve caller input: an empty `column` falls back to `default_column`,
    /// an empty `direction` means `ASC`.
    pub fn resolve(column: &str, direction: &str, default_column: &str) -> DbResult<Self> {
        let column = match column.trim() {
            "" => default_column.trim(),
            c => c,
        };
        Self::new(column, Direction::parse(direction)?)
    }

    pub fn to_sql(&self) -> String {
        format!("ORDER BY {} {}", self.column, self.direction)
    }
}

/// `WHERE <predicate>`, or `""` when the predicate is blank.
///
/// The predicate is raw SQL and is not escaped (see the module docs).
pub fn build_where(predicate: &str) -> String {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        String::new()
    } else {
        format!("WHERE {predicate}")
    }
}

/// `ORDER BY <col> <dir>`.
///
/// An empty `column` falls back to `default_column`; an empty `direction`
/// means `ASC`. The result is always a complete fragment.
pub fn build_order(column: &str, direction: &str, default_column: &str) -> DbResult<String> {
    OrderBy::resolve(column, direction, default_column).map(|o| o.to_sql())
}

/// `LIMIT <n>`, or `""` when no limit is given. Negative limits are rejected.
pub fn build_limit(n: Option<i64>) -> DbResult<String> {
    match n {
        None => Ok(String::new()),
        Some(n) if n < 0 => Err(DbError::invalid_argument(format!(
            "limit must be non-negative, got {n}"
        ))),
        Some(n) => Ok(format!("LIMIT {n}")),
    }
}

/// Optional clauses of a statement. Built per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseSet {
    predicate: Option<String>,
    order: Option<OrderBy>,
    limit: Option<i64>,
}

impl ClauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw `WHERE` predicate. Blank predicates are ignored.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        self.predicate = (!predicate.trim().is_empty()).then_some(predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    /// Order by caller input, resolved like [`build_order`].
    pub fn order_by_input(self, column: &str, direction: &str, default_column: &str) -> DbResult<Self> {
        Ok(self.order_by(OrderBy::resolve(column, direction, default_column)?))
    }

    /// Set the row limit. Validated when the statement is rendered.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn maybe_limit(mut self, n: Option<i64>) -> Self {
        self.limit = n;
        self
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn where_sql(&self) -> String {
        build_where(self.predicate.as_deref().unwrap_or(""))
    }

    pub fn order_sql(&self) -> String {
        self.order.as_ref().map(OrderBy::to_sql).unwrap_or_default()
    }

    pub fn limit_sql(&self) -> DbResult<String> {
        build_limit(self.limit)
    }
}

/// Join fragments with single spaces, dropping empty ones.
pub(crate) fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .map(|f| f.as_ref().trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `SELECT <columns> FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT ..]`.
pub fn compose_select(columns: &Columns, table: &TableRef, clauses: &ClauseSet) -> DbResult<String> {
    let limit = clauses.limit_sql()?;
    Ok(join_fragments(&[
        "SELECT".to_string(),
        columns.to_sql(),
        "FROM".to_string(),
        table.to_string(),
        clauses.where_sql(),
        clauses.order_sql(),
        limit,
    ]))
}
