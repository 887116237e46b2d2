//! Safe SQL identifier handling.
//!
//! Identifiers (table and column names) can't be sent as bound parameters, so
//! they are spliced into the SQL text. To keep that safe every identifier is
//! validated against a strict allow-list: one or more of `[A-Za-z0-9_]`, at
//! most [`MAX_IDENT_LEN`] characters. No quoting, no dotted paths.
//!
//! # Example
//! ```
//! use dbwrap::{Columns, Ident, TableRef};
//!
//! let t = TableRef::parse("users")?;
//! let c = Columns::parse("id, username")?;
//! assert!(Ident::parse("users; DROP TABLE users").is_err());
//! # Ok::<(), dbwrap::DbError>(())
//! ```

use crate::error::{DbError, DbResult};
use std::fmt;

/// Longest identifier accepted (MySQL's limit).
pub const MAX_IDENT_LEN: usize = 64;

/// A validated SQL identifier (column or table name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate `s` against the identifier allow-list.
    pub fn parse(s: &str) -> DbResult<Self> {
        if s.is_empty() {
            return Err(DbError::invalid_identifier("identifier cannot be empty"));
        }
        if s.len() > MAX_IDENT_LEN {
            return Err(DbError::invalid_identifier(format!(
                "identifier longer than {MAX_IDENT_LEN} characters"
            )));
        }
        if let Some(c) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(DbError::invalid_identifier(format!(
                "invalid character {c:?} in identifier '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef(Ident);

impl TableRef {
    pub fn parse(s: &str) -> DbResult<Self> {
        Ident::parse(s).map(Self)
    }

    pub fn ident(&self) -> &Ident {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The projection of a `SELECT`: `*` or a non-empty list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    All,
    List(Vec<Ident>),
}

impl Columns {
    /// Parse `*` or a comma-separated column list such as `"id, username"`.
    ///
    /// Whitespace around each name is ignored; empty entries are rejected.
    pub fn parse(s: &str) -> DbResult<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::All);
        }
        if s.is_empty() {
            return Err(DbError::invalid_argument("column list cannot be empty"));
        }
        let idents = s
            .split(',')
            .map(|part| Ident::parse(part.trim()))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self::List(idents))
    }

    /// Build a list from already-separated names.
    pub fn from_names<I, S>(names: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let idents = names
            .into_iter()
            .map(|n| Ident::parse(n.as_ref()))
            .collect::<DbResult<Vec<_>>>()?;
        if idents.is_empty() {
            return Err(DbError::invalid_argument("column list cannot be empty"));
        }
        Ok(Self::List(idents))
    }

    /// First named column, if the projection is an explicit list.
    pub fn first(&self) -> Option<&Ident> {
        match self {
            Self::All => None,
            Self::List(cols) => cols.first(),
        }
    }

    /// Render the projection as SQL.
    pub fn to_sql(&self) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::List(cols) => cols
                .iter()
                .map(Ident::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Convert an input into an [`Ident`].
///
/// This is mainly for ergonomics in builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> DbResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> DbResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> DbResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> DbResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> DbResult<Ident> {
        Ident::parse(&self)
    }
}
