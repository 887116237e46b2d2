//! Dialect handling and placeholder scanning.
//!
//! Statements are written with `?` positional placeholders. Before they reach
//! the driver, [`Dialect::prepare`] counts the placeholders (so a parameter
//! count mismatch fails before any I/O) and, for PostgreSQL, rewrites them to
//! `$1, $2, ...`.
//!
//! The scanner skips placeholders that appear inside string literals, quoted
//! identifiers and comments, including PostgreSQL `E'..'` escape strings and
//! `$tag$..$tag$` dollar-quoted bodies.

use crate::error::{DbError, DbResult};

/// SQL flavor spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL / MariaDB: `?` placeholders, `RAND()`, backslash escapes in strings.
    MySql,
    /// PostgreSQL: `$n` placeholders, `RANDOM()`.
    Postgres,
}

impl Dialect {
    /// Function used to shuffle rows in `ORDER BY`.
    pub fn random_function(self) -> &'static str {
        match self {
            Dialect::MySql => "RAND()",
            Dialect::Postgres => "RANDOM()",
        }
    }

    /// Number of `?` placeholders in `sql`.
    pub fn count_placeholders(self, sql: &str) -> usize {
        placeholder_offsets(sql, self).len()
    }

    /// Check `param_count` against the placeholders in `sql` and return the SQL
    /// in the form the driver expects.
    ///
    /// Every bare `?` is a placeholder, so PostgreSQL's JSONB operators `?`,
    /// `?|` and `?&` cannot be written directly; use `jsonb_exists`,
    /// `jsonb_exists_any` and `jsonb_exists_all` instead.
    pub fn prepare(self, sql: &str, param_count: usize) -> DbResult<String> {
        let offsets = placeholder_offsets(sql, self);
        if offsets.len() != param_count {
            return Err(DbError::invalid_argument(format!(
                "statement has {} placeholder(s) but {} parameter(s) were bound",
                offsets.len(),
                param_count
            )));
        }
        Ok(match self {
            Dialect::MySql => sql.to_string(),
            Dialect::Postgres => number_placeholders(sql, &offsets),
        })
    }
}

/// Byte offsets of every `?` placeholder outside literals and comments.
fn placeholder_offsets(sql: &str, dialect: Dialect) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'?' => {
                out.push(i);
                i += 1;
            }
            b'E' | b'e'
                if dialect == Dialect::Postgres
                    && bytes.get(i + 1) == Some(&b'\'')
                    && !preceded_by_word(bytes, i) =>
            {
                i = skip_quoted(bytes, i + 1, b'\'', true);
            }
            b'$' if dialect == Dialect::Postgres && !preceded_by_word(bytes, i) => {
                i = match dollar_tag_end(bytes, i) {
                    Some(body) => match find(bytes, body, &bytes[i..body]) {
                        Some(close) => close + (body - i),
                        None => bytes.len(),
                    },
                    None => i + 1,
                };
            }
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote, dialect == Dialect::MySql && quote != b'`');
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_line(bytes, i);
            }
            b'#' if dialect == Dialect::MySql => {
                i = skip_line(bytes, i);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match find(bytes, i + 2, b"*/") {
                    Some(end) => end + 2,
                    None => bytes.len(),
                };
            }
            _ => i += 1,
        }
    }
    out
}

/// Returns the index just past the closing quote (or the end of input).
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            // Doubled quote is an escaped quote
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn preceded_by_word(bytes: &[u8], i: usize) -> bool {
    i > 0 && (is_word_byte(bytes[i - 1]) || bytes[i - 1] == b'$')
}

/// For a `$tag$` opener at `start`, the index just past it. `$1` and other
/// non-openers return `None`.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if bytes.get(i).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    while bytes.get(i).copied().is_some_and(is_word_byte) {
        i += 1;
    }
    (bytes.get(i) == Some(&b'$')).then_some(i + 1)
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    match bytes[start..].iter().position(|&b| b == b'\n') {
        Some(pos) => start + pos + 1,
        None => bytes.len(),
    }
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn number_placeholders(sql: &str, offsets: &[usize]) -> String {
    let mut out = String::with_capacity(sql.len() + offsets.len() * 2);
    let mut last = 0;
    for (n, &off) in offsets.iter().enumerate() {
        out.push_str(&sql[last..off]);
        out.push('$');
        out.push_str(&(n + 1).to_string());
        last = off + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// Truncate `sql` to at most `max_bytes`, on a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
