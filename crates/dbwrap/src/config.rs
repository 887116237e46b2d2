//! Connection and logging settings.
//!
//! Settings are read from the process environment, optionally seeded from a
//! `.env` file with `dotenvy`:
//!
//! | key            | meaning                               | default              |
//! |----------------|---------------------------------------|----------------------|
//! | `DB_DRIVER`    | `mysql` or `postgres`                 | `mysql`              |
//! | `DB_HOST`      | server host name or address           | required             |
//! | `DB_PORT`      | server port                           | 3306 / 5432          |
//! | `DB_USER`      | user name                             | required             |
//! | `DB_PASS`      | password                              | empty                |
//! | `DB_NAME`      | schema to select                      | none                 |
//! | `DB_CHARSET`   | connection character set              | `utf8mb4`            |
//! | `DB_COLLATION` | connection collation                  | `utf8mb4_general_ci` |
//! | `DEBUG`        | `true` enables debug-level logging    | `false`              |
//! | `LOG_PATH`     | log file written by `logging`         | none                 |

use crate::error::{DbError, DbResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which backend to connect to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Driver {
    #[default]
    MySql,
    Postgres,
}

impl Driver {
    pub fn parse(s: &str) -> DbResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "mysql" | "mariadb" => Ok(Driver::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            other => Err(DbError::Config(format!("unknown DB_DRIVER '{other}'"))),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Driver::MySql => 3306,
            Driver::Postgres => 5432,
        }
    }
}

/// Load a `.env` file into the process environment.
///
/// With `None`, looks for `.env` in the current directory and its parents
/// and ignores a missing file. An explicit path must exist.
pub fn load_env_file(path: Option<&Path>) -> DbResult<()> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| DbError::Config(format!("failed to load {}: {e}", path.display()))),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(e) => Err(DbError::Config(e.to_string())),
        },
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parameters needed to open a connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub charset: String,
    pub collation: String,
    /// When `false`, connect to the server without selecting `database`.
    pub select_database: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            driver: Driver::MySql,
            host: "localhost".to_string(),
            port: Driver::MySql.default_port(),
            user: String::new(),
            password: String::new(),
            database: None,
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_general_ci".to_string(),
            select_database: true,
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .field("select_database", &self.select_database)
            .finish()
    }
}

impl ConnectOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read options from the environment after loading `.env` if present.
    pub fn from_env() -> DbResult<Self> {
        load_env_file(None)?;
        Self::from_lookup(env_lookup)
    }

    /// Read options through `lookup` (a key → value function).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| DbError::Config(format!("{key} is not set")));

        let driver = Driver::parse(&get("DB_DRIVER").unwrap_or_default())?;
        let port = match get("DB_PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|e| DbError::Config(format!("DB_PORT '{p}' is not a valid port: {e}")))?,
            None => driver.default_port(),
        };
        let defaults = Self::default();

        Ok(Self {
            driver,
            host: require("DB_HOST")?,
            port,
            user: require("DB_USER")?,
            password: lookup("DB_PASS").unwrap_or_default(),
            database: get("DB_NAME"),
            charset: get("DB_CHARSET").unwrap_or(defaults.charset),
            collation: get("DB_COLLATION").unwrap_or(defaults.collation),
            select_database: true,
        })
    }

    pub fn driver(mut self, driver: Driver) -> Self {
        self.driver = driver;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = collation.into();
        self
    }

    /// Connect to the server only, e.g. to create or drop a schema.
    pub fn without_database(mut self) -> Self {
        self.select_database = false;
        self
    }

    /// The schema to select on connect, if any.
    pub fn effective_database(&self) -> Option<&str> {
        if self.select_database {
            self.database.as_deref()
        } else {
            None
        }
    }

    /// `SET NAMES` statement for the configured charset and collation.
    pub fn set_names_sql(&self) -> DbResult<String> {
        for (key, value) in [("charset", &self.charset), ("collation", &self.collation)] {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(DbError::Config(format!("invalid {key} '{value}'")));
            }
        }
        Ok(format!("SET NAMES {} COLLATE {}", self.charset, self.collation))
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    /// `DEBUG=true` lowers the threshold from `ERROR` to `DEBUG`.
    pub debug: bool,
    pub path: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> DbResult<Self> {
        load_env_file(None)?;
        Ok(Self::from_lookup(env_lookup))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            debug: lookup("DEBUG").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            path: lookup("LOG_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn reads_full_mysql_settings() {
        let opts = ConnectOptions::from_lookup(lookup(&[
            ("DB_HOST", "db.local"),
            ("DB_PORT", "3307"),
            ("DB_USER", "app"),
            ("DB_PASS", "s3cret"),
            ("DB_NAME", "shop"),
            ("DB_CHARSET", "utf8"),
            ("DB_COLLATION", "utf8_unicode_ci"),
        ]))
        .unwrap();
        assert_eq!(opts.driver, Driver::MySql);
        assert_eq!(opts.host, "db.local");
        assert_eq!(opts.port, 3307);
        assert_eq!(opts.user, "app");
        assert_eq!(opts.password, "s3cret");
        assert_eq!(opts.effective_database(), Some("shop"));
        assert_eq!(opts.set_names_sql().unwrap(), "SET NAMES utf8 COLLATE utf8_unicode_ci");
    }

    #[test]
    fn applies_defaults() {
        let opts = ConnectOptions::from_lookup(lookup(&[
            ("DB_DRIVER", "postgres"),
            ("DB_HOST", "localhost"),
            ("DB_USER", "postgres"),
        ]))
        .unwrap();
        assert_eq!(opts.driver, Driver::Postgres);
        assert_eq!(opts.port, 5432);
        assert_eq!(opts.password, "");
        assert_eq!(opts.database, None);
        assert_eq!(opts.charset, "utf8mb4");
    }

    #[test]
    fn missing_required_keys_fail() {
        let err = ConnectOptions::from_lookup(lookup(&[("DB_USER", "app")])).unwrap_err();
        assert_eq!(err, DbError::Config("DB_HOST is not set".into()));
    }

    #[test]
    fn bad_port_and_driver_fail() {
        assert!(
            ConnectOptions::from_lookup(lookup(&[
                ("DB_HOST", "h"),
                ("DB_USER", "u"),
                ("DB_PORT", "99999"),
            ]))
            .is_err()
        );
        assert!(Driver::parse("oracle").is_err());
    }

    #[test]
    fn without_database_skips_schema() {
        let opts = ConnectOptions::new().database("test_database").without_database();
        assert_eq!(opts.effective_database(), None);
    }

    #[test]
    fn set_names_rejects_injection() {
        let opts = ConnectOptions::new().charset("utf8; DROP DATABASE x");
        assert!(opts.set_names_sql().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let opts = ConnectOptions::new().password("hunter2");
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn log_settings_from_lookup() {
        let s = LogSettings::from_lookup(lookup(&[("DEBUG", "TRUE"), ("LOG_PATH", "logs/db.log")]));
        assert!(s.debug);
        assert_eq!(s.path, Some(PathBuf::from("logs/db.log")));
        assert_eq!(LogSettings::from_lookup(lookup(&[])), LogSettings::default());
    }
}
