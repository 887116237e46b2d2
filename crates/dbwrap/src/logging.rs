//! File log sink for applications that want the wrapper's events on disk.
//!
//! Library code only emits `tracing` events; this module installs a global
//! `tracing-subscriber` that appends them to [`LogSettings::path`].

use crate::config::LogSettings;
use crate::error::{DbError, DbResult};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;

/// Create `path` (and its parent directories) if it does not exist yet.
pub fn ensure_log_file(path: &Path) -> DbResult<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| DbError::Config(format!("failed to create {}: {e}", dir.display())))?;
    }
    File::create(path)
        .map(drop)
        .map_err(|e| DbError::Config(format!("failed to create {}: {e}", path.display())))
}

/// Install a global subscriber writing to the configured log file.
///
/// Events at `ERROR` are kept by default, everything from `DEBUG` up when
/// `settings.debug` is set. Fails if no path is configured, the file can't be
/// opened, or a global subscriber is already installed.
pub fn init_file_logging(settings: &LogSettings) -> DbResult<()> {
    let path = settings
        .path
        .as_deref()
        .ok_or_else(|| DbError::Config("LOG_PATH is not set".to_string()))?;
    ensure_log_file(path)?;
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| DbError::Config(format!("failed to open {}: {e}", path.display())))?;

    let level = if settings.debug {
        Level::DEBUG
    } else {
        Level::ERROR
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| DbError::Config(format!("failed to install log subscriber: {e}")))?;

    tracing::debug!(target: "dbwrap", path = %path.display(), "Logger initialized");
    Ok(())
}
