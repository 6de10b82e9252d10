//! Runtime configuration resolution.
//!
//! # Responsibility
//! - Resolve database path, log directory and log level for a process.
//!
//! # Invariants
//! - Blank environment values fall back to defaults.
//! - An unparseable log level is an error, not a silent default.

use crate::logging::{default_log_level, LogLevel, LoggingError};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "QUICKNOTE_DB_PATH";
pub const LOG_DIR_ENV: &str = "QUICKNOTE_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "QUICKNOTE_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "quicknote.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "quicknote-logs";

/// Process-level configuration for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: LogLevel,
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, falling back to defaults
    /// under the system temp directory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggingError> {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = non_blank(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
        let log_dir = non_blank(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME));
        let log_level = match non_blank(LOG_LEVEL_ENV) {
            Some(value) => value.parse()?,
            None => default_log_level(),
        };

        Ok(Self {
            db_path,
            log_dir,
            log_level,
        })
    }
}
