//! # Store Configuration
//!
//! Purpose: Centralize the five tunables
//! (`STORE_CAPACITY`, `LOG_FILE`, `COMPACTION_INTERVAL`, `CLEANUP_INTERVAL`,
//! `MAX_LOG_SIZE`) so every caller (server, bench, tests) builds a `Store`
//! the same way.
//!
//! ## Design Principles
//! 1. **Env-First, Override-Friendly**: `from_env` reads `std::env` with the
//!    documented defaults; callers that want CLI flags (see `kv-server`)
//!    build a `StoreConfig` directly and only fall back to `from_env` for
//!    unset fields.
//! 2. **No Silent Clamping**: an invalid env value is a startup error, not a
//!    silently ignored default.

use std::path::PathBuf;
use std::time::Duration;

/// Default live-entry capacity before eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 100;
/// Default WAL path.
pub const DEFAULT_LOG_FILE: &str = "data/wal.log";
/// Default seconds between automatic compactions.
pub const DEFAULT_COMPACTION_INTERVAL_SECS: u64 = 300;
/// Default seconds between TTL sweeps.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
/// Default advisory record-count threshold for triggering compaction.
pub const DEFAULT_MAX_LOG_SIZE: u64 = 1000;

/// Runtime configuration for a [`crate::store::Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum live entry count before LRU eviction begins.
    pub capacity: usize,
    /// Filesystem path to the write-ahead log.
    pub log_file: PathBuf,
    /// Interval between automatic compactions.
    pub compaction_interval: Duration,
    /// Interval between TTL reaper sweeps.
    pub cleanup_interval: Duration,
    /// Advisory record-count threshold; exposed for callers that want to
    /// trigger a manual `compact()` when `log_size` crosses it. The
    /// background compactor runs on `compaction_interval` regardless.
    pub max_log_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            capacity: DEFAULT_CAPACITY,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            compaction_interval: Duration::from_secs(DEFAULT_COMPACTION_INTERVAL_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }
}

impl StoreConfig {
    /// Builds a configuration from environment variables, falling back to
    /// the documented defaults for anything unset.
    ///
    /// # Errors
    /// Returns a description of the first malformed value encountered.
    pub fn from_env() -> Result<Self, String> {
        let mut config = StoreConfig::default();

        if let Some(value) = read_env("STORE_CAPACITY")? {
            config.capacity = value;
        }
        if let Ok(path) = std::env::var("LOG_FILE") {
            config.log_file = PathBuf::from(path);
        }
        if let Some(secs) = read_env::<u64>("COMPACTION_INTERVAL")? {
            config.compaction_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env::<u64>("CLEANUP_INTERVAL")? {
            config.cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(value) = read_env("MAX_LOG_SIZE")? {
            config.max_log_size = value;
        }

        Ok(config)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name}: invalid value {raw:?}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(format!("{name}: not valid unicode")),
    }
}
