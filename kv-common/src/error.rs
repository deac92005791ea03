//! # Store Error Types
//!
//! Purpose: Define the error taxonomy shared by the engine, server, and
//! client so a missing key never needs to be modeled as an error at this
//! layer — callers get `Option`/`bool` back for that — while genuine
//! failures (I/O, malformed WAL state) carry enough context to log.

use std::fmt;
use std::path::PathBuf;

/// Result type used throughout the workspace.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the storage engine.
///
/// Absence (key not found, namespace empty) is never represented here;
/// those are `Option`/`bool` return values on the facade. Not-found is a
/// negative result, not an error.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A WAL append or compaction write failed.
    #[error("wal io error at {path}: {source}")]
    WalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A WAL record could not be encoded or decoded.
    #[error("wal record error: {0}")]
    WalRecord(#[from] WalRecordError),

    /// Generic I/O failure outside the WAL path (directory creation, etc).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single malformed-WAL-record condition encountered during replay.
///
/// This is a distinct type (rather than folding into `StoreError::Io`
/// directly) because recovery treats it as recoverable: the record is
/// skipped and logged, never propagated as a hard failure.
#[derive(Debug, Clone)]
pub struct WalRecordError {
    pub line_number: usize,
    pub reason: String,
}

impl fmt::Display for WalRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.reason)
    }
}

impl std::error::Error for WalRecordError {}
