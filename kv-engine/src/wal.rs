//! # Write-Ahead Log
//!
//! Purpose: Append-only, newline-delimited, self-describing JSON records —
//! each line stands alone and can be replayed without any framing beyond
//! `\n`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use kv_common::{StoreError, StoreResult, WalRecordError};

/// One durable operation: either a write or a deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum WalRecord {
    Set {
        timestamp: f64,
        key: String,
        value: String,
        ttl: Option<u64>,
        namespace: Option<String>,
    },
    Del {
        timestamp: f64,
        key: String,
        namespace: Option<String>,
    },
}

impl WalRecord {
    /// Builds a `SET` record timestamped at the current wall-clock time.
    pub fn set_now(key: String, value: String, ttl: Option<u64>, namespace: Option<String>) -> Self {
        WalRecord::Set {
            timestamp: unix_timestamp(SystemTime::now()),
            key,
            value,
            ttl,
            namespace,
        }
    }

    /// Builds a `DEL` record timestamped at the current wall-clock time.
    pub fn del_now(key: String, namespace: Option<String>) -> Self {
        WalRecord::Del {
            timestamp: unix_timestamp(SystemTime::now()),
            key,
            namespace,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            WalRecord::Set { timestamp, .. } => *timestamp,
            WalRecord::Del { timestamp, .. } => *timestamp,
        }
    }

    fn to_wire(&self) -> Wire {
        match self {
            WalRecord::Set {
                timestamp,
                key,
                value,
                ttl,
                namespace,
            } => Wire {
                timestamp: *timestamp,
                action: "SET".to_string(),
                key: key.clone(),
                value: Some(value.clone()),
                ttl: *ttl,
                namespace: namespace.clone(),
            },
            WalRecord::Del {
                timestamp,
                key,
                namespace,
            } => Wire {
                timestamp: *timestamp,
                action: "DEL".to_string(),
                key: key.clone(),
                value: None,
                ttl: None,
                namespace: namespace.clone(),
            },
        }
    }

    fn from_wire(wire: Wire, line_number: usize) -> Result<Self, WalRecordError> {
        match wire.action.as_str() {
            "SET" => {
                let value = wire.value.ok_or_else(|| WalRecordError {
                    line_number,
                    reason: "SET record missing value".to_string(),
                })?;
                Ok(WalRecord::Set {
                    timestamp: wire.timestamp,
                    key: wire.key,
                    value,
                    ttl: wire.ttl,
                    namespace: wire.namespace,
                })
            }
            "DEL" => Ok(WalRecord::Del {
                timestamp: wire.timestamp,
                key: wire.key,
                namespace: wire.namespace,
            }),
            other => Err(WalRecordError {
                line_number,
                reason: format!("unknown action {other:?}"),
            }),
        }
    }

    fn encode_line(&self) -> String {
        // Wire always serializes cleanly; a failure here would mean a bug
        // in Wire's derive, not bad input.
        serde_json::to_string(&self.to_wire()).expect("WalRecord wire encoding is infallible")
    }

    fn parse_line(line: &str, line_number: usize) -> Result<Self, WalRecordError> {
        let wire: Wire = serde_json::from_str(line).map_err(|e| WalRecordError {
            line_number,
            reason: e.to_string(),
        })?;
        Self::from_wire(wire, line_number)
    }
}

/// Wire shape shared by SET and DEL records. `#[serde(default)]` on the
/// optional fields lets replay tolerate lines that omit rather than
/// null-out fields that don't apply to their action.
#[derive(Debug, Serialize, Deserialize)]
struct Wire {
    timestamp: f64,
    action: String,
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    ttl: Option<u64>,
    #[serde(default)]
    namespace: Option<String>,
}

fn unix_timestamp(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Opens the WAL for appending, creating the file (and parent directories)
/// if it does not exist yet.
pub async fn open_append(path: &Path) -> StoreResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|source| StoreError::WalIo {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| StoreError::WalIo {
            path: path.to_path_buf(),
            source,
        })
}

/// Appends one record to an already-open WAL file and flushes it. Not
/// fsynced per record: durable once the OS accepts the write, not once it
/// hits disk.
pub async fn append(file: &mut File, path: &Path, record: &WalRecord) -> StoreResult<()> {
    let mut line = record.encode_line();
    line.push('\n');
    file.write_all(line.as_bytes())
        .await
        .map_err(|source| StoreError::WalIo {
            path: path.to_path_buf(),
            source,
        })?;
    file.flush().await.map_err(|source| StoreError::WalIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads every line of the WAL at `path`, returning `(line_number, parsed)`
/// pairs in file order. A missing file is treated as an empty log, not an
/// error. Malformed lines are returned as `Err` rather than skipped here —
/// the caller (recovery) decides how to log and continue.
pub async fn read_records(path: &Path) -> StoreResult<Vec<(usize, Result<WalRecord, WalRecordError>)>> {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StoreError::WalIo {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut reader = BufReader::new(file).lines();
    let mut out = Vec::new();
    let mut line_number = 0usize;
    while let Some(line) = reader.next_line().await.map_err(|source| StoreError::WalIo {
        path: path.to_path_buf(),
        source,
    })? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        out.push((line_number, WalRecord::parse_line(&line, line_number)));
    }
    Ok(out)
}

/// Writes `records` to `tmp_path` as a fresh WAL, one JSON line per record.
pub async fn write_compacted(tmp_path: &Path, records: &[WalRecord]) -> StoreResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp_path)
        .await
        .map_err(|source| StoreError::WalIo {
            path: tmp_path.to_path_buf(),
            source,
        })?;
    for record in records {
        let mut line = record.encode_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| StoreError::WalIo {
                path: tmp_path.to_path_buf(),
                source,
            })?;
    }
    file.flush().await.map_err(|source| StoreError::WalIo {
        path: tmp_path.to_path_buf(),
        source,
    })
}

/// Atomically swaps the compacted `tmp_path` into place as `live_path`.
///
/// Takes a hard-link backup of the current live file first (if it exists),
/// named `<live_path>.backup.<epoch-seconds>`, then performs a single
/// `rename(tmp_path, live_path)` — one atomic filesystem operation, rather
/// than the two-step rename-to-backup-then-rename-to-live sequence the
/// original store used, which left a window where neither name pointed at
/// a complete file if the process died mid-swap. Returns the backup path
/// actually used, if a backup was taken.
pub async fn atomic_replace(tmp_path: &Path, live_path: &Path) -> StoreResult<Option<PathBuf>> {
    let backup_path = if fs::try_exists(live_path).await.unwrap_or(false) {
        let backup_path = append_suffix(live_path, &format!(".backup.{}", unix_timestamp(SystemTime::now()) as u64));
        fs::hard_link(live_path, &backup_path)
            .await
            .map_err(|source| StoreError::WalIo {
                path: backup_path.clone(),
                source,
            })?;
        Some(backup_path)
    } else {
        None
    };

    fs::rename(tmp_path, live_path)
        .await
        .map_err(|source| StoreError::WalIo {
            path: live_path.to_path_buf(),
            source,
        })?;
    Ok(backup_path)
}

/// Convenience wrapper pairing a live WAL path with its temp sibling used
/// during compaction.
pub struct WalPaths {
    pub live: PathBuf,
    pub tmp: PathBuf,
}

impl WalPaths {
    pub fn for_live(live: &Path) -> Self {
        let tmp = append_suffix(live, ".tmp");
        WalPaths {
            live: live.to_path_buf(),
            tmp,
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}
