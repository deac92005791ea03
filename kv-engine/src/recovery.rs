//! # Recovery
//!
//! Purpose: Rebuild the LRU index from the WAL on startup. Replays records
//! oldest-to-newest so later writes win over earlier ones for the same
//! key, recomputes remaining TTL from elapsed wall-clock time, and drops
//! anything that has already expired while the process was down.

use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::entry::Entry;
use crate::lru::LruIndex;
use crate::namespace;
use crate::wal::{self, WalRecord};
use kv_common::StoreResult;

/// Replays the WAL at `path` into a fresh [`LruIndex`].
///
/// `now` is the wall-clock instant recovery runs at; passed in explicitly
/// so tests can pin it rather than racing `SystemTime::now()`.
pub async fn recover(path: &Path, now: SystemTime) -> StoreResult<LruIndex> {
    let mut index = LruIndex::new();
    let records = wal::read_records(path).await?;

    for (line_number, parsed) in records {
        let record = match parsed {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "skipping malformed WAL record");
                continue;
            }
        };

        match record {
            WalRecord::Set {
                timestamp,
                key,
                value,
                ttl,
                namespace,
            } => {
                let expires_at = match ttl {
                    Some(ttl_secs) => match remaining_ttl(timestamp, ttl_secs, now) {
                        Some(remaining) => Some(Instant::now() + remaining),
                        None => {
                            // Already expired while the process was down;
                            // equivalent to never having been written.
                            continue;
                        }
                    },
                    None => None,
                };

                let full_key: std::sync::Arc<str> =
                    std::sync::Arc::from(namespace::flatten(namespace.as_deref(), &key));
                index.remove(&full_key);
                index.insert(Entry {
                    full_key,
                    key,
                    namespace,
                    value,
                    expires_at,
                    access_time: Instant::now(),
                    prev: None,
                    next: None,
                });
            }
            WalRecord::Del { key, namespace, .. } => {
                let full_key = namespace::flatten(namespace.as_deref(), &key);
                index.remove(&full_key);
            }
        }
    }

    Ok(index)
}

/// Computes the TTL remaining for a record written at `timestamp` (unix
/// seconds) with a `ttl_secs`-second lifetime, as of `now`. Returns `None`
/// if the TTL has already elapsed.
fn remaining_ttl(timestamp: f64, ttl_secs: u64, now: SystemTime) -> Option<Duration> {
    let written_at = UNIX_EPOCH + Duration::from_secs_f64(timestamp.max(0.0));
    let elapsed = now.duration_since(written_at).unwrap_or(Duration::ZERO);
    Duration::from_secs(ttl_secs).checked_sub(elapsed)
}
