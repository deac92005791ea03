//! # Store Facade
//!
//! Purpose: The single entry point every command goes through — `get`,
//! `set`, `delete`, the namespace operations, `stats`, and `compact` all
//! acquire the same exclusive lock for their entire duration, including
//! the WAL write.
//!
//! Write ordering is deliberate: the index is mutated first, then the WAL
//! record is appended, then the caller is acknowledged. A crash between
//! those two steps loses the most recent write; that window is accepted,
//! not closed, because the WAL was never meant to be fsynced per
//! operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::fs::File;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use kv_common::StoreResult;

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::lru::LruIndex;
use crate::namespace;
use crate::stats::{NamespaceCounters, Stats};
use crate::wal::{self, WalPaths, WalRecord};
use crate::{compactor, reaper};

struct Inner {
    index: LruIndex,
    wal_file: File,
    stats: Stats,
}

/// The shared, lock-guarded key-value store.
pub struct Store {
    inner: Mutex<Inner>,
    config: StoreConfig,
    paths: WalPaths,
}

/// A view of global and (optionally) per-namespace counters, returned by
/// [`Store::get_stats`].
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total_keys: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub log_size: u64,
    pub last_compaction: Option<SystemTime>,
    pub uptime: Duration,
    /// Set when the caller asked for a specific namespace's breakdown.
    pub namespace: Option<String>,
    pub namespace_stats: Option<NamespaceView>,
    /// Set when the caller asked for the breakdown across all namespaces.
    pub namespaces: Option<HashMap<String, NamespaceView>>,
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceView {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_keys: usize,
}

/// Handle returned by [`Store::initialize`]: owns the background task
/// handles and drives graceful shutdown.
pub struct StoreHandle {
    pub store: Arc<Store>,
    shutdown_tx: watch::Sender<bool>,
    reaper: JoinHandle<()>,
    compactor: JoinHandle<()>,
}

impl StoreHandle {
    /// Signals both background tasks to stop at their next wake boundary
    /// and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.reaper.await;
        let _ = self.compactor.await;
    }
}

impl Store {
    /// Recovers state from the WAL (if any), opens it for append, and
    /// spawns the reaper and compactor background tasks.
    pub async fn initialize(config: StoreConfig) -> StoreResult<StoreHandle> {
        let paths = WalPaths::for_live(&config.log_file);
        let index = crate::recovery::recover(&paths.live, SystemTime::now()).await?;
        let wal_file = wal::open_append(&paths.live).await?;

        let stats = Stats::new(SystemTime::now());

        let store = Arc::new(Store {
            inner: Mutex::new(Inner {
                index,
                wal_file,
                stats,
            }),
            config: config.clone(),
            paths,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper_handle = reaper::spawn(store.clone(), config.cleanup_interval, shutdown_rx.clone());
        let compactor_handle = compactor::spawn(store.clone(), config.compaction_interval, shutdown_rx);

        Ok(StoreHandle {
            store,
            shutdown_tx,
            reaper: reaper_handle,
            compactor: compactor_handle,
        })
    }

    /// Looks up `key` in `namespace`, returning its value if present and
    /// unexpired. Counts a hit or a miss either way.
    pub async fn get(&self, namespace: Option<&str>, key: &str) -> Option<String> {
        let full_key = namespace::flatten(namespace, key);
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        if let Some(entry) = inner.index.peek(&full_key) {
            if entry.is_expired_at(now) {
                inner.index.remove(&full_key);
                inner.stats.record_miss(namespace);
                return None;
            }
        } else {
            inner.stats.record_miss(namespace);
            return None;
        }

        inner.stats.record_hit(namespace);
        let entry = inner.index.lookup_and_touch(&full_key)?;
        Some(entry.value.clone())
    }

    /// Inserts or overwrites `key` in `namespace`. Evicts the
    /// least-recently-used entry first if the store is at capacity and
    /// this is a new key. Appends the matching WAL record after the
    /// in-memory mutation, then returns.
    pub async fn set(
        &self,
        namespace: Option<&str>,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let full_key = namespace::flatten(namespace, key);
        let mut inner = self.inner.lock().await;

        let is_new = inner.index.peek(&full_key).is_none();
        if is_new && inner.index.len() >= self.config.capacity {
            if inner.index.evict_tail().is_some() {
                inner.stats.record_eviction();
            }
        }

        inner.index.remove(&full_key);
        inner.index.insert(Entry {
            full_key: Arc::from(full_key.as_str()),
            key: key.to_string(),
            namespace: namespace.map(str::to_string),
            value: value.clone(),
            expires_at: ttl.map(|d| Instant::now() + d),
            access_time: Instant::now(),
            prev: None,
            next: None,
        });

        let record = WalRecord::set_now(
            key.to_string(),
            value,
            ttl.map(|d| d.as_secs()),
            namespace.map(str::to_string),
        );
        self.append_locked(&mut inner, &record).await?;
        Ok(())
    }

    /// Removes `key` from `namespace`. Returns whether it was present.
    pub async fn delete(&self, namespace: Option<&str>, key: &str) -> StoreResult<bool> {
        let full_key = namespace::flatten(namespace, key);
        let mut inner = self.inner.lock().await;

        let removed = inner.index.remove(&full_key).is_some();
        if removed {
            let record = WalRecord::del_now(key.to_string(), namespace.map(str::to_string));
            self.append_locked(&mut inner, &record).await?;
        }
        Ok(removed)
    }

    /// Number of live, unexpired entries. With `namespace` given, counts
    /// only entries in that namespace; with `None`, counts the whole
    /// store.
    pub async fn size(&self, namespace: Option<&str>) -> usize {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        inner
            .index
            .snapshot()
            .iter()
            .filter(|e| !e.is_expired_at(now))
            .filter(|e| namespace.is_none() || e.namespace.as_deref() == namespace)
            .count()
    }

    /// The sorted, distinct set of namespaces currently holding at least
    /// one live entry. The default (unnamed) namespace is never included —
    /// it has no name to list.
    pub async fn list_namespaces(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        let mut namespaces: Vec<String> = inner
            .index
            .snapshot()
            .iter()
            .filter(|e| !e.is_expired_at(now))
            .filter_map(|e| e.namespace.clone())
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        namespaces
    }

    /// Removes every live key in `namespace`, returning how many were
    /// removed. Each removal appends its own `DEL` record.
    pub async fn clear_namespace(&self, namespace: Option<&str>) -> StoreResult<usize> {
        let mut inner = self.inner.lock().await;
        let full_keys: Vec<Arc<str>> = inner
            .index
            .snapshot()
            .iter()
            .filter(|e| e.namespace.as_deref() == namespace)
            .map(|e| e.full_key.clone())
            .collect();

        let mut removed = 0usize;
        for full_key in full_keys {
            if let Some(entry) = inner.index.remove(&full_key) {
                removed += 1;
                let record = WalRecord::del_now(entry.key, entry.namespace);
                self.append_locked(&mut inner, &record).await?;
            }
        }
        Ok(removed)
    }

    /// Returns global counters, plus a per-namespace breakdown: either one
    /// namespace's view (when `namespace` is `Some`) or every namespace's
    /// view (when `None`).
    pub async fn get_stats(&self, namespace: Option<&str>) -> StatsSnapshot {
        let inner = self.inner.lock().await;
        let now = SystemTime::now();
        let instant_now = Instant::now();

        let total_keys = inner
            .index
            .snapshot()
            .iter()
            .filter(|e| !e.is_expired_at(instant_now))
            .count();

        let (namespace_stats, namespaces) = match namespace {
            Some(ns) => {
                let counters = inner.stats.namespace_counters(Some(ns));
                let total_keys_in_ns = inner
                    .index
                    .snapshot()
                    .iter()
                    .filter(|e| !e.is_expired_at(instant_now) && e.namespace.as_deref() == Some(ns))
                    .count();
                (
                    Some(NamespaceView {
                        cache_hits: counters.cache_hits,
                        cache_misses: counters.cache_misses,
                        total_keys: total_keys_in_ns,
                    }),
                    None,
                )
            }
            None => {
                let mut all = HashMap::new();
                for (label, counters) in inner.stats.all_namespace_counters() {
                    let total_keys_in_ns = inner
                        .index
                        .snapshot()
                        .iter()
                        .filter(|e| !e.is_expired_at(instant_now) && namespace::label(e.namespace.as_deref()) == label)
                        .count();
                    all.insert(
                        label.clone(),
                        NamespaceView {
                            cache_hits: counters.cache_hits,
                            cache_misses: counters.cache_misses,
                            total_keys: total_keys_in_ns,
                        },
                    );
                }
                (None, Some(all))
            }
        };

        StatsSnapshot {
            total_keys,
            cache_hits: inner.stats.cache_hits,
            cache_misses: inner.stats.cache_misses,
            evictions: inner.stats.evictions,
            log_size: inner.stats.log_size,
            last_compaction: inner.stats.last_compaction,
            uptime: inner.stats.uptime(now),
            namespace: namespace.map(str::to_string),
            namespace_stats,
            namespaces,
        }
    }

    /// Manually triggers compaction (also run periodically in the
    /// background). Reads live entries without disturbing LRU order,
    /// rewrites the WAL to hold exactly that set, and atomically swaps it
    /// into place.
    pub async fn compact(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        let records: Vec<WalRecord> = inner
            .index
            .snapshot()
            .iter()
            .filter(|e| !e.is_expired_at(now))
            .map(|e| {
                let ttl = e
                    .expires_at
                    .map(|deadline| deadline.saturating_duration_since(now).as_secs());
                WalRecord::set_now(e.key.clone(), e.value.clone(), ttl, e.namespace.clone())
            })
            .collect();

        wal::write_compacted(&self.paths.tmp, &records).await?;
        wal::atomic_replace(&self.paths.tmp, &self.paths.live).await?;
        inner.wal_file = wal::open_append(&self.paths.live).await?;
        inner.stats.record_compaction(SystemTime::now(), records.len() as u64);
        Ok(())
    }

    /// Sweeps expired entries out of memory and appends a `DEL` record for
    /// each, used by the TTL reaper. Swallows WAL append failures (logged,
    /// not returned) so one unwritable record doesn't stop the sweep.
    pub async fn sweep_expired(&self) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let expired: Vec<Arc<str>> = inner
            .index
            .snapshot()
            .iter()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.full_key.clone())
            .collect();

        for full_key in expired {
            if let Some(entry) = inner.index.remove(&full_key) {
                let record = WalRecord::del_now(entry.key, entry.namespace);
                if let Err(e) = self.append_locked(&mut inner, &record).await {
                    tracing::warn!(error = %e, "ttl reaper failed to append DEL record");
                }
            }
        }
    }

    async fn append_locked(&self, inner: &mut Inner, record: &WalRecord) -> StoreResult<()> {
        wal::append(&mut inner.wal_file, &self.paths.live, record).await?;
        inner.stats.record_log_append();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (tempfile::TempDir, StoreHandle) {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            capacity: 2,
            log_file: dir.path().join("wal.log"),
            compaction_interval: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
            max_log_size: 1000,
        };
        let handle = Store::initialize(config).await.unwrap();
        (dir, handle)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, handle) = test_store().await;
        handle.store.set(None, "a", "1".to_string(), None).await.unwrap();
        assert_eq!(handle.store.get(None, "a").await, Some("1".to_string()));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn miss_counts_distinctly_from_hit() {
        let (_dir, handle) = test_store().await;
        assert_eq!(handle.store.get(None, "missing").await, None);
        let stats = handle.store.get_stats(None).await;
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_lru() {
        let (_dir, handle) = test_store().await;
        handle.store.set(None, "a", "1".to_string(), None).await.unwrap();
        handle.store.set(None, "b", "2".to_string(), None).await.unwrap();
        // touch a so b becomes LRU
        handle.store.get(None, "a").await;
        handle.store.set(None, "c", "3".to_string(), None).await.unwrap();

        assert_eq!(handle.store.get(None, "b").await, None);
        assert_eq!(handle.store.get(None, "a").await, Some("1".to_string()));
        assert_eq!(handle.store.get(None, "c").await, Some("3".to_string()));

        let stats = handle.store.get_stats(None).await;
        assert_eq!(stats.evictions, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let (_dir, handle) = test_store().await;
        handle.store.set(Some("a"), "k", "1".to_string(), None).await.unwrap();
        handle.store.set(Some("b"), "k", "2".to_string(), None).await.unwrap();
        assert_eq!(handle.store.get(Some("a"), "k").await, Some("1".to_string()));
        assert_eq!(handle.store.get(Some("b"), "k").await, Some("2".to_string()));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn compact_rewrites_wal_to_live_set() {
        let (_dir, handle) = test_store().await;
        handle.store.set(None, "a", "1".to_string(), None).await.unwrap();
        handle.store.set(None, "a", "2".to_string(), None).await.unwrap();
        handle.store.delete(None, "gone").await.unwrap();
        handle.store.compact().await.unwrap();

        let stats = handle.store.get_stats(None).await;
        assert_eq!(stats.log_size, 1);
        assert!(stats.last_compaction.is_some());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn namespace_clear_removes_only_that_namespace() {
        let (_dir, handle) = test_store().await;
        handle.store.set(Some("a"), "k1", "1".to_string(), None).await.unwrap();
        handle.store.set(Some("a"), "k2", "2".to_string(), None).await.unwrap();
        handle.store.set(Some("b"), "k1", "3".to_string(), None).await.unwrap();

        let removed = handle.store.clear_namespace(Some("a")).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(handle.store.size(Some("a")).await, 0);
        assert_eq!(handle.store.size(Some("b")).await, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn list_namespaces_is_sorted_and_excludes_default() {
        let (_dir, handle) = test_store().await;
        handle.store.set(Some("zeta"), "k", "1".to_string(), None).await.unwrap();
        handle.store.set(Some("alpha"), "k", "2".to_string(), None).await.unwrap();
        handle.store.set(None, "k", "3".to_string(), None).await.unwrap();

        assert_eq!(handle.store.list_namespaces().await, vec!["alpha".to_string(), "zeta".to_string()]);
        handle.shutdown().await;
    }
}
