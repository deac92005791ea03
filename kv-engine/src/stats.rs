//! # Stats Tracking
//!
//! Purpose: Back the `STATS` operation. Tracks global hit/miss/eviction/WAL
//! counters plus per-namespace hit/miss counters, keyed by the same
//! `"default"` label used for flattening.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::namespace;

/// Per-namespace hit/miss counters.
#[derive(Debug, Clone, Default)]
pub struct NamespaceCounters {
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Global counters plus the per-namespace breakdown.
#[derive(Debug, Clone)]
pub struct Stats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub log_size: u64,
    pub last_compaction: Option<SystemTime>,
    pub start_time: SystemTime,
    namespaces: HashMap<String, NamespaceCounters>,
}

impl Stats {
    pub fn new(start_time: SystemTime) -> Self {
        Stats {
            cache_hits: 0,
            cache_misses: 0,
            evictions: 0,
            log_size: 0,
            last_compaction: None,
            start_time,
            namespaces: HashMap::new(),
        }
    }

    pub fn record_hit(&mut self, namespace: Option<&str>) {
        self.cache_hits += 1;
        self.namespaces
            .entry(namespace::label(namespace).to_string())
            .or_default()
            .cache_hits += 1;
    }

    pub fn record_miss(&mut self, namespace: Option<&str>) {
        self.cache_misses += 1;
        self.namespaces
            .entry(namespace::label(namespace).to_string())
            .or_default()
            .cache_misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_log_append(&mut self) {
        self.log_size += 1;
    }

    pub fn record_compaction(&mut self, at: SystemTime, new_log_size: u64) {
        self.last_compaction = Some(at);
        self.log_size = new_log_size;
    }

    pub fn uptime(&self, now: SystemTime) -> Duration {
        now.duration_since(self.start_time).unwrap_or(Duration::ZERO)
    }

    pub fn namespace_counters(&self, namespace: Option<&str>) -> NamespaceCounters {
        self.namespaces
            .get(namespace::label(namespace))
            .cloned()
            .unwrap_or_default()
    }

    pub fn all_namespace_counters(&self) -> &HashMap<String, NamespaceCounters> {
        &self.namespaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_and_misses_bucket_by_namespace() {
        let mut stats = Stats::new(SystemTime::now());
        stats.record_hit(Some("tenant-a"));
        stats.record_hit(None);
        stats.record_miss(None);

        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.namespace_counters(Some("tenant-a")).cache_hits, 1);
        assert_eq!(stats.namespace_counters(None).cache_hits, 1);
        assert_eq!(stats.namespace_counters(None).cache_misses, 1);
    }

    #[test]
    fn compaction_resets_log_size_and_records_timestamp() {
        let mut stats = Stats::new(SystemTime::now());
        stats.record_log_append();
        stats.record_log_append();
        let at = SystemTime::now();
        stats.record_compaction(at, 1);
        assert_eq!(stats.log_size, 1);
        assert_eq!(stats.last_compaction, Some(at));
    }
}
