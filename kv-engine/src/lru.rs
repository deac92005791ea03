//! # LRU Index
//!
//! Purpose: Map a flattened key to its entry in O(1) and maintain
//! most-recently-used-at-head / least-recently-used-at-tail order for O(1)
//! eviction. An intrusive doubly-linked list over an arena, addressed by
//! index rather than pointer, and unsharded: one facade lock guards the
//! whole store, so there is no need to partition the index by shard.
//!
//! This index never consults wall-clock time or TTL on its own; callers
//! (the store facade, the reaper) decide what counts as expired and just
//! ask this index to insert, touch, or remove by key.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::entry::Entry;

/// Arena slot: either a live node or a hole on the free list.
enum Slot {
    Occupied(Entry),
    Free,
}

/// An intrusive doubly-linked LRU index keyed by flattened key.
pub struct LruIndex {
    map: HashMap<Arc<str>, usize>,
    arena: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruIndex {
    pub fn new() -> Self {
        LruIndex {
            map: HashMap::new(),
            arena: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up an entry without changing LRU order.
    pub fn peek(&self, full_key: &str) -> Option<&Entry> {
        let idx = *self.map.get(full_key)?;
        match &self.arena[idx] {
            Slot::Occupied(entry) => Some(entry),
            Slot::Free => None,
        }
    }

    /// Looks up an entry and moves it to the head (most-recently-used).
    pub fn lookup_and_touch(&mut self, full_key: &str) -> Option<&Entry> {
        let idx = *self.map.get(full_key)?;
        self.detach(idx);
        self.push_front(idx);
        match &self.arena[idx] {
            Slot::Occupied(entry) => Some(entry),
            Slot::Free => None,
        }
    }

    /// Inserts a brand-new entry at the head. Caller must ensure `full_key`
    /// is not already present (use `remove` first on overwrite).
    pub fn insert(&mut self, entry: Entry) {
        let full_key = entry.full_key.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.arena[idx] = Slot::Occupied(entry);
                idx
            }
            None => {
                self.arena.push(Slot::Occupied(entry));
                self.arena.len() - 1
            }
        };
        self.map.insert(full_key, idx);
        self.push_front(idx);
    }

    /// Removes an entry by flattened key, returning it if present.
    pub fn remove(&mut self, full_key: &str) -> Option<Entry> {
        let idx = self.map.remove(full_key)?;
        self.detach(idx);
        let slot = std::mem::replace(&mut self.arena[idx], Slot::Free);
        self.free.push(idx);
        match slot {
            Slot::Occupied(entry) => Some(entry),
            Slot::Free => None,
        }
    }

    /// Evicts and returns the least-recently-used entry, if any.
    pub fn evict_tail(&mut self) -> Option<Entry> {
        let idx = self.tail?;
        let full_key = match &self.arena[idx] {
            Slot::Occupied(entry) => entry.full_key.clone(),
            Slot::Free => return None,
        };
        self.remove(&full_key)
    }

    /// Snapshot of all flattened keys, head (MRU) to tail (LRU).
    pub fn keys(&self) -> Vec<Arc<str>> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match &self.arena[idx] {
                Slot::Occupied(entry) => {
                    keys.push(entry.full_key.clone());
                    cursor = entry.next;
                }
                Slot::Free => break,
            }
        }
        keys
    }

    /// Snapshot of all live entries, head (MRU) to tail (LRU). Does not
    /// change LRU order — used by the compactor to read without disturbing
    /// recency.
    pub fn snapshot(&self) -> Vec<&Entry> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match &self.arena[idx] {
                Slot::Occupied(entry) => {
                    out.push(entry);
                    cursor = entry.next;
                }
                Slot::Free => break,
            }
        }
        out
    }

    /// Updates the `access_time` field of an entry in place, without
    /// touching LRU order (order is adjusted separately via `touch`).
    pub fn set_access_time(&mut self, full_key: &str, when: Instant) {
        if let Some(&idx) = self.map.get(full_key) {
            if let Slot::Occupied(entry) = &mut self.arena[idx] {
                entry.access_time = when;
            }
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match &self.arena[idx] {
            Slot::Occupied(entry) => (entry.prev, entry.next),
            Slot::Free => return,
        };
        match prev {
            Some(p) => {
                if let Slot::Occupied(e) = &mut self.arena[p] {
                    e.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Slot::Occupied(e) = &mut self.arena[n] {
                    e.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Slot::Occupied(entry) = &mut self.arena[idx] {
            entry.prev = None;
            entry.next = old_head;
        }
        if let Some(h) = old_head {
            if let Slot::Occupied(e) = &mut self.arena[h] {
                e.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

impl Default for LruIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> Entry {
        let full_key: Arc<str> = Arc::from(key);
        Entry {
            full_key,
            key: key.to_string(),
            namespace: None,
            value: value.to_string(),
            expires_at: None,
            access_time: Instant::now(),
            prev: None,
            next: None,
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut idx = LruIndex::new();
        idx.insert(entry("a", "1"));
        assert_eq!(idx.peek("a").unwrap().value, "1");
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn touch_moves_to_head() {
        let mut idx = LruIndex::new();
        idx.insert(entry("a", "1"));
        idx.insert(entry("b", "2"));
        // keys() is head->tail: b, a
        assert_eq!(idx.keys().iter().map(|k| k.as_ref()).collect::<Vec<_>>(), vec!["b", "a"]);
        idx.lookup_and_touch("a");
        assert_eq!(idx.keys().iter().map(|k| k.as_ref()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn evict_tail_removes_lru() {
        let mut idx = LruIndex::new();
        idx.insert(entry("a", "1"));
        idx.insert(entry("b", "2"));
        idx.insert(entry("c", "3"));
        let evicted = idx.evict_tail().unwrap();
        assert_eq!(evicted.key, "a");
        assert_eq!(idx.len(), 2);
    }

    #[test]
    fn remove_then_reinsert_reuses_arena_slot() {
        let mut idx = LruIndex::new();
        idx.insert(entry("a", "1"));
        idx.remove("a");
        assert!(idx.peek("a").is_none());
        idx.insert(entry("b", "2"));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn peek_does_not_change_order() {
        let mut idx = LruIndex::new();
        idx.insert(entry("a", "1"));
        idx.insert(entry("b", "2"));
        idx.peek("a");
        assert_eq!(idx.keys().iter().map(|k| k.as_ref()).collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
