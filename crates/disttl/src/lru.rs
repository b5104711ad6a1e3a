//! Bounded LRU cache with per-entry absolute expiry.
//!
//! Entries live in a slab (`Vec`) and are threaded into a doubly-linked
//! recency list by slab index, with a `HashMap` from key to slot. All
//! operations are O(1) except [`TtlLru::keys`] and [`TtlLru::purge_expired`],
//! which walk the whole table.
//!
//! Expiration is lazy: an expired entry keeps its slot (and its place in the
//! recency order) until it is overwritten, deleted, evicted or purged, but it
//! is never returned by [`TtlLru::get`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{CacheError, CacheResult};

/// Sentinel for "no neighbour" in the recency list.
const NIL: usize = usize::MAX;

/// Upper bound applied when `now + ttl` would overflow `Instant`.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Node<K, V> {
    key: K,
    value: V,
    expire_at: Instant,
    prev: usize,
    next: usize,
}

impl<K, V> Node<K, V> {
    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expire_at <= now
    }
}

/// Table plus recency list. `head` is the most recently used slot,
/// `tail` the least recently used one.
struct Inner<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: usize,
    tail: usize,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        // Cap the up-front allocation; huge capacities grow on demand.
        let initial = capacity.min(1024);
        Self {
            index: HashMap::with_capacity(initial),
            nodes: Vec::with_capacity(initial),
            head: NIL,
            tail: NIL,
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    fn touch(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    /// Remove the node in `idx`, moving the last slab node into the hole.
    fn remove_at(&mut self, idx: usize) -> Node<K, V> {
        self.unlink(idx);
        let last = self.nodes.len() - 1;
        let node = self.nodes.swap_remove(idx);
        self.index.remove(&node.key);

        if idx != last {
            // The node formerly at `last` now lives at `idx`; repoint its neighbours.
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            if prev != NIL {
                self.nodes[prev].next = idx;
            } else {
                self.head = idx;
            }
            if next != NIL {
                self.nodes[next].prev = idx;
            } else {
                self.tail = idx;
            }
            if let Some(slot) = self.index.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }

        node
    }

    fn insert(&mut self, key: K, value: V, expire_at: Instant, capacity: usize) -> Option<K> {
        if let Some(&idx) = self.index.get(&key) {
            let node = &mut self.nodes[idx];
            node.value = value;
            node.expire_at = expire_at;
            self.touch(idx);
            return None;
        }

        let mut evicted = None;
        if self.nodes.len() >= capacity && self.tail != NIL {
            let lru = self.tail;
            evicted = Some(self.remove_at(lru).key);
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            key: key.clone(),
            value,
            expire_at,
            prev: NIL,
            next: NIL,
        });
        self.index.insert(key, idx);
        self.push_front(idx);

        evicted
    }
}

/// Thread-safe, capacity-bounded LRU cache whose entries expire after a TTL.
///
/// A single mutex guards the table and the recency list; every operation is
/// short, so the cache is meant to be shared as `Arc<TtlLru<K, V>>`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use disttl::TtlLru;
///
/// let cache = TtlLru::new(2).unwrap();
/// cache.set("a".to_string(), 1, Duration::from_secs(60));
/// assert_eq!(cache.get("a"), Some(1));
/// assert_eq!(cache.size(), (1, 2));
/// ```
pub struct TtlLru<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> TtlLru<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `capacity` is zero.
    pub fn new(capacity: usize) -> CacheResult<Self> {
        if capacity == 0 {
            return Err(CacheError::configuration("cache capacity must be > 0"));
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner::with_capacity(capacity)),
        })
    }

    /// Look up a live entry, marking it most recently used.
    ///
    /// Expired entries are reported as absent and left untouched.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        let idx = *inner.index.get(key)?;
        if inner.nodes[idx].is_expired_at(Instant::now()) {
            return None;
        }
        inner.touch(idx);
        Some(inner.nodes[idx].value.clone())
    }

    /// Insert or overwrite `key`, expiring `ttl` from now.
    ///
    /// Returns the key evicted to make room, if the cache was full.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Option<K> {
        let now = Instant::now();
        let expire_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_TTL);
        self.inner.lock().insert(key, value, expire_at, self.capacity)
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        match inner.index.get(key) {
            Some(&idx) => {
                inner.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Remove `key` if it is live and `pred` holds for its value, without
    /// touching recency.
    ///
    /// Expired entries are treated as absent: `pred` never sees them and they
    /// keep their slot until overwritten, evicted or purged.
    pub fn remove_live_if<Q, F>(&self, key: &Q, pred: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let mut inner = self.inner.lock();
        let Some(&idx) = inner.index.get(key) else {
            return false;
        };
        if inner.nodes[idx].is_expired_at(Instant::now()) {
            return false;
        }
        if pred(&inner.nodes[idx].value) {
            inner.remove_at(idx);
            true
        } else {
            false
        }
    }

    /// Whether `key` holds an unexpired entry. Does not touch recency.
    pub fn contains_live<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.lock();
        inner
            .index
            .get(key)
            .is_some_and(|&idx| !inner.nodes[idx].is_expired_at(Instant::now()))
    }

    /// `(current, max)` entry counts. `current` includes expired entries.
    pub fn size(&self) -> (usize, usize) {
        (self.len(), self.capacity)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of every stored key, least recently used first.
    ///
    /// Includes expired entries that still occupy a slot.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.nodes.len());
        let mut cursor = inner.tail;
        while cursor != NIL {
            let node = &inner.nodes[cursor];
            keys.push(node.key.clone());
            cursor = node.prev;
        }
        keys
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let expired: Vec<K> = inner
            .nodes
            .iter()
            .filter(|node| node.is_expired_at(now))
            .map(|node| node.key.clone())
            .collect();

        for key in &expired {
            if let Some(&idx) = inner.index.get(key) {
                inner.remove_at(idx);
            }
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.index.clear();
        inner.nodes.clear();
        inner.head = NIL;
        inner.tail = NIL;
    }
}

impl<K, V> std::fmt::Debug for TtlLru<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLru")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().nodes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache(capacity: usize) -> TtlLru<String, u32> {
        TtlLru::new(capacity).unwrap()
    }

    #[test]
    fn test_zero_capacity_is_configuration_error() {
        let err = TtlLru::<String, u32>::new(0).unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_get_set() {
        let c = cache(4);
        c.set("a".into(), 1, HOUR);
        assert_eq!(c.get("a"), Some(1));
        assert_eq!(c.get("missing"), None);
    }

    #[test]
    fn test_capacity_evicts_in_insertion_order() {
        let c = cache(3);
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            c.set(key.to_string(), i as u32, HOUR);
        }

        assert_eq!(c.size(), (3, 3));
        assert_eq!(c.get("a"), None);
        assert_eq!(c.get("b"), None);
        assert_eq!(c.get("c"), Some(2));
        assert_eq!(c.get("d"), Some(3));
        assert_eq!(c.get("e"), Some(4));
    }

    #[test]
    fn test_set_reports_evicted_key() {
        let c = cache(1);
        assert_eq!(c.set("a".into(), 1, HOUR), None);
        assert_eq!(c.set("b".into(), 2, HOUR), Some("a".to_string()));
        // Overwrites never evict.
        assert_eq!(c.set("b".into(), 3, HOUR), None);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let c = cache(2);
        c.set("a".into(), 1, HOUR);
        c.set("b".into(), 2, HOUR);
        assert_eq!(c.get("a"), Some(1));

        c.set("c".into(), 3, HOUR);

        assert_eq!(c.get("a"), Some(1));
        assert_eq!(c.get("b"), None);
        assert_eq!(c.get("c"), Some(3));
    }

    #[test]
    fn test_overwrite_refreshes_value_and_recency() {
        let c = cache(2);
        c.set("a".into(), 1, HOUR);
        c.set("b".into(), 2, HOUR);
        c.set("a".into(), 10, HOUR);
        c.set("c".into(), 3, HOUR);

        assert_eq!(c.get("a"), Some(10));
        assert_eq!(c.get("b"), None);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_expired_entry_is_not_returned_but_keeps_slot() {
        let c = cache(4);
        c.set("a".into(), 1, Duration::from_millis(10));
        sleep(Duration::from_millis(20));

        assert_eq!(c.get("a"), None);
        assert!(!c.contains_live("a"));
        assert_eq!(c.size(), (1, 4));
        assert_eq!(c.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn test_overwrite_revives_expired_entry() {
        let c = cache(4);
        c.set("a".into(), 1, Duration::from_millis(5));
        sleep(Duration::from_millis(15));
        c.set("a".into(), 2, HOUR);
        assert_eq!(c.get("a"), Some(2));
    }

    #[test]
    fn test_expired_entries_still_take_part_in_eviction() {
        let c = cache(2);
        c.set("old".into(), 1, Duration::from_millis(5));
        c.set("live".into(), 2, HOUR);
        sleep(Duration::from_millis(15));

        // Reading the expired key does not touch it, so it stays LRU.
        assert_eq!(c.get("old"), None);
        c.set("new".into(), 3, HOUR);

        assert_eq!(c.keys(), vec!["live".to_string(), "new".to_string()]);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let c = cache(2);
        c.set("a".into(), 1, HOUR);
        assert!(c.delete("a"));
        assert!(!c.delete("a"));
        assert_eq!(c.get("a"), None);
        assert!(c.is_empty());
    }

    #[test]
    fn test_keys_snapshot_orders_lru_first() {
        let c = cache(4);
        c.set("a".into(), 1, HOUR);
        c.set("b".into(), 2, HOUR);
        c.set("c".into(), 3, HOUR);
        c.get("a");

        let keys = c.keys();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string(), "a".to_string()]);

        // The snapshot does not follow later mutations.
        c.delete("b");
        assert_eq!(keys.len(), 3);
        assert_eq!(c.keys().len(), 2);
    }

    #[test]
    fn test_remove_live_if_does_not_touch_recency() {
        let c = cache(2);
        c.set("a".into(), 1, HOUR);
        c.set("b".into(), 2, HOUR);

        assert!(!c.remove_live_if("a", |v| *v == 99));
        assert!(!c.remove_live_if("missing", |_| true));
        c.set("c".into(), 3, HOUR);

        // "a" was inspected but stayed least recently used.
        assert_eq!(c.get("a"), None);
        assert!(c.remove_live_if("b", |v| *v == 2));
        assert_eq!(c.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_remove_live_if_skips_expired_entries() {
        let c = cache(4);
        c.set("stale".into(), 1, Duration::from_millis(5));
        sleep(Duration::from_millis(15));

        assert!(!c.remove_live_if("stale", |_| panic!("expired value offered to predicate")));
        assert_eq!(c.keys(), vec!["stale".to_string()]);
    }

    #[test]
    fn test_purge_expired() {
        let c = cache(8);
        c.set("short1".into(), 1, Duration::from_millis(5));
        c.set("long".into(), 2, HOUR);
        c.set("short2".into(), 3, Duration::from_millis(5));
        sleep(Duration::from_millis(15));

        assert_eq!(c.purge_expired(), 2);
        assert_eq!(c.keys(), vec!["long".to_string()]);
        assert_eq!(c.purge_expired(), 0);
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let c = cache(1);
        c.set("a".into(), 1, Duration::MAX);
        assert_eq!(c.get("a"), Some(1));
    }

    #[test]
    fn test_clear() {
        let c = cache(3);
        c.set("a".into(), 1, HOUR);
        c.set("b".into(), 2, HOUR);
        c.clear();
        assert!(c.is_empty());
        c.set("c".into(), 3, HOUR);
        assert_eq!(c.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_mixed_operations_keep_list_and_index_consistent() {
        let c = cache(16);
        for round in 0..200u32 {
            let key = format!("k{}", round % 37);
            match round % 5 {
                0 | 1 | 2 => {
                    c.set(key, round, HOUR);
                }
                3 => {
                    c.delete(&key);
                }
                _ => {
                    c.get(&key);
                }
            }

            let keys = c.keys();
            assert_eq!(keys.len(), c.len());
            assert!(c.len() <= 16);
            for k in &keys {
                assert!(c.contains_live(k.as_str()));
            }
        }
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let c = Arc::new(cache(64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        let key = format!("{t}-{}", i % 50);
                        c.set(key.clone(), i, HOUR);
                        c.get(&key);
                        if i % 7 == 0 {
                            c.delete(&key);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(c.len() <= 64);
        assert_eq!(c.keys().len(), c.len());
    }
}
