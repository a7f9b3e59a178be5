//! A capacity-bounded least-recently-used cache for store read-through.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self { capacity, entries: HashMap::new(), order: BTreeMap::new(), clock: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.clock += 1;
        let clock = self.clock;
        let (_, stamp) = self.entries.get_mut(key)?;
        self.order.remove(stamp);
        *stamp = clock;
        self.order.insert(clock, key.clone());
        self.entries.get(key).map(|(value, _)| value)
    }

    /// Insert a key, evicting the least recently used entry when full.
    pub fn put(&mut self, key: K, value: V) {
        if let Some((_, stamp)) = self.entries.remove(&key) {
            self.order.remove(&stamp);
        } else if self.entries.len() == self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.entries.remove(&oldest);
            }
        }
        self.clock += 1;
        self.order.insert(self.clock, key.clone());
        self.entries.insert(key, (value, self.clock));
    }

    pub fn erase(&mut self, key: &K) -> Option<V> {
        let (value, stamp) = self.entries.remove(key)?;
        self.order.remove(&stamp);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        // Touch "a" so "b" is the eviction candidate.
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.put("c", 3);
        assert!(!cache.contains(&"b"));
        assert!(cache.contains(&"a"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn reinsert_updates_value_without_eviction() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn erase_frees_a_slot() {
        let mut cache = LruCache::new(1);
        cache.put("a", 1);
        assert_eq!(cache.erase(&"a"), Some(1));
        assert!(cache.is_empty());
        cache.put("b", 2);
        assert_eq!(cache.get(&"b"), Some(&2));
    }
}
