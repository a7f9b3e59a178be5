//! A dirty set of pending state changes: additions and removals recorded
//! against a backing store, keyed so that recording one direction cancels a
//! pending entry in the other.

use std::collections::BTreeMap;

/// Pending additions and removals for one key space.
#[derive(Debug, Clone)]
pub struct DeltaLedger<K, V> {
    adds: BTreeMap<K, V>,
    removes: BTreeMap<K, V>,
}

impl<K, V> Default for DeltaLedger<K, V> {
    fn default() -> Self {
        Self { adds: BTreeMap::new(), removes: BTreeMap::new() }
    }
}

impl<K: Ord + Clone, V: Clone> DeltaLedger<K, V> {
    pub fn new() -> Self {
        Self { adds: BTreeMap::new(), removes: BTreeMap::new() }
    }

    /// Record an addition. A pending removal of the same key is cancelled
    /// rather than left to fight the addition at write-out time.
    pub fn record_add(&mut self, key: K, value: V) {
        self.removes.remove(&key);
        self.adds.insert(key, value);
    }

    /// Record a removal, cancelling any pending addition of the same key.
    pub fn record_remove(&mut self, key: K, value: V) {
        self.adds.remove(&key);
        self.removes.insert(key, value);
    }

    /// Drop a pending addition without recording a removal.
    pub fn cancel_add(&mut self, key: &K) -> Option<V> {
        self.adds.remove(key)
    }

    /// Drop a pending removal without recording an addition.
    pub fn cancel_remove(&mut self, key: &K) -> Option<V> {
        self.removes.remove(key)
    }

    pub fn pending_add(&self, key: &K) -> Option<&V> {
        self.adds.get(key)
    }

    pub fn pending_remove(&self, key: &K) -> Option<&V> {
        self.removes.get(key)
    }

    pub fn adds(&self) -> impl Iterator<Item = (&K, &V)> {
        self.adds.iter()
    }

    pub fn removes(&self) -> impl Iterator<Item = (&K, &V)> {
        self.removes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.removes.len()
    }

    pub fn clear(&mut self) {
        self.adds.clear();
        self.removes.clear();
    }

    /// Merge this ledger's pending changes into `target`, replaying them in
    /// record order so the usual cancellation rules apply. Removals first:
    /// an addition recorded on top of a removal of the same key must
    /// survive the merge as an addition.
    pub fn merge_into(&mut self, target: &mut DeltaLedger<K, V>) {
        for (key, value) in std::mem::take(&mut self.removes) {
            target.record_remove(key, value);
        }
        for (key, value) in std::mem::take(&mut self.adds) {
            target.record_add(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_cancels_pending_remove() {
        let mut delta: DeltaLedger<String, u32> = DeltaLedger::new();
        delta.record_remove("TOKEN".into(), 1);
        delta.record_add("TOKEN".into(), 2);
        assert!(delta.pending_remove(&"TOKEN".to_string()).is_none());
        assert_eq!(delta.pending_add(&"TOKEN".to_string()), Some(&2));
    }

    #[test]
    fn remove_cancels_pending_add() {
        let mut delta: DeltaLedger<String, u32> = DeltaLedger::new();
        delta.record_add("TOKEN".into(), 1);
        delta.record_remove("TOKEN".into(), 1);
        assert!(delta.pending_add(&"TOKEN".to_string()).is_none());
        assert_eq!(delta.pending_remove(&"TOKEN".to_string()), Some(&1));
    }

    #[test]
    fn merge_applies_removes_then_adds() {
        let mut shared: DeltaLedger<String, u32> = DeltaLedger::new();
        shared.record_add("A".into(), 1);
        shared.record_remove("B".into(), 2);

        let mut local: DeltaLedger<String, u32> = DeltaLedger::new();
        // The block removes A and re-adds B.
        local.record_remove("A".into(), 1);
        local.record_add("B".into(), 3);
        local.merge_into(&mut shared);

        assert!(shared.pending_add(&"A".to_string()).is_none());
        assert_eq!(shared.pending_remove(&"A".to_string()), Some(&1));
        assert_eq!(shared.pending_add(&"B".to_string()), Some(&3));
        assert!(shared.pending_remove(&"B".to_string()).is_none());
        assert!(local.is_empty());
    }
}
