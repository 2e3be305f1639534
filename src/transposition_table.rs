//! A bounded cache of search results with least-recently-used eviction

use log::trace;
use parking_lot::RwLock;

use std::collections::HashMap;

/// Number of entries kept by a default sized table
pub const DEFAULT_TABLE_CAPACITY: usize = 1_000_000;

/// How a stored score relates to the true score of the position
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Bound {
    /// The score is the exact value of the position
    Exact,
    /// The search failed high, the true score is at least this value
    Lower,
    /// The search failed low, the true score is at most this value
    Upper,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Entry {
    pub score: i32,
    pub column: Option<usize>,
    pub bound: Bound,
}

impl Entry {
    pub fn exact(score: i32, column: Option<usize>) -> Self {
        Self {
            score,
            column,
            bound: Bound::Exact,
        }
    }
    pub fn lower(score: i32, column: Option<usize>) -> Self {
        Self {
            score,
            column,
            bound: Bound::Lower,
        }
    }
    pub fn upper(score: i32, column: Option<usize>) -> Self {
        Self {
            score,
            column,
            bound: Bound::Upper,
        }
    }
}

// marks the end of the recency list
const NIL: usize = usize::MAX;

struct Slot {
    key: u64,
    entry: Entry,
    // neighbours towards the most and least recently used ends
    newer: usize,
    older: usize,
}

/// Slab of slots threaded onto a doubly linked recency list
struct LruList {
    capacity: usize,
    index: HashMap<u64, usize>,
    slots: Vec<Slot>,
    newest: usize,
    oldest: usize,
}

impl LruList {
    fn new(capacity: usize) -> Self {
        // grow on demand, a full sized table is rarely needed
        let reserved = capacity.min(1 << 16);
        Self {
            capacity,
            index: HashMap::with_capacity(reserved),
            slots: Vec::with_capacity(reserved),
            newest: NIL,
            oldest: NIL,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (newer, older) = (self.slots[slot].newer, self.slots[slot].older);
        match newer {
            NIL => self.newest = older,
            _ => self.slots[newer].older = older,
        }
        match older {
            NIL => self.oldest = newer,
            _ => self.slots[older].newer = newer,
        }
    }

    fn push_newest(&mut self, slot: usize) {
        self.slots[slot].newer = NIL;
        self.slots[slot].older = self.newest;
        match self.newest {
            NIL => self.oldest = slot,
            newest => self.slots[newest].newer = slot,
        }
        self.newest = slot;
    }

    fn touch(&mut self, slot: usize) {
        if self.newest != slot {
            self.unlink(slot);
            self.push_newest(slot);
        }
    }

    fn insert(&mut self, key: u64, entry: Entry) {
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot].entry = entry;
            self.touch(slot);
            return;
        }

        let slot = if self.slots.len() < self.capacity {
            self.slots.push(Slot {
                key,
                entry,
                newer: NIL,
                older: NIL,
            });
            self.slots.len() - 1
        } else {
            // reuse the slot of the least recently used entry
            let slot = self.oldest;
            self.unlink(slot);
            self.index.remove(&self.slots[slot].key);
            self.slots[slot].key = key;
            self.slots[slot].entry = entry;
            slot
        };
        self.index.insert(key, slot);
        self.push_newest(slot);
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.newest = NIL;
        self.oldest = NIL;
    }
}

/// A fixed capacity map from position keys to search results
///
/// Once full, inserting a new key evicts the entry that was least recently
/// read or written. The table is shared between threads by reference: misses,
/// `contains` and `len` only take the read lock, while hits take the write
/// lock to move the entry to the front of the recency list.
pub struct TranspositionTable {
    inner: RwLock<LruList>,
}

impl TranspositionTable {
    /// Creates an empty table holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LruList::new(capacity.max(1))),
        }
    }

    /// Fetches the entry for `key`, marking it as most recently used
    pub fn get(&self, key: u64) -> Option<Entry> {
        if !self.inner.read().index.contains_key(&key) {
            return None;
        }
        let mut inner = self.inner.write();
        // the entry may have been evicted between the two locks
        let slot = *inner.index.get(&key)?;
        inner.touch(slot);
        Some(inner.slots[slot].entry)
    }

    /// Inserts or overwrites the entry for `key`, marking it as most recently used
    pub fn put(&self, key: u64, entry: Entry) {
        self.inner.write().insert(key, entry);
    }

    /// Checks for `key` without changing its recency
    pub fn contains(&self, key: u64) -> bool {
        self.inner.read().index.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        trace!("clearing transposition table with {} entries", inner.index.len());
        inner.clear();
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    fn entry(score: i32) -> Entry {
        Entry::exact(score, Some(0))
    }

    #[test]
    fn get_returns_stored_entry() {
        let table = TranspositionTable::new(4);
        assert_eq!(table.get(1), None);

        table.put(1, Entry::lower(5, Some(3)));
        assert_eq!(table.get(1), Some(Entry::lower(5, Some(3))));

        table.put(1, Entry::upper(-2, None));
        assert_eq!(table.get(1), Some(Entry::upper(-2, None)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn evicts_first_inserted_key() {
        let table = TranspositionTable::new(3);
        for key in 0..4 {
            table.put(key, entry(key as i32));
        }
        assert_eq!(table.len(), 3);
        assert!(!table.contains(0));
        assert!(table.contains(1) && table.contains(2) && table.contains(3));
    }

    #[test]
    fn get_protects_from_eviction() {
        let table = TranspositionTable::new(3);
        for key in 0..3 {
            table.put(key, entry(key as i32));
        }
        assert!(table.get(0).is_some());
        table.put(3, entry(3));

        assert!(table.contains(0));
        assert!(!table.contains(1));

        // overwriting also refreshes the key
        table.put(2, entry(20));
        table.put(4, entry(4));
        assert!(!table.contains(0));
        assert!(table.contains(2) && table.contains(3));
        assert_eq!(table.get(2), Some(entry(20)));
    }

    #[test]
    fn contains_does_not_refresh() {
        let table = TranspositionTable::new(2);
        table.put(0, entry(0));
        table.put(1, entry(1));
        assert!(table.contains(0));
        table.put(2, entry(2));
        assert!(!table.contains(0));
    }

    #[test]
    fn clear_empties_table() {
        let table = TranspositionTable::new(8);
        for key in 0..8 {
            table.put(key, entry(0));
        }
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 8);

        table.put(42, entry(1));
        assert_eq!(table.get(42), Some(entry(1)));
    }

    #[test]
    fn zero_capacity_holds_one_entry() {
        let table = TranspositionTable::new(0);
        table.put(1, entry(1));
        table.put(2, entry(2));
        assert_eq!(table.len(), 1);
        assert!(table.contains(2));
    }

    #[test]
    fn concurrent_access() {
        let table = Arc::new(TranspositionTable::new(1000));
        let handles = (0..4u64)
            .map(|t| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..10_000u64 {
                        let key = t * 100_000 + i % 500;
                        table.put(key, entry(i as i32));
                        table.get(key);
                        table.get(key + 1);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 1000);
    }
}
