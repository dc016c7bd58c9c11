//! Bounded snapshot cache.
//!
//! Entries are kept in insertion order. Re-inserting a key moves it to the
//! newest slot, and once the cache is full the oldest entry is evicted. Reads
//! never reorder entries.

use std::hash::Hash;
use std::sync::RwLock;

use indexmap::IndexMap;

use crate::types::{Document, DocumentId};

/// Cache of the most recently fetched documents.
pub type DocumentCache = EntityCache<DocumentId, Document>;

/// Bounded map with oldest-first eviction.
///
/// Internally synchronized so it can be shared between the fetch coordinator
/// and its in-flight fetch tasks.
#[derive(Debug)]
pub struct EntityCache<K, V> {
    capacity: usize,
    entries: RwLock<IndexMap<K, V>>,
}

impl<K, V> EntityCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(IndexMap::with_capacity(capacity)),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clone of the cached value, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    /// Insert or refresh `key`, evicting the oldest entries past capacity.
    ///
    /// Returns the keys that were evicted.
    pub fn insert(&self, key: K, value: V) -> Vec<K> {
        let mut entries = self.entries.write().unwrap();
        entries.shift_remove(&key);
        entries.insert(key, value);

        let mut evicted = Vec::new();
        while entries.len() > self.capacity {
            if let Some((old, _)) = entries.shift_remove_index(0) {
                evicted.push(old);
            }
        }
        evicted
    }

    /// Drop `key` from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().unwrap().shift_remove(key)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys, oldest first.
    pub fn keys(&self) -> Vec<K> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
