//! Cost-bounded LRU cache
//!
//! Entries live in a [`HashTable`] keyed by `K`. Every entry carries a cost;
//! when the total would exceed the budget the least recently used entries
//! are evicted first.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, error, trace};

use crate::ordered::{Comparator, HashTable, Insertion, KeyHasher, Order, OrderedError};

/// Errors reported by [`Cache`].
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid construction parameters.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// A single entry is more expensive than the whole budget.
    #[error("entry cost {cost} exceeds the cache budget {max_cost}")]
    TooCostly {
        /// Cost of the rejected entry
        cost: usize,
        /// Cache budget
        max_cost: usize,
    },

    /// The backing table failed.
    #[error(transparent)]
    Table(#[from] OrderedError),
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    /// `None` only in lookup keys
    value: Option<V>,
    cost: usize,
    stamp: u64,
}

impl<K, V> Entry<K, V> {
    fn lookup(key: K) -> Self {
        Self {
            key,
            value: None,
            cost: 0,
            stamp: 0,
        }
    }
}

/// Orders and hashes entries by key only.
#[derive(Debug, Clone, Copy, Default)]
struct ByKey;

impl<K: Ord, V> Comparator<Entry<K, V>> for ByKey {
    fn compare(&self, a: &Entry<K, V>, b: &Entry<K, V>) -> Ordering {
        a.key.cmp(&b.key)
    }
}

impl<K: Ord + Hash, V> KeyHasher<Entry<K, V>> for ByKey {
    fn hash(&self, item: &Entry<K, V>) -> u64 {
        let mut hasher = DefaultHasher::new();
        item.key.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug)]
struct Inner<K, V> {
    table: HashTable<Entry<K, V>, ByKey>,
    total_cost: usize,
    clock: u64,
}

impl<K: Ord + Hash + Clone, V> Inner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn take(&mut self, key: &K) -> Option<Entry<K, V>> {
        let entry = self.table.remove(&Entry::lookup(key.clone()))?;
        self.total_cost = match self.total_cost.checked_sub(entry.cost) {
            Some(total) => total,
            None => {
                error!(
                    total = self.total_cost,
                    cost = entry.cost,
                    "cache cost total underflow, clamping to zero"
                );
                0
            }
        };
        Some(entry)
    }

    /// Link `entry` in and account for its cost. A duplicate key leaves
    /// the table and the total untouched.
    fn store(&mut self, entry: Entry<K, V>) -> Result<(), CacheError> {
        let cost = entry.cost;
        match self.table.insert(entry) {
            Ok(Insertion::Inserted) => {
                self.total_cost += cost;
                Ok(())
            }
            Ok(Insertion::Duplicate(_)) => {
                error!(cost, total = self.total_cost, "cache key stored twice, entry dropped");
                Ok(())
            }
            Err(failed) => Err(failed.into_error().into()),
        }
    }

    fn least_recent(&self) -> Option<K> {
        self.table
            .iter(Order::Ascending)
            .min_by_key(|entry| entry.stamp)
            .map(|entry| entry.key.clone())
    }
}

/// Thread-safe cache holding at most `max_cost` worth of values.
#[derive(Debug)]
pub struct Cache<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_cost: usize,
}

impl<K: Ord + Hash + Clone, V> Cache<K, V> {
    /// Empty cache with the given budget.
    pub fn new(max_cost: usize) -> Result<Self, CacheError> {
        if max_cost == 0 {
            error!("cache budget must be positive");
            return Err(CacheError::BadParameters("max cost must be positive".into()));
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                table: HashTable::new(ByKey),
                total_cost: 0,
                clock: 0,
            }),
            max_cost,
        })
    }

    /// Cost budget.
    pub fn max_cost(&self) -> usize {
        self.max_cost
    }

    /// Sum of the costs of the cached entries.
    pub fn total_cost(&self) -> usize {
        self.lock().total_cost
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().table.len()
    }

    /// Nothing cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache `value` under `key`, replacing and returning any previous
    /// value, then evict old entries until the budget holds.
    pub fn insert(&self, key: K, value: V, cost: usize) -> Result<Option<V>, CacheError> {
        if cost > self.max_cost {
            debug!(cost, max_cost = self.max_cost, "entry rejected by cache");
            return Err(CacheError::TooCostly {
                cost,
                max_cost: self.max_cost,
            });
        }

        let mut inner = self.lock();
        let previous = inner.take(&key).and_then(|entry| entry.value);

        while inner.total_cost + cost > self.max_cost {
            let Some(victim) = inner.least_recent() else {
                break;
            };
            trace!(total = inner.total_cost, "evicting least recently used entry");
            inner.take(&victim);
        }

        let stamp = inner.tick();
        let entry = Entry {
            key,
            value: Some(value),
            cost,
            stamp,
        };
        inner.store(entry)?;
        Ok(previous)
    }

    /// Clone of the value under `key`; marks it as recently used.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut inner = self.lock();
        let Some(mut entry) = inner.table.remove(&Entry::lookup(key.clone())) else {
            debug!("cache miss");
            return None;
        };
        entry.stamp = inner.tick();
        let value = entry.value.clone();
        let cost = entry.cost;
        if let Err(e) = inner.table.insert(entry) {
            // The entry is gone; drop its cost with it.
            error!(error = %e, "failed to re-insert cache entry");
            inner.total_cost = inner.total_cost.saturating_sub(cost);
        }
        value
    }

    /// Remove the value under `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().take(key).and_then(|entry| entry.value)
    }

    /// Whether `key` is cached. Does not count as a use.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().table.contains(&Entry::lookup(key.clone()))
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.table.clear();
        inner.total_cost = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replace_remove() {
        let cache = Cache::new(10).unwrap();
        assert_eq!(cache.insert("a", 1, 3).unwrap(), None);
        assert_eq!(cache.insert("a", 2, 4).unwrap(), Some(1));
        assert_eq!(cache.total_cost(), 4);
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.remove(&"a"), Some(2));
        assert_eq!(cache.total_cost(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_duplicate_store_keeps_cost_total() {
        let mut inner = Inner {
            table: HashTable::new(ByKey),
            total_cost: 0,
            clock: 0,
        };
        inner.store(Entry { key: 1, value: Some("a"), cost: 3, stamp: 1 }).unwrap();
        inner.store(Entry { key: 1, value: Some("b"), cost: 5, stamp: 2 }).unwrap();
        assert_eq!(inner.total_cost, 3);
        assert_eq!(inner.table.len(), 1);

        let kept = inner.take(&1).unwrap();
        assert_eq!(kept.value, Some("a"));
        assert_eq!(inner.total_cost, 0);
    }

    #[test]
    fn test_rejects_oversized_entry() {
        let cache: Cache<u32, u32> = Cache::new(5).unwrap();
        assert!(matches!(
            cache.insert(1, 1, 6),
            Err(CacheError::TooCostly { cost: 6, max_cost: 5 })
        ));
        assert!(Cache::<u32, u32>::new(0).is_err());
    }
}
