//! Hash table with AVL-tree buckets
//!
//! Bucket = `hash(item) % capacity`; collisions are ordered inside the
//! bucket's tree by the table's comparator. The table resizes whenever the
//! load factor `len / capacity` leaves the configured `[min, max]` band.

use std::fmt;
use std::mem;

use tracing::{debug, error, warn};

use super::avl::{AvlTree, Detached, Iter};
use super::{InsertError, Insertion, KeyHasher, Order, OrderedError, Shared};

/// Capacity used when nothing else determines it.
pub const DEFAULT_CAPACITY: usize = 16;

/// Sizing parameters for a [`HashTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HashTableConfig {
    /// Bucket count allocated on first insert (0 = derive it)
    pub initial_capacity: usize,

    /// Shrink when the load drops below this (0 = never)
    pub min_load: f64,

    /// Grow when the load exceeds this (0 = never)
    pub max_load: f64,
}

impl HashTableConfig {
    /// No load limits, default capacity.
    pub fn new() -> Self {
        Self {
            initial_capacity: 0,
            min_load: 0.0,
            max_load: 0.0,
        }
    }

    /// Set the bucket count used on first insert.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the load band.
    pub fn with_load_limits(mut self, min_load: f64, max_load: f64) -> Self {
        self.min_load = min_load;
        self.max_load = max_load;
        self
    }

    /// Check the load band.
    pub fn validate(&self) -> Result<(), OrderedError> {
        validate_limits(self.min_load, self.max_load)
    }

    /// Load the table is steered towards after a resize, if any limit is set.
    fn target_load(&self) -> Option<f64> {
        match (self.min_load > 0.0, self.max_load > 0.0) {
            (true, true) => Some((self.min_load + self.max_load) / 2.0),
            (false, true) => Some(self.max_load / 2.0),
            (true, false) => Some(self.min_load * 2.0),
            (false, false) => None,
        }
    }

    fn first_capacity(&self) -> usize {
        if self.initial_capacity > 0 {
            self.initial_capacity
        } else if self.min_load > 0.0 {
            ((1.0 / self.min_load).ceil() as usize).max(1)
        } else {
            DEFAULT_CAPACITY
        }
    }
}

impl Default for HashTableConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_limits(min_load: f64, max_load: f64) -> Result<(), OrderedError> {
    if !min_load.is_finite() || !max_load.is_finite() || min_load < 0.0 || max_load < 0.0 {
        return Err(OrderedError::bad_parameters(format!(
            "load limits must be finite and non-negative (min {min_load}, max {max_load})"
        )));
    }
    if min_load > 0.0 && max_load > 0.0 && min_load >= max_load {
        return Err(OrderedError::bad_parameters(format!(
            "minimum load {min_load} must be below maximum load {max_load}"
        )));
    }
    Ok(())
}

type Bucket<T, H> = Option<AvlTree<T, Shared<H>>>;

/// Keyed storage with amortised O(1) access.
pub struct HashTable<T, H> {
    hasher: Shared<H>,
    buckets: Vec<Bucket<T, H>>,
    counter: usize,
    config: HashTableConfig,
    resizes: usize,
}

impl<T, H> HashTable<T, H> {
    /// Empty table with default sizing.
    pub fn new(hasher: H) -> Self {
        Self {
            hasher: Shared::new(hasher),
            buckets: Vec::new(),
            counter: 0,
            config: HashTableConfig::new(),
            resizes: 0,
        }
    }

    /// Empty table with explicit sizing.
    pub fn with_config(hasher: H, config: HashTableConfig) -> Result<Self, OrderedError> {
        config.validate()?;
        let mut table = Self::new(hasher);
        table.config = config;
        Ok(table)
    }

    /// Number of stored items.
    #[inline]
    pub fn len(&self) -> usize {
        self.counter
    }

    /// No items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }

    /// Number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// `len / capacity`, 0 without buckets.
    pub fn load(&self) -> f64 {
        if self.buckets.is_empty() {
            0.0
        } else {
            self.counter as f64 / self.buckets.len() as f64
        }
    }

    /// How many times an existing bucket array was rebuilt.
    pub fn resize_count(&self) -> usize {
        self.resizes
    }

    /// Current sizing parameters.
    pub fn config(&self) -> &HashTableConfig {
        &self.config
    }

    /// The table's comparator and hasher.
    pub fn hasher(&self) -> &H {
        self.hasher.get()
    }

    /// Number of allocated bucket trees.
    pub fn occupied_buckets(&self) -> usize {
        self.buckets.iter().flatten().count()
    }

    /// Drop every item, keeping the bucket array.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = None;
        }
        self.counter = 0;
    }

    /// Walk every item: buckets in index order, each bucket sorted.
    pub fn iter(&self, order: Order) -> TableIter<'_, T> {
        let buckets: Vec<Iter<'_, T>> = self
            .buckets
            .iter()
            .flatten()
            .map(|tree| tree.iter(order))
            .collect();
        TableIter {
            buckets: buckets.into_iter(),
            current: None,
            remaining: self.counter,
        }
    }

    /// Hand every item to the returned iterator and leave the table empty.
    pub fn detach(&mut self, order: Order) -> TableDetached<T, H> {
        let trees: Vec<_> = self.buckets.iter_mut().filter_map(Option::take).collect();
        let remaining = mem::replace(&mut self.counter, 0);
        TableDetached {
            trees: trees.into_iter(),
            current: None,
            order,
            remaining,
        }
    }
}

impl<T, H: KeyHasher<T>> HashTable<T, H> {
    fn bucket_of(&self, item: &T) -> usize {
        (self.hasher.hash(item) % self.buckets.len() as u64) as usize
    }

    /// Rebuild the bucket array with `capacity` buckets.
    ///
    /// `0` releases the array and is only accepted for an empty table.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), OrderedError> {
        if capacity == 0 {
            if self.counter != 0 {
                return Err(OrderedError::bad_parameters(format!(
                    "cannot release buckets of a table holding {} items",
                    self.counter
                )));
            }
            self.buckets = Vec::new();
            return Ok(());
        }

        let mut fresh: Vec<Bucket<T, H>> = Vec::new();
        fresh
            .try_reserve_exact(capacity)
            .map_err(|e| OrderedError::allocation("hash table buckets", e))?;
        fresh.resize_with(capacity, || None);

        let old = mem::replace(&mut self.buckets, fresh);
        let rebuilt = !old.is_empty();
        let expected = self.counter;
        let mut moved = 0;
        for mut tree in old.into_iter().flatten() {
            for item in tree.detach(Order::Ascending) {
                match self.place(item) {
                    Ok(Insertion::Inserted) => moved += 1,
                    Ok(Insertion::Duplicate(_)) => {
                        error!("rehash found a duplicate; comparator and hash disagree, item dropped");
                    }
                    Err(err) => error!(error = %err.error, "rehash could not reinsert an item; dropped"),
                }
            }
        }
        if moved != expected {
            error!(expected, moved, "item count changed during rehash");
        }
        self.counter = moved;
        if rebuilt {
            self.resizes += 1;
        }
        debug!(capacity, items = moved, "hash table resized");
        Ok(())
    }

    /// Change the load band, resizing at once if the table is outside it.
    pub fn set_load_limits(&mut self, min_load: f64, max_load: f64) -> Result<(), OrderedError> {
        validate_limits(min_load, max_load)?;
        self.config.min_load = min_load;
        self.config.max_load = max_load;
        if self.counter > 0 && self.outside_limits() {
            self.set_capacity(self.balanced_capacity())?;
        }
        Ok(())
    }

    fn outside_limits(&self) -> bool {
        let load = self.load();
        (self.config.max_load > 0.0 && load > self.config.max_load)
            || (self.config.min_load > 0.0 && load < self.config.min_load)
    }

    /// Capacity that puts the load near the middle of the band, nudged to
    /// land inside it whenever an integer capacity allows.
    fn balanced_capacity(&self) -> usize {
        let Some(target) = self.config.target_load() else {
            return self.capacity().max(1);
        };
        let count = self.counter as f64;
        let (min, max) = (self.config.min_load, self.config.max_load);
        let mut capacity = ((count / target).round() as usize).max(1);
        if max > 0.0 {
            while count / (capacity as f64) > max {
                capacity += 1;
            }
        }
        if min > 0.0 {
            while capacity > 1
                && count / (capacity as f64) < min
                && (max <= 0.0 || count / ((capacity - 1) as f64) <= max)
            {
                capacity -= 1;
            }
        }
        capacity
    }

    fn place(&mut self, item: T) -> Result<Insertion<T>, InsertError<T>> {
        let index = self.bucket_of(&item);
        let hasher = &self.hasher;
        self.buckets[index]
            .get_or_insert_with(|| AvlTree::new(hasher.clone()))
            .insert(item)
    }

    /// Store `item`; a duplicate is handed back, and so is an item that
    /// could not be stored.
    pub fn insert(&mut self, item: T) -> Result<Insertion<T>, InsertError<T>> {
        if self.buckets.is_empty() {
            if let Err(error) = self.set_capacity(self.config.first_capacity()) {
                return Err(InsertError::new(item, error));
            }
        }
        let outcome = self.place(item)?;
        if outcome.is_inserted() {
            self.counter += 1;
            if self.config.max_load > 0.0 && self.load() > self.config.max_load {
                if let Err(err) = self.set_capacity(self.balanced_capacity()) {
                    warn!(error = %err, load = self.load(), "growing the table failed; keeping current buckets");
                }
            }
        }
        Ok(outcome)
    }

    /// Take out the item comparing equal to `key`.
    pub fn remove(&mut self, key: &T) -> Option<T> {
        if self.buckets.is_empty() {
            debug!("remove on a table without buckets");
            return None;
        }
        let index = self.bucket_of(key);
        let bucket = &mut self.buckets[index];
        let item = bucket.as_mut()?.remove(key)?;
        if bucket.as_ref().is_some_and(AvlTree::is_empty) {
            *bucket = None;
        }

        if self.counter == 0 {
            error!("removed an item from a table whose counter was already zero");
        }
        self.counter = self.counter.saturating_sub(1);
        if self.config.min_load > 0.0 && self.counter > 0 && self.load() < self.config.min_load {
            if let Err(err) = self.set_capacity(self.balanced_capacity()) {
                warn!(error = %err, load = self.load(), "shrinking the table failed; keeping current buckets");
            }
        }
        Some(item)
    }

    /// Item comparing equal to `key`.
    pub fn search(&self, key: &T) -> Option<&T> {
        if self.buckets.is_empty() {
            return None;
        }
        match &self.buckets[self.bucket_of(key)] {
            Some(tree) => tree.search(key),
            None => {
                debug!("search: bucket empty");
                None
            }
        }
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: &T) -> bool {
        self.search(key).is_some()
    }
}

impl<T, H> fmt::Debug for HashTable<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("len", &self.counter)
            .field("capacity", &self.buckets.len())
            .field("config", &self.config)
            .field("resizes", &self.resizes)
            .finish()
    }
}

/// Borrowing iterator over a whole table.
///
/// One sub-iterator per non-empty bucket, each dropped once exhausted.
#[derive(Debug)]
pub struct TableIter<'a, T> {
    buckets: std::vec::IntoIter<Iter<'a, T>>,
    current: Option<Iter<'a, T>>,
    remaining: usize,
}

impl<'a, T> Iterator for TableIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(item);
            }
            self.current = Some(self.buckets.next()?);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Owning iterator produced by [`HashTable::detach`].
pub struct TableDetached<T, H> {
    trees: std::vec::IntoIter<AvlTree<T, Shared<H>>>,
    current: Option<Detached<T>>,
    order: Order,
    remaining: usize,
}

impl<T, H> Iterator for TableDetached<T, H> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.current.as_mut().and_then(Iterator::next) {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(item);
            }
            let mut tree = self.trees.next()?;
            self.current = Some(tree.detach(self.order));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, H> fmt::Debug for TableDetached<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDetached")
            .field("remaining", &self.remaining)
            .field("order", &self.order)
            .finish()
    }
}
