//! Ordered data engine
//!
//! An AVL tree over owned nodes and a hash table whose buckets are AVL trees.
//! Both are polymorphic over the key type through the [`Comparator`] and
//! [`KeyHasher`] traits chosen at construction time.
//!
//! Neither structure recurses: insertion and removal record the descent in a
//! reusable path array and rebalance by indexing into it, iterators keep an
//! explicit stack.

mod avl;
mod hash_table;
mod node;
mod path;

pub use avl::{AvlTree, Detached, Iter};
pub use hash_table::{HashTable, HashTableConfig, TableDetached, TableIter, DEFAULT_CAPACITY};
pub use node::{Balance, Direction, OrderedNode};
pub use path::{PathToken, SearchPath};

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::TryReserveError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;

/// Errors reported by the tree and the hash table.
#[derive(Debug, Error)]
pub enum OrderedError {
    /// Caller supplied an argument the operation cannot accept.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// Growing an internal array failed; the structure is unchanged.
    #[error("allocation failed while growing {what}")]
    Allocation {
        /// Which array was being grown.
        what: &'static str,
        /// Underlying reservation failure.
        #[source]
        source: TryReserveError,
    },
}

impl OrderedError {
    pub(crate) fn allocation(what: &'static str, source: TryReserveError) -> Self {
        tracing::error!(what, error = %source, "allocation failure");
        OrderedError::Allocation { what, source }
    }

    pub(crate) fn bad_parameters(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!(reason = %msg, "bad parameters");
        OrderedError::BadParameters(msg)
    }
}

/// Strict total order over `T`.
///
/// Must stay consistent for as long as an item is stored in a structure.
pub trait Comparator<T: ?Sized> {
    /// Compare two items.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Comparator that also distributes items over hash buckets.
///
/// Collisions are fine; they land in the same bucket tree.
pub trait KeyHasher<T: ?Sized>: Comparator<T> {
    /// Hash an item.
    fn hash(&self, item: &T) -> u64;
}

/// Orders items by their `Ord` implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Comparator<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// `Ord` ordering plus `Hash` hashing through a fixed-key SipHash.
///
/// Deterministic across runs, so bucket layouts are reproducible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StdHashOrder;

impl<T: Ord + ?Sized> Comparator<T> for StdHashOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: Ord + Hash + ?Sized> KeyHasher<T> for StdHashOrder {
    fn hash(&self, item: &T) -> u64 {
        let mut state = DefaultHasher::new();
        item.hash(&mut state);
        state.finish()
    }
}

/// Comparator shared between a hash table and its bucket trees.
///
/// Every bucket delegates back to the table's single comparator instance.
#[derive(Debug)]
pub struct Shared<H>(Arc<H>);

impl<H> Shared<H> {
    pub(crate) fn new(inner: H) -> Self {
        Shared(Arc::new(inner))
    }

    /// The wrapped comparator.
    pub fn get(&self) -> &H {
        &self.0
    }
}

impl<H> Clone for Shared<H> {
    fn clone(&self) -> Self {
        Shared(Arc::clone(&self.0))
    }
}

impl<T: ?Sized, H: Comparator<T>> Comparator<T> for Shared<H> {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.0.compare(a, b)
    }
}

impl<T: ?Sized, H: KeyHasher<T>> KeyHasher<T> for Shared<H> {
    fn hash(&self, item: &T) -> u64 {
        self.0.hash(item)
    }
}

/// Traversal order for iterators and `detach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Smallest item first.
    #[default]
    Ascending,
    /// Largest item first.
    Descending,
}

impl Order {
    /// Side whose spine is visited first.
    pub(crate) fn leading(self) -> Direction {
        match self {
            Order::Ascending => Direction::Left,
            Order::Descending => Direction::Right,
        }
    }
}

/// Result of an insertion.
///
/// A rejected item is handed back so ownership never silently leaks.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum Insertion<T> {
    /// The item was linked in and is now owned by the structure.
    Inserted,
    /// An item comparing equal already exists; the new one is returned.
    Duplicate(T),
}

impl<T> Insertion<T> {
    /// Whether the item was linked in.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Insertion::Inserted)
    }

    /// The rejected item, if any.
    pub fn into_rejected(self) -> Option<T> {
        match self {
            Insertion::Inserted => None,
            Insertion::Duplicate(item) => Some(item),
        }
    }
}

/// An insertion that failed before the item was linked in.
///
/// The structure is unchanged and the item is handed back with the cause.
pub struct InsertError<T> {
    /// The item that was not stored
    pub item: T,

    /// Why it was not stored
    pub error: OrderedError,
}

impl<T> InsertError<T> {
    pub(crate) fn new(item: T, error: OrderedError) -> Self {
        Self { item, error }
    }

    /// Recover the item.
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Drop the item and keep the cause.
    pub fn into_error(self) -> OrderedError {
        self.error
    }
}

impl<T> fmt::Debug for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for InsertError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item not inserted: {}", self.error)
    }
}

impl<T> std::error::Error for InsertError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_comparator() {
        let reversed = |a: &i32, b: &i32| b.cmp(a);
        assert_eq!(reversed.compare(&1, &2), Ordering::Greater);
    }

    #[test]
    fn test_std_hash_is_deterministic() {
        let hasher = StdHashOrder;
        assert_eq!(KeyHasher::<u32>::hash(&hasher, &42), KeyHasher::<u32>::hash(&hasher, &42));
    }

    #[test]
    fn test_insertion_rejected_item() {
        let outcome: Insertion<u8> = Insertion::Duplicate(7);
        assert!(!outcome.is_inserted());
        assert_eq!(outcome.into_rejected(), Some(7));
    }

    #[test]
    fn test_insert_error_keeps_item() {
        let failed = InsertError::new("key", OrderedError::BadParameters("full".into()));
        assert_eq!(failed.to_string(), "item not inserted: bad parameters: full");
        assert!(std::error::Error::source(&failed).is_some());
        assert_eq!(failed.into_inner(), "key");
    }
}
