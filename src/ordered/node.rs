//! Tree node record
//!
//! Node = item + two child links + balance tag.
//! Links are indices into the owning tree's node pool.

use std::fmt;

/// Which child of a node a descent took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards smaller items
    Left,

    /// Towards larger items
    Right,
}

impl Direction {
    /// The other side.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Which subtree is taller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Balance {
    /// Left subtree one level taller (-1)
    Left,

    /// Both subtrees of equal height (0)
    #[default]
    Balanced,

    /// Right subtree one level taller (+1)
    Right,
}

impl Balance {
    /// Signed balance factor, `height(right) - height(left)`.
    pub fn factor(self) -> i8 {
        match self {
            Balance::Left => -1,
            Balance::Balanced => 0,
            Balance::Right => 1,
        }
    }
}

impl From<Direction> for Balance {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Left => Balance::Left,
            Direction::Right => Balance::Right,
        }
    }
}

/// A node owned by an [`AvlTree`](super::AvlTree).
#[derive(Debug, Clone)]
pub struct OrderedNode<T> {
    /// Stored item
    pub item: T,

    /// Left child (pool index)
    pub left: Option<usize>,

    /// Right child (pool index)
    pub right: Option<usize>,

    /// Height tag
    pub balance: Balance,
}

impl<T> OrderedNode<T> {
    /// Create an unlinked, balanced node.
    pub fn leaf(item: T) -> Self {
        Self {
            item,
            left: None,
            right: None,
            balance: Balance::Balanced,
        }
    }

    /// Child on the given side.
    #[inline]
    pub fn child(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    /// Replace the child on the given side.
    #[inline]
    pub fn set_child(&mut self, direction: Direction, link: Option<usize>) {
        match direction {
            Direction::Left => self.left = link,
            Direction::Right => self.right = link,
        }
    }

    /// No children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Whether the balance tag leans towards `direction`.
    #[inline]
    pub fn leans(&self, direction: Direction) -> bool {
        self.balance == Balance::from(direction)
    }
}

impl<T: fmt::Display> fmt::Display for OrderedNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {:+}]", self.item, self.balance.factor())
    }
}
