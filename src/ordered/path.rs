//! Recorded descent path
//!
//! Insertion and removal never recurse. The descent is written into a
//! reusable array of (node, direction) tokens and rebalancing walks it by
//! index, so native stack usage stays constant whatever the tree height.

use std::ops::Index;

use super::{Direction, OrderedError};

/// One step of a descent: the node visited and the child taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathToken {
    /// Pool index of the visited node
    pub node: usize,

    /// Which child the descent continued into
    pub direction: Direction,
}

/// Reusable scratch path owned by one tree.
///
/// Capacity is grown geometrically ahead of each insertion so that pushes
/// during the descent never allocate.
#[derive(Debug, Default)]
pub struct SearchPath {
    tokens: Vec<PathToken>,
}

impl SearchPath {
    /// Empty path without storage.
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    /// Worst-case AVL height for `nodes` nodes: ⌈1.4405·log2(n + 2)⌉.
    pub fn max_height(nodes: usize) -> usize {
        ((nodes as f64 + 2.0).log2() * 1.4405).ceil() as usize
    }

    /// Clear the path and make room for a descent through a tree of
    /// `nodes` nodes.
    pub fn prepare(&mut self, nodes: usize) -> Result<(), OrderedError> {
        self.tokens.clear();
        let levels = Self::max_height(nodes) + 1;
        if levels > self.tokens.capacity() {
            // Doubling keeps the number of regrowths logarithmic.
            let wanted = levels.max(self.tokens.capacity() * 2);
            self.tokens
                .try_reserve_exact(wanted)
                .map_err(|e| OrderedError::allocation("search path", e))?;
        }
        Ok(())
    }

    /// Clear without touching capacity.
    pub fn reset(&mut self) {
        self.tokens.clear();
    }

    /// Record one step.
    #[inline]
    pub fn push(&mut self, node: usize, direction: Direction) {
        self.tokens.push(PathToken { node, direction });
    }

    /// Overwrite a recorded step.
    #[inline]
    pub fn set(&mut self, level: usize, node: usize, direction: Direction) {
        self.tokens[level] = PathToken { node, direction };
    }

    /// Number of recorded steps.
    #[inline]
    pub fn levels(&self) -> usize {
        self.tokens.len()
    }

    /// Steps the path can hold without reallocating.
    pub fn max_levels(&self) -> usize {
        self.tokens.capacity()
    }

    /// All recorded steps, root first.
    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }
}

impl Index<usize> for SearchPath {
    type Output = PathToken;

    fn index(&self, level: usize) -> &PathToken {
        &self.tokens[level]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_reserves_worst_case_height() {
        let mut path = SearchPath::new();
        path.prepare(1000).unwrap();
        assert!(path.max_levels() > SearchPath::max_height(1000));

        // AVL height bound for 1000 nodes is 15
        assert_eq!(SearchPath::max_height(1000), 15);
    }

    #[test]
    fn test_push_and_overwrite() {
        let mut path = SearchPath::new();
        path.prepare(4).unwrap();
        path.push(0, Direction::Left);
        path.push(3, Direction::Right);
        path.set(0, 7, Direction::Right);

        assert_eq!(path.levels(), 2);
        assert_eq!(path[0], PathToken { node: 7, direction: Direction::Right });
        assert_eq!(path[1].node, 3);

        path.reset();
        assert_eq!(path.levels(), 0);
    }
}
