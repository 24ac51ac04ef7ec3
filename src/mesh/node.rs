//! Triangle-tree node records

#[cfg(feature = "visualize")]
use serde::{Deserialize, Serialize};

use super::ActionMask;

/// Vertex identifier handed out by the oracle.
pub type VertexId = u32;

/// One triangle of the bisection forest.
///
/// Leaves own a triangle slot; internal nodes own children instead. The
/// right child is always `first_child + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(Serialize, Deserialize))]
pub struct MeshNode {
    /// Subdivision level (base mesh = 0)
    pub level: u32,

    /// Triangle slot, `None` once split
    pub triangle: Option<usize>,

    /// Left child, `None` for leaves
    pub first_child: Option<usize>,

    /// Node across the `apex → left` leg
    pub left_neighbor: Option<usize>,

    /// Node across the `right → apex` leg
    pub right_neighbor: Option<usize>,

    /// Node across the base (`left → right`)
    pub base_neighbor: Option<usize>,
}

impl MeshNode {
    /// Unlinked leaf owning `triangle`.
    pub fn leaf(level: u32, triangle: usize) -> Self {
        Self {
            level,
            triangle: Some(triangle),
            first_child: None,
            left_neighbor: None,
            right_neighbor: None,
            base_neighbor: None,
        }
    }

    /// Not split yet.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// `(left, right)` children of a split node.
    pub fn children(&self) -> Option<(usize, usize)> {
        self.first_child.map(|left| (left, left + 1))
    }

    pub(crate) fn link(&self, side: Link) -> Option<usize> {
        match side {
            Link::Left => self.left_neighbor,
            Link::Right => self.right_neighbor,
            Link::Base => self.base_neighbor,
        }
    }

    pub(crate) fn set_link(&mut self, side: Link, node: Option<usize>) {
        match side {
            Link::Left => self.left_neighbor = node,
            Link::Right => self.right_neighbor = node,
            Link::Base => self.base_neighbor = node,
        }
    }
}

/// Neighbour field of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Left,
    Right,
    Base,
}

impl Link {
    /// Fields to try, in order, when the neighbour across our `self` leg
    /// must be repointed: same leg, other leg, base.
    pub(crate) fn relink_order(self) -> [Link; 3] {
        match self {
            Link::Left => [Link::Left, Link::Right, Link::Base],
            Link::Right | Link::Base => [Link::Right, Link::Left, Link::Base],
        }
    }
}

/// Front record attached to each triangle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(Serialize, Deserialize))]
pub struct FrontInfo {
    /// Last decision of the oracle for this triangle
    pub last_mask: ActionMask,

    /// Leaf owning the slot
    pub node: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_children() {
        let mut node = MeshNode::leaf(3, 7);
        assert!(node.is_leaf());
        assert_eq!(node.children(), None);

        node.first_child = Some(10);
        node.triangle = None;
        assert_eq!(node.children(), Some((10, 11)));
    }

    #[test]
    fn test_links() {
        let mut node = MeshNode::leaf(0, 0);
        node.set_link(Link::Base, Some(4));
        assert_eq!(node.link(Link::Base), Some(4));
        assert_eq!(Link::Right.relink_order()[0], Link::Right);
    }
}
