//! AVL tree over a dense node pool
//!
//! Nodes live in a `Vec` and link to each other by index. Removal keeps the
//! pool dense: the freed slot is filled with the last node, whose single
//! incoming link is found again by descending on its key.
//!
//! Insert: descend, link a leaf, fix balances below the deepest tilted
//! ancestor, at most one single or double rotation.
//! Remove: splice out (successor takes the place of a node with a right
//! subtree), then walk the recorded path bottom-up rebalancing.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::{debug, error};

use super::node::{Balance, Direction, OrderedNode};
use super::path::{PathToken, SearchPath};
use super::{Comparator, InsertError, Insertion, Order, OrderedError};
use crate::space::{report_growth, AllocationHook};

/// Self-balancing binary search tree.
///
/// Duplicates (items comparing equal) are rejected, never merged.
pub struct AvlTree<T, C> {
    nodes: Vec<OrderedNode<T>>,
    root: Option<usize>,
    comparator: C,
    path: SearchPath,
    hook: Option<Arc<dyn AllocationHook>>,
}

impl<T, C> AvlTree<T, C> {
    /// Empty tree ordered by `comparator`.
    pub fn new(comparator: C) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            comparator,
            path: SearchPath::new(),
            hook: None,
        }
    }

    /// Report node pool growth to `hook`.
    pub fn set_allocation_hook(&mut self, hook: Arc<dyn AllocationHook>) {
        let size = mem::size_of::<OrderedNode<T>>();
        hook.allocated(self.nodes.capacity() * size);
        if let Some(old) = self.hook.replace(hook) {
            old.released(self.nodes.capacity() * size);
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The comparator the tree was built with.
    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Smallest item.
    pub fn first(&self) -> Option<&T> {
        self.extreme(Direction::Left)
    }

    /// Largest item.
    pub fn last(&self) -> Option<&T> {
        self.extreme(Direction::Right)
    }

    fn extreme(&self, side: Direction) -> Option<&T> {
        let mut current = self.root?;
        while let Some(next) = self.nodes[current].child(side) {
            current = next;
        }
        Some(&self.nodes[current].item)
    }

    /// Drop every node. The pool is released without recursion.
    pub fn clear(&mut self) {
        let released = self.nodes.capacity();
        self.nodes = Vec::new();
        self.root = None;
        self.path.reset();
        report_growth(
            self.hook.as_deref(),
            mem::size_of::<OrderedNode<T>>(),
            released,
            0,
        );
    }

    /// Lazy in-order traversal.
    pub fn iter(&self, order: Order) -> Iter<'_, T> {
        Iter::new(&self.nodes, self.root, order)
    }

    /// Hand every item to the returned iterator and leave the tree empty.
    pub fn detach(&mut self, order: Order) -> Detached<T> {
        let nodes = mem::take(&mut self.nodes);
        let root = self.root.take();
        self.path.reset();
        report_growth(
            self.hook.as_deref(),
            mem::size_of::<OrderedNode<T>>(),
            nodes.capacity(),
            0,
        );
        Detached::new(nodes, root, order)
    }

    /// Number of levels; 0 for an empty tree.
    pub fn height(&self) -> usize {
        self.subtree_heights().map_or(0, |heights| heights.root)
    }

    /// Check the balance tags and the AVL height invariant at every node.
    ///
    /// Ordering is checked separately by [`AvlTree::is_ordered`].
    pub fn is_balanced(&self) -> bool {
        let Some(heights) = self.subtree_heights() else {
            return true;
        };
        self.nodes.iter().all(|node| {
            let left = node.left.map_or(0, |l| heights.of[l]);
            let right = node.right.map_or(0, |r| heights.of[r]);
            let expected = match right as isize - left as isize {
                -1 => Balance::Left,
                0 => Balance::Balanced,
                1 => Balance::Right,
                _ => return false,
            };
            node.balance == expected
        })
    }

    /// Height of every subtree, computed children-first from a reversed
    /// pre-order so no recursion is needed.
    fn subtree_heights(&self) -> Option<Heights> {
        let root = self.root?;
        let mut preorder = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            preorder.push(id);
            stack.extend(self.nodes[id].left);
            stack.extend(self.nodes[id].right);
        }

        let mut of = vec![0usize; self.nodes.len()];
        for &id in preorder.iter().rev() {
            let node = &self.nodes[id];
            let left = node.left.map_or(0, |l| of[l]);
            let right = node.right.map_or(0, |r| of[r]);
            of[id] = 1 + left.max(right);
        }
        Some(Heights { root: of[root], of })
    }

    fn attach(&mut self, level: usize, link: Option<usize>) {
        if level == 0 {
            self.root = link;
        } else {
            let PathToken { node, direction } = self.path[level - 1];
            self.nodes[node].set_child(direction, link);
        }
    }

    /// Rotate `top` down towards `toward`; its child on the other side rises.
    fn rotate(&mut self, top: usize, toward: Direction) -> Option<usize> {
        let risen = self.nodes[top].child(toward.opposite())?;
        let inner = self.nodes[risen].child(toward);
        self.nodes[top].set_child(toward.opposite(), inner);
        self.nodes[risen].set_child(toward, Some(top));
        Some(risen)
    }

    /// Double rotation at `top`, which is heavy towards `heavy` while its
    /// child there leans the other way. Returns the new subtree root.
    fn rotate_twice(&mut self, top: usize, heavy: Direction) -> Option<usize> {
        let child = self.nodes[top].child(heavy)?;
        let risen_child = self.rotate(child, heavy)?;
        self.nodes[top].set_child(heavy, Some(risen_child));
        let grandchild = self.rotate(top, heavy.opposite())?;

        let (child_balance, top_balance) = match self.nodes[grandchild].balance {
            b if b == Balance::from(heavy) => (Balance::Balanced, heavy.opposite().into()),
            Balance::Balanced => (Balance::Balanced, Balance::Balanced),
            _ => (heavy.into(), Balance::Balanced),
        };
        self.nodes[child].balance = child_balance;
        self.nodes[top].balance = top_balance;
        self.nodes[grandchild].balance = Balance::Balanced;
        Some(grandchild)
    }

    fn reserve_node(&mut self) -> Result<(), OrderedError> {
        let before = self.nodes.capacity();
        self.nodes
            .try_reserve(1)
            .map_err(|e| OrderedError::allocation("tree node pool", e))?;
        report_growth(
            self.hook.as_deref(),
            mem::size_of::<OrderedNode<T>>(),
            before,
            self.nodes.capacity(),
        );
        Ok(())
    }
}

struct Heights {
    root: usize,
    of: Vec<usize>,
}

impl<T, C: Comparator<T>> AvlTree<T, C> {
    /// Link `item` in.
    ///
    /// On a duplicate the item comes back in [`Insertion::Duplicate`] and the
    /// tree is unchanged. An allocation failure hands it back inside the
    /// [`InsertError`], again with the tree unchanged.
    pub fn insert(&mut self, item: T) -> Result<Insertion<T>, InsertError<T>> {
        if let Err(error) = self.reserve_node() {
            return Err(InsertError::new(item, error));
        }
        let Some(mut current) = self.root else {
            self.nodes.push(OrderedNode::leaf(item));
            self.root = Some(0);
            return Ok(Insertion::Inserted);
        };

        if let Err(error) = self.path.prepare(self.nodes.len() + 1) {
            return Err(InsertError::new(item, error));
        }
        let direction = loop {
            let direction = match self.comparator.compare(&item, &self.nodes[current].item) {
                Ordering::Equal => {
                    debug!(node = current, "insert rejected: key already present");
                    return Ok(Insertion::Duplicate(item));
                }
                Ordering::Less => Direction::Left,
                Ordering::Greater => Direction::Right,
            };
            self.path.push(current, direction);
            match self.nodes[current].child(direction) {
                Some(next) => current = next,
                None => break direction,
            }
        };

        let fresh = self.nodes.len();
        self.nodes.push(OrderedNode::leaf(item));
        self.nodes[current].set_child(direction, Some(fresh));
        self.rebalance_after_insert();
        Ok(Insertion::Inserted)
    }

    fn rebalance_after_insert(&mut self) {
        let tokens = self.path.tokens();
        // Deepest ancestor that was already tilted; everything below it was
        // balanced and now leans towards the descent.
        let pivot = tokens
            .iter()
            .rposition(|t| self.nodes[t.node].balance != Balance::Balanced)
            .unwrap_or(0);
        for token in &tokens[pivot + 1..] {
            self.nodes[token.node].balance = token.direction.into();
        }

        let PathToken { node: top, direction } = tokens[pivot];
        match self.nodes[top].balance {
            Balance::Balanced => {
                self.nodes[top].balance = direction.into();
                return;
            }
            b if b != Balance::from(direction) => {
                self.nodes[top].balance = Balance::Balanced;
                return;
            }
            _ => {}
        }

        // Top is now two levels heavier towards `direction`.
        let Some(child) = self.nodes[top].child(direction) else {
            return;
        };
        let risen = if self.nodes[child].leans(direction) {
            let risen = self.rotate(top, direction.opposite());
            self.nodes[top].balance = Balance::Balanced;
            self.nodes[child].balance = Balance::Balanced;
            risen
        } else {
            self.rotate_twice(top, direction)
        };
        self.attach(pivot, risen);
    }

    /// Unlink the item comparing equal to `key` and hand it back.
    pub fn remove(&mut self, key: &T) -> Option<T> {
        let mut current = self.root?;
        // Capacity was reserved by insert for the tallest possible tree.
        self.path.reset();
        loop {
            let direction = match self.comparator.compare(key, &self.nodes[current].item) {
                Ordering::Equal => break,
                Ordering::Less => Direction::Left,
                Ordering::Greater => Direction::Right,
            };
            self.path.push(current, direction);
            match self.nodes[current].child(direction) {
                Some(next) => current = next,
                None => {
                    debug!("remove: key not found");
                    return None;
                }
            }
        }

        let target = current;
        let slot = self.path.levels();
        let replacement = match self.nodes[target].right {
            None => self.nodes[target].left,
            Some(right) if self.nodes[right].left.is_none() => {
                self.nodes[right].left = self.nodes[target].left;
                self.nodes[right].balance = self.nodes[target].balance;
                self.path.push(right, Direction::Right);
                Some(right)
            }
            Some(right) => {
                // Placeholder for the successor, fixed once it is found.
                self.path.push(target, Direction::Right);
                let mut parent = right;
                self.path.push(right, Direction::Left);
                let mut successor = self.nodes[right].left?;
                while let Some(next) = self.nodes[successor].left {
                    self.path.push(successor, Direction::Left);
                    parent = successor;
                    successor = next;
                }
                self.nodes[parent].left = self.nodes[successor].right;
                self.nodes[successor].left = self.nodes[target].left;
                self.nodes[successor].right = self.nodes[target].right;
                self.nodes[successor].balance = self.nodes[target].balance;
                self.path.set(slot, successor, Direction::Right);
                Some(successor)
            }
        };
        self.attach(slot, replacement);
        self.rebalance_after_remove();
        Some(self.release(target))
    }

    /// Walk the path bottom-up; each token's `direction` side has just
    /// lost one level.
    fn rebalance_after_remove(&mut self) {
        let mut level = self.path.levels();
        while level > 0 {
            level -= 1;
            let PathToken { node: top, direction } = self.path[level];
            let heavy = direction.opposite();
            match self.nodes[top].balance {
                Balance::Balanced => {
                    self.nodes[top].balance = heavy.into();
                    return;
                }
                b if b == Balance::from(direction) => {
                    self.nodes[top].balance = Balance::Balanced;
                }
                _ => {
                    let Some(child) = self.nodes[top].child(heavy) else {
                        error!(node = top, "tilted node is missing its taller child");
                        return;
                    };
                    if self.nodes[child].leans(direction) {
                        let risen = self.rotate_twice(top, heavy);
                        self.attach(level, risen);
                    } else {
                        let stops = self.nodes[child].balance == Balance::Balanced;
                        let risen = self.rotate(top, direction);
                        if stops {
                            self.nodes[child].balance = direction.into();
                            self.nodes[top].balance = heavy.into();
                        } else {
                            self.nodes[child].balance = Balance::Balanced;
                            self.nodes[top].balance = Balance::Balanced;
                        }
                        self.attach(level, risen);
                        if stops {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Take an unlinked node out of the pool, moving the last node into its
    /// slot.
    fn release(&mut self, target: usize) -> T {
        let last = self.nodes.len() - 1;
        if target != last {
            self.relink(last, target);
        }
        self.nodes.swap_remove(target).item
    }

    /// Point the link that references `from` at `to`.
    fn relink(&mut self, from: usize, to: usize) {
        if self.root == Some(from) {
            self.root = Some(to);
            return;
        }
        let mut current = self.root;
        while let Some(id) = current {
            let direction = match self.comparator.compare(&self.nodes[from].item, &self.nodes[id].item) {
                Ordering::Less => Direction::Left,
                Ordering::Greater => Direction::Right,
                Ordering::Equal => break,
            };
            let child = self.nodes[id].child(direction);
            if child == Some(from) {
                self.nodes[id].set_child(direction, Some(to));
                return;
            }
            current = child;
        }
        error!(node = from, "moved node is unreachable; comparator is inconsistent");
    }

    /// Item comparing equal to `key`.
    pub fn search(&self, key: &T) -> Option<&T> {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            current = match self.comparator.compare(key, &node.item) {
                Ordering::Equal => return Some(&node.item),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        debug!("search: key not found");
        None
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: &T) -> bool {
        self.search(key).is_some()
    }

    /// Strictly increasing under the comparator.
    pub fn is_ordered(&self) -> bool {
        let mut items = self.iter(Order::Ascending);
        let Some(mut previous) = items.next() else {
            return true;
        };
        for item in items {
            if self.comparator.compare(previous, item) != Ordering::Less {
                return false;
            }
            previous = item;
        }
        true
    }
}

impl<T, C: Default> Default for AvlTree<T, C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<T, C> Drop for AvlTree<T, C> {
    fn drop(&mut self) {
        report_growth(
            self.hook.as_deref(),
            mem::size_of::<OrderedNode<T>>(),
            self.nodes.capacity(),
            0,
        );
    }
}

impl<T, C> fmt::Debug for AvlTree<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvlTree")
            .field("len", &self.nodes.len())
            .field("root", &self.root)
            .field("path_levels", &self.path.max_levels())
            .field("hooked", &self.hook.is_some())
            .finish()
    }
}

impl<'a, T, C> IntoIterator for &'a AvlTree<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter(Order::Ascending)
    }
}

fn push_spine<T>(nodes: &[OrderedNode<T>], stack: &mut Vec<usize>, mut link: Option<usize>, side: Direction) {
    while let Some(id) = link {
        stack.push(id);
        link = nodes[id].child(side);
    }
}

/// Borrowing in-order iterator.
///
/// The stack starts with the leading spine; each `next` pops a node and
/// pushes the spine of its trailing child.
#[derive(Debug)]
pub struct Iter<'a, T> {
    nodes: &'a [OrderedNode<T>],
    stack: Vec<usize>,
    order: Order,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn new(nodes: &'a [OrderedNode<T>], root: Option<usize>, order: Order) -> Self {
        let mut stack = Vec::with_capacity(SearchPath::max_height(nodes.len()));
        push_spine(nodes, &mut stack, root, order.leading());
        Self {
            nodes,
            stack,
            order,
            remaining: nodes.len(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let Some(id) = self.stack.pop() else {
            self.stack = Vec::new();
            return None;
        };
        let leading = self.order.leading();
        let trailing = self.nodes[id].child(leading.opposite());
        push_spine(self.nodes, &mut self.stack, trailing, leading);
        self.remaining -= 1;
        Some(&self.nodes[id].item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Owning in-order iterator produced by `detach`.
#[derive(Debug)]
pub struct Detached<T> {
    links: Vec<(Option<usize>, Option<usize>)>,
    items: Vec<Option<T>>,
    stack: Vec<usize>,
    order: Order,
    remaining: usize,
}

impl<T> Detached<T> {
    fn new(nodes: Vec<OrderedNode<T>>, root: Option<usize>, order: Order) -> Self {
        let remaining = nodes.len();
        let (links, items): (Vec<_>, Vec<_>) = nodes
            .into_iter()
            .map(|node| ((node.left, node.right), Some(node.item)))
            .unzip();
        let mut detached = Self {
            links,
            items,
            stack: Vec::new(),
            order,
            remaining,
        };
        detached.push_spine(root);
        detached
    }

    fn child(&self, id: usize, side: Direction) -> Option<usize> {
        match side {
            Direction::Left => self.links[id].0,
            Direction::Right => self.links[id].1,
        }
    }

    fn push_spine(&mut self, mut link: Option<usize>) {
        let side = self.order.leading();
        while let Some(id) = link {
            self.stack.push(id);
            link = self.child(id, side);
        }
    }
}

impl<T> Iterator for Detached<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let Some(id) = self.stack.pop() else {
            self.stack = Vec::new();
            return None;
        };
        let trailing = self.child(id, self.order.leading().opposite());
        self.push_spine(trailing);
        self.remaining = self.remaining.saturating_sub(1);
        self.items[id].take()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordered::NaturalOrder;

    fn tree_of(keys: &[i32]) -> AvlTree<i32, NaturalOrder> {
        let mut tree = AvlTree::new(NaturalOrder);
        for &key in keys {
            assert!(tree.insert(key).unwrap().is_inserted());
        }
        tree
    }

    #[test]
    fn test_single_rotations() {
        // RR then LL
        let ascending = tree_of(&[1, 2, 3]);
        assert_eq!(ascending.height(), 2);
        assert!(ascending.is_balanced());

        let descending = tree_of(&[3, 2, 1]);
        assert_eq!(descending.height(), 2);
        assert!(descending.is_balanced());
    }

    #[test]
    fn test_double_rotations() {
        // LR then RL
        let lr = tree_of(&[3, 1, 2]);
        assert_eq!(lr.height(), 2);
        assert!(lr.is_balanced());
        assert_eq!(lr.iter(Order::Ascending).copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let rl = tree_of(&[1, 3, 2]);
        assert_eq!(rl.height(), 2);
        assert!(rl.is_balanced());
    }

    #[test]
    fn test_duplicate_is_returned() {
        let mut tree = tree_of(&[5, 3, 8]);
        assert_eq!(tree.insert(3).unwrap(), Insertion::Duplicate(3));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_remove_with_successor() {
        let mut tree = tree_of(&[50, 30, 70, 20, 40, 60, 80, 65]);
        // 60 has a right child only; 50 needs its successor from deeper down
        assert_eq!(tree.remove(&50), Some(50));
        assert_eq!(tree.remove(&60), Some(60));
        assert!(tree.is_balanced());
        assert!(tree.is_ordered());
        assert_eq!(
            tree.iter(Order::Ascending).copied().collect::<Vec<_>>(),
            vec![20, 30, 40, 65, 70, 80]
        );
        assert_eq!(tree.remove(&99), None);
    }

    #[test]
    fn test_remove_rotates() {
        let mut tree = tree_of(&[2, 1, 3, 4]);
        // Removing 1 leaves 2 right-heavy by two levels
        assert_eq!(tree.remove(&1), Some(1));
        assert!(tree.is_balanced());
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_descending_iteration_and_extremes() {
        let tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);
        let items: Vec<_> = tree.iter(Order::Descending).copied().collect();
        assert_eq!(items, vec![7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(tree.first(), Some(&1));
        assert_eq!(tree.last(), Some(&7));
    }

    #[test]
    fn test_detach_empties_tree() {
        let mut tree = tree_of(&[9, 4, 12, 1]);
        let drained: Vec<_> = tree.detach(Order::Ascending).collect();
        assert_eq!(drained, vec![1, 4, 9, 12]);
        assert!(tree.is_empty());
        assert_eq!(tree.search(&9), None);
    }

    #[test]
    fn test_clear_then_reuse() {
        let mut tree = tree_of(&[1, 2, 3, 4, 5]);
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.insert(10).unwrap().is_inserted());
        assert_eq!(tree.search(&10), Some(&10));
    }
}
