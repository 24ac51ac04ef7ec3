//! Semi-regular 4-8 subdivision engine
//!
//! Triangle `[apex, left, right]` is split at a vertex `m` on its base into
//! `left child = [m, apex, left]` and `right child = [m, right, apex]`.
//! The apex, left and right roles rotate with every level, so even and odd
//! levels bisect along alternating edge orientations.
//!
//! A node whose base partner is coarser (the partner does not point back)
//! forces the partner to split first; that split can cascade further up.
//! Each individual split reserves its arena space before mutating, so an
//! allocation failure leaves a conforming mesh behind.

use std::mem;
use std::sync::Arc;

use tracing::{debug, info_span, trace};

use super::node::{FrontInfo, Link, MeshNode, VertexId};
use super::{ActionMask, Adaptive, MeshConfig, MeshError, Topology};
use crate::space::{report_growth, AllocationHook};

/// Vertex ids of the base square: south-west, south-east, north-east,
/// north-west. Oracles must know these before the first sample.
pub const BASE_VERTICES: [VertexId; 4] = [0, 1, 2, 3];

/// Counters of one tessellation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TessellationStats {
    /// Front triangles handed to the oracle
    pub visited: usize,

    /// Nodes bisected, forced splits included
    pub splits: usize,

    /// Splits caused by a finer neighbour rather than the oracle
    pub forced_splits: usize,

    /// Deepest leaf level produced
    pub deepest_level: u32,

    /// Triangles at the end of the pass
    pub triangles: usize,

    /// Nodes at the end of the pass
    pub nodes: usize,
}

/// Adaptive 4-8 triangle mesh.
pub struct Semiregular48 {
    config: MeshConfig,
    nodes: Vec<MeshNode>,
    triangles: Vec<[VertexId; 3]>,
    fronts: Vec<FrontInfo>,
    visible: usize,
    /// Depth-first traversal stack; children are pushed while `stack_active`.
    stack: Vec<usize>,
    stack_active: bool,
    cascade: Vec<usize>,
    hook: Option<Arc<dyn AllocationHook>>,
}

impl Semiregular48 {
    /// Engine holding the base mesh.
    pub fn new(config: MeshConfig) -> Result<Self, MeshError> {
        config.validate()?;
        let mut mesh = Self {
            config,
            nodes: Vec::new(),
            triangles: Vec::new(),
            fronts: Vec::new(),
            visible: 0,
            stack: Vec::new(),
            stack_active: false,
            cascade: Vec::new(),
            hook: None,
        };
        mesh.init_tessellation()?;
        Ok(mesh)
    }

    /// Current configuration.
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Topology used by the next [`Semiregular48::init_tessellation`].
    pub fn set_topology(&mut self, topology: Topology) {
        self.config.topology = topology;
    }

    /// Active topology.
    pub fn topology(&self) -> Topology {
        self.config.topology
    }

    /// Depth limit for tessellation passes.
    pub fn set_max_level(&mut self, max_level: u32) {
        self.config.max_level = max_level;
    }

    /// Report arena growth to `hook`.
    pub fn set_allocation_hook(&mut self, hook: Arc<dyn AllocationHook>) {
        let bytes = self.arena_bytes();
        hook.allocated(bytes);
        if let Some(old) = self.hook.replace(hook) {
            old.released(bytes);
        }
    }

    fn arena_bytes(&self) -> usize {
        self.nodes.capacity() * mem::size_of::<MeshNode>()
            + self.triangles.capacity() * mem::size_of::<[VertexId; 3]>()
            + self.fronts.capacity() * mem::size_of::<FrontInfo>()
    }

    /// All nodes, internal ones included.
    pub fn nodes(&self) -> &[MeshNode] {
        &self.nodes
    }

    /// One node.
    pub fn node(&self, index: usize) -> Option<&MeshNode> {
        self.nodes.get(index)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Vertex triple of a triangle slot.
    pub fn triangle(&self, slot: usize) -> Option<[VertexId; 3]> {
        self.triangles.get(slot).copied()
    }

    /// Front record of a triangle slot.
    pub fn front(&self, slot: usize) -> Option<&FrontInfo> {
        self.fronts.get(slot)
    }

    /// Number of live triangles, hidden ones included.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of triangles in [`Semiregular48::index_array`].
    pub fn visible_count(&self) -> usize {
        self.visible
    }

    /// Leaf nodes with their indices.
    pub fn leaves(&self) -> impl Iterator<Item = (usize, &MeshNode)> + '_ {
        self.nodes.iter().enumerate().filter(|(_, node)| node.is_leaf())
    }

    /// Vertex ids of the visible triangles, three per triangle.
    pub fn index_array(&self) -> &[VertexId] {
        self.triangles[..self.visible].as_flattened()
    }

    /// Digest of the visible index array.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for id in self.index_array() {
            hasher.update(&id.to_le_bytes());
        }
        hasher.finalize()
    }

    /// Reset the arena to the two-triangle base mesh and stitch it
    /// according to the topology.
    pub fn init_tessellation(&mut self) -> Result<(), MeshError> {
        self.nodes.clear();
        self.triangles.clear();
        self.fronts.clear();
        self.stack.clear();
        self.stack_active = false;
        let block = self.config.initial_block;
        self.reserve(block, block)?;

        let [sw, se, ne, nw] = BASE_VERTICES;
        let mut south_west = MeshNode::leaf(0, 0);
        let mut north_east = MeshNode::leaf(0, 1);
        south_west.base_neighbor = Some(1);
        north_east.base_neighbor = Some(0);
        if self.config.topology.wraps_east_west() {
            // west leg of node 0 meets east leg of node 1
            south_west.right_neighbor = Some(1);
            north_east.right_neighbor = Some(0);
        }
        if self.config.topology.wraps_north_south() {
            // south leg of node 0 meets north leg of node 1
            south_west.left_neighbor = Some(1);
            north_east.left_neighbor = Some(0);
        }

        self.nodes.extend([south_west, north_east]);
        self.triangles.extend([[sw, se, nw], [ne, nw, se]]);
        self.fronts.extend([
            FrontInfo { last_mask: ActionMask::empty(), node: 0 },
            FrontInfo { last_mask: ActionMask::empty(), node: 1 },
        ]);
        self.visible = self.triangles.len();
        trace!(topology = ?self.config.topology, "base mesh initialised");
        Ok(())
    }

    /// Grow every arena array so `nodes` more nodes and `triangles` more
    /// triangles fit without reallocating.
    fn reserve(&mut self, nodes: usize, triangles: usize) -> Result<(), MeshError> {
        let before = self.arena_bytes();
        let result = self
            .nodes
            .try_reserve(nodes)
            .map_err(|e| MeshError::allocation("mesh nodes", e))
            .and_then(|_| {
                self.triangles
                    .try_reserve(triangles)
                    .map_err(|e| MeshError::allocation("mesh triangles", e))
            })
            .and_then(|_| {
                self.fronts
                    .try_reserve(triangles)
                    .map_err(|e| MeshError::allocation("mesh fronts", e))
            })
            .and_then(|_| {
                if self.stack_active {
                    self.stack
                        .try_reserve(nodes)
                        .map_err(|e| MeshError::allocation("traversal stack", e))
                } else {
                    Ok(())
                }
            });
        report_growth(self.hook.as_deref(), 1, before, self.arena_bytes());
        result
    }

    fn check_index(&self, index: usize) -> Result<(), MeshError> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(MeshError::InvalidNode {
                index,
                len: self.nodes.len(),
            })
        }
    }

    fn slot_of(&self, index: usize) -> Result<usize, MeshError> {
        self.nodes[index]
            .triangle
            .ok_or(MeshError::MissingTriangle { index })
    }

    /// Split leaf `index`, first splitting every coarser base partner the
    /// split depends on. Internal nodes are left alone.
    pub fn divide_node<A: Adaptive + ?Sized>(&mut self, index: usize, oracle: &mut A) -> Result<(), MeshError> {
        self.divide(index, oracle).map(|_| ())
    }

    /// Returns `(splits, forced_splits)`.
    fn divide<A: Adaptive + ?Sized>(&mut self, index: usize, oracle: &mut A) -> Result<(usize, usize), MeshError> {
        self.check_index(index)?;
        if !self.nodes[index].is_leaf() {
            return Ok((0, 0));
        }

        // Walk towards coarser partners until one points back (a diamond)
        // or the boundary is reached. Levels strictly decrease, so this ends.
        self.cascade.clear();
        self.cascade.push(index);
        let mut current = index;
        while let Some(base) = self.nodes[current].base_neighbor {
            if self.nodes[base].base_neighbor == Some(current) {
                break;
            }
            self.cascade.push(base);
            current = base;
        }
        let forced = self.cascade.len() - 1;
        if forced > 0 {
            debug!(node = index, forced, "forced split cascade");
        }

        let mut splits = 0;
        while let Some(node) = self.cascade.pop() {
            splits += self.split(node, oracle)?;
        }
        Ok((splits, forced))
    }

    /// Split one leaf together with its base partner, if it has one.
    /// Returns the number of nodes bisected.
    fn split<A: Adaptive + ?Sized>(&mut self, index: usize, oracle: &mut A) -> Result<usize, MeshError> {
        if !self.nodes[index].is_leaf() {
            return Ok(0);
        }
        let slot = self.slot_of(index)?;
        let triangle = self.triangles[slot];

        let Some(partner) = self.nodes[index].base_neighbor else {
            self.reserve(2, 1)?;
            let vertex = oracle.sample(triangle, None);
            // Open side: the new legs on the base stay unlinked.
            self.triangle_bisection(index, vertex);
            return Ok(1);
        };

        let partner_slot = self.slot_of(partner)?;
        let partner_triangle = self.triangles[partner_slot];
        self.reserve(4, 2)?;

        // The partner traverses the shared base in the opposite direction.
        // When its vertex ids mirror ours one sample serves both, otherwise
        // the base is a seam and each side gets its own vertex.
        let shared = partner_triangle[1] == triangle[2] && partner_triangle[2] == triangle[1];
        let (vertex, partner_vertex) = if shared {
            let vertex = oracle.sample(triangle, Some(partner_triangle[0]));
            (vertex, vertex)
        } else {
            (
                oracle.sample(triangle, None),
                oracle.sample(partner_triangle, None),
            )
        };

        let (left, right) = self.triangle_bisection(index, vertex);
        let (partner_left, partner_right) = self.triangle_bisection(partner, partner_vertex);

        // Halves of the shared base: our left child meets the partner's
        // right child and vice versa.
        self.nodes[left].right_neighbor = Some(partner_right);
        self.nodes[partner_right].left_neighbor = Some(left);
        self.nodes[right].left_neighbor = Some(partner_left);
        self.nodes[partner_left].right_neighbor = Some(right);
        trace!(node = index, partner, shared, "diamond split");
        Ok(2)
    }

    /// Bisect leaf `parent` at `vertex`. Arena space must be reserved.
    ///
    /// The left child takes over the parent's triangle slot, the right child
    /// gets a new one; both inherit the parent's last mask. Neighbours
    /// across the parent's legs are repointed to the child covering that
    /// leg. Returns `(left, right)`.
    fn triangle_bisection(&mut self, parent: usize, vertex: VertexId) -> (usize, usize) {
        let node = self.nodes[parent];
        let Some(slot) = node.triangle else {
            return (parent, parent);
        };
        let [apex, left_vertex, right_vertex] = self.triangles[slot];
        let last_mask = self.fronts[slot].last_mask;
        let level = node.level + 1;

        let left = self.nodes.len();
        let right = left + 1;
        let new_slot = self.triangles.len();

        self.triangles[slot] = [vertex, apex, left_vertex];
        self.fronts[slot] = FrontInfo { last_mask, node: left };
        self.triangles.push([vertex, right_vertex, apex]);
        self.fronts.push(FrontInfo { last_mask, node: right });

        self.nodes.push(MeshNode {
            left_neighbor: Some(right),
            base_neighbor: node.left_neighbor,
            ..MeshNode::leaf(level, slot)
        });
        self.nodes.push(MeshNode {
            right_neighbor: Some(left),
            base_neighbor: node.right_neighbor,
            ..MeshNode::leaf(level, new_slot)
        });

        let parent_node = &mut self.nodes[parent];
        parent_node.triangle = None;
        parent_node.first_child = Some(left);

        if let Some(neighbor) = node.left_neighbor {
            self.relink(neighbor, parent, left, Link::Left);
        }
        if let Some(neighbor) = node.right_neighbor {
            self.relink(neighbor, parent, right, Link::Right);
        }

        if self.stack_active {
            self.stack.push(right);
            self.stack.push(left);
        }
        self.visible = self.triangles.len();
        (left, right)
    }

    /// In `neighbor`, replace the link to `old` (which met it across `old`'s
    /// `leg`) by `new`.
    fn relink(&mut self, neighbor: usize, old: usize, new: usize, leg: Link) {
        let node = &mut self.nodes[neighbor];
        for side in leg.relink_order() {
            if node.link(side) == Some(old) {
                node.set_link(side, Some(new));
                return;
            }
        }
        tracing::error!(neighbor, old, "neighbour does not link back to the split node");
    }

    fn visit<A: Adaptive + ?Sized>(
        &mut self,
        index: usize,
        oracle: &mut A,
        stats: &mut TessellationStats,
    ) -> Result<(), MeshError> {
        let node = self.nodes[index];
        let slot = self.slot_of(index)?;
        stats.visited += 1;
        stats.deepest_level = stats.deepest_level.max(node.level);

        let mask = oracle.action(node.level, self.triangles[slot], self.fronts[slot].last_mask);
        self.fronts[slot].last_mask = mask;
        if mask.wants_refinement() && node.level < self.config.max_level {
            let (splits, forced) = self.divide(index, oracle)?;
            stats.splits += splits;
            stats.forced_splits += forced;
            stats.deepest_level = stats.deepest_level.max(node.level + 1);
        }
        Ok(())
    }

    /// Refine breadth-first, in node allocation order, until the triangle
    /// count reaches `max_triangles` or no front triangle asks for more.
    ///
    /// The budget is checked before each split; a forced cascade can
    /// overshoot it by the triangles that cascade creates.
    pub fn tessellate_breadth_first<A: Adaptive + ?Sized>(
        &mut self,
        max_triangles: usize,
        oracle: &mut A,
    ) -> Result<TessellationStats, MeshError> {
        let _span = info_span!("tessellate", strategy = "breadth_first", max_triangles).entered();
        oracle.begin_tessellation();
        let result = self.run_breadth_first(max_triangles, oracle);
        oracle.end_tessellation();
        result
    }

    fn run_breadth_first<A: Adaptive + ?Sized>(
        &mut self,
        max_triangles: usize,
        oracle: &mut A,
    ) -> Result<TessellationStats, MeshError> {
        self.init_tessellation()?;
        let mut stats = TessellationStats::default();
        let mut index = 0;
        while index < self.nodes.len() && self.triangles.len() < max_triangles {
            if self.nodes[index].is_leaf() {
                self.visit(index, oracle, &mut stats)?;
            }
            index += 1;
        }
        Ok(self.finish(stats))
    }

    /// Refine depth-first: new children are visited before their
    /// siblings' subtrees. Bounded by the oracle and the level limit.
    pub fn tessellate_depth_first<A: Adaptive + ?Sized>(
        &mut self,
        oracle: &mut A,
    ) -> Result<TessellationStats, MeshError> {
        let _span = info_span!("tessellate", strategy = "depth_first").entered();
        oracle.begin_tessellation();
        let result = self.run_depth_first(oracle);
        self.stack_active = false;
        self.stack = Vec::new();
        oracle.end_tessellation();
        result
    }

    fn run_depth_first<A: Adaptive + ?Sized>(&mut self, oracle: &mut A) -> Result<TessellationStats, MeshError> {
        self.init_tessellation()?;
        let mut stats = TessellationStats::default();
        self.stack.extend([1, 0]);
        self.stack_active = true;
        while let Some(index) = self.stack.pop() {
            // Nodes split by a cascade after being pushed are skipped; their
            // children were pushed when they split.
            if self.nodes[index].is_leaf() {
                self.visit(index, oracle, &mut stats)?;
            }
        }
        Ok(self.finish(stats))
    }

    fn finish(&self, mut stats: TessellationStats) -> TessellationStats {
        stats.triangles = self.triangles.len();
        stats.nodes = self.nodes.len();
        debug!(
            visited = stats.visited,
            splits = stats.splits,
            forced = stats.forced_splits,
            triangles = stats.triangles,
            "tessellation finished"
        );
        stats
    }

    /// Move triangles whose mask intersects `hide` but not `show` behind
    /// the visible range. Returns the number of visible triangles.
    pub fn hide_triangles(&mut self, hide: ActionMask, show: ActionMask) -> usize {
        let hidden = |mask: ActionMask| mask.intersects(hide) && !mask.intersects(show);
        let mut front = 0;
        let mut back = self.triangles.len();
        while front < back {
            if !hidden(self.fronts[front].last_mask) {
                front += 1;
                continue;
            }
            back -= 1;
            if front != back {
                self.swap_slots(front, back);
            }
        }
        self.visible = front;
        self.visible
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.triangles.swap(a, b);
        self.fronts.swap(a, b);
        let (owner_a, owner_b) = (self.fronts[a].node, self.fronts[b].node);
        self.nodes[owner_a].triangle = Some(a);
        self.nodes[owner_b].triangle = Some(b);
    }
}

impl Drop for Semiregular48 {
    fn drop(&mut self) {
        report_growth(self.hook.as_deref(), 1, self.arena_bytes(), 0);
    }
}

impl std::fmt::Debug for Semiregular48 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semiregular48")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("triangles", &self.triangles.len())
            .field("visible", &self.visible)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out consecutive ids and refines nothing.
    struct Counter {
        next: VertexId,
        shared: usize,
    }

    impl Counter {
        fn new() -> Self {
            Self { next: 4, shared: 0 }
        }
    }

    impl Adaptive for Counter {
        fn sample(&mut self, _triangle: [VertexId; 3], apex_hint: Option<VertexId>) -> VertexId {
            if apex_hint.is_some() {
                self.shared += 1;
            }
            self.next += 1;
            self.next - 1
        }

        fn action(&mut self, _level: u32, _triangle: [VertexId; 3], _last: ActionMask) -> ActionMask {
            ActionMask::empty()
        }
    }

    #[test]
    fn test_base_mesh() {
        let mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        assert_eq!(mesh.node_count(), 2);
        assert_eq!(mesh.index_array(), &[0, 1, 3, 2, 3, 1]);
        assert_eq!(mesh.node(0).unwrap().base_neighbor, Some(1));
        assert_eq!(mesh.node(0).unwrap().left_neighbor, None);
    }

    #[test]
    fn test_first_diamond_split() {
        let mut mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        let mut oracle = Counter::new();
        mesh.divide_node(0, &mut oracle).unwrap();

        assert_eq!(mesh.node_count(), 6);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(oracle.shared, 1);
        assert_eq!(mesh.leaves().count(), 4);

        // node 0 -> (2, 3), node 1 -> (4, 5)
        assert_eq!(mesh.node(0).unwrap().children(), Some((2, 3)));
        assert_eq!(mesh.triangle(0), Some([4, 0, 1]));
        assert_eq!(mesh.triangle(2), Some([4, 3, 0]));
        assert_eq!(mesh.node(2).unwrap().right_neighbor, Some(5));
        assert_eq!(mesh.node(3).unwrap().left_neighbor, Some(4));
    }

    #[test]
    fn test_boundary_split_is_isolated() {
        let mut mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        let mut oracle = Counter::new();
        mesh.divide_node(0, &mut oracle).unwrap();
        // Node 2 = [4, 0, 1] has the south edge as base: no partner
        assert_eq!(mesh.node(2).unwrap().base_neighbor, None);
        mesh.divide_node(2, &mut oracle).unwrap();
        assert_eq!(mesh.node_count(), 8);
        assert_eq!(mesh.triangle_count(), 5);
        assert_eq!(mesh.node(6).unwrap().right_neighbor, None);
        assert_eq!(mesh.node(7).unwrap().left_neighbor, None);
    }

    #[test]
    fn test_invalid_index() {
        let mut mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        let err = mesh.divide_node(9, &mut Counter::new()).unwrap_err();
        assert!(matches!(err, MeshError::InvalidNode { index: 9, len: 2 }));
    }

    #[test]
    fn test_splitting_internal_node_is_noop() {
        let mut mesh = Semiregular48::new(MeshConfig::new()).unwrap();
        let mut oracle = Counter::new();
        mesh.divide_node(0, &mut oracle).unwrap();
        mesh.divide_node(0, &mut oracle).unwrap();
        assert_eq!(mesh.node_count(), 6);
    }
}
