//! # GCGlib core
//!
//! Containers and a mesh engine for geometry and graphics code.
//!
//! ## Components
//!
//! 1. **Ordered data**: an AVL tree over an index arena and a hash table
//!    whose buckets are AVL trees, both parameterised by a comparator chosen
//!    at construction
//! 2. **4-8 mesh subdivision**: adaptive longest-edge bisection of a
//!    square (plane, cylinder or torus) driven by an external oracle
//! 3. **Thread hand-off**: a bounded blocking queue
//! 4. **Caching**: a cost-bounded LRU cache over the hash table
//!
//! ## Usage Example
//!
//! ```
//! use gcglib::mesh::{focus_oracle, MeshConfig, Semiregular48};
//!
//! let mut mesh = Semiregular48::new(MeshConfig::new().with_max_level(8))?;
//! let mut oracle = focus_oracle([0.25, 0.25], 1.0);
//! let stats = mesh.tessellate_breadth_first(512, &mut oracle)?;
//! assert_eq!(mesh.index_array().len(), 3 * stats.triangles);
//! # Ok::<(), gcglib::mesh::MeshError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod cache;   // Cost-bounded LRU cache
pub mod mesh;    // Adaptive 4-8 subdivision
pub mod ordered; // AVL tree and hash table
pub mod space;   // Allocation telemetry
pub mod sync;    // Bounded queue

// Re-exports for convenience
pub use cache::{Cache, CacheError};
pub use mesh::{ActionMask, Adaptive, MeshConfig, MeshError, Semiregular48, Topology};
pub use ordered::{
    AvlTree, Comparator, HashTable, HashTableConfig, InsertError, Insertion, KeyHasher, NaturalOrder, Order,
    OrderedError, StdHashOrder,
};
pub use space::{AllocationHook, SpaceTracker};
pub use sync::{BoundedQueue, QueueError};
