//! Adaptive quadtree/octree of fluid cells.
//!
//! Cells live in an arena owned by [`CellGraph`]; parent, child and neighbor
//! relationships are handles into it. Leaves carry the fluid state, links
//! between face-adjacent cells carry the face state.
//!
//! # Level Convention
//!
//! Level 0 = root (coarsest), higher level = finer.
//!
//! ```text
//! Cell Size = root_size / 2^level
//! ```
//!
//! # Module Structure
//!
//! - [`dimension`]: `Dimension` - 2D/3D vector math
//! - [`arena`]: `Arena`, `Handle` - slot storage with generational handles
//! - [`cell`]: `SpatialCell`, `FluidState` - cells and their neighbor lists
//! - [`link`]: `NeighborLink`, `LinkStore` - reciprocal face links
//! - [`neighbor_set`]: `NeighborListSet` - merge iterator over link lists
//! - [`graph`]: `CellGraph` - refine, coarsen, delete, topology checks
//! - [`construction`]: surface-driven initial refinement
//! - [`tree`]: `Octree` - root plus graph

pub mod arena;
pub mod cell;
pub mod checked;
pub mod config;
pub mod construction;
pub mod dimension;
pub mod graph;
pub mod link;
pub mod neighbor_set;
pub mod tree;

// Re-exports
pub use arena::{Arena, Handle};
pub use cell::{CellId, ChildSlots, FluidState, LinkClass, LinkId, LinkLists, SpatialCell, VolumeUpdate};
pub use checked::Checked;
pub use config::OctreeConfig;
pub use construction::{ConstructionStats, SurfaceModel, SurfaceRelation, Verdict};
pub use dimension::{Dim2, Dim3, Dimension};
pub use graph::CellGraph;
pub use link::{LinkGeometry, LinkStore, NeighborLink};
pub use neighbor_set::NeighborListSet;
pub use tree::Octree;
