//! fluid_octree - Adaptive octree free-surface fluid solver
//!
//! Water and air share an adaptive quadtree (2D) or octree (3D). Leaves
//! carry volume-of-fluid coefficients and a cell-center velocity; reciprocal
//! links between face-adjacent leaves carry the face velocity and the face
//! coefficients used for advection.
//!
//! # Features
//!
//! - **Adaptive topology**: refine / coarsen with automatic relinking across
//!   levels, surface-driven initial construction
//! - **Bounded advection**: HYPER-C, HRIC or upwind face reconstruction with
//!   a flux limiter keeping water within each cell, excess air clamped by
//!   the volume update so `0 <= water <= total <= 1` holds after every step
//! - **Pressure closure**: hydrostatic column weight plus artificial
//!   compressibility and an overfill term, explicit face velocity update,
//!   Courant-adaptive timestep
//! - **Host control**: run loop with event pump, pause/continue/abort and
//!   checkpoint callbacks
//!
//! # Example
//!
//! ```ignore
//! use fluid_octree::{Dim2, FluidSolver, Octree, SolverConfig};
//!
//! let surface = (|p: glam::DVec2| 0.55 + 0.2 * p.x, |_: glam::DVec2| 0.05);
//! let mut tree = Octree::<Dim2>::new(&surface, 0.0)?;
//! tree.fill_water(&surface)?;
//!
//! let mut solver = FluidSolver::new(SolverConfig::DEFAULT)?;
//! solver.define_water(tree, 0.0, 0.1, 1e-4)?;
//! solver.set_checkpoint_callback(|cp| println!("t = {}", cp.time));
//! for _ in 0..100 {
//!   solver.evolve()?;
//! }
//! ```

pub mod constants;
pub mod error;
pub mod metrics;
pub mod physics;

pub use error::{SimError, SimResult};
pub use physics::PhysicsConstants;

// Cells, links and the tree
pub mod octree;
pub use octree::{CellGraph, CellId, Dim2, Dim3, Dimension, LinkId, Octree, OctreeConfig, SurfaceModel};

// Time integration and run control
pub mod solver;
pub use solver::{
  AdvectionScheme, Checkpoint, ControlHandle, EventContext, EventPump, FluidSolver, RunResult, SolverConfig,
  SolverState,
};

#[cfg(test)]
pub(crate) mod test_utils;
