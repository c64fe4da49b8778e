//! Numerical and physical constants shared by the octree and the solver.
//!
//! # Volume Coefficients
//!
//! ```text
//! water_vol_coeff  : fraction of the cell volume occupied by water
//! total_vol_coeff  : fraction occupied by any fluid (water + air)
//!
//!   0 - ε  <=  water_vol_coeff  <=  total_vol_coeff  <=  1 + ε
//! ```
//!
//! ε is a few ulps of 1.0 so that round-off in the flux sums never breaks
//! the ordering between water and total.

/// Tolerance band around exact zero / exact water-total equality.
pub const VOLUME_EPSILON: f64 = 4.0e-16;

/// Single-precision equivalent of [`VOLUME_EPSILON`].
pub const VOLUME_EPSILON_F32: f32 = 2.4e-7;

/// Peak Courant number the adaptive timestep aims for.
pub const TARGET_COURANT: f64 = 0.9;

/// Maximum number of lists a `NeighborListSet` can merge.
pub const MAX_NEIGHBOR_LISTS: usize = 5;

/// Acceptor-capacity passes of the flux limiter before it falls back to the
/// conservative zero-outflow pass.
pub const LIMITER_PASSES: usize = 8;

/// Densities below this are treated as "no fluid" when dividing.
pub const MIN_DENSITY: f64 = 1.0e-12;

/// Nominal water density (kg/m³).
pub const WATER_DENSITY: f64 = 1000.0;

/// Nominal air density (kg/m³).
pub const AIR_DENSITY: f64 = 1.2;

/// Gravitational acceleration magnitude (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Artificial bulk modulus coupling total volume coefficient to pressure (Pa).
pub const BULK_MODULUS: f64 = 2.0e4;

/// Number of child slots of a cell in `d` dimensions.
#[inline]
pub const fn child_count(d: usize) -> usize {
  1 << d
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
