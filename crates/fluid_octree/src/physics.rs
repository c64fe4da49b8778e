//! Physical constants and the pressure closure.
//!
//! Pressure is not solved for. Each step every leaf gets
//!
//! ```text
//! p = p_hydrostatic + K * (total_vol_coeff - 1) + p_continuity
//! ```
//!
//! - `p_hydrostatic`: weight of the fluid above, summed down each column
//! - `K * (total - 1)`: artificial compressibility, a partially empty cell
//!   pulls fluid in
//! - `p_continuity`: resists the part of next step's inflow that would
//!   overfill the cell
//!
//! Buoyancy comes out of the hydrostatic part: columns of different density
//! push on each other sideways, while a vertical face between two cells at
//! hydrostatic pressure feels no net force.

use crate::constants::{AIR_DENSITY, BULK_MODULUS, GRAVITY, MIN_DENSITY, WATER_DENSITY};

/// Material and body-force constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsConstants {
  /// Water density (kg/m³).
  pub water_density: f64,
  /// Air density (kg/m³).
  pub air_density: f64,
  /// Gravitational acceleration magnitude, acting along -vertical (m/s²).
  pub gravity: f64,
  /// Artificial bulk modulus (Pa).
  pub bulk_modulus: f64,
}

impl PhysicsConstants {
  /// Water and air at sea level.
  pub const EARTH: Self = Self {
    water_density: WATER_DENSITY,
    air_density: AIR_DENSITY,
    gravity: GRAVITY,
    bulk_modulus: BULK_MODULUS,
  };

  /// Mixture density for the given volume coefficients.
  #[inline]
  pub fn density(&self, water: f64, total: f64) -> f64 {
    water * (self.water_density - self.air_density) + total * self.air_density
  }

  /// Pressure of a cell holding `total` fluid.
  #[inline]
  pub fn pressure(&self, total: f64) -> f64 {
    self.bulk_modulus * (total - 1.0)
  }

  /// Pressure gained descending through `thickness` of fluid at `density`.
  #[inline]
  pub fn hydrostatic_increment(&self, density: f64, thickness: f64) -> f64 {
    density * self.gravity * thickness
  }

  /// Pressure that cancels a predicted `overfill` (volume coefficient above
  /// one) of a cell of `size` over one step of `dt`, spread over
  /// `face_count` faces.
  #[inline]
  pub fn continuity_pressure(density: f64, size: f64, overfill: f64, dt: f64, face_count: usize) -> f64 {
    if overfill <= 0.0 || dt <= 0.0 || face_count == 0 {
      return 0.0;
    }
    let rate = size / dt;
    density * rate * rate * overfill / (2 * face_count) as f64
  }

  /// Gravity damping factor for a locally averaged density.
  ///
  /// Over-dense cells (above nominal water density) get proportionally less
  /// gravity so they cannot drive spurious circulation.
  #[inline]
  pub fn density_correction(&self, averaged_density: f64) -> f64 {
    if averaged_density > self.water_density {
      self.water_density / averaged_density
    } else {
      1.0
    }
  }

  /// True when `density` is too small to divide by.
  #[inline]
  pub fn is_void(density: f64) -> bool {
    density < MIN_DENSITY
  }
}

impl Default for PhysicsConstants {
  fn default() -> Self {
    Self::EARTH
  }
}
