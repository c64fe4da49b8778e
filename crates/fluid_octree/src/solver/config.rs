//! SolverConfig - timestep, advection scheme and physical constants.

use crate::constants::{TARGET_COURANT, VOLUME_EPSILON};
use crate::error::{SimError, SimResult};
use crate::physics::PhysicsConstants;

/// Face value reconstruction used for volume-coefficient advection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AdvectionScheme {
  /// Face coefficients equal the donor cell's.
  Upwind,
  /// Compressive normalized-variable scheme; keeps interfaces sharp.
  #[default]
  HyperC,
  /// High-resolution interface capturing: bounded downwind blend with a
  /// Courant-dependent fallback to upwind.
  Hric,
}

impl AdvectionScheme {
  /// Lowercase name, as used in scenario files and logs.
  pub fn name(self) -> &'static str {
    match self {
      Self::Upwind => "upwind",
      Self::HyperC => "hyper_c",
      Self::Hric => "hric",
    }
  }
}

/// Solver tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
  /// Upper bound of the adaptive timestep (s). `set_time_step` overrides it
  /// per simulation. Keep it below `h / sqrt(K / rho_air)` for the finest
  /// cell size `h`: the face velocity update is explicit in the pressure.
  pub max_time_step: f64,
  /// Peak Courant number the adaptive timestep aims for.
  pub target_courant: f64,
  /// Face reconstruction scheme.
  pub advection: AdvectionScheme,
  /// Evolve steps between calls to the event pump during a run.
  pub checkpoint_cadence: usize,
  /// Tolerance band of the volume-coefficient update.
  pub volume_epsilon: f64,
  /// Densities, gravity, bulk modulus.
  pub physics: PhysicsConstants,
}

impl SolverConfig {
  /// HYPER-C advection, yield after every step.
  pub const DEFAULT: Self = Self {
    max_time_step: 1.0e-4,
    target_courant: TARGET_COURANT,
    advection: AdvectionScheme::HyperC,
    checkpoint_cadence: 1,
    volume_epsilon: VOLUME_EPSILON,
    physics: PhysicsConstants::EARTH,
  };

  /// First-order upwind advection; diffusive but the most robust.
  pub const UPWIND: Self = Self {
    advection: AdvectionScheme::Upwind,
    ..Self::DEFAULT
  };

  /// Check ranges.
  pub fn validate(&self) -> SimResult<()> {
    const CALLER: &str = "SolverConfig::validate";
    if !(self.max_time_step.is_finite() && self.max_time_step > 0.0) {
      return Err(SimError::domain(
        CALLER,
        format!("max time step {} must be positive", self.max_time_step),
      ));
    }
    if !(self.target_courant > 0.0 && self.target_courant <= 1.0) {
      return Err(SimError::domain(
        CALLER,
        format!("target Courant {} outside (0, 1]", self.target_courant),
      ));
    }
    if self.checkpoint_cadence == 0 {
      return Err(SimError::range(CALLER, 0, usize::MAX));
    }
    if !(self.volume_epsilon >= 0.0) {
      return Err(SimError::domain(CALLER, "volume epsilon must be non-negative"));
    }
    let p = &self.physics;
    if !(p.water_density > 0.0 && p.air_density > 0.0 && p.bulk_modulus > 0.0) || !p.gravity.is_finite() {
      return Err(SimError::domain(CALLER, "physical constants out of range"));
    }
    Ok(())
  }
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = SolverConfig::default();
    assert_eq!(config.advection, AdvectionScheme::HyperC);
    assert_eq!(config.target_courant, 0.9);
    assert_eq!(config.checkpoint_cadence, 1);
    assert_eq!(config.volume_epsilon, 4e-16);
    config.validate().unwrap();
  }

  #[test]
  fn test_upwind_preset() {
    let config = SolverConfig::UPWIND;
    assert_eq!(config.advection, AdvectionScheme::Upwind);
    assert_eq!(config.max_time_step, SolverConfig::DEFAULT.max_time_step);
    config.validate().unwrap();
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let bad_dt = SolverConfig {
      max_time_step: 0.0,
      ..SolverConfig::DEFAULT
    };
    assert!(bad_dt.validate().is_err());

    let bad_cfl = SolverConfig {
      target_courant: 1.5,
      ..SolverConfig::DEFAULT
    };
    assert!(bad_cfl.validate().is_err());

    let bad_cadence = SolverConfig {
      checkpoint_cadence: 0,
      ..SolverConfig::DEFAULT
    };
    assert!(matches!(bad_cadence.validate(), Err(SimError::Range { .. })));
  }

  #[test]
  fn test_scheme_names() {
    assert_eq!(AdvectionScheme::Upwind.name(), "upwind");
    assert_eq!(AdvectionScheme::HyperC.name(), "hyper_c");
    assert_eq!(AdvectionScheme::Hric.name(), "hric");
  }
}
