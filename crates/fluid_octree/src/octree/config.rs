//! OctreeConfig - domain placement and construction limits.

use super::dimension::Dimension;
use crate::error::{SimError, SimResult};

/// Deepest level construction may reach when no cap is configured.
pub const DEFAULT_MAX_LEVEL: u32 = 12;

/// Samples per horizontal axis used to bracket the surface over a footprint.
pub const DEFAULT_FOOTPRINT_SAMPLES: usize = 3;

/// Where the root cell sits and how deep construction may go.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctreeConfig<D: Dimension> {
  /// Lower corner of the root cell.
  pub origin: D::Vector,

  /// Side length of the root cell.
  pub root_size: f64,

  /// Hard refinement depth cap. Guards against runaway construction when
  /// the accuracy function is non-positive somewhere.
  pub max_level: u32,

  /// Samples per horizontal axis (corners included) used to find the
  /// surface-height range over a cell footprint.
  pub footprint_samples: usize,
}

impl<D: Dimension> OctreeConfig<D> {
  /// Unit domain at the origin.
  pub fn unit() -> Self {
    Self {
      origin: D::zero(),
      root_size: 1.0,
      max_level: DEFAULT_MAX_LEVEL,
      footprint_samples: DEFAULT_FOOTPRINT_SAMPLES,
    }
  }

  /// Same config with another depth cap.
  pub fn with_max_level(self, max_level: u32) -> Self {
    Self { max_level, ..self }
  }

  /// Side length of a cell at `level`.
  /// cell_size = root_size / 2^level
  #[inline]
  pub fn cell_size(&self, level: u32) -> f64 {
    self.root_size / (1u64 << level.min(63)) as f64
  }

  /// Vertical extent of the domain as (bottom, top).
  #[inline]
  pub fn vertical_range(&self) -> (f64, f64) {
    let bottom = self.origin[D::VERTICAL];
    (bottom, bottom + self.root_size)
  }

  /// Reject sizes and sample counts construction cannot work with.
  pub fn validate(&self) -> SimResult<()> {
    const CALLER: &str = "OctreeConfig::validate";
    if !(self.root_size.is_finite() && self.root_size > 0.0) {
      return Err(SimError::domain(
        CALLER,
        format!("root size {} must be positive and finite", self.root_size),
      ));
    }
    if (0..D::D).any(|d| !self.origin[d].is_finite()) {
      return Err(SimError::domain(CALLER, "origin is not finite"));
    }
    if self.footprint_samples < 2 {
      return Err(SimError::range(CALLER, self.footprint_samples, 2));
    }
    if self.max_level > 62 {
      return Err(SimError::range(CALLER, self.max_level as usize, 63));
    }
    Ok(())
  }
}

impl<D: Dimension> Default for OctreeConfig<D> {
  fn default() -> Self {
    Self::unit()
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
