//! Face reconstruction and flux limiting for volume-coefficient advection.
//!
//! # Normalized Variable Diagram
//!
//! The face water fraction is built from the donor (D), acceptor (A) and the
//! upwind cell behind the donor (U):
//!
//! ```text
//!   U ──── D ──│── A        flow →
//!              face
//!
//!   α̃_D = (α_D - α_U) / (α_A - α_U)
//!   α_f = α_U + α̃_f · (α_A - α_U)
//! ```
//!
//! Inside `0 <= α̃_D <= 1` the schemes pick a downwind-biased α̃_f; outside
//! it they fall back to upwind (α̃_f = α̃_D, i.e. α_f = α_D).
//!
//! # Flux Limiter
//!
//! Face fluxes are scaled so every cell ends the step with
//! `0 <= water <= capacity` and `air >= 0`:
//!
//! 1. donor positivity: a cell never ships more water or air than it holds
//! 2. acceptor capacity: water inflow into a cell is cut to the room left
//!    for water, iterated because cutting an inflow raises the donor's own
//!    level
//! 3. fallback: cells still holding more water than they fit get every flux
//!    touching them zeroed, repeated to a fixed point
//!
//! Air is never limited on the acceptor side. A cell whose total ends above
//! one is clamped by the volume update, which removes the excess air and
//! leaves the water untouched.

use super::config::AdvectionScheme;

/// Normalized fractions closer than this to zero denominators count as flat.
const FLAT: f64 = 1.0e-12;

/// HRIC blends towards upwind between these Courant numbers.
const HRIC_COURANT_LOW: f64 = 0.3;
const HRIC_COURANT_HIGH: f64 = 0.7;

/// Normalized donor value, or `None` when the profile is flat.
#[inline]
pub fn normalized_donor(alpha_u: f64, alpha_d: f64, alpha_a: f64) -> Option<f64> {
  let denom = alpha_a - alpha_u;
  if denom.abs() < FLAT {
    None
  } else {
    Some((alpha_d - alpha_u) / denom)
  }
}

/// HYPER-C: follow the Courant-bounded downwind limit inside the
/// boundedness region.
#[inline]
pub fn hyper_c(tilde_d: f64, courant: f64) -> f64 {
  if !(0.0..=1.0).contains(&tilde_d) {
    return tilde_d;
  }
  if courant <= FLAT {
    return 1.0;
  }
  (tilde_d / courant).min(1.0)
}

/// HRIC: bounded downwind scheme blended back to upwind at high Courant
/// numbers.
#[inline]
pub fn hric(tilde_d: f64, courant: f64) -> f64 {
  let face = if (0.0..0.5).contains(&tilde_d) {
    2.0 * tilde_d
  } else if (0.5..=1.0).contains(&tilde_d) {
    1.0
  } else {
    tilde_d
  };
  if courant < HRIC_COURANT_LOW {
    face
  } else if courant <= HRIC_COURANT_HIGH {
    tilde_d + (face - tilde_d) * (HRIC_COURANT_HIGH - courant) / (HRIC_COURANT_HIGH - HRIC_COURANT_LOW)
  } else {
    tilde_d
  }
}

/// Water fraction on a face for the given scheme.
///
/// `alpha_u` is `None` when the donor has no upwind neighbor along the face
/// axis; the face then takes the donor value.
pub fn face_alpha(
  scheme: AdvectionScheme,
  alpha_u: Option<f64>,
  alpha_d: f64,
  alpha_a: f64,
  courant: f64,
) -> f64 {
  let upwind = alpha_d.clamp(0.0, 1.0);
  let alpha_u = match (scheme, alpha_u) {
    (AdvectionScheme::Upwind, _) | (_, None) => return upwind,
    (_, Some(u)) => u,
  };
  let Some(tilde_d) = normalized_donor(alpha_u, alpha_d, alpha_a) else {
    return upwind;
  };
  let tilde_f = match scheme {
    AdvectionScheme::HyperC => hyper_c(tilde_d, courant),
    AdvectionScheme::Hric => hric(tilde_d, courant),
    AdvectionScheme::Upwind => tilde_d,
  };
  let face = alpha_u + tilde_f * (alpha_a - alpha_u);
  let (lo, hi) = if alpha_d <= alpha_a {
    (alpha_d, alpha_a)
  } else {
    (alpha_a, alpha_d)
  };
  face.clamp(lo, hi).clamp(0.0, 1.0)
}

// =========================================================================
// Limiter
// =========================================================================

/// Volumes a cell holds at the start of the step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellBudget {
  /// Water volume.
  pub water: f64,
  /// Water plus air volume.
  pub total: f64,
  /// Geometric volume of the cell.
  pub capacity: f64,
}

impl CellBudget {
  /// Air volume.
  #[inline]
  pub fn air(&self) -> f64 {
    (self.total - self.water).max(0.0)
  }
}

/// Unlimited volumes crossing one face from `donor` into `acceptor` during
/// the step, plus the scale applied by the limiter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceFlux {
  /// Dense index of the cell losing fluid.
  pub donor: usize,
  /// Dense index of the cell gaining fluid.
  pub acceptor: usize,
  /// Total volume carried at full scale.
  pub total: f64,
  /// Water volume carried at full scale (`<= total`).
  pub water: f64,
  /// Limiter scale in `[0, 1]`.
  pub factor: f64,
}

impl FaceFlux {
  /// Unscaled face flux.
  pub fn new(donor: usize, acceptor: usize, total: f64, water: f64) -> Self {
    Self {
      donor,
      acceptor,
      total,
      water,
      factor: 1.0,
    }
  }

  /// Total volume after limiting.
  #[inline]
  pub fn limited_total(&self) -> f64 {
    self.total * self.factor
  }

  /// Water volume after limiting.
  #[inline]
  pub fn limited_water(&self) -> f64 {
    self.water * self.factor
  }
}

/// What the limiter had to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LimiterReport {
  /// Capacity passes run.
  pub passes: usize,
  /// Faces scaled below 1.
  pub limited_faces: usize,
  /// Faces zeroed by the fallback.
  pub fallback_faces: usize,
}

/// Volumes every cell would hold after applying the (limited) fluxes.
pub fn resulting_volumes(cells: &[CellBudget], faces: &[FaceFlux]) -> Vec<CellBudget> {
  let mut out = cells.to_vec();
  for face in faces {
    let (total, water) = (face.limited_total(), face.limited_water());
    out[face.donor].total -= total;
    out[face.donor].water -= water;
    out[face.acceptor].total += total;
    out[face.acceptor].water += water;
  }
  out
}

/// Scale `faces` so no cell goes negative or holds more water than fits.
///
/// `tolerance` is relative to each cell's capacity.
pub fn limit_fluxes(cells: &[CellBudget], faces: &mut [FaceFlux], passes: usize, tolerance: f64) -> LimiterReport {
  let mut report = LimiterReport::default();
  limit_donors(cells, faces);

  for _ in 0..passes {
    report.passes += 1;
    if !limit_acceptors(cells, faces, tolerance) {
      break;
    }
  }

  report.fallback_faces = zero_overfull(cells, faces, tolerance);
  report.limited_faces = faces.iter().filter(|f| f.factor < 1.0).count();
  report
}

/// Donor positivity: outflow of water and air each bounded by the stock.
fn limit_donors(cells: &[CellBudget], faces: &mut [FaceFlux]) {
  let mut out_water = vec![0.0; cells.len()];
  let mut out_air = vec![0.0; cells.len()];
  for face in faces.iter() {
    out_water[face.donor] += face.water;
    out_air[face.donor] += face.total - face.water;
  }
  let scale: Vec<f64> = cells
    .iter()
    .enumerate()
    .map(|(i, cell)| ratio(cell.water, out_water[i]).min(ratio(cell.air(), out_air[i])))
    .collect();
  for face in faces.iter_mut() {
    face.factor = face.factor.min(scale[face.donor]);
  }
}

/// One acceptor-capacity pass over water. Returns true when any face was
/// cut.
fn limit_acceptors(cells: &[CellBudget], faces: &mut [FaceFlux], tolerance: f64) -> bool {
  let mut inflow = vec![0.0; cells.len()];
  let mut outflow = vec![0.0; cells.len()];
  for face in faces.iter() {
    inflow[face.acceptor] += face.limited_water();
    outflow[face.donor] += face.limited_water();
  }
  let scale: Vec<f64> = cells
    .iter()
    .enumerate()
    .map(|(i, cell)| {
      let room = cell.capacity - cell.water + outflow[i];
      if cell.water - outflow[i] + inflow[i] <= cell.capacity * (1.0 + tolerance) {
        1.0
      } else {
        ratio(room.max(0.0), inflow[i])
      }
    })
    .collect();

  let mut changed = false;
  for face in faces.iter_mut() {
    let s = scale[face.acceptor];
    if s < 1.0 && face.factor > 0.0 {
      face.factor *= s;
      changed = true;
    }
  }
  changed
}

/// Zero every flux touching a cell still holding too much water until none
/// remain.
fn zero_overfull(cells: &[CellBudget], faces: &mut [FaceFlux], tolerance: f64) -> usize {
  let mut zeroed = 0;
  loop {
    let volumes = resulting_volumes(cells, faces);
    let overfull: Vec<bool> = volumes
      .iter()
      .zip(cells)
      .map(|(after, before)| after.water > before.capacity * (1.0 + tolerance))
      .collect();
    let mut changed = false;
    for face in faces.iter_mut() {
      if face.factor > 0.0 && (overfull[face.donor] || overfull[face.acceptor]) {
        face.factor = 0.0;
        zeroed += 1;
        changed = true;
      }
    }
    if !changed {
      return zeroed;
    }
  }
}

/// `available / demand` clamped to `[0, 1]`; no demand means no limit.
#[inline]
fn ratio(available: f64, demand: f64) -> f64 {
  if demand <= 0.0 {
    1.0
  } else {
    (available / demand).clamp(0.0, 1.0)
  }
}

#[cfg(test)]
#[path = "advection_test.rs"]
mod advection_test;
