//! NeighborLink - directed face connection between two cells.
//!
//! Links always come in reciprocal pairs. Each half is owned by the cell on
//! its side and stores the handle of its mirror:
//!
//! ```text
//!   cell A ── link a→b ──▶ cell B        distance(a→b) = center(B) - center(A)
//!          ◀── link b→a ──               distance(b→a) = -distance(a→b)
//! ```
//!
//! Directed fields (outflow velocity) are stored negated on the mirror, shared
//! fields (volume coefficients, momentum, geometry magnitudes) are stored
//! identically. All mutation goes through [`LinkStore`], which writes both
//! halves so the pair can never disagree.

use super::arena::{Arena, Handle};
use super::cell::{validate_volume_coefficients, CellId, LinkId, SpatialCell};
use super::dimension::Dimension;
use crate::error::{SimError, SimResult};
use crate::physics::PhysicsConstants;

/// Geometric data shared by both halves of a link.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkGeometry<D: Dimension> {
  /// center(neighbor) - center(cell).
  pub distance: D::Vector,
  /// |distance|.
  pub length: f64,
  /// Shared face measure: face of the smaller cell.
  pub area: f64,
}

impl<D: Dimension> LinkGeometry<D> {
  /// Geometry of the link from `from` to `to`.
  pub fn between(from: &SpatialCell<D>, to: &SpatialCell<D>) -> SimResult<Self> {
    let distance = to.center() - from.center();
    let length = D::length(distance);
    if !(length > 0.0) {
      return Err(SimError::domain(
        "LinkGeometry::between",
        "cells have coincident centers",
      ));
    }
    Ok(Self {
      distance,
      length,
      area: D::face_measure(from.size().min(to.size())),
    })
  }

  /// The same geometry seen from the other side.
  #[inline]
  pub fn reversed(&self) -> Self {
    Self {
      distance: -self.distance,
      ..*self
    }
  }
}

/// One directed half of a face connection.
#[derive(Clone, Debug)]
pub struct NeighborLink<D: Dimension> {
  cell: CellId<D>,
  neighbor: CellId<D>,
  mirror: LinkId<D>,
  dim: usize,
  positive_direction: bool,
  lowest_level: u32,
  geometry: LinkGeometry<D>,
  water_vol_coeff: f64,
  total_vol_coeff: f64,
  momentum: D::Vector,
  outflow_velocity: f64,
}

impl<D: Dimension> NeighborLink<D> {
  fn new(
    cell: CellId<D>,
    neighbor: CellId<D>,
    dim: usize,
    positive_direction: bool,
    lowest_level: u32,
    geometry: LinkGeometry<D>,
  ) -> Self {
    Self {
      cell,
      neighbor,
      mirror: Handle::dangling(),
      dim,
      positive_direction,
      lowest_level,
      geometry,
      water_vol_coeff: 0.0,
      total_vol_coeff: 0.0,
      momentum: D::zero(),
      outflow_velocity: 0.0,
    }
  }

  /// Cell owning this half.
  #[inline]
  pub fn cell(&self) -> CellId<D> {
    self.cell
  }

  /// Cell on the other side.
  #[inline]
  pub fn neighbor(&self) -> CellId<D> {
    self.neighbor
  }

  /// The reciprocal half.
  #[inline]
  pub fn mirror(&self) -> LinkId<D> {
    self.mirror
  }

  /// Axis the face is orthogonal to.
  #[inline]
  pub fn dim(&self) -> usize {
    self.dim
  }

  /// True when the neighbor lies on the positive side along `dim`.
  #[inline]
  pub fn positive_direction(&self) -> bool {
    self.positive_direction
  }

  /// True when the neighbor lies on the negative side along `dim`.
  #[inline]
  pub fn reverse(&self) -> bool {
    !self.positive_direction
  }

  /// Coarsest level at which this connection exists.
  #[inline]
  pub fn lowest_level(&self) -> u32 {
    self.lowest_level
  }

  /// Geometry (distance vector, its length, face area).
  #[inline]
  pub fn geometry(&self) -> &LinkGeometry<D> {
    &self.geometry
  }

  /// center(neighbor) - center(cell).
  #[inline]
  pub fn distance(&self) -> D::Vector {
    self.geometry.distance
  }

  /// |distance|.
  #[inline]
  pub fn distance_len(&self) -> f64 {
    self.geometry.length
  }

  /// Shared face measure.
  #[inline]
  pub fn face_area(&self) -> f64 {
    self.geometry.area
  }

  /// Face water volume coefficient.
  #[inline]
  pub fn water(&self) -> f64 {
    self.water_vol_coeff
  }

  /// Face total volume coefficient.
  #[inline]
  pub fn total(&self) -> f64 {
    self.total_vol_coeff
  }

  /// Momentum density carried through the face.
  #[inline]
  pub fn momentum(&self) -> D::Vector {
    self.momentum
  }

  /// Velocity out of `cell` into `neighbor` (negative = inflow).
  #[inline]
  pub fn outflow_velocity(&self) -> f64 {
    self.outflow_velocity
  }

  /// Velocity component along +`dim`.
  #[inline]
  pub fn axis_velocity(&self) -> f64 {
    if self.positive_direction {
      self.outflow_velocity
    } else {
      -self.outflow_velocity
    }
  }

  /// +1 for a positive-side face, -1 otherwise.
  #[inline]
  pub fn sign(&self) -> f64 {
    if self.positive_direction {
      1.0
    } else {
      -1.0
    }
  }
}

/// Arena of links enforcing pairwise consistency.
pub struct LinkStore<D: Dimension> {
  arena: Arena<NeighborLink<D>>,
}

impl<D: Dimension> Default for LinkStore<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: Dimension> LinkStore<D> {
  /// Empty store.
  pub fn new() -> Self {
    Self {
      arena: Arena::new(),
    }
  }

  /// Number of directed halves (twice the number of connections).
  #[inline]
  pub fn len(&self) -> usize {
    self.arena.len()
  }

  /// True when no link exists.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.arena.is_empty()
  }

  /// Upper bound of link slot indices.
  #[inline]
  pub fn slot_count(&self) -> usize {
    self.arena.slot_count()
  }

  /// Link lookup.
  #[inline]
  pub fn get(&self, id: LinkId<D>) -> SimResult<&NeighborLink<D>> {
    self.arena.try_get(id, "LinkStore::get")
  }

  /// True when `id` is live.
  #[inline]
  pub fn contains(&self, id: LinkId<D>) -> bool {
    self.arena.contains(id)
  }

  /// Iterate over every directed half.
  pub fn iter(&self) -> impl Iterator<Item = (LinkId<D>, &NeighborLink<D>)> {
    self.arena.iter()
  }

  /// Create both halves of a connection from `a` to `b`.
  pub(crate) fn insert_pair(
    &mut self,
    a: CellId<D>,
    b: CellId<D>,
    dim: usize,
    positive_direction: bool,
    lowest_level: u32,
    geometry: LinkGeometry<D>,
  ) -> (LinkId<D>, LinkId<D>) {
    let ab = self.arena.insert(NeighborLink::new(
      a,
      b,
      dim,
      positive_direction,
      lowest_level,
      geometry,
    ));
    let ba = self.arena.insert(NeighborLink::new(
      b,
      a,
      dim,
      !positive_direction,
      lowest_level,
      geometry.reversed(),
    ));
    if let Some(link) = self.arena.get_mut(ab) {
      link.mirror = ba;
    }
    if let Some(link) = self.arena.get_mut(ba) {
      link.mirror = ab;
    }
    (ab, ba)
  }

  /// Remove both halves; returns them as (this, mirror).
  pub(crate) fn remove_pair(
    &mut self,
    id: LinkId<D>,
  ) -> SimResult<(NeighborLink<D>, NeighborLink<D>)> {
    let mirror = self.get(id)?.mirror;
    let this = self
      .arena
      .remove(id)
      .ok_or_else(|| SimError::range("LinkStore::remove_pair", id.index(), self.slot_count()))?;
    let other = self.arena.remove(mirror).ok_or_else(|| {
      SimError::contract("LinkStore::remove_pair", "link has no live mirror")
    })?;
    Ok((this, other))
  }

  /// Move the `id` half to a new owning cell and refresh the pair geometry.
  pub(crate) fn rebind(
    &mut self,
    id: LinkId<D>,
    new_cell: CellId<D>,
    geometry: LinkGeometry<D>,
  ) -> SimResult<()> {
    let mirror = {
      let link = self.arena.try_get_mut(id, "LinkStore::rebind")?;
      link.cell = new_cell;
      link.geometry = geometry;
      link.mirror
    };
    let other = self.arena.try_get_mut(mirror, "LinkStore::rebind")?;
    other.neighbor = new_cell;
    other.geometry = geometry.reversed();
    Ok(())
  }

  /// Set the face volume coefficients on both halves.
  pub fn set_volume_coefficients(&mut self, id: LinkId<D>, water: f64, total: f64) -> SimResult<()> {
    validate_volume_coefficients("NeighborLink::set_volume_coefficients", water, total, 0.0)?;
    let mirror = {
      let link = self.arena.try_get_mut(id, "NeighborLink::set_volume_coefficients")?;
      link.water_vol_coeff = water;
      link.total_vol_coeff = total;
      link.mirror
    };
    let other = self
      .arena
      .try_get_mut(mirror, "NeighborLink::set_volume_coefficients")?;
    other.water_vol_coeff = water;
    other.total_vol_coeff = total;
    Ok(())
  }

  /// Set the outflow velocity of `id`; the mirror gets the negation.
  pub fn set_outflow_velocity(&mut self, id: LinkId<D>, velocity: f64) -> SimResult<()> {
    if velocity.is_nan() {
      return Err(SimError::domain(
        "NeighborLink::set_outflow_velocity",
        "velocity is NaN",
      ));
    }
    let mirror = {
      let link = self.arena.try_get_mut(id, "NeighborLink::set_outflow_velocity")?;
      link.outflow_velocity = velocity;
      link.mirror
    };
    self
      .arena
      .try_get_mut(mirror, "NeighborLink::set_outflow_velocity")?
      .outflow_velocity = -velocity;
    Ok(())
  }

  /// Set the face momentum density on both halves.
  pub fn set_momentum(&mut self, id: LinkId<D>, momentum: D::Vector) -> SimResult<()> {
    let mirror = {
      let link = self.arena.try_get_mut(id, "NeighborLink::set_momentum")?;
      link.momentum = momentum;
      link.mirror
    };
    self
      .arena
      .try_get_mut(mirror, "NeighborLink::set_momentum")?
      .momentum = momentum;
    Ok(())
  }

  /// Advance the outflow velocity of `id` from the pressure difference
  /// between `a` (owning side) and `b` (neighbor side) and gravity.
  ///
  /// ```text
  /// rho = (rho_a * s_a + rho_b * s_b) / (s_a + s_b)
  /// dv  = ((p_a - p_b) / (|d| * rho) - g * d_vertical / |d| * correction(rho)) * dt
  /// ```
  ///
  /// With hydrostatic center pressures the two terms cancel across any
  /// pair of cells, whatever their levels.
  pub fn update_velocity(
    &mut self,
    id: LinkId<D>,
    a: &SpatialCell<D>,
    b: &SpatialCell<D>,
    dt: f64,
    physics: &PhysicsConstants,
  ) -> SimResult<()> {
    if !dt.is_finite() {
      return Err(SimError::domain("NeighborLink::update_velocity", "dt is not finite"));
    }
    let link = self.get(id)?;
    let (size_a, size_b) = (a.size(), b.size());
    let density =
      (a.fluid.density(physics) * size_a + b.fluid.density(physics) * size_b) / (size_a + size_b);
    if PhysicsConstants::is_void(density) {
      return self.set_outflow_velocity(id, 0.0);
    }
    let length = link.geometry.length;
    let pressure_term = (a.fluid.pressure - b.fluid.pressure) / (length * density);
    let gravity_component = physics.gravity * link.geometry.distance[D::VERTICAL] / length;
    let accel = pressure_term - gravity_component * physics.density_correction(density);
    let velocity = link.outflow_velocity + accel * dt;
    self.set_outflow_velocity(id, velocity)
  }
}

#[cfg(test)]
#[path = "link_test.rs"]
mod link_test;
