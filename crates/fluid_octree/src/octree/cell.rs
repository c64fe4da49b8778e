//! SpatialCell - hierarchical grid cell with fluid state and neighbor lists.
//!
//! A cell is an axis-aligned hypercube. It is either a leaf (no child array)
//! or owns an array of exactly 2^D child slots, each of which may be empty
//! when construction pruned that child.
//!
//! Neighbor links attached to a cell are classified by level of detail:
//!
//! ```text
//! same     leaf neighbor at the same level        ┐
//! coarser  leaf neighbor at a coarser level       ├ "leaf list"
//! finer    leaf neighbor at a finer level         ┘
//! coarse   same-level neighbor, one side non-leaf   "coarse list"
//! ```

use smallvec::SmallVec;

use super::arena::Handle;
use super::checked::Checked;
use super::dimension::Dimension;
use super::link::NeighborLink;
use super::neighbor_set::NeighborListSet;
use crate::error::{SimError, SimResult};
use crate::physics::PhysicsConstants;

/// Handle of a cell in the graph arena.
pub type CellId<D> = Handle<SpatialCell<D>>;

/// Handle of a neighbor link in the graph arena.
pub type LinkId<D> = Handle<NeighborLink<D>>;

/// Child slot array (2^D entries, each nullable).
pub type ChildSlots<D> = SmallVec<[Option<CellId<D>>; 8]>;

/// Which of a cell's lists a link lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkClass {
  /// Leaf neighbor at the same level.
  Same,
  /// Leaf neighbor at a coarser level.
  Coarser,
  /// Leaf neighbor at a finer level.
  Finer,
  /// Same-level relationship where at least one side is non-leaf.
  Coarse,
}

impl LinkClass {
  /// Classify a leaf link by comparing levels.
  #[inline]
  pub fn for_levels(own_level: u32, neighbor_level: u32) -> Self {
    use std::cmp::Ordering;
    match neighbor_level.cmp(&own_level) {
      Ordering::Equal => Self::Same,
      Ordering::Less => Self::Coarser,
      Ordering::Greater => Self::Finer,
    }
  }
}

/// The four neighbor lists of a cell.
#[derive(Clone, Debug)]
pub struct LinkLists<D: Dimension> {
  same: Vec<LinkId<D>>,
  coarser: Vec<LinkId<D>>,
  finer: Vec<LinkId<D>>,
  coarse: Vec<LinkId<D>>,
}

impl<D: Dimension> Default for LinkLists<D> {
  fn default() -> Self {
    Self {
      same: Vec::new(),
      coarser: Vec::new(),
      finer: Vec::new(),
      coarse: Vec::new(),
    }
  }
}

impl<D: Dimension> LinkLists<D> {
  /// The list for a given class.
  pub fn list(&self, class: LinkClass) -> &[LinkId<D>] {
    match class {
      LinkClass::Same => &self.same,
      LinkClass::Coarser => &self.coarser,
      LinkClass::Finer => &self.finer,
      LinkClass::Coarse => &self.coarse,
    }
  }

  fn list_mut(&mut self, class: LinkClass) -> &mut Vec<LinkId<D>> {
    match class {
      LinkClass::Same => &mut self.same,
      LinkClass::Coarser => &mut self.coarser,
      LinkClass::Finer => &mut self.finer,
      LinkClass::Coarse => &mut self.coarse,
    }
  }

  pub(crate) fn attach(&mut self, class: LinkClass, link: LinkId<D>) {
    self.list_mut(class).push(link);
  }

  /// Remove `link` from whichever list holds it; returns its class.
  pub(crate) fn detach(&mut self, link: LinkId<D>) -> Option<LinkClass> {
    for class in [
      LinkClass::Same,
      LinkClass::Coarser,
      LinkClass::Finer,
      LinkClass::Coarse,
    ] {
      let list = self.list_mut(class);
      if let Some(pos) = list.iter().position(|&l| l == link) {
        list.swap_remove(pos);
        return Some(class);
      }
    }
    None
  }

  /// Class of the list holding `link`, if any.
  pub fn class_of(&self, link: LinkId<D>) -> Option<LinkClass> {
    [
      LinkClass::Same,
      LinkClass::Coarser,
      LinkClass::Finer,
      LinkClass::Coarse,
    ]
    .into_iter()
    .find(|&class| self.list(class).contains(&link))
  }

  /// All leaf links (same + coarser + finer), collected.
  pub fn leaf_links(&self) -> Vec<LinkId<D>> {
    let mut out = Vec::with_capacity(self.leaf_len());
    out.extend_from_slice(&self.same);
    out.extend_from_slice(&self.coarser);
    out.extend_from_slice(&self.finer);
    out
  }

  /// Coarse links, collected.
  pub fn coarse_links(&self) -> Vec<LinkId<D>> {
    self.coarse.clone()
  }

  /// Number of leaf links.
  pub fn leaf_len(&self) -> usize {
    self.same.len() + self.coarser.len() + self.finer.len()
  }

  /// Number of links in every list.
  pub fn len(&self) -> usize {
    self.leaf_len() + self.coarse.len()
  }

  /// True when the cell has no neighbors at all.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Outcome of applying advected volumes to a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeUpdate {
  /// The cell drained completely.
  NoFluidLeft,
  /// Water caught up with total; both shrink to the new total.
  OkayToDecreaseWater,
  /// Water is at zero; only the total changes.
  OkayToIncreaseWater,
  /// Neither bound is active.
  General,
}

/// Physical state carried by a leaf cell.
#[derive(Clone, Debug)]
pub struct FluidState<D: Dimension> {
  water_vol_coeff: f64,
  total_vol_coeff: f64,
  /// Cell-center velocity, unset until the first center-velocity pass.
  pub velocity: Checked<D::Vector>,
  /// Momentum left over after advection, distributed to outflow faces.
  pub residual_momentum: D::Vector,
  /// Center pressure, refreshed each step before the face velocity update.
  pub pressure: f64,
}

impl<D: Dimension> Default for FluidState<D> {
  fn default() -> Self {
    Self {
      water_vol_coeff: 0.0,
      total_vol_coeff: 0.0,
      velocity: Checked::Unset,
      residual_momentum: D::zero(),
      pressure: 0.0,
    }
  }
}

/// Validate a (water, total) pair: no NaN, no negative values beyond `eps`,
/// water never above total beyond `eps`.
pub fn validate_volume_coefficients(
  caller: &'static str,
  water: f64,
  total: f64,
  eps: f64,
) -> SimResult<()> {
  if water.is_nan() || total.is_nan() {
    return Err(SimError::contract(caller, "volume coefficient is NaN"));
  }
  if water < -eps || total < -eps {
    return Err(SimError::contract(
      caller,
      format!("negative volume coefficient (water {water}, total {total})"),
    ));
  }
  if water > total + eps {
    return Err(SimError::contract(
      caller,
      format!("water {water} exceeds total {total}"),
    ));
  }
  Ok(())
}

impl<D: Dimension> FluidState<D> {
  /// Water volume coefficient.
  #[inline]
  pub fn water(&self) -> f64 {
    self.water_vol_coeff
  }

  /// Total (water + air) volume coefficient.
  #[inline]
  pub fn total(&self) -> f64 {
    self.total_vol_coeff
  }

  /// Water fraction of the fluid present (0 when the cell is empty).
  #[inline]
  pub fn alpha(&self, eps: f64) -> f64 {
    if self.total_vol_coeff > eps {
      (self.water_vol_coeff / self.total_vol_coeff).clamp(0.0, 1.0)
    } else {
      0.0
    }
  }

  /// True when the cell carries any fluid.
  #[inline]
  pub fn has_fluid(&self, eps: f64) -> bool {
    self.total_vol_coeff > eps
  }

  /// Mixture density.
  #[inline]
  pub fn density(&self, physics: &PhysicsConstants) -> f64 {
    physics.density(self.water_vol_coeff, self.total_vol_coeff)
  }

  /// Set both volume coefficients after validation.
  pub fn set_volume_coefficients(&mut self, water: f64, total: f64) -> SimResult<()> {
    validate_volume_coefficients("SpatialCell::set_volume_coefficients", water, total, 0.0)?;
    self.water_vol_coeff = water;
    self.total_vol_coeff = total;
    Ok(())
  }

  /// Apply the coefficients produced by advection.
  ///
  /// The band of width `eps` around zero and around water == total absorbs
  /// flux round-off without breaking `0 <= water <= total <= 1`.
  pub fn apply_volume_update(&mut self, new_water: f64, new_total: f64, eps: f64) -> VolumeUpdate {
    if new_total < eps {
      self.water_vol_coeff = 0.0;
      self.total_vol_coeff = 0.0;
      VolumeUpdate::NoFluidLeft
    } else if new_water >= new_total - eps * new_total {
      let total = new_total.clamp(0.0, 1.0);
      self.water_vol_coeff = total;
      self.total_vol_coeff = total;
      VolumeUpdate::OkayToDecreaseWater
    } else if new_water <= eps {
      self.water_vol_coeff = 0.0;
      self.total_vol_coeff = new_total.clamp(0.0, 1.0);
      VolumeUpdate::OkayToIncreaseWater
    } else {
      let total = new_total.clamp(0.0, 1.0);
      self.total_vol_coeff = total;
      self.water_vol_coeff = new_water.clamp(0.0, total);
      VolumeUpdate::General
    }
  }
}

/// Hierarchical grid cell.
#[derive(Clone, Debug)]
pub struct SpatialCell<D: Dimension> {
  corner: D::Vector,
  size: f64,
  level: u32,
  parent: Option<CellId<D>>,
  children: Option<ChildSlots<D>>,
  pub(crate) links: LinkLists<D>,
  /// Physical state (meaningful on leaves).
  pub fluid: FluidState<D>,
}

impl<D: Dimension> SpatialCell<D> {
  /// Create a leaf cell with no neighbors.
  pub fn new(corner: D::Vector, size: f64, level: u32, parent: Option<CellId<D>>) -> Self {
    Self {
      corner,
      size,
      level,
      parent,
      children: None,
      links: LinkLists::default(),
      fluid: FluidState::default(),
    }
  }

  /// Lower corner.
  #[inline]
  pub fn corner(&self) -> D::Vector {
    self.corner
  }

  /// Side length.
  #[inline]
  pub fn size(&self) -> f64 {
    self.size
  }

  /// Refinement level (0 = root).
  #[inline]
  pub fn level(&self) -> u32 {
    self.level
  }

  /// Parent cell, `None` for the root or a free-standing cell.
  #[inline]
  pub fn parent(&self) -> Option<CellId<D>> {
    self.parent
  }

  /// Geometric center.
  #[inline]
  pub fn center(&self) -> D::Vector {
    self.corner + D::splat(self.size * 0.5)
  }

  /// Cell volume (area in 2D).
  #[inline]
  pub fn volume(&self) -> f64 {
    D::cell_volume(self.size)
  }

  /// True when the cell has no child array.
  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// Child slots, `None` for a leaf.
  #[inline]
  pub fn children(&self) -> Option<&[Option<CellId<D>>]> {
    self.children.as_deref()
  }

  /// Child in slot `index`, range-checked against 2^D.
  pub fn child(&self, index: usize) -> SimResult<Option<CellId<D>>> {
    let slots = self
      .children
      .as_ref()
      .ok_or_else(|| SimError::contract("SpatialCell::child", "cell is a leaf"))?;
    slots
      .get(index)
      .copied()
      .ok_or_else(|| SimError::range("SpatialCell::child", index, D::CHILDREN))
  }

  pub(crate) fn set_children(&mut self, children: Option<ChildSlots<D>>) {
    self.children = children;
  }

  pub(crate) fn clear_child(&mut self, index: usize) -> SimResult<()> {
    let slots = self
      .children
      .as_mut()
      .ok_or_else(|| SimError::contract("SpatialCell::clear_child", "cell is a leaf"))?;
    let slot = slots
      .get_mut(index)
      .ok_or_else(|| SimError::range("SpatialCell::clear_child", index, D::CHILDREN))?;
    *slot = None;
    Ok(())
  }

  /// Neighbor lists.
  #[inline]
  pub fn links(&self) -> &LinkLists<D> {
    &self.links
  }

  /// Merge iterator over the three leaf lists.
  pub fn leaf_neighbors(&self) -> NeighborListSet<'_, D> {
    NeighborListSet::over([
      self.links.list(LinkClass::Same),
      self.links.list(LinkClass::Coarser),
      self.links.list(LinkClass::Finer),
    ])
  }

  /// Merge iterator over all four lists.
  pub fn all_neighbors(&self) -> NeighborListSet<'_, D> {
    NeighborListSet::over([
      self.links.list(LinkClass::Same),
      self.links.list(LinkClass::Coarser),
      self.links.list(LinkClass::Finer),
      self.links.list(LinkClass::Coarse),
    ])
  }

  /// Whether the box of this cell overlaps `other`'s along `dim` only at a
  /// shared face and overlaps with positive measure on every other axis.
  pub fn shares_face_with(&self, other: &Self, dim: usize) -> bool {
    let tol = 1e-12 * self.size.max(other.size);
    let touches = (self.corner[dim] + self.size - other.corner[dim]).abs() <= tol
      || (other.corner[dim] + other.size - self.corner[dim]).abs() <= tol;
    if !touches {
      return false;
    }
    (0..D::D).filter(|&e| e != dim).all(|e| {
      let lo = self.corner[e].max(other.corner[e]);
      let hi = (self.corner[e] + self.size).min(other.corner[e] + other.size);
      hi - lo > tol
    })
  }
}

#[cfg(test)]
#[path = "cell_test.rs"]
mod cell_test;
