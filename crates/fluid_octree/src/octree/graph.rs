//! CellGraph - owner of every cell and link, and of the topology operations.
//!
//! Cells reference each other through [`CellId`] handles and links through
//! [`LinkId`] handles; this type holds both arenas so refine, coarsen and
//! deletion can rewire several cells atomically.
//!
//! # Child indexing
//!
//! Child `i` takes, per axis `d`, the lower half when bit `d` of `i` is 0 and
//! the upper half otherwise:
//!
//! ```text
//!   2D:   y
//!         ▲  ┌───┬───┐
//!         │  │ 2 │ 3 │
//!         │  ├───┼───┤
//!         │  │ 0 │ 1 │
//!         │  └───┴───┘
//!         └───────────▶ x
//! ```
//!
//! # Link redistribution on refine
//!
//! | neighbor size      | parent link becomes              | children get                      |
//! |--------------------|----------------------------------|-----------------------------------|
//! | same               | coarse link (kept, reassigned)   | one link per child on that side   |
//! | larger             | removed                          | one link per child on that side   |
//! | smaller            | moved to the one adjacent child  | nothing else                      |

use std::collections::HashSet;

use smallvec::SmallVec;

use super::arena::Arena;
use super::cell::{CellId, ChildSlots, LinkClass, LinkId, SpatialCell};
use super::checked::Checked;
use super::dimension::Dimension;
use super::link::{LinkGeometry, LinkStore, NeighborLink};
use crate::error::{SimError, SimResult};
use crate::physics::PhysicsConstants;

/// Arena-backed cell tree with its neighbor graph.
pub struct CellGraph<D: Dimension> {
  cells: Arena<SpatialCell<D>>,
  links: LinkStore<D>,
}

impl<D: Dimension> Default for CellGraph<D> {
  fn default() -> Self {
    Self::new()
  }
}

impl<D: Dimension> CellGraph<D> {
  /// Empty graph.
  pub fn new() -> Self {
    Self {
      cells: Arena::new(),
      links: LinkStore::new(),
    }
  }

  // ---------------------------------------------------------------------
  // Access
  // ---------------------------------------------------------------------

  /// Number of live cells (leaves and interior).
  #[inline]
  pub fn cell_count(&self) -> usize {
    self.cells.len()
  }

  /// Link store (read-only).
  #[inline]
  pub fn links(&self) -> &LinkStore<D> {
    &self.links
  }

  /// Link store for face-field mutation.
  #[inline]
  pub fn links_mut(&mut self) -> &mut LinkStore<D> {
    &mut self.links
  }

  /// Cell lookup.
  #[inline]
  pub fn cell(&self, id: CellId<D>) -> SimResult<&SpatialCell<D>> {
    self.cells.try_get(id, "CellGraph::cell")
  }

  /// Mutable cell lookup (fluid state only; topology is private).
  #[inline]
  pub fn cell_mut(&mut self, id: CellId<D>) -> SimResult<&mut SpatialCell<D>> {
    self.cells.try_get_mut(id, "CellGraph::cell_mut")
  }

  /// True when `id` is live.
  #[inline]
  pub fn contains(&self, id: CellId<D>) -> bool {
    self.cells.contains(id)
  }

  /// Upper bound on cell handle indices, for dense per-cell scratch arrays.
  #[inline]
  pub fn cell_slots(&self) -> usize {
    self.cells.slot_count()
  }

  /// Link lookup.
  #[inline]
  pub fn link(&self, id: LinkId<D>) -> SimResult<&NeighborLink<D>> {
    self.links.get(id)
  }

  /// Iterate over every live cell.
  pub fn cells(&self) -> impl Iterator<Item = (CellId<D>, &SpatialCell<D>)> {
    self.cells.iter()
  }

  /// Handles of every live leaf.
  pub fn leaf_ids(&self) -> Vec<CellId<D>> {
    self
      .cells
      .iter()
      .filter(|(_, cell)| cell.is_leaf())
      .map(|(id, _)| id)
      .collect()
  }

  /// Pressure and gravity update of `link` from the cells on both sides.
  pub fn update_velocity(&mut self, link: LinkId<D>, dt: f64, physics: &PhysicsConstants) -> SimResult<()> {
    const CALLER: &str = "CellGraph::update_velocity";
    let (cell, neighbor) = {
      let l = self.links.get(link)?;
      (l.cell(), l.neighbor())
    };
    let a = self.cells.try_get(cell, CALLER)?;
    let b = self.cells.try_get(neighbor, CALLER)?;
    self.links.update_velocity(link, a, b, dt, physics)
  }

  /// Insert a free-standing cell (typically the root).
  pub fn insert_cell(&mut self, cell: SpatialCell<D>) -> CellId<D> {
    self.cells.insert(cell)
  }

  // ---------------------------------------------------------------------
  // Linking
  // ---------------------------------------------------------------------

  /// List a link belongs in given the current leaf status of both ends.
  fn class_for(&self, link: &NeighborLink<D>) -> SimResult<LinkClass> {
    let own = self.cell(link.cell())?;
    let other = self.cell(link.neighbor())?;
    if own.is_leaf() && other.is_leaf() {
      Ok(LinkClass::for_levels(own.level(), other.level()))
    } else {
      Ok(LinkClass::Coarse)
    }
  }

  /// Put `link` in the right list of its owner, removing it from any other.
  fn reclassify(&mut self, link: LinkId<D>) -> SimResult<()> {
    let (owner, class) = {
      let l = self.links.get(link)?;
      (l.cell(), self.class_for(l)?)
    };
    let lists = &mut self.cell_mut(owner)?.links;
    lists.detach(link);
    lists.attach(class, link);
    Ok(())
  }

  fn link_cells(
    &mut self,
    c1: CellId<D>,
    c2: CellId<D>,
    dim: usize,
    positive_direction: bool,
    lowest_level: u32,
  ) -> SimResult<(LinkId<D>, LinkId<D>)> {
    let geometry = LinkGeometry::between(self.cell(c1)?, self.cell(c2)?)?;
    let (ab, ba) = self
      .links
      .insert_pair(c1, c2, dim, positive_direction, lowest_level, geometry);
    for link in [ab, ba] {
      let (owner, class) = {
        let l = self.links.get(link)?;
        (l.cell(), self.class_for(l)?)
      };
      self.cell_mut(owner)?.links.attach(class, link);
    }
    Ok((ab, ba))
  }

  /// Connect two face-adjacent cells across axis `dim`.
  ///
  /// `lowest_level` is the coarsest level at which this relationship exists;
  /// coarsening past it discards the pair.
  pub fn make_neighbors(
    &mut self,
    c1: CellId<D>,
    c2: CellId<D>,
    dim: usize,
    lowest_level: u32,
  ) -> SimResult<(LinkId<D>, LinkId<D>)> {
    const CALLER: &str = "CellGraph::make_neighbors";
    if dim >= D::D {
      return Err(SimError::range(CALLER, dim, D::D));
    }
    if c1 == c2 {
      return Err(SimError::contract(CALLER, "a cell cannot neighbor itself"));
    }
    let (a, b) = (self.cell(c1)?, self.cell(c2)?);
    if !a.shares_face_with(b, dim) {
      return Err(SimError::contract(
        CALLER,
        format!("cells {c1:?} and {c2:?} share no face across axis {dim}"),
      ));
    }
    let positive = b.center()[dim] > a.center()[dim];
    self.link_cells(c1, c2, dim, positive, lowest_level)
  }

  /// Remove both halves of a link and detach them from their owners.
  fn unlink(&mut self, link: LinkId<D>) -> SimResult<()> {
    let (this, mirror) = {
      let l = self.links.get(link)?;
      (l.cell(), l.mirror())
    };
    let other = self.links.get(mirror)?.cell();
    if let Some(cell) = self.cells.get_mut(this) {
      cell.links.detach(link);
    }
    if let Some(cell) = self.cells.get_mut(other) {
      cell.links.detach(mirror);
    }
    self.links.remove_pair(link)?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Refine
  // ---------------------------------------------------------------------

  /// Split a leaf into 2^D children and redistribute its leaf links.
  ///
  /// Children inherit the parent's volume coefficients and velocity.
  pub fn refine(&mut self, id: CellId<D>) -> SimResult<ChildSlots<D>> {
    const CALLER: &str = "SpatialCell::refine";
    let (corner, size, level, fluid) = {
      let cell = self.cell(id)?;
      if !cell.is_leaf() {
        return Err(SimError::contract(CALLER, "cell is already refined"));
      }
      (cell.corner(), cell.size(), cell.level(), cell.fluid.clone())
    };
    let half = size * 0.5;
    let child_level = level + 1;

    let mut children: ChildSlots<D> = SmallVec::with_capacity(D::CHILDREN);
    for i in 0..D::CHILDREN {
      let mut child_corner = corner;
      for d in 0..D::D {
        if (i >> d) & 1 == 1 {
          child_corner[d] += half;
        }
      }
      let mut child = SpatialCell::new(child_corner, half, child_level, Some(id));
      child
        .fluid
        .set_volume_coefficients(fluid.water(), fluid.total())?;
      child.fluid.velocity = fluid.velocity;
      children.push(Some(self.cells.insert(child)));
    }
    self.cell_mut(id)?.set_children(Some(children.clone()));

    let child_at = |i: usize| children[i].ok_or_else(|| SimError::range(CALLER, i, D::CHILDREN));

    // Siblings.
    for d in 0..D::D {
      for i in (0..D::CHILDREN).filter(|i| (i >> d) & 1 == 0) {
        let j = i | (1 << d);
        self.link_cells(child_at(i)?, child_at(j)?, d, true, child_level)?;
      }
    }

    // Parent's leaf links.
    let parent_center = corner + D::splat(half);
    for link in self.cell(id)?.links().leaf_links() {
      let (neighbor, dim, positive, lowest, velocity, water, total) = {
        let l = self.links.get(link)?;
        (
          l.neighbor(),
          l.dim(),
          l.positive_direction(),
          l.lowest_level(),
          l.outflow_velocity(),
          l.water(),
          l.total(),
        )
      };
      let (neighbor_level, neighbor_center) = {
        let n = self.cell(neighbor)?;
        (n.level(), n.center())
      };
      let side_bit = usize::from(positive) << dim;

      if neighbor_level > level {
        // Smaller neighbor: hand the link to the one adjacent child.
        let mut index = side_bit;
        for e in (0..D::D).filter(|&e| e != dim) {
          if neighbor_center[e] > parent_center[e] {
            index |= 1 << e;
          }
        }
        let child = child_at(index)?;
        let geometry = LinkGeometry::between(self.cell(child)?, self.cell(neighbor)?)?;
        self.cell_mut(id)?.links.detach(link);
        self.links.rebind(link, child, geometry)?;
        self.reclassify(link)?;
        let mirror = self.links.get(link)?.mirror();
        self.reclassify(mirror)?;
        continue;
      }

      for i in (0..D::CHILDREN).filter(|i| i & (1 << dim) == side_bit) {
        let (ab, _) = self.link_cells(child_at(i)?, neighbor, dim, positive, lowest)?;
        self.links.set_outflow_velocity(ab, velocity)?;
        self.links.set_volume_coefficients(ab, water, total)?;
      }
      if neighbor_level == level {
        self.reclassify(link)?;
        let mirror = self.links.get(link)?.mirror();
        self.reclassify(mirror)?;
      } else {
        self.unlink(link)?;
      }
    }

    tracing::debug!(cell = ?id, level, "refined");
    Ok(children)
  }

  // ---------------------------------------------------------------------
  // Coarsen
  // ---------------------------------------------------------------------

  /// Merge the children of `id` back into it (children first, recursively).
  ///
  /// The parent's water and total coefficients become the volume-weighted
  /// mean of its children and its velocity the mass-weighted mean.
  pub fn coarsen(&mut self, id: CellId<D>) -> SimResult<()> {
    self.coarsen_with(id, &PhysicsConstants::EARTH)
  }

  /// [`coarsen`](Self::coarsen) with explicit densities for the velocity
  /// average.
  pub fn coarsen_with(&mut self, id: CellId<D>, physics: &PhysicsConstants) -> SimResult<()> {
    const CALLER: &str = "SpatialCell::coarsen";
    let (level, children) = {
      let cell = self.cell(id)?;
      let children: Vec<CellId<D>> = cell
        .children()
        .ok_or_else(|| SimError::contract(CALLER, "cell is a leaf"))?
        .iter()
        .flatten()
        .copied()
        .collect();
      (cell.level(), children)
    };

    for &child in &children {
      if !self.cell(child)?.is_leaf() {
        self.coarsen_with(child, physics)?;
      }
    }

    // Same-level relationships already held by the parent win over the
    // children's copies of them.
    let mut seen: HashSet<(usize, bool)> = HashSet::new();
    for &link in self.cell(id)?.links().list(LinkClass::Coarse) {
      let l = self.links.get(link)?;
      seen.insert((l.dim(), l.positive_direction()));
    }

    let volume = self.cell(id)?.volume();
    let mut water = 0.0;
    let mut total = 0.0;
    let mut momentum = D::zero();
    let mut mass = 0.0;
    let mut any_velocity = false;

    for &child in &children {
      let (child_links, coarse_links) = {
        let c = self.cell(child)?;
        let ratio = c.volume() / volume;
        water += c.fluid.water() * ratio;
        total += c.fluid.total() * ratio;
        if let Checked::Set(v) = c.fluid.velocity {
          let m = c.fluid.density(physics) * c.volume();
          momentum += v * m;
          mass += m;
          any_velocity = true;
        }
        (c.links().leaf_links(), c.links().coarse_links())
      };

      for link in coarse_links {
        self.unlink(link)?;
      }

      for link in child_links {
        let (neighbor, dim, positive, lowest) = {
          let l = self.links.get(link)?;
          (l.neighbor(), l.dim(), l.positive_direction(), l.lowest_level())
        };
        if lowest > level {
          self.unlink(link)?;
          continue;
        }
        let neighbor_level = self.cell(neighbor)?.level();
        if neighbor_level <= level && !seen.insert((dim, positive)) {
          self.unlink(link)?;
          continue;
        }
        let geometry = LinkGeometry::between(self.cell(id)?, self.cell(neighbor)?)?;
        self.cell_mut(child)?.links.detach(link);
        self.links.rebind(link, id, geometry)?;
        // Parked in the coarse list until the parent is a leaf again.
        self.cell_mut(id)?.links.attach(LinkClass::Coarse, link);
      }
    }

    for &child in &children {
      if !self.cell(child)?.links().is_empty() {
        return Err(SimError::contract(CALLER, "child kept links after coarsening"));
      }
      self.cells.remove(child);
    }

    let cell = self.cell_mut(id)?;
    cell.set_children(None);
    // Pruned children count as empty space.
    cell
      .fluid
      .set_volume_coefficients(water.min(total), total)?;
    cell.fluid.velocity = if any_velocity && !PhysicsConstants::is_void(mass) {
      Checked::Set(momentum * (1.0 / mass))
    } else if any_velocity {
      Checked::Set(D::zero())
    } else {
      Checked::Unset
    };
    cell.fluid.residual_momentum = D::zero();

    for link in self.cell(id)?.links().coarse_links() {
      self.reclassify(link)?;
      let mirror = self.links.get(link)?.mirror();
      self.reclassify(mirror)?;
    }

    tracing::debug!(cell = ?id, level, "coarsened");
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Deletion
  // ---------------------------------------------------------------------

  /// Remove a cell, its subtree and every link touching them.
  pub fn delete_cell(&mut self, id: CellId<D>) -> SimResult<()> {
    let (parent, children, links) = {
      let cell = self.cell(id)?;
      let children: Vec<CellId<D>> = cell
        .children()
        .map(|slots| slots.iter().flatten().copied().collect())
        .unwrap_or_default();
      let mut links = cell.links().leaf_links();
      links.extend(cell.links().coarse_links());
      (cell.parent(), children, links)
    };
    for child in children {
      self.delete_cell(child)?;
    }
    for link in links {
      self.unlink(link)?;
    }
    if let Some(parent) = parent {
      if let Some(p) = self.cells.get_mut(parent) {
        let slot = p
          .children()
          .and_then(|slots| slots.iter().position(|&c| c == Some(id)));
        if let Some(slot) = slot {
          p.clear_child(slot)?;
        }
      }
    }
    self.cells.remove(id);
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Validation
  // ---------------------------------------------------------------------

  /// Verify structural, reciprocity and classification invariants.
  ///
  /// Returns the first violation found as a contract error.
  pub fn check_topology(&self, volume_epsilon: f64) -> SimResult<()> {
    const CALLER: &str = "CellGraph::check_topology";
    let fail = |message: String| Err(SimError::contract(CALLER, message));
    let mut listed = 0usize;

    for (id, cell) in self.cells.iter() {
      if let Some(slots) = cell.children() {
        if slots.len() != D::CHILDREN {
          return fail(format!("{id:?} has {} child slots", slots.len()));
        }
        for &child in slots.iter().flatten() {
          let c = self.cell(child)?;
          if c.parent() != Some(id) || c.level() != cell.level() + 1 {
            return fail(format!("{child:?} is not a proper child of {id:?}"));
          }
          if (c.size() * 2.0 - cell.size()).abs() > 1e-12 * cell.size() {
            return fail(format!("{child:?} is not half the size of {id:?}"));
          }
        }
      }

      let (water, total) = (cell.fluid.water(), cell.fluid.total());
      if water < -volume_epsilon || water > total + volume_epsilon || total > 1.0 + volume_epsilon {
        return fail(format!("{id:?} violates 0 <= water {water} <= total {total} <= 1"));
      }

      for class in [
        LinkClass::Same,
        LinkClass::Coarser,
        LinkClass::Finer,
        LinkClass::Coarse,
      ] {
        for &link in cell.links().list(class) {
          listed += 1;
          let l = self.links.get(link)?;
          if l.cell() != id {
            return fail(format!("{link:?} listed on {id:?} but owned by {:?}", l.cell()));
          }
          let m = self.links.get(l.mirror())?;
          if m.mirror() != link || m.cell() != l.neighbor() || m.neighbor() != id {
            return fail(format!("{link:?} and its mirror are not reciprocal"));
          }
          if m.dim() != l.dim() || m.positive_direction() == l.positive_direction() {
            return fail(format!("{link:?} and its mirror disagree on direction"));
          }
          if m.face_area() != l.face_area()
            || m.distance_len() != l.distance_len()
            || m.distance() != -l.distance()
          {
            return fail(format!("{link:?} and its mirror disagree on geometry"));
          }
          if m.outflow_velocity() != -l.outflow_velocity()
            || m.water() != l.water()
            || m.total() != l.total()
          {
            return fail(format!("{link:?} and its mirror disagree on face state"));
          }
          let expected = self.class_for(l)?;
          if expected != class {
            return fail(format!("{link:?} in {class:?} list, expected {expected:?}"));
          }
          if !cell.is_leaf() && self.cell(l.neighbor())?.level() != cell.level() {
            return fail(format!("interior cell {id:?} links across levels"));
          }
        }
      }
    }

    if listed != self.links.len() {
      return fail(format!(
        "{} links stored but {listed} listed on cells",
        self.links.len()
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;
