//! One explicit evolve step over the leaves of a cell graph.
//!
//! ```text
//! center velocity ─▶ face coefficients ─▶ flux limiter ─▶ advect cells
//!                                                              │
//!  face velocities ◀── pressure ◀── residual momentum redistribution ◀┘
//! ```
//!
//! Only leaf-to-leaf links take part. Faces without a link (domain walls,
//! pruned void) are closed.

use super::advection::{face_alpha, limit_fluxes, resulting_volumes, CellBudget, FaceFlux, LimiterReport};
use super::config::SolverConfig;
use crate::constants::LIMITER_PASSES;
use crate::error::SimResult;
use crate::octree::{CellGraph, CellId, Dimension, LinkId, VolumeUpdate};
use crate::physics::PhysicsConstants;

/// Marks a cell slot that is not a leaf this step.
const NOT_A_LEAF: usize = usize::MAX;

/// Outcome of one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
  /// Peak outflow Courant number seen while building face fluxes.
  pub max_courant: f64,
  /// Flux limiter activity.
  pub limiter: LimiterReport,
  /// Cells per volume-update branch, in [`VolumeUpdate`] declaration order.
  pub updates: [usize; 4],
}

/// A flux-carrying face, seen from its donor.
struct ActiveFace<D: Dimension> {
  link: LinkId<D>,
  /// Momentum density on the face (donor velocity times face density).
  momentum: D::Vector,
  flux: FaceFlux,
}

/// Leaves of the step with a dense index per cell slot.
struct LeafIndex<D: Dimension> {
  leaves: Vec<CellId<D>>,
  dense: Vec<usize>,
}

impl<D: Dimension> LeafIndex<D> {
  fn build(graph: &CellGraph<D>) -> Self {
    let leaves = graph.leaf_ids();
    let mut dense = vec![NOT_A_LEAF; graph.cell_slots()];
    for (i, id) in leaves.iter().enumerate() {
      dense[id.index()] = i;
    }
    Self { leaves, dense }
  }

  #[inline]
  fn of(&self, id: CellId<D>) -> usize {
    self.dense.get(id.index()).copied().unwrap_or(NOT_A_LEAF)
  }
}

/// Advance every leaf of `graph` by `dt`.
pub(crate) fn advance<D: Dimension>(graph: &mut CellGraph<D>, config: &SolverConfig, dt: f64) -> SimResult<StepReport> {
  let index = LeafIndex::build(graph);
  let mut report = StepReport::default();

  {
    let _span = tracing::info_span!("center_velocity").entered();
    update_center_velocities(graph, &index, config)?;
  }

  let mut faces = {
    let _span = tracing::info_span!("face_coefficients").entered();
    build_faces(graph, &index, config, dt, &mut report.max_courant)?
  };

  let budgets = {
    let _span = tracing::info_span!("flux_limiter").entered();
    let budgets = cell_budgets(graph, &index)?;
    let mut fluxes: Vec<FaceFlux> = faces.iter().map(|f| f.flux).collect();
    report.limiter = limit_fluxes(&budgets, &mut fluxes, LIMITER_PASSES, config.volume_epsilon);
    for (face, flux) in faces.iter_mut().zip(fluxes) {
      face.flux = flux;
    }
    if report.limiter.fallback_faces > 0 {
      tracing::warn!(faces = report.limiter.fallback_faces, "flux limiter fell back to zeroing faces");
    }
    budgets
  };

  {
    let _span = tracing::info_span!("advect").entered();
    report.updates = advect_cells(graph, &index, &faces, &budgets, config)?;
  }

  {
    let _span = tracing::info_span!("redistribute_momentum").entered();
    redistribute_residuals(graph, &index, &config.physics)?;
  }

  {
    let _span = tracing::info_span!("pressure").entered();
    update_pressures(graph, &index, config, dt)?;
  }

  {
    let _span = tracing::info_span!("face_velocity").entered();
    update_face_velocities(graph, &index, &config.physics, dt)?;
  }

  Ok(report)
}

/// Cell-center velocity per axis: face velocities weighted by face area
/// times the summed densities on both sides. Axes without any leaf face keep
/// their previous value.
fn update_center_velocities<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  config: &SolverConfig,
) -> SimResult<()> {
  let physics = &config.physics;
  let mut resolved = Vec::with_capacity(index.leaves.len());
  for &id in &index.leaves {
    let cell = graph.cell(id)?;
    if !cell.fluid.has_fluid(config.volume_epsilon) {
      continue;
    }
    let own = cell.fluid.density(physics);
    let mut weighted = D::zero();
    let mut weights = D::zero();
    for link_id in cell.leaf_neighbors() {
      let link = graph.link(link_id)?;
      let other = graph.cell(link.neighbor())?.fluid.density(physics);
      let w = link.face_area() * (own + other);
      weighted[link.dim()] += w * link.axis_velocity();
      weights[link.dim()] += w;
    }
    let mut velocity = cell.fluid.velocity.get_or(D::zero());
    for axis in 0..D::D {
      if weights[axis] > 0.0 {
        velocity[axis] = weighted[axis] / weights[axis];
      }
    }
    resolved.push((id, velocity));
  }
  for (id, velocity) in resolved {
    graph.cell_mut(id)?.fluid.velocity.set(velocity);
  }
  Ok(())
}

/// Area-weighted water fraction of the donor's neighbors behind the face.
fn upwind_alpha<D: Dimension>(
  graph: &CellGraph<D>,
  donor: CellId<D>,
  dim: usize,
  positive: bool,
  eps: f64,
) -> SimResult<Option<f64>> {
  let mut sum = 0.0;
  let mut area = 0.0;
  for link_id in graph.cell(donor)?.leaf_neighbors() {
    let link = graph.link(link_id)?;
    if link.dim() != dim || link.positive_direction() == positive {
      continue;
    }
    let upstream = &graph.cell(link.neighbor())?.fluid;
    sum += link.face_area() * upstream.alpha(eps);
    area += link.face_area();
  }
  Ok((area > 0.0).then(|| sum / area))
}

/// Face volume coefficients and unlimited fluxes for every outflowing face.
fn build_faces<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  config: &SolverConfig,
  dt: f64,
  max_courant: &mut f64,
) -> SimResult<Vec<ActiveFace<D>>> {
  let eps = config.volume_epsilon;
  let mut faces = Vec::new();
  let mut coefficients = Vec::new();
  for (donor_index, &donor) in index.leaves.iter().enumerate() {
    let cell = graph.cell(donor)?;
    if !cell.fluid.has_fluid(eps) {
      continue;
    }
    let volume = cell.volume();
    let donor_velocity = cell.fluid.velocity.get_or(D::zero());
    let (alpha_d, face_total) = (cell.fluid.alpha(eps), cell.fluid.total());
    for link_id in cell.leaf_neighbors() {
      let link = graph.link(link_id)?;
      let velocity = link.outflow_velocity();
      if velocity <= 0.0 {
        continue;
      }
      let acceptor = link.neighbor();
      let acceptor_index = index.of(acceptor);
      if acceptor_index == NOT_A_LEAF {
        continue;
      }
      let swept = velocity * dt * link.face_area();
      let courant = swept / volume;
      *max_courant = max_courant.max(courant);

      let alpha_u = upwind_alpha(graph, donor, link.dim(), link.positive_direction(), eps)?;
      let alpha_a = graph.cell(acceptor)?.fluid.alpha(eps);
      let alpha_f = face_alpha(config.advection, alpha_u, alpha_d, alpha_a, courant);
      let face_water = alpha_f * face_total;
      let density = config.physics.density(face_water, face_total);

      coefficients.push((link_id, face_water, face_total));
      faces.push(ActiveFace {
        link: link_id,
        momentum: donor_velocity * density,
        flux: FaceFlux::new(donor_index, acceptor_index, swept * face_total, swept * face_water),
      });
    }
  }
  let links = graph.links_mut();
  for (link_id, water, total) in coefficients {
    links.set_volume_coefficients(link_id, water, total)?;
  }
  for face in &faces {
    links.set_momentum(face.link, face.momentum)?;
  }
  Ok(faces)
}

fn cell_budgets<D: Dimension>(graph: &CellGraph<D>, index: &LeafIndex<D>) -> SimResult<Vec<CellBudget>> {
  index
    .leaves
    .iter()
    .map(|&id| {
      let cell = graph.cell(id)?;
      let volume = cell.volume();
      Ok(CellBudget {
        water: cell.fluid.water() * volume,
        total: cell.fluid.total() * volume,
        capacity: volume,
      })
    })
    .collect()
}

/// Apply limited fluxes, then store what momentum the new mass cannot carry
/// at the old center velocity.
fn advect_cells<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  faces: &[ActiveFace<D>],
  budgets: &[CellBudget],
  config: &SolverConfig,
) -> SimResult<[usize; 4]> {
  let physics = &config.physics;
  let eps = config.volume_epsilon;
  let fluxes: Vec<FaceFlux> = faces.iter().map(|f| f.flux).collect();
  let volumes = resulting_volumes(budgets, &fluxes);

  let mut old_velocity = Vec::with_capacity(index.leaves.len());
  let mut momentum = Vec::with_capacity(index.leaves.len());
  for &id in &index.leaves {
    let fluid = &graph.cell(id)?.fluid;
    let u = if fluid.has_fluid(eps) {
      fluid.velocity.get("FluidSolver::advect")?
    } else {
      D::zero()
    };
    let mass = fluid.density(physics) * graph.cell(id)?.volume();
    old_velocity.push(u);
    momentum.push(u * mass);
  }
  for face in faces {
    let moved = physics.density(face.flux.limited_water(), face.flux.limited_total());
    let carried = old_velocity[face.flux.donor] * moved;
    momentum[face.flux.donor] -= carried;
    momentum[face.flux.acceptor] += carried;
  }

  let mut updates = [0usize; 4];
  for (i, &id) in index.leaves.iter().enumerate() {
    let cell = graph.cell_mut(id)?;
    let capacity = budgets[i].capacity;
    let update = cell
      .fluid
      .apply_volume_update(volumes[i].water / capacity, volumes[i].total / capacity, eps);
    updates[match update {
      VolumeUpdate::NoFluidLeft => 0,
      VolumeUpdate::OkayToDecreaseWater => 1,
      VolumeUpdate::OkayToIncreaseWater => 2,
      VolumeUpdate::General => 3,
    }] += 1;
    let mass = cell.fluid.density(physics) * capacity;
    cell.fluid.residual_momentum = momentum[i] - old_velocity[i] * mass;
  }
  Ok(updates)
}

/// Hand residual momentum to each cell's outflow faces, per axis.
///
/// Every outflow face on an axis gets the same velocity increment, so the
/// momentum it carries is proportional to its share of the outflow area.
/// Residuals on axes with no outflow are dropped.
fn redistribute_residuals<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  physics: &PhysicsConstants,
) -> SimResult<()> {
  let mut kicks: Vec<(LinkId<D>, f64)> = Vec::new();
  for &id in &index.leaves {
    let cell = graph.cell(id)?;
    let residual = cell.fluid.residual_momentum;
    if residual == D::zero() {
      continue;
    }
    let density = cell.fluid.density(physics);
    if PhysicsConstants::is_void(density) {
      continue;
    }
    let mass = density * cell.volume();
    for link_id in cell.leaf_neighbors() {
      let link = graph.link(link_id)?;
      if link.outflow_velocity() > 0.0 {
        kicks.push((link_id, link.sign() * residual[link.dim()] / mass));
      }
    }
  }
  for (link_id, kick) in kicks {
    let velocity = graph.link(link_id)?.outflow_velocity() + kick;
    graph.links_mut().set_outflow_velocity(link_id, velocity)?;
  }
  for &id in &index.leaves {
    graph.cell_mut(id)?.fluid.residual_momentum = D::zero();
  }
  Ok(())
}

/// Center pressure of every leaf.
///
/// Leaves are visited top down so the pressure at a cell's top is the
/// area-weighted bottom pressure of the leaves resting on it. Domain-top
/// cells start from zero.
fn update_pressures<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  config: &SolverConfig,
  dt: f64,
) -> SimResult<()> {
  let physics = &config.physics;
  let mut tops = Vec::with_capacity(index.leaves.len());
  for &id in &index.leaves {
    let cell = graph.cell(id)?;
    tops.push(cell.corner()[D::VERTICAL] + cell.size());
  }
  let mut order: Vec<usize> = (0..index.leaves.len()).collect();
  order.sort_by(|&a, &b| tops[b].total_cmp(&tops[a]));

  let mut bottom = vec![0.0; index.leaves.len()];
  let mut pressure = vec![0.0; index.leaves.len()];
  for i in order {
    let cell = graph.cell(index.leaves[i])?;
    let (mut weighted, mut area) = (0.0, 0.0);
    let mut inflow = 0.0;
    for link_id in cell.leaf_neighbors() {
      let link = graph.link(link_id)?;
      let neighbor = &graph.cell(link.neighbor())?.fluid;
      let velocity = link.outflow_velocity();
      let donor_total = if velocity > 0.0 { cell.fluid.total() } else { neighbor.total() };
      inflow -= velocity * dt * link.face_area() * donor_total;

      if link.dim() != D::VERTICAL || !link.positive_direction() {
        continue;
      }
      let above = index.of(link.neighbor());
      if above == NOT_A_LEAF {
        continue;
      }
      weighted += link.face_area() * bottom[above];
      area += link.face_area();
    }
    let top = if area > 0.0 { weighted / area } else { 0.0 };
    let (size, total) = (cell.size(), cell.fluid.total());
    let density = cell.fluid.density(physics);
    bottom[i] = top + physics.hydrostatic_increment(density, size);

    let overfill = total + inflow / cell.volume() - 1.0;
    pressure[i] = top
      + physics.hydrostatic_increment(density, 0.5 * size)
      + physics.pressure(total)
      + PhysicsConstants::continuity_pressure(density, size, overfill, dt, 2 * D::D);
  }
  for (i, &id) in index.leaves.iter().enumerate() {
    graph.cell_mut(id)?.fluid.pressure = pressure[i];
  }
  Ok(())
}

/// Pressure and gravity update of every leaf face, once per link pair.
fn update_face_velocities<D: Dimension>(
  graph: &mut CellGraph<D>,
  index: &LeafIndex<D>,
  physics: &PhysicsConstants,
  dt: f64,
) -> SimResult<()> {
  let mut positive = Vec::new();
  for &id in &index.leaves {
    for link_id in graph.cell(id)?.leaf_neighbors() {
      if graph.link(link_id)?.positive_direction() {
        positive.push(link_id);
      }
    }
  }
  for link_id in positive {
    graph.update_velocity(link_id, dt, physics)?;
  }
  Ok(())
}

#[cfg(test)]
#[path = "step_test.rs"]
mod step_test;
