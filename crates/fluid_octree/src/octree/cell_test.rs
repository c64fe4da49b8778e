use super::*;
use crate::octree::arena::Arena;
use crate::octree::dimension::{Dim2, Dim3};
use crate::octree::link::{LinkGeometry, LinkStore};
use glam::{DVec2, DVec3};

const EPS: f64 = 4e-16;

fn fluid(water: f64, total: f64) -> FluidState<Dim2> {
  let mut f = FluidState::default();
  f.set_volume_coefficients(water, total).unwrap();
  f
}

// =========================================================================
// Geometry
// =========================================================================

#[test]
fn test_center_and_volume() {
  let cell = SpatialCell::<Dim3>::new(DVec3::new(1.0, 2.0, 3.0), 0.5, 1, None);
  assert_eq!(cell.center(), DVec3::new(1.25, 2.25, 3.25));
  assert_eq!(cell.volume(), 0.125);

  let square = SpatialCell::<Dim2>::new(DVec2::ZERO, 0.5, 1, None);
  assert_eq!(square.volume(), 0.25);
}

/// Leaves have no child array; asking for a child is a contract violation.
#[test]
fn test_child_on_leaf_rejected() {
  let cell = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  assert!(cell.is_leaf());
  assert!(cell.children().is_none());
  assert!(matches!(cell.child(0), Err(SimError::Contract { .. })));
}

/// Child indices beyond 2^D are range violations.
#[test]
fn test_child_index_out_of_range() {
  let mut cell = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  cell.set_children(Some(SmallVec::from_elem(None, Dim2::CHILDREN)));

  assert_eq!(cell.child(3), Ok(None));
  assert!(matches!(
    cell.child(4),
    Err(SimError::Range { index: 4, len: 4, .. })
  ));
  assert!(cell.clear_child(7).is_err());
}

/// Face sharing needs contact along the axis and overlap on the others.
#[test]
fn test_shares_face_with() {
  let a = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  let right = SpatialCell::<Dim2>::new(DVec2::new(1.0, 0.5), 0.5, 1, None);
  let corner = SpatialCell::<Dim2>::new(DVec2::new(1.0, 1.0), 0.5, 1, None);

  assert!(a.shares_face_with(&right, 0));
  assert!(right.shares_face_with(&a, 0));
  assert!(!a.shares_face_with(&right, 1));
  assert!(!a.shares_face_with(&corner, 0), "Corner contact is not a face");
}

// =========================================================================
// Neighbor lists
// =========================================================================

#[test]
fn test_link_class_for_levels() {
  assert_eq!(LinkClass::for_levels(2, 2), LinkClass::Same);
  assert_eq!(LinkClass::for_levels(2, 1), LinkClass::Coarser);
  assert_eq!(LinkClass::for_levels(2, 3), LinkClass::Finer);
}

#[test]
fn test_link_lists_attach_detach() {
  let a = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  let b = SpatialCell::<Dim2>::new(DVec2::X, 1.0, 0, None);
  let geometry = LinkGeometry::between(&a, &b).unwrap();
  let mut cells = Arena::new();
  let (ia, ib) = (cells.insert(a), cells.insert(b));
  let mut store = LinkStore::<Dim2>::new();
  let ids: Vec<LinkId<Dim2>> = (0..3)
    .map(|_| store.insert_pair(ia, ib, 0, true, 0, geometry).0)
    .collect();

  let mut lists = LinkLists::<Dim2>::default();
  lists.attach(LinkClass::Same, ids[0]);
  lists.attach(LinkClass::Finer, ids[1]);
  lists.attach(LinkClass::Coarse, ids[2]);

  assert_eq!(lists.leaf_len(), 2);
  assert_eq!(lists.len(), 3);
  assert_eq!(lists.class_of(ids[1]), Some(LinkClass::Finer));
  assert_eq!(lists.coarse_links(), vec![ids[2]]);

  assert_eq!(lists.detach(ids[1]), Some(LinkClass::Finer));
  assert_eq!(lists.detach(ids[1]), None);
  assert_eq!(lists.leaf_links(), vec![ids[0]]);
}

/// The leaf traversal covers the three leaf lists, the full traversal adds
/// the coarse list.
#[test]
fn test_leaf_and_all_neighbors() {
  let a = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  let b = SpatialCell::<Dim2>::new(DVec2::X, 1.0, 0, None);
  let geometry = LinkGeometry::between(&a, &b).unwrap();
  let mut cells = Arena::new();
  let (ia, ib) = (cells.insert(a), cells.insert(b));
  let mut store = LinkStore::<Dim2>::new();
  let ids: Vec<LinkId<Dim2>> = (0..4)
    .map(|_| store.insert_pair(ia, ib, 0, true, 0, geometry).0)
    .collect();

  let mut cell = SpatialCell::<Dim2>::new(DVec2::ZERO, 1.0, 0, None);
  let classes = [
    LinkClass::Same,
    LinkClass::Coarser,
    LinkClass::Finer,
    LinkClass::Coarse,
  ];
  for (class, &id) in classes.into_iter().zip(&ids) {
    cell.links.attach(class, id);
  }

  let mut leaf: Vec<_> = cell.leaf_neighbors().collect();
  leaf.sort_by_key(|id| id.index());
  assert_eq!(leaf, ids[..3]);

  let mut all: Vec<_> = cell.all_neighbors().collect();
  all.sort_by_key(|id| id.index());
  assert_eq!(all, ids);
}

// =========================================================================
// Fluid state
// =========================================================================

#[test]
fn test_alpha_and_has_fluid() {
  assert_eq!(fluid(0.25, 0.5).alpha(EPS), 0.5);
  assert_eq!(fluid(0.0, 0.0).alpha(EPS), 0.0);
  assert!(!fluid(0.0, 0.0).has_fluid(EPS));
  assert!(fluid(0.0, 0.1).has_fluid(EPS));
}

/// NaN, negatives and water above total are contract violations.
#[test]
fn test_set_volume_coefficients_validates() {
  let mut f = FluidState::<Dim2>::default();
  assert!(f.set_volume_coefficients(f64::NAN, 1.0).is_err());
  assert!(f.set_volume_coefficients(0.1, -0.5).is_err());
  assert!(f.set_volume_coefficients(0.6, 0.5).is_err());
  assert_eq!((f.water(), f.total()), (0.0, 0.0));
}

/// Velocity reads before the first assignment fail.
#[test]
fn test_velocity_unset_until_assigned() {
  let mut f = FluidState::<Dim2>::default();
  assert!(f.velocity.get("FluidState::velocity").is_err());
  f.velocity.set(DVec2::new(0.0, -1.0));
  assert_eq!(f.velocity.get("FluidState::velocity"), Ok(DVec2::new(0.0, -1.0)));
}

// =========================================================================
// Volume update branch table
// =========================================================================

#[test]
fn test_volume_update_no_fluid_left() {
  let mut f = fluid(0.5, 0.5);
  assert_eq!(f.apply_volume_update(1e-17, 1e-17, EPS), VolumeUpdate::NoFluidLeft);
  assert_eq!((f.water(), f.total()), (0.0, 0.0));
}

/// Water within the relative band of total collapses onto total.
#[test]
fn test_volume_update_decrease_water() {
  let mut f = fluid(0.5, 0.5);
  let total = 0.8;
  let water = total * (1.0 + 1e-17);
  assert_eq!(
    f.apply_volume_update(water, total, EPS),
    VolumeUpdate::OkayToDecreaseWater
  );
  assert_eq!((f.water(), f.total()), (0.8, 0.8));
}

/// Water at zero keeps only the total.
#[test]
fn test_volume_update_increase_water() {
  let mut f = fluid(0.0, 0.5);
  assert_eq!(
    f.apply_volume_update(-1e-17, 0.7, EPS),
    VolumeUpdate::OkayToIncreaseWater
  );
  assert_eq!((f.water(), f.total()), (0.0, 0.7));
}

/// Overfull totals are clamped to one, water to the clamped total.
#[test]
fn test_volume_update_general_clamps() {
  let mut f = fluid(0.2, 0.5);
  assert_eq!(f.apply_volume_update(0.4, 0.6, EPS), VolumeUpdate::General);
  assert_eq!((f.water(), f.total()), (0.4, 0.6));

  assert_eq!(f.apply_volume_update(0.9, 1.2, EPS), VolumeUpdate::General);
  assert_eq!((f.water(), f.total()), (0.9, 1.0));
}
