//! Dimensionality of the simulation grid.
//!
//! The tree is a quadtree in 2D and an octree in 3D. Everything that depends
//! on the number of axes goes through [`Dimension`], so the same topology and
//! solver code is monomorphised for both.
//!
//! The last axis is vertical ("up"); the others form the horizontal footprint.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub, SubAssign};

use glam::{DVec2, DVec3};

/// Compile-time dimensionality marker.
pub trait Dimension: Copy + Clone + Debug + Default + Send + Sync + 'static {
  /// Number of spatial axes.
  const D: usize;

  /// Child slots per cell (2^D).
  const CHILDREN: usize = 1 << Self::D;

  /// Index of the vertical axis.
  const VERTICAL: usize = Self::D - 1;

  /// Position / velocity / momentum vector.
  type Vector: Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self::Vector>
    + AddAssign
    + Sub<Output = Self::Vector>
    + SubAssign
    + Neg<Output = Self::Vector>
    + Mul<f64, Output = Self::Vector>
    + Index<usize, Output = f64>
    + IndexMut<usize>;

  /// Vector with every component set to `value`.
  fn splat(value: f64) -> Self::Vector;

  /// Euclidean length.
  fn length(v: Self::Vector) -> f64;

  /// Dot product.
  fn dot(a: Self::Vector, b: Self::Vector) -> f64;

  /// Volume of a hypercube with side `size`.
  #[inline]
  fn cell_volume(size: f64) -> f64 {
    size.powi(Self::D as i32)
  }

  /// Measure of a face of a hypercube with side `size`
  /// (area in 3D, edge length in 2D).
  #[inline]
  fn face_measure(size: f64) -> f64 {
    size.powi(Self::D as i32 - 1)
  }

  /// Zero vector.
  #[inline]
  fn zero() -> Self::Vector {
    Self::splat(0.0)
  }

  /// Unit vector along `axis`.
  #[inline]
  fn axis(axis: usize) -> Self::Vector {
    let mut v = Self::zero();
    v[axis] = 1.0;
    v
  }
}

/// Two-dimensional grid (quadtree).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dim2;

/// Three-dimensional grid (octree).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dim3;

impl Dimension for Dim2 {
  const D: usize = 2;
  type Vector = DVec2;

  #[inline]
  fn splat(value: f64) -> DVec2 {
    DVec2::splat(value)
  }

  #[inline]
  fn length(v: DVec2) -> f64 {
    v.length()
  }

  #[inline]
  fn dot(a: DVec2, b: DVec2) -> f64 {
    a.dot(b)
  }
}

impl Dimension for Dim3 {
  const D: usize = 3;
  type Vector = DVec3;

  #[inline]
  fn splat(value: f64) -> DVec3 {
    DVec3::splat(value)
  }

  #[inline]
  fn length(v: DVec3) -> f64 {
    v.length()
  }

  #[inline]
  fn dot(a: DVec3, b: DVec3) -> f64 {
    a.dot(b)
  }
}
