//! Scalar wrapper that must be assigned before it is read.

use crate::error::{SimError, SimResult};

/// A value that starts out unset; reading it before the first assignment is a
/// contract violation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Checked<T> {
  /// Never assigned.
  #[default]
  Unset,
  /// Assigned value.
  Set(T),
}

impl<T: Copy> Checked<T> {
  /// Read the value, failing when it was never assigned.
  #[inline]
  pub fn get(&self, caller: &'static str) -> SimResult<T> {
    match self {
      Self::Set(value) => Ok(*value),
      Self::Unset => Err(SimError::contract(caller, "value read before initialization")),
    }
  }

  /// Read the value or fall back to `default` when unset.
  #[inline]
  pub fn get_or(&self, default: T) -> T {
    match self {
      Self::Set(value) => *value,
      Self::Unset => default,
    }
  }

  /// Assign a value.
  #[inline]
  pub fn set(&mut self, value: T) {
    *self = Self::Set(value);
  }

  /// True once assigned.
  #[inline]
  pub fn is_set(&self) -> bool {
    matches!(self, Self::Set(_))
  }
}
