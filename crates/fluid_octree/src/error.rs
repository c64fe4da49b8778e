//! Error types for the octree and solver.
//!
//! All three kinds are fatal: they signal a broken invariant in the caller,
//! never a condition the core tries to recover from.

use thiserror::Error;

/// Result alias used by every fallible operation in this crate.
pub type SimResult<T> = Result<T, SimError>;

/// Error raised by octree topology or solver operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
  /// An operation was invoked in a state that forbids it
  /// (refining a non-leaf, reading time with no water defined, ...).
  #[error("{caller}: contract violation: {message}")]
  Contract {
    /// Operation that detected the violation.
    caller: &'static str,
    /// What went wrong.
    message: String,
  },

  /// An index or handle was out of range (or stale).
  #[error("{caller}: index {index} out of range 0..{len}")]
  Range {
    /// Operation that detected the violation.
    caller: &'static str,
    /// Offending index.
    index: usize,
    /// Upper bound that was exceeded.
    len: usize,
  },

  /// Division or normalization by zero, NaN input.
  #[error("{caller}: numeric domain error: {message}")]
  Domain {
    /// Operation that detected the violation.
    caller: &'static str,
    /// What went wrong.
    message: String,
  },
}

impl SimError {
  /// Build a contract violation.
  pub fn contract(caller: &'static str, message: impl Into<String>) -> Self {
    Self::Contract {
      caller,
      message: message.into(),
    }
  }

  /// Build a range violation.
  pub fn range(caller: &'static str, index: usize, len: usize) -> Self {
    Self::Range { caller, index, len }
  }

  /// Build a numeric domain violation.
  pub fn domain(caller: &'static str, message: impl Into<String>) -> Self {
    Self::Domain {
      caller,
      message: message.into(),
    }
  }

  /// Name of the operation that raised the error.
  pub fn caller(&self) -> &'static str {
    match self {
      Self::Contract { caller, .. } | Self::Range { caller, .. } | Self::Domain { caller, .. } => {
        caller
      }
    }
  }

  /// Human-readable description without the caller prefix.
  pub fn description(&self) -> String {
    match self {
      Self::Contract { message, .. } => format!("contract violation: {message}"),
      Self::Range { index, len, .. } => format!("index {index} out of range 0..{len}"),
      Self::Domain { message, .. } => format!("numeric domain error: {message}"),
    }
  }

  /// Every error kind is fatal for the host application.
  pub fn should_terminate(&self) -> bool {
    true
  }
}
