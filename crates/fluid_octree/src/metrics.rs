//! Solver statistics.
//!
//! Feature-gated and runtime-toggled so recording costs nothing when
//! disabled.
//!
//! # Usage
//!
//! ```ignore
//! use fluid_octree::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics (on by default)
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let metrics = solver.metrics();
//! println!("{:.1} us/step", metrics.avg_step_us());
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// Levels tracked individually; deeper leaves are counted in the last slot.
pub const TRACKED_LEVELS: usize = 16;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// True when metrics are compiled in and switched on.
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-capacity history of recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  /// Empty window holding at most `capacity` values.
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a value, evicting the oldest at capacity.
  pub fn push(&mut self, value: T) {
    if self.capacity == 0 {
      return;
    }
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  /// Number of values held.
  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  /// True when empty.
  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  /// Drop every value.
  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Oldest to newest.
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  /// Most recent value.
  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl<T: Copy + Default + std::ops::Add<Output = T>> RollingWindow<T> {
  /// Sum of all values.
  pub fn sum(&self) -> T {
    self.buffer.iter().copied().fold(T::default(), |acc, x| acc + x)
  }
}

impl RollingWindow<u64> {
  /// Mean of all values (0 when empty).
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  /// Smallest and largest value.
  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

impl RollingWindow<f64> {
  /// Largest value (0 when empty).
  pub fn peak(&self) -> f64 {
    self.buffer.iter().copied().fold(0.0, f64::max)
  }
}

/// Per-run solver statistics.
#[derive(Debug, Clone)]
pub struct SolverMetrics {
  /// Wall time of recent evolve steps in microseconds.
  pub step_timings: RollingWindow<u64>,
  /// Recent timesteps (s).
  pub time_steps: RollingWindow<f64>,
  /// Recent peak Courant numbers.
  pub courant_history: RollingWindow<f64>,
  /// Leaves at each level as of the last sample (index = level).
  pub leaves_per_level: [u32; TRACKED_LEVELS],
  /// Steps recorded since the last reset.
  pub total_steps: u64,
  /// Faces the flux limiter scaled down, cumulative.
  pub limited_faces: u64,
  /// Faces the fallback pass zeroed, cumulative.
  pub fallback_faces: u64,
  /// Checkpoints fired.
  pub checkpoints: u64,
}

impl Default for SolverMetrics {
  fn default() -> Self {
    Self {
      step_timings: RollingWindow::new(128),
      time_steps: RollingWindow::new(128),
      courant_history: RollingWindow::new(128),
      leaves_per_level: [0; TRACKED_LEVELS],
      total_steps: 0,
      limited_faces: 0,
      fallback_faces: 0,
      checkpoints: 0,
    }
  }
}

impl SolverMetrics {
  /// Empty metrics.
  pub fn new() -> Self {
    Self::default()
  }

  /// Clear histories and counters.
  pub fn reset(&mut self) {
    *self = Self::default();
  }

  /// Record one evolve step.
  pub fn record_step(&mut self, timing_us: u64, time_step: f64, courant: f64) {
    if !is_enabled() {
      return;
    }
    self.step_timings.push(timing_us);
    self.time_steps.push(time_step);
    self.courant_history.push(courant);
    self.total_steps += 1;
  }

  /// Record limiter activity for one step.
  pub fn record_limiter(&mut self, limited_faces: usize, fallback_faces: usize) {
    if !is_enabled() {
      return;
    }
    self.limited_faces += limited_faces as u64;
    self.fallback_faces += fallback_faces as u64;
  }

  /// Record a fired checkpoint.
  pub fn record_checkpoint(&mut self) {
    if is_enabled() {
      self.checkpoints += 1;
    }
  }

  /// Replace the level histogram from per-level leaf counts.
  pub fn record_leaves(&mut self, per_level: &[usize]) {
    if !is_enabled() {
      return;
    }
    self.leaves_per_level.fill(0);
    for (level, &count) in per_level.iter().enumerate() {
      let slot = level.min(TRACKED_LEVELS - 1);
      self.leaves_per_level[slot] += count as u32;
    }
  }

  /// Leaves across all levels.
  pub fn total_leaves(&self) -> u32 {
    self.leaves_per_level.iter().sum()
  }

  /// Mean step wall time in microseconds.
  pub fn avg_step_us(&self) -> f64 {
    self.step_timings.average()
  }

  /// Highest recent Courant number.
  pub fn peak_courant(&self) -> f64 {
    self.courant_history.peak()
  }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
  use super::*;

  #[test]
  fn test_rolling_window() {
    let mut window = RollingWindow::new(3);
    assert!(window.is_empty());

    window.push(10u64);
    window.push(20);
    window.push(30);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 60);
    assert_eq!(window.average(), 20.0);

    // Oldest is evicted
    window.push(40);
    assert_eq!(window.len(), 3);
    assert_eq!(window.sum(), 90);
    assert_eq!(window.min_max(), Some((20, 40)));
    assert_eq!(window.last(), Some(&40));
  }

  #[test]
  fn test_zero_capacity_window() {
    let mut window = RollingWindow::new(0);
    window.push(1u64);
    assert!(window.is_empty());
    assert_eq!(window.min_max(), None);
  }

  #[test]
  fn test_record_step() {
    let mut metrics = SolverMetrics::new();
    metrics.record_step(100, 1e-3, 0.4);
    metrics.record_step(300, 2e-3, 0.9);

    assert_eq!(metrics.total_steps, 2);
    assert_eq!(metrics.avg_step_us(), 200.0);
    assert_eq!(metrics.peak_courant(), 0.9);
    assert_eq!(metrics.time_steps.last(), Some(&2e-3));
  }

  /// Levels past the tracked range collapse into the last slot.
  #[test]
  fn test_record_leaves() {
    let mut metrics = SolverMetrics::new();
    let mut per_level = vec![0; 20];
    per_level[2] = 5;
    per_level[18] = 3;
    metrics.record_leaves(&per_level);

    assert_eq!(metrics.leaves_per_level[2], 5);
    assert_eq!(metrics.leaves_per_level[TRACKED_LEVELS - 1], 3);
    assert_eq!(metrics.total_leaves(), 8);
  }

  #[test]
  fn test_reset() {
    let mut metrics = SolverMetrics::new();
    metrics.record_limiter(4, 1);
    metrics.record_checkpoint();
    metrics.reset();
    assert_eq!(metrics.limited_faces, 0);
    assert_eq!(metrics.checkpoints, 0);
  }
}
