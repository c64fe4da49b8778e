//! Run-loop control shared between the solver and its host.
//!
//! The run loop polls a [`ControlHandle`]; the host (typically from inside
//! its [`EventPump`]) flips the flags. All flags are atomics behind an `Arc`,
//! so clones of the handle can be moved to other threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of a [`FluidSolver`](super::FluidSolver).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SolverState {
  /// No water defined.
  #[default]
  Uninitialized,
  /// Water defined, no run in progress.
  Ready,
  /// Inside `run_simulation`.
  Running,
  /// Time advancement frozen.
  Paused,
}

/// Why `run_simulation` returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunResult {
  /// Reserved for a run that reaches its own end condition.
  Finished,
  /// Paused with `break_loop` set.
  Paused,
  /// Abort requested.
  Aborted,
}

#[derive(Debug, Default)]
struct ControlFlags {
  paused: AtomicBool,
  break_on_pause: AtomicBool,
  abort: AtomicBool,
  operating: AtomicBool,
}

/// Cloneable handle to the run-loop flags.
#[derive(Clone, Debug, Default)]
pub struct ControlHandle {
  flags: Arc<ControlFlags>,
}

impl ControlHandle {
  /// Fresh handle with every flag cleared.
  pub fn new() -> Self {
    Self::default()
  }

  /// Freeze time advancement. With `break_loop` the run loop returns
  /// [`RunResult::Paused`]; otherwise it keeps polling events.
  pub fn pause(&self, break_loop: bool) {
    self.flags.break_on_pause.store(break_loop, Ordering::SeqCst);
    self.flags.paused.store(true, Ordering::SeqCst);
  }

  /// Resume time advancement.
  pub fn resume(&self) {
    self.flags.paused.store(false, Ordering::SeqCst);
    self.flags.break_on_pause.store(false, Ordering::SeqCst);
  }

  /// Ask the run loop to return [`RunResult::Aborted`].
  pub fn abort(&self) {
    self.flags.abort.store(true, Ordering::SeqCst);
  }

  /// True while paused.
  #[inline]
  pub fn is_paused(&self) -> bool {
    self.flags.paused.load(Ordering::SeqCst)
  }

  /// True when the pause should end the run loop.
  #[inline]
  pub fn breaks_on_pause(&self) -> bool {
    self.flags.break_on_pause.load(Ordering::SeqCst)
  }

  /// True when an abort is pending.
  #[inline]
  pub fn abort_requested(&self) -> bool {
    self.flags.abort.load(Ordering::SeqCst)
  }

  /// Consume a pending abort.
  pub(crate) fn take_abort(&self) -> bool {
    self.flags.abort.swap(false, Ordering::SeqCst)
  }

  /// True while an evolve step or run loop is executing.
  #[inline]
  pub fn is_operating(&self) -> bool {
    self.flags.operating.load(Ordering::SeqCst)
  }

  /// Claim the operation slot, or `None` when another operation holds it.
  pub(crate) fn try_begin(&self) -> Option<OperationGuard> {
    self
      .flags
      .operating
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .ok()
      .map(|_| OperationGuard {
        flags: Arc::clone(&self.flags),
      })
  }
}

/// Holds the operation slot; released on drop.
#[derive(Debug)]
pub(crate) struct OperationGuard {
  flags: Arc<ControlFlags>,
}

impl Drop for OperationGuard {
  fn drop(&mut self) {
    self.flags.operating.store(false, Ordering::SeqCst);
  }
}

/// Snapshot handed to the event pump.
#[derive(Clone, Debug)]
pub struct EventContext {
  /// Simulated time (s).
  pub time: f64,
  /// Steps taken since water was defined.
  pub step: u64,
  /// Current timestep (s).
  pub time_step: f64,
  /// Peak Courant number of the last step.
  pub courant: f64,
  /// Solver lifecycle state.
  pub state: SolverState,
  /// Flags for pausing, resuming and aborting.
  pub control: ControlHandle,
}

/// Host hook polled from the run loop.
pub trait EventPump {
  /// Process pending host events. Control the run through `ctx.control`.
  fn process_events(&mut self, ctx: &EventContext);
}

impl<F: FnMut(&EventContext)> EventPump for F {
  fn process_events(&mut self, ctx: &EventContext) {
    self(ctx)
  }
}

/// Pump that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEvents;

impl EventPump for NoEvents {
  fn process_events(&mut self, _ctx: &EventContext) {}
}
