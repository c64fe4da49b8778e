//! FluidSolver - time integration and run-loop control over an [`Octree`].
//!
//! # Lifecycle
//!
//! ```text
//!                define_water              run_simulation
//! Uninitialized ─────────────▶ Ready ◀──────────────────▶ Running
//!       ▲                      │  ▲   abort / pause(false)    │
//!       └──── undefine_water ──┘  │                           │ pause(true)
//!                                 └── continue_simulation ── Paused
//! ```
//!
//! Each evolve step adapts the timestep so the peak face Courant number
//! approaches the configured target, snaps the last step before a checkpoint
//! onto the checkpoint time, and fires the checkpoint callback there.
//!
//! # Module Structure
//!
//! - [`config`]: `SolverConfig`, `AdvectionScheme`
//! - [`control`]: `ControlHandle`, `EventPump`, `RunResult`, `SolverState`
//! - [`advection`]: face reconstruction schemes and the flux limiter
//! - `step`: the evolve phases

pub mod advection;
pub mod config;
pub mod control;
mod step;

pub use advection::LimiterReport;
pub use config::{AdvectionScheme, SolverConfig};
pub use control::{ControlHandle, EventContext, EventPump, NoEvents, RunResult, SolverState};
pub use step::StepReport;

use web_time::Instant;

use crate::error::{SimError, SimResult};
use crate::metrics::{self, SolverMetrics};
use crate::octree::{Dimension, Octree};

/// Snapshot handed to the checkpoint callback.
pub struct Checkpoint<'a, D: Dimension> {
  /// Checkpoint time (s).
  pub time: f64,
  /// Steps taken since water was defined.
  pub step: u64,
  /// Current water state.
  pub octree: &'a Octree<D>,
}

type CheckpointCallback<D> = Box<dyn for<'a> FnMut(&Checkpoint<'a, D>)>;

/// Explicit free-surface solver.
pub struct FluidSolver<D: Dimension> {
  config: SolverConfig,
  octree: Option<Octree<D>>,
  time: f64,
  time_step: f64,
  max_time_step: f64,
  checkpoint_interval: f64,
  next_checkpoint: Option<f64>,
  step_count: u64,
  last_courant: f64,
  last_report: StepReport,
  state: SolverState,
  control: ControlHandle,
  pump: Box<dyn EventPump>,
  on_checkpoint: Option<CheckpointCallback<D>>,
  metrics: SolverMetrics,
}

impl<D: Dimension> FluidSolver<D> {
  /// Solver with no water defined.
  pub fn new(config: SolverConfig) -> SimResult<Self> {
    config.validate()?;
    Ok(Self {
      config,
      octree: None,
      time: 0.0,
      time_step: config.max_time_step,
      max_time_step: config.max_time_step,
      checkpoint_interval: 0.0,
      next_checkpoint: None,
      step_count: 0,
      last_courant: 0.0,
      last_report: StepReport::default(),
      state: SolverState::Uninitialized,
      control: ControlHandle::new(),
      pump: Box::new(NoEvents),
      on_checkpoint: None,
      metrics: SolverMetrics::new(),
    })
  }

  // ---------------------------------------------------------------------
  // Accessors
  // ---------------------------------------------------------------------

  /// Solver tuning.
  #[inline]
  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Lifecycle state.
  #[inline]
  pub fn state(&self) -> SolverState {
    self.state
  }

  /// Steps taken since water was defined.
  #[inline]
  pub fn step_count(&self) -> u64 {
    self.step_count
  }

  /// Peak Courant number of the last step.
  #[inline]
  pub fn last_courant(&self) -> f64 {
    self.last_courant
  }

  /// Full report of the last step.
  #[inline]
  pub fn last_report(&self) -> &StepReport {
    &self.last_report
  }

  /// Handle for pausing, resuming and aborting from outside.
  pub fn control(&self) -> ControlHandle {
    self.control.clone()
  }

  /// Collected statistics.
  #[inline]
  pub fn metrics(&self) -> &SolverMetrics {
    &self.metrics
  }

  /// True once water is defined.
  #[inline]
  pub fn has_water(&self) -> bool {
    self.octree.is_some()
  }

  fn require_water(&self, caller: &'static str) -> SimResult<&Octree<D>> {
    self
      .octree
      .as_ref()
      .ok_or_else(|| SimError::contract(caller, "no water defined"))
  }

  // ---------------------------------------------------------------------
  // Water
  // ---------------------------------------------------------------------

  /// Take ownership of `octree` and start simulated time at `start_time`.
  ///
  /// `time_staggered` is the checkpoint interval (`<= 0` disables
  /// checkpoints); `time_step` becomes the initial and maximum timestep.
  pub fn define_water(
    &mut self,
    octree: Octree<D>,
    start_time: f64,
    time_staggered: f64,
    time_step: f64,
  ) -> SimResult<()> {
    const CALLER: &str = "FluidSolver::define_water";
    if self.octree.is_some() {
      return Err(SimError::contract(CALLER, "water already defined; use redefine_water"));
    }
    if !start_time.is_finite() || !time_staggered.is_finite() {
      return Err(SimError::domain(CALLER, "start time and checkpoint interval must be finite"));
    }
    validate_time_step(CALLER, time_step)?;
    octree.check_topology(self.config.volume_epsilon)?;

    self.time = start_time;
    self.time_step = time_step;
    self.max_time_step = time_step;
    self.checkpoint_interval = time_staggered;
    self.next_checkpoint = (time_staggered > 0.0).then(|| start_time + time_staggered);
    self.step_count = 0;
    self.last_courant = 0.0;
    self.last_report = StepReport::default();
    self.metrics.reset();
    self.metrics.record_leaves(&octree.leaf_count_per_level());
    tracing::info!(
      leaves = octree.leaf_count(),
      start_time,
      checkpoint_interval = time_staggered,
      time_step,
      "water defined"
    );
    self.octree = Some(octree);
    self.state = SolverState::Ready;
    Ok(())
  }

  /// Replace the current water, returning the previous octree if any.
  pub fn redefine_water(
    &mut self,
    octree: Octree<D>,
    start_time: f64,
    time_staggered: f64,
    time_step: f64,
  ) -> SimResult<Option<Octree<D>>> {
    let previous = self.octree.take();
    let state = self.state;
    self.state = SolverState::Uninitialized;
    if let Err(err) = self.define_water(octree, start_time, time_staggered, time_step) {
      self.octree = previous;
      self.state = state;
      return Err(err);
    }
    Ok(previous)
  }

  /// Release the water and return to [`SolverState::Uninitialized`].
  pub fn undefine_water(&mut self) -> SimResult<Octree<D>> {
    let octree = self
      .octree
      .take()
      .ok_or_else(|| SimError::contract("FluidSolver::undefine_water", "no water defined"))?;
    self.state = SolverState::Uninitialized;
    self.next_checkpoint = None;
    self.control.resume();
    tracing::info!(steps = self.step_count, time = self.time, "water undefined");
    Ok(octree)
  }

  /// Current water.
  pub fn get_water(&self) -> SimResult<&Octree<D>> {
    self.require_water("FluidSolver::get_water")
  }

  /// Current water, mutable (runtime refinement, boundary edits).
  pub fn get_water_mut(&mut self) -> SimResult<&mut Octree<D>> {
    self
      .octree
      .as_mut()
      .ok_or_else(|| SimError::contract("FluidSolver::get_water_mut", "no water defined"))
  }

  // ---------------------------------------------------------------------
  // Time
  // ---------------------------------------------------------------------

  /// Simulated time (s).
  pub fn get_time(&self) -> SimResult<f64> {
    self.require_water("FluidSolver::get_time")?;
    Ok(self.time)
  }

  /// Jump simulated time; the next checkpoint moves with it.
  pub fn set_time(&mut self, time: f64) -> SimResult<()> {
    const CALLER: &str = "FluidSolver::set_time";
    self.require_water(CALLER)?;
    if !time.is_finite() {
      return Err(SimError::domain(CALLER, "time must be finite"));
    }
    if self.next_checkpoint.is_some() {
      self.next_checkpoint = Some(time + self.checkpoint_interval);
    }
    self.time = time;
    Ok(())
  }

  /// Current timestep (s).
  pub fn get_time_step(&self) -> SimResult<f64> {
    self.require_water("FluidSolver::get_time_step")?;
    Ok(self.time_step)
  }

  /// Set the timestep; it also becomes the upper bound of adaptation.
  pub fn set_time_step(&mut self, time_step: f64) -> SimResult<()> {
    const CALLER: &str = "FluidSolver::set_time_step";
    self.require_water(CALLER)?;
    validate_time_step(CALLER, time_step)?;
    self.time_step = time_step;
    self.max_time_step = time_step;
    Ok(())
  }

  /// Call the event pump every `cadence` steps during a run.
  pub fn set_checkpoint_cadence(&mut self, cadence: usize) -> SimResult<()> {
    if cadence == 0 {
      return Err(SimError::range("FluidSolver::set_checkpoint_cadence", 0, usize::MAX));
    }
    self.config.checkpoint_cadence = cadence;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Hooks
  // ---------------------------------------------------------------------

  /// Callback fired whenever simulated time reaches a checkpoint.
  pub fn set_checkpoint_callback(&mut self, callback: impl for<'a> FnMut(&Checkpoint<'a, D>) + 'static) {
    self.on_checkpoint = Some(Box::new(callback));
  }

  /// Host event hook polled from the run loop.
  pub fn set_event_pump(&mut self, pump: impl EventPump + 'static) {
    self.pump = Box::new(pump);
  }

  fn event_context(&self) -> EventContext {
    EventContext {
      time: self.time,
      step: self.step_count,
      time_step: self.time_step,
      courant: self.last_courant,
      state: self.state,
      control: self.control.clone(),
    }
  }

  fn pump_events(&mut self) {
    let ctx = self.event_context();
    self.pump.process_events(&ctx);
  }

  // ---------------------------------------------------------------------
  // Control
  // ---------------------------------------------------------------------

  /// Freeze time advancement; with `break_loop` a running loop returns.
  pub fn pause(&mut self, break_loop: bool) {
    self.control.pause(break_loop);
    if self.state == SolverState::Ready {
      self.state = SolverState::Paused;
    }
  }

  /// Resume after [`pause`](Self::pause).
  pub fn continue_simulation(&mut self) {
    self.control.resume();
    if self.state == SolverState::Paused {
      self.state = SolverState::Ready;
    }
  }

  /// Make a running loop return [`RunResult::Aborted`].
  pub fn abort(&mut self) {
    self.control.abort();
  }

  /// Wait until no other operation holds the control handle, pumping events
  /// meanwhile.
  fn begin_operation(&mut self) -> control::OperationGuard {
    loop {
      if let Some(guard) = self.control.try_begin() {
        return guard;
      }
      self.pump_events();
      std::thread::yield_now();
    }
  }

  // ---------------------------------------------------------------------
  // Integration
  // ---------------------------------------------------------------------

  /// Advance by one adaptive step.
  pub fn evolve(&mut self) -> SimResult<()> {
    self.require_water("FluidSolver::evolve")?;
    let _guard = self.begin_operation();
    self.step()
  }

  fn step(&mut self) -> SimResult<()> {
    let started = Instant::now();
    let Some(octree) = self.octree.as_mut() else {
      return Err(SimError::contract("FluidSolver::evolve", "no water defined"));
    };

    let mut dt = self.time_step;
    let checkpoint = self.next_checkpoint.filter(|&at| self.time + dt >= at);
    if let Some(at) = checkpoint {
      dt = at - self.time;
    }

    let report = if dt > 0.0 {
      step::advance(octree.graph_mut(), &self.config, dt)?
    } else {
      StepReport::default()
    };

    self.time = checkpoint.unwrap_or(self.time + dt);
    self.step_count += 1;
    self.last_courant = report.max_courant;
    self.last_report = report;
    self.adapt_time_step(dt, report.max_courant);
    tracing::trace!(
      step = self.step_count,
      time = self.time,
      dt,
      courant = report.max_courant,
      next_dt = self.time_step,
      "evolved"
    );

    self.metrics.record_step(
      started.elapsed().as_micros() as u64,
      dt,
      report.max_courant,
    );
    self
      .metrics
      .record_limiter(report.limiter.limited_faces, report.limiter.fallback_faces);

    if let Some(at) = checkpoint {
      self.next_checkpoint = Some(at + self.checkpoint_interval);
      self.fire_checkpoint();
    }
    Ok(())
  }

  /// `dt <- dt · target / courant`, capped at the maximum step.
  fn adapt_time_step(&mut self, used: f64, courant: f64) {
    let rate = if used > 0.0 { courant / used } else { 0.0 };
    let next = if rate > 0.0 {
      self.config.target_courant / rate
    } else {
      self.max_time_step
    };
    self.time_step = next.min(self.max_time_step);
    if courant > 1.0 {
      tracing::warn!(courant, dt = used, "Courant number above 1");
    }
  }

  fn fire_checkpoint(&mut self) {
    let Some(octree) = self.octree.as_ref() else {
      return;
    };
    self.metrics.record_checkpoint();
    if metrics::is_enabled() {
      self.metrics.record_leaves(&octree.leaf_count_per_level());
    }
    tracing::debug!(time = self.time, step = self.step_count, "checkpoint");
    if let Some(callback) = self.on_checkpoint.as_mut() {
      callback(&Checkpoint {
        time: self.time,
        step: self.step_count,
        octree,
      });
    }
  }

  /// Evolve until aborted or paused with `break_loop`.
  ///
  /// `time_step` becomes the current and maximum timestep. The event pump
  /// runs every `checkpoint_cadence` steps, and continuously while paused.
  #[tracing::instrument(skip_all, name = "solver::run_simulation")]
  pub fn run_simulation(&mut self, time_step: f64) -> SimResult<RunResult> {
    self.set_time_step(time_step)?;
    let _guard = self.begin_operation();
    self.state = SolverState::Running;
    tracing::info!(time = self.time, time_step, "run started");

    let mut since_pump = 0usize;
    let result = loop {
      if self.control.take_abort() {
        break RunResult::Aborted;
      }
      if self.control.is_paused() {
        if self.control.breaks_on_pause() {
          break RunResult::Paused;
        }
        self.pump_events();
        std::thread::yield_now();
        continue;
      }
      if let Err(err) = self.step() {
        self.state = SolverState::Ready;
        tracing::error!(%err, step = self.step_count, "evolve failed");
        return Err(err);
      }
      since_pump += 1;
      if since_pump >= self.config.checkpoint_cadence {
        since_pump = 0;
        self.pump_events();
      }
    };

    self.state = match result {
      RunResult::Paused => SolverState::Paused,
      RunResult::Aborted | RunResult::Finished if self.control.is_paused() => SolverState::Paused,
      RunResult::Aborted | RunResult::Finished => SolverState::Ready,
    };
    tracing::info!(?result, time = self.time, steps = self.step_count, "run stopped");
    Ok(result)
  }
}

fn validate_time_step(caller: &'static str, time_step: f64) -> SimResult<()> {
  if time_step.is_finite() && time_step > 0.0 {
    Ok(())
  } else {
    Err(SimError::domain(caller, format!("time step {time_step} must be positive")))
  }
}
