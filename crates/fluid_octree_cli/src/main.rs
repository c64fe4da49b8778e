//! Headless driver for the adaptive octree fluid solver.
//!
//! Builds an octree around the planar surface described in a scenario file,
//! fills it with water, and runs the solver until the scenario's step count
//! or end time, logging a line per checkpoint.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use fluid_octree::{Checkpoint, Dim2, Dim3, Dimension, EventContext, FluidSolver, Octree, OctreeConfig, RunResult};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::Scenario;

/// Run a free-surface scenario.
#[derive(Parser, Debug)]
#[command(name = "fluid_sim")]
#[command(about = "Runs an adaptive octree free-surface scenario")]
struct Args {
	/// Path to the scenario TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Override the scenario's step count.
	#[arg(short, long)]
	steps: Option<u64>,

	/// Log level (error, warn, info, debug, trace).
	#[arg(short, long, default_value = "info")]
	log_level: Level,
}

fn main() {
	let args = Args::parse();

	let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
	if tracing::subscriber::set_global_default(subscriber).is_err() {
		eprintln!("tracing subscriber already installed");
	}

	if let Err(err) = run(&args) {
		error!("{err:#}");
		std::process::exit(1);
	}
}

fn run(args: &Args) -> Result<()> {
	info!(path = %args.config.display(), "loading scenario");
	let mut scenario = Scenario::load(&args.config)?;
	if args.steps.is_some() {
		scenario.run.steps = args.steps;
	}

	match scenario.dimensions {
		2 => simulate::<Dim2>(&scenario),
		_ => simulate::<Dim3>(&scenario),
	}
}

fn simulate<D: Dimension>(scenario: &Scenario) -> Result<()> {
	let s = &scenario.surface;
	let (base, slope, accuracy, accuracy_slope) = (s.base, s.slope, s.accuracy, s.accuracy_slope);
	let surface = (
		move |p: D::Vector| base + slope * p[0],
		move |p: D::Vector| accuracy + accuracy_slope * p[0],
	);

	let mut octree_config = OctreeConfig::<D>::unit().with_max_level(scenario.domain.max_level);
	octree_config.root_size = scenario.domain.root_size;
	octree_config.origin[D::VERTICAL] = scenario.domain.bottom;

	let mut tree = Octree::with_config(octree_config, &surface).context("Building octree")?;
	tree.fill_water(&surface).context("Filling water")?;
	let initial_water = tree.total_water_volume();
	info!(
		dimensions = D::D,
		leaves = tree.leaf_count(),
		per_level = ?tree.leaf_count_per_level(),
		water = initial_water,
		"initial state"
	);

	let solver_config = scenario.solver_config()?;
	let mut solver = FluidSolver::<D>::new(solver_config)?;
	solver.define_water(
		tree,
		0.0,
		scenario.solver.checkpoint_interval,
		solver_config.max_time_step,
	)?;

	solver.set_checkpoint_callback(move |cp: &Checkpoint<'_, D>| {
		let water = cp.octree.total_water_volume();
		info!(
			time = cp.time,
			step = cp.step,
			water,
			drift = water - initial_water,
			"checkpoint"
		);
	});

	let (max_steps, end_time) = (scenario.run.steps, scenario.run.end_time);
	solver.set_event_pump(move |ctx: &EventContext| {
		let steps_done = max_steps.is_some_and(|n| ctx.step >= n);
		let time_done = end_time.is_some_and(|t| ctx.time >= t);
		if steps_done || time_done {
			ctx.control.abort();
		}
	});

	let result = solver.run_simulation(solver_config.max_time_step)?;
	let metrics = solver.metrics();
	let final_water = solver.get_water()?.total_water_volume();
	info!(
		?result,
		time = solver.get_time()?,
		steps = solver.step_count(),
		avg_step_us = metrics.avg_step_us(),
		peak_courant = metrics.peak_courant(),
		limited_faces = metrics.limited_faces,
		fallback_faces = metrics.fallback_faces,
		water = final_water,
		"run finished"
	);
	if result == RunResult::Paused {
		info!("run left paused");
	}
	Ok(())
}
