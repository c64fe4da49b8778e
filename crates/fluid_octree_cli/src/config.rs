//! Scenario file parsing.

use anyhow::{Context, Result};
use fluid_octree::{AdvectionScheme, SolverConfig};
use serde::Deserialize;
use std::path::Path;

/// Root scenario description.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
	/// Number of spatial dimensions (2 or 3).
	#[serde(default = "default_dimensions")]
	pub dimensions: u32,
	/// Simulated domain.
	#[serde(default)]
	pub domain: DomainConfig,
	/// Initial free surface.
	pub surface: SurfaceConfig,
	/// Solver tuning.
	#[serde(default)]
	pub solver: SolverSection,
	/// When to stop.
	#[serde(default)]
	pub run: RunConfig,
}

/// Cubic domain placement and depth cap.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainConfig {
	/// Height of the domain floor.
	#[serde(default)]
	pub bottom: f64,
	/// Edge length of the root cell.
	#[serde(default = "default_root_size")]
	pub root_size: f64,
	/// Deepest refinement level.
	#[serde(default = "default_max_level")]
	pub max_level: u32,
}

impl Default for DomainConfig {
	fn default() -> Self {
		Self {
			bottom: 0.0,
			root_size: default_root_size(),
			max_level: default_max_level(),
		}
	}
}

/// Planar surface `height = base + slope * x` refined to
/// `accuracy + accuracy_slope * x`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurfaceConfig {
	/// Surface height at x = 0.
	pub base: f64,
	/// Height change per unit x.
	#[serde(default)]
	pub slope: f64,
	/// Target cell size at x = 0.
	pub accuracy: f64,
	/// Target cell size change per unit x.
	#[serde(default)]
	pub accuracy_slope: f64,
}

/// Solver options; unset fields keep the library defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverSection {
	/// "upwind", "hyper_c" or "hric".
	pub scheme: Option<String>,
	/// Maximum timestep (s).
	pub max_time_step: Option<f64>,
	/// Peak Courant number to aim for.
	pub target_courant: Option<f64>,
	/// Steps between event polls.
	pub cadence: Option<usize>,
	/// Simulated seconds between checkpoints (0 disables).
	#[serde(default)]
	pub checkpoint_interval: f64,
}

/// Stop conditions; the first one reached ends the run.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
	/// Number of evolve steps.
	pub steps: Option<u64>,
	/// Simulated end time (s).
	pub end_time: Option<f64>,
}

fn default_dimensions() -> u32 {
	2
}

fn default_root_size() -> f64 {
	1.0
}

fn default_max_level() -> u32 {
	8
}

impl Scenario {
	/// Load a scenario from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and validate scenario TOML.
	pub fn parse(content: &str) -> Result<Self> {
		let scenario: Scenario =
			toml::from_str(content).with_context(|| "Failed to parse scenario TOML")?;

		if !matches!(scenario.dimensions, 2 | 3) {
			anyhow::bail!("dimensions must be 2 or 3, got {}", scenario.dimensions);
		}
		if scenario.surface.accuracy <= 0.0 {
			anyhow::bail!("surface.accuracy must be positive, got {}", scenario.surface.accuracy);
		}
		if scenario.run.steps.is_none() && scenario.run.end_time.is_none() {
			anyhow::bail!("run needs `steps` or `end_time`");
		}

		Ok(scenario)
	}

	/// Solver configuration with the scenario's overrides applied.
	pub fn solver_config(&self) -> Result<SolverConfig> {
		let mut config = SolverConfig::DEFAULT;
		if let Some(scheme) = &self.solver.scheme {
			config.advection = parse_scheme(scheme)?;
		}
		if let Some(dt) = self.solver.max_time_step {
			config.max_time_step = dt;
		}
		if let Some(target) = self.solver.target_courant {
			config.target_courant = target;
		}
		if let Some(cadence) = self.solver.cadence {
			config.checkpoint_cadence = cadence;
		}
		config.validate().context("Invalid solver section")?;
		Ok(config)
	}
}

fn parse_scheme(name: &str) -> Result<AdvectionScheme> {
	[AdvectionScheme::Upwind, AdvectionScheme::HyperC, AdvectionScheme::Hric]
		.into_iter()
		.find(|s| s.name() == name)
		.with_context(|| format!("Unknown advection scheme: {name}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[surface]
base = 0.55
slope = 0.2
accuracy = 0.02

[run]
steps = 10
"#;

	#[test]
	fn test_minimal_scenario_defaults() {
		let scenario = Scenario::parse(MINIMAL).unwrap();
		assert_eq!(scenario.dimensions, 2);
		assert_eq!(scenario.domain.root_size, 1.0);
		assert_eq!(scenario.domain.max_level, 8);
		assert_eq!(scenario.run.steps, Some(10));
		assert_eq!(scenario.solver_config().unwrap(), SolverConfig::DEFAULT);
	}

	#[test]
	fn test_solver_overrides() {
		let text = format!("{MINIMAL}\n[solver]\nscheme = \"hric\"\ncadence = 5\ncheckpoint_interval = 0.1\n");
		let scenario = Scenario::parse(&text).unwrap();
		let config = scenario.solver_config().unwrap();
		assert_eq!(config.advection, AdvectionScheme::Hric);
		assert_eq!(config.checkpoint_cadence, 5);
		assert_eq!(scenario.solver.checkpoint_interval, 0.1);
	}

	#[test]
	fn test_rejects_bad_scenarios() {
		assert!(Scenario::parse(&MINIMAL.replace("steps = 10", "")).is_err());
		assert!(Scenario::parse(&format!("dimensions = 4\n{MINIMAL}")).is_err());
		let bad_scheme = format!("{MINIMAL}\n[solver]\nscheme = \"quick\"\n");
		assert!(Scenario::parse(&bad_scheme).unwrap().solver_config().is_err());
	}
}
