//! Simulator binary for the maneuver execution engine.
//!
//! Wires configuration, a simulated robot and the tick loop together and
//! runs a scripted docking scenario, printing every completion signal as
//! JSON when done.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `maneuver-config.yaml` (or the first argument)
//! 2. Initialize structured logging (tracing)
//! 3. Create the tick clock and the simulated robot
//! 4. Build the scenario world from the configured seed
//! 5. Queue and run each scripted step until the queue drains
//! 6. Log and print the result

mod error;
mod scenario;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use maneuver_actions::ActionList;
use maneuver_core::{
    ManeuverConfig, NoOpCallback, RunBounds, RunControl, RunEndReason, RunResult, TickClock,
    log_run_end, run_until_idle,
};
use maneuver_world::SimRobot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::SimError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "maneuver-config.yaml";

/// Application entry point for the simulator.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // 2. Initialize structured logging.
    init_logging(&config);
    info!(
        path = %config_path.display(),
        seed = config.sim.seed,
        tick_interval_ms = config.sim.tick_interval_ms,
        max_ticks = config.sim.max_ticks,
        "Configuration loaded"
    );

    // 3. Create clock and robot.
    let started_at = Utc::now();
    let mut clock = TickClock::from_config(&config.sim, started_at).map_err(SimError::from)?;
    let mut robot = SimRobot::new(config.sim_params(), started_at);
    let settings = config.dock_settings();
    let bounds = RunBounds::from_config(&config.sim);
    let retries = config.sim.step_retries;

    let control = Arc::new(RunControl::new());
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                control.request_stop();
            }
        });
    }

    // 4. Build the world.
    let world = scenario::build_world(&mut robot, config.sim.seed)?;

    // 5. Run the script one step at a time.
    let mut actions = ActionList::new();
    let mut completions = Vec::new();
    let mut total_ticks: u64 = 0;
    let mut end_reason = RunEndReason::QueueDrained;
    let mut ended_at = started_at;

    for step in scenario::script(&world) {
        scenario::queue_step(&mut robot, &mut actions, step, settings, retries)?;
        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &bounds,
            &control,
            &mut NoOpCallback,
        )
        .await
        .map_err(SimError::from)?;

        total_ticks = total_ticks.saturating_add(result.total_ticks);
        completions.extend(result.completions);
        end_reason = result.end_reason;
        ended_at = result.ended_at;
        if end_reason != RunEndReason::QueueDrained {
            warn!(step = step.label(), reason = ?end_reason, "Scenario stopped early");
            break;
        }
    }

    // 6. Log and print results.
    let result = RunResult {
        end_reason,
        total_ticks,
        ended_at,
        completions,
    };
    log_run_end(&result);

    let report = serde_json::to_string_pretty(&result.completions).map_err(SimError::from)?;
    println!("{report}");

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "maneuver-sim shutdown complete"
    );
    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the default
/// file is absent.
fn load_config(path: &Path) -> Result<ManeuverConfig, SimError> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(ManeuverConfig::default());
    }
    Ok(ManeuverConfig::from_file(path)?)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &ManeuverConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
