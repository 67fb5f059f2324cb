//! Configuration, tick clock, and the tick loop for the maneuver engine.
//!
//! This crate owns the outer loop that drives an [`ActionList`] against a
//! robot: each tick updates the queue, steps the robot, and advances the
//! clock until the queue drains or a bound is hit.
//!
//! # Modules
//!
//! - [`clock`] -- Tick counter with checked arithmetic and derived time.
//! - [`config`] -- Configuration loading from `maneuver-config.yaml` into
//!   strongly-typed structs.
//! - [`runner`] -- The async tick loop, stop control and tick callbacks.
//!
//! [`ActionList`]: maneuver_actions::ActionList

pub mod clock;
pub mod config;
pub mod runner;

// Re-export primary types at crate root.
pub use clock::{ClockError, TickClock};
pub use config::{ConfigError, DockingConfig, LoggingConfig, ManeuverConfig, SimConfig};
pub use runner::{
    NoOpCallback, RunBounds, RunControl, RunEndReason, RunResult, RunnerError, TickCallback,
    TickedRobot, log_run_end, run_until_idle,
};
