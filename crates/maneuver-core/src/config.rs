//! Configuration loading and typed config structures for the maneuver engine.
//!
//! The canonical configuration lives in `maneuver-config.yaml` at the
//! project root. Every field has a default, so a partial or empty file is
//! valid. The loaded config is converted once into the plain parameter
//! structs the libraries consume ([`DockSettings`], [`LiftPresets`]).

use std::path::Path;

use chrono::TimeDelta;
use maneuver_actions::LiftPresets;
use maneuver_dock::DockSettings;
use maneuver_types::MotionProfile;
use maneuver_world::SimParams;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `maneuver-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManeuverConfig {
    /// Simulator loop settings.
    #[serde(default)]
    pub sim: SimConfig,

    /// Docking tunables.
    #[serde(default)]
    pub docking: DockingConfig,

    /// Lift heights.
    #[serde(default)]
    pub lift: LiftPresets,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ManeuverConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Parameters handed to every docking action.
    pub fn dock_settings(&self) -> DockSettings {
        let docking = &self.docking;
        DockSettings {
            motion: MotionProfile {
                speed_mmps: docking.speed_mmps,
                accel_mmps2: docking.accel_mmps2,
                decel_mmps2: docking.decel_mmps2,
            },
            pre_dock_angle_tolerance: docking.pre_dock_angle_tolerance,
            nominal_approach_distance: docking.nominal_approach_distance_mm,
            robot_bounding_height: docking.robot_bounding_height_mm,
            same_object_distance_tol: docking.same_object_distance_tol_mm,
            same_object_angle_tol: docking.same_object_angle_tol,
            num_retries: docking.num_retries,
            action_timeout: TimeDelta::try_seconds(docking.action_timeout_secs)
                .unwrap_or(TimeDelta::MAX),
            charger_verify_delay: TimeDelta::try_milliseconds(docking.charger_verify_delay_ms)
                .unwrap_or(TimeDelta::MAX),
            verify_sightings: docking.verify_sightings,
            lift: self.lift,
        }
    }

    /// Lift presets shared by the basic actions.
    pub const fn lift_presets(&self) -> LiftPresets {
        self.lift
    }

    /// Kinematics of the simulated robot, matched to the configured lift
    /// and tick interval.
    pub fn sim_params(&self) -> SimParams {
        let interval = i64::try_from(self.sim.tick_interval_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        SimParams {
            tick_interval: interval,
            carry_height: self.lift.carry,
            low_dock_height: self.lift.low_dock,
            pre_dock_distance: self.docking.nominal_approach_distance_mm,
            ..SimParams::default()
        }
    }
}

/// Simulator loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimConfig {
    /// Simulated milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks. Zero means no limit.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Sleep for the tick interval between ticks.
    #[serde(default)]
    pub realtime: bool,

    /// Times a scripted step is rebuilt after asking for a retry.
    #[serde(default = "default_step_retries")]
    pub step_retries: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: default_max_ticks(),
            seed: default_seed(),
            realtime: false,
            step_retries: default_step_retries(),
        }
    }
}

/// Docking configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DockingConfig {
    /// Approach cruise speed (mm/s).
    #[serde(default = "default_speed_mmps")]
    pub speed_mmps: f32,

    /// Approach acceleration (mm/s^2).
    #[serde(default = "default_accel_mmps2")]
    pub accel_mmps2: f32,

    /// Approach deceleration (mm/s^2).
    #[serde(default = "default_decel_mmps2")]
    pub decel_mmps2: f32,

    /// Heading tolerance at the approach pose (rad).
    #[serde(default = "default_pre_dock_angle_tolerance")]
    pub pre_dock_angle_tolerance: f32,

    /// Nominal distance of an approach pose from its marker (mm).
    #[serde(default = "default_nominal_approach_distance_mm")]
    pub nominal_approach_distance_mm: f32,

    /// Height of the robot's bounding box (mm).
    #[serde(default = "default_robot_bounding_height_mm")]
    pub robot_bounding_height_mm: f32,

    /// Distance under which two sightings are the same object (mm).
    #[serde(default = "default_same_object_distance_tol_mm")]
    pub same_object_distance_tol_mm: f32,

    /// Heading difference under which two sightings are the same object (rad).
    #[serde(default = "default_same_object_angle_tol")]
    pub same_object_angle_tol: f32,

    /// Firmware-level re-approaches per dock command.
    #[serde(default = "default_num_retries")]
    pub num_retries: u8,

    /// Timeout of a whole docking action.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: i64,

    /// Settle time before verifying a charger mount.
    #[serde(default = "default_charger_verify_delay_ms")]
    pub charger_verify_delay_ms: i64,

    /// Marker sightings required by visual verification.
    #[serde(default = "default_verify_sightings")]
    pub verify_sightings: usize,
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            speed_mmps: default_speed_mmps(),
            accel_mmps2: default_accel_mmps2(),
            decel_mmps2: default_decel_mmps2(),
            pre_dock_angle_tolerance: default_pre_dock_angle_tolerance(),
            nominal_approach_distance_mm: default_nominal_approach_distance_mm(),
            robot_bounding_height_mm: default_robot_bounding_height_mm(),
            same_object_distance_tol_mm: default_same_object_distance_tol_mm(),
            same_object_angle_tol: default_same_object_angle_tol(),
            num_retries: default_num_retries(),
            action_timeout_secs: default_action_timeout_secs(),
            charger_verify_delay_ms: default_charger_verify_delay_ms(),
            verify_sightings: default_verify_sightings(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    33
}

const fn default_max_ticks() -> u64 {
    5_000
}

const fn default_seed() -> u64 {
    42
}

const fn default_step_retries() -> u32 {
    2
}

const fn default_speed_mmps() -> f32 {
    100.0
}

const fn default_accel_mmps2() -> f32 {
    200.0
}

const fn default_decel_mmps2() -> f32 {
    500.0
}

const fn default_pre_dock_angle_tolerance() -> f32 {
    0.2
}

const fn default_nominal_approach_distance_mm() -> f32 {
    100.0
}

const fn default_robot_bounding_height_mm() -> f32 {
    68.0
}

const fn default_same_object_distance_tol_mm() -> f32 {
    30.0
}

const fn default_same_object_angle_tol() -> f32 {
    0.35
}

const fn default_num_retries() -> u8 {
    2
}

const fn default_action_timeout_secs() -> i64 {
    30
}

const fn default_charger_verify_delay_ms() -> i64 {
    1500
}

const fn default_verify_sightings() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}
