//! Numeric parameters shared by every docking maneuver.

use chrono::TimeDelta;
use maneuver_actions::{DEFAULT_ACTION_TIMEOUT_SECS, LiftPresets};
use maneuver_types::MotionProfile;

/// Tunables handed to docking actions at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DockSettings {
    /// Default approach speed limits.
    pub motion: MotionProfile,
    /// Heading tolerance at the approach pose (rad). Zero disables the
    /// adaptive near-pose threshold.
    pub pre_dock_angle_tolerance: f32,
    /// Nominal distance of an approach pose from its marker (mm).
    pub nominal_approach_distance: f32,
    /// Height of the robot's bounding box (mm).
    pub robot_bounding_height: f32,
    /// Distance under which two sightings are the same object (mm).
    pub same_object_distance_tol: f32,
    /// Heading difference under which two sightings are the same object (rad).
    pub same_object_angle_tol: f32,
    /// Firmware-level re-approaches per dock command.
    pub num_retries: u8,
    /// Timeout of a whole docking action.
    pub action_timeout: TimeDelta,
    /// Settle time before verifying a charger mount.
    pub charger_verify_delay: TimeDelta,
    /// Marker sightings required by visual verification.
    pub verify_sightings: usize,
    /// Lift heights.
    pub lift: LiftPresets,
}

impl Default for DockSettings {
    fn default() -> Self {
        Self {
            motion: MotionProfile::default(),
            pre_dock_angle_tolerance: 0.2,
            nominal_approach_distance: 100.0,
            robot_bounding_height: 68.0,
            same_object_distance_tol: 30.0,
            same_object_angle_tol: 0.35,
            num_retries: 2,
            action_timeout: TimeDelta::seconds(DEFAULT_ACTION_TIMEOUT_SECS),
            charger_verify_delay: TimeDelta::milliseconds(1500),
            verify_sightings: 2,
            lift: LiftPresets::default(),
        }
    }
}

impl DockSettings {
    /// Objects whose centre sits above this height (mm) are docked high.
    pub const fn high_dock_threshold(&self) -> f32 {
        0.5 * self.robot_bounding_height
    }
}
