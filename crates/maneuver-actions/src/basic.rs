//! Motion primitives: head, lift, turn, drive and wait.
//!
//! Each primitive issues one command in `init` and polls the matching
//! motor state until it settles at the target.

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_types::{
    ActionResult, LiftPreset, MotionProfile, Pose3d, TrackSet, angle_difference,
};
use maneuver_world::Robot;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::Action;

/// Lowest head tilt (rad).
pub const HEAD_ANGLE_MIN: f32 = -0.44;

/// Highest head tilt (rad).
pub const HEAD_ANGLE_MAX: f32 = 0.78;

/// Head tilt tolerance used when none is given (rad).
pub const DEFAULT_HEAD_TOLERANCE: f32 = 0.02;

/// Heading tolerance used when turning towards a pose (rad).
pub const DEFAULT_TURN_TOLERANCE: f32 = 0.05;

/// Arrival tolerance used when driving (mm).
pub const DEFAULT_DRIVE_TOLERANCE_MM: f32 = 5.0;

// ---------------------------------------------------------------------------
// Lift presets
// ---------------------------------------------------------------------------

/// Named lift heights and the physical range of the lift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiftPresets {
    /// Height for docking with an object on the ground (mm).
    #[serde(default = "default_low_dock")]
    pub low_dock: f32,
    /// Height for docking with an object on top of another (mm).
    #[serde(default = "default_high_dock")]
    pub high_dock: f32,
    /// Height while carrying (mm).
    #[serde(default = "default_carry")]
    pub carry: f32,
    /// Lowest reachable height (mm).
    #[serde(default = "default_min_height")]
    pub min_height: f32,
    /// Highest reachable height (mm).
    #[serde(default = "default_max_height")]
    pub max_height: f32,
    /// Arrival tolerance (mm).
    #[serde(default = "default_lift_tolerance")]
    pub tolerance: f32,
}

const fn default_low_dock() -> f32 {
    32.0
}
const fn default_high_dock() -> f32 {
    76.0
}
const fn default_carry() -> f32 {
    92.0
}
const fn default_min_height() -> f32 {
    32.0
}
const fn default_max_height() -> f32 {
    92.0
}
const fn default_lift_tolerance() -> f32 {
    5.0
}

impl Default for LiftPresets {
    fn default() -> Self {
        Self {
            low_dock: default_low_dock(),
            high_dock: default_high_dock(),
            carry: default_carry(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            tolerance: default_lift_tolerance(),
        }
    }
}

impl LiftPresets {
    /// Height for a preset. `OutOfFov` resolves to whichever of low-dock
    /// and carry is nearer to `current`.
    pub fn height_for(&self, preset: LiftPreset, current: f32) -> f32 {
        match preset {
            LiftPreset::LowDock => self.low_dock,
            LiftPreset::HighDock => self.high_dock,
            LiftPreset::Carry => self.carry,
            LiftPreset::OutOfFov => {
                if (current - self.low_dock).abs() <= (self.carry - current).abs() {
                    self.low_dock
                } else {
                    self.carry
                }
            }
        }
    }

    /// Clip a height to the physical range.
    pub fn clip(&self, height: f32) -> f32 {
        height.clamp(self.min_height, self.max_height)
    }
}

// ---------------------------------------------------------------------------
// Lift
// ---------------------------------------------------------------------------

/// Where [`MoveLiftToHeight`] should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiftTarget {
    /// A named preset resolved at init.
    Preset(LiftPreset),
    /// An explicit height (mm).
    Height(f32),
}

/// Move the lift to a height or preset.
#[derive(Debug, Clone)]
pub struct MoveLiftToHeight {
    target: LiftTarget,
    presets: LiftPresets,
    variability: f32,
    height: f32,
}

impl MoveLiftToHeight {
    /// Move to `target` using `presets`.
    pub const fn new(target: LiftTarget, presets: LiftPresets) -> Self {
        Self {
            target,
            presets,
            variability: 0.0,
            height: 0.0,
        }
    }

    /// Move to a preset.
    pub const fn to_preset(preset: LiftPreset, presets: LiftPresets) -> Self {
        Self::new(LiftTarget::Preset(preset), presets)
    }

    /// Add uniform noise of up to `variability` mm to the target.
    #[must_use]
    pub const fn with_variability(mut self, variability: f32) -> Self {
        self.variability = variability;
        self
    }

    fn in_position(&self, robot: &dyn Robot) -> bool {
        !robot.is_lift_moving() && (robot.lift_height() - self.height).abs() <= self.presets.tolerance
    }
}

impl Action for MoveLiftToHeight {
    fn name(&self) -> &str {
        "MoveLiftToHeight"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::LIFT
    }

    fn is_interruptible(&self) -> bool {
        true
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let mut height = match self.target {
            LiftTarget::Preset(preset) => self.presets.height_for(preset, robot.lift_height()),
            LiftTarget::Height(height) => height,
        };
        if self.variability > 0.0 {
            height += rand::rng().random_range(-self.variability..=self.variability);
        }
        self.height = self.presets.clip(height);

        if self.in_position(robot) {
            debug!(height = self.height, "Lift already in position");
            return ActionResult::Success;
        }
        match robot.move_lift_to_height(self.height) {
            Ok(()) => ActionResult::Running,
            Err(e) => {
                warn!(error = %e, "Lift command failed");
                ActionResult::FailureAbort
            }
        }
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if self.in_position(robot) {
            ActionResult::Success
        } else {
            ActionResult::Running
        }
    }
}

// ---------------------------------------------------------------------------
// Head
// ---------------------------------------------------------------------------

/// Tilt the head to an angle.
#[derive(Debug, Clone)]
pub struct MoveHeadToAngle {
    angle: f32,
    tolerance: f32,
}

impl MoveHeadToAngle {
    /// Tilt to `angle`, clipped to the head range.
    pub fn new(angle: f32) -> Self {
        Self {
            angle: angle.clamp(HEAD_ANGLE_MIN, HEAD_ANGLE_MAX),
            tolerance: DEFAULT_HEAD_TOLERANCE,
        }
    }

    fn in_position(&self, robot: &dyn Robot) -> bool {
        !robot.is_head_moving() && (robot.head_angle() - self.angle).abs() <= self.tolerance
    }
}

impl Action for MoveHeadToAngle {
    fn name(&self) -> &str {
        "MoveHeadToAngle"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::HEAD
    }

    fn is_interruptible(&self) -> bool {
        true
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if self.in_position(robot) {
            return ActionResult::Success;
        }
        match robot.move_head_to_angle(self.angle) {
            Ok(()) => ActionResult::Running,
            Err(e) => {
                warn!(error = %e, "Head command failed");
                ActionResult::FailureAbort
            }
        }
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if self.in_position(robot) {
            ActionResult::Success
        } else {
            ActionResult::Running
        }
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Turn in place to face a pose.
#[derive(Debug, Clone)]
pub struct TurnTowardsPose {
    target: Pose3d,
    tolerance: f32,
    heading: f32,
}

impl TurnTowardsPose {
    /// Face `target`.
    pub const fn new(target: Pose3d) -> Self {
        Self {
            target,
            tolerance: DEFAULT_TURN_TOLERANCE,
            heading: 0.0,
        }
    }

    fn facing(&self, robot: &dyn Robot) -> bool {
        angle_difference(self.heading, robot.pose().heading).abs() <= self.tolerance
    }
}

impl Action for TurnTowardsPose {
    fn name(&self) -> &str {
        "TurnTowardsPose"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::BODY
    }

    fn is_interruptible(&self) -> bool {
        true
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        self.heading = robot.pose().bearing_to(&self.target);
        if self.facing(robot) {
            return ActionResult::Success;
        }
        match robot.turn_to_heading(self.heading) {
            Ok(()) => ActionResult::Running,
            Err(e) => {
                warn!(error = %e, "Turn command failed");
                ActionResult::FailureAbort
            }
        }
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if robot.is_body_moving() {
            ActionResult::Running
        } else if self.facing(robot) {
            ActionResult::Success
        } else {
            ActionResult::FailureRetry
        }
    }
}

// ---------------------------------------------------------------------------
// Drive
// ---------------------------------------------------------------------------

/// Follow a path to a pose.
#[derive(Debug, Clone)]
pub struct DriveToPose {
    pose: Pose3d,
    motion: MotionProfile,
    tolerance_mm: f32,
}

impl DriveToPose {
    /// Drive to `pose` with `motion`.
    pub const fn new(pose: Pose3d, motion: MotionProfile) -> Self {
        Self {
            pose,
            motion,
            tolerance_mm: DEFAULT_DRIVE_TOLERANCE_MM,
        }
    }
}

impl Action for DriveToPose {
    fn name(&self) -> &str {
        "DriveToPose"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::BODY
    }

    fn is_interruptible(&self) -> bool {
        true
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if robot.pose().xy_distance(&self.pose) <= self.tolerance_mm {
            return ActionResult::Success;
        }
        match robot.drive_to_pose(&self.pose, &self.motion) {
            Ok(()) => ActionResult::Running,
            Err(e) => {
                warn!(error = %e, "Drive command failed");
                ActionResult::FailureAbort
            }
        }
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if robot.is_traversing_path() {
            ActionResult::Running
        } else if robot.pose().xy_distance(&self.pose) <= self.tolerance_mm {
            ActionResult::Success
        } else {
            ActionResult::FailureRetry
        }
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        if robot.is_traversing_path() {
            robot.abort_driving();
        }
    }
}

// ---------------------------------------------------------------------------
// Wait
// ---------------------------------------------------------------------------

/// Do nothing for a while.
#[derive(Debug, Clone)]
pub struct Wait {
    duration: TimeDelta,
    until: Option<DateTime<Utc>>,
}

impl Wait {
    /// Wait for `duration`.
    pub const fn new(duration: TimeDelta) -> Self {
        Self {
            duration,
            until: None,
        }
    }
}

impl Action for Wait {
    fn name(&self) -> &str {
        "Wait"
    }

    fn is_interruptible(&self) -> bool {
        true
    }

    fn timeout(&self) -> Option<TimeDelta> {
        None
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        self.until = robot.now().checked_add_signed(self.duration);
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        match self.until {
            Some(until) if robot.now() < until => ActionResult::Running,
            _ => ActionResult::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use maneuver_types::Track;
    use maneuver_world::{RobotState, SimParams, SimRobot};

    use super::*;
    use crate::action::ActionRunner;

    #[allow(clippy::unwrap_used)]
    fn robot() -> SimRobot {
        SimRobot::new(SimParams::default(), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    fn run(robot: &mut SimRobot, runner: &mut ActionRunner, max_ticks: u32) -> ActionResult {
        for _ in 0..max_ticks {
            let result = runner.update(robot);
            if result.is_terminal() {
                return result;
            }
            robot.tick();
        }
        ActionResult::Running
    }

    #[test]
    fn out_of_fov_picks_nearer_preset() {
        let presets = LiftPresets::default();
        assert_eq!(
            presets.height_for(LiftPreset::OutOfFov, 40.0).to_bits(),
            presets.low_dock.to_bits()
        );
        assert_eq!(
            presets.height_for(LiftPreset::OutOfFov, 80.0).to_bits(),
            presets.carry.to_bits()
        );
    }

    #[test]
    fn lift_heights_are_clipped() {
        let presets = LiftPresets::default();
        assert_eq!(presets.clip(500.0).to_bits(), presets.max_height.to_bits());
        assert_eq!(presets.clip(-5.0).to_bits(), presets.min_height.to_bits());
    }

    #[test]
    fn lift_already_in_position_succeeds_at_init() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(MoveLiftToHeight::to_preset(
            LiftPreset::LowDock,
            LiftPresets::default(),
        ));
        assert_eq!(runner.update(&mut robot), ActionResult::Success);
    }

    #[test]
    fn lift_moves_to_carry_and_locks_track() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(MoveLiftToHeight::to_preset(
            LiftPreset::Carry,
            LiftPresets::default(),
        ));
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert!(robot.track_locks().is_locked(Track::Lift));
        assert_eq!(run(&mut robot, &mut runner, 50), ActionResult::Success);
        assert!((robot.lift_height() - 92.0).abs() <= 5.0);
        assert!(!robot.track_locks().is_locked(Track::Lift));
    }

    #[test]
    fn lift_variability_stays_in_range() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(
            MoveLiftToHeight::to_preset(LiftPreset::HighDock, LiftPresets::default())
                .with_variability(3.0),
        );
        assert_eq!(run(&mut robot, &mut runner, 50), ActionResult::Success);
        assert!((robot.lift_height() - 76.0).abs() <= 8.0);
    }

    #[test]
    fn head_tilts_down() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(MoveHeadToAngle::new(-0.4));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
        assert!((robot.head_angle() + 0.4).abs() <= DEFAULT_HEAD_TOLERANCE);
    }

    #[test]
    fn head_angle_is_clipped() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(MoveHeadToAngle::new(-3.0));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
        assert!((robot.head_angle() - HEAD_ANGLE_MIN).abs() <= DEFAULT_HEAD_TOLERANCE);
    }

    #[test]
    fn turn_faces_target() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(TurnTowardsPose::new(Pose3d::new(0.0, 100.0, 0.0, 0.0)));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
        assert!(angle_difference(robot.pose().heading, core::f32::consts::FRAC_PI_2).abs() < 0.05);
    }

    #[test]
    fn drive_arrives() {
        let mut robot = robot();
        let target = Pose3d::new(100.0, 0.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(DriveToPose::new(target, MotionProfile::default()));
        assert_eq!(run(&mut robot, &mut runner, 30), ActionResult::Success);
        assert!(robot.pose().xy_distance(&target) < 1.0);
    }

    #[test]
    fn cancelled_drive_stops_path() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(DriveToPose::new(
            Pose3d::new(500.0, 0.0, 0.0, 0.0),
            MotionProfile::default(),
        ));
        runner.update(&mut robot);
        assert!(robot.is_traversing_path());
        runner.cancel(&mut robot);
        assert!(!robot.is_traversing_path());
    }

    #[test]
    fn wait_elapses() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(Wait::new(TimeDelta::milliseconds(100)));
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert_eq!(run(&mut robot, &mut runner, 10), ActionResult::Success);
    }
}
