//! Visual verification sub-actions.
//!
//! These confirm with the camera what the world model believes: that an
//! object (or one of its markers) is really where it is expected, or that
//! nothing sits at a pose. Docking runs them before committing to a
//! maneuver.

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_types::{ActionResult, LiftPreset, MarkerCode, ObjectId, Pose3d, TrackSet};
use maneuver_world::{EventKind, Robot, RobotEvent, Subscription};
use tracing::{debug, warn};

use crate::action::{Action, ActionRunner, ActionSlot};
use crate::basic::{LiftPresets, MoveLiftToHeight, TurnTowardsPose};

/// How long to keep looking for an object once the lift is clear (ms).
pub const DEFAULT_VERIFY_WAIT_MS: i64 = 1000;

/// Sightings of the requested marker needed to verify an object.
pub const DEFAULT_REQUIRED_SIGHTINGS: usize = 2;

/// How long to watch a pose for unexpected objects (ms).
pub const DEFAULT_EMPTY_POSE_WINDOW_MS: i64 = 200;

/// Wrap a sub-action owned by another action.
fn sub_runner<A: Action + 'static>(action: A, suppress_locks: bool) -> ActionRunner {
    let mut runner = ActionRunner::new(action).without_completion_signal();
    runner.set_track_locking_suppressed(suppress_locks);
    runner
}

// ---------------------------------------------------------------------------
// VisuallyVerifyObject
// ---------------------------------------------------------------------------

/// Confirm that an object, and optionally one of its markers, is visible.
///
/// The lift is first moved out of the camera's view. The deadline restarts
/// whenever the head is moving.
#[derive(Debug)]
pub struct VisuallyVerifyObject {
    object: ObjectId,
    marker: MarkerCode,
    required_sightings: usize,
    wait: TimeDelta,
    presets: LiftPresets,
    suppress_locks: bool,
    lift: ActionSlot,
    subscription: Option<Subscription>,
    object_seen: bool,
    started_at: Option<DateTime<Utc>>,
    deadline: Option<DateTime<Utc>>,
}

impl VisuallyVerifyObject {
    /// Verify `object` through `marker`. [`MarkerCode::ANY`] accepts any
    /// marker of the object.
    pub fn new(object: ObjectId, marker: MarkerCode, presets: LiftPresets) -> Self {
        Self {
            object,
            marker,
            required_sightings: DEFAULT_REQUIRED_SIGHTINGS,
            wait: TimeDelta::milliseconds(DEFAULT_VERIFY_WAIT_MS),
            presets,
            suppress_locks: false,
            lift: ActionSlot::new(),
            subscription: None,
            object_seen: false,
            started_at: None,
            deadline: None,
        }
    }

    /// Number of marker sightings required.
    #[must_use]
    pub fn with_required_sightings(mut self, sightings: usize) -> Self {
        self.required_sightings = sightings.max(1);
        self
    }

    /// How long to look once the lift is clear.
    #[must_use]
    pub const fn with_wait(mut self, wait: TimeDelta) -> Self {
        self.wait = wait;
        self
    }

    fn sightings(&self, robot: &dyn Robot) -> usize {
        let Some(since) = self.started_at else {
            return 0;
        };
        robot
            .observed_markers_since(self.object, since)
            .iter()
            .filter(|seen| self.marker.matches(seen.code))
            .count()
    }
}

impl Action for VisuallyVerifyObject {
    fn name(&self) -> &str {
        "VisuallyVerifyObject"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::HEAD
    }

    fn declared_tracks(&self) -> TrackSet {
        TrackSet::HEAD.union(TrackSet::LIFT)
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if robot.object(self.object).is_none() {
            warn!(object = %self.object, "Object to verify does not exist");
            return ActionResult::FailureAbort;
        }
        self.subscription = Some(robot.events().subscribe(EventKind::ObjectObserved));
        self.object_seen = false;
        self.started_at = Some(robot.now());
        self.deadline = None;
        self.lift.set(
            robot,
            sub_runner(
                MoveLiftToHeight::to_preset(LiftPreset::OutOfFov, self.presets),
                self.suppress_locks,
            ),
        );
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        match self.lift.update(robot) {
            Some(ActionResult::Running) => return ActionResult::Running,
            Some(ActionResult::Success) | None => {}
            Some(failure) => return failure,
        }

        if robot.object(self.object).is_none() {
            warn!(object = %self.object, "Object disappeared during verification");
            return ActionResult::FailureAbort;
        }

        let now = robot.now();
        if self.deadline.is_none() || robot.is_head_moving() {
            self.deadline = now.checked_add_signed(self.wait);
        }

        if let Some(subscription) = self.subscription.as_mut() {
            let object = self.object;
            let seen = subscription.drain().into_iter().any(|event| {
                matches!(event, RobotEvent::ObjectObserved(obs) if obs.object == object && obs.markers_visible())
            });
            self.object_seen |= seen;
        }

        if self.object_seen {
            let sightings = self.sightings(robot);
            if sightings >= self.required_sightings {
                debug!(object = %self.object, marker = %self.marker, sightings, "Object verified");
                return ActionResult::Success;
            }
        }

        if self.deadline.is_some_and(|deadline| now > deadline) {
            warn!(
                object = %self.object,
                marker = %self.marker,
                seen = self.object_seen,
                "Object not verified in time"
            );
            return ActionResult::FailureAbort;
        }
        ActionResult::Running
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        self.lift.clear(robot);
        self.subscription = None;
    }

    fn set_nested_track_locking_suppressed(&mut self, suppressed: bool) {
        self.suppress_locks = suppressed;
    }
}

// ---------------------------------------------------------------------------
// VisuallyVerifyNoObjectAtPose
// ---------------------------------------------------------------------------

/// Confirm that nothing is observed near a pose for a short window.
#[derive(Debug)]
pub struct VisuallyVerifyNoObjectAtPose {
    pose: Pose3d,
    radius_mm: f32,
    window: TimeDelta,
    ignored: Vec<ObjectId>,
    started_at: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl VisuallyVerifyNoObjectAtPose {
    /// Watch `pose` for objects within `radius_mm`.
    pub fn new(pose: Pose3d, radius_mm: f32) -> Self {
        Self {
            pose,
            radius_mm,
            window: TimeDelta::milliseconds(DEFAULT_EMPTY_POSE_WINDOW_MS),
            ignored: Vec::new(),
            started_at: None,
            until: None,
        }
    }

    /// Do not count `object` as an intruder.
    #[must_use]
    pub fn ignoring(mut self, object: ObjectId) -> Self {
        self.ignored.push(object);
        self
    }

    /// How long to watch.
    #[must_use]
    pub const fn with_window(mut self, window: TimeDelta) -> Self {
        self.window = window;
        self
    }
}

impl Action for VisuallyVerifyNoObjectAtPose {
    fn name(&self) -> &str {
        "VisuallyVerifyNoObjectAtPose"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::HEAD
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let now = robot.now();
        self.started_at = Some(now);
        self.until = now.checked_add_signed(self.window);
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let (Some(since), Some(until)) = (self.started_at, self.until) else {
            return ActionResult::FailureAbort;
        };
        let intruder = robot
            .objects_observed_near(&self.pose, self.radius_mm, since)
            .into_iter()
            .find(|id| !self.ignored.contains(id));
        if let Some(intruder) = intruder {
            warn!(object = %intruder, "Unexpected object observed at pose");
            return ActionResult::FailureAbort;
        }
        if robot.now() >= until {
            ActionResult::Success
        } else {
            ActionResult::Running
        }
    }
}

// ---------------------------------------------------------------------------
// TurnTowardsObject
// ---------------------------------------------------------------------------

/// Turn to face the closest marker of an object, then optionally verify it.
#[derive(Debug)]
pub struct TurnTowardsObject {
    object: ObjectId,
    marker: MarkerCode,
    verify: bool,
    required_sightings: usize,
    presets: LiftPresets,
    suppress_locks: bool,
    step: ActionSlot,
    verifying: bool,
}

impl TurnTowardsObject {
    /// Face `object` through `marker` ([`MarkerCode::ANY`] for any).
    pub const fn new(object: ObjectId, marker: MarkerCode, presets: LiftPresets) -> Self {
        Self {
            object,
            marker,
            verify: false,
            required_sightings: DEFAULT_REQUIRED_SIGHTINGS,
            presets,
            suppress_locks: false,
            step: ActionSlot::new(),
            verifying: false,
        }
    }

    /// Visually verify the object once facing it.
    #[must_use]
    pub const fn with_verification(mut self) -> Self {
        self.verify = true;
        self
    }

    /// Number of sightings verification requires.
    #[must_use]
    pub const fn with_required_sightings(mut self, sightings: usize) -> Self {
        self.required_sightings = sightings;
        self
    }
}

impl Action for TurnTowardsObject {
    fn name(&self) -> &str {
        "TurnTowardsObject"
    }

    fn declared_tracks(&self) -> TrackSet {
        TrackSet::ALL
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let Some(record) = robot.object(self.object) else {
            warn!(object = %self.object, "Object to turn towards does not exist");
            return ActionResult::FailureAbort;
        };
        let robot_pose = robot.pose();
        let target = record
            .markers
            .iter()
            .filter(|m| self.marker.matches(m.code))
            .map(|m| record.marker_pose(m))
            .min_by(|a, b| a.xy_distance(&robot_pose).total_cmp(&b.xy_distance(&robot_pose)));
        let Some(target) = target else {
            warn!(object = %self.object, marker = %self.marker, "Object has no such marker");
            return ActionResult::FailureAbort;
        };

        self.verifying = false;
        self.step
            .set(robot, sub_runner(TurnTowardsPose::new(target), self.suppress_locks));
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        match self.step.update(robot) {
            Some(ActionResult::Running) => ActionResult::Running,
            Some(ActionResult::Success) | None if self.verify && !self.verifying => {
                self.verifying = true;
                let verify = VisuallyVerifyObject::new(self.object, self.marker, self.presets)
                    .with_required_sightings(self.required_sightings);
                self.step.set(robot, sub_runner(verify, self.suppress_locks));
                ActionResult::Running
            }
            Some(result) => result,
            None => ActionResult::Success,
        }
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        self.step.clear(robot);
    }

    fn set_nested_track_locking_suppressed(&mut self, suppressed: bool) {
        self.suppress_locks = suppressed;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use maneuver_types::ObjectType;
    use maneuver_world::{RobotState, SimParams, SimRobot, WorldQuery};

    use super::*;

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
    fn verify_visible_marker() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(VisuallyVerifyObject::new(
            cube,
            MarkerCode(12),
            LiftPresets::default(),
        ));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
    }

    #[test]
    fn verify_hidden_marker_times_out() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(VisuallyVerifyObject::new(
            cube,
            MarkerCode(10),
            LiftPresets::default(),
        ));
        assert_eq!(run(&mut robot, &mut runner, 100), ActionResult::FailureAbort);
    }

    #[test]
    fn verify_missing_object_aborts() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(VisuallyVerifyObject::new(
            ObjectId::new(),
            MarkerCode::ANY,
            LiftPresets::default(),
        ));
        assert_eq!(runner.update(&mut robot), ActionResult::FailureAbort);
    }

    #[test]
    fn verify_cleans_up_subscription() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(VisuallyVerifyObject::new(
            cube,
            MarkerCode::ANY,
            LiftPresets::default(),
        ));
        runner.update(&mut robot);
        assert_eq!(robot.events().subscriber_count(EventKind::ObjectObserved), 1);
        runner.cancel(&mut robot);
        assert_eq!(robot.events().subscriber_count(EventKind::ObjectObserved), 0);
    }

    #[test]
    fn turn_then_verify_cube_to_the_side() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 0.0, 200.0, 0.0);
        let mut runner = ActionRunner::new(
            TurnTowardsObject::new(cube, MarkerCode::ANY, LiftPresets::default())
                .with_verification(),
        );
        assert_eq!(run(&mut robot, &mut runner, 60), ActionResult::Success);
        let bearing = robot.pose().bearing_to(&robot.object(cube).map(|c| c.pose).unwrap_or_default());
        assert!(maneuver_types::angle_difference(robot.pose().heading, bearing).abs() < 0.2);
    }

    #[test]
    fn turn_towards_unknown_marker_aborts() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(TurnTowardsObject::new(
            cube,
            MarkerCode(99),
            LiftPresets::default(),
        ));
        assert_eq!(runner.update(&mut robot), ActionResult::FailureAbort);
    }

    #[test]
    fn empty_pose_verifies() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(VisuallyVerifyNoObjectAtPose::new(
            Pose3d::new(200.0, 0.0, 66.0, 0.0),
            22.0,
        ));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
    }

    #[test]
    fn observed_object_at_pose_fails() {
        let mut robot = robot();
        robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(VisuallyVerifyNoObjectAtPose::new(
            Pose3d::new(200.0, 0.0, 22.0, 0.0),
            22.0,
        ));
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::FailureAbort);
    }

    #[test]
    fn ignored_object_is_not_an_intruder() {
        let mut robot = robot();
        let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
        let mut runner = ActionRunner::new(
            VisuallyVerifyNoObjectAtPose::new(Pose3d::new(200.0, 0.0, 22.0, 0.0), 22.0)
                .ignoring(cube),
        );
        assert_eq!(run(&mut robot, &mut runner, 20), ActionResult::Success);
    }
}
