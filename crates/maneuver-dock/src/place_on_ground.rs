//! Putting the carried object down where the robot stands.
//!
//! Not a docking maneuver: there is no target marker to servo to. The
//! firmware lowers the lift in place, then the robot faces the object it
//! released and confirms it can see it.

use chrono::TimeDelta;
use maneuver_actions::{
    Action, ActionRunner, ActionSlot, CompoundSequential, DriveToPose, TurnTowardsObject,
};
use maneuver_types::{
    ActionResult, CompletionPayload, MarkerCode, ObjectId, ObjectInteractionCompleted,
    ObjectInteractionResult, Pose3d, TrackSet,
};
use maneuver_world::Robot;
use tracing::{debug, info, warn};

use crate::settings::DockSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingStart,
    AwaitingCompletion,
    Verifying,
}

/// Place the carried object on the ground in front of the robot.
#[derive(Debug)]
pub struct PlaceObjectOnGround {
    settings: DockSettings,
    phase: Phase,
    carried: Option<ObjectId>,
    interaction: ObjectInteractionResult,
    verify: ActionSlot,
}

impl PlaceObjectOnGround {
    /// Place using `settings` for motion and verification.
    pub const fn new(settings: DockSettings) -> Self {
        Self {
            settings,
            phase: Phase::AwaitingStart,
            carried: None,
            interaction: ObjectInteractionResult::Incomplete,
            verify: ActionSlot::new(),
        }
    }

    /// Object that was being carried at init.
    pub const fn carried(&self) -> Option<ObjectId> {
        self.carried
    }

    /// Diagnosis so far.
    pub const fn interaction_result(&self) -> ObjectInteractionResult {
        self.interaction
    }

    fn start_verification(&mut self, robot: &mut dyn Robot, carried: ObjectId) {
        let runner = ActionRunner::new(
            TurnTowardsObject::new(carried, MarkerCode::ANY, self.settings.lift)
                .with_verification()
                .with_required_sightings(self.settings.verify_sightings),
        )
        .without_completion_signal()
        .with_track_locking_suppressed();
        self.verify.set(robot, runner);
    }
}

impl Action for PlaceObjectOnGround {
    fn name(&self) -> &str {
        "PlaceObjectOnGround"
    }

    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::ALL
    }

    fn timeout(&self) -> Option<TimeDelta> {
        Some(self.settings.action_timeout)
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        self.phase = Phase::AwaitingStart;
        self.interaction = ObjectInteractionResult::Incomplete;
        self.carried = robot.carrying_object();

        let Some(carried) = self.carried else {
            warn!("Not carrying anything to place");
            self.interaction = ObjectInteractionResult::NotCarrying;
            return ActionResult::FailureAbort;
        };
        if let Err(e) = robot.place_object_on_ground(&self.settings.motion) {
            warn!(object = %carried, error = %e, "Place command failed");
            self.interaction = ObjectInteractionResult::UnknownProblem;
            return ActionResult::FailureAbort;
        }
        info!(object = %carried, "Placing object on ground");
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if self.phase == Phase::AwaitingStart {
            if !robot.is_picking_or_placing() {
                return ActionResult::Running;
            }
            debug!("Place started");
            self.phase = Phase::AwaitingCompletion;
        }

        if self.phase == Phase::AwaitingCompletion {
            if robot.is_picking_or_placing() || robot.is_moving() {
                return ActionResult::Running;
            }
            if !robot.last_pick_or_place_succeeded() {
                warn!("Firmware reported place failure");
                self.interaction = ObjectInteractionResult::UnknownProblem;
                return ActionResult::FailureRetry;
            }
            if robot.carrying_object().is_some() {
                self.interaction = ObjectInteractionResult::StillCarrying;
                return ActionResult::FailureAbort;
            }
            let Some(carried) = self.carried else {
                return ActionResult::FailureAbort;
            };
            self.start_verification(robot, carried);
            self.phase = Phase::Verifying;
        }

        match self.verify.update(robot) {
            Some(ActionResult::Running) => ActionResult::Running,
            Some(ActionResult::Success) | None => {
                info!(object = ?self.carried, "Placed object verified");
                self.interaction = ObjectInteractionResult::Success;
                ActionResult::Success
            }
            Some(failure) => {
                if let Some(carried) = self.carried {
                    warn!(object = %carried, result = ?failure, "Placed object not seen, clearing it");
                    robot.clear_object(carried);
                }
                self.interaction = ObjectInteractionResult::VisualVerificationFailed;
                failure
            }
        }
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        if self.phase != Phase::Verifying && robot.is_picking_or_placing() {
            robot.abort_docking();
        }
        self.verify.clear(robot);
    }

    fn completion_payload(&self, _robot: &dyn Robot) -> CompletionPayload {
        CompletionPayload::ObjectInteraction(ObjectInteractionCompleted {
            object_ids: self.carried.into_iter().collect(),
            result: self.interaction,
        })
    }
}

/// Drive to `pose`, then place the carried object there.
pub fn place_object_on_ground_at_pose(pose: Pose3d, settings: DockSettings) -> CompoundSequential {
    CompoundSequential::new(vec![
        Box::new(DriveToPose::new(pose, settings.motion)),
        Box::new(PlaceObjectOnGround::new(settings)),
    ])
    .named("PlaceObjectOnGroundAtPose")
}
