//! Rolling a cube over by one face.
//!
//! The marker on top before the roll is expected to face the robot
//! afterwards. The robot looks down and waits to see it. A failed check
//! latches the deep-roll variant for the next attempt.

use std::cell::Cell;
use std::rc::Rc;

use maneuver_actions::{
    Action, ActionRunner, ActionSlot, CompoundSequential, MoveHeadToAngle, VisuallyVerifyObject,
};
use maneuver_types::{
    ActionResult, AnimationTrigger, DockManeuver, MarkerCode, ObjectId, ObjectInteractionResult,
    PreActionType, TargetKind,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{debug, info, warn};

use super::{require_block, require_empty_handed, require_low};
use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Head angle used to look at a freshly rolled cube (rad).
pub const LOOK_DOWN_ANGLE: f32 = -0.35;

/// Below this many sightings during the approach one sighting of the
/// expected marker is enough.
pub const FEW_OBSERVATIONS: u32 = 5;

/// Docking action that rolls a cube.
pub type RollObject = DockAction<Roll>;

impl DockAction<Roll> {
    /// Roll `object`, sharing `latch` with later attempts.
    pub fn roll(object: ObjectId, latch: DeepRollLatch, settings: DockSettings) -> Self {
        Self::new(object, Roll::new(latch), settings)
    }
}

/// Remembers across attempts that a shallow roll was not verified.
///
/// Clones share the same flag; give every attempt built by one retry
/// factory a clone of the same latch.
#[derive(Debug, Clone, Default)]
pub struct DeepRollLatch(Rc<Cell<bool>>);

impl DeepRollLatch {
    /// A latch with deep rolling off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next attempt rolls deep.
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Request a deep roll on the next attempt.
    pub fn set(&self) {
        self.0.set(true);
    }
}

/// Roll hooks.
#[derive(Debug)]
pub struct Roll {
    latch: DeepRollLatch,
    expected_marker: Option<MarkerCode>,
    observations_at_start: u32,
    verify: ActionSlot,
}

impl Roll {
    /// Roll hooks sharing `latch`.
    pub const fn new(latch: DeepRollLatch) -> Self {
        Self {
            latch,
            expected_marker: None,
            observations_at_start: 0,
            verify: ActionSlot::new(),
        }
    }

    /// Marker expected to face the robot after rolling.
    pub const fn expected_marker(&self) -> Option<MarkerCode> {
        self.expected_marker
    }

    /// Sightings required given how often the cube was seen on approach.
    const fn required_sightings(observed_on_approach: u32, default: usize) -> usize {
        if observed_on_approach < FEW_OBSERVATIONS {
            1
        } else {
            default
        }
    }
}

impl Maneuver for Roll {
    fn name(&self) -> &'static str {
        "RollObject"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Rolling
    }

    fn check_for_object_on_top(&self) -> bool {
        true
    }

    fn lift_moving_animation(&self) -> Option<AnimationTrigger> {
        Some(AnimationTrigger::SoundLiftEffortRoll)
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        require_block(ctx, self.name())?;
        let TargetKind::Block {
            top_marker: Some(top),
        } = ctx.target
        else {
            warn!(object = %ctx.object, "Top marker unknown, cannot verify a roll");
            return Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject));
        };
        require_low(ctx, &*robot, self.name())?;
        require_empty_handed(&*robot, self.name())?;

        self.expected_marker = Some(top);
        self.observations_at_start = ctx.record.times_observed;
        if self.latch.is_set() {
            debug!(object = %ctx.object, "Rolling deep after an unverified roll");
            Ok(DockManeuver::DeepRollLow)
        } else {
            Ok(DockManeuver::RollLow)
        }
    }

    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if !robot.last_pick_or_place_succeeded() {
            warn!("Firmware reported roll failure");
            return ActionResult::FailureRetry;
        }
        if robot.carrying_object().is_some() {
            warn!("Expected not to be carrying after a roll");
            ctx.interaction = ObjectInteractionResult::StillCarrying;
            return ActionResult::FailureAbort;
        }
        let Some(expected) = self.expected_marker else {
            ctx.interaction = ObjectInteractionResult::UnknownProblem;
            return ActionResult::FailureAbort;
        };

        if !self.verify.is_occupied() {
            let seen_now = robot.object(ctx.object).map_or(0, |r| r.times_observed);
            let observed = seen_now.saturating_sub(self.observations_at_start);
            let sightings = Self::required_sightings(observed, ctx.settings.verify_sightings);
            debug!(marker = %expected, observed, sightings, "Verifying roll");
            let steps: Vec<Box<dyn Action>> = vec![
                Box::new(MoveHeadToAngle::new(LOOK_DOWN_ANGLE)),
                Box::new(
                    VisuallyVerifyObject::new(ctx.object, expected, ctx.settings.lift)
                        .with_required_sightings(sightings),
                ),
            ];
            let runner = ActionRunner::new(CompoundSequential::new(steps).named("VerifyRoll"))
                .without_completion_signal()
                .with_track_locking_suppressed();
            self.verify.set(robot, runner);
        }

        match self.verify.update(robot) {
            Some(ActionResult::Running) => ActionResult::Running,
            Some(ActionResult::Success) | None => {
                info!(object = %ctx.object, marker = %expected, "Roll verified");
                ActionResult::Success
            }
            Some(_) => {
                warn!(object = %ctx.object, marker = %expected, "Roll not verified, next attempt rolls deep");
                self.latch.set();
                ctx.interaction = ObjectInteractionResult::VisualVerificationFailed;
                ActionResult::FailureRetry
            }
        }
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        self.verify.clear(robot);
    }
}
