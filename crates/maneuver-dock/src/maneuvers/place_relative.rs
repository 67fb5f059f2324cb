//! Placing the carried cube beside or on top of another object.
//!
//! Offsets may be given as seen from the robot; they are rotated into the
//! target's frame when the robot faces one of the target's sides squarely.

use core::f32::consts::{FRAC_PI_2, PI};

use maneuver_actions::{Action, ActionRunner, ActionSlot, MoveLiftToHeight, TurnTowardsObject};
use maneuver_types::{
    ActionResult, AnimationTrigger, DockManeuver, DockingMethod, LiftPreset, MarkerCode, ObjectId,
    ObjectInteractionResult, PlacementOffset, PreActionType, TargetKind, angle_difference,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{debug, info, warn};

use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Vertical tolerance when walking up a stack (mm).
pub const STACK_Z_TOLERANCE_MM: f32 = 15.0;

/// Largest stack reported in a completion payload.
const MAX_STACK_REPORT: usize = 5;

/// How far the robot may be rotated from one of the target's sides and
/// still have relative offsets transformed (rad).
pub const SIDE_ALIGNMENT_TOLERANCE: f32 = PI / 12.0;

/// Docking action that places the carried cube relative to an object.
pub type PlaceRelativeObject = DockAction<PlaceRelative>;

impl DockAction<PlaceRelative> {
    /// Put the carried cube on the ground next to `object`.
    pub fn place_next_to(object: ObjectId, offset: RelativeOffset, settings: DockSettings) -> Self {
        Self::new(object, PlaceRelative::on_ground(offset), settings)
    }

    /// Stack the carried cube on top of `object`.
    pub fn place_on_top(object: ObjectId, settings: DockSettings) -> Self {
        Self::new(object, PlaceRelative::on_top(), settings)
    }
}

/// Placement offset as requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RelativeOffset {
    /// Offset along the first axis (mm).
    pub x_mm: f32,
    /// Offset along the second axis (mm).
    pub y_mm: f32,
    /// When false the offsets are as seen from the robot and get rotated
    /// into the target's frame; when true they already are relative to the
    /// docking marker.
    pub relative_to_marker: bool,
}

impl RelativeOffset {
    /// No offset from the marker.
    pub const CENTERED: Self = Self {
        x_mm: 0.0,
        y_mm: 0.0,
        relative_to_marker: true,
    };
}

/// Rotate offsets seen from the robot into the target's frame.
///
/// `relative_rotation` is the target's heading relative to the robot's.
/// Fails with a retry when the robot does not face a side squarely and
/// with an abort when the result would place behind the marker.
pub fn transform_offsets(
    x_mm: f32,
    y_mm: f32,
    relative_rotation: f32,
) -> Result<(f32, f32), SelectionFailure> {
    let near = |angle: f32| angle_difference(relative_rotation, angle).abs() <= SIDE_ALIGNMENT_TOLERANCE;
    let (x, y) = if near(0.0) {
        (-x_mm, y_mm)
    } else if near(FRAC_PI_2) {
        (y_mm, x_mm)
    } else if near(-FRAC_PI_2) {
        (-y_mm, -x_mm)
    } else if near(PI) {
        (x_mm, -y_mm)
    } else {
        warn!(rotation = relative_rotation, "Robot is not aligned with a side of the target");
        return Err(SelectionFailure::retry(ObjectInteractionResult::UnknownProblem));
    };
    if x < PlacementOffset::MIN_X_MM {
        warn!(x, y, "Placement would be behind the marker");
        return Err(SelectionFailure::abort(ObjectInteractionResult::UnknownProblem));
    }
    Ok((x, y))
}

/// Place-relative hooks.
#[derive(Debug)]
pub struct PlaceRelative {
    on_ground: bool,
    offset: RelativeOffset,
    carried: Option<(ObjectId, MarkerCode)>,
    maneuver: Option<DockManeuver>,
    verify: ActionSlot,
    lowering: bool,
}

impl PlaceRelative {
    const fn new(on_ground: bool, offset: RelativeOffset) -> Self {
        Self {
            on_ground,
            offset,
            carried: None,
            maneuver: None,
            verify: ActionSlot::new(),
            lowering: false,
        }
    }

    /// Place on the ground beside the target.
    pub const fn on_ground(offset: RelativeOffset) -> Self {
        Self::new(true, offset)
    }

    /// Stack on top of the target.
    pub const fn on_top() -> Self {
        Self::new(false, RelativeOffset::CENTERED)
    }

    /// Object and marker that were carried when docking started.
    pub const fn carried(&self) -> Option<(ObjectId, MarkerCode)> {
        self.carried
    }

    fn sub_runner<A: Action + 'static>(action: A) -> ActionRunner {
        ActionRunner::new(action)
            .without_completion_signal()
            .with_track_locking_suppressed()
    }
}

impl Maneuver for PlaceRelative {
    fn name(&self) -> &'static str {
        "PlaceRelObject"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::PlaceRelative
    }

    fn lift_moving_animation(&self) -> Option<AnimationTrigger> {
        Some(AnimationTrigger::SoundLiftEffortPlace)
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        let (Some(carried), Some(marker)) = (robot.carrying_object(), robot.carrying_marker()) else {
            info!("Cannot place without carrying an object");
            return Err(SelectionFailure::abort(ObjectInteractionResult::NotCarrying));
        };

        if !self.on_ground {
            let is_block = matches!(ctx.target, TargetKind::Block { .. });
            let covered = robot.object_on_top_of(ctx.object, STACK_Z_TOLERANCE_MM);
            if !is_block || covered.is_some() {
                warn!(object = %ctx.object, ?covered, "Cannot stack on object");
                return Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject));
            }
        }

        let (mut x, mut y) = (self.offset.x_mm, self.offset.y_mm);
        if !self.offset.relative_to_marker {
            let rotation = angle_difference(ctx.record.pose.heading, robot.pose().heading);
            (x, y) = transform_offsets(x, y, rotation)?;
        }
        if y.abs() > f32::EPSILON {
            ctx.method = DockingMethod::EvenBlinder;
        }
        ctx.placement = PlacementOffset {
            x_mm: x,
            y_mm: y,
            angle_rad: ctx.placement.angle_rad,
        };

        self.carried = Some((carried, marker));
        self.lowering = false;
        let maneuver = if self.on_ground {
            DockManeuver::PlaceLow
        } else {
            DockManeuver::PlaceHigh
        };
        self.maneuver = Some(maneuver);
        debug!(%carried, ?maneuver, x, y, "Placement selected");
        Ok(maneuver)
    }

    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if !robot.last_pick_or_place_succeeded() {
            warn!("Firmware reported placement failure, assuming the cube is still held");
            return ActionResult::FailureRetry;
        }
        if robot.carrying_object().is_some() {
            warn!("Expected to have released the carried object");
            ctx.interaction = ObjectInteractionResult::StillCarrying;
            return ActionResult::FailureAbort;
        }
        let Some((carried, _)) = self.carried else {
            ctx.interaction = ObjectInteractionResult::UnknownProblem;
            return ActionResult::FailureAbort;
        };

        if !self.verify.is_occupied() && !self.lowering {
            let face = TurnTowardsObject::new(carried, MarkerCode::ANY, ctx.settings.lift)
                .with_verification()
                .with_required_sightings(ctx.settings.verify_sightings);
            self.verify.set(robot, Self::sub_runner(face));
        }

        match self.verify.update(robot) {
            Some(ActionResult::Running) => ActionResult::Running,
            Some(ActionResult::Success) | None => {
                if self.maneuver == Some(DockManeuver::PlaceHigh) && !self.lowering {
                    self.lowering = true;
                    let lower = MoveLiftToHeight::to_preset(LiftPreset::LowDock, ctx.settings.lift);
                    self.verify.set(robot, Self::sub_runner(lower));
                    return ActionResult::Running;
                }
                info!(object = %carried, "Placement verified");
                ActionResult::Success
            }
            Some(failure) if self.lowering => failure,
            Some(failure) => {
                warn!(object = %carried, "Placement not verified, clearing carried object");
                robot.clear_object(carried);
                ctx.interaction = ObjectInteractionResult::VisualVerificationFailed;
                failure
            }
        }
    }

    fn completion_objects(&self, ctx: &DockContext, robot: &dyn Robot) -> Vec<ObjectId> {
        let mut stack = Vec::new();
        let mut next = robot.object(ctx.object).map(|_| ctx.object);
        while let Some(id) = next {
            if stack.len() >= MAX_STACK_REPORT || stack.contains(&id) {
                break;
            }
            stack.push(id);
            next = robot.object_on_top_of(id, STACK_Z_TOLERANCE_MM);
        }
        if let Some((carried, _)) = self.carried {
            if !stack.contains(&carried) {
                stack.push(carried);
            }
        }
        stack
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        self.verify.clear(robot);
    }
}
