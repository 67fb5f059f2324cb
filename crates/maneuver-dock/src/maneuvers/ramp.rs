//! Driving up or down a ramp.

use maneuver_types::{
    ActionResult, DockManeuver, ObjectId, ObjectInteractionResult, Pose3d, PreActionType,
    RampDirection, TargetKind,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{info, warn};

use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Lateral distance from the ramp centre line within which the robot
/// counts as lined up with the slope (mm).
pub const RAMP_LATERAL_TOLERANCE_MM: f32 = 60.0;

/// Docking action that drives over a ramp.
pub type AscendOrDescendRamp = DockAction<Ramp>;

impl DockAction<Ramp> {
    /// Drive up or down `ramp`, whichever the robot's position calls for.
    pub fn traverse_ramp(ramp: ObjectId, settings: DockSettings) -> Self {
        Self::new(ramp, Ramp::default(), settings)
    }
}

/// Which way a robot at `robot` would traverse a ramp.
///
/// On the platform means descending. In front of the foot of the slope,
/// roughly on the centre line, means ascending. Anything else is unknown.
pub fn ramp_direction(
    robot: &Pose3d,
    ramp: &Pose3d,
    slope_length: f32,
    platform_height: f32,
) -> RampDirection {
    if robot.z() - ramp.z() >= platform_height * 0.5 {
        return RampDirection::Descending;
    }
    let local = robot.relative_to(ramp);
    if local.x() < -slope_length * 0.5 && local.y().abs() < RAMP_LATERAL_TOLERANCE_MM {
        RampDirection::Ascending
    } else {
        RampDirection::Unknown
    }
}

/// Ramp hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ramp {
    direction: Option<RampDirection>,
}

impl Ramp {
    /// Direction chosen at selection.
    pub const fn direction(&self) -> Option<RampDirection> {
        self.direction
    }
}

impl Maneuver for Ramp {
    fn name(&self) -> &'static str {
        "AscendOrDescendRamp"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Entry
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        let TargetKind::Ramp {
            pose,
            slope_length,
            platform_height,
        } = ctx.target
        else {
            warn!(object = %ctx.object, target = ?ctx.target, "Object is not a ramp");
            return Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject));
        };

        let direction = ramp_direction(&robot.pose(), &pose, slope_length, platform_height);
        let maneuver = match direction {
            RampDirection::Ascending => DockManeuver::AscendRamp,
            RampDirection::Descending => DockManeuver::DescendRamp,
            RampDirection::Unknown => {
                warn!(ramp = %ctx.object, "Robot is neither at the foot nor on top of the ramp");
                return Err(SelectionFailure::abort(ObjectInteractionResult::UnknownProblem));
            }
        };
        info!(ramp = %ctx.object, ?direction, "Traversing ramp");
        robot.set_ramp(ctx.object, direction);
        self.direction = Some(direction);
        Ok(maneuver)
    }

    fn verify(&mut self, _ctx: &mut DockContext, _robot: &mut dyn Robot) -> ActionResult {
        ActionResult::Success
    }
}
