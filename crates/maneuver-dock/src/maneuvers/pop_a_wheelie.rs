//! Tipping onto the back by pressing down on a cube.

use maneuver_types::{
    ActionResult, AnimationTrigger, DockManeuver, ObjectId, ObjectInteractionResult, PreActionType,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{info, warn};

use super::{require_empty_handed, require_low};
use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Body pitch (rad) that counts as a wheelie.
pub const MIN_WHEELIE_PITCH: f32 = 1.0;

/// Docking action that pops a wheelie off a cube.
pub type PopAWheelieAction = DockAction<PopAWheelie>;

impl DockAction<PopAWheelie> {
    /// Pop a wheelie using `object`.
    pub fn pop_a_wheelie(object: ObjectId, settings: DockSettings) -> Self {
        Self::new(object, PopAWheelie, settings)
    }
}

/// Wheelie hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopAWheelie;

impl Maneuver for PopAWheelie {
    fn name(&self) -> &'static str {
        "PopAWheelie"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Docking
    }

    fn check_for_object_on_top(&self) -> bool {
        true
    }

    fn lift_moving_animation(&self) -> Option<AnimationTrigger> {
        Some(AnimationTrigger::SoundLiftEffortWheelie)
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        require_low(ctx, &*robot, self.name())?;
        require_empty_handed(&*robot, self.name())?;
        Ok(DockManeuver::PopAWheelie)
    }

    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if !robot.last_pick_or_place_succeeded() {
            warn!("Firmware reported wheelie failure");
            ctx.interaction = ObjectInteractionResult::UnknownProblem;
            return ActionResult::FailureRetry;
        }
        let pitch = robot.pitch_angle();
        if pitch < MIN_WHEELIE_PITCH {
            info!(pitch, "Pitch too low for a wheelie");
            ctx.interaction = ObjectInteractionResult::UnknownProblem;
            return ActionResult::FailureRetry;
        }
        info!(pitch, "Wheelie popped");
        ActionResult::Success
    }
}

#[cfg(test)]
mod tests {
    use maneuver_types::{MarkerCode, ObjectType};
    use maneuver_world::RobotCommands;

    use super::*;
    use crate::maneuvers::testing::{context, robot_at_cube};

    #[test]
    fn shallow_pitch_is_retryable() {
        let (mut robot, cube) = robot_at_cube();
        let mut ctx = context(&robot, cube, MarkerCode(12));
        robot.set_last_pick_or_place_succeeded(true);
        robot.set_pitch(0.5);
        assert_eq!(PopAWheelie.verify(&mut ctx, &mut robot), ActionResult::FailureRetry);
        robot.set_pitch(1.2);
        assert_eq!(PopAWheelie.verify(&mut ctx, &mut robot), ActionResult::Success);
    }

    #[test]
    fn carrying_robot_cannot_wheelie() {
        let (mut robot, cube) = robot_at_cube();
        let other = robot.add_cube(ObjectType::LightCube2, 0.0, 300.0, 0.0);
        robot.set_carrying_object(other, MarkerCode(20));
        let mut ctx = context(&robot, cube, MarkerCode(12));
        assert_eq!(
            PopAWheelie.select_dock_maneuver(&mut ctx, &mut robot),
            Err(SelectionFailure::abort(ObjectInteractionResult::StillCarrying))
        );
    }
}
