//! Picking up a cube.
//!
//! After the firmware reports the lift came up, the robot turns back to
//! where the cube was. If the world model still holds a cube of the same
//! type at that spot, the lift came up empty: the carried record is moved
//! onto the sighting, the duplicate is deleted, and the attempt fails with
//! a retry.

use maneuver_actions::{ActionRunner, ActionSlot, TurnTowardsPose};
use maneuver_types::{
    ActionResult, AnimationTrigger, DockManeuver, DockingMethod, ObjectId, ObjectInteractionResult,
    Pose3d, PreActionType,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{info, warn};

use super::{height_above_robot, require_block};
use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Docking action that picks up a cube.
pub type PickupObject = DockAction<Pickup>;

impl DockAction<Pickup> {
    /// Pick up `object`.
    pub fn pickup(object: ObjectId, settings: DockSettings) -> Self {
        Self::new(object, Pickup::default(), settings)
    }
}

/// Pickup hooks.
#[derive(Debug, Default)]
pub struct Pickup {
    pre_pickup_pose: Option<Pose3d>,
    turn_back: ActionSlot,
    turned_back: bool,
}

impl Pickup {
    /// Pose of the cube before it was picked up.
    pub const fn pre_pickup_pose(&self) -> Option<Pose3d> {
        self.pre_pickup_pose
    }

    /// Id of a same-type object still located at the pickup spot.
    fn object_still_in_place(
        &self,
        ctx: &DockContext,
        carried: ObjectId,
        robot: &dyn Robot,
    ) -> Option<ObjectId> {
        let before = self.pre_pickup_pose?;
        let carried_record = robot.object(carried)?;
        let distance_tol = ctx.settings.same_object_distance_tol * 0.5;
        robot
            .object_ids_of_type(carried_record.object_type)
            .into_iter()
            .find(|&id| {
                robot.object(id).is_some_and(|record| {
                    record.pose.is_same_as_with_ambiguity(
                        &before,
                        &carried_record.rotation_ambiguities,
                        distance_tol,
                        ctx.settings.same_object_angle_tol,
                    )
                })
            })
    }
}

impl Maneuver for Pickup {
    fn name(&self) -> &'static str {
        "PickupObject"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Docking
    }

    fn docking_method(&self) -> DockingMethod {
        DockingMethod::Hybrid
    }

    fn check_for_object_on_top(&self) -> bool {
        true
    }

    fn lift_moving_animation(&self) -> Option<AnimationTrigger> {
        Some(AnimationTrigger::SoundLiftEffortPickup)
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        require_block(ctx, self.name())?;
        self.pre_pickup_pose = Some(ctx.record.pose);
        self.turned_back = false;

        if let Some(carried) = robot.carrying_object() {
            info!(%carried, "Already carrying an object, cannot pick up");
            return Err(SelectionFailure::abort(ObjectInteractionResult::StillCarrying));
        }
        if height_above_robot(ctx, &*robot) > ctx.settings.high_dock_threshold() {
            Ok(DockManeuver::PickupHigh)
        } else {
            Ok(DockManeuver::PickupLow)
        }
    }

    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if !self.turned_back {
            if !self.turn_back.is_occupied() {
                let target = self.pre_pickup_pose.unwrap_or(ctx.record.pose);
                let turn = ActionRunner::new(TurnTowardsPose::new(target))
                    .without_completion_signal()
                    .with_track_locking_suppressed();
                self.turn_back.set(robot, turn);
            }
            if self.turn_back.update(robot) == Some(ActionResult::Running) {
                return ActionResult::Running;
            }
            self.turned_back = true;
        }

        let Some(carried) = robot.carrying_object() else {
            warn!(object = %ctx.object, "Expected to be carrying after pickup");
            ctx.interaction = ObjectInteractionResult::NotCarrying;
            return ActionResult::FailureRetry;
        };
        if robot.object(carried).is_none() {
            warn!(%carried, "Carried object no longer exists");
            ctx.interaction = ObjectInteractionResult::InvalidObject;
            return ActionResult::FailureAbort;
        }

        let Some(seen) = self.object_still_in_place(ctx, carried, &*robot) else {
            info!(object = %carried, "Pickup succeeded");
            return ActionResult::Success;
        };

        if seen != carried {
            if let Some(pose) = robot.object(seen).map(|record| record.pose) {
                info!(%carried, duplicate = %seen, "Moving carried object onto sighting at pickup spot");
                robot.set_object_pose(carried, pose);
            }
            robot.delete_object(seen);
        }
        robot.unset_carrying_object();
        warn!(object = %carried, "Pickup failed, object still in place");
        ctx.interaction = ObjectInteractionResult::NotCarrying;
        ActionResult::FailureRetry
    }

    fn completion_objects(&self, ctx: &DockContext, robot: &dyn Robot) -> Vec<ObjectId> {
        vec![robot.carrying_object().unwrap_or(ctx.object)]
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        self.turn_back.clear(robot);
    }
}

#[cfg(test)]
mod tests {
    use maneuver_types::{MarkerCode, ObjectType};
    use maneuver_world::{RobotCommands, RobotState, WorldQuery};

    use super::*;
    use crate::maneuvers::testing::{context, robot_at_cube};

    #[test]
    fn cube_on_ground_is_picked_up_low() {
        let (mut robot, cube) = robot_at_cube();
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let mut pickup = Pickup::default();
        let chosen = pickup.select_dock_maneuver(&mut ctx, &mut robot);
        assert_eq!(chosen, Ok(DockManeuver::PickupLow));
        assert_eq!(pickup.pre_pickup_pose(), Some(ctx.record.pose));
    }

    #[test]
    fn stacked_cube_is_picked_up_high() {
        let (mut robot, cube) = robot_at_cube();
        if let Some(record) = robot.object_mut(cube) {
            record.pose.translation.z = 66.0;
        }
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let chosen = Pickup::default().select_dock_maneuver(&mut ctx, &mut robot);
        assert_eq!(chosen, Ok(DockManeuver::PickupHigh));
    }

    #[test]
    fn carrying_robot_cannot_pick_up() {
        let (mut robot, cube) = robot_at_cube();
        let other = robot.add_cube(ObjectType::LightCube2, 0.0, 300.0, 0.0);
        robot.set_carrying_object(other, MarkerCode(20));
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let chosen = Pickup::default().select_dock_maneuver(&mut ctx, &mut robot);
        assert_eq!(
            chosen,
            Err(SelectionFailure::abort(ObjectInteractionResult::StillCarrying))
        );
    }

    #[test]
    fn not_carrying_after_dock_is_retryable() {
        let (mut robot, cube) = robot_at_cube();
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let mut pickup = Pickup::default();
        assert!(pickup.select_dock_maneuver(&mut ctx, &mut robot).is_ok());
        assert_eq!(pickup.verify(&mut ctx, &mut robot), ActionResult::FailureRetry);
        assert_eq!(ctx.interaction, ObjectInteractionResult::NotCarrying);
    }

    #[test]
    fn duplicate_at_pickup_spot_clears_carry() {
        let (mut robot, cube) = robot_at_cube();
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let mut pickup = Pickup::default();
        assert!(pickup.select_dock_maneuver(&mut ctx, &mut robot).is_ok());

        // Carried record moved away, ghost left at the old spot.
        robot.set_carrying_object(cube, MarkerCode(12));
        robot.set_object_pose(cube, Pose3d::new(200.0, 0.0, 92.0, 0.0));
        let ghost = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);

        assert_eq!(pickup.verify(&mut ctx, &mut robot), ActionResult::FailureRetry);
        assert_eq!(robot.carrying_object(), None);
        assert!(robot.object(ghost).is_none());
        assert!(
            robot
                .object(cube)
                .is_some_and(|r| (r.pose.z() - 22.0).abs() < 1e-3)
        );
    }

    #[test]
    fn clean_pickup_verifies() {
        let (mut robot, cube) = robot_at_cube();
        let mut ctx = context(&robot, cube, MarkerCode(12));
        let mut pickup = Pickup::default();
        assert!(pickup.select_dock_maneuver(&mut ctx, &mut robot).is_ok());
        robot.set_carrying_object(cube, MarkerCode(12));
        robot.set_object_pose(cube, Pose3d::new(200.0, 0.0, 92.0, 0.0));
        assert_eq!(pickup.verify(&mut ctx, &mut robot), ActionResult::Success);
        assert_eq!(pickup.completion_objects(&ctx, &robot), vec![cube]);
    }
}
