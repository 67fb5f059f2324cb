//! Backing onto the charger.

use chrono::TimeDelta;
use maneuver_types::{
    ActionResult, DockManeuver, ObjectId, ObjectInteractionResult, PreActionType, TargetKind,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{info, warn};

use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Docking action that mounts the charger.
pub type MountChargerAction = DockAction<MountCharger>;

impl DockAction<MountCharger> {
    /// Mount `charger`.
    pub fn mount_charger(charger: ObjectId, settings: DockSettings) -> Self {
        Self::new(charger, MountCharger, settings)
    }
}

/// Charger hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MountCharger;

impl Maneuver for MountCharger {
    fn name(&self) -> &'static str {
        "MountCharger"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Entry
    }

    fn near_pose_check(&self) -> bool {
        false
    }

    fn verify_delay(&self, ctx: &DockContext) -> TimeDelta {
        ctx.settings.charger_verify_delay
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        if ctx.target != TargetKind::Charger {
            warn!(object = %ctx.object, target = ?ctx.target, "Object is not a charger");
            return Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject));
        }
        robot.set_charger(ctx.object);
        Ok(DockManeuver::MountCharger)
    }

    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if robot.is_on_charger() {
            info!(charger = %ctx.object, "On charger");
            ActionResult::Success
        } else {
            warn!(charger = %ctx.object, "Not on charger after mounting");
            ctx.interaction = ObjectInteractionResult::UnknownProblem;
            ActionResult::FailureRetry
        }
    }
}

#[cfg(test)]
mod tests {
    use maneuver_types::{MarkerCode, Pose3d};
    use maneuver_world::sim::objects::charger_record;

    use super::*;
    use crate::maneuvers::testing::{context, robot};

    #[test]
    fn verify_follows_contact_not_firmware() {
        let mut robot = robot();
        let charger = robot.add_object(charger_record(300.0, 0.0, 0.0)).unwrap_or_default();
        robot.set_pose(Pose3d::new(130.0, 0.0, 0.0, 0.0));
        let mut ctx = context(&robot, charger, MarkerCode(40));
        let mut mount = MountCharger;
        assert_eq!(
            mount.select_dock_maneuver(&mut ctx, &mut robot),
            Ok(DockManeuver::MountCharger)
        );
        assert_eq!(robot.charger(), Some(charger));

        robot.set_last_pick_or_place_succeeded(true);
        robot.set_on_charger(false);
        assert_eq!(mount.verify(&mut ctx, &mut robot), ActionResult::FailureRetry);

        robot.set_last_pick_or_place_succeeded(false);
        robot.set_on_charger(true);
        assert_eq!(mount.verify(&mut ctx, &mut robot), ActionResult::Success);
    }

    #[test]
    fn charger_waits_before_verifying() {
        let mut robot = robot();
        let charger = robot.add_object(charger_record(300.0, 0.0, 0.0)).unwrap_or_default();
        let ctx = context(&robot, charger, MarkerCode(40));
        assert_eq!(MountCharger.verify_delay(&ctx), TimeDelta::milliseconds(1500));
        assert!(!MountCharger.near_pose_check());
    }
}
