//! Concrete docking maneuvers.
//!
//! Each maneuver plugs its approach type, firmware maneuver choice and
//! verification into [`crate::protocol::DockAction`].
//!
//! # Modules
//!
//! - [`pickup`] -- Lift an object off the ground or off a stack
//! - [`place_relative`] -- Put the carried object beside or on top of another
//! - [`roll`] -- Roll a cube over by one face
//! - [`align`] -- Drive up to an object without touching it
//! - [`cross_bridge`] -- Drive from one end of a bridge to the other
//! - [`ramp`] -- Drive up or down a ramp
//! - [`mount_charger`] -- Back onto the charger
//! - [`pop_a_wheelie`] -- Tip onto the back using a cube as a lever

pub mod align;
pub mod cross_bridge;
pub mod mount_charger;
pub mod pickup;
pub mod place_relative;
pub mod pop_a_wheelie;
pub mod ramp;
pub mod roll;

pub use align::{Align, AlignWithObject};
pub use cross_bridge::{CrossBridge, CrossBridgeAction};
pub use mount_charger::{MountCharger, MountChargerAction};
pub use pickup::{Pickup, PickupObject};
pub use place_relative::{PlaceRelative, PlaceRelativeObject, RelativeOffset};
pub use pop_a_wheelie::{PopAWheelie, PopAWheelieAction};
pub use ramp::{AscendOrDescendRamp, Ramp, ramp_direction};
pub use roll::{DeepRollLatch, Roll, RollObject};

use maneuver_types::{ObjectInteractionResult, TargetKind};
use maneuver_world::{Robot, SelectionFailure};
use tracing::info;

use crate::maneuver::DockContext;

/// Height of the target above the robot (mm).
fn height_above_robot(ctx: &DockContext, robot: &dyn Robot) -> f32 {
    ctx.record.pose.z() - robot.pose().z()
}

/// Fail unless the target sits low enough to dock with from the ground.
fn require_low(ctx: &DockContext, robot: &dyn Robot, action: &str) -> Result<(), SelectionFailure> {
    let height = height_above_robot(ctx, robot);
    if height > ctx.settings.high_dock_threshold() {
        info!(action, height, "Object is too high");
        return Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject));
    }
    Ok(())
}

/// Fail if the robot carries anything.
fn require_empty_handed(robot: &dyn Robot, action: &str) -> Result<(), SelectionFailure> {
    if let Some(carried) = robot.carrying_object() {
        info!(action, %carried, "Already carrying an object");
        return Err(SelectionFailure::abort(ObjectInteractionResult::StillCarrying));
    }
    Ok(())
}

/// Fail unless the target is a block.
fn require_block(ctx: &DockContext, action: &str) -> Result<(), SelectionFailure> {
    if matches!(ctx.target, TargetKind::Block { .. }) {
        Ok(())
    } else {
        info!(action, target = ?ctx.target, "Only blocks support this maneuver");
        Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject))
    }
}
