//! Docking protocol and physical manipulation maneuvers.
//!
//! Every maneuver that makes the robot physically interact with an object
//! runs the same protocol: pick an approach pose, face and visually verify
//! the marker, send one dock command, wait for the firmware, then verify
//! the outcome. The protocol lives in [`protocol::DockAction`]; each
//! maneuver plugs in through the [`maneuver::Maneuver`] hooks.
//!
//! # Modules
//!
//! - [`maneuver`] -- The [`Maneuver`] hooks and the per-attempt [`DockContext`].
//! - [`maneuvers`] -- Pickup, place, roll, align, bridge, ramp, charger and wheelie.
//! - [`place_on_ground`] -- Placing the carried object without a target.
//! - [`protocol`] -- The shared docking state machine.
//! - [`settings`] -- [`DockSettings`] shared by every maneuver.

pub mod maneuver;
pub mod maneuvers;
pub mod place_on_ground;
pub mod protocol;
pub mod settings;

// Re-export primary types at crate root.
pub use maneuver::{DockContext, Maneuver};
pub use maneuvers::{
    Align, AlignWithObject, AscendOrDescendRamp, CrossBridge, CrossBridgeAction, DeepRollLatch,
    MountCharger, MountChargerAction, Pickup, PickupObject, PlaceRelative, PlaceRelativeObject,
    PopAWheelie, PopAWheelieAction, Ramp, RelativeOffset, Roll, RollObject, ramp_direction,
};
pub use place_on_ground::{PlaceObjectOnGround, place_object_on_ground_at_pose};
pub use protocol::{DOCKING_FACE_LAYER, DockAction, DockOptions};
pub use settings::DockSettings;
