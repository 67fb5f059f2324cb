//! Robot and world seams for the maneuver execution engine.
//!
//! Actions never talk to hardware or perception directly. Everything they
//! need is consumed through the narrow traits in [`robot`], and every
//! asynchronous signal arrives through the [`events`] bus.
//!
//! # Modules
//!
//! - [`error`] -- Error types for commands and world bookkeeping.
//! - [`events`] -- Event bus with drop-to-unsubscribe handles.
//! - [`pre_action`] -- Pure approach-pose selection and distance thresholds.
//! - [`registry`] -- Track-lock and action-tag registries.
//! - [`robot`] -- [`RobotState`], [`WorldQuery`], [`RobotCommands`] and the
//!   umbrella [`Robot`] trait.
//! - [`sim`] -- In-memory simulated robot implementing every seam.
//!
//! [`RobotState`]: robot::RobotState
//! [`WorldQuery`]: robot::WorldQuery
//! [`RobotCommands`]: robot::RobotCommands
//! [`Robot`]: robot::Robot

pub mod error;
pub mod events;
pub mod pre_action;
pub mod registry;
pub mod robot;
pub mod sim;

// Re-export primary types at crate root.
pub use error::{CommandError, WorldError};
pub use events::{EventBus, EventKind, ObjectObservation, RobotEvent, Subscription};
pub use pre_action::{
    ApproachParams, PoseSelection, SelectionFailure, closest_pose_index, distance_threshold,
    filter_by_approach_angle, select_pre_action_pose,
};
pub use registry::{TagRegistry, TrackLocks};
pub use robot::{Robot, RobotCommands, RobotState, WorldQuery};
pub use sim::{FirmwareScript, SimParams, SimRobot};
