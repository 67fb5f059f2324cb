//! Action lifecycle and execution for the maneuver engine.
//!
//! An [`Action`] is a resumable unit of robot behavior driven one tick at a
//! time. An [`ActionRunner`] owns one action and enforces its lifecycle:
//! init once, poll until terminal, clean up exactly once, emit a
//! completion signal.
//!
//! # Modules
//!
//! - [`action`] -- The [`Action`] trait, [`ActionRunner`] and [`ActionSlot`].
//! - [`basic`] -- Head, lift, turn, drive and wait primitives.
//! - [`compound`] -- Sequential and parallel composition.
//! - [`error`] -- Queue errors.
//! - [`queue`] -- The per-robot [`ActionList`] with queue positions and retries.
//! - [`verify`] -- Visual verification sub-actions.

pub mod action;
pub mod basic;
pub mod compound;
pub mod error;
pub mod queue;
pub mod verify;

// Re-export primary types at crate root.
pub use action::{Action, ActionRunner, ActionSlot, DEFAULT_ACTION_TIMEOUT_SECS};
pub use basic::{
    DriveToPose, LiftPresets, LiftTarget, MoveHeadToAngle, MoveLiftToHeight, TurnTowardsPose, Wait,
};
pub use compound::{CompoundParallel, CompoundSequential};
pub use error::QueueError;
pub use queue::{ActionFactory, ActionList, QueuePosition};
pub use verify::{TurnTowardsObject, VisuallyVerifyNoObjectAtPose, VisuallyVerifyObject};
