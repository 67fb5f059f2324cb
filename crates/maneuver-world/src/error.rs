//! Error types for the `maneuver-world` crate.

use maneuver_types::{ActionTag, ObjectId};

/// A command could not be delivered to the robot.
///
/// Actions treat any of these as a command-transport failure and abort.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The robot refused the command in its current state.
    #[error("{command} rejected: {reason}")]
    Rejected {
        /// Name of the refused command.
        command: &'static str,
        /// Why it was refused.
        reason: String,
    },

    /// The command referenced an object the robot does not know.
    #[error("{command} references unknown object {object}")]
    UnknownObject {
        /// Name of the command.
        command: &'static str,
        /// The unknown object.
        object: ObjectId,
    },

    /// The link to the robot is down.
    #[error("robot link unavailable")]
    Disconnected,
}

/// Errors from world-model bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// An object was not found in the world model.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// An object with this id is already known.
    #[error("duplicate object id: {0}")]
    DuplicateObject(ObjectId),

    /// The requested action tag is already in use.
    #[error("action tag {0} already in use")]
    TagInUse(ActionTag),

    /// The tag space is exhausted.
    #[error("no free action tags left")]
    TagsExhausted,
}
