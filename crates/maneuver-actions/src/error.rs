//! Error types for the maneuver-actions crate.

use maneuver_types::{ActionTag, TrackSet};
use maneuver_world::WorldError;

/// Errors returned when an action cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// An action with the same tag is already queued or running.
    #[error("duplicate action tag: {tag}")]
    DuplicateTag {
        /// The rejected tag.
        tag: ActionTag,
    },

    /// A parallel action would drive tracks another slot already uses.
    #[error("track conflict with a running slot: {tracks}")]
    TrackConflict {
        /// Tracks requested by both slots.
        tracks: TrackSet,
    },

    /// The tag registry could not hand out a tag.
    #[error("tag allocation failed: {source}")]
    Tags {
        /// Underlying registry error.
        #[from]
        source: WorldError,
    },
}
