//! Shared type definitions for the maneuver execution engine.
//!
//! This crate is the single source of truth for the vocabulary shared by
//! the world seams, the action lifecycle, and the docking maneuvers.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier newtypes (objects, action tags, markers, layers)
//! - [`enums`] -- Outcome taxonomy and maneuver enumerations
//! - [`geometry`] -- Poses, angle helpers, and pose matching
//! - [`tracks`] -- Head/lift/body track sets
//! - [`structs`] -- Object records, pre-action poses, dock commands
//! - [`completion`] -- Completion payloads exposed to the action owner

pub mod completion;
pub mod enums;
pub mod geometry;
pub mod ids;
pub mod structs;
pub mod tracks;

// Re-export all public types at crate root for convenience.
pub use completion::{ActionCompletion, CompletionPayload, ObjectInteractionCompleted};
pub use enums::{
    ActionResult, AlignmentType, AnimationTrigger, DockManeuver, DockingMethod, DockingStatus,
    LiftPreset, ObjectFamily, ObjectInteractionResult, ObjectType, PreActionType, RampDirection,
    VisionMode,
};
pub use geometry::{Pose3d, angle_difference, normalize_angle};
pub use ids::{ActionTag, FaceLayerTag, MarkerCode, ObjectId};
pub use structs::{
    DockCommand, MotionProfile, ObjectMarker, ObjectRecord, ObservedMarker, Obstacle,
    PlacementOffset, PreActionPose, TargetKind,
};
pub use tracks::{Track, TrackSet};
