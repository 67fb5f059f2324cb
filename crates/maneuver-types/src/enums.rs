//! Enumeration types for the maneuver execution engine.
//!
//! The outcome taxonomy ([`ActionResult`], [`ObjectInteractionResult`]),
//! the firmware maneuver selector ([`DockManeuver`]), and the smaller
//! enumerations used by docking and verification.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outcome taxonomy
// ---------------------------------------------------------------------------

/// Control-flow outcome of an action tick.
///
/// `Running` is the only non-terminal state. `FailureRetry` means the
/// precondition may still hold and a supervisor may try again;
/// `FailureAbort` means the goal is no longer attainable without outside
/// intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionResult {
    /// Still making progress; call again next tick.
    Running,
    /// Completed successfully.
    Success,
    /// Failed, but a fresh attempt may succeed.
    FailureRetry,
    /// Failed permanently; do not retry automatically.
    FailureAbort,
}

impl ActionResult {
    /// Whether this result ends the action.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether this is a terminal failure of either kind.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::FailureRetry | Self::FailureAbort)
    }
}

/// Domain-level diagnosis attached to a completed object interaction.
///
/// Distinct from [`ActionResult`]: this says *why* an interaction ended the
/// way it did from the world model's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectInteractionResult {
    /// The interaction achieved its goal.
    Success,
    /// The robot was expected to carry an object but does not.
    NotCarrying,
    /// The robot was expected to be empty-handed but still carries an object.
    StillCarrying,
    /// The target object is missing or unsuitable.
    InvalidObject,
    /// The target object offers no approach pose of the requested type.
    NoPreactionPoses,
    /// The robot is too far from the closest approach pose.
    DidNotReachPreactionPose,
    /// The expected marker or object was not (re-)observed.
    VisualVerificationFailed,
    /// A failure with no more specific diagnosis.
    UnknownProblem,
    /// The interaction has not finished.
    Incomplete,
}

// ---------------------------------------------------------------------------
// Maneuvers
// ---------------------------------------------------------------------------

/// Physical maneuver the motion firmware executes once docked.
///
/// Selected once per docking attempt and never changed mid-attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockManeuver {
    /// Pick up an object resting on the ground.
    PickupLow,
    /// Pick up an object resting on top of another.
    PickupHigh,
    /// Place the carried object on the ground.
    PlaceLow,
    /// Place the carried object on top of another.
    PlaceHigh,
    /// Use an object as a lever to tip onto the back.
    PopAWheelie,
    /// Drive up to an object without lifting it.
    Align,
    /// Roll an object over by one face.
    RollLow,
    /// Roll with deeper lift engagement, used after a shallow roll failed.
    DeepRollLow,
    /// Cross a bridge from one end marker to the other.
    CrossBridge,
    /// Drive up a ramp.
    AscendRamp,
    /// Drive down a ramp.
    DescendRamp,
    /// Back onto a charger.
    MountCharger,
}

/// Approach-type tag of a pre-action pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreActionType {
    /// Approach for picking up or aligning with an object.
    Docking,
    /// Approach for rolling an object.
    Rolling,
    /// Approach for placing the carried object relative to this one.
    PlaceRelative,
    /// Approach for driving onto or into an object (ramp, bridge, charger).
    Entry,
}

/// Visual servoing strategy used by the firmware while docking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DockingMethod {
    /// Open-loop approach from the last known pose.
    #[default]
    Blind,
    /// Closed-loop tracking of the marker all the way in.
    Tracker,
    /// Tracking until close, then blind.
    Hybrid,
    /// Blind with a wider lateral tolerance, for offset placements.
    EvenBlinder,
}

/// Sub-state reported by the firmware while a dock maneuver runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockingStatus {
    /// Driving towards the marker.
    Approaching,
    /// Backing up to re-attempt the final approach.
    BackingUp,
    /// Lift engaged with the object.
    LiftEngaged,
    /// Maneuver finished on the firmware side.
    Complete,
}

// ---------------------------------------------------------------------------
// World objects
// ---------------------------------------------------------------------------

/// Concrete type of a known object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// First light cube.
    LightCube1,
    /// Second light cube.
    LightCube2,
    /// Third light cube.
    LightCube3,
    /// Charging platform.
    Charger,
    /// Drivable ramp.
    Ramp,
    /// Short bridge.
    BridgeShort,
    /// Long bridge.
    BridgeLong,
}

impl ObjectType {
    /// The family this type belongs to.
    pub const fn family(self) -> ObjectFamily {
        match self {
            Self::LightCube1 | Self::LightCube2 | Self::LightCube3 => ObjectFamily::Block,
            Self::Charger => ObjectFamily::Charger,
            Self::Ramp => ObjectFamily::Ramp,
            Self::BridgeShort | Self::BridgeLong => ObjectFamily::Bridge,
        }
    }
}

/// Broad family of an object, used to decide which maneuvers apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectFamily {
    /// Liftable cube.
    Block,
    /// Charging platform.
    Charger,
    /// Ramp.
    Ramp,
    /// Bridge.
    Bridge,
}

/// Direction of travel over a ramp relative to the robot's current pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RampDirection {
    /// Robot is at the foot of the slope.
    Ascending,
    /// Robot is on the platform at the top.
    Descending,
    /// Robot is in neither position.
    Unknown,
}

// ---------------------------------------------------------------------------
// Lift, alignment, vision, animation
// ---------------------------------------------------------------------------

/// Named lift height preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiftPreset {
    /// Height for docking with an object on the ground.
    LowDock,
    /// Height for docking with an object on top of another.
    HighDock,
    /// Height for carrying an object.
    Carry,
    /// Whichever of low dock and carry is nearer to the current height, so
    /// the lift leaves the camera's field of view with minimal travel.
    OutOfFov,
}

/// Which part of the robot to line up with an object when aligning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlignmentType {
    /// Align the lift fingers with the object face.
    LiftFinger,
    /// Align the lift plate with the object face.
    LiftPlate,
    /// Align the front of the body with the object face.
    Body,
    /// Stop at a custom distance (mm) from the object face.
    Custom(f32),
}

/// Vision processing mode that actions toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VisionMode {
    /// General marker detection.
    DetectingMarkers,
    /// Closed-loop marker tracking during docking.
    Tracking,
}

/// Named animation/sound trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationTrigger {
    /// Effort sound as the lift raises a picked-up object.
    SoundLiftEffortPickup,
    /// Effort sound as the lift lowers onto a placement.
    SoundLiftEffortPlace,
    /// Effort sound while rolling.
    SoundLiftEffortRoll,
    /// Effort sound while popping a wheelie.
    SoundLiftEffortWheelie,
}
