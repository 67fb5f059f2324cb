//! The hooks that distinguish one docking maneuver from another.
//!
//! The protocol in [`crate::protocol`] is written once; each maneuver only
//! says which approach poses it uses, which firmware maneuver to request,
//! and how to verify the outcome.

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_types::{
    ActionResult, AnimationTrigger, DockManeuver, DockingMethod, MarkerCode, MotionProfile, ObjectId,
    ObjectInteractionResult, ObjectRecord, PlacementOffset, PreActionType, TargetKind,
};
use maneuver_world::{PoseSelection, Robot, SelectionFailure};

use crate::settings::DockSettings;

/// Everything resolved about one docking attempt.
///
/// Built during init, after the target is resolved and an approach pose
/// selected. Maneuver hooks read it and may adjust the command fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DockContext {
    /// Target object.
    pub object: ObjectId,
    /// Snapshot of the target taken at init.
    pub record: ObjectRecord,
    /// What kind of object the target is.
    pub target: TargetKind,
    /// Outcome of approach pose selection.
    pub selection: PoseSelection,
    /// Shared tunables.
    pub settings: DockSettings,
    /// Speed limits for the dock command.
    pub motion: MotionProfile,
    /// Placement offset for the dock command.
    pub placement: PlacementOffset,
    /// Servoing strategy for the dock command.
    pub method: DockingMethod,
    /// Firmware-level re-approaches.
    pub num_retries: u8,
    /// Whether the caller drives speed manually.
    pub use_manual_speed: bool,
    /// Second marker for two-marker maneuvers.
    pub marker2: Option<MarkerCode>,
    /// Domain-level diagnosis reported in the completion payload.
    pub interaction: ObjectInteractionResult,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
}

impl DockContext {
    /// Marker of the selected approach pose.
    pub const fn marker(&self) -> MarkerCode {
        self.selection.closest.marker
    }
}

/// Maneuver-specific behavior plugged into the docking protocol.
pub trait Maneuver {
    /// Display name of the docking action.
    fn name(&self) -> &'static str;

    /// Which approach poses this maneuver uses.
    fn pre_action_type(&self) -> PreActionType;

    /// Servoing strategy unless the caller overrides it.
    fn docking_method(&self) -> DockingMethod {
        DockingMethod::Blind
    }

    /// Whether the adaptive near-pose check applies.
    fn near_pose_check(&self) -> bool {
        true
    }

    /// Whether to confirm nothing sits on top of the target first.
    fn check_for_object_on_top(&self) -> bool {
        false
    }

    /// Whether face-and-verify accepts any marker of the target.
    fn verify_object_only(&self) -> bool {
        false
    }

    /// Settle time between physical completion and `verify`.
    fn verify_delay(&self, _ctx: &DockContext) -> TimeDelta {
        TimeDelta::zero()
    }

    /// Sound played when the lift starts moving after docking.
    fn lift_moving_animation(&self) -> Option<AnimationTrigger> {
        None
    }

    /// Choose the firmware maneuver, or fail the attempt.
    ///
    /// # Errors
    ///
    /// Returns the terminal result and diagnosis when the maneuver cannot
    /// be attempted from the current state.
    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure>;

    /// Second marker for the dock command.
    fn dock_marker2(&self, _ctx: &DockContext, _robot: &dyn Robot) -> Option<MarkerCode> {
        None
    }

    /// Check the outcome after the firmware finished. May return `Running`
    /// while a verification sub-action runs.
    fn verify(&mut self, ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult;

    /// Objects reported in the completion payload.
    fn completion_objects(&self, ctx: &DockContext, _robot: &dyn Robot) -> Vec<ObjectId> {
        vec![ctx.object]
    }

    /// Release anything the maneuver holds.
    fn cleanup(&mut self, _robot: &mut dyn Robot) {}
}
