//! Crossing a bridge from the marker at one end to the marker at the other.

use maneuver_types::{
    ActionResult, DockManeuver, MarkerCode, ObjectId, ObjectInteractionResult, PreActionType,
    TargetKind,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::{info, warn};

use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Docking action that crosses a bridge.
pub type CrossBridgeAction = DockAction<CrossBridge>;

impl DockAction<CrossBridge> {
    /// Cross `bridge`.
    pub fn cross_bridge(bridge: ObjectId, settings: DockSettings) -> Self {
        Self::new(bridge, CrossBridge, settings)
    }
}

/// Bridge-crossing hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossBridge;

impl Maneuver for CrossBridge {
    fn name(&self) -> &'static str {
        "CrossBridge"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Entry
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        _robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        if let TargetKind::Bridge { length } = ctx.target {
            info!(bridge = %ctx.object, length, entry = %ctx.marker(), "Crossing bridge");
            Ok(DockManeuver::CrossBridge)
        } else {
            warn!(object = %ctx.object, target = ?ctx.target, "Object is not a bridge");
            Err(SelectionFailure::abort(ObjectInteractionResult::InvalidObject))
        }
    }

    /// The marker at the far end from the entry marker.
    fn dock_marker2(&self, ctx: &DockContext, _robot: &dyn Robot) -> Option<MarkerCode> {
        let entry = ctx.marker();
        ctx.record
            .markers
            .iter()
            .map(|m| m.code)
            .find(|&code| code != entry)
    }

    fn verify(&mut self, _ctx: &mut DockContext, _robot: &mut dyn Robot) -> ActionResult {
        ActionResult::Success
    }
}
