//! Driving up to an object and stopping at a chosen distance.

use maneuver_types::{
    ActionResult, AlignmentType, DockManeuver, ObjectId, PlacementOffset, PreActionType,
};
use maneuver_world::{Robot, SelectionFailure};
use tracing::debug;

use crate::maneuver::{DockContext, Maneuver};
use crate::protocol::DockAction;
use crate::settings::DockSettings;

/// Distance from the robot origin to the front face of the lift (mm).
pub const LIFT_FRONT_FACE_MM: f32 = 29.0;

/// Depth of the lift plate behind its front face (mm).
pub const LIFT_PLATE_DEPTH_MM: f32 = 4.0;

/// Distance from the robot origin to the front of the body (mm).
pub const BODY_FRONT_MM: f32 = 14.2;

/// Docking action that lines up with an object.
pub type AlignWithObject = DockAction<Align>;

impl DockAction<Align> {
    /// Line up with `object` using `alignment`.
    pub fn align(object: ObjectId, alignment: AlignmentType, settings: DockSettings) -> Self {
        let align = Align::new(alignment);
        let placement = PlacementOffset {
            x_mm: align.distance_from_marker(),
            y_mm: 0.0,
            angle_rad: 0.0,
        };
        Self::new(object, align, settings).with_placement(placement)
    }
}

/// Align hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Align {
    alignment: AlignmentType,
}

impl Align {
    /// Align hooks for `alignment`.
    pub const fn new(alignment: AlignmentType) -> Self {
        Self { alignment }
    }

    /// Where the robot stops, measured from the marker (mm).
    pub const fn distance_from_marker(&self) -> f32 {
        match self.alignment {
            AlignmentType::LiftFinger => LIFT_FRONT_FACE_MM,
            AlignmentType::LiftPlate => LIFT_FRONT_FACE_MM - LIFT_PLATE_DEPTH_MM,
            AlignmentType::Body => BODY_FRONT_MM,
            AlignmentType::Custom(distance) => distance,
        }
    }
}

impl Maneuver for Align {
    fn name(&self) -> &'static str {
        "AlignWithObject"
    }

    fn pre_action_type(&self) -> PreActionType {
        PreActionType::Docking
    }

    fn select_dock_maneuver(
        &mut self,
        ctx: &mut DockContext,
        _robot: &mut dyn Robot,
    ) -> Result<DockManeuver, SelectionFailure> {
        debug!(alignment = ?self.alignment, x = ctx.placement.x_mm, "Aligning");
        Ok(DockManeuver::Align)
    }

    fn verify(&mut self, _ctx: &mut DockContext, robot: &mut dyn Robot) -> ActionResult {
        if robot.is_picking_or_placing() || robot.is_traversing_path() {
            ActionResult::Running
        } else {
            ActionResult::Success
        }
    }
}
