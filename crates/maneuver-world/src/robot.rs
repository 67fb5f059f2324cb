//! The seams actions use to read and drive the robot.
//!
//! All shared-state mutation an action performs goes through these traits.
//! Actions never keep private shadow copies of robot state.

use chrono::{DateTime, Utc};
use maneuver_types::{
    ActionTag, AnimationTrigger, DockCommand, FaceLayerTag, MarkerCode, MotionProfile, ObjectId,
    ObjectRecord, ObjectType, ObservedMarker, Obstacle, Pose3d, PreActionPose, PreActionType,
    RampDirection, VisionMode,
};

use crate::error::CommandError;
use crate::events::EventBus;
use crate::registry::{TagRegistry, TrackLocks};

/// Read-only robot state.
pub trait RobotState {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Current robot pose.
    fn pose(&self) -> Pose3d;

    /// Object currently carried on the lift, if any.
    fn carrying_object(&self) -> Option<ObjectId>;

    /// Marker of the carried object that faces the robot.
    fn carrying_marker(&self) -> Option<MarkerCode>;

    /// Whether the head is moving.
    fn is_head_moving(&self) -> bool;

    /// Whether the lift is moving.
    fn is_lift_moving(&self) -> bool;

    /// Whether the body is turning or driving.
    fn is_body_moving(&self) -> bool;

    /// Whether any motor is moving.
    fn is_moving(&self) -> bool {
        self.is_head_moving() || self.is_lift_moving() || self.is_body_moving()
    }

    /// Head tilt in radians.
    fn head_angle(&self) -> f32;

    /// Lift height in millimetres.
    fn lift_height(&self) -> f32;

    /// Body pitch in radians.
    fn pitch_angle(&self) -> f32;

    /// Whether the robot is physically on its charger.
    fn is_on_charger(&self) -> bool;

    /// Whether a dock or place maneuver is executing on the firmware.
    fn is_picking_or_placing(&self) -> bool;

    /// Whether the robot is following a path.
    fn is_traversing_path(&self) -> bool;

    /// Outcome the firmware reported for the last pick or place.
    fn last_pick_or_place_succeeded(&self) -> bool;
}

/// Queries and bookkeeping on the world model.
pub trait WorldQuery {
    /// Resolve a located object.
    fn object(&self, id: ObjectId) -> Option<&ObjectRecord>;

    /// Ids of every located object of a type.
    fn object_ids_of_type(&self, object_type: ObjectType) -> Vec<ObjectId>;

    /// Static obstacles currently known.
    fn obstacles(&self) -> Vec<Obstacle>;

    /// Approach poses of `object` matching the type and marker filter.
    ///
    /// Poses inside any of `obstacles` are excluded. `offset_x_mm` moves
    /// every pose further away from (or closer to) its marker.
    fn pre_action_poses(
        &self,
        object: ObjectId,
        action_type: PreActionType,
        marker_filter: MarkerCode,
        obstacles: &[Obstacle],
        offset_x_mm: f32,
    ) -> Vec<PreActionPose>;

    /// Markers of `object` observed at or after `since`.
    fn observed_markers_since(&self, object: ObjectId, since: DateTime<Utc>)
    -> Vec<ObservedMarker>;

    /// Objects observed within `radius_mm` of `pose` at or after `since`.
    fn objects_observed_near(
        &self,
        pose: &Pose3d,
        radius_mm: f32,
        since: DateTime<Utc>,
    ) -> Vec<ObjectId>;

    /// Object resting on top of `object`, within a vertical tolerance.
    fn object_on_top_of(&self, object: ObjectId, z_tolerance_mm: f32) -> Option<ObjectId>;

    /// Object that `object` rests on, within a vertical tolerance.
    fn object_underneath(&self, object: ObjectId, z_tolerance_mm: f32) -> Option<ObjectId>;

    /// Move a located object.
    fn set_object_pose(&mut self, object: ObjectId, pose: Pose3d);

    /// Forget where an object is; it stays known but unlocated.
    fn clear_object(&mut self, object: ObjectId);

    /// Remove an object record entirely.
    fn delete_object(&mut self, object: ObjectId);
}

/// Commands sent to the robot.
pub trait RobotCommands {
    /// Execute a docking maneuver.
    fn dock_with_object(&mut self, command: &DockCommand) -> Result<(), CommandError>;

    /// Put the carried object down in front of the robot.
    fn place_object_on_ground(&mut self, motion: &MotionProfile) -> Result<(), CommandError>;

    /// Drive to a pose.
    fn drive_to_pose(&mut self, pose: &Pose3d, motion: &MotionProfile) -> Result<(), CommandError>;

    /// Turn in place to a heading.
    fn turn_to_heading(&mut self, heading: f32) -> Result<(), CommandError>;

    /// Move the lift to a height.
    fn move_lift_to_height(&mut self, height_mm: f32) -> Result<(), CommandError>;

    /// Tilt the head to an angle.
    fn move_head_to_angle(&mut self, angle_rad: f32) -> Result<(), CommandError>;

    /// Abort any in-progress dock maneuver.
    fn abort_docking(&mut self);

    /// Abort any in-progress path.
    fn abort_driving(&mut self);

    /// Stop every motor.
    fn stop_all_motors(&mut self);

    /// Record that the robot carries `object`, facing `marker`.
    fn set_carrying_object(&mut self, object: ObjectId, marker: MarkerCode);

    /// Record that the robot carries nothing.
    fn unset_carrying_object(&mut self);

    /// Mark or clear the object being docked with.
    fn set_dock_object(&mut self, object: Option<ObjectId>);

    /// Enable or disable a vision mode.
    fn set_vision_mode(&mut self, mode: VisionMode, enabled: bool);

    /// Push a persistent face overlay.
    fn add_face_layer(&mut self, name: &str) -> FaceLayerTag;

    /// Remove a face overlay.
    fn remove_face_layer(&mut self, layer: FaceLayerTag);

    /// Play an animation or sound trigger.
    fn play_animation(&mut self, trigger: AnimationTrigger);

    /// Suppress or restore reactionary behaviors on behalf of `owner`.
    fn set_reactions_suppressed(&mut self, owner: ActionTag, suppressed: bool);

    /// Tell the robot which ramp it is about to traverse.
    fn set_ramp(&mut self, ramp: ObjectId, direction: RampDirection);

    /// Tell the robot which charger it is about to mount.
    fn set_charger(&mut self, charger: ObjectId);
}

/// Everything an action can use, plus the robot-owned registries.
pub trait Robot: RobotState + WorldQuery + RobotCommands {
    /// The event bus.
    fn events(&mut self) -> &mut EventBus;

    /// The track-lock registry.
    fn track_locks(&mut self) -> &mut TrackLocks;

    /// The action-tag registry.
    fn tags(&mut self) -> &mut TagRegistry;
}
