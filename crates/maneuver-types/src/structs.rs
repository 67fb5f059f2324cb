//! Core structs shared between the world seams and the maneuvers.

use chrono::{DateTime, Utc};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::enums::{DockManeuver, DockingMethod, ObjectFamily, ObjectType, PreActionType};
use crate::geometry::Pose3d;
use crate::ids::{MarkerCode, ObjectId};

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// A marker printed on one face of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMarker {
    /// Marker code.
    pub code: MarkerCode,
    /// Marker pose in the object's frame; heading is the outward normal.
    pub face: Pose3d,
    /// Approach types this face offers.
    pub pre_action_types: Vec<PreActionType>,
}

impl ObjectMarker {
    /// Whether this face offers the given approach type.
    pub fn offers(&self, action_type: PreActionType) -> bool {
        self.pre_action_types.contains(&action_type)
    }
}

/// The world model's record of a known object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object identifier.
    pub id: ObjectId,
    /// Concrete type.
    pub object_type: ObjectType,
    /// Pose of the object centre.
    pub pose: Pose3d,
    /// Bounding size (x, y, z) in millimetres.
    pub size: Vector3<f32>,
    /// Markers on the object's faces.
    pub markers: Vec<ObjectMarker>,
    /// Marker currently facing up, for objects that can be rolled.
    pub top_marker: Option<MarkerCode>,
    /// Heading offsets under which the object looks identical.
    pub rotation_ambiguities: Vec<f32>,
    /// Number of times perception has reported this object.
    pub times_observed: u32,
    /// When perception last reported this object.
    pub last_observed: Option<DateTime<Utc>>,
}

impl ObjectRecord {
    /// The object's family.
    pub const fn family(&self) -> ObjectFamily {
        self.object_type.family()
    }

    /// Look up a face marker by code.
    pub fn marker(&self, code: MarkerCode) -> Option<&ObjectMarker> {
        self.markers.iter().find(|m| m.code == code)
    }

    /// World pose of one of this object's markers.
    pub fn marker_pose(&self, marker: &ObjectMarker) -> Pose3d {
        self.pose.compose(&marker.face)
    }

    /// Resolve the closed target variant the maneuvers dispatch on.
    pub fn target_kind(&self) -> TargetKind {
        match self.family() {
            ObjectFamily::Block => TargetKind::Block {
                top_marker: self.top_marker,
            },
            ObjectFamily::Charger => TargetKind::Charger,
            ObjectFamily::Ramp => TargetKind::Ramp {
                pose: self.pose,
                slope_length: self.size.x,
                platform_height: self.size.z,
            },
            ObjectFamily::Bridge => TargetKind::Bridge {
                length: self.size.x,
            },
        }
    }
}

/// Maneuver-relevant view of a target object, resolved once per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetKind {
    /// A liftable cube.
    Block {
        /// Marker currently facing up, if known.
        top_marker: Option<MarkerCode>,
    },
    /// A ramp.
    Ramp {
        /// Pose of the ramp centre; heading points up the slope.
        pose: Pose3d,
        /// Horizontal length of the slope (mm).
        slope_length: f32,
        /// Height of the top platform (mm).
        platform_height: f32,
    },
    /// A charging platform.
    Charger,
    /// A bridge.
    Bridge {
        /// Length end to end (mm).
        length: f32,
    },
}

/// A marker sighting reported by perception.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedMarker {
    /// Object the marker belongs to.
    pub object: ObjectId,
    /// Marker code.
    pub code: MarkerCode,
    /// World pose of the marker at observation time.
    pub pose: Pose3d,
    /// Observation timestamp.
    pub observed_at: DateTime<Utc>,
}

/// Axis-aligned static obstacle footprint in the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Minimum corner (mm).
    pub min: Vector2<f32>,
    /// Maximum corner (mm).
    pub max: Vector2<f32>,
}

impl Obstacle {
    /// Whether the pose's ground projection lies inside the footprint.
    pub fn contains(&self, pose: &Pose3d) -> bool {
        let p = pose.xy();
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

// ---------------------------------------------------------------------------
// Approach poses
// ---------------------------------------------------------------------------

/// Candidate pose from which a maneuver may be started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreActionPose {
    /// Object the pose belongs to.
    pub object: ObjectId,
    /// Robot pose to reach before docking.
    pub pose: Pose3d,
    /// Marker the robot faces from this pose.
    pub marker: MarkerCode,
    /// Approach type this pose serves.
    pub action_type: PreActionType,
}

// ---------------------------------------------------------------------------
// Dock commands
// ---------------------------------------------------------------------------

/// Speed and acceleration limits for a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Cruise speed (mm/s).
    pub speed_mmps: f32,
    /// Acceleration (mm/s^2).
    pub accel_mmps2: f32,
    /// Deceleration (mm/s^2).
    pub decel_mmps2: f32,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            speed_mmps: 100.0,
            accel_mmps2: 200.0,
            decel_mmps2: 500.0,
        }
    }
}

/// Offset of the final placement from the docking marker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlacementOffset {
    /// Offset along the approach direction (mm).
    pub x_mm: f32,
    /// Lateral offset (mm).
    pub y_mm: f32,
    /// Rotation of the placed object (rad).
    pub angle_rad: f32,
}

impl PlacementOffset {
    /// Most negative x offset the firmware accepts.
    pub const MIN_X_MM: f32 = -1.0;

    /// Whether the firmware accepts this offset.
    pub fn is_valid(&self) -> bool {
        self.x_mm >= Self::MIN_X_MM
    }

    /// Replace an invalid x offset with zero, leaving valid offsets as is.
    #[must_use]
    pub fn clamped(self) -> Self {
        if self.is_valid() {
            self
        } else {
            Self { x_mm: 0.0, ..self }
        }
    }
}

/// Request for the motion firmware to execute a docking maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DockCommand {
    /// Target object.
    pub object: ObjectId,
    /// Maneuver to execute once docked.
    pub maneuver: DockManeuver,
    /// Marker to dock with.
    pub marker: MarkerCode,
    /// Second marker for two-marker maneuvers.
    pub marker2: Option<MarkerCode>,
    /// Speed limits for the approach.
    pub motion: MotionProfile,
    /// Placement offset from the marker.
    pub placement: PlacementOffset,
    /// Whether speed is controlled manually instead of by the firmware.
    pub use_manual_speed: bool,
    /// Number of firmware-level re-approaches allowed.
    pub num_retries: u8,
    /// Servoing strategy.
    pub method: DockingMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> ObjectRecord {
        ObjectRecord {
            id: ObjectId::new(),
            object_type: ObjectType::LightCube1,
            pose: Pose3d::new(200.0, 0.0, 22.0, 0.0),
            size: Vector3::new(44.0, 44.0, 44.0),
            markers: vec![ObjectMarker {
                code: MarkerCode(1),
                face: Pose3d::new(-22.0, 0.0, 0.0, core::f32::consts::PI),
                pre_action_types: vec![PreActionType::Docking],
            }],
            top_marker: Some(MarkerCode(5)),
            rotation_ambiguities: Vec::new(),
            times_observed: 0,
            last_observed: None,
        }
    }

    #[test]
    fn cube_resolves_to_block_target() {
        assert_eq!(
            cube().target_kind(),
            TargetKind::Block {
                top_marker: Some(MarkerCode(5))
            }
        );
    }

    #[test]
    fn marker_pose_is_in_world_frame() {
        let record = cube();
        let marker = record.marker(MarkerCode(1));
        assert!(marker.is_some());
        let pose = marker.map(|m| record.marker_pose(m)).unwrap_or_default();
        assert!((pose.x() - 178.0).abs() < 1e-3);
    }

    #[test]
    fn negative_x_offset_clamps_to_zero() {
        let bad = PlacementOffset {
            x_mm: -5.0,
            y_mm: 3.0,
            angle_rad: 0.0,
        };
        assert!(!bad.is_valid());
        let fixed = bad.clamped();
        assert!(fixed.x_mm.abs() < f32::EPSILON);
        assert!((fixed.y_mm - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn obstacle_contains_inner_points() {
        let obstacle = Obstacle {
            min: Vector2::new(0.0, 0.0),
            max: Vector2::new(10.0, 10.0),
        };
        assert!(obstacle.contains(&Pose3d::new(5.0, 5.0, 0.0, 0.0)));
        assert!(!obstacle.contains(&Pose3d::new(15.0, 5.0, 0.0, 0.0)));
    }
}
