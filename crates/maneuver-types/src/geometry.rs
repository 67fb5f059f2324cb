//! Poses and angle helpers.
//!
//! All poses live in a single world frame. Translation is in millimetres,
//! heading is the rotation about the vertical axis in radians. Objects
//! that can be tipped over carry that information separately (their top
//! marker), so a yaw-only pose is enough for every maneuver.

use core::f32::consts::{PI, TAU};

use nalgebra::{Rotation2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Wrap an angle into `[-PI, PI)`.
pub fn normalize_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Signed smallest difference `a - b`, wrapped into `[-PI, PI)`.
pub fn angle_difference(a: f32, b: f32) -> f32 {
    normalize_angle(a - b)
}

/// Position plus heading in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3d {
    /// Position in millimetres.
    pub translation: Vector3<f32>,
    /// Heading about the vertical axis in radians.
    pub heading: f32,
}

impl Default for Pose3d {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            heading: 0.0,
        }
    }
}

impl Pose3d {
    /// Create a pose from coordinates and a heading.
    pub fn new(x: f32, y: f32, z: f32, heading: f32) -> Self {
        Self {
            translation: Vector3::new(x, y, z),
            heading: normalize_angle(heading),
        }
    }

    /// X coordinate (mm).
    pub fn x(&self) -> f32 {
        self.translation.x
    }

    /// Y coordinate (mm).
    pub fn y(&self) -> f32 {
        self.translation.y
    }

    /// Height above the ground plane (mm).
    pub fn z(&self) -> f32 {
        self.translation.z
    }

    /// Ground-plane projection of the position.
    pub fn xy(&self) -> Vector2<f32> {
        self.translation.xy()
    }

    /// Squared distance to `other` in the ground plane.
    pub fn xy_distance_squared(&self, other: &Self) -> f32 {
        (self.xy() - other.xy()).norm_squared()
    }

    /// Distance to `other` in the ground plane.
    pub fn xy_distance(&self, other: &Self) -> f32 {
        (self.xy() - other.xy()).norm()
    }

    /// Full 3D distance to `other`.
    pub fn distance(&self, other: &Self) -> f32 {
        (self.translation - other.translation).norm()
    }

    /// Express this pose in the frame of `frame`.
    pub fn relative_to(&self, frame: &Self) -> Self {
        let delta = self.translation - frame.translation;
        let local = Rotation2::new(-frame.heading) * delta.xy();
        Self {
            translation: Vector3::new(local.x, local.y, delta.z),
            heading: angle_difference(self.heading, frame.heading),
        }
    }

    /// Map a pose given in this pose's frame back into the world frame.
    pub fn compose(&self, local: &Self) -> Self {
        let world = Rotation2::new(self.heading) * local.xy();
        Self {
            translation: Vector3::new(
                self.x() + world.x,
                self.y() + world.y,
                self.z() + local.z(),
            ),
            heading: normalize_angle(self.heading + local.heading),
        }
    }

    /// Heading the robot needs at this pose to face `target`.
    pub fn bearing_to(&self, target: &Self) -> f32 {
        let delta = target.xy() - self.xy();
        delta.y.atan2(delta.x)
    }

    /// Whether `other` is within the given distance and heading tolerances.
    pub fn is_same_as(&self, other: &Self, distance_tolerance: f32, angle_tolerance: f32) -> bool {
        self.is_same_as_with_ambiguity(other, &[], distance_tolerance, angle_tolerance)
    }

    /// Like [`Pose3d::is_same_as`], but headings that differ by one of the
    /// object's symmetry rotations also count as the same.
    ///
    /// An empty `ambiguities` slice means only the exact heading matches.
    pub fn is_same_as_with_ambiguity(
        &self,
        other: &Self,
        ambiguities: &[f32],
        distance_tolerance: f32,
        angle_tolerance: f32,
    ) -> bool {
        if self.distance(other) >= distance_tolerance {
            return false;
        }
        let heading_matches =
            |offset: f32| angle_difference(self.heading, other.heading + offset).abs() < angle_tolerance;
        if ambiguities.is_empty() {
            heading_matches(0.0)
        } else {
            ambiguities.iter().copied().any(heading_matches)
        }
    }
}
