//! Camera model of the simulated robot.

use maneuver_types::{MarkerCode, ObjectId, ObservedMarker, Pose3d, VisionMode, angle_difference};

use super::{OBSERVATION_LOG_LIMIT, SimRobot};
use crate::events::{ObjectObservation, RobotEvent};

/// Head angle (rad) below which the camera sees the top face of nearby cubes.
const LOOK_DOWN_ANGLE: f32 = -0.25;

/// Range (mm) within which a top face is visible when looking down.
const TOP_FACE_RANGE: f32 = 250.0;

/// A face is visible when its normal points within this angle (rad) of the
/// camera.
const FACE_VISIBILITY_ANGLE: f32 = 1.0;

impl SimRobot {
    /// Report every object in view.
    ///
    /// Nothing is seen while marker detection is off, while the head is
    /// moving, or while the lift blocks the camera.
    pub(super) fn perceive(&mut self) {
        if !self.vision_modes.contains(&VisionMode::DetectingMarkers) || self.head_target.is_some() {
            return;
        }
        let (occlude_low, occlude_high) = self.params.lift_occludes_camera;
        if self.lift_height > occlude_low && self.lift_height < occlude_high {
            return;
        }

        let robot = self.pose;
        let now = self.now;
        let carried = self.carrying.map(|(id, _)| id);
        let looking_down = self.head_angle < LOOK_DOWN_ANGLE;
        let range = self.params.camera_range;
        let half_fov = self.params.camera_half_fov;

        let mut reports: Vec<(ObjectId, Vec<(MarkerCode, Pose3d)>)> = Vec::new();
        for record in self.objects.values_mut() {
            if Some(record.id) == carried {
                continue;
            }
            let distance = record.pose.xy_distance(&robot);
            if distance > range {
                continue;
            }
            let bearing = robot.bearing_to(&record.pose);
            if angle_difference(bearing, robot.heading).abs() > half_fov {
                continue;
            }

            let mut markers: Vec<(MarkerCode, Pose3d)> = record
                .markers
                .iter()
                .map(|m| (m.code, record.pose.compose(&m.face)))
                .filter(|(_, pose)| {
                    angle_difference(pose.heading, pose.bearing_to(&robot)).abs() < FACE_VISIBILITY_ANGLE
                })
                .collect();
            if looking_down && distance < TOP_FACE_RANGE {
                if let Some(top) = record.top_marker {
                    let mut top_pose = record.pose;
                    top_pose.translation.z += record.size.z / 2.0;
                    markers.push((top, top_pose));
                }
            }

            record.times_observed = record.times_observed.saturating_add(1);
            record.last_observed = Some(now);
            reports.push((record.id, markers));
        }

        for (object, markers) in reports {
            self.observations.extend(markers.iter().map(|(code, pose)| ObservedMarker {
                object,
                code: *code,
                pose: *pose,
                observed_at: now,
            }));
            let observation = ObjectObservation {
                object,
                markers: markers.into_iter().map(|(code, _)| code).collect(),
                observed_at: now,
            };
            self.events.publish(&RobotEvent::ObjectObserved(observation));
        }

        let excess = self.observations.len().saturating_sub(OBSERVATION_LOG_LIMIT);
        if excess > 0 {
            self.observations.drain(..excess);
        }
    }
}
