//! Approach-pose selection and the near-pose distance threshold.
//!
//! Everything here is a pure function of its inputs: the robot pose, the
//! object pose, and the candidate poses the world model produced. The
//! docking protocol calls [`select_pre_action_pose`] once per attempt.

use core::f32::consts::FRAC_PI_4;

use maneuver_types::{ActionResult, ObjectInteractionResult, Pose3d, PreActionPose, angle_difference};
use tracing::debug;

/// Scale applied to the nominal approach distance when no adaptive
/// threshold is available.
pub const FALLBACK_THRESHOLD_SCALE: f32 = 1.1;

/// Poses whose heading differs from a requested approach angle by this much
/// or more are discarded.
pub const APPROACH_ANGLE_TOLERANCE: f32 = FRAC_PI_4;

/// Parameters of one pose selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachParams {
    /// Heading tolerance (rad) the robot is allowed at the approach pose.
    /// Zero disables the adaptive threshold.
    pub angle_tolerance: f32,
    /// Nominal distance (mm) between an approach pose and its marker.
    pub nominal_approach_distance: f32,
    /// Whether the adaptive near-pose check is enabled.
    pub near_pose_check: bool,
    /// Only keep poses facing roughly this heading, if set.
    pub approach_angle: Option<f32>,
}

impl Default for ApproachParams {
    fn default() -> Self {
        Self {
            angle_tolerance: 0.2,
            nominal_approach_distance: 100.0,
            near_pose_check: true,
            approach_angle: None,
        }
    }
}

/// Result of a successful selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSelection {
    /// Every candidate that survived filtering.
    pub poses: Vec<PreActionPose>,
    /// Index of the selected pose in `poses`.
    pub closest_index: usize,
    /// The selected pose.
    pub closest: PreActionPose,
    /// Ground-plane distance from the robot to the selected pose (mm).
    pub distance_to_closest: f32,
    /// Threshold the distance was checked against (mm).
    pub distance_threshold: f32,
    /// Whether the robot sits on the selected pose within both the
    /// distance threshold and the heading tolerance.
    pub robot_at_closest: bool,
}

/// Why a selection failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionFailure {
    /// Control-flow outcome to report.
    pub result: ActionResult,
    /// Diagnosis to attach to the completion payload.
    pub interaction: ObjectInteractionResult,
}

impl SelectionFailure {
    /// A permanent failure.
    pub const fn abort(interaction: ObjectInteractionResult) -> Self {
        Self {
            result: ActionResult::FailureAbort,
            interaction,
        }
    }

    /// A failure that may clear up on another attempt.
    pub const fn retry(interaction: ObjectInteractionResult) -> Self {
        Self {
            result: ActionResult::FailureRetry,
            interaction,
        }
    }
}

/// Trust-region radius around the selected approach pose.
///
/// With the near-pose check enabled and a positive angle tolerance this is
/// `object_distance * sin(angle_tolerance)`. Otherwise it is the nominal
/// approach distance scaled by [`FALLBACK_THRESHOLD_SCALE`].
pub fn distance_threshold(object_distance: f32, params: &ApproachParams) -> f32 {
    if params.near_pose_check && params.angle_tolerance > 0.0 {
        object_distance * params.angle_tolerance.sin()
    } else {
        params.nominal_approach_distance * FALLBACK_THRESHOLD_SCALE
    }
}

/// Index of the pose nearest to `robot` in the ground plane.
///
/// Ties go to the lowest index.
pub fn closest_pose_index(robot: &Pose3d, poses: &[PreActionPose]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, candidate) in poses.iter().enumerate() {
        let dist_sq = candidate.pose.xy_distance_squared(robot);
        match best {
            Some((_, best_sq)) if dist_sq >= best_sq => {}
            _ => best = Some((index, dist_sq)),
        }
    }
    best.map(|(index, _)| index)
}

/// Keep only poses whose heading is within [`APPROACH_ANGLE_TOLERANCE`]
/// of `approach_angle`.
pub fn filter_by_approach_angle(poses: Vec<PreActionPose>, approach_angle: f32) -> Vec<PreActionPose> {
    poses
        .into_iter()
        .filter(|p| angle_difference(p.pose.heading, approach_angle).abs() < APPROACH_ANGLE_TOLERANCE)
        .collect()
}

/// Pick the approach pose for a docking attempt.
///
/// # Errors
///
/// - `FailureAbort` / `NoPreactionPoses` when no candidate remains.
/// - `FailureRetry` / `DidNotReachPreactionPose` when the robot is farther
///   from the selected pose than the threshold.
pub fn select_pre_action_pose(
    robot: &Pose3d,
    object: &Pose3d,
    candidates: Vec<PreActionPose>,
    params: &ApproachParams,
) -> Result<PoseSelection, SelectionFailure> {
    let poses = match params.approach_angle {
        Some(angle) => filter_by_approach_angle(candidates, angle),
        None => candidates,
    };

    let no_poses = SelectionFailure::abort(ObjectInteractionResult::NoPreactionPoses);
    let closest_index = closest_pose_index(robot, &poses).ok_or(no_poses)?;
    let closest = poses.get(closest_index).copied().ok_or(no_poses)?;

    let threshold = distance_threshold(object.distance(robot), params);
    let distance_to_closest = closest.pose.xy_distance(robot);
    debug!(
        marker = %closest.marker,
        candidates = poses.len(),
        distance = distance_to_closest,
        threshold,
        "Selected approach pose"
    );

    if distance_to_closest > threshold {
        return Err(SelectionFailure::retry(
            ObjectInteractionResult::DidNotReachPreactionPose,
        ));
    }

    let heading_ok = params.angle_tolerance <= 0.0
        || angle_difference(closest.pose.heading, robot.heading).abs() < params.angle_tolerance;

    Ok(PoseSelection {
        poses,
        closest_index,
        closest,
        distance_to_closest,
        distance_threshold: threshold,
        robot_at_closest: heading_ok,
    })
}
