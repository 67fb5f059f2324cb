//! Queue flows of the basic actions against the simulated robot.
//!
//! These tests tick an [`ActionList`] the way the control loop does: update
//! the queue, then advance the robot, until the queue drains.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{TimeDelta, TimeZone, Utc};
use maneuver_actions::{
    ActionList, CompoundSequential, DriveToPose, LiftPresets, LiftTarget, MoveHeadToAngle,
    MoveLiftToHeight, QueuePosition, TurnTowardsObject, Wait,
};
use maneuver_types::{
    ActionCompletion, ActionResult, LiftPreset, MarkerCode, MotionProfile, ObjectId, ObjectType,
    Pose3d, TrackSet,
};
use maneuver_world::{EventKind, Robot, RobotEvent, RobotState, SimParams, SimRobot};

// =============================================================================
// Helpers
// =============================================================================

fn robot() -> SimRobot {
    SimRobot::new(SimParams::default(), Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap())
}

fn drain(robot: &mut SimRobot, list: &mut ActionList, max_ticks: u32) -> Vec<ActionCompletion> {
    let mut completions = Vec::new();
    for _ in 0..max_ticks {
        if list.is_empty() {
            break;
        }
        completions.extend(list.update(robot));
        robot.tick();
    }
    completions
}

fn names(completions: &[ActionCompletion]) -> Vec<&str> {
    completions.iter().map(|c| c.name.as_str()).collect()
}

// =============================================================================
// Sequences
// =============================================================================

#[test]
fn lift_drive_and_verify_sequence_succeeds() {
    let mut robot = robot();
    let cube = robot.add_cube(ObjectType::LightCube1, 300.0, 40.0, 0.0);
    let presets = LiftPresets::default();
    let sequence = CompoundSequential::new(vec![
        Box::new(MoveLiftToHeight::to_preset(LiftPreset::Carry, presets)),
        Box::new(DriveToPose::new(Pose3d::new(150.0, 0.0, 0.0, 0.0), MotionProfile::default())),
        Box::new(TurnTowardsObject::new(cube, MarkerCode::ANY, presets).with_verification()),
    ])
    .named("ApproachAndLook");

    let mut list = ActionList::new();
    let tag = list.queue_action(&mut robot, QueuePosition::AtEnd, sequence).unwrap();
    let completions = drain(&mut robot, &mut list, 600);

    assert!(list.is_empty());
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].tag, tag);
    assert_eq!(completions[0].name, "ApproachAndLook");
    assert_eq!(completions[0].result, ActionResult::Success);
    assert!(robot.pose().xy_distance(&Pose3d::new(150.0, 0.0, 0.0, 0.0)) < 10.0);
    assert!(robot.track_locks().locked_tracks().is_empty());
}

#[test]
fn turning_towards_unknown_object_aborts() {
    let mut robot = robot();
    let presets = LiftPresets::default();
    let mut list = ActionList::new();
    list.queue_action(
        &mut robot,
        QueuePosition::AtEnd,
        TurnTowardsObject::new(ObjectId::new(), MarkerCode::ANY, presets),
    )
    .unwrap();

    let completions = drain(&mut robot, &mut list, 5);
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].result, ActionResult::FailureAbort);
}

// =============================================================================
// Queue positions
// =============================================================================

#[test]
fn parallel_head_and_lift_finish_independently() {
    let mut robot = robot();
    let presets = LiftPresets::default();
    let mut list = ActionList::new();
    list.queue_action(
        &mut robot,
        QueuePosition::AtEnd,
        MoveLiftToHeight::new(LiftTarget::Height(60.0), presets),
    )
    .unwrap();
    list.queue_action(&mut robot, QueuePosition::InParallel, MoveHeadToAngle::new(0.3)).unwrap();
    assert_eq!(list.len(), 2);

    let completions = drain(&mut robot, &mut list, 200);

    assert!(list.is_empty());
    assert_eq!(completions.len(), 2);
    assert!(completions.iter().all(|c| c.result == ActionResult::Success));
    assert!((robot.lift_height() - 60.0).abs() <= presets.tolerance);
    assert!((robot.head_angle() - 0.3).abs() < 0.05);
    assert_eq!(robot.track_locks().locked_tracks(), TrackSet::EMPTY);
}

#[test]
fn interrupted_wait_resumes_after_drive() {
    let mut robot = robot();
    let mut list = ActionList::new();
    list.queue_action(&mut robot, QueuePosition::AtEnd, Wait::new(TimeDelta::milliseconds(300)))
        .unwrap();
    list.update(&mut robot);
    robot.tick();

    list.queue_action(
        &mut robot,
        QueuePosition::NowAndResume,
        DriveToPose::new(Pose3d::new(60.0, 0.0, 0.0, 0.0), MotionProfile::default()),
    )
    .unwrap();
    let completions = drain(&mut robot, &mut list, 200);

    assert_eq!(names(&completions), vec!["DriveToPose", "Wait"]);
    assert!(completions.iter().all(|c| c.result == ActionResult::Success));
}

#[test]
fn completion_signals_reach_subscribers() {
    let mut robot = robot();
    let mut events = robot.events().subscribe(EventKind::ActionCompleted);
    let mut list = ActionList::new();
    let tag = list
        .queue_action(&mut robot, QueuePosition::AtEnd, Wait::new(TimeDelta::milliseconds(50)))
        .unwrap();

    let completions = drain(&mut robot, &mut list, 50);
    let published: Vec<ActionCompletion> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            RobotEvent::ActionCompleted(completion) => Some(completion),
            _ => None,
        })
        .collect();

    assert_eq!(completions.len(), 1);
    assert_eq!(published, completions);
    assert_eq!(published[0].tag, tag);
    assert!(serde_json::to_string(&published[0]).is_ok_and(|json| json.contains("Wait")));
}
