//! End-to-end docking scenarios against the simulated robot.
//!
//! Each test builds a small world, parks the robot on an approach pose and
//! ticks one docking action to completion, checking both the terminal
//! result and the state the protocol leaves behind.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::{TimeDelta, TimeZone, Utc};
use maneuver_actions::ActionRunner;
use maneuver_dock::{
    AlignWithObject, AscendOrDescendRamp, CrossBridgeAction, DeepRollLatch, DockSettings,
    MountChargerAction, PickupObject, PlaceRelativeObject, PopAWheelieAction, RollObject,
};
use maneuver_types::{
    ActionResult, AlignmentType, AnimationTrigger, DockManeuver, DockingMethod, MarkerCode,
    ObjectId, ObjectInteractionCompleted, ObjectInteractionResult, ObjectType, Pose3d, RampDirection,
    VisionMode,
};
use maneuver_world::sim::objects::{bridge_record, charger_record, cube_record, ramp_record};
use maneuver_world::{RobotCommands, RobotState, SimParams, SimRobot, WorldQuery};

// =============================================================================
// Helpers
// =============================================================================

const MAX_TICKS: u32 = 900;

fn robot() -> SimRobot {
    SimRobot::new(SimParams::default(), Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
}

/// A light cube at (200, 0) with the robot on its near docking pose.
fn robot_at_cube() -> (SimRobot, ObjectId) {
    let mut robot = robot();
    let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
    robot.set_pose(Pose3d::new(78.0, 0.0, 0.0, 0.0));
    (robot, cube)
}

fn run(robot: &mut SimRobot, runner: &mut ActionRunner) -> ActionResult {
    for _ in 0..MAX_TICKS {
        let result = runner.update(robot);
        if result.is_terminal() {
            return result;
        }
        robot.tick();
    }
    ActionResult::Running
}

fn interaction(runner: &mut ActionRunner) -> ObjectInteractionCompleted {
    runner
        .take_completion()
        .and_then(|completion| completion.payload.object_interaction().cloned())
        .unwrap()
}

fn assert_protocol_released(robot: &SimRobot) {
    assert_eq!(robot.face_layer_count(), 0);
    assert!(!robot.reactions_suppressed());
    assert_eq!(robot.dock_object(), None);
    assert!(robot.vision_mode_enabled(VisionMode::DetectingMarkers));
    assert!(!robot.vision_mode_enabled(VisionMode::Tracking));
    assert!(!robot.has_activity());
}

// =============================================================================
// Pickup
// =============================================================================

#[test]
fn pickup_low_succeeds_and_reports_carried_object() {
    let (mut robot, cube) = robot_at_cube();
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert_eq!(robot.carrying_object(), Some(cube));

    let commands = robot.dock_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].maneuver, DockManeuver::PickupLow);
    assert_eq!(commands[0].marker, MarkerCode(12));
    assert_eq!(commands[0].method, DockingMethod::Hybrid);
    assert!(robot.played_animations().contains(&AnimationTrigger::SoundLiftEffortPickup));

    let info = interaction(&mut runner);
    assert_eq!(info.object_ids, vec![cube]);
    assert_eq!(info.result, ObjectInteractionResult::Success);
    assert_protocol_released(&robot);

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["result"], "Success");
    assert_eq!(json["object_ids"].as_array().map(Vec::len), Some(1));
}

#[test]
fn pickup_that_leaves_cube_behind_is_retryable() {
    let (mut robot, cube) = robot_at_cube();
    robot.script_mut().leave_duplicate_on_pickup = true;
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureRetry);
    assert_eq!(robot.carrying_object(), None);
    // The ghost is merged back into the first record.
    assert_eq!(robot.count_of_type(ObjectType::LightCube1), 1);
    assert!(robot.object(cube).is_some_and(|r| r.pose.z() < 30.0));
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::NotCarrying);
}

#[test]
fn carried_object_cannot_be_docked_with() {
    let (mut robot, cube) = robot_at_cube();
    robot.set_carrying_object(cube, MarkerCode(12));
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureAbort);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::InvalidObject);
    assert!(robot.dock_commands().is_empty());
}

#[test]
fn robot_far_from_approach_pose_must_retry() {
    let (mut robot, cube) = robot_at_cube();
    robot.set_pose(Pose3d::new(-300.0, 0.0, 0.0, 0.0));
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureRetry);
    assert_eq!(
        interaction(&mut runner).result,
        ObjectInteractionResult::DidNotReachPreactionPose
    );
}

#[test]
fn rejected_dock_command_aborts() {
    let (mut robot, cube) = robot_at_cube();
    robot.script_mut().reject_dock_commands = true;
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureAbort);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::UnknownProblem);
    assert_protocol_released(&robot);
}

#[test]
fn cube_on_top_fails_visual_verification() {
    let (mut robot, cube) = robot_at_cube();
    let mut top = cube_record(ObjectType::LightCube2, 200.0, 0.0, 0.0);
    top.pose.translation.z += 44.0;
    robot.add_object(top).unwrap();
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureAbort);
    assert_eq!(
        interaction(&mut runner).result,
        ObjectInteractionResult::VisualVerificationFailed
    );
    assert!(robot.dock_commands().is_empty());
    assert_eq!(robot.carrying_object(), None);
    assert_protocol_released(&robot);
}

#[test]
fn cancelling_mid_dock_releases_everything() {
    let (mut robot, cube) = robot_at_cube();
    let mut runner = ActionRunner::new(PickupObject::pickup(cube, DockSettings::default()));

    for _ in 0..MAX_TICKS {
        runner.update(&mut robot);
        if robot.face_layer_count() > 0 {
            break;
        }
        robot.tick();
    }
    assert_eq!(robot.face_layer_count(), 1);
    assert!(robot.reactions_suppressed());
    assert_eq!(robot.dock_object(), Some(cube));

    runner.cancel(&mut robot);
    assert_protocol_released(&robot);
    assert!(runner.take_completion().is_none());
}

// =============================================================================
// Placing and rolling
// =============================================================================

#[test]
fn place_on_top_reports_the_stack() {
    let mut robot = robot();
    let base = robot.add_cube(ObjectType::LightCube2, 200.0, 0.0, 0.0);
    let held = robot.add_cube(ObjectType::LightCube1, 80.0, 0.0, 0.0);
    robot.set_pose(Pose3d::new(38.0, 0.0, 0.0, 0.0));
    robot.set_carrying_object(held, MarkerCode(12));

    let mut runner = ActionRunner::new(PlaceRelativeObject::place_on_top(base, DockSettings::default()));
    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert_eq!(robot.carrying_object(), None);
    assert_eq!(robot.dock_commands()[0].maneuver, DockManeuver::PlaceHigh);
    assert!(robot.object(held).is_some_and(|r| (r.pose.z() - 66.0).abs() < 1.0));

    let info = interaction(&mut runner);
    assert_eq!(info.object_ids, vec![base, held]);
    assert_eq!(info.result, ObjectInteractionResult::Success);
}

#[test]
fn placing_without_carrying_aborts() {
    let mut robot = robot();
    let cube = robot.add_cube(ObjectType::LightCube1, 200.0, 0.0, 0.0);
    // On the place-relative approach pose, so selection is the first check to fail.
    robot.set_pose(Pose3d::new(38.0, 0.0, 0.0, 0.0));
    let mut runner = ActionRunner::new(PlaceRelativeObject::place_on_top(cube, DockSettings::default()));
    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureAbort);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::NotCarrying);
    assert!(robot.dock_commands().is_empty());
    assert_protocol_released(&robot);
}

#[test]
fn placing_from_the_docking_pose_checks_the_approach_first() {
    let (mut robot, cube) = robot_at_cube();
    let mut runner = ActionRunner::new(PlaceRelativeObject::place_on_top(cube, DockSettings::default()));
    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureRetry);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::DidNotReachPreactionPose);
}

#[test]
fn roll_turns_the_top_marker_towards_the_robot() {
    let (mut robot, cube) = robot_at_cube();
    let latch = DeepRollLatch::new();
    let mut runner = ActionRunner::new(RollObject::roll(cube, latch.clone(), DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert_eq!(robot.dock_commands()[0].maneuver, DockManeuver::RollLow);
    assert!(!latch.is_set());
    let record = robot.object(cube).unwrap();
    assert!((record.pose.x() - 244.0).abs() < 1.0);
    assert!(record.marker(MarkerCode(14)).is_some());
}

#[test]
fn latched_roll_goes_deep() {
    let (mut robot, cube) = robot_at_cube();
    let latch = DeepRollLatch::new();
    latch.set();
    let mut runner = ActionRunner::new(RollObject::roll(cube, latch, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert_eq!(robot.dock_commands()[0].maneuver, DockManeuver::DeepRollLow);
}

// =============================================================================
// Other maneuvers
// =============================================================================

#[test]
fn wheelie_without_enough_pitch_is_retryable() {
    let (mut robot, cube) = robot_at_cube();
    robot.script_mut().wheelie_pitch = 0.5;
    let mut runner = ActionRunner::new(PopAWheelieAction::pop_a_wheelie(cube, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureRetry);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::UnknownProblem);
}

#[test]
fn wheelie_succeeds_with_default_firmware() {
    let (mut robot, cube) = robot_at_cube();
    let mut runner = ActionRunner::new(PopAWheelieAction::pop_a_wheelie(cube, DockSettings::default()));
    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert!(robot.pitch_angle() > 1.0);
    assert!(robot.played_animations().contains(&AnimationTrigger::SoundLiftEffortWheelie));
}

#[test]
fn align_stops_short_of_the_marker() {
    let (mut robot, cube) = robot_at_cube();
    let mut runner = ActionRunner::new(AlignWithObject::align(
        cube,
        AlignmentType::LiftPlate,
        DockSettings::default(),
    ));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    let command = robot.dock_commands()[0];
    assert_eq!(command.maneuver, DockManeuver::Align);
    assert!((command.placement.x_mm - 25.0).abs() < 1e-3);
}

#[test]
fn charger_mount_succeeds_on_contact() {
    let mut robot = robot();
    let charger = robot.add_object(charger_record(300.0, 0.0, 0.0)).unwrap();
    robot.set_pose(Pose3d::new(130.0, 0.0, 0.0, 0.0));
    let mut runner = ActionRunner::new(MountChargerAction::mount_charger(charger, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert!(robot.is_on_charger());
    assert_eq!(robot.charger(), Some(charger));
}

#[test]
fn charger_verification_waits_for_the_head_to_settle() {
    let mut robot = robot();
    let charger = robot.add_object(charger_record(300.0, 0.0, 0.0)).unwrap();
    robot.set_pose(Pose3d::new(130.0, 0.0, 0.0, 0.0));
    let settings = DockSettings::default();
    let mut runner = ActionRunner::new(MountChargerAction::mount_charger(charger, settings));

    // Tick until the firmware has started and finished backing on.
    let mut started = false;
    for _ in 0..MAX_TICKS {
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        robot.tick();
        started |= robot.is_picking_or_placing();
        if started && !robot.is_picking_or_placing() {
            break;
        }
    }
    assert!(started);
    assert!(robot.is_on_charger());

    // Nod for twice the verify delay; the action must not finish meanwhile.
    let nod_until = robot.now().checked_add_signed(settings.charger_verify_delay * 2).unwrap();
    let mut up = true;
    while robot.now() < nod_until {
        robot.move_head_to_angle(if up { 0.4 } else { -0.2 }).unwrap();
        up = !up;
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        robot.tick();
    }

    let mut head_last_moving = robot.now();
    let mut result = ActionResult::Running;
    for _ in 0..MAX_TICKS {
        result = runner.update(&mut robot);
        if result.is_terminal() {
            break;
        }
        robot.tick();
        if robot.is_head_moving() {
            head_last_moving = robot.now();
        }
    }
    assert_eq!(result, ActionResult::Success);
    let waited = robot.now().signed_duration_since(head_last_moving);
    assert!(waited >= settings.charger_verify_delay);
    assert!(waited < settings.charger_verify_delay + TimeDelta::milliseconds(200));
}

#[test]
fn charger_mount_without_contact_is_retryable() {
    let mut robot = robot();
    let charger = robot.add_object(charger_record(300.0, 0.0, 0.0)).unwrap();
    robot.set_pose(Pose3d::new(130.0, 0.0, 0.0, 0.0));
    robot.script_mut().charger_contact = false;
    let mut runner = ActionRunner::new(MountChargerAction::mount_charger(charger, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::FailureRetry);
    assert_eq!(interaction(&mut runner).result, ObjectInteractionResult::UnknownProblem);
}

#[test]
fn bridge_is_crossed_to_the_far_marker() {
    let mut robot = robot();
    let bridge = robot
        .add_object(bridge_record(ObjectType::BridgeShort, 300.0, 0.0, 0.0))
        .unwrap();
    robot.set_pose(Pose3d::new(80.0, 0.0, 0.0, 0.0));
    let mut runner = ActionRunner::new(CrossBridgeAction::cross_bridge(bridge, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    let command = robot.dock_commands()[0];
    assert_eq!(command.marker, MarkerCode(60));
    assert_eq!(command.marker2, Some(MarkerCode(61)));
    assert!(robot.pose().x() > 400.0);
}

#[test]
fn ramp_is_ascended_from_its_foot() {
    let mut robot = robot();
    let ramp = robot.add_object(ramp_record(300.0, 0.0, 0.0)).unwrap();
    robot.set_pose(Pose3d::new(110.0, 0.0, 0.0, 0.0));
    let mut runner = ActionRunner::new(AscendOrDescendRamp::traverse_ramp(ramp, DockSettings::default()));

    assert_eq!(run(&mut robot, &mut runner), ActionResult::Success);
    assert_eq!(robot.ramp(), Some((ramp, RampDirection::Ascending)));
    assert!((robot.pose().z() - 44.0).abs() < 1.0);
}
