//! Scripted docking scenario.
//!
//! The scenario lays out three light cubes, a short bridge and a charger
//! with small seeded placement noise, then walks the robot through a fixed
//! list of [`Step`]s. Each step is queued only once the previous one has
//! finished, so approach poses are computed from where objects actually
//! ended up.

use std::f32::consts::{FRAC_PI_2, PI};

use maneuver_actions::{Action, ActionList, CompoundSequential, DriveToPose, QueuePosition};
use maneuver_dock::{
    CrossBridgeAction, DeepRollLatch, DockSettings, MountChargerAction, PickupObject,
    PlaceRelativeObject, RollObject, place_object_on_ground_at_pose,
};
use maneuver_types::{ActionTag, ObjectId, ObjectRecord, ObjectType, Pose3d};
use maneuver_world::sim::objects::{bridge_record, charger_record, cube_record};
use maneuver_world::{SimRobot, WorldError, WorldQuery};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::SimError;

/// Distance from a cube centre to a docking or rolling approach pose (mm).
const DOCK_STANDOFF_MM: f32 = 122.0;

/// Distance from a cube centre to a place-relative approach pose (mm).
const PLACE_STANDOFF_MM: f32 = 162.0;

/// Distance from a bridge centre to its entry approach pose (mm).
const BRIDGE_STANDOFF_MM: f32 = 220.0;

/// Distance from a charger centre to its entry approach pose (mm).
const CHARGER_STANDOFF_MM: f32 = 170.0;

/// Maximum placement noise along each axis (mm).
const POSITION_NOISE_MM: f32 = 6.0;

/// Maximum heading noise (rad).
const HEADING_NOISE: f32 = 0.04;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Objects placed in the scenario world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioWorld {
    /// Cube picked up, set down and stacked.
    pub stacked_cube: ObjectId,
    /// Cube the stack is built on.
    pub base_cube: ObjectId,
    /// Cube that gets rolled.
    pub rolled_cube: ObjectId,
    /// Short bridge.
    pub bridge: ObjectId,
    /// Charger.
    pub charger: ObjectId,
}

/// Populate `robot`'s world with jittered objects derived from `seed`.
pub fn build_world(robot: &mut SimRobot, seed: u64) -> Result<ScenarioWorld, SimError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut jitter = |x: f32, y: f32, heading: f32| {
        (
            x + rng.random_range(-POSITION_NOISE_MM..=POSITION_NOISE_MM),
            y + rng.random_range(-POSITION_NOISE_MM..=POSITION_NOISE_MM),
            heading + rng.random_range(-HEADING_NOISE..=HEADING_NOISE),
        )
    };

    let (x, y, h) = jitter(300.0, 0.0, 0.0);
    let stacked_cube = robot.add_object(cube_record(ObjectType::LightCube1, x, y, h))?;
    let (x, y, h) = jitter(300.0, 260.0, 0.0);
    let base_cube = robot.add_object(cube_record(ObjectType::LightCube2, x, y, h))?;
    let (x, y, h) = jitter(300.0, -260.0, 0.0);
    let rolled_cube = robot.add_object(cube_record(ObjectType::LightCube3, x, y, h))?;
    let (x, y, h) = jitter(-400.0, 0.0, PI);
    let bridge = robot.add_object(bridge_record(ObjectType::BridgeShort, x, y, h))?;
    let (x, y, h) = jitter(-900.0, 300.0, PI);
    let charger = robot.add_object(charger_record(x, y, h))?;

    let world = ScenarioWorld {
        stacked_cube,
        base_cube,
        rolled_cube,
        bridge,
        charger,
    };
    info!(seed, ?world, "Scenario world built");
    Ok(world)
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One scripted maneuver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Drive up to a cube and roll it onto its next face.
    Roll(ObjectId),
    /// Drive up to a cube and pick it up.
    Pickup(ObjectId),
    /// Drive to a pose and set the carried cube down there.
    PlaceOnGroundAt(Pose3d),
    /// Drive up to a cube and stack the carried cube on it.
    PlaceOnTop(ObjectId),
    /// Drive to a bridge entry and cross it.
    CrossBridge(ObjectId),
    /// Drive to the charger and back onto it.
    MountCharger(ObjectId),
}

impl Step {
    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Roll(_) => "roll",
            Self::Pickup(_) => "pickup",
            Self::PlaceOnGroundAt(_) => "place_on_ground",
            Self::PlaceOnTop(_) => "place_on_top",
            Self::CrossBridge(_) => "cross_bridge",
            Self::MountCharger(_) => "mount_charger",
        }
    }
}

/// The scripted sequence for `world`.
pub fn script(world: &ScenarioWorld) -> Vec<Step> {
    vec![
        Step::Roll(world.rolled_cube),
        Step::Pickup(world.stacked_cube),
        Step::PlaceOnGroundAt(Pose3d::new(120.0, -120.0, 0.0, -FRAC_PI_2)),
        Step::Pickup(world.stacked_cube),
        Step::PlaceOnTop(world.base_cube),
        Step::CrossBridge(world.bridge),
        Step::MountCharger(world.charger),
    ]
}

/// Ground-plane pose `standoff` behind `record` along its heading, facing it.
fn approach_pose(record: &ObjectRecord, standoff: f32) -> Pose3d {
    let ground = Pose3d::new(record.pose.x(), record.pose.y(), 0.0, record.pose.heading);
    ground.compose(&Pose3d::new(-standoff, 0.0, 0.0, 0.0))
}

fn approach(robot: &SimRobot, object: ObjectId, standoff: f32) -> Result<Pose3d, SimError> {
    robot
        .object(object)
        .map(|record| approach_pose(record, standoff))
        .ok_or_else(|| WorldError::ObjectNotFound(object).into())
}

fn drive_then(
    pose: Pose3d,
    settings: DockSettings,
    action: Box<dyn Action>,
    name: &str,
) -> CompoundSequential {
    CompoundSequential::new(vec![Box::new(DriveToPose::new(pose, settings.motion)), action])
        .named(name)
}

/// Queue `step` at the end of `actions`, rebuilding it up to `retries` times
/// while it asks for a retry.
pub fn queue_step(
    robot: &mut SimRobot,
    actions: &mut ActionList,
    step: Step,
    settings: DockSettings,
    retries: u32,
) -> Result<ActionTag, SimError> {
    let tag = match step {
        Step::Roll(cube) => {
            let pose = approach(robot, cube, DOCK_STANDOFF_MM)?;
            let latch = DeepRollLatch::new();
            actions.queue_with_retries(
                robot,
                QueuePosition::AtEnd,
                move || {
                    let roll = RollObject::roll(cube, latch.clone(), settings);
                    Box::new(drive_then(pose, settings, Box::new(roll), "DriveToRollObject"))
                },
                retries,
            )?
        }
        Step::Pickup(cube) => {
            let pose = approach(robot, cube, DOCK_STANDOFF_MM)?;
            actions.queue_with_retries(
                robot,
                QueuePosition::AtEnd,
                move || {
                    let pickup = PickupObject::pickup(cube, settings);
                    Box::new(drive_then(pose, settings, Box::new(pickup), "DriveToPickupObject"))
                },
                retries,
            )?
        }
        Step::PlaceOnGroundAt(pose) => actions.queue_with_retries(
            robot,
            QueuePosition::AtEnd,
            move || Box::new(place_object_on_ground_at_pose(pose, settings)),
            retries,
        )?,
        Step::PlaceOnTop(base) => {
            let pose = approach(robot, base, PLACE_STANDOFF_MM)?;
            actions.queue_with_retries(
                robot,
                QueuePosition::AtEnd,
                move || {
                    let place = PlaceRelativeObject::place_on_top(base, settings);
                    Box::new(drive_then(pose, settings, Box::new(place), "DriveToPlaceOnObject"))
                },
                retries,
            )?
        }
        Step::CrossBridge(bridge) => {
            let pose = approach(robot, bridge, BRIDGE_STANDOFF_MM)?;
            let cross = CrossBridgeAction::cross_bridge(bridge, settings);
            let sequence = drive_then(pose, settings, Box::new(cross), "DriveToCrossBridge");
            actions.queue_action(robot, QueuePosition::AtEnd, sequence)?
        }
        Step::MountCharger(charger) => {
            let pose = approach(robot, charger, CHARGER_STANDOFF_MM)?;
            actions.queue_with_retries(
                robot,
                QueuePosition::AtEnd,
                move || {
                    let mount = MountChargerAction::mount_charger(charger, settings);
                    Box::new(drive_then(pose, settings, Box::new(mount), "DriveToMountCharger"))
                },
                retries,
            )?
        }
    };
    info!(step = step.label(), tag = %tag, "Step queued");
    Ok(tag)
}
