//! In-memory simulated robot.
//!
//! [`SimRobot`] implements every robot seam against a small kinematic and
//! perception model so actions can be exercised without hardware. Call
//! [`SimRobot::tick`] once per control frame before updating actions.
//!
//! # Modules
//!
//! - [`firmware`] -- Scripted dock and place maneuvers and their effects.
//! - [`objects`] -- Stock object records (cubes, charger, ramp, bridges).
//! - `perception` -- Camera visibility and observation reports.

pub mod firmware;
pub mod objects;
mod perception;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_types::{
    ActionTag, AnimationTrigger, DockCommand, FaceLayerTag, MarkerCode, MotionProfile, ObjectId,
    ObjectRecord, ObjectType, ObservedMarker, Obstacle, Pose3d, PreActionPose, PreActionType,
    RampDirection, VisionMode, angle_difference, normalize_angle,
};
use tracing::{debug, info};

use crate::error::{CommandError, WorldError};
use crate::events::EventBus;
use crate::registry::{TagRegistry, TrackLocks};
use crate::robot::{Robot, RobotCommands, RobotState, WorldQuery};

pub use firmware::FirmwareScript;

use firmware::Activity;

/// Kinematic and sensing parameters of the simulated robot.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    /// Simulated time per tick.
    pub tick_interval: TimeDelta,
    /// Head slew per tick (rad).
    pub head_speed: f32,
    /// Lift slew per tick (mm).
    pub lift_speed: f32,
    /// Turn rate per tick (rad).
    pub turn_speed: f32,
    /// Drive speed per tick (mm).
    pub drive_speed: f32,
    /// Ticks a dock maneuver spends in the picking/placing state.
    pub dock_ticks: u32,
    /// Ticks a place-on-ground maneuver spends in the picking/placing state.
    pub place_ticks: u32,
    /// Camera range (mm).
    pub camera_range: f32,
    /// Camera half field of view (rad).
    pub camera_half_fov: f32,
    /// Lift heights (mm) at which the lift blocks the camera.
    pub lift_occludes_camera: (f32, f32),
    /// Distance of docking/rolling approach poses from their marker (mm).
    pub pre_dock_distance: f32,
    /// Distance of place-relative approach poses from their marker (mm).
    pub place_relative_distance: f32,
    /// Distance of entry approach poses from their marker (mm).
    pub entry_distance: f32,
    /// Lift height while carrying (mm).
    pub carry_height: f32,
    /// Lift height when docked low (mm).
    pub low_dock_height: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            tick_interval: TimeDelta::milliseconds(33),
            head_speed: 0.15,
            lift_speed: 8.0,
            turn_speed: 0.25,
            drive_speed: 10.0,
            dock_ticks: 12,
            place_ticks: 8,
            camera_range: 600.0,
            camera_half_fov: 0.5,
            lift_occludes_camera: (40.0, 70.0),
            pre_dock_distance: 100.0,
            place_relative_distance: 140.0,
            entry_distance: 120.0,
            carry_height: 92.0,
            low_dock_height: 32.0,
        }
    }
}

/// Observations older than this many entries are discarded.
const OBSERVATION_LOG_LIMIT: usize = 2048;

/// A simulated robot and the world it lives in.
#[derive(Debug)]
pub struct SimRobot {
    params: SimParams,
    script: FirmwareScript,
    now: DateTime<Utc>,

    // --- Body ---
    pose: Pose3d,
    pitch: f32,
    head_angle: f32,
    lift_height: f32,
    head_target: Option<f32>,
    lift_target: Option<f32>,
    heading_target: Option<f32>,
    path_target: Option<Pose3d>,
    on_charger: bool,

    // --- Manipulation ---
    carrying: Option<(ObjectId, MarkerCode)>,
    carried_offset: Pose3d,
    activity: Option<Activity>,
    last_pick_or_place_succeeded: bool,
    dock_object: Option<ObjectId>,
    ramp: Option<(ObjectId, RampDirection)>,
    charger: Option<ObjectId>,

    // --- World ---
    objects: BTreeMap<ObjectId, ObjectRecord>,
    unlocated: BTreeMap<ObjectId, ObjectRecord>,
    bottom_markers: BTreeMap<ObjectId, MarkerCode>,
    obstacles: Vec<Obstacle>,
    observations: Vec<ObservedMarker>,

    // --- Outputs ---
    vision_modes: BTreeSet<VisionMode>,
    face_layers: BTreeMap<FaceLayerTag, String>,
    next_face_layer: u32,
    reaction_suppressors: BTreeSet<ActionTag>,
    dock_commands: Vec<DockCommand>,
    animations: Vec<AnimationTrigger>,

    // --- Registries ---
    events: EventBus,
    track_locks: TrackLocks,
    tags: TagRegistry,
}

impl SimRobot {
    /// Create a robot at the origin with nothing else in the world.
    pub fn new(params: SimParams, start: DateTime<Utc>) -> Self {
        let lift_height = params.low_dock_height;
        Self {
            params,
            script: FirmwareScript::default(),
            now: start,
            pose: Pose3d::default(),
            pitch: 0.0,
            head_angle: 0.0,
            lift_height,
            head_target: None,
            lift_target: None,
            heading_target: None,
            path_target: None,
            on_charger: false,
            carrying: None,
            carried_offset: Pose3d::default(),
            activity: None,
            last_pick_or_place_succeeded: false,
            dock_object: None,
            ramp: None,
            charger: None,
            objects: BTreeMap::new(),
            unlocated: BTreeMap::new(),
            bottom_markers: BTreeMap::new(),
            obstacles: Vec::new(),
            observations: Vec::new(),
            vision_modes: BTreeSet::from([VisionMode::DetectingMarkers]),
            face_layers: BTreeMap::new(),
            next_face_layer: 1,
            reaction_suppressors: BTreeSet::new(),
            dock_commands: Vec::new(),
            animations: Vec::new(),
            events: EventBus::new(),
            track_locks: TrackLocks::new(),
            tags: TagRegistry::new(),
        }
    }

    // -----------------------------------------------------------------------
    // World setup
    // -----------------------------------------------------------------------

    /// Add an object record.
    pub fn add_object(&mut self, record: ObjectRecord) -> Result<ObjectId, WorldError> {
        let id = record.id;
        if self.objects.contains_key(&id) || self.unlocated.contains_key(&id) {
            return Err(WorldError::DuplicateObject(id));
        }
        if record.family() == maneuver_types::ObjectFamily::Block {
            self.bottom_markers.insert(id, objects::cube_bottom_marker(record.object_type));
        }
        self.objects.insert(id, record);
        Ok(id)
    }

    /// Add a light cube resting on the ground.
    pub fn add_cube(&mut self, object_type: ObjectType, x: f32, y: f32, heading: f32) -> ObjectId {
        let record = objects::cube_record(object_type, x, y, heading);
        let id = record.id;
        self.bottom_markers.insert(id, objects::cube_bottom_marker(object_type));
        self.objects.insert(id, record);
        id
    }

    /// Add a static obstacle.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    /// Mutable access to an object record.
    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut ObjectRecord> {
        self.objects.get_mut(&id)
    }

    /// Teleport the robot.
    pub fn set_pose(&mut self, pose: Pose3d) {
        self.pose = pose;
    }

    /// Force the body pitch.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    /// Force the on-charger contact state.
    pub fn set_on_charger(&mut self, on_charger: bool) {
        self.on_charger = on_charger;
    }

    /// Force the last pick/place outcome.
    pub fn set_last_pick_or_place_succeeded(&mut self, succeeded: bool) {
        self.last_pick_or_place_succeeded = succeeded;
    }

    /// Force the head angle.
    pub fn set_head_angle(&mut self, angle: f32) {
        self.head_angle = angle;
    }

    /// Firmware behavior script.
    pub fn script_mut(&mut self) -> &mut FirmwareScript {
        &mut self.script
    }

    /// Simulation parameters.
    pub const fn params(&self) -> &SimParams {
        &self.params
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Every dock command received, oldest first.
    pub fn dock_commands(&self) -> &[DockCommand] {
        &self.dock_commands
    }

    /// Every animation trigger played, oldest first.
    pub fn played_animations(&self) -> &[AnimationTrigger] {
        &self.animations
    }

    /// Number of face layers currently shown.
    pub fn face_layer_count(&self) -> usize {
        self.face_layers.len()
    }

    /// Whether a vision mode is enabled.
    pub fn vision_mode_enabled(&self, mode: VisionMode) -> bool {
        self.vision_modes.contains(&mode)
    }

    /// Whether any owner suppresses reactions.
    pub fn reactions_suppressed(&self) -> bool {
        !self.reaction_suppressors.is_empty()
    }

    /// Object currently marked as the dock target.
    pub const fn dock_object(&self) -> Option<ObjectId> {
        self.dock_object
    }

    /// Ramp the robot was told about.
    pub const fn ramp(&self) -> Option<(ObjectId, RampDirection)> {
        self.ramp
    }

    /// Charger the robot was told about.
    pub const fn charger(&self) -> Option<ObjectId> {
        self.charger
    }

    /// Whether a dock or place maneuver is executing.
    pub const fn has_activity(&self) -> bool {
        self.activity.is_some()
    }

    /// Whether the robot is following a path.
    pub const fn has_path(&self) -> bool {
        self.path_target.is_some()
    }

    /// Number of located objects of a type.
    pub fn count_of_type(&self, object_type: ObjectType) -> usize {
        self.objects.values().filter(|o| o.object_type == object_type).count()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance simulated time by one tick.
    ///
    /// Order: clock, motors, carried object, firmware maneuver, perception.
    pub fn tick(&mut self) {
        self.now = self
            .now
            .checked_add_signed(self.params.tick_interval)
            .unwrap_or(self.now);
        self.step_motors();
        self.sync_carried_object();
        self.step_activity();
        self.sync_carried_object();
        self.perceive();
    }

    fn step_motors(&mut self) {
        if let Some(target) = self.head_target {
            let (angle, done) = approach(self.head_angle, target, self.params.head_speed);
            self.head_angle = angle;
            if done {
                self.head_target = None;
            }
        }
        if let Some(target) = self.lift_target {
            let (height, done) = approach(self.lift_height, target, self.params.lift_speed);
            self.lift_height = height;
            if done {
                self.lift_target = None;
            }
        }
        if let Some(target) = self.heading_target {
            let error = angle_difference(target, self.pose.heading);
            let step = error.clamp(-self.params.turn_speed, self.params.turn_speed);
            self.pose.heading = normalize_angle(self.pose.heading + step);
            if (error - step).abs() <= f32::EPSILON {
                self.pose.heading = normalize_angle(target);
                self.heading_target = None;
            }
        }
        if let Some(target) = self.path_target {
            let delta = target.xy() - self.pose.xy();
            let remaining = delta.norm();
            if remaining <= self.params.drive_speed {
                self.pose = target;
                self.path_target = None;
                debug!("Simulated path complete");
            } else {
                let step = delta * (self.params.drive_speed / remaining);
                self.pose.translation.x += step.x;
                self.pose.translation.y += step.y;
                self.pose.heading = step.y.atan2(step.x);
            }
        }
    }

    fn sync_carried_object(&mut self) {
        if let Some((id, _)) = self.carrying {
            let mut pose = self.pose.compose(&self.carried_offset);
            pose.translation.z = self.pose.z() + self.lift_height;
            if let Some(record) = self.objects.get_mut(&id) {
                record.pose = pose;
            }
        }
    }
}

/// Move `current` towards `target` by at most `step`.
fn approach(current: f32, target: f32, step: f32) -> (f32, bool) {
    let error = target - current;
    if error.abs() <= step {
        (target, true)
    } else {
        (current + step.copysign(error), false)
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

impl RobotState for SimRobot {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn pose(&self) -> Pose3d {
        self.pose
    }

    fn carrying_object(&self) -> Option<ObjectId> {
        self.carrying.map(|(id, _)| id)
    }

    fn carrying_marker(&self) -> Option<MarkerCode> {
        self.carrying.map(|(_, marker)| marker)
    }

    fn is_head_moving(&self) -> bool {
        self.head_target.is_some()
    }

    fn is_lift_moving(&self) -> bool {
        self.lift_target.is_some()
    }

    fn is_body_moving(&self) -> bool {
        self.heading_target.is_some()
            || self.path_target.is_some()
            || matches!(self.activity, Some(Activity::Docking { .. }))
    }

    fn head_angle(&self) -> f32 {
        self.head_angle
    }

    fn lift_height(&self) -> f32 {
        self.lift_height
    }

    fn pitch_angle(&self) -> f32 {
        self.pitch
    }

    fn is_on_charger(&self) -> bool {
        self.on_charger
    }

    fn is_picking_or_placing(&self) -> bool {
        self.activity.is_some()
    }

    fn is_traversing_path(&self) -> bool {
        self.path_target.is_some()
    }

    fn last_pick_or_place_succeeded(&self) -> bool {
        self.last_pick_or_place_succeeded
    }
}

impl WorldQuery for SimRobot {
    fn object(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.objects.get(&id)
    }

    fn object_ids_of_type(&self, object_type: ObjectType) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.object_type == object_type)
            .map(|o| o.id)
            .collect()
    }

    fn obstacles(&self) -> Vec<Obstacle> {
        self.obstacles.clone()
    }

    fn pre_action_poses(
        &self,
        object: ObjectId,
        action_type: PreActionType,
        marker_filter: MarkerCode,
        obstacles: &[Obstacle],
        offset_x_mm: f32,
    ) -> Vec<PreActionPose> {
        let Some(record) = self.objects.get(&object) else {
            return Vec::new();
        };
        let distance = match action_type {
            PreActionType::Docking | PreActionType::Rolling => self.params.pre_dock_distance,
            PreActionType::PlaceRelative => self.params.place_relative_distance,
            PreActionType::Entry => self.params.entry_distance,
        } + offset_x_mm;
        record
            .markers
            .iter()
            .filter(|m| m.offers(action_type) && marker_filter.matches(m.code))
            .map(|m| {
                let mut pose = record
                    .marker_pose(m)
                    .compose(&Pose3d::new(distance, 0.0, 0.0, core::f32::consts::PI));
                pose.translation.z = 0.0;
                PreActionPose {
                    object,
                    pose,
                    marker: m.code,
                    action_type,
                }
            })
            .filter(|p| !obstacles.iter().any(|o| o.contains(&p.pose)))
            .collect()
    }

    fn observed_markers_since(
        &self,
        object: ObjectId,
        since: DateTime<Utc>,
    ) -> Vec<ObservedMarker> {
        self.observations
            .iter()
            .filter(|o| o.object == object && o.observed_at >= since)
            .copied()
            .collect()
    }

    fn objects_observed_near(
        &self,
        pose: &Pose3d,
        radius_mm: f32,
        since: DateTime<Utc>,
    ) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.last_observed.is_some_and(|t| t >= since))
            .filter(|o| o.pose.distance(pose) < radius_mm)
            .map(|o| o.id)
            .collect()
    }

    fn object_on_top_of(&self, object: ObjectId, z_tolerance_mm: f32) -> Option<ObjectId> {
        let base = self.objects.get(&object)?;
        let expected_z = base.pose.z() + base.size.z;
        self.objects
            .values()
            .filter(|o| o.id != object && Some(o.id) != self.carrying_object())
            .find(|o| {
                (o.pose.z() - expected_z).abs() < z_tolerance_mm
                    && o.pose.xy_distance(&base.pose) < base.size.x / 2.0
            })
            .map(|o| o.id)
    }

    fn object_underneath(&self, object: ObjectId, z_tolerance_mm: f32) -> Option<ObjectId> {
        let top = self.objects.get(&object)?;
        self.objects
            .values()
            .filter(|o| o.id != object)
            .find(|o| {
                (top.pose.z() - (o.pose.z() + o.size.z)).abs() < z_tolerance_mm
                    && o.pose.xy_distance(&top.pose) < o.size.x / 2.0
            })
            .map(|o| o.id)
    }

    fn set_object_pose(&mut self, object: ObjectId, pose: Pose3d) {
        if let Some(record) = self.unlocated.remove(&object) {
            self.objects.insert(object, record);
        }
        if let Some(record) = self.objects.get_mut(&object) {
            record.pose = pose;
        }
    }

    fn clear_object(&mut self, object: ObjectId) {
        if let Some(record) = self.objects.remove(&object) {
            info!(%object, "Object pose cleared");
            self.unlocated.insert(object, record);
        }
    }

    fn delete_object(&mut self, object: ObjectId) {
        self.objects.remove(&object);
        self.unlocated.remove(&object);
        self.bottom_markers.remove(&object);
        info!(%object, "Object deleted");
    }
}

impl RobotCommands for SimRobot {
    fn dock_with_object(&mut self, command: &DockCommand) -> Result<(), CommandError> {
        self.start_dock(command)
    }

    fn place_object_on_ground(&mut self, _motion: &MotionProfile) -> Result<(), CommandError> {
        self.start_place_on_ground()
    }

    fn drive_to_pose(&mut self, pose: &Pose3d, _motion: &MotionProfile) -> Result<(), CommandError> {
        if self.activity.is_some() {
            return Err(CommandError::Rejected {
                command: "drive_to_pose",
                reason: "maneuver in progress".to_owned(),
            });
        }
        self.path_target = Some(*pose);
        Ok(())
    }

    fn turn_to_heading(&mut self, heading: f32) -> Result<(), CommandError> {
        self.heading_target = Some(normalize_angle(heading));
        Ok(())
    }

    fn move_lift_to_height(&mut self, height_mm: f32) -> Result<(), CommandError> {
        self.lift_target = Some(height_mm);
        Ok(())
    }

    fn move_head_to_angle(&mut self, angle_rad: f32) -> Result<(), CommandError> {
        self.head_target = Some(angle_rad);
        Ok(())
    }

    fn abort_docking(&mut self) {
        if self.activity.take().is_some() {
            info!("Simulated maneuver aborted");
            self.vision_modes.insert(VisionMode::DetectingMarkers);
            self.vision_modes.remove(&VisionMode::Tracking);
        }
    }

    fn abort_driving(&mut self) {
        self.path_target = None;
    }

    fn stop_all_motors(&mut self) {
        self.head_target = None;
        self.lift_target = None;
        self.heading_target = None;
        self.path_target = None;
    }

    fn set_carrying_object(&mut self, object: ObjectId, marker: MarkerCode) {
        if let Some(record) = self.objects.get(&object) {
            self.carried_offset = record.pose.relative_to(&self.pose);
        }
        self.carrying = Some((object, marker));
    }

    fn unset_carrying_object(&mut self) {
        self.carrying = None;
    }

    fn set_dock_object(&mut self, object: Option<ObjectId>) {
        self.dock_object = object;
    }

    fn set_vision_mode(&mut self, mode: VisionMode, enabled: bool) {
        if enabled {
            self.vision_modes.insert(mode);
        } else {
            self.vision_modes.remove(&mode);
        }
    }

    fn add_face_layer(&mut self, name: &str) -> FaceLayerTag {
        let tag = FaceLayerTag(self.next_face_layer);
        self.next_face_layer = self.next_face_layer.saturating_add(1);
        self.face_layers.insert(tag, name.to_owned());
        tag
    }

    fn remove_face_layer(&mut self, layer: FaceLayerTag) {
        self.face_layers.remove(&layer);
    }

    fn play_animation(&mut self, trigger: AnimationTrigger) {
        self.animations.push(trigger);
    }

    fn set_reactions_suppressed(&mut self, owner: ActionTag, suppressed: bool) {
        if suppressed {
            self.reaction_suppressors.insert(owner);
        } else {
            self.reaction_suppressors.remove(&owner);
        }
    }

    fn set_ramp(&mut self, ramp: ObjectId, direction: RampDirection) {
        self.ramp = Some((ramp, direction));
    }

    fn set_charger(&mut self, charger: ObjectId) {
        self.charger = Some(charger);
    }
}

impl Robot for SimRobot {
    fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    fn track_locks(&mut self) -> &mut TrackLocks {
        &mut self.track_locks
    }

    fn tags(&mut self) -> &mut TagRegistry {
        &mut self.tags
    }
}
