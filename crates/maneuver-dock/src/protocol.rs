//! The docking protocol shared by every physical manipulation maneuver.
//!
//! ```text
//! init -> visually verifying -> awaiting start -> awaiting completion -> verifying
//! ```
//!
//! Init resolves the target, selects an approach pose and asks the
//! maneuver for a firmware maneuver. The face-and-verify sub-action then
//! confirms the marker before the dock command is sent. Once the firmware
//! has entered and left its picking/placing state and the robot is still,
//! the maneuver's `verify` hook decides the result.

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_actions::{
    Action, ActionRunner, ActionSlot, CompoundSequential, TurnTowardsObject,
    VisuallyVerifyNoObjectAtPose,
};
use maneuver_types::{
    ActionResult, ActionTag, CompletionPayload, DockCommand, DockManeuver, DockingMethod,
    FaceLayerTag, MarkerCode, ObjectId, ObjectInteractionCompleted, ObjectInteractionResult,
    PlacementOffset, TrackSet, VisionMode,
};
use maneuver_world::{
    ApproachParams, EventKind, Robot, RobotEvent, Subscription, select_pre_action_pose,
};
use tracing::{debug, info, warn};

use crate::maneuver::{DockContext, Maneuver};
use crate::settings::DockSettings;

/// Face overlay shown while the firmware docks.
pub const DOCKING_FACE_LAYER: &str = "squint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    VisuallyVerifying,
    AwaitingStart,
    AwaitingCompletion,
    Verifying,
}

/// Caller-chosen options for one docking action.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DockOptions {
    /// Only approach from roughly this heading (rad).
    pub approach_angle: Option<f32>,
    /// Drive speed manually; the body track stays free.
    pub use_manual_speed: bool,
    /// Placement offset from the docking marker.
    pub placement: PlacementOffset,
    /// Override the maneuver's servoing strategy.
    pub method: Option<DockingMethod>,
}

/// A docking action parameterised by its maneuver.
#[derive(Debug)]
pub struct DockAction<M: Maneuver> {
    maneuver: M,
    object: ObjectId,
    settings: DockSettings,
    options: DockOptions,
    tag: ActionTag,
    phase: Phase,
    ctx: Option<DockContext>,
    chosen: Option<DockManeuver>,
    interaction: ObjectInteractionResult,
    face_and_verify: ActionSlot,
    lift_events: Option<Subscription>,
    face_layer: Option<FaceLayerTag>,
    reactions_suppressed: bool,
    verify_at: Option<DateTime<Utc>>,
}

impl<M: Maneuver> DockAction<M> {
    /// Dock with `object` using `maneuver`.
    pub fn new(object: ObjectId, maneuver: M, settings: DockSettings) -> Self {
        Self {
            maneuver,
            object,
            settings,
            options: DockOptions::default(),
            tag: ActionTag::INVALID,
            phase: Phase::VisuallyVerifying,
            ctx: None,
            chosen: None,
            interaction: ObjectInteractionResult::Incomplete,
            face_and_verify: ActionSlot::new(),
            lift_events: None,
            face_layer: None,
            reactions_suppressed: false,
            verify_at: None,
        }
    }

    /// Replace the docking options.
    #[must_use]
    pub const fn with_options(mut self, options: DockOptions) -> Self {
        self.options = options;
        self
    }

    /// Only approach from roughly `angle`.
    #[must_use]
    pub const fn with_approach_angle(mut self, angle: f32) -> Self {
        self.options.approach_angle = Some(angle);
        self
    }

    /// Drive speed manually, leaving the body track free.
    #[must_use]
    pub const fn with_manual_speed(mut self) -> Self {
        self.options.use_manual_speed = true;
        self
    }

    /// Placement offset from the docking marker.
    #[must_use]
    pub const fn with_placement(mut self, placement: PlacementOffset) -> Self {
        self.options.placement = placement;
        self
    }

    /// Override the maneuver's servoing strategy.
    #[must_use]
    pub const fn with_method(mut self, method: DockingMethod) -> Self {
        self.options.method = Some(method);
        self
    }

    /// The maneuver.
    pub const fn maneuver(&self) -> &M {
        &self.maneuver
    }

    /// Diagnosis so far.
    pub fn interaction_result(&self) -> ObjectInteractionResult {
        self.ctx.as_ref().map_or(self.interaction, |ctx| ctx.interaction)
    }

    fn fail(&mut self, result: ActionResult, interaction: ObjectInteractionResult) -> ActionResult {
        warn!(
            action = self.maneuver.name(),
            object = %self.object,
            ?result,
            ?interaction,
            "Docking failed during init"
        );
        self.interaction = interaction;
        result
    }

    fn face_and_verify_runner(&self, ctx: &DockContext) -> ActionRunner {
        let marker = if self.maneuver.verify_object_only() {
            MarkerCode::ANY
        } else {
            ctx.marker()
        };
        let mut steps: Vec<Box<dyn Action>> = Vec::new();
        if self.maneuver.check_for_object_on_top() {
            let mut top = ctx.record.pose;
            top.translation.z += ctx.record.size.z;
            steps.push(Box::new(
                VisuallyVerifyNoObjectAtPose::new(top, ctx.record.size.z / 2.0).ignoring(ctx.object),
            ));
        }
        steps.push(Box::new(
            TurnTowardsObject::new(ctx.object, marker, ctx.settings.lift)
                .with_verification()
                .with_required_sightings(ctx.settings.verify_sightings),
        ));
        ActionRunner::new(CompoundSequential::new(steps).named("FaceAndVerify"))
            .without_completion_signal()
            .with_track_locking_suppressed()
    }

    fn play_lift_sound(&mut self, robot: &mut dyn Robot) {
        let Some(subscription) = self.lift_events.as_mut() else {
            return;
        };
        let signalled = subscription
            .drain()
            .into_iter()
            .any(|event| matches!(event, RobotEvent::LiftMovingPostDock { .. }));
        if signalled {
            self.lift_events = None;
            if let Some(trigger) = self.maneuver.lift_moving_animation() {
                debug!(?trigger, "Lift moving after dock");
                robot.play_animation(trigger);
            }
        }
    }

    fn send_dock_command(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let (Some(ctx), Some(maneuver)) = (self.ctx.as_mut(), self.chosen) else {
            return ActionResult::FailureAbort;
        };
        let command = DockCommand {
            object: ctx.object,
            maneuver,
            marker: ctx.marker(),
            marker2: ctx.marker2,
            motion: ctx.motion,
            placement: ctx.placement.clamped(),
            use_manual_speed: ctx.use_manual_speed,
            num_retries: ctx.num_retries,
            method: ctx.method,
        };
        match robot.dock_with_object(&command) {
            Ok(()) => {
                info!(
                    action = self.maneuver.name(),
                    object = %command.object,
                    maneuver = ?command.maneuver,
                    marker = %command.marker,
                    method = ?command.method,
                    "Dock command sent"
                );
                self.phase = Phase::AwaitingStart;
                ActionResult::Running
            }
            Err(e) => {
                warn!(action = self.maneuver.name(), error = %e, "Dock command failed");
                ctx.interaction = ObjectInteractionResult::UnknownProblem;
                ActionResult::FailureAbort
            }
        }
    }

    fn await_completion(&mut self, robot: &mut dyn Robot) -> bool {
        if robot.is_picking_or_placing() || robot.is_moving() {
            self.verify_at = None;
            return false;
        }
        let now = robot.now();
        let delay = self
            .ctx
            .as_ref()
            .map_or_else(TimeDelta::zero, |ctx| self.maneuver.verify_delay(ctx));
        if self.verify_at.is_none() || robot.is_head_moving() {
            self.verify_at = now.checked_add_signed(delay);
        }
        self.verify_at.is_none_or(|at| now >= at)
    }
}

impl<M: Maneuver> Action for DockAction<M> {
    fn name(&self) -> &str {
        self.maneuver.name()
    }

    fn tracks_to_lock(&self) -> TrackSet {
        if self.options.use_manual_speed {
            TrackSet::ALL.without(TrackSet::BODY)
        } else {
            TrackSet::ALL
        }
    }

    fn movement_tracks_to_ignore(&self) -> TrackSet {
        self.tracks_to_lock()
    }

    fn timeout(&self) -> Option<TimeDelta> {
        Some(self.settings.action_timeout)
    }

    fn assign_tag(&mut self, tag: ActionTag) {
        self.tag = tag;
    }

    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult {
        self.phase = Phase::VisuallyVerifying;
        self.verify_at = None;
        self.chosen = None;
        self.ctx = None;
        self.interaction = ObjectInteractionResult::Incomplete;

        let Some(record) = robot.object(self.object).cloned() else {
            return self.fail(ActionResult::FailureAbort, ObjectInteractionResult::InvalidObject);
        };
        if robot.carrying_object() == Some(self.object) {
            return self.fail(ActionResult::FailureAbort, ObjectInteractionResult::InvalidObject);
        }

        let obstacles = robot.obstacles();
        let candidates = robot.pre_action_poses(
            self.object,
            self.maneuver.pre_action_type(),
            MarkerCode::ANY,
            &obstacles,
            0.0,
        );
        let params = ApproachParams {
            angle_tolerance: self.settings.pre_dock_angle_tolerance,
            nominal_approach_distance: self.settings.nominal_approach_distance,
            near_pose_check: self.maneuver.near_pose_check(),
            approach_angle: self.options.approach_angle,
        };
        let selection = match select_pre_action_pose(&robot.pose(), &record.pose, candidates, &params) {
            Ok(selection) => selection,
            Err(failure) => return self.fail(failure.result, failure.interaction),
        };

        let mut ctx = DockContext {
            object: self.object,
            target: record.target_kind(),
            record,
            selection,
            settings: self.settings,
            motion: self.settings.motion,
            placement: self.options.placement,
            method: self.options.method.unwrap_or_else(|| self.maneuver.docking_method()),
            num_retries: self.settings.num_retries,
            use_manual_speed: self.options.use_manual_speed,
            marker2: None,
            interaction: ObjectInteractionResult::Incomplete,
            started_at: robot.now(),
        };

        let chosen = match self.maneuver.select_dock_maneuver(&mut ctx, robot) {
            Ok(chosen) => chosen,
            Err(failure) => return self.fail(failure.result, failure.interaction),
        };
        ctx.marker2 = self.maneuver.dock_marker2(&ctx, &*robot);

        self.lift_events = Some(robot.events().subscribe(EventKind::LiftMovingPostDock));
        robot.set_reactions_suppressed(self.tag, true);
        self.reactions_suppressed = true;
        robot.set_dock_object(Some(self.object));

        let verify = self.face_and_verify_runner(&ctx);
        self.face_and_verify.set(robot, verify);

        info!(
            action = self.maneuver.name(),
            object = %self.object,
            maneuver = ?chosen,
            marker = %ctx.marker(),
            distance = ctx.selection.distance_to_closest,
            threshold = ctx.selection.distance_threshold,
            "Docking initialised"
        );
        self.chosen = Some(chosen);
        self.ctx = Some(ctx);
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        self.play_lift_sound(robot);

        if self.phase == Phase::VisuallyVerifying {
            match self.face_and_verify.update(robot) {
                Some(ActionResult::Running) => return ActionResult::Running,
                Some(ActionResult::Success) | None => {
                    debug!(action = self.maneuver.name(), "Marker verified");
                    return self.send_dock_command(robot);
                }
                Some(failure) => {
                    if let Some(ctx) = self.ctx.as_mut() {
                        ctx.interaction = ObjectInteractionResult::VisualVerificationFailed;
                    }
                    warn!(action = self.maneuver.name(), result = ?failure, "Visual verification failed");
                    return failure;
                }
            }
        }

        if self.phase == Phase::AwaitingStart {
            if !robot.is_picking_or_placing() {
                return ActionResult::Running;
            }
            debug!(action = self.maneuver.name(), "Firmware maneuver started");
            self.face_layer = Some(robot.add_face_layer(DOCKING_FACE_LAYER));
            self.phase = Phase::AwaitingCompletion;
        }

        if self.phase == Phase::AwaitingCompletion {
            if !self.await_completion(robot) {
                return ActionResult::Running;
            }
            debug!(
                action = self.maneuver.name(),
                succeeded = robot.last_pick_or_place_succeeded(),
                "Firmware maneuver finished"
            );
            self.phase = Phase::Verifying;
        }

        let Some(ctx) = self.ctx.as_mut() else {
            return ActionResult::FailureAbort;
        };
        let result = self.maneuver.verify(ctx, robot);
        match result {
            ActionResult::Running => {}
            ActionResult::Success => {
                ctx.interaction = ObjectInteractionResult::Success;
                info!(action = self.maneuver.name(), object = %ctx.object, "Docking verified");
            }
            failure => {
                if ctx.interaction == ObjectInteractionResult::Incomplete {
                    ctx.interaction = ObjectInteractionResult::UnknownProblem;
                }
                warn!(
                    action = self.maneuver.name(),
                    object = %ctx.object,
                    result = ?failure,
                    interaction = ?ctx.interaction,
                    "Docking verification failed"
                );
            }
        }
        result
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        robot.set_vision_mode(VisionMode::DetectingMarkers, true);
        robot.set_vision_mode(VisionMode::Tracking, false);
        if robot.is_traversing_path() {
            robot.abort_driving();
        }
        if robot.is_picking_or_placing() {
            robot.abort_docking();
        }
        robot.set_dock_object(None);
        if let Some(layer) = self.face_layer.take() {
            robot.remove_face_layer(layer);
        }
        if self.reactions_suppressed {
            robot.set_reactions_suppressed(self.tag, false);
            self.reactions_suppressed = false;
        }
        self.face_and_verify.clear(robot);
        self.lift_events = None;
        self.maneuver.cleanup(robot);
    }

    fn completion_payload(&self, robot: &dyn Robot) -> CompletionPayload {
        let object_ids = self
            .ctx
            .as_ref()
            .map_or_else(|| vec![self.object], |ctx| self.maneuver.completion_objects(ctx, robot));
        CompletionPayload::ObjectInteraction(ObjectInteractionCompleted {
            object_ids,
            result: self.interaction_result(),
        })
    }
}
