//! Scripted motion firmware for the simulated robot.
//!
//! Dock and place commands put the robot into the picking/placing state for
//! a fixed number of ticks; when the countdown ends the maneuver's effect
//! is applied to the world according to the [`FirmwareScript`].

use core::f32::consts::PI;

use maneuver_types::{
    DockCommand, DockManeuver, DockingStatus, ObjectId, Pose3d, VisionMode, normalize_angle,
};
use tracing::{debug, info, warn};

use super::SimRobot;
use crate::error::CommandError;
use crate::events::RobotEvent;
use crate::robot::{RobotCommands, RobotState};

/// How the simulated firmware behaves.
#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareScript {
    /// Whether dock maneuvers report success.
    pub dock_succeeds: bool,
    /// Whether dock commands are refused outright.
    pub reject_dock_commands: bool,
    /// Body pitch (rad) reached by a wheelie.
    pub wheelie_pitch: f32,
    /// Whether mounting the charger makes electrical contact.
    pub charger_contact: bool,
    /// Leave a same-type object behind at the pickup spot, as if perception
    /// still saw the cube there after the lift came up empty.
    pub leave_duplicate_on_pickup: bool,
}

impl Default for FirmwareScript {
    fn default() -> Self {
        Self {
            dock_succeeds: true,
            reject_dock_commands: false,
            wheelie_pitch: 1.3,
            charger_contact: true,
            leave_duplicate_on_pickup: false,
        }
    }
}

/// A maneuver in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Activity {
    /// Executing a dock command.
    Docking {
        command: DockCommand,
        remaining: u32,
        lift_signalled: bool,
    },
    /// Putting the carried object down.
    PlacingOnGround { remaining: u32 },
}

const fn moves_lift(maneuver: DockManeuver) -> bool {
    matches!(
        maneuver,
        DockManeuver::PickupLow
            | DockManeuver::PickupHigh
            | DockManeuver::PlaceLow
            | DockManeuver::PlaceHigh
            | DockManeuver::RollLow
            | DockManeuver::DeepRollLow
            | DockManeuver::PopAWheelie
    )
}

impl SimRobot {
    pub(super) fn start_dock(&mut self, command: &DockCommand) -> Result<(), CommandError> {
        if self.script.reject_dock_commands {
            return Err(CommandError::Rejected {
                command: "dock_with_object",
                reason: "firmware refused".to_owned(),
            });
        }
        if self.activity.is_some() {
            return Err(CommandError::Rejected {
                command: "dock_with_object",
                reason: "maneuver in progress".to_owned(),
            });
        }
        if !self.objects.contains_key(&command.object) {
            return Err(CommandError::UnknownObject {
                command: "dock_with_object",
                object: command.object,
            });
        }
        info!(
            object = %command.object,
            maneuver = ?command.maneuver,
            marker = %command.marker,
            "Simulated dock started"
        );
        self.dock_commands.push(*command);
        self.vision_modes.remove(&VisionMode::DetectingMarkers);
        self.vision_modes.insert(VisionMode::Tracking);
        self.activity = Some(Activity::Docking {
            command: *command,
            remaining: self.params.dock_ticks.max(1),
            lift_signalled: false,
        });
        self.events
            .publish(&RobotEvent::DockingStatus(DockingStatus::Approaching));
        Ok(())
    }

    pub(super) fn start_place_on_ground(&mut self) -> Result<(), CommandError> {
        if self.carrying.is_none() {
            return Err(CommandError::Rejected {
                command: "place_object_on_ground",
                reason: "not carrying".to_owned(),
            });
        }
        if self.activity.is_some() {
            return Err(CommandError::Rejected {
                command: "place_object_on_ground",
                reason: "maneuver in progress".to_owned(),
            });
        }
        self.activity = Some(Activity::PlacingOnGround {
            remaining: self.params.place_ticks.max(1),
        });
        Ok(())
    }

    pub(super) fn step_activity(&mut self) {
        let Some(activity) = self.activity.take() else {
            return;
        };
        match activity {
            Activity::Docking {
                command,
                remaining,
                lift_signalled,
            } => {
                let remaining = remaining.saturating_sub(1);
                let signal_at = self.params.dock_ticks.checked_div(3).unwrap_or(0);
                let mut signalled = lift_signalled;
                if !signalled && remaining <= signal_at && moves_lift(command.maneuver) {
                    self.events.publish(&RobotEvent::LiftMovingPostDock {
                        maneuver: command.maneuver,
                    });
                    signalled = true;
                }
                if remaining == 0 {
                    self.finish_dock(&command);
                } else {
                    self.activity = Some(Activity::Docking {
                        command,
                        remaining,
                        lift_signalled: signalled,
                    });
                }
            }
            Activity::PlacingOnGround { remaining } => {
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.finish_place_on_ground();
                } else {
                    self.activity = Some(Activity::PlacingOnGround { remaining });
                }
            }
        }
    }

    fn finish_dock(&mut self, command: &DockCommand) {
        self.vision_modes.insert(VisionMode::DetectingMarkers);
        self.vision_modes.remove(&VisionMode::Tracking);
        self.events
            .publish(&RobotEvent::DockingStatus(DockingStatus::Complete));

        let succeeded = self.script.dock_succeeds;
        self.last_pick_or_place_succeeded = succeeded;
        info!(maneuver = ?command.maneuver, succeeded, "Simulated dock finished");
        if !succeeded {
            return;
        }

        match command.maneuver {
            DockManeuver::PickupLow | DockManeuver::PickupHigh => self.complete_pickup(command),
            DockManeuver::PlaceLow | DockManeuver::PlaceHigh => self.complete_place(command),
            DockManeuver::RollLow | DockManeuver::DeepRollLow => self.complete_roll(command),
            DockManeuver::PopAWheelie => self.pitch = self.script.wheelie_pitch,
            DockManeuver::Align => {}
            DockManeuver::CrossBridge => self.complete_cross_bridge(command),
            DockManeuver::AscendRamp | DockManeuver::DescendRamp => self.complete_ramp(command),
            DockManeuver::MountCharger => self.complete_mount_charger(command.object),
        }
    }

    fn complete_pickup(&mut self, command: &DockCommand) {
        let Some(original) = self.objects.get(&command.object).cloned() else {
            warn!(object = %command.object, "Pickup target vanished");
            self.last_pick_or_place_succeeded = false;
            return;
        };
        self.set_carrying_object(command.object, command.marker);
        self.lift_target = Some(self.params.carry_height);

        if self.script.leave_duplicate_on_pickup {
            let mut ghost = original;
            ghost.id = ObjectId::new();
            ghost.times_observed = 0;
            ghost.last_observed = None;
            debug!(ghost = %ghost.id, "Leaving duplicate at pickup pose");
            let bottom = super::objects::cube_bottom_marker(ghost.object_type);
            self.bottom_markers.insert(ghost.id, bottom);
            self.objects.insert(ghost.id, ghost);
        }
    }

    fn complete_place(&mut self, command: &DockCommand) {
        let Some((carried, _)) = self.carrying else {
            self.last_pick_or_place_succeeded = false;
            return;
        };
        let (Some(target), Some(held)) = (
            self.objects.get(&command.object).cloned(),
            self.objects.get(&carried).cloned(),
        ) else {
            self.last_pick_or_place_succeeded = false;
            return;
        };

        let placement = command.placement;
        let pose = if command.maneuver == DockManeuver::PlaceHigh {
            let mut on_top = target.pose;
            on_top.translation.z += target.size.z;
            on_top.heading = normalize_angle(on_top.heading + placement.angle_rad);
            on_top
        } else {
            let marker_pose = target
                .marker(command.marker)
                .map_or(target.pose, |m| target.marker_pose(m));
            let mut beside = marker_pose.compose(&Pose3d::new(
                held.size.x / 2.0 + placement.x_mm,
                placement.y_mm,
                0.0,
                placement.angle_rad,
            ));
            beside.translation.z = held.size.z / 2.0;
            beside
        };
        if let Some(record) = self.objects.get_mut(&carried) {
            record.pose = pose;
        }
        self.carrying = None;
        self.lift_target = Some(self.params.low_dock_height);
    }

    fn complete_roll(&mut self, command: &DockCommand) {
        let bottom = self.bottom_markers.get(&command.object).copied();
        let Some(record) = self.objects.get_mut(&command.object) else {
            self.last_pick_or_place_succeeded = false;
            return;
        };
        let old_top = record.top_marker;
        let Some(face) = record.markers.iter_mut().find(|m| m.code == command.marker) else {
            return;
        };
        let rolled_toward = record.pose.compose(&face.face).heading + PI;
        if let Some(top) = old_top {
            face.code = top;
        }
        record.top_marker = bottom;
        let size = record.size.x;
        record.pose.translation.x += size * rolled_toward.cos();
        record.pose.translation.y += size * rolled_toward.sin();
        self.bottom_markers.insert(command.object, command.marker);
    }

    fn complete_cross_bridge(&mut self, command: &DockCommand) {
        let Some(bridge) = self.objects.get(&command.object) else {
            return;
        };
        let exit = command
            .marker2
            .and_then(|code| bridge.marker(code))
            .map(|m| bridge.marker_pose(m));
        if let Some(exit) = exit {
            let mut pose = exit.compose(&Pose3d::new(60.0, 0.0, 0.0, 0.0));
            pose.translation.z = 0.0;
            self.pose = pose;
        }
    }

    fn complete_ramp(&mut self, command: &DockCommand) {
        let Some(ramp) = self.objects.get(&command.object) else {
            return;
        };
        let half = ramp.size.x / 2.0;
        self.pose = if command.maneuver == DockManeuver::AscendRamp {
            ramp.pose.compose(&Pose3d::new(half, 0.0, ramp.size.z, 0.0))
        } else {
            ramp.pose.compose(&Pose3d::new(-half - 60.0, 0.0, 0.0, PI))
        };
    }

    fn complete_mount_charger(&mut self, charger: ObjectId) {
        self.on_charger = self.script.charger_contact;
        if let Some(record) = self.objects.get(&charger) {
            self.pose = record.pose.compose(&Pose3d::new(0.0, 0.0, 0.0, PI));
        }
    }

    fn finish_place_on_ground(&mut self) {
        let Some((carried, _)) = self.carrying else {
            self.last_pick_or_place_succeeded = false;
            return;
        };
        let mut pose = self.pose().compose(&self.carried_offset);
        if let Some(record) = self.objects.get_mut(&carried) {
            pose.translation.z = record.size.z / 2.0;
            record.pose = pose;
        }
        self.carrying = None;
        self.last_pick_or_place_succeeded = true;
        self.lift_target = Some(self.params.low_dock_height);
        info!(object = %carried, "Simulated place on ground finished");
    }
}
