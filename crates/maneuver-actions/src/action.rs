//! The action lifecycle.
//!
//! Every action goes through the same steps, enforced by [`ActionRunner`]:
//!
//! 1. `init` runs once on the first update. `Running` means proceed,
//!    `Success` means the goal already holds, a failure short-circuits.
//! 2. `check_if_done` runs every tick (including the tick `init` returned
//!    `Running`) until it returns a terminal result or the timeout elapses.
//! 3. On the terminal tick the completion payload is captured, `cleanup`
//!    runs exactly once, track locks are released and a completion signal
//!    is published.
//!
//! Cancelling a started runner also runs `cleanup` exactly once.

use chrono::{DateTime, TimeDelta, Utc};
use maneuver_types::{ActionCompletion, ActionResult, ActionTag, CompletionPayload, TrackSet};
use maneuver_world::{Robot, RobotEvent, WorldError};
use tracing::{debug, info, warn};

/// Timeout applied to actions that do not choose their own (seconds).
pub const DEFAULT_ACTION_TIMEOUT_SECS: i64 = 30;

/// A resumable unit of robot behavior.
pub trait Action {
    /// Display name used in logs and completion signals.
    fn name(&self) -> &str;

    /// Tracks locked against animations while the action runs.
    fn tracks_to_lock(&self) -> TrackSet {
        TrackSet::EMPTY
    }

    /// Tracks whose movement should be ignored by reactions while running.
    fn movement_tracks_to_ignore(&self) -> TrackSet {
        TrackSet::EMPTY
    }

    /// Every track the action may drive, including through sub-actions.
    ///
    /// Used by the queue to reject overlapping parallel slots.
    fn declared_tracks(&self) -> TrackSet {
        self.tracks_to_lock()
    }

    /// Maximum time between init and a terminal result. `None` disables
    /// the timeout.
    fn timeout(&self) -> Option<TimeDelta> {
        Some(TimeDelta::seconds(DEFAULT_ACTION_TIMEOUT_SECS))
    }

    /// Whether a runner interrupted by a higher-priority action may be
    /// re-initialised later instead of being cancelled.
    fn is_interruptible(&self) -> bool {
        false
    }

    /// Called once the runner has registered the action's tag.
    fn assign_tag(&mut self, _tag: ActionTag) {}

    /// One-time setup on the first update.
    fn init(&mut self, robot: &mut dyn Robot) -> ActionResult;

    /// Poll for completion.
    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult;

    /// Restore any robot state the action changed.
    fn cleanup(&mut self, _robot: &mut dyn Robot) {}

    /// Data attached to the completion signal. Captured before `cleanup`.
    fn completion_payload(&self, _robot: &dyn Robot) -> CompletionPayload {
        CompletionPayload::None
    }

    /// Forward the owner's completion-signal policy to nested runners.
    fn set_nested_emit_completion(&mut self, _emit: bool) {}

    /// Forward the owner's track-locking policy to nested runners.
    fn set_nested_track_locking_suppressed(&mut self, _suppressed: bool) {}
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Running { deadline: Option<DateTime<Utc>> },
    Finished(ActionResult),
}

/// Owns one action and drives its lifecycle.
///
/// A runner that has started must be finished or [`cancel`](Self::cancel)led
/// before it is dropped. Cleanup needs the robot, which `Drop` does not
/// have, so a runner dropped while running leaves its track locks, tag and
/// any robot state its action set up in place. [`ActionSlot`] and the
/// action queue cancel their occupants before letting go of them.
pub struct ActionRunner {
    action: Box<dyn Action>,
    tag: ActionTag,
    tag_registered: bool,
    state: RunState,
    emit_completion: bool,
    suppress_track_locking: bool,
    locked: TrackSet,
    ignored: TrackSet,
    completion: Option<ActionCompletion>,
}

impl core::fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionRunner")
            .field("name", &self.action.name())
            .field("tag", &self.tag)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ActionRunner {
    /// Wrap an action. A tag is allocated on first use.
    pub fn new<A: Action + 'static>(action: A) -> Self {
        Self::from_box(Box::new(action))
    }

    /// Wrap an already boxed action.
    pub fn from_box(action: Box<dyn Action>) -> Self {
        Self {
            action,
            tag: ActionTag::INVALID,
            tag_registered: false,
            state: RunState::NotStarted,
            emit_completion: true,
            suppress_track_locking: false,
            locked: TrackSet::EMPTY,
            ignored: TrackSet::EMPTY,
            completion: None,
        }
    }

    /// Wrap an action under a caller-chosen tag.
    pub fn with_tag<A: Action + 'static>(action: A, tag: ActionTag) -> Self {
        Self::from_box(Box::new(action)).tagged(tag)
    }

    /// Request a specific tag for this runner.
    #[must_use]
    pub fn tagged(mut self, tag: ActionTag) -> Self {
        if !self.tag_registered {
            self.tag = tag;
        }
        self
    }

    /// Disable the completion signal, for this runner and nested ones.
    #[must_use]
    pub fn without_completion_signal(mut self) -> Self {
        self.set_emit_completion(false);
        self
    }

    /// Skip track locking, for this runner and nested ones.
    #[must_use]
    pub fn with_track_locking_suppressed(mut self) -> Self {
        self.set_track_locking_suppressed(true);
        self
    }

    /// Whether to publish a completion signal on termination.
    pub fn set_emit_completion(&mut self, emit: bool) {
        self.emit_completion = emit;
        self.action.set_nested_emit_completion(emit);
    }

    /// Whether to skip locking tracks.
    pub fn set_track_locking_suppressed(&mut self, suppressed: bool) {
        self.suppress_track_locking = suppressed;
        self.action.set_nested_track_locking_suppressed(suppressed);
    }

    /// Claim the requested tag or allocate a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TagInUse`] if the requested tag is taken, or
    /// [`WorldError::TagsExhausted`] if no tag is free.
    pub fn register_tag(&mut self, robot: &mut dyn Robot) -> Result<ActionTag, WorldError> {
        if self.tag_registered {
            return Ok(self.tag);
        }
        if self.tag.is_valid() {
            robot.tags().claim(self.tag)?;
        } else {
            self.tag = robot.tags().next_tag()?;
        }
        self.tag_registered = true;
        self.action.assign_tag(self.tag);
        Ok(self.tag)
    }

    /// The runner's tag. Invalid until registered.
    pub const fn tag(&self) -> ActionTag {
        self.tag
    }

    /// The wrapped action's name.
    pub fn name(&self) -> &str {
        self.action.name()
    }

    /// Every track the wrapped action may drive.
    pub fn declared_tracks(&self) -> TrackSet {
        self.action.declared_tracks()
    }

    /// Whether `init` has run and the runner has not finished.
    pub const fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running { .. })
    }

    /// Whether `init` has run.
    pub const fn is_started(&self) -> bool {
        !matches!(self.state, RunState::NotStarted)
    }

    /// The terminal result, once finished.
    pub const fn result(&self) -> Option<ActionResult> {
        match self.state {
            RunState::Finished(result) => Some(result),
            _ => None,
        }
    }

    /// Take the completion record produced on termination.
    pub fn take_completion(&mut self) -> Option<ActionCompletion> {
        self.completion.take()
    }

    /// Advance the action by one tick.
    ///
    /// Once finished, further calls return the terminal result without
    /// touching the action.
    pub fn update(&mut self, robot: &mut dyn Robot) -> ActionResult {
        match self.state {
            RunState::Finished(result) => result,
            RunState::NotStarted => self.start(robot),
            RunState::Running { deadline } => self.check(robot, deadline),
        }
    }

    fn start(&mut self, robot: &mut dyn Robot) -> ActionResult {
        if let Err(e) = self.register_tag(robot) {
            warn!(action = self.action.name(), error = %e, "Could not register action tag");
            self.state = RunState::Finished(ActionResult::FailureAbort);
            return ActionResult::FailureAbort;
        }

        if !self.suppress_track_locking {
            self.locked = self.action.tracks_to_lock();
            robot.track_locks().lock(self.locked, self.tag);
        }
        self.ignored = self.action.movement_tracks_to_ignore();
        robot.track_locks().ignore_movement(self.ignored, self.tag);

        let deadline = self
            .action
            .timeout()
            .and_then(|timeout| robot.now().checked_add_signed(timeout));
        self.state = RunState::Running { deadline };
        debug!(action = self.action.name(), tag = %self.tag, "Action init");

        match self.action.init(robot) {
            ActionResult::Running => self.check(robot, deadline),
            result => self.finish(robot, result),
        }
    }

    fn check(&mut self, robot: &mut dyn Robot, deadline: Option<DateTime<Utc>>) -> ActionResult {
        if deadline.is_some_and(|deadline| robot.now() > deadline) {
            warn!(action = self.action.name(), tag = %self.tag, "Action timed out");
            return self.finish(robot, ActionResult::FailureAbort);
        }
        match self.action.check_if_done(robot) {
            ActionResult::Running => ActionResult::Running,
            result => self.finish(robot, result),
        }
    }

    fn finish(&mut self, robot: &mut dyn Robot, result: ActionResult) -> ActionResult {
        let payload = self.action.completion_payload(&*robot);
        self.action.cleanup(robot);
        self.release(robot);
        self.state = RunState::Finished(result);

        let completion = ActionCompletion {
            tag: self.tag,
            name: self.action.name().to_owned(),
            result,
            payload,
        };
        if self.emit_completion {
            robot.events().publish(&RobotEvent::ActionCompleted(completion.clone()));
        }
        self.completion = Some(completion);
        info!(action = self.action.name(), tag = %self.tag, ?result, "Action completed");
        result
    }

    fn release(&mut self, robot: &mut dyn Robot) {
        robot.track_locks().unlock(self.locked, self.tag);
        robot.track_locks().unignore_movement(self.ignored, self.tag);
        self.locked = TrackSet::EMPTY;
        self.ignored = TrackSet::EMPTY;
        if self.tag_registered {
            robot.tags().release(self.tag);
            self.tag_registered = false;
        }
    }

    /// Stop the action without a completion signal.
    ///
    /// Runs `cleanup` if `init` has run and the runner has not finished.
    /// No-op on a finished runner.
    pub fn cancel(&mut self, robot: &mut dyn Robot) {
        match self.state {
            RunState::Finished(_) => {}
            RunState::NotStarted => {
                self.release(robot);
                self.state = RunState::Finished(ActionResult::FailureAbort);
            }
            RunState::Running { .. } => {
                self.action.cleanup(robot);
                self.release(robot);
                self.state = RunState::Finished(ActionResult::FailureAbort);
                info!(action = self.action.name(), tag = %self.tag, "Action cancelled");
            }
        }
    }

    /// Interrupt a running action so it re-inits on its next update.
    ///
    /// The tag stays registered.
    pub fn interrupt(&mut self, robot: &mut dyn Robot) {
        if self.is_running() {
            self.action.cleanup(robot);
            robot.track_locks().unlock(self.locked, self.tag);
            robot.track_locks().unignore_movement(self.ignored, self.tag);
            self.locked = TrackSet::EMPTY;
            self.ignored = TrackSet::EMPTY;
            self.state = RunState::NotStarted;
            info!(action = self.action.name(), tag = %self.tag, "Action interrupted");
        }
    }

    /// Whether the wrapped action can be interrupted and resumed.
    pub fn is_interruptible(&self) -> bool {
        self.action.is_interruptible()
    }
}

/// Only reports a leak; see [`ActionRunner`] for the cancel-before-drop rule.
impl Drop for ActionRunner {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                action = self.action.name(),
                tag = %self.tag,
                "Action dropped while running; cleanup skipped"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// An owned, nullable sub-action.
///
/// Setting a new occupant cancels the previous one. The occupant is
/// dropped as soon as it reaches a terminal result.
#[derive(Debug, Default)]
pub struct ActionSlot {
    runner: Option<ActionRunner>,
}

impl ActionSlot {
    /// An empty slot.
    pub const fn new() -> Self {
        Self { runner: None }
    }

    /// Replace the occupant, cancelling the old one.
    pub fn set(&mut self, robot: &mut dyn Robot, runner: ActionRunner) {
        self.clear(robot);
        self.runner = Some(runner);
    }

    /// Cancel and drop the occupant.
    pub fn clear(&mut self, robot: &mut dyn Robot) {
        if let Some(mut runner) = self.runner.take() {
            runner.cancel(robot);
        }
    }

    /// Whether the slot holds a sub-action.
    pub const fn is_occupied(&self) -> bool {
        self.runner.is_some()
    }

    /// Update the occupant. Returns `None` for an empty slot.
    pub fn update(&mut self, robot: &mut dyn Robot) -> Option<ActionResult> {
        let result = self.runner.as_mut()?.update(robot);
        if result.is_terminal() {
            self.runner = None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use maneuver_types::Track;
    use maneuver_world::{EventKind, SimParams, SimRobot};

    use super::*;

    /// Scripted action recording how often each hook ran.
    #[derive(Debug, Default)]
    struct Scripted {
        init_result: Option<ActionResult>,
        results: Vec<ActionResult>,
        inits: std::rc::Rc<core::cell::Cell<u32>>,
        cleanups: std::rc::Rc<core::cell::Cell<u32>>,
        tracks: TrackSet,
    }

    impl Action for Scripted {
        fn name(&self) -> &str {
            "Scripted"
        }

        fn tracks_to_lock(&self) -> TrackSet {
            self.tracks
        }

        fn init(&mut self, _robot: &mut dyn Robot) -> ActionResult {
            self.inits.set(self.inits.get().saturating_add(1));
            self.init_result.unwrap_or(ActionResult::Running)
        }

        fn check_if_done(&mut self, _robot: &mut dyn Robot) -> ActionResult {
            if self.results.is_empty() {
                ActionResult::Running
            } else {
                self.results.remove(0)
            }
        }

        fn cleanup(&mut self, _robot: &mut dyn Robot) {
            self.cleanups.set(self.cleanups.get().saturating_add(1));
        }
    }

    #[allow(clippy::unwrap_used)]
    fn robot() -> SimRobot {
        SimRobot::new(SimParams::default(), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn success_runs_cleanup_once_and_emits() {
        let mut robot = robot();
        let mut completions = robot.events().subscribe(EventKind::ActionCompleted);
        let cleanups = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            results: vec![ActionResult::Running, ActionResult::Success],
            cleanups: std::rc::Rc::clone(&cleanups),
            ..Scripted::default()
        });

        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert_eq!(runner.update(&mut robot), ActionResult::Success);
        assert_eq!(runner.update(&mut robot), ActionResult::Success);
        runner.cancel(&mut robot);

        assert_eq!(cleanups.get(), 1);
        let events = completions.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events.first(),
            Some(RobotEvent::ActionCompleted(c)) if c.result == ActionResult::Success && c.name == "Scripted"
        ));
    }

    #[test]
    fn init_success_completes_without_polling() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(Scripted {
            init_result: Some(ActionResult::Success),
            results: vec![ActionResult::FailureAbort],
            ..Scripted::default()
        });
        assert_eq!(runner.update(&mut robot), ActionResult::Success);
    }

    #[test]
    fn init_failure_short_circuits() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            init_result: Some(ActionResult::FailureRetry),
            cleanups: std::rc::Rc::clone(&cleanups),
            ..Scripted::default()
        });
        assert_eq!(runner.update(&mut robot), ActionResult::FailureRetry);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn tracks_locked_while_running() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(Scripted {
            results: vec![ActionResult::Running, ActionResult::Success],
            tracks: TrackSet::HEAD.union(TrackSet::LIFT),
            ..Scripted::default()
        });
        runner.update(&mut robot);
        assert!(robot.track_locks().is_locked(Track::Head));
        assert!(robot.track_locks().is_locked(Track::Lift));
        assert!(!robot.track_locks().is_locked(Track::Body));
        runner.update(&mut robot);
        assert!(robot.track_locks().locked_tracks().is_empty());
    }

    #[test]
    fn suppressed_locking_leaves_tracks_free() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(Scripted {
            tracks: TrackSet::ALL,
            ..Scripted::default()
        })
        .with_track_locking_suppressed();
        runner.update(&mut robot);
        assert!(robot.track_locks().locked_tracks().is_empty());
        runner.cancel(&mut robot);
    }

    #[test]
    fn timeout_aborts() {
        let mut robot = robot();
        let mut runner = ActionRunner::new(Scripted::default());
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        for _ in 0..1000 {
            robot.tick();
        }
        assert_eq!(runner.update(&mut robot), ActionResult::FailureAbort);
    }

    #[test]
    fn cancel_before_start_skips_cleanup() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            cleanups: std::rc::Rc::clone(&cleanups),
            ..Scripted::default()
        });
        runner.cancel(&mut robot);
        assert_eq!(cleanups.get(), 0);
    }

    #[test]
    fn cancel_running_cleans_up_once() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            cleanups: std::rc::Rc::clone(&cleanups),
            ..Scripted::default()
        });
        runner.update(&mut robot);
        runner.cancel(&mut robot);
        runner.cancel(&mut robot);
        assert_eq!(cleanups.get(), 1);
        assert!(!runner.is_running());
    }

    #[test]
    fn cancel_then_drop_releases_everything() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            cleanups: std::rc::Rc::clone(&cleanups),
            tracks: TrackSet::HEAD,
            ..Scripted::default()
        });
        runner.update(&mut robot);
        let tag = runner.tag();
        assert!(robot.tags().is_in_use(tag));

        runner.cancel(&mut robot);
        drop(runner);

        assert_eq!(cleanups.get(), 1);
        assert!(robot.track_locks().locked_tracks().is_empty());
        assert!(!robot.tags().is_in_use(tag));
    }

    #[test]
    fn dropping_a_running_runner_skips_cleanup() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let runner_cleanups = std::rc::Rc::clone(&cleanups);
        {
            let mut runner = ActionRunner::new(Scripted {
                cleanups: runner_cleanups,
                tracks: TrackSet::HEAD,
                ..Scripted::default()
            });
            runner.update(&mut robot);
        }
        assert_eq!(cleanups.get(), 0);
        assert!(robot.track_locks().is_locked(Track::Head));
    }

    #[test]
    fn requested_tag_must_be_free() {
        let mut robot = robot();
        let mut first = ActionRunner::with_tag(Scripted::default(), ActionTag(7));
        let mut second = ActionRunner::with_tag(Scripted::default(), ActionTag(7));
        assert_eq!(first.register_tag(&mut robot).ok(), Some(ActionTag(7)));
        assert_eq!(
            second.register_tag(&mut robot).err(),
            Some(WorldError::TagInUse(ActionTag(7)))
        );
        first.cancel(&mut robot);
        assert!(second.register_tag(&mut robot).is_ok());
    }

    #[test]
    fn interrupt_reinitialises() {
        let mut robot = robot();
        let inits = std::rc::Rc::default();
        let mut runner = ActionRunner::new(Scripted {
            inits: std::rc::Rc::clone(&inits),
            ..Scripted::default()
        });
        runner.update(&mut robot);
        runner.interrupt(&mut robot);
        assert!(!runner.is_started());
        runner.update(&mut robot);
        assert_eq!(inits.get(), 2);
        runner.cancel(&mut robot);
    }

    #[test]
    fn slot_drops_terminal_occupant() {
        let mut robot = robot();
        let mut slot = ActionSlot::new();
        assert_eq!(slot.update(&mut robot), None);
        slot.set(
            &mut robot,
            ActionRunner::new(Scripted {
                results: vec![ActionResult::Success],
                ..Scripted::default()
            }),
        );
        assert_eq!(slot.update(&mut robot), Some(ActionResult::Success));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn slot_replacement_cancels_previous() {
        let mut robot = robot();
        let cleanups = std::rc::Rc::default();
        let mut slot = ActionSlot::new();
        slot.set(
            &mut robot,
            ActionRunner::new(Scripted {
                cleanups: std::rc::Rc::clone(&cleanups),
                ..Scripted::default()
            }),
        );
        slot.update(&mut robot);
        slot.set(&mut robot, ActionRunner::new(Scripted::default()));
        assert_eq!(cleanups.get(), 1);
        slot.clear(&mut robot);
    }
}
