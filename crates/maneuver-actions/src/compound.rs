//! Sequential and parallel composition of actions.
//!
//! Children are wrapped in their own [`ActionRunner`]s, so each child keeps
//! its own init/cleanup guarantees and its own completion signal. Neither
//! compound locks tracks itself; children lock their own.

use maneuver_types::{ActionResult, TrackSet};
use maneuver_world::Robot;
use tracing::debug;

use crate::action::{Action, ActionRunner};

fn union_of(children: &[ActionRunner]) -> TrackSet {
    children
        .iter()
        .fold(TrackSet::EMPTY, |set, child| set.union(child.declared_tracks()))
}

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

/// Runs children one after another.
///
/// The first child result other than `Success` becomes the compound's
/// result and no later child is initialised. When a child succeeds the
/// next one starts in the same tick.
#[derive(Debug)]
pub struct CompoundSequential {
    name: String,
    children: Vec<ActionRunner>,
    current: usize,
}

impl CompoundSequential {
    /// Build from boxed children.
    pub fn new(children: Vec<Box<dyn Action>>) -> Self {
        Self {
            name: "CompoundSequential".to_owned(),
            children: children.into_iter().map(ActionRunner::from_box).collect(),
            current: 0,
        }
    }

    /// Override the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether there are no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Action for CompoundSequential {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_tracks(&self) -> TrackSet {
        union_of(&self.children)
    }

    fn timeout(&self) -> Option<chrono::TimeDelta> {
        None
    }

    fn init(&mut self, _robot: &mut dyn Robot) -> ActionResult {
        self.current = 0;
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        while let Some(child) = self.children.get_mut(self.current) {
            match child.update(robot) {
                ActionResult::Success => {
                    debug!(compound = %self.name, child = child.name(), "Child succeeded");
                    self.current = self.current.saturating_add(1);
                }
                other => return other,
            }
        }
        ActionResult::Success
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        for child in &mut self.children {
            child.cancel(robot);
        }
    }

    fn set_nested_emit_completion(&mut self, emit: bool) {
        for child in &mut self.children {
            child.set_emit_completion(emit);
        }
    }

    fn set_nested_track_locking_suppressed(&mut self, suppressed: bool) {
        for child in &mut self.children {
            child.set_track_locking_suppressed(suppressed);
        }
    }
}

// ---------------------------------------------------------------------------
// Parallel
// ---------------------------------------------------------------------------

/// Runs every child each tick.
///
/// Completes once all children are terminal. The result is the first
/// non-`Success` child result in child order, or `Success`.
#[derive(Debug)]
pub struct CompoundParallel {
    name: String,
    children: Vec<ActionRunner>,
}

impl CompoundParallel {
    /// Build from boxed children.
    pub fn new(children: Vec<Box<dyn Action>>) -> Self {
        Self {
            name: "CompoundParallel".to_owned(),
            children: children.into_iter().map(ActionRunner::from_box).collect(),
        }
    }

    /// Override the display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Action for CompoundParallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_tracks(&self) -> TrackSet {
        union_of(&self.children)
    }

    fn timeout(&self) -> Option<chrono::TimeDelta> {
        None
    }

    fn init(&mut self, _robot: &mut dyn Robot) -> ActionResult {
        ActionResult::Running
    }

    fn check_if_done(&mut self, robot: &mut dyn Robot) -> ActionResult {
        let results: Vec<ActionResult> =
            self.children.iter_mut().map(|child| child.update(robot)).collect();
        if results.iter().any(|r| !r.is_terminal()) {
            return ActionResult::Running;
        }
        results
            .into_iter()
            .find(|r| *r != ActionResult::Success)
            .unwrap_or(ActionResult::Success)
    }

    fn cleanup(&mut self, robot: &mut dyn Robot) {
        for child in &mut self.children {
            child.cancel(robot);
        }
    }

    fn set_nested_emit_completion(&mut self, emit: bool) {
        for child in &mut self.children {
            child.set_emit_completion(emit);
        }
    }

    fn set_nested_track_locking_suppressed(&mut self, suppressed: bool) {
        for child in &mut self.children {
            child.set_track_locking_suppressed(suppressed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};
    use maneuver_world::{EventKind, RobotEvent, SimParams, SimRobot};

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Child that finishes with `result` after `ticks` polls and logs its hooks.
    struct Step {
        label: &'static str,
        ticks: u32,
        result: ActionResult,
        log: Log,
    }

    impl Step {
        fn boxed(label: &'static str, ticks: u32, result: ActionResult, log: &Log) -> Box<dyn Action> {
            Box::new(Self {
                label,
                ticks,
                result,
                log: Rc::clone(log),
            })
        }
    }

    impl Action for Step {
        fn name(&self) -> &str {
            self.label
        }

        fn init(&mut self, _robot: &mut dyn Robot) -> ActionResult {
            self.log.borrow_mut().push(format!("init {}", self.label));
            ActionResult::Running
        }

        fn check_if_done(&mut self, _robot: &mut dyn Robot) -> ActionResult {
            if self.ticks == 0 {
                self.result
            } else {
                self.ticks = self.ticks.saturating_sub(1);
                ActionResult::Running
            }
        }

        fn cleanup(&mut self, _robot: &mut dyn Robot) {
            self.log.borrow_mut().push(format!("cleanup {}", self.label));
        }
    }

    #[allow(clippy::unwrap_used)]
    fn robot() -> SimRobot {
        SimRobot::new(SimParams::default(), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn sequential_runs_children_in_order() {
        let mut robot = robot();
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundSequential::new(vec![
            Step::boxed("a", 1, ActionResult::Success, &log),
            Step::boxed("b", 0, ActionResult::Success, &log),
        ]));
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert_eq!(runner.update(&mut robot), ActionResult::Success);
        assert_eq!(
            *log.borrow(),
            vec!["init a", "cleanup a", "init b", "cleanup b"]
        );
    }

    #[test]
    fn sequential_failure_skips_remaining_children() {
        let mut robot = robot();
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundSequential::new(vec![
            Step::boxed("a", 0, ActionResult::Success, &log),
            Step::boxed("b", 0, ActionResult::FailureAbort, &log),
            Step::boxed("c", 0, ActionResult::Success, &log),
        ]));
        assert_eq!(runner.update(&mut robot), ActionResult::FailureAbort);
        assert!(!log.borrow().iter().any(|entry| entry == "init c"));
        assert!(!log.borrow().iter().any(|entry| entry == "cleanup c"));
    }

    #[test]
    fn sequential_children_emit_their_own_completions() {
        let mut robot = robot();
        let mut completions = robot.events().subscribe(EventKind::ActionCompleted);
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundSequential::new(vec![
            Step::boxed("a", 0, ActionResult::Success, &log),
            Step::boxed("b", 0, ActionResult::Success, &log),
        ]));
        runner.update(&mut robot);
        let names: Vec<String> = completions
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                RobotEvent::ActionCompleted(c) => Some(c.name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "CompoundSequential"]);
    }

    #[test]
    fn silenced_compound_silences_children() {
        let mut robot = robot();
        let mut completions = robot.events().subscribe(EventKind::ActionCompleted);
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundSequential::new(vec![Step::boxed(
            "a",
            0,
            ActionResult::Success,
            &log,
        )]))
        .without_completion_signal();
        runner.update(&mut robot);
        assert!(completions.drain().is_empty());
    }

    #[test]
    fn parallel_waits_for_all_children() {
        let mut robot = robot();
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundParallel::new(vec![
            Step::boxed("a", 0, ActionResult::Success, &log),
            Step::boxed("b", 2, ActionResult::FailureRetry, &log),
        ]));
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert_eq!(runner.update(&mut robot), ActionResult::Running);
        assert_eq!(runner.update(&mut robot), ActionResult::FailureRetry);
    }

    #[test]
    fn parallel_reports_first_failure_in_child_order() {
        let mut robot = robot();
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundParallel::new(vec![
            Step::boxed("a", 0, ActionResult::FailureRetry, &log),
            Step::boxed("b", 0, ActionResult::FailureAbort, &log),
        ]));
        assert_eq!(runner.update(&mut robot), ActionResult::FailureRetry);
    }

    #[test]
    fn cancelling_compound_cleans_up_started_children() {
        let mut robot = robot();
        let log = Log::default();
        let mut runner = ActionRunner::new(CompoundParallel::new(vec![
            Step::boxed("a", 5, ActionResult::Success, &log),
            Step::boxed("b", 5, ActionResult::Success, &log),
        ]));
        runner.update(&mut robot);
        runner.cancel(&mut robot);
        let entries = log.borrow();
        assert!(entries.iter().any(|entry| entry == "cleanup a"));
        assert!(entries.iter().any(|entry| entry == "cleanup b"));
    }
}
