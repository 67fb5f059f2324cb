//! The per-robot action list.
//!
//! The list holds one main queue plus any number of parallel slots. Only
//! the front of each queue runs; the next entry starts on the tick after
//! its predecessor terminates. Parallel slots may not declare overlapping
//! tracks.

use std::collections::{BTreeMap, VecDeque};

use maneuver_types::{ActionCompletion, ActionResult, ActionTag};
use maneuver_world::{Robot, RobotEvent, WorldError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, ActionRunner};
use crate::error::QueueError;

/// Builds a fresh action for each retry attempt.
pub type ActionFactory = Box<dyn FnMut() -> Box<dyn Action>>;

const MAIN_SLOT: u32 = 0;

/// Where a new action goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueuePosition {
    /// Cancel the running action and run this one next tick.
    Now,
    /// Run this one now; the interrupted action resumes afterwards if it
    /// can be interrupted, otherwise it is cancelled.
    NowAndResume,
    /// Run after the current action.
    Next,
    /// Run after everything already queued.
    AtEnd,
    /// Cancel everything in the main queue and run this one.
    NowAndClearRemaining,
    /// Run alongside the main queue in a new slot.
    InParallel,
}

struct Retry {
    factory: ActionFactory,
    remaining: u32,
}

struct Entry {
    runner: ActionRunner,
    retry: Option<Retry>,
}

/// Ordered actions per slot, driven once per tick.
#[derive(Default)]
pub struct ActionList {
    slots: BTreeMap<u32, VecDeque<Entry>>,
    next_slot: u32,
}

impl core::fmt::Debug for ActionList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionList")
            .field("slots", &self.slots.len())
            .field("len", &self.len())
            .finish()
    }
}

impl ActionList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a runner.
    ///
    /// # Errors
    ///
    /// - [`QueueError::DuplicateTag`] if the runner's tag is already in use.
    /// - [`QueueError::TrackConflict`] if an `InParallel` action overlaps
    ///   tracks declared by anything already queued.
    pub fn queue(
        &mut self,
        robot: &mut dyn Robot,
        position: QueuePosition,
        runner: ActionRunner,
    ) -> Result<ActionTag, QueueError> {
        self.enqueue(robot, position, Entry { runner, retry: None })
    }

    /// Queue an action under an automatically allocated tag.
    ///
    /// # Errors
    ///
    /// See [`ActionList::queue`].
    pub fn queue_action<A: Action + 'static>(
        &mut self,
        robot: &mut dyn Robot,
        position: QueuePosition,
        action: A,
    ) -> Result<ActionTag, QueueError> {
        self.queue(robot, position, ActionRunner::new(action))
    }

    /// Queue an action that is rebuilt and rerun up to `retries` times
    /// while it ends in `FailureRetry`.
    ///
    /// Only the final attempt publishes a completion signal.
    ///
    /// # Errors
    ///
    /// See [`ActionList::queue`].
    pub fn queue_with_retries(
        &mut self,
        robot: &mut dyn Robot,
        position: QueuePosition,
        mut factory: impl FnMut() -> Box<dyn Action> + 'static,
        retries: u32,
    ) -> Result<ActionTag, QueueError> {
        let runner = ActionRunner::from_box(factory()).without_completion_signal();
        let retry = Retry {
            factory: Box::new(factory),
            remaining: retries,
        };
        self.enqueue(robot, position, Entry { runner, retry: Some(retry) })
    }

    fn enqueue(
        &mut self,
        robot: &mut dyn Robot,
        position: QueuePosition,
        mut entry: Entry,
    ) -> Result<ActionTag, QueueError> {
        let tag = entry.runner.register_tag(robot).map_err(|e| match e {
            WorldError::TagInUse(tag) => QueueError::DuplicateTag { tag },
            other => QueueError::from(other),
        })?;

        if position == QueuePosition::InParallel {
            let tracks = entry.runner.declared_tracks();
            let conflict = self
                .slots
                .values()
                .flatten()
                .map(|queued| tracks.without(tracks.without(queued.runner.declared_tracks())))
                .find(|overlap| !overlap.is_empty());
            if let Some(overlap) = conflict {
                entry.runner.cancel(robot);
                return Err(QueueError::TrackConflict { tracks: overlap });
            }
            self.next_slot = self.next_slot.saturating_add(1);
            let mut queue = VecDeque::new();
            queue.push_back(entry);
            self.slots.insert(self.next_slot, queue);
            debug!(%tag, slot = self.next_slot, "Queued in parallel slot");
            return Ok(tag);
        }

        let queue = self.slots.entry(MAIN_SLOT).or_default();
        match position {
            QueuePosition::Now => {
                if queue.front().is_some_and(|front| front.runner.is_started()) {
                    if let Some(mut front) = queue.pop_front() {
                        front.runner.cancel(robot);
                    }
                }
                queue.push_front(entry);
            }
            QueuePosition::NowAndResume => {
                if let Some(front) = queue.front_mut() {
                    if front.runner.is_started() {
                        if front.runner.is_interruptible() {
                            front.runner.interrupt(robot);
                        } else if let Some(mut front) = queue.pop_front() {
                            front.runner.cancel(robot);
                        }
                    }
                }
                queue.push_front(entry);
            }
            QueuePosition::Next => {
                if queue.is_empty() {
                    queue.push_back(entry);
                } else {
                    queue.insert(1, entry);
                }
            }
            QueuePosition::AtEnd | QueuePosition::InParallel => queue.push_back(entry),
            QueuePosition::NowAndClearRemaining => {
                for mut queued in queue.drain(..) {
                    queued.runner.cancel(robot);
                }
                queue.push_back(entry);
            }
        }
        debug!(%tag, ?position, "Queued action");
        Ok(tag)
    }

    /// Update the front of every slot. Returns the completions of
    /// top-level actions that terminated this tick.
    pub fn update(&mut self, robot: &mut dyn Robot) -> Vec<ActionCompletion> {
        let mut completions = Vec::new();
        for queue in self.slots.values_mut() {
            let Some(front) = queue.front_mut() else {
                continue;
            };
            let result = front.runner.update(robot);
            if !result.is_terminal() {
                continue;
            }
            let Some(mut entry) = queue.pop_front() else {
                continue;
            };

            if let Some(mut retry) = entry.retry.take() {
                if result == ActionResult::FailureRetry && retry.remaining > 0 {
                    retry.remaining = retry.remaining.saturating_sub(1);
                    info!(
                        action = entry.runner.name(),
                        tag = %entry.runner.tag(),
                        remaining = retry.remaining,
                        "Retrying action"
                    );
                    let runner = ActionRunner::from_box((retry.factory)())
                        .tagged(entry.runner.tag())
                        .without_completion_signal();
                    queue.push_front(Entry { runner, retry: Some(retry) });
                    continue;
                }
                if let Some(completion) = entry.runner.take_completion() {
                    robot.events().publish(&RobotEvent::ActionCompleted(completion.clone()));
                    completions.push(completion);
                }
                continue;
            }

            if let Some(completion) = entry.runner.take_completion() {
                completions.push(completion);
            }
        }
        self.slots.retain(|slot, queue| *slot == MAIN_SLOT || !queue.is_empty());
        completions
    }

    /// Cancel the action with `tag`. Returns whether it was found.
    pub fn cancel_by_tag(&mut self, robot: &mut dyn Robot, tag: ActionTag) -> bool {
        for queue in self.slots.values_mut() {
            if let Some(index) = queue.iter().position(|e| e.runner.tag() == tag) {
                if let Some(mut entry) = queue.remove(index) {
                    entry.runner.cancel(robot);
                }
                return true;
            }
        }
        false
    }

    /// Cancel every action with `name`. Returns how many were cancelled.
    pub fn cancel_by_name(&mut self, robot: &mut dyn Robot, name: &str) -> usize {
        let mut cancelled = 0_usize;
        for queue in self.slots.values_mut() {
            let (matching, kept): (VecDeque<Entry>, VecDeque<Entry>) =
                queue.drain(..).partition(|e| e.runner.name() == name);
            *queue = kept;
            for mut entry in matching {
                entry.runner.cancel(robot);
                cancelled = cancelled.saturating_add(1);
            }
        }
        cancelled
    }

    /// Cancel everything in every slot.
    pub fn cancel_all(&mut self, robot: &mut dyn Robot) {
        for queue in self.slots.values_mut() {
            for mut entry in queue.drain(..) {
                entry.runner.cancel(robot);
            }
        }
        self.slots.retain(|slot, _| *slot == MAIN_SLOT);
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(VecDeque::is_empty)
    }

    /// Number of queued actions across all slots.
    pub fn len(&self) -> usize {
        self.slots.values().map(VecDeque::len).sum()
    }

    /// Name of the action at the front of the main queue.
    pub fn current_name(&self) -> Option<&str> {
        self.slots
            .get(&MAIN_SLOT)
            .and_then(VecDeque::front)
            .map(|e| e.runner.name())
    }

    /// Whether an action with `tag` is queued.
    pub fn contains_tag(&self, tag: ActionTag) -> bool {
        self.slots.values().flatten().any(|e| e.runner.tag() == tag)
    }
}
