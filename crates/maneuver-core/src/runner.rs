//! Control loop runner.
//!
//! This module provides [`run_until_idle`], the top-level async function
//! that drives the tick loop:
//!
//! - **Per tick**: update every queued action, then advance the robot.
//! - **Bounded run**: stop after `max_ticks` or once the queue drains.
//! - **Real-time pacing**: optionally sleep the tick interval between ticks.
//!   Unpaced runs yield to the scheduler after every tick instead, so other
//!   tasks on a current-thread runtime (such as a ctrl-c watcher) still run.
//! - **Stop request**: a shared [`RunControl`] cancels everything cleanly.
//!
//! Actions never block; the loop is the only place that waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use maneuver_actions::ActionList;
use maneuver_types::ActionCompletion;
use maneuver_world::{Robot, SimRobot};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, TickClock};
use crate::config::SimConfig;

/// Errors that can occur during the run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The tick clock failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

/// A robot the loop can advance by one control frame.
pub trait TickedRobot: Robot {
    /// Advance motors, firmware and perception by one frame.
    fn step(&mut self);
}

impl TickedRobot for SimRobot {
    fn step(&mut self) {
        self.tick();
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEndReason {
    /// Every queued action finished.
    QueueDrained,
    /// The tick limit was reached with actions still queued.
    MaxTicksReached,
    /// A stop was requested through [`RunControl`].
    StopRequested,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    /// The reason the run ended.
    pub end_reason: RunEndReason,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Simulated instant at which the run ended.
    pub ended_at: DateTime<Utc>,
    /// Completion signals of top-level actions, in order.
    pub completions: Vec<ActionCompletion>,
}

/// Limits on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunBounds {
    /// Stop after this many ticks. Zero means no limit.
    pub max_ticks: u64,
    /// Sleep this long between ticks.
    pub pacing: Option<Duration>,
}

impl RunBounds {
    /// Bounds from the simulator section of the configuration.
    pub const fn from_config(config: &SimConfig) -> Self {
        Self {
            max_ticks: config.max_ticks,
            pacing: if config.realtime {
                Some(Duration::from_millis(config.tick_interval_ms))
            } else {
                None
            },
        }
    }
}

/// Shared stop switch for a running loop.
#[derive(Debug, Default)]
pub struct RunControl {
    stop_requested: AtomicBool,
}

impl RunControl {
    /// A control with no stop requested.
    pub const fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Request a clean stop before the next tick.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

/// Callback invoked after each tick completes.
pub trait TickCallback {
    /// Called after tick `tick` with the completions it produced.
    fn on_tick(&mut self, tick: u64, completions: &[ActionCompletion]);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _tick: u64, _completions: &[ActionCompletion]) {}
}

/// Tick `actions` against `robot` until the queue drains, the tick limit
/// is reached, or a stop is requested.
///
/// Remaining actions are cancelled, without completion signals, when the
/// run stops early.
///
/// # Errors
///
/// Returns [`RunnerError`] if the clock overflows.
pub async fn run_until_idle<R: TickedRobot>(
    robot: &mut R,
    actions: &mut ActionList,
    clock: &mut TickClock,
    bounds: &RunBounds,
    control: &RunControl,
    callback: &mut dyn TickCallback,
) -> Result<RunResult, RunnerError> {
    let mut completions = Vec::new();
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = bounds.max_ticks,
        paced = bounds.pacing.is_some(),
        queued = actions.len(),
        "Run starting"
    );

    loop {
        if control.is_stop_requested() {
            info!(tick = clock.tick(), "Stop requested");
            actions.cancel_all(robot);
            return finish(clock, RunEndReason::StopRequested, total_ticks, completions);
        }

        if actions.is_empty() {
            return finish(clock, RunEndReason::QueueDrained, total_ticks, completions);
        }

        let finished = actions.update(robot);
        robot.step();
        let tick = clock.advance()?;
        total_ticks = total_ticks.saturating_add(1);

        for completion in &finished {
            debug!(
                tick,
                action = %completion.name,
                tag = %completion.tag,
                result = ?completion.result,
                "Action finished"
            );
        }
        callback.on_tick(tick, &finished);
        completions.extend(finished);

        if bounds.max_ticks > 0 && total_ticks >= bounds.max_ticks && !actions.is_empty() {
            warn!(
                tick,
                max_ticks = bounds.max_ticks,
                current = actions.current_name().unwrap_or("-"),
                "Tick limit reached"
            );
            actions.cancel_all(robot);
            return finish(clock, RunEndReason::MaxTicksReached, total_ticks, completions);
        }

        if let Some(pacing) = bounds.pacing {
            tokio::time::sleep(pacing).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

fn finish(
    clock: &TickClock,
    end_reason: RunEndReason,
    total_ticks: u64,
    completions: Vec<ActionCompletion>,
) -> Result<RunResult, RunnerError> {
    let ended_at = clock.now()?;
    debug!(
        ?end_reason,
        tick = clock.tick(),
        elapsed_ms = clock.elapsed()?.num_milliseconds(),
        "Run stopping"
    );
    Ok(RunResult {
        end_reason,
        total_ticks,
        ended_at,
        completions,
    })
}

/// Log the end of a run.
pub fn log_run_end(result: &RunResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        ended_at = %result.ended_at,
        completed = result.completions.len(),
        "Run ended"
    );
    for completion in &result.completions {
        let payload = completion.payload.object_interaction();
        info!(
            action = %completion.name,
            tag = %completion.tag,
            result = ?completion.result,
            objects = ?payload.map(|p| &p.object_ids),
            interaction = ?payload.map(|p| p.result),
            "Completion"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use maneuver_actions::{QueuePosition, Wait};
    use maneuver_types::ActionResult;
    use maneuver_world::SimParams;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn setup() -> (SimRobot, ActionList, TickClock) {
        let params = SimParams::default();
        let clock = TickClock::new(params.tick_interval, start()).unwrap();
        (SimRobot::new(params, start()), ActionList::new(), clock)
    }

    fn queue_wait(robot: &mut SimRobot, actions: &mut ActionList, ms: i64) {
        let wait = Wait::new(TimeDelta::milliseconds(ms));
        actions.queue_action(robot, QueuePosition::AtEnd, wait).unwrap();
    }

    #[tokio::test]
    async fn drains_the_queue() {
        let (mut robot, mut actions, mut clock) = setup();
        queue_wait(&mut robot, &mut actions, 100);
        queue_wait(&mut robot, &mut actions, 100);

        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &RunBounds::default(),
            &RunControl::new(),
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::QueueDrained);
        assert_eq!(result.completions.len(), 2);
        assert!(result.completions.iter().all(|c| c.result == ActionResult::Success));
        assert_eq!(clock.tick(), result.total_ticks);
        assert_eq!(result.ended_at, clock.now().unwrap());
        assert_eq!(result.ended_at, start().checked_add_signed(clock.elapsed().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let (mut robot, mut actions, mut clock) = setup();
        queue_wait(&mut robot, &mut actions, 60_000);
        let bounds = RunBounds {
            max_ticks: 5,
            pacing: None,
        };

        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &bounds,
            &RunControl::new(),
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert!(result.completions.is_empty());
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn stop_request_cancels_before_ticking() {
        let (mut robot, mut actions, mut clock) = setup();
        queue_wait(&mut robot, &mut actions, 60_000);
        let control = RunControl::new();
        control.request_stop();

        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &RunBounds::default(),
            &control,
            &mut NoOpCallback,
        )
        .await
        .unwrap();

        assert_eq!(result.end_reason, RunEndReason::StopRequested);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(result.ended_at, start());
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn stop_from_another_task_ends_an_unpaced_run() {
        let (mut robot, mut actions, mut clock) = setup();
        queue_wait(&mut robot, &mut actions, 600_000);
        let control = Arc::new(RunControl::new());
        let stopper = {
            let control = Arc::clone(&control);
            tokio::spawn(async move {
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                control.request_stop();
            })
        };

        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &RunBounds::default(),
            &control,
            &mut NoOpCallback,
        )
        .await
        .unwrap();
        stopper.await.unwrap();

        assert_eq!(result.end_reason, RunEndReason::StopRequested);
        assert!(result.total_ticks > 0);
        assert!(result.completions.is_empty());
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            ticks: u64,
            completions: usize,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _tick: u64, completions: &[ActionCompletion]) {
                self.ticks = self.ticks.saturating_add(1);
                self.completions = self.completions.saturating_add(completions.len());
            }
        }

        let (mut robot, mut actions, mut clock) = setup();
        queue_wait(&mut robot, &mut actions, 100);
        let mut cb = CountCallback {
            ticks: 0,
            completions: 0,
        };

        let result = run_until_idle(
            &mut robot,
            &mut actions,
            &mut clock,
            &RunBounds::default(),
            &RunControl::new(),
            &mut cb,
        )
        .await
        .unwrap();

        assert_eq!(cb.ticks, result.total_ticks);
        assert_eq!(cb.completions, 1);
    }

    #[test]
    fn bounds_follow_config() {
        let config = SimConfig {
            max_ticks: 10,
            realtime: true,
            ..SimConfig::default()
        };
        let bounds = RunBounds::from_config(&config);
        assert_eq!(bounds.max_ticks, 10);
        assert_eq!(bounds.pacing, Some(Duration::from_millis(33)));
    }
}
