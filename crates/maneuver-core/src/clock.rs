//! Tick clock for the control loop.
//!
//! The tick counter is the source of truth. Elapsed simulated time is
//! derived from it and the configured interval, never stored separately.
//! All arithmetic is checked.

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::SimConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would overflow.
    #[error("tick counter overflow: cannot advance beyond u64::MAX")]
    TickOverflow,

    /// Invalid clock configuration (e.g. a zero tick interval).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Control-loop clock counting ticks from a start instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickClock {
    /// Ticks completed so far.
    tick: u64,

    /// Simulated time per tick.
    interval: TimeDelta,

    /// Instant of tick zero.
    started_at: DateTime<Utc>,
}

impl TickClock {
    /// Create a clock at tick zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the interval is not positive.
    pub fn new(interval: TimeDelta, started_at: DateTime<Utc>) -> Result<Self, ClockError> {
        if interval <= TimeDelta::zero() {
            return Err(ClockError::InvalidConfig {
                reason: "tick interval must be positive".to_owned(),
            });
        }
        Ok(Self {
            tick: 0,
            interval,
            started_at,
        })
    }

    /// Create a clock from the simulator section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the interval is zero or
    /// too large to represent.
    pub fn from_config(config: &SimConfig, started_at: DateTime<Utc>) -> Result<Self, ClockError> {
        let interval = i64::try_from(config.tick_interval_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| ClockError::InvalidConfig {
                reason: format!("tick interval {} ms is out of range", config.tick_interval_ms),
            })?;
        Self::new(interval, started_at)
    }

    /// Advance the clock by one tick. Returns the new tick number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the tick counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.tick = self.tick.checked_add(1).ok_or(ClockError::TickOverflow)?;
        Ok(self.tick)
    }

    /// Ticks completed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time per tick.
    pub const fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Simulated time since tick zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the elapsed time cannot be
    /// represented.
    pub fn elapsed(&self) -> Result<TimeDelta, ClockError> {
        let ticks = i32::try_from(self.tick).ok().ok_or(ClockError::TickOverflow)?;
        self.interval.checked_mul(ticks).ok_or(ClockError::TickOverflow)
    }

    /// Simulated instant of the current tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the instant cannot be
    /// represented.
    pub fn now(&self) -> Result<DateTime<Utc>, ClockError> {
        self.started_at
            .checked_add_signed(self.elapsed()?)
            .ok_or(ClockError::TickOverflow)
    }
}
