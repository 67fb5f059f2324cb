//! Error types for the simulator binary.
//!
//! [`SimError`] wraps every failure mode of scenario setup and execution so
//! `main` can propagate with `?`.

/// Top-level error for the simulator binary.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: maneuver_core::ConfigError,
    },

    /// Tick clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: maneuver_core::ClockError,
    },

    /// The tick loop failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: maneuver_core::RunnerError,
    },

    /// An action could not be queued.
    #[error("queue error: {source}")]
    Queue {
        /// The underlying queue error.
        #[from]
        source: maneuver_actions::QueueError,
    },

    /// World setup or lookup failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: maneuver_world::WorldError,
    },

    /// The completion report could not be serialized.
    #[error("report error: {source}")]
    Report {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
