//! Scheduler tuning knobs.
//!
//! Collects every timing constant the dispatcher and the wait paths use
//! into one value type, so tests can shrink them and embedders can stretch
//! them. `Default` reproduces the production values.

use std::time::Duration;

/// Timing configuration for a [`crate::sched::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// How long the dispatcher sleeps on its work condvar when no job has
    /// a ready tile, before re-checking the shutdown flag.
    pub idle_wait: Duration,
    /// Per-iteration bound on the dispatcher's wait for the hardware
    /// completion interrupt after a job's final tile. Retried while the
    /// device is not shutting down.
    pub completion_wait: Duration,
    /// Initial sleep when `submit_data` reports a full command queue.
    pub backoff_min: Duration,
    /// Cap on the exponential backoff sleep.
    pub backoff_max: Duration,
    /// Default overall timeout for `WAIT_FINISH`.
    pub wait_finish_timeout: Duration,
    /// Tick used by waiters (`wait_finish`, group `wait_for`) between
    /// re-checks of their predicate.
    pub wait_tick: Duration,
}

impl Default for SchedConfig {
    fn default() -> Self {
        SchedConfig {
            idle_wait: Duration::from_millis(100),
            completion_wait: Duration::from_millis(100),
            backoff_min: Duration::from_micros(50),
            backoff_max: Duration::from_millis(2),
            wait_finish_timeout: Duration::from_secs(60),
            wait_tick: Duration::from_millis(10),
        }
    }
}

impl SchedConfig {
    /// Configuration with short waits, suitable for tests that exercise
    /// timeout paths without stalling the suite.
    pub fn fast() -> Self {
        SchedConfig {
            idle_wait: Duration::from_millis(5),
            completion_wait: Duration::from_millis(5),
            backoff_min: Duration::from_micros(50),
            backoff_max: Duration::from_millis(1),
            wait_finish_timeout: Duration::from_secs(10),
            wait_tick: Duration::from_millis(2),
        }
    }
}
