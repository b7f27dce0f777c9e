//! Supervisor configuration.
//!
//! [`SupervisorConfig`] is consumed in two places:
//! 1. **Context creation**: `Context::with_config(cfg)` — a bare context only
//!    needs `bus_capacity`, the rest is carried for its supervisor.
//! 2. **Restarting supervisor**: `Restarter::new(cfg)` / `supervise(cfg, ..)`
//!    reads `retries`, `stale_timeout`, and `backoff`.
//!
//! ## Field semantics
//! - `retries`: restart budget after the initial attempt (`0` = run once).
//! - `stale_timeout`: how long an unconsumed error record may sit in the
//!   queue before it is considered abandoned and triggers an abort cycle.
//!   Measured per record, from its own enqueue time.
//! - `backoff`: delay between a completed drain and the next attempt
//!   ([`RestartBackoff::none`] by default — retry immediately).
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`).

use std::time::Duration;

use crate::policies::RestartBackoff;

/// Configuration for a supervision context and its restarting supervisor.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Number of restart attempts after the initial one.
    ///
    /// A deterministically failing start procedure is invoked exactly
    /// `retries + 1` times before the supervisor gives up.
    pub retries: u32,

    /// How long an unconsumed error record may age before it is stale.
    ///
    /// Staleness is evaluated only while the abort signal is clear; once an
    /// abort cycle is in flight the queue is subsumed into the restart
    /// decision.
    pub stale_timeout: Duration,

    /// Delay schedule between restart attempts.
    pub backoff: RestartBackoff,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events skip
    /// older items. Minimum value is 1 (enforced by the bus).
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `retries = 3`
    /// - `stale_timeout = 10s`
    /// - `backoff = RestartBackoff::none()` (retry immediately after drain)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            retries: 3,
            stale_timeout: Duration::from_secs(10),
            backoff: RestartBackoff::none(),
            bus_capacity: 1024,
        }
    }
}
