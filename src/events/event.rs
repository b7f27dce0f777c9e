//! Events emitted by contexts, task wrappers, and restarting supervisors.
//!
//! [`EventKind`] classifies events across three groups:
//! - **Task lifecycle**: spawn and terminal outcome of each supervised task
//! - **Error queue**: reports landing in, and leaving, the pending queue
//! - **Supervision cycle**: abort, drain, attempts, retries, terminal outcome
//!
//! ## Ordering
//! Every event carries a globally unique, monotonically increasing `seq`.
//! Delivery order within one bus follows publish order; `seq` restores a
//! total order when events from several buses are merged.
//!
//! ## Example
//! ```rust
//! use chanvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::TaskFailed)
//!     .with_task("fetcher")
//!     .with_error("connection refused")
//!     .with_attempt(2);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("fetcher"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervision events.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task lifecycle ===
    /// A task was registered and its body is about to run.
    ///
    /// Sets: `task`, `context`, `at`, `seq`.
    TaskSpawned,

    /// A task body completed successfully.
    ///
    /// Sets: `task`, `context`, `at`, `seq`.
    TaskCompleted,

    /// A task body failed with an application error.
    ///
    /// Sets: `task`, `context`, `error`, `at`, `seq`.
    TaskFailed,

    /// A task unwound because it observed the abort signal.
    ///
    /// Sets: `task`, `context`, `at`, `seq`.
    TaskAborted,

    // === Error queue ===
    /// An error record was appended to a context's pending queue.
    ///
    /// Sets: `context`, `error`, `at`, `seq`.
    ErrorReported,

    /// An error record was explicitly consumed from the queue.
    ///
    /// Sets: `context`, `error`, `at`, `seq`.
    ErrorConsumed,

    /// An error record went unconsumed past the stale timeout.
    ///
    /// Sets: `context`, `error`, `at`, `seq`.
    ErrorStale,

    // === Supervision cycle ===
    /// The abort signal moved from clear to aborting.
    ///
    /// Sets: `context`, `at`, `seq`.
    AbortRequested,

    /// The last live child deregistered; the context is drained.
    ///
    /// Sets: `context`, `at`, `seq`.
    DrainCompleted,

    /// A restarting supervisor is starting an attempt.
    ///
    /// Sets: `context`, `attempt` (1-based), `at`, `seq`.
    AttemptStarting,

    /// A retry was scheduled after a completed abort/drain cycle.
    ///
    /// Sets: `context`, `attempt` (failed attempts so far), `delay_ms`,
    /// `error`, `at`, `seq`.
    RetryScheduled,

    /// The retry budget is exhausted; the supervisor is failing.
    ///
    /// Sets: `context`, `attempt`, `error`, `at`, `seq`.
    RetriesExhausted,

    /// The start procedure completed and the supervisor is returning a value.
    ///
    /// Sets: `context`, `attempt`, `at`, `seq`.
    SupervisorSucceeded,
}

/// Supervision event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Identifier of the supervision context involved.
    pub context: Option<u64>,
    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Rendered error payload, if applicable.
    pub error: Option<Arc<str>>,
    /// Attempt count (1-based) for supervision-cycle events.
    pub attempt: Option<u32>,
    /// Retry delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            context: None,
            task: None,
            error: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches the owning context id.
    #[inline]
    pub fn with_context(mut self, id: u64) -> Self {
        self.context = Some(id);
        self
    }

    /// Attaches a task (or subscriber) name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a rendered error payload.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::TaskSpawned);
        let b = Event::now(EventKind::TaskCompleted);
        let c = Event::now(EventKind::DrainCompleted);
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::now(EventKind::RetryScheduled)
            .with_context(7)
            .with_attempt(2)
            .with_delay(Duration::from_millis(1500))
            .with_error("boom");
        assert_eq!(ev.context, Some(7));
        assert_eq!(ev.attempt, Some(2));
        assert_eq!(ev.delay_ms, Some(1500));
        assert_eq!(ev.error.as_deref(), Some("boom"));
        assert!(ev.task.is_none());
    }
}
