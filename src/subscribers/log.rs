//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [attempt] ctx=3 n=1
//! [spawned] ctx=3 task=worker
//! [failed] ctx=3 task=worker err="connection refused"
//! [reported] ctx=3 err="connection refused"
//! [stale] ctx=3 err="connection refused"
//! [abort] ctx=3
//! [drained] ctx=3
//! [retry] ctx=3 failed=1 delay=250ms err="connection refused"
//! [exhausted] ctx=3 attempts=4 err="connection refused"
//! [succeeded] ctx=3 attempt=2
//! ```

use async_trait::async_trait;

use super::Subscribe;
use crate::events::{Event, EventKind};

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let ctx = e.context.unwrap_or(0);
        match e.kind {
            EventKind::TaskSpawned => {
                println!("[spawned] ctx={ctx} task={:?}", e.task);
            }
            EventKind::TaskCompleted => {
                println!("[completed] ctx={ctx} task={:?}", e.task);
            }
            EventKind::TaskFailed => {
                println!("[failed] ctx={ctx} task={:?} err={:?}", e.task, e.error);
            }
            EventKind::TaskAborted => {
                println!("[aborted] ctx={ctx} task={:?}", e.task);
            }
            EventKind::ErrorReported => {
                println!("[reported] ctx={ctx} err={:?}", e.error);
            }
            EventKind::ErrorConsumed => {
                println!("[consumed] ctx={ctx} err={:?}", e.error);
            }
            EventKind::ErrorStale => {
                println!("[stale] ctx={ctx} err={:?}", e.error);
            }
            EventKind::AbortRequested => {
                println!("[abort] ctx={ctx}");
            }
            EventKind::DrainCompleted => {
                println!("[drained] ctx={ctx}");
            }
            EventKind::AttemptStarting => {
                println!("[attempt] ctx={ctx} n={:?}", e.attempt);
            }
            EventKind::RetryScheduled => {
                println!(
                    "[retry] ctx={ctx} failed={:?} delay={:?}ms err={:?}",
                    e.attempt, e.delay_ms, e.error
                );
            }
            EventKind::RetriesExhausted => {
                println!(
                    "[exhausted] ctx={ctx} attempts={:?} err={:?}",
                    e.attempt, e.error
                );
            }
            EventKind::SupervisorSucceeded => {
                println!("[succeeded] ctx={ctx} attempt={:?}", e.attempt);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
