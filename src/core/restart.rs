//! Restarting supervisor: bounded-retry restart over a supervision context.
//!
//! [`Restarter`] (and the [`supervise`] shorthand) drives the state machine:
//!
//! ```text
//! Init ──► Running ──(stale record / deferred error)──► Aborting ──► Draining
//!            │                                                          │
//!            │ normal completion, queue settled             attempts ≤ retries
//!            ▼                                                          ▼
//!        Succeeded(value)                                          Retrying ──► Running
//!                                                            attempts > retries
//!                                                                       ▼
//!                                                              Failed(RetriesExhausted)
//! ```
//!
//! Each attempt runs under a **fresh** [`Context`] (new children set, new
//! error queue, clear abort signal) sharing one event [`Bus`], so observers
//! see the whole retry history. While `Running`, the start procedure's own
//! result is raced against a stale watcher holding one timer for the oldest
//! unconsumed error record (per-record windows, FIFO front first).
//!
//! Out of `Running` there are two triggers:
//! - the start procedure completes: success moves toward `Succeeded` once
//!   the pending queue settles; a deferred error on its own result is a
//!   restart trigger;
//! - a record goes unconsumed past `stale_timeout`: the supervisor begins
//!   the abort, lets the start procedure observe it and unwind, and takes
//!   the stale payload as the trigger.
//!
//! Draining then waits for every child to deregister before the attempt
//! counter moves — a retry never overlaps resources with its predecessor.
//! The whole supervisor is one awaitable future, so it can itself be
//! spawned under another context for nested supervision.

use std::future::Future;
use std::sync::Arc;

use tokio::time;

use crate::config::SupervisorConfig;
use crate::core::context::Context;
use crate::error::SupError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder/driver for a restarting supervisor.
pub struct Restarter {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Restarter {
    /// Creates a restarter with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Attaches event subscribers observing every attempt on the shared bus.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runs `start` under bounded-retry supervision until it produces a
    /// value or the retry budget is exhausted.
    ///
    /// `start` is invoked once per attempt with that attempt's fresh
    /// context; it may spawn any number of children. A deterministically
    /// failing start procedure is invoked exactly `retries + 1` times.
    pub async fn run<T, F, Fut>(self, mut start: F) -> Result<T, SupError>
    where
        F: FnMut(Context) -> Fut,
        Fut: Future<Output = Result<T, SupError>>,
    {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers);
            let mut rx = bus.subscribe();
            tokio::spawn(async move {
                while let Ok(ev) = rx.recv().await {
                    set.emit(&ev);
                }
            });
        }

        let mut failed_attempts: u32 = 0;
        loop {
            let cx = Context::attempt(self.cfg.clone(), bus.clone());
            let attempt_no = failed_attempts + 1;
            bus.publish(
                Event::now(EventKind::AttemptStarting)
                    .with_context(cx.id())
                    .with_attempt(attempt_no),
            );

            let start_fut = start(cx.clone());
            tokio::pin!(start_fut);

            let trigger: SupError = tokio::select! {
                res = &mut start_fut => match res {
                    Ok(value) => match cx.settled_or_stale().await {
                        None => {
                            // Nothing pending: release leftover background
                            // children and surface the value.
                            cx.begin_abort();
                            cx.await_drain().await;
                            bus.publish(
                                Event::now(EventKind::SupervisorSucceeded)
                                    .with_context(cx.id())
                                    .with_attempt(attempt_no),
                            );
                            return Ok(value);
                        }
                        Some(stale) => stale,
                    },
                    Err(err) => err,
                },
                stale = cx.next_stale() => {
                    // Begin the abort first so the still-running start
                    // procedure fails fast at its next blocking operation
                    // and unwinds cooperatively.
                    cx.begin_abort();
                    let _ = start_fut.await;
                    stale
                }
            };

            cx.begin_abort();
            cx.await_drain().await;
            failed_attempts += 1;

            if failed_attempts > self.cfg.retries {
                bus.publish(
                    Event::now(EventKind::RetriesExhausted)
                        .with_context(cx.id())
                        .with_attempt(failed_attempts)
                        .with_error(trigger.to_string()),
                );
                return Err(SupError::RetriesExhausted {
                    attempts: failed_attempts,
                    source: Box::new(trigger),
                });
            }

            let delay = self.cfg.backoff.delay_for(failed_attempts - 1);
            bus.publish(
                Event::now(EventKind::RetryScheduled)
                    .with_context(cx.id())
                    .with_attempt(failed_attempts)
                    .with_delay(delay)
                    .with_error(trigger.to_string()),
            );
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
        }
    }
}

/// Runs `start` under a restarting supervisor with `cfg`.
///
/// Shorthand for `Restarter::new(cfg).run(start)`. The returned future is an
/// ordinary awaitable: spawn it under another [`Context`] for nested
/// supervision.
pub async fn supervise<T, F, Fut>(cfg: SupervisorConfig, start: F) -> Result<T, SupError>
where
    F: FnMut(Context) -> Fut,
    Fut: Future<Output = Result<T, SupError>>,
{
    Restarter::new(cfg).run(start).await
}
