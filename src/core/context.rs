//! The supervision context: shared coordination object for a task family.
//!
//! A [`Context`] owns the bookkeeping the whole protocol hangs off:
//! - `children`: the set of live task handles, mutated only by
//!   register/deregister; the empty set is the drain-complete condition,
//! - `errors`: a FIFO queue of unconsumed error records (insertion order is
//!   detection order),
//! - the tri-state abort signal [`AbortState`], backed by a
//!   [`CancellationToken`] so every suspended operation is woken when the
//!   signal flips.
//!
//! ## Abort signal
//! ```text
//! Clear ──begin_abort()──► Aborting ──await_drain()──► Aborted
//! ```
//! The transition out of `Clear` happens at most once per context; a fresh
//! attempt of a restarting supervisor gets a fresh context, never a reset
//! signal. Nested contexts created with [`Context::child`] derive their token
//! from the parent, so a parent abort cascades to every descendant.
//!
//! ## Serialization
//! All three pieces of state live behind one `Mutex`, held only for short
//! non-suspending sections. Wakeups go through two `Notify` instances: one
//! for error-queue changes, one for drain completion.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::{broadcast, Notify};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;
use crate::error::SupError;
use crate::events::{Bus, Event, EventKind};

/// Context identity counter (process-wide).
static CONTEXT_IDS: AtomicU64 = AtomicU64::new(1);

/// Task identity counter (process-wide).
static TASK_IDS: AtomicU64 = AtomicU64::new(1);

/// Process-wide default context, see [`global`].
static GLOBAL: OnceLock<Context> = OnceLock::new();

/// State of a context's abort signal.
///
/// Monotonic within one supervision lifetime: `Clear → Aborting → Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortState {
    /// No abort in flight; tasks run and block normally.
    Clear,
    /// Abort requested; every blocking operation under this context must
    /// fail fast with [`SupError::Abort`].
    Aborting,
    /// Drain finished; the context's lifetime is over.
    Aborted,
}

/// One unconsumed error in a context's pending queue.
///
/// The record is stale when it is still queued and
/// `now - enqueued_at >= stale_timeout` while the abort signal is clear.
/// Removal from the queue is what "consumed" means: records leave only via
/// [`Context::consume_next_error`] or by being subsumed into a restart
/// decision.
struct ErrorRecord {
    payload: SupError,
    enqueued_at: Instant,
}

/// Outcome of one stale-watcher round.
enum StaleRound {
    /// The front record went unconsumed past its window.
    Expired(SupError),
    /// The queue changed; recompute the deadline.
    Changed,
    /// An abort cycle owns the queue; the watcher has nothing left to do.
    Halted,
}

/// Bookkeeping guarded by the context's single lock.
struct State {
    children: HashSet<u64>,
    errors: VecDeque<ErrorRecord>,
    abort: AbortState,
}

struct Inner {
    id: u64,
    parent: Option<u64>,
    cfg: SupervisorConfig,
    bus: Bus,
    token: CancellationToken,
    state: Mutex<State>,
    /// Notified on every error-queue mutation (report, consume, stale pop).
    queue_rev: Notify,
    /// Notified when the last live child deregisters.
    drained: Notify,
}

/// Shared coordination object for a tree of concurrent tasks.
///
/// Cheap to clone; all clones refer to the same context. Every spawning and
/// blocking call takes an explicit context (or a channel endpoint carrying
/// one) — there is no hidden ambient supervisor, apart from the documented
/// dev-only [`global`] convenience.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Creates a fresh root context with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SupervisorConfig::default())
    }

    /// Creates a fresh root context with the given configuration.
    pub fn with_config(cfg: SupervisorConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::build(cfg, bus, None, CancellationToken::new())
    }

    /// Creates a nested context under `self`.
    ///
    /// The child has its own children set, error queue, and abort signal,
    /// but its cancellation token derives from the parent's: aborting the
    /// parent makes every blocking operation under the child fail fast too.
    /// No ordering is guaranteed between the two error queues.
    pub fn child(&self) -> Self {
        Self::build(
            self.inner.cfg.clone(),
            self.inner.bus.clone(),
            Some(self.inner.id),
            self.inner.token.child_token(),
        )
    }

    /// Fresh context for one attempt of a restarting supervisor: new state
    /// and signal, shared bus.
    pub(crate) fn attempt(cfg: SupervisorConfig, bus: Bus) -> Self {
        Self::build(cfg, bus, None, CancellationToken::new())
    }

    fn build(cfg: SupervisorConfig, bus: Bus, parent: Option<u64>, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: CONTEXT_IDS.fetch_add(1, AtomicOrdering::Relaxed),
                parent,
                cfg,
                bus,
                token,
                state: Mutex::new(State {
                    children: HashSet::new(),
                    errors: VecDeque::new(),
                    abort: AbortState::Clear,
                }),
                queue_rev: Notify::new(),
                drained: Notify::new(),
            }),
        }
    }

    /// Unique identity of this context.
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Identity of the parent context, for nested supervision.
    #[inline]
    pub fn parent_id(&self) -> Option<u64> {
        self.inner.parent
    }

    /// Configuration this context was created with.
    #[inline]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.cfg
    }

    /// Subscribes to the supervision event stream of this context's bus.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev.with_context(self.inner.id));
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The lock is only held for short non-suspending sections; a poisoned
        // lock still carries consistent bookkeeping.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // --- abort signal -----------------------------------------------------

    /// Current state of the abort signal.
    ///
    /// A cascaded parent abort (token cancelled while the local state is
    /// still `Clear`) reads as `Aborting`.
    pub fn abort_state(&self) -> AbortState {
        let st = self.lock().abort;
        if st == AbortState::Clear && self.inner.token.is_cancelled() {
            AbortState::Aborting
        } else {
            st
        }
    }

    /// True once the abort signal left `Clear` (locally or via the parent).
    #[inline]
    pub fn is_aborting(&self) -> bool {
        self.abort_state() != AbortState::Clear
    }

    /// Fails fast with [`SupError::Abort`] if the signal is not clear.
    ///
    /// Long stretches of uninstrumented work should call this at natural
    /// checkpoints; code built purely from the crate's blocking primitives
    /// does not need it.
    #[inline]
    pub fn check_abort(&self) -> Result<(), SupError> {
        if self.is_aborting() {
            Err(SupError::Abort)
        } else {
            Ok(())
        }
    }

    /// Completes when the abort signal leaves `Clear`.
    ///
    /// Broadcast: every suspended caller observes it independently. Pair it
    /// with work in a `select!` to build abort-aware blocking operations.
    pub async fn aborted(&self) {
        self.inner.token.cancelled().await;
    }

    /// Moves the abort signal from `Clear` to `Aborting`.
    ///
    /// Idempotent: a no-op when the signal already left `Clear`. After this
    /// call every blocking operation by any registered task fails fast.
    pub fn begin_abort(&self) {
        {
            let mut st = self.lock();
            if st.abort != AbortState::Clear {
                return;
            }
            st.abort = AbortState::Aborting;
        }
        self.inner.token.cancel();
        self.inner.queue_rev.notify_waiters();
        self.publish(Event::now(EventKind::AbortRequested));
    }

    /// Suspends until the children set is empty, then finalizes the signal
    /// to `Aborted`.
    ///
    /// A restart attempt may begin only after this returns: full drain is
    /// what guarantees scoped resources from the previous attempt were
    /// released. Draining a context that never aborted still finalizes it —
    /// drain is the end of its lifetime either way.
    pub async fn await_drain(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock().children.is_empty() {
                break;
            }
            notified.await;
        }
        let finalized = {
            let mut st = self.lock();
            if st.abort != AbortState::Aborted {
                st.abort = AbortState::Aborted;
                true
            } else {
                false
            }
        };
        if finalized {
            self.inner.queue_rev.notify_waiters();
            self.publish(Event::now(EventKind::DrainCompleted));
        }
    }

    // --- children ---------------------------------------------------------

    /// Registers a new task handle; called before the wrapped body runs.
    pub(crate) fn register(&self, name: &str) -> u64 {
        let id = TASK_IDS.fetch_add(1, AtomicOrdering::Relaxed);
        self.lock().children.insert(id);
        self.publish(Event::now(EventKind::TaskSpawned).with_task(name));
        id
    }

    /// Deregisters a task handle; called exactly once on every exit path.
    pub(crate) fn deregister(&self, id: u64) {
        let empty = {
            let mut st = self.lock();
            st.children.remove(&id);
            st.children.is_empty()
        };
        if empty {
            self.inner.drained.notify_waiters();
        }
    }

    /// Number of currently live children.
    pub fn live_children(&self) -> usize {
        self.lock().children.len()
    }

    // --- error queue ------------------------------------------------------

    /// Appends an error record with `enqueued_at = now`.
    ///
    /// Immediate-mode task wrappers call this at the moment of failure; it
    /// is also available to application code that detects a failure outside
    /// any task body. The record's stale window starts here.
    pub fn report_error(&self, error: SupError) {
        let rendered = error.to_string();
        {
            let mut st = self.lock();
            st.errors.push_back(ErrorRecord {
                payload: error,
                enqueued_at: Instant::now(),
            });
        }
        self.inner.queue_rev.notify_waiters();
        self.publish(Event::now(EventKind::ErrorReported).with_error(rendered));
    }

    /// Number of unconsumed error records.
    pub fn pending_errors(&self) -> usize {
        self.lock().errors.len()
    }

    /// Pops the oldest unconsumed error record, suspending until one exists.
    ///
    /// Consuming an error is what keeps it from going stale: a consumer that
    /// drains the queue within `stale_timeout` suppresses the restart.
    /// Fails fast with [`SupError::Abort`] once the context is aborting or
    /// aborted — a cascaded parent abort included — like every other
    /// blocking operation under it.
    pub async fn consume_next_error(&self) -> Result<SupError, SupError> {
        loop {
            let notified = self.inner.queue_rev.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut st = self.lock();
                if st.abort != AbortState::Clear || self.inner.token.is_cancelled() {
                    return Err(SupError::Abort);
                }
                if let Some(rec) = st.errors.pop_front() {
                    drop(st);
                    self.inner.queue_rev.notify_waiters();
                    self.publish(
                        Event::now(EventKind::ErrorConsumed).with_error(rec.payload.to_string()),
                    );
                    return Ok(rec.payload);
                }
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = self.inner.token.cancelled() => return Err(SupError::Abort),
            }
        }
    }

    // --- staleness --------------------------------------------------------

    /// Resolves when the oldest record goes unconsumed past `stale_timeout`,
    /// yielding the triggering payload. Pends forever while the queue stays
    /// empty, records keep being consumed in time, or an abort cycle took
    /// over the queue.
    pub(crate) async fn next_stale(&self) -> SupError {
        loop {
            match self.stale_round().await {
                StaleRound::Expired(err) => return err,
                StaleRound::Changed => {}
                StaleRound::Halted => std::future::pending::<()>().await,
            }
        }
    }

    /// Like [`next_stale`](Self::next_stale), but resolves with `None` as
    /// soon as the queue is observed empty — used by the restarting
    /// supervisor to settle a completed attempt with errors still pending.
    pub(crate) async fn settled_or_stale(&self) -> Option<SupError> {
        loop {
            if self.lock().errors.is_empty() {
                return None;
            }
            match self.stale_round().await {
                StaleRound::Expired(err) => return Some(err),
                StaleRound::Changed => {}
                // Staleness can no longer trigger once an abort is in
                // flight; nothing left to settle.
                StaleRound::Halted => return None,
            }
        }
    }

    /// One arm/sleep round of the stale watcher.
    ///
    /// FIFO insertion means the front record always has the earliest
    /// deadline, so one timer per context suffices while still giving every
    /// record its own window.
    async fn stale_round(&self) -> StaleRound {
        let notified = self.inner.queue_rev.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let deadline = {
            let st = self.lock();
            if st.abort != AbortState::Clear || self.inner.token.is_cancelled() {
                // Staleness only triggers while the signal is clear; an
                // abort in flight (local or cascaded from a parent) owns
                // the queue now.
                return StaleRound::Halted;
            }
            st.errors
                .front()
                .map(|rec| rec.enqueued_at + self.inner.cfg.stale_timeout)
        };

        match deadline {
            None => {
                tokio::select! {
                    _ = &mut notified => StaleRound::Changed,
                    _ = self.inner.token.cancelled() => StaleRound::Halted,
                }
            }
            Some(at) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => StaleRound::Halted,
                    _ = time::sleep_until(at) => {
                        let popped = {
                            let mut st = self.lock();
                            let due = st.abort == AbortState::Clear
                                && !self.inner.token.is_cancelled()
                                && st
                                    .errors
                                    .front()
                                    .is_some_and(|rec| rec.enqueued_at + self.inner.cfg.stale_timeout <= Instant::now());
                            if due { st.errors.pop_front() } else { None }
                        };
                        match popped {
                            Some(rec) => {
                                self.inner.queue_rev.notify_waiters();
                                self.publish(
                                    Event::now(EventKind::ErrorStale)
                                        .with_error(rec.payload.to_string()),
                                );
                                StaleRound::Expired(rec.payload)
                            }
                            None => StaleRound::Changed,
                        }
                    }
                    _ = &mut notified => StaleRound::Changed,
                }
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent)
            .field("abort", &self.abort_state())
            .field("children", &self.live_children())
            .field("pending_errors", &self.pending_errors())
            .finish()
    }
}

/// Process-wide default context.
///
/// A development convenience for top-level experiments and examples only:
/// production call chains are expected to thread an explicit [`Context`]
/// through every spawning and blocking call. The global context is never
/// aborted or drained by the crate itself.
pub fn global() -> &'static Context {
    GLOBAL.get_or_init(Context::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_cfg(stale_ms: u64) -> SupervisorConfig {
        SupervisorConfig {
            stale_timeout: Duration::from_millis(stale_ms),
            ..SupervisorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_begin_abort_is_idempotent() {
        let cx = Context::new();
        assert_eq!(cx.abort_state(), AbortState::Clear);
        cx.begin_abort();
        assert_eq!(cx.abort_state(), AbortState::Aborting);
        cx.begin_abort();
        assert_eq!(cx.abort_state(), AbortState::Aborting);
    }

    #[tokio::test]
    async fn test_await_drain_finalizes_signal() {
        let cx = Context::new();
        cx.begin_abort();
        cx.await_drain().await;
        assert_eq!(cx.abort_state(), AbortState::Aborted);
    }

    #[tokio::test]
    async fn test_await_drain_waits_for_children() {
        let cx = Context::new();
        let id = cx.register("worker");
        assert_eq!(cx.live_children(), 1);

        let cx2 = cx.clone();
        let waiter = tokio::spawn(async move { cx2.await_drain().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        cx.deregister(id);
        waiter.await.expect("drain waiter");
        assert_eq!(cx.live_children(), 0);
        assert_eq!(cx.abort_state(), AbortState::Aborted);
    }

    #[tokio::test]
    async fn test_errors_consumed_in_fifo_order() {
        let cx = Context::new();
        cx.report_error(SupError::thrown("first"));
        cx.report_error(SupError::thrown("second"));
        cx.report_error(SupError::thrown("third"));

        assert_eq!(cx.pending_errors(), 3);
        assert_eq!(
            cx.consume_next_error().await,
            Ok(SupError::thrown("first"))
        );
        assert_eq!(
            cx.consume_next_error().await,
            Ok(SupError::thrown("second"))
        );
        assert_eq!(
            cx.consume_next_error().await,
            Ok(SupError::thrown("third"))
        );
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test]
    async fn test_consume_blocks_until_report() {
        let cx = Context::new();
        let cx2 = cx.clone();
        let consumer = tokio::spawn(async move { cx2.consume_next_error().await });
        tokio::task::yield_now().await;
        assert!(!consumer.is_finished());

        cx.report_error(SupError::thrown("late"));
        assert_eq!(
            consumer.await.expect("consumer"),
            Ok(SupError::thrown("late"))
        );
    }

    #[tokio::test]
    async fn test_consume_fails_fast_after_abort() {
        let cx = Context::new();
        cx.report_error(SupError::thrown("pending"));
        cx.begin_abort();
        // Abort wins even though a record is available.
        assert_eq!(cx.consume_next_error().await, Err(SupError::Abort));
    }

    #[tokio::test]
    async fn test_blocked_consumer_woken_by_abort() {
        let cx = Context::new();
        let cx2 = cx.clone();
        let consumer = tokio::spawn(async move { cx2.consume_next_error().await });
        tokio::task::yield_now().await;

        cx.begin_abort();
        assert_eq!(consumer.await.expect("consumer"), Err(SupError::Abort));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fires_after_timeout() {
        let cx = Context::attempt(quick_cfg(1000), Bus::new(8));
        cx.report_error(SupError::thrown("abandoned"));
        let err = cx.next_stale().await;
        assert_eq!(err, SupError::thrown("abandoned"));
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumption_in_time_suppresses_stale() {
        let cx = Context::attempt(quick_cfg(1000), Bus::new(8));
        cx.report_error(SupError::thrown("handled"));

        let cx2 = cx.clone();
        let watcher = tokio::spawn(async move { cx2.settled_or_stale().await });
        tokio::task::yield_now().await;

        time::sleep(Duration::from_millis(500)).await;
        assert!(cx.consume_next_error().await.is_ok());
        assert_eq!(watcher.await.expect("watcher"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_record_stale_windows() {
        let cx = Context::attempt(quick_cfg(1000), Bus::new(8));
        cx.report_error(SupError::thrown("old"));
        time::sleep(Duration::from_millis(600)).await;
        cx.report_error(SupError::thrown("young"));

        // The older record expires first, on its own window.
        let started = Instant::now();
        let err = cx.next_stale().await;
        assert_eq!(err, SupError::thrown("old"));
        assert_eq!(started.elapsed(), Duration::from_millis(400));

        // The younger record keeps its own enqueue time.
        let err = cx.next_stale().await;
        assert_eq!(err, SupError::thrown("young"));
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_child_consume_fails_fast_under_parent_abort() {
        let parent = Context::new();
        let child = parent.child();
        child.report_error(SupError::thrown("pending"));

        parent.begin_abort();
        assert_eq!(child.abort_state(), AbortState::Aborting);
        // The cascaded abort wins even though a record is available.
        assert_eq!(child.consume_next_error().await, Err(SupError::Abort));
    }

    #[tokio::test]
    async fn test_child_blocked_consumer_woken_by_parent_abort() {
        let parent = Context::new();
        let child = parent.child();
        let child2 = child.clone();
        let consumer = tokio::spawn(async move { child2.consume_next_error().await });
        tokio::task::yield_now().await;

        parent.begin_abort();
        assert_eq!(consumer.await.expect("consumer"), Err(SupError::Abort));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_watcher_halts_under_parent_abort() {
        let parent = Context::new();
        let child = parent.child();
        child.report_error(SupError::thrown("pending"));

        parent.begin_abort();
        // The record can no longer go stale; the cascaded abort owns it.
        assert_eq!(child.settled_or_stale().await, None);
    }

    #[tokio::test]
    async fn test_child_inherits_parent_abort() {
        let parent = Context::new();
        let child = parent.child();
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert_eq!(child.abort_state(), AbortState::Clear);

        parent.begin_abort();
        assert_eq!(child.abort_state(), AbortState::Aborting);
        assert!(child.check_abort().is_err());
    }

    #[tokio::test]
    async fn test_global_context_is_shared() {
        let a = global();
        let b = global();
        assert_eq!(a.id(), b.id());
    }
}
