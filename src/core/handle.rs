//! Task wrapper: spawning supervised work and consuming its outcome.
//!
//! [`Context::spawn`] wraps a unit of concurrent work so that a thrown error
//! becomes a returned value, never an unobserved runtime fault. The wrapper:
//!
//! 1. registers the child with its context **before** the body runs,
//! 2. runs the body under `catch_unwind`, folding panics into
//!    [`SupError::Thrown`],
//! 3. routes the outcome per [`ErrorMode`],
//! 4. deregisters the child exactly once, on every exit path.
//!
//! ## Propagation modes
//! ```text
//! Deferred:   body ──► Result ──► TaskHandle::join()        (caller consumes)
//! Immediate:  body ──► Ok     ──► TaskHandle::join()
//!                  └─► Err    ──► Context::report_error()   (queue consumes)
//! ```
//! Deferred mode suits code that synchronously awaits its own children: the
//! error stays local until the caller re-raises it with `join().await?`.
//! Immediate mode suits background/looping tasks with no synchronous caller;
//! the failure lands in the owning context's pending queue the moment it
//! occurs, where the supervisor's stale window starts ticking.
//!
//! An [`SupError::Abort`] outcome is a cancellation, not a failure: in
//! immediate mode it is *not* reported — a task unwinding because of the
//! abort it was asked to observe must not re-trigger the supervisor that
//! issued it.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::core::context::Context;
use crate::error::SupError;
use crate::events::{Event, EventKind};

/// How a task's error leaves its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// The error is returned through the task's own result channel and
    /// consumed via [`TaskHandle::join`]. The context's pending queue stays
    /// untouched unless the caller re-raises.
    Deferred,
    /// The error is pushed into the owning context's pending queue at the
    /// moment it occurs; the task's own result channel never carries it.
    Immediate,
}

/// Handle to one running unit of supervised work.
///
/// The completion signal is a success value, an error, or an abort outcome.
/// Dropping the handle without joining is fine: the task stays registered
/// with its context until it exits on its own, and a deferred error that is
/// never read simply stays local to the dropped handle.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    name: Arc<str>,
    rx: oneshot::Receiver<Result<T, SupError>>,
}

impl<T> TaskHandle<T> {
    /// Identity of the task within its context.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name the task was spawned with.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicit unwrap read: awaits the task and re-raises its outcome
    /// up the caller's stack.
    ///
    /// For an immediate-mode task whose error was routed to the context
    /// (or a task that unwound on abort) there is no result to hand over;
    /// `join` yields [`SupError::Abort`] in that case.
    pub async fn join(self) -> Result<T, SupError> {
        match self.rx.await {
            Ok(res) => res,
            Err(_) => Err(SupError::Abort),
        }
    }
}

impl Context {
    /// Spawns `body` as a supervised child of this context.
    ///
    /// Non-blocking: the handle returns immediately while the body runs on
    /// the tokio pool. The child is registered before the body starts, so a
    /// drain that begins concurrently cannot miss it.
    pub fn spawn<T, F>(&self, name: impl Into<Arc<str>>, mode: ErrorMode, body: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, SupError>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let id = self.register(&name);
        let (tx, rx) = oneshot::channel();

        let cx = self.clone();
        let task_name = Arc::clone(&name);
        tokio::spawn(async move {
            let result = match std::panic::AssertUnwindSafe(body).catch_unwind().await {
                Ok(res) => res,
                Err(panic) => Err(SupError::thrown(panic_message(panic.as_ref()))),
            };

            match &result {
                Ok(_) => cx.publish(Event::now(EventKind::TaskCompleted).with_task(&*task_name)),
                Err(SupError::Abort) => {
                    cx.publish(Event::now(EventKind::TaskAborted).with_task(&*task_name))
                }
                Err(e) => cx.publish(
                    Event::now(EventKind::TaskFailed)
                        .with_task(&*task_name)
                        .with_error(e.to_string()),
                ),
            }

            match mode {
                ErrorMode::Deferred => {
                    let _ = tx.send(result);
                }
                ErrorMode::Immediate => match result {
                    Ok(value) => {
                        let _ = tx.send(Ok(value));
                    }
                    Err(SupError::Abort) => drop(tx),
                    Err(err) => {
                        cx.report_error(err);
                        drop(tx);
                    }
                },
            }

            // Last step on every exit path: resources owned by the body were
            // released when it returned or unwound above.
            cx.deregister(id);
        });

        TaskHandle { id, name, rx }
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::AbortState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time;

    #[tokio::test]
    async fn test_deferred_success_joins_value() {
        let cx = Context::new();
        let handle = cx.spawn("adder", ErrorMode::Deferred, async { Ok(2 + 2) });
        assert_eq!(handle.join().await, Ok(4));
        cx.await_drain().await;
    }

    #[tokio::test]
    async fn test_deferred_error_stays_local() {
        let cx = Context::new();
        let handle = cx.spawn::<(), _>("failer", ErrorMode::Deferred, async {
            Err(SupError::thrown("boom"))
        });
        assert_eq!(handle.join().await, Err(SupError::thrown("boom")));
        // The error went to the caller, not the context.
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test]
    async fn test_deferred_unread_leaves_context_healthy() {
        let cx = Context::new();
        let handle = cx.spawn::<(), _>("ignored", ErrorMode::Deferred, async {
            Err(SupError::thrown("nobody reads this"))
        });
        drop(handle);
        cx.await_drain().await;
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test]
    async fn test_immediate_error_reports_exactly_one_record() {
        let cx = Context::new();
        let handle = cx.spawn::<(), _>("reporter", ErrorMode::Immediate, async {
            Err(SupError::thrown("background failure"))
        });
        // No explicit unwrap required for the record to appear.
        assert_eq!(handle.join().await, Err(SupError::Abort));
        assert_eq!(cx.pending_errors(), 1);
        assert_eq!(
            cx.consume_next_error().await,
            Ok(SupError::thrown("background failure"))
        );
    }

    #[tokio::test]
    async fn test_immediate_success_joins_value() {
        let cx = Context::new();
        let handle = cx.spawn("worker", ErrorMode::Immediate, async { Ok("done") });
        assert_eq!(handle.join().await, Ok("done"));
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_thrown() {
        let cx = Context::new();
        let handle = cx.spawn::<(), _>("panicker", ErrorMode::Deferred, async {
            panic!("integer divide by teapot");
        });
        assert_eq!(
            handle.join().await,
            Err(SupError::thrown("integer divide by teapot"))
        );
        cx.await_drain().await;
    }

    #[tokio::test]
    async fn test_abort_outcome_is_not_reported() {
        let cx = Context::new();
        let watched = cx.clone();
        let handle = cx.spawn::<(), _>("canceller", ErrorMode::Immediate, async move {
            watched.aborted().await;
            Err(SupError::Abort)
        });
        cx.begin_abort();
        assert_eq!(handle.join().await, Err(SupError::Abort));
        cx.await_drain().await;
        assert_eq!(cx.pending_errors(), 0);
    }

    #[tokio::test]
    async fn test_deregistered_on_every_exit_path() {
        let cx = Context::new();
        let ok = cx.spawn("ok", ErrorMode::Deferred, async { Ok(()) });
        let err = cx.spawn::<(), _>("err", ErrorMode::Deferred, async {
            Err(SupError::thrown("x"))
        });
        let boom = cx.spawn::<(), _>("boom", ErrorMode::Deferred, async { panic!("x") });
        let _ = ok.join().await;
        let _ = err.join().await;
        let _ = boom.join().await;
        cx.await_drain().await;
        assert_eq!(cx.live_children(), 0);
        assert_eq!(cx.abort_state(), AbortState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scoped_resource_released_on_each_exit_path() {
        struct Guard(Arc<AtomicUsize>);
        impl Drop for Guard {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let acquired = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let cx = Context::new();

        for outcome in ["ok", "thrown", "abort"] {
            let a = Arc::clone(&acquired);
            let r = Arc::clone(&released);
            let watched = cx.clone();
            cx.spawn::<(), _>(outcome, ErrorMode::Deferred, async move {
                a.fetch_add(1, Ordering::SeqCst);
                let _guard = Guard(r);
                match outcome {
                    "ok" => Ok(()),
                    "thrown" => Err(SupError::thrown("deliberate")),
                    _ => {
                        watched.aborted().await;
                        Err(SupError::Abort)
                    }
                }
            });
        }

        time::sleep(Duration::from_millis(10)).await;
        cx.begin_abort();
        cx.await_drain().await;
        assert_eq!(acquired.load(Ordering::SeqCst), 3);
        assert_eq!(released.load(Ordering::SeqCst), acquired.load(Ordering::SeqCst));
    }
}
