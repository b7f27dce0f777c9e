//! Convenience adapters over the core spawn/channel contract.
//!
//! Everything here is a plain caller of [`Context::spawn`] and the
//! abort-aware channel primitives: no new invariants, no private
//! error-propagation rules. If one of these suits your shape of fan-out,
//! use it; if not, the primitives compose the same way by hand.

use std::future::Future;

use crate::chan::Receiver;
use crate::core::{Context, ErrorMode, TaskHandle};
use crate::error::SupError;

/// Receives one value from each receiver, preserving **input** order.
///
/// Completion order does not matter: the first receiver is awaited first,
/// however late its producer runs. Fails with the first error observed
/// (an abort, or a producer gone before yielding a value).
pub async fn gather_in_order<T>(receivers: Vec<Receiver<T>>) -> Result<Vec<T>, SupError> {
    let mut out = Vec::with_capacity(receivers.len());
    for mut rx in receivers {
        out.push(rx.recv_value().await?);
    }
    Ok(out)
}

/// Drains a receiver into a `Vec` until end of stream.
///
/// Turns a sequence of channel reads into an ordinary collection. Fails
/// with [`SupError::Abort`] if the owning context aborts mid-drain.
pub async fn collect<T>(mut rx: Receiver<T>) -> Result<Vec<T>, SupError> {
    let mut out = Vec::new();
    while let Some(value) = rx.recv().await? {
        out.push(value);
    }
    Ok(out)
}

/// Joins a batch of handles, preserving input order.
///
/// Stops at the first error; remaining tasks keep running under their
/// context and are collected by its drain.
pub async fn join_all<T>(handles: Vec<TaskHandle<T>>) -> Result<Vec<T>, SupError> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.join().await?);
    }
    Ok(out)
}

/// Fans `f` across the items as deferred children of `cx` and returns the
/// results in input order.
///
/// Errors stay deferred: the first failing item's error is returned to the
/// caller here, and the context's pending queue is never touched.
pub async fn parallel_map<I, T, U, F, Fut>(cx: &Context, items: I, f: F) -> Result<Vec<U>, SupError>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<U, SupError>> + Send + 'static,
    U: Send + 'static,
{
    let handles: Vec<TaskHandle<U>> = items
        .into_iter()
        .map(|item| cx.spawn("parallel-map", ErrorMode::Deferred, f(item)))
        .collect();
    join_all(handles).await
}
