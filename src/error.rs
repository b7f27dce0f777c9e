//! Error types flowing through the supervision tree.
//!
//! One enum, [`SupError`], covers every failure a supervised task or the
//! supervisor itself can surface:
//!
//! - [`SupError::Thrown`] — an application-level failure raised inside a task
//!   body (including a caught panic).
//! - [`SupError::Abort`] — raised by a blocking operation that observed the
//!   owning context's abort signal. Handled only by unwinding; suppressing it
//!   defeats cooperative cancellation.
//! - [`SupError::Closed`] — the peer end of a channel is gone.
//! - [`SupError::RetriesExhausted`] — terminal outcome of a restarting
//!   supervisor, carrying the last triggering error.
//!
//! Failure is data here: errors travel through the same channels as success
//! values, never as a cross-cutting control transfer. Staleness is *not* an
//! error kind — it is the internal trigger condition that moves a restarting
//! supervisor out of its running state.

use thiserror::Error;

/// Errors produced by supervised tasks, channel operations, and supervisors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupError {
    /// Application failure raised inside a task body.
    ///
    /// Deferred mode returns it through the task's own result channel;
    /// immediate mode forwards it to the owning context's pending-error
    /// queue. Panics in task bodies are caught and folded into this kind.
    #[error("task failed: {message}")]
    Thrown {
        /// The underlying failure message.
        message: String,
    },

    /// A blocking operation observed the owning context's abort signal.
    ///
    /// Raised regardless of whether data or capacity would otherwise have
    /// been available. Recover only by unwinding to a point where scoped
    /// resources release.
    #[error("aborted by supervisor")]
    Abort,

    /// The other end of the channel was dropped.
    #[error("channel closed")]
    Closed,

    /// A restarting supervisor ran out of retries.
    ///
    /// `source` is the error that triggered the final abort cycle.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Total number of failed attempts (initial run included).
        attempts: u32,
        /// The last triggering error.
        source: Box<SupError>,
    },
}

impl SupError {
    /// Creates a [`SupError::Thrown`] from any displayable payload.
    pub fn thrown(message: impl Into<String>) -> Self {
        SupError::Thrown {
            message: message.into(),
        }
    }

    /// True for [`SupError::Abort`].
    #[inline]
    pub fn is_abort(&self) -> bool {
        matches!(self, SupError::Abort)
    }

    /// For [`SupError::RetriesExhausted`], the original triggering error.
    /// Identity otherwise.
    pub fn root_error(&self) -> &SupError {
        match self {
            SupError::RetriesExhausted { source, .. } => source.root_error(),
            other => other,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chanvisor::SupError;
    ///
    /// assert_eq!(SupError::Abort.as_label(), "abort");
    /// assert_eq!(SupError::thrown("boom").as_label(), "thrown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupError::Thrown { .. } => "thrown",
            SupError::Abort => "abort",
            SupError::Closed => "closed",
            SupError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_error_unwraps_exhaustion() {
        let inner = SupError::thrown("boom");
        let outer = SupError::RetriesExhausted {
            attempts: 4,
            source: Box::new(inner.clone()),
        };
        assert_eq!(outer.root_error(), &inner);
        assert_eq!(inner.root_error(), &inner);
    }

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(SupError::Closed.as_label(), "closed");
        assert_eq!(
            SupError::RetriesExhausted {
                attempts: 1,
                source: Box::new(SupError::Abort),
            }
            .as_label(),
            "retries_exhausted"
        );
    }

    #[test]
    fn test_display_carries_trigger() {
        let err = SupError::RetriesExhausted {
            attempts: 3,
            source: Box::new(SupError::thrown("disk full")),
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("disk full"));
    }
}
