//! Delay schedule between restart attempts.
//!
//! [`RestartBackoff`] computes the pause inserted between a completed drain
//! and the next attempt of a restarting supervisor. The delay for attempt
//! `n` (0-indexed) is `initial × factor^n`, clamped to `max`. With `jitter`
//! enabled the clamped base is replaced by a uniform sample from
//! `[0, base]`, which spreads restart storms when many supervisors share a
//! failing dependency.
//!
//! The base is always derived from the attempt number alone, so jitter
//! output never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use chanvisor::RestartBackoff;
//!
//! let backoff = RestartBackoff {
//!     initial: Duration::from_millis(100),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: false,
//! };
//! assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay_for(2), Duration::from_millis(400));
//! assert_eq!(backoff.delay_for(30), Duration::from_secs(5)); // clamped
//! ```

use std::time::Duration;

use rand::Rng;

/// Delay schedule between restart attempts of a supervisor.
#[derive(Clone, Copy, Debug)]
pub struct RestartBackoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Cap for all delays.
    pub max: Duration,
    /// Multiplicative growth per attempt (`>= 1.0` recommended).
    pub factor: f64,
    /// Replace the delay with a uniform sample from `[0, delay]`.
    pub jitter: bool,
}

impl RestartBackoff {
    /// No delay between attempts: retry immediately after drain.
    ///
    /// This is the default; it keeps restart timing driven purely by the
    /// stale-timeout/drain protocol.
    pub const fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: false,
        }
    }

    /// Constant delay between attempts, no growth, no jitter.
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            factor: 1.0,
            jitter: false,
        }
    }

    /// Computes the delay for the given attempt number (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_for(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let ms = base.as_millis().min(u128::from(u64::MAX)) as u64;
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    /// `initial × factor^attempt` clamped to `max`, overflow-safe.
    fn base_for(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.initial.as_secs_f64() * self.factor.powi(exp);
        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_always_zero() {
        let b = RestartBackoff::none();
        for attempt in 0..20 {
            assert_eq!(b.delay_for(attempt), Duration::ZERO);
        }
    }

    #[test]
    fn test_fixed_is_constant() {
        let b = RestartBackoff::fixed(Duration::from_millis(250));
        for attempt in 0..10 {
            assert_eq!(b.delay_for(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_exponential_growth_clamped() {
        let b = RestartBackoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: false,
        };
        assert_eq!(b.delay_for(0), Duration::from_millis(100));
        assert_eq!(b.delay_for(1), Duration::from_millis(200));
        assert_eq!(b.delay_for(3), Duration::from_millis(800));
        assert_eq!(b.delay_for(4), Duration::from_secs(1));
        assert_eq!(b.delay_for(100), Duration::from_secs(1));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        let b = RestartBackoff {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: false,
        };
        assert_eq!(b.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_stays_within_base() {
        let b = RestartBackoff {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: true,
        };
        for attempt in 0..50 {
            assert!(b.delay_for(attempt) <= Duration::from_millis(1000));
        }
    }
}
