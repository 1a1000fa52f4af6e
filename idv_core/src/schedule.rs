//! Front-loaded delay schedule and attempt budget.
//!
//! The provider rarely has a verdict within the first few seconds, so the
//! first check waits longest and later checks tighten to a steady interval.
//! A session is bounded by `max_attempts`; it can never poll forever.

use std::time::Duration;

use crate::error::{IdvError, Result};

/// Delay before the first check.
pub const INITIAL_DELAY: Duration = Duration::from_millis(5000);

/// Delay before the second check.
pub const SECOND_DELAY: Duration = Duration::from_millis(3000);

/// Delay before the third and every later check.
pub const STEADY_DELAY: Duration = Duration::from_millis(2000);

/// Maximum number of checks per session.
pub const MAX_ATTEMPTS: u32 = 15;

/// Largest attempt budget a configuration may ask for.
pub const MAX_ATTEMPTS_LIMIT: u32 = 1000;

/// Timing policy for one polling session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSchedule {
    /// Delay before attempt 1
    pub initial_delay: Duration,
    /// Delay before attempt 2
    pub second_delay: Duration,
    /// Delay before attempt 3 and onwards
    pub steady_delay: Duration,
    /// Attempt budget; exceeding it ends the session with a timeout
    pub max_attempts: u32,
    /// Optional deadline for a single status check
    pub check_timeout: Option<Duration>,
}

impl PollSchedule {
    /// Creates the standard schedule: 5s, 3s, then 2s, at most 15 attempts.
    pub fn new() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            second_delay: SECOND_DELAY,
            steady_delay: STEADY_DELAY,
            max_attempts: MAX_ATTEMPTS,
            check_timeout: None,
        }
    }

    /// Returns the delay to wait once `completed` attempts have been made.
    ///
    /// `delay_after(0)` is the wait before the very first check.
    ///
    /// ```
    /// use idv_core::schedule::PollSchedule;
    /// use std::time::Duration;
    ///
    /// let schedule = PollSchedule::new();
    /// assert_eq!(schedule.delay_after(0), Duration::from_secs(5));
    /// assert_eq!(schedule.delay_after(1), Duration::from_secs(3));
    /// assert_eq!(schedule.delay_after(7), Duration::from_secs(2));
    /// ```
    pub fn delay_after(&self, completed: u32) -> Duration {
        match completed {
            0 => self.initial_delay,
            1 => self.second_delay,
            _ => self.steady_delay,
        }
    }

    /// True once `attempt` (1-based) is past the budget.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }

    /// Total scheduled wait before the `attempt`-th check (1-based),
    /// excluding check latency.
    pub fn elapsed_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            1 => self.initial_delay,
            n => self
                .initial_delay
                .saturating_add(self.second_delay)
                .saturating_add(self.steady_delay.saturating_mul(n - 2)),
        }
    }

    /// Worst-case scheduled wait before the session gives up.
    ///
    /// This is the point at which the slot after the last allowed attempt
    /// comes due and the timeout is reported.
    pub fn worst_case(&self) -> Duration {
        self.elapsed_before(self.max_attempts.saturating_add(1))
    }

    /// Returns a copy with every delay multiplied by `factor`.
    ///
    /// Used by simulations to compress real time. The attempt budget is left
    /// unchanged. Negative factors clamp to zero.
    ///
    /// # Errors
    ///
    /// [`IdvError::Config`] if `factor` is NaN or a scaled delay does not fit
    /// in a `Duration`.
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        if factor.is_nan() {
            return Err(IdvError::Config("time scale must be a number".to_string()));
        }
        let factor = factor.max(0.0);
        Ok(Self {
            initial_delay: scale(self.initial_delay, factor)?,
            second_delay: scale(self.second_delay, factor)?,
            steady_delay: scale(self.steady_delay, factor)?,
            check_timeout: self
                .check_timeout
                .map(|limit| scale(limit, factor))
                .transpose()?,
            ..*self
        })
    }

    /// Sets a deadline for each individual status check.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = Some(timeout);
        self
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new()
    }
}

fn scale(delay: Duration, factor: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).map_err(|_| {
        IdvError::Config(format!("scaling {:?} by {} overflows", delay, factor))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_loaded_delays() {
        let schedule = PollSchedule::new();
        assert_eq!(schedule.delay_after(0), Duration::from_millis(5000));
        assert_eq!(schedule.delay_after(1), Duration::from_millis(3000));
        for completed in 2..20 {
            assert_eq!(schedule.delay_after(completed), Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_elapsed_before_nth_check() {
        let schedule = PollSchedule::new();
        assert_eq!(schedule.elapsed_before(1), Duration::from_millis(5000));
        assert_eq!(schedule.elapsed_before(2), Duration::from_millis(8000));
        assert_eq!(schedule.elapsed_before(3), Duration::from_millis(10_000));
        assert_eq!(schedule.elapsed_before(15), Duration::from_millis(34_000));
    }

    #[test]
    fn test_budget() {
        let schedule = PollSchedule::new();
        assert!(!schedule.is_exhausted(15));
        assert!(schedule.is_exhausted(16));
        assert_eq!(schedule.worst_case(), Duration::from_millis(36_000));
    }

    #[test]
    fn test_scaled_keeps_budget() {
        let schedule = PollSchedule::new()
            .with_check_timeout(Duration::from_secs(10))
            .scaled(0.5)
            .unwrap();
        assert_eq!(schedule.delay_after(0), Duration::from_millis(2500));
        assert_eq!(schedule.delay_after(1), Duration::from_millis(1500));
        assert_eq!(schedule.delay_after(2), Duration::from_millis(1000));
        assert_eq!(schedule.check_timeout, Some(Duration::from_secs(5)));
        assert_eq!(schedule.max_attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn test_negative_scale_clamps_to_zero() {
        let schedule = PollSchedule::new().scaled(-1.0).unwrap();
        assert_eq!(schedule.delay_after(0), Duration::ZERO);
    }

    #[test]
    fn test_scale_overflow_is_config_error() {
        let err = PollSchedule::new().scaled(1e300).unwrap_err();
        assert!(matches!(err, IdvError::Config(_)));
        assert!(matches!(
            PollSchedule::new().scaled(f64::NAN),
            Err(IdvError::Config(_))
        ));
    }

    #[test]
    fn test_worst_case_saturates_for_huge_budget() {
        let schedule = PollSchedule {
            max_attempts: u32::MAX,
            ..PollSchedule::new()
        };
        assert!(schedule.worst_case() > Duration::from_secs(3600));
        assert_eq!(schedule.elapsed_before(0), Duration::ZERO);
    }
}
