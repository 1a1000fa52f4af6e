//! Poller metrics for sessions, checks and outcomes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Kind of metric being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// A session was started
    SessionStarted,
    /// A status check was issued
    CheckIssued,
    /// A status check failed and will be retried
    TransientError,
    /// Provider reported IN_PROGRESS
    InProgress,
    /// Session ended with PASS
    Passed,
    /// Session ended with FAIL
    Failed,
    /// Session ended with MANUAL
    ManualReview,
    /// Session ran out of attempts
    TimedOut,
    /// Session was stopped or superseded
    Cancelled,
    /// A late result from a stale session was dropped
    StaleDiscarded,
}

const KIND_COUNT: usize = 10;

/// Poller metrics collector.
///
/// Cheap to clone; all clones share the same counters.
#[derive(Clone, Debug)]
pub struct PollerMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Counts by kind
    counts: [AtomicU64; KIND_COUNT],
    /// Total time spent waiting on the checker (nanoseconds)
    check_time_ns: AtomicU64,
}

impl PollerMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                counts: std::array::from_fn(|_| AtomicU64::new(0)),
                check_time_ns: AtomicU64::new(0),
            }),
        }
    }

    /// Records a metric occurrence.
    pub fn record(&self, kind: MetricKind) {
        self.inner.counts[kind as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Records how long one status check took.
    pub fn record_check_latency(&self, duration: Duration) {
        self.inner
            .check_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Gets the count for a specific metric.
    pub fn count(&self, kind: MetricKind) -> u64 {
        self.inner.counts[kind as usize].load(Ordering::Relaxed)
    }

    /// Gets the total time spent in the checker.
    pub fn check_time(&self) -> Duration {
        Duration::from_nanos(self.inner.check_time_ns.load(Ordering::Relaxed))
    }

    /// Fraction of issued checks that errored (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        let issued = self.count(MetricKind::CheckIssued);
        if issued == 0 {
            return 0.0;
        }
        self.count(MetricKind::TransientError) as f64 / issued as f64
    }

    /// Gets all metrics as a summary.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            sessions_started: self.count(MetricKind::SessionStarted),
            checks_issued: self.count(MetricKind::CheckIssued),
            transient_errors: self.count(MetricKind::TransientError),
            in_progress: self.count(MetricKind::InProgress),
            passed: self.count(MetricKind::Passed),
            failed: self.count(MetricKind::Failed),
            manual_review: self.count(MetricKind::ManualReview),
            timed_out: self.count(MetricKind::TimedOut),
            cancelled: self.count(MetricKind::Cancelled),
            stale_discarded: self.count(MetricKind::StaleDiscarded),
            check_time: self.check_time(),
            error_rate: self.error_rate(),
        }
    }

    /// Resets all metrics to zero.
    pub fn reset(&self) {
        for count in &self.inner.counts {
            count.store(0, Ordering::Relaxed);
        }
        self.inner.check_time_ns.store(0, Ordering::Relaxed);
    }
}

impl Default for PollerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of poller metrics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSummary {
    pub sessions_started: u64,
    pub checks_issued: u64,
    pub transient_errors: u64,
    pub in_progress: u64,
    pub passed: u64,
    pub failed: u64,
    pub manual_review: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    pub stale_discarded: u64,
    /// Total time spent waiting on the checker
    pub check_time: Duration,
    /// Fraction of checks that errored (0.0 to 1.0)
    pub error_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record() {
        let metrics = PollerMetrics::new();

        metrics.record(MetricKind::CheckIssued);
        metrics.record(MetricKind::CheckIssued);

        assert_eq!(metrics.count(MetricKind::CheckIssued), 2);
        assert_eq!(metrics.count(MetricKind::Passed), 0);
    }

    #[test]
    fn test_every_kind_has_a_slot() {
        let metrics = PollerMetrics::new();
        metrics.record(MetricKind::StaleDiscarded);
        assert_eq!(metrics.count(MetricKind::StaleDiscarded), 1);
        assert_eq!(MetricKind::StaleDiscarded as usize, KIND_COUNT - 1);
    }

    #[test]
    fn test_check_latency() {
        let metrics = PollerMetrics::new();

        metrics.record_check_latency(Duration::from_millis(100));
        metrics.record_check_latency(Duration::from_millis(50));

        assert_eq!(metrics.check_time(), Duration::from_millis(150));
    }

    #[test]
    fn test_error_rate() {
        let metrics = PollerMetrics::new();
        assert_eq!(metrics.error_rate(), 0.0);

        for _ in 0..4 {
            metrics.record(MetricKind::CheckIssued);
        }
        metrics.record(MetricKind::TransientError);

        assert!((metrics.error_rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = PollerMetrics::new();
        let clone = metrics.clone();
        clone.record(MetricKind::SessionStarted);
        assert_eq!(metrics.count(MetricKind::SessionStarted), 1);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = PollerMetrics::new();

        metrics.record(MetricKind::Passed);
        metrics.record_check_latency(Duration::from_millis(10));

        metrics.reset();

        assert_eq!(metrics.count(MetricKind::Passed), 0);
        assert_eq!(metrics.check_time(), Duration::ZERO);
    }

    #[test]
    fn test_metrics_summary() {
        let metrics = PollerMetrics::new();

        metrics.record(MetricKind::SessionStarted);
        metrics.record(MetricKind::CheckIssued);
        metrics.record(MetricKind::InProgress);
        metrics.record(MetricKind::CheckIssued);
        metrics.record(MetricKind::ManualReview);

        let summary = metrics.summary();

        assert_eq!(summary.sessions_started, 1);
        assert_eq!(summary.checks_issued, 2);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.manual_review, 1);
        assert_eq!(summary.error_rate, 0.0);
    }
}
