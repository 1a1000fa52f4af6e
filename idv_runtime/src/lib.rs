//! IDVKit runtime layer - Bounded verification polling.
//!
//! This crate runs identity-verification polling sessions on Tokio:
//!
//! - [`poller`]: the [`VerificationPoller`] session loop
//! - [`cancellation`]: per-session cancellation tokens
//! - [`audit`]: session audit trail with JSON persistence
//! - [`metrics`]: counters for checks, errors and outcomes
//!
//! The status model, checker capability and schedule come from `idv_core`.

pub mod audit;
pub mod cancellation;
pub mod metrics;
pub mod poller;

pub use audit::{AuditError, AuditLog, SessionEvent};
pub use cancellation::{CancellationToken, CancellationTokenSource};
pub use metrics::{MetricKind, MetricsSummary, PollerMetrics};
pub use poller::VerificationPoller;

/// Version of the runtime crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
