//! Bounded, cancellable verification polling.
//!
//! [`VerificationPoller`] repeatedly asks a [`StatusChecker`] for the status
//! of one subject, on the front-loaded [`PollSchedule`], until the provider
//! reports a terminal status, the attempt budget runs out, or the caller
//! stops polling.
//!
//! # Session model
//!
//! Each `start_polling` call creates a session with a fresh [`SessionId`] and
//! spawns one Tokio task that drives it. At most one session is current at a
//! time; starting a new one cancels the previous session's pending delay.
//! Checks within a session are strictly sequential.
//!
//! A check that was already in flight when its session was cancelled is not
//! interrupted. Its result is compared against the current session under the
//! session lock and dropped if stale, so a superseded session can never
//! overwrite a newer session's result.
//!
//! # Observation
//!
//! State is published through a `tokio::sync::watch` channel. Callers can
//! read the latest [`PollSnapshot`], [`subscribe`](VerificationPoller::subscribe)
//! to changes, or await [`wait_for_outcome`](VerificationPoller::wait_for_outcome).
//!
//! # Example
//!
//! ```no_run
//! use idv_core::{FnChecker, VerificationStatus};
//! use idv_runtime::VerificationPoller;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let checker = FnChecker::new(|_subject| async { Ok(VerificationStatus::Pass) });
//! let poller = VerificationPoller::new(checker);
//!
//! let outcome = poller.poll_to_completion("gbg-instance-42").await?;
//! assert!(outcome.unwrap().is_success());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use idv_core::{
    CheckError, IdvError, PollResult, PollSchedule, PollSnapshot, PollerConfig, PollerState,
    Result, SessionId, StatusChecker, SubjectId, VerificationStatus,
};

use crate::audit::{AuditLog, SessionEvent};
use crate::cancellation::{CancellationToken, CancellationTokenSource};
use crate::metrics::{MetricKind, PollerMetrics};

/// Drives identity-verification polling sessions.
///
/// Not `Clone`: dropping the poller cancels its current session. Wrap it in
/// an `Arc` to share it.
pub struct VerificationPoller<C> {
    shared: Arc<Shared<C>>,
}

/// State shared between the poller handle and its session tasks.
struct Shared<C> {
    checker: C,
    schedule: PollSchedule,
    state: watch::Sender<PollSnapshot>,
    active: Mutex<ActiveSlot>,
    metrics: PollerMetrics,
    audit: Mutex<AuditLog>,
}

/// The current session, if any, plus the last generation handed out.
#[derive(Default)]
struct ActiveSlot {
    last_issued: SessionId,
    session: Option<ActiveSession>,
}

struct ActiveSession {
    id: SessionId,
    cancel: CancellationTokenSource,
}

impl ActiveSlot {
    fn is_current(&self, session: SessionId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|active| active.id == session && !active.cancel.is_cancelled())
    }
}

/// What the session loop does after a result has been applied.
enum Flow {
    Continue,
    Stop,
}

impl<C: StatusChecker + 'static> VerificationPoller<C> {
    /// Creates a poller with the standard schedule.
    pub fn new(checker: C) -> Self {
        Self::with_schedule(checker, PollSchedule::new())
    }

    /// Creates a poller with a loaded configuration.
    pub fn with_config(checker: C, config: &PollerConfig) -> Self {
        Self::with_schedule(checker, config.schedule())
    }

    /// Creates a poller with a custom schedule.
    pub fn with_schedule(checker: C, schedule: PollSchedule) -> Self {
        let (state, _) = watch::channel(PollSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                checker,
                schedule,
                state,
                active: Mutex::new(ActiveSlot::default()),
                metrics: PollerMetrics::new(),
                audit: Mutex::new(AuditLog::new()),
            }),
        }
    }

    /// Starts polling `subject`, replacing any current session.
    ///
    /// The first check runs after the schedule's initial delay. This call
    /// never blocks; results arrive through the observation methods.
    ///
    /// # Errors
    ///
    /// - [`IdvError::InvalidSubject`] if `subject` is blank. The current
    ///   session, if any, is left untouched.
    /// - [`IdvError::NoRuntime`] if called outside a Tokio runtime.
    pub fn start_polling(&self, subject: impl Into<String>) -> Result<SessionId> {
        let subject = SubjectId::new(subject)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| IdvError::NoRuntime)?;

        let (session, token) = {
            let mut slot = self.shared.lock_active();
            if let Some(previous) = slot.session.take() {
                self.shared.cancel_session(previous);
            }

            let session = slot.last_issued.next();
            slot.last_issued = session;

            let source = CancellationTokenSource::new();
            let token = source.token();
            slot.session = Some(ActiveSession {
                id: session,
                cancel: source,
            });

            self.shared
                .state
                .send_replace(PollSnapshot::started(session, subject.clone()));
            (session, token)
        };

        self.shared.metrics.record(MetricKind::SessionStarted);
        self.shared.record_event(SessionEvent::SessionStarted {
            timestamp: Utc::now(),
            session,
            subject: subject.to_string(),
        });
        tracing::info!(%session, %subject, "Verification polling started");

        runtime.spawn(run_session(self.shared.clone(), session, subject, token));
        Ok(session)
    }

    /// Starts polling and waits for the session's terminal result.
    ///
    /// Returns `Ok(None)` if the session is stopped or superseded first.
    pub async fn poll_to_completion(&self, subject: impl Into<String>) -> Result<Option<PollResult>> {
        self.start_polling(subject)?;
        Ok(self.wait_for_outcome().await)
    }
}

impl<C> VerificationPoller<C> {
    /// Stops the current session and returns the poller to `Idle`.
    ///
    /// Idempotent. A check already in flight finishes, but its result is
    /// discarded. The last result stays readable.
    pub fn stop_polling(&self) {
        let mut slot = self.shared.lock_active();
        if let Some(session) = slot.session.take() {
            self.shared.cancel_session(session);
        }
        self.shared.state.send_if_modified(|snapshot| {
            if snapshot.state == PollerState::Idle {
                return false;
            }
            snapshot.transition(PollerState::Idle);
            true
        });
    }

    /// Waits until the session current at call time reaches a terminal state.
    ///
    /// Returns `None` if there is no session, or if it is stopped or
    /// superseded before finishing. Resolves immediately for a session that
    /// has already finished.
    pub async fn wait_for_outcome(&self) -> Option<PollResult> {
        let mut rx = self.shared.state.subscribe();
        let session = rx.borrow_and_update().session?;
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.session != Some(session) || snapshot.state == PollerState::Idle {
                    return None;
                }
                if snapshot.state.is_terminal() {
                    return Some(snapshot.last_result.clone());
                }
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Returns a receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.shared.state.subscribe()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> PollSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Most recently observed result of the current or last session.
    pub fn last_result(&self) -> PollResult {
        self.shared.state.borrow().last_result.clone()
    }

    /// Whether a check is pending or in flight.
    pub fn is_active(&self) -> bool {
        self.shared.state.borrow().is_active
    }

    pub fn state(&self) -> PollerState {
        self.shared.state.borrow().state
    }

    /// Number of checks issued in the current or last session.
    pub fn attempt_count(&self) -> u32 {
        self.shared.state.borrow().attempt_count
    }

    /// Id of the session still in progress, if any.
    pub fn current_session(&self) -> Option<SessionId> {
        self.shared.lock_active().session.as_ref().map(|active| active.id)
    }

    pub fn schedule(&self) -> &PollSchedule {
        &self.shared.schedule
    }

    pub fn metrics(&self) -> &PollerMetrics {
        &self.shared.metrics
    }

    /// Returns a replay of the retained audit events.
    pub fn audit_events(&self) -> Vec<SessionEvent> {
        self.shared.lock_audit().replay()
    }

    /// Returns a copy of the audit log, e.g. for persistence.
    pub fn audit_log(&self) -> AuditLog {
        self.shared.lock_audit().clone()
    }
}

impl<C> Drop for VerificationPoller<C> {
    fn drop(&mut self) {
        // Session tasks hold their own Arc; cancel so they exit instead of
        // polling for a caller that is gone.
        self.stop_polling();
    }
}

impl<C> std::fmt::Debug for VerificationPoller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationPoller")
            .field("schedule", &self.shared.schedule)
            .field("snapshot", &*self.shared.state.borrow())
            .finish()
    }
}

impl<C> Shared<C> {
    fn lock_active(&self) -> MutexGuard<'_, ActiveSlot> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_audit(&self) -> MutexGuard<'_, AuditLog> {
        self.audit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_event(&self, event: SessionEvent) {
        self.lock_audit().record(event);
    }

    /// Cancels a session that has just been taken out of the active slot.
    fn cancel_session(&self, session: ActiveSession) {
        if !session.cancel.cancel() {
            return;
        }
        let attempts = self.state.borrow().attempt_count;
        self.metrics.record(MetricKind::Cancelled);
        self.record_event(SessionEvent::SessionCancelled {
            timestamp: Utc::now(),
            session: session.id,
            attempts,
        });
        tracing::info!(session = %session.id, attempts, "Verification polling cancelled");
    }

    /// Marks `attempt` as in flight. Returns false if the session is stale.
    fn begin_check(&self, session: SessionId, attempt: u32) -> bool {
        let slot = self.lock_active();
        if !slot.is_current(session) {
            return false;
        }
        self.metrics.record(MetricKind::CheckIssued);
        self.record_event(SessionEvent::CheckIssued {
            timestamp: Utc::now(),
            session,
            attempt,
        });
        self.state.send_modify(|snapshot| {
            snapshot.attempt_count = attempt;
            snapshot.transition(PollerState::Checking);
        });
        tracing::debug!(%session, attempt, "Checking verification status");
        true
    }

    /// Applies the result of one check to the current session.
    fn apply_outcome(
        &self,
        session: SessionId,
        attempt: u32,
        outcome: std::result::Result<VerificationStatus, CheckError>,
    ) -> Flow {
        let mut slot = self.lock_active();
        if !slot.is_current(session) {
            self.metrics.record(MetricKind::StaleDiscarded);
            self.record_event(SessionEvent::StaleResultDiscarded {
                timestamp: Utc::now(),
                session,
                attempt,
            });
            tracing::debug!(%session, attempt, "Discarded result of a stale session");
            return Flow::Stop;
        }

        match outcome {
            Ok(VerificationStatus::InProgress) => {
                self.metrics.record(MetricKind::InProgress);
                self.record_event(SessionEvent::StatusObserved {
                    timestamp: Utc::now(),
                    session,
                    attempt,
                    status: VerificationStatus::InProgress,
                });
                self.state.send_modify(|snapshot| {
                    snapshot.last_result = PollResult::from_status(VerificationStatus::InProgress);
                    snapshot.transition(PollerState::Scheduled);
                });
                tracing::debug!(%session, attempt, "Verification still in progress");
                Flow::Continue
            }
            Ok(status) => {
                let (kind, state) = match status {
                    VerificationStatus::Pass => (MetricKind::Passed, PollerState::TerminatedSuccess),
                    VerificationStatus::Manual => {
                        (MetricKind::ManualReview, PollerState::TerminatedFailure)
                    }
                    _ => (MetricKind::Failed, PollerState::TerminatedFailure),
                };
                let result = PollResult::from_status(status);

                slot.session = None;
                self.metrics.record(kind);
                self.record_event(SessionEvent::StatusObserved {
                    timestamp: Utc::now(),
                    session,
                    attempt,
                    status,
                });
                self.record_event(SessionEvent::SessionCompleted {
                    timestamp: Utc::now(),
                    session,
                    attempts: attempt,
                    result: result.clone(),
                });
                self.state.send_modify(|snapshot| {
                    snapshot.last_result = result;
                    snapshot.transition(state);
                });
                tracing::info!(%session, attempt, %status, "Verification finished");
                Flow::Stop
            }
            // Rescheduled like IN_PROGRESS, but `last_result` keeps the last
            // status the provider actually reported.
            Err(error) => {
                self.metrics.record(MetricKind::TransientError);
                self.record_event(SessionEvent::CheckFailed {
                    timestamp: Utc::now(),
                    session,
                    attempt,
                    error: error.to_string(),
                });
                self.state
                    .send_modify(|snapshot| snapshot.transition(PollerState::Scheduled));
                tracing::warn!(%session, attempt, %error, "Status check failed, will retry");
                Flow::Continue
            }
        }
    }

    /// Ends the session after the attempt budget ran out.
    fn finish_timeout(&self, session: SessionId, attempts: u32) {
        let mut slot = self.lock_active();
        if !slot.is_current(session) {
            return;
        }
        slot.session = None;
        self.metrics.record(MetricKind::TimedOut);
        self.record_event(SessionEvent::SessionTimedOut {
            timestamp: Utc::now(),
            session,
            attempts,
        });
        self.state.send_modify(|snapshot| {
            snapshot.last_result = PollResult::timed_out();
            snapshot.transition(PollerState::TerminatedTimeout);
        });
        tracing::warn!(%session, attempts, "Verification polling timed out");
    }
}

/// Session loop: wait, check, apply, repeat.
async fn run_session<C: StatusChecker>(
    shared: Arc<Shared<C>>,
    session: SessionId,
    subject: SubjectId,
    token: CancellationToken,
) {
    let schedule = shared.schedule;
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(schedule.delay_after(attempt)) => {}
        }

        attempt = attempt.saturating_add(1);
        if schedule.is_exhausted(attempt) {
            shared.finish_timeout(session, attempt - 1);
            return;
        }

        if !shared.begin_check(session, attempt) {
            return;
        }

        let started = Instant::now();
        let outcome = match schedule.check_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, shared.checker.check_status(&subject)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CheckError::Timeout(limit)),
                }
            }
            None => shared.checker.check_status(&subject).await,
        };
        shared.metrics.record_check_latency(started.elapsed());

        match shared.apply_outcome(session, attempt, outcome) {
            Flow::Continue => continue,
            Flow::Stop => return,
        }
    }
}
