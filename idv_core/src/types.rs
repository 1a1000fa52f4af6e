//! Core types used across IDVKit.
//!
//! These model one identity-verification polling session: the status the
//! provider reports, the subject being verified, the session generation the
//! poller hands out, and the observable result/state of that session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CheckError, IdvError};

/// User-facing message for a session that ended in manual review.
pub const MANUAL_REVIEW_MESSAGE: &str = "Manual verification required. Please contact support.";

/// User-facing message for a session that ended in a verification failure.
pub const VERIFICATION_FAILED_MESSAGE: &str =
    "Identity verification failed. Please try again or contact support.";

/// User-facing message for a session that ran out of attempts.
pub const VERIFICATION_TIMEOUT_MESSAGE: &str =
    "Verification timeout. Please try again or contact support.";

/// Status reported by the external verification provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Verification still running; keep polling.
    InProgress,
    /// Verification succeeded.
    Pass,
    /// Verification failed.
    Fail,
    /// Verification needs human review. Treated like a failure.
    Manual,
}

impl VerificationStatus {
    /// Returns the provider's wire name for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Manual => "MANUAL",
        }
    }

    /// True for every status that ends a polling session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// Message shown to the user for terminal failure statuses.
    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            Self::Fail => Some(VERIFICATION_FAILED_MESSAGE),
            Self::Manual => Some(MANUAL_REVIEW_MESSAGE),
            Self::InProgress | Self::Pass => None,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            "MANUAL" => Ok(Self::Manual),
            other => Err(CheckError::UnrecognizedStatus(other.to_string())),
        }
    }
}

/// Opaque identifier of the verification instance being polled.
///
/// Guaranteed non-blank. The poller never inspects it beyond handing it to
/// the [`StatusChecker`](crate::checker::StatusChecker).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a SubjectId, rejecting empty or whitespace-only input.
    pub fn new(id: impl Into<String>) -> Result<Self, IdvError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(IdvError::InvalidSubject(id));
        }
        Ok(Self(id))
    }

    /// Returns the underlying string identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the SubjectId and returns the underlying string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = IdvError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for SubjectId {
    type Error = IdvError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

/// Generation number of a polling session.
///
/// Every `start_polling` call receives a fresh, strictly larger id. Work
/// tagged with an older id is stale and must not touch poller state.
///
/// `SessionId::default()` (`#0`) is never handed out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Returns the id following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Most recently observed outcome of a session.
///
/// `status` stays `None` until the first check resolves. `error` carries the
/// user-facing message for terminal failures and timeouts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub status: Option<VerificationStatus>,
    pub error: Option<String>,
}

impl PollResult {
    /// Result recorded for a status returned by the checker.
    pub fn from_status(status: VerificationStatus) -> Self {
        Self {
            status: Some(status),
            error: status.failure_message().map(str::to_string),
        }
    }

    /// Synthetic failure recorded when the attempt budget runs out.
    pub fn timed_out() -> Self {
        Self {
            status: Some(VerificationStatus::Fail),
            error: Some(VERIFICATION_TIMEOUT_MESSAGE.to_string()),
        }
    }

    /// True when the session ended in `PASS`.
    pub fn is_success(&self) -> bool {
        self.status == Some(VerificationStatus::Pass)
    }
}

/// Lifecycle state of the poller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollerState {
    /// No session.
    #[default]
    Idle,
    /// A check is scheduled and its delay is running.
    Scheduled,
    /// A check is in flight.
    Checking,
    /// Session ended with `PASS`.
    TerminatedSuccess,
    /// Session ended with `FAIL` or `MANUAL` from the provider.
    TerminatedFailure,
    /// Session ran out of attempts.
    TerminatedTimeout,
}

impl PollerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TerminatedSuccess | Self::TerminatedFailure | Self::TerminatedTimeout
        )
    }

    /// True while a check is pending or in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Checking)
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scheduled => "scheduled",
            Self::Checking => "checking",
            Self::TerminatedSuccess => "terminated (success)",
            Self::TerminatedFailure => "terminated (failure)",
            Self::TerminatedTimeout => "terminated (timeout)",
        };
        f.write_str(name)
    }
}

/// Observable view of the poller's current session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    /// Session the snapshot belongs to, `None` before the first start.
    pub session: Option<SessionId>,
    /// Subject being polled.
    pub subject: Option<SubjectId>,
    /// Number of attempts already made in this session.
    pub attempt_count: u32,
    /// Whether a check is pending or in flight.
    pub is_active: bool,
    pub state: PollerState,
    pub last_result: PollResult,
}

impl PollSnapshot {
    /// Fresh snapshot for a session that has just been scheduled.
    pub fn started(session: SessionId, subject: SubjectId) -> Self {
        Self {
            session: Some(session),
            subject: Some(subject),
            attempt_count: 0,
            is_active: true,
            state: PollerState::Scheduled,
            last_result: PollResult::default(),
        }
    }

    /// Moves the snapshot to `state`, keeping `is_active` consistent.
    pub fn transition(&mut self, state: PollerState) {
        self.state = state;
        self.is_active = state.is_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in [
            VerificationStatus::InProgress,
            VerificationStatus::Pass,
            VerificationStatus::Fail,
            VerificationStatus::Manual,
        ] {
            assert_eq!(status.as_str().parse::<VerificationStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_unknown_status_is_check_error() {
        let err = "pass".parse::<VerificationStatus>().unwrap_err();
        assert_eq!(err, CheckError::UnrecognizedStatus("pass".to_string()));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!VerificationStatus::InProgress.is_terminal());
        assert!(VerificationStatus::Pass.is_terminal());
        assert!(VerificationStatus::Fail.is_terminal());
        assert!(VerificationStatus::Manual.is_terminal());
    }

    #[test]
    fn test_poll_result_messages() {
        assert_eq!(PollResult::from_status(VerificationStatus::Pass).error, None);
        assert_eq!(
            PollResult::from_status(VerificationStatus::Manual).error.as_deref(),
            Some(MANUAL_REVIEW_MESSAGE)
        );
        assert_eq!(
            PollResult::from_status(VerificationStatus::Fail).error.as_deref(),
            Some(VERIFICATION_FAILED_MESSAGE)
        );

        let timeout = PollResult::timed_out();
        assert_eq!(timeout.status, Some(VerificationStatus::Fail));
        assert!(timeout.error.unwrap().starts_with("Verification timeout"));
    }

    #[test]
    fn test_subject_id_rejects_blank() {
        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("   ").is_err());
        assert_eq!(SubjectId::new("gbg-123").unwrap().as_str(), "gbg-123");

        let parsed: Result<SubjectId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_session_id_ordering() {
        let first = SessionId(1);
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "#2");
    }

    #[test]
    fn test_snapshot_transition_tracks_activity() {
        let mut snapshot =
            PollSnapshot::started(SessionId(1), SubjectId::new("subject").unwrap());
        assert!(snapshot.is_active);

        snapshot.transition(PollerState::Checking);
        assert!(snapshot.is_active);

        snapshot.transition(PollerState::TerminatedTimeout);
        assert!(!snapshot.is_active);
        assert!(snapshot.state.is_terminal());
    }
}
