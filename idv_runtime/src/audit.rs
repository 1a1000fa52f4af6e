//! Session audit trail with serde-serializable events and JSON persistence.
//!
//! Every transition of a polling session is recorded with a UTC timestamp:
//! - `SessionStarted`: a new session was scheduled
//! - `CheckIssued` / `StatusObserved` / `CheckFailed`: one attempt
//! - `SessionCompleted` / `SessionTimedOut` / `SessionCancelled`: the end
//! - `StaleResultDiscarded`: a late result from a superseded session
//!
//! The log keeps the most recent events in memory (bounded) and can write
//! them to `{dir}/{log_id}.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use idv_core::{PollResult, SessionId, VerificationStatus};

/// Default number of events retained in memory.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// Error types for audit operations.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Failed to serialize audit events
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Failed to write audit file
    #[error("Write failed: {0}")]
    WriteFailed(#[from] std::io::Error),

    /// Failed to create audit directory
    #[error("Directory creation failed: {0}")]
    DirectoryFailed(String),
}

/// Audit event for session transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionStarted {
        timestamp: DateTime<Utc>,
        session: SessionId,
        subject: String,
    },
    CheckIssued {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempt: u32,
    },
    StatusObserved {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempt: u32,
        status: VerificationStatus,
    },
    /// The check errored; the session keeps going
    CheckFailed {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempt: u32,
        error: String,
    },
    /// Provider returned a terminal status
    SessionCompleted {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempts: u32,
        result: PollResult,
    },
    SessionTimedOut {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempts: u32,
    },
    /// Stopped by the caller or superseded by a new session
    SessionCancelled {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempts: u32,
    },
    StaleResultDiscarded {
        timestamp: DateTime<Utc>,
        session: SessionId,
        attempt: u32,
    },
}

impl SessionEvent {
    /// Session the event belongs to.
    pub fn session(&self) -> SessionId {
        match self {
            Self::SessionStarted { session, .. }
            | Self::CheckIssued { session, .. }
            | Self::StatusObserved { session, .. }
            | Self::CheckFailed { session, .. }
            | Self::SessionCompleted { session, .. }
            | Self::SessionTimedOut { session, .. }
            | Self::SessionCancelled { session, .. }
            | Self::StaleResultDiscarded { session, .. } => *session,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionStarted { timestamp, .. }
            | Self::CheckIssued { timestamp, .. }
            | Self::StatusObserved { timestamp, .. }
            | Self::CheckFailed { timestamp, .. }
            | Self::SessionCompleted { timestamp, .. }
            | Self::SessionTimedOut { timestamp, .. }
            | Self::SessionCancelled { timestamp, .. }
            | Self::StaleResultDiscarded { timestamp, .. } => *timestamp,
        }
    }

    /// True for events that end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionCompleted { .. } | Self::SessionTimedOut { .. } | Self::SessionCancelled { .. }
        )
    }
}

/// Audit log for recording and persisting session transitions.
#[derive(Clone, Debug)]
pub struct AuditLog {
    /// Unique log identifier, used as the file name on persistence
    log_id: Uuid,
    /// Most recent events, oldest first
    events: VecDeque<SessionEvent>,
    /// Maximum number of retained events
    capacity: usize,
}

impl AuditLog {
    /// Creates a new audit log with a fresh id and the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates a new audit log retaining at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Records an event, evicting the oldest one when full.
    pub fn record(&mut self, event: SessionEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Returns a replay of all retained events.
    pub fn replay(&self) -> Vec<SessionEvent> {
        self.events.iter().cloned().collect()
    }

    /// Returns the retained events of one session.
    pub fn events_for(&self, session: SessionId) -> Vec<SessionEvent> {
        self.events
            .iter()
            .filter(|event| event.session() == session)
            .cloned()
            .collect()
    }

    pub fn log_id(&self) -> Uuid {
        self.log_id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Writes all retained events as formatted JSON to `{dir}/{log_id}.json`.
    ///
    /// Returns the path of the written file.
    pub async fn persist_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AuditError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AuditError::DirectoryFailed(e.to_string()))?;

        let json = serde_json::to_string_pretty(&self.events)?;

        let path = dir.join(format!("{}.json", self.log_id));
        tokio::fs::write(&path, json).await?;

        tracing::debug!(path = %path.display(), events = self.events.len(), "Persisted audit log");
        Ok(path)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
