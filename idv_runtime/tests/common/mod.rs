//! Common test utilities for poller integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use idv_core::{CheckError, StatusChecker, SubjectId, VerificationStatus};

/// One scripted answer of the [`TestChecker`].
#[derive(Clone, Copy, Debug)]
pub enum Reply {
    /// Return this status immediately.
    Status(VerificationStatus),
    /// Fail with a transport error.
    Error,
    /// Wait for [`TestChecker::release`], then return this status.
    Blocked(VerificationStatus),
}

/// A recorded call to the checker.
#[derive(Clone, Debug)]
pub struct Call {
    pub subject: String,
    pub at: Instant,
}

/// Scripted, call-recording status checker.
///
/// Replies are consumed in order; once the script runs out, `fallback` is
/// returned forever.
pub struct TestChecker {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<Call>>,
    gate: Notify,
}

impl TestChecker {
    pub fn new(script: impl IntoIterator<Item = Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
            gate: Notify::new(),
        })
    }

    /// Checker that answers `status` on every call.
    pub fn always(status: VerificationStatus) -> Arc<Self> {
        Self::new([], Reply::Status(status))
    }

    /// Checker whose every call fails with a transport error.
    pub fn always_error() -> Arc<Self> {
        Self::new([], Reply::Error)
    }

    /// Lets one blocked call complete.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StatusChecker for TestChecker {
    async fn check_status(&self, subject: &SubjectId) -> Result<VerificationStatus, CheckError> {
        self.calls.lock().unwrap().push(Call {
            subject: subject.to_string(),
            at: Instant::now(),
        });
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        match reply {
            Reply::Status(status) => Ok(status),
            Reply::Error => Err(CheckError::Transport("connection refused".to_string())),
            Reply::Blocked(status) => {
                self.gate.notified().await;
                Ok(status)
            }
        }
    }
}

/// Asserts two durations match within scheduler tolerance.
pub fn assert_close(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
