//! Scripted status checker for simulations.
//!
//! A script is a comma-separated list of steps, consumed one per check:
//!
//! ```text
//! IN_PROGRESS,error,IN_PROGRESS,PASS
//! ```
//!
//! `IN_PROGRESS`, `PASS`, `FAIL` and `MANUAL` are returned as statuses,
//! `error` simulates a transport failure, and any other token is handed back
//! as an unrecognized wire status. Once the script runs out, its last step
//! repeats.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use idv_core::{CheckError, StatusChecker, StatusResponse, SubjectId, VerificationStatus};

/// Error types for script parsing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Script has no steps")]
    Empty,

    #[error("Script step {0} is blank")]
    BlankStep(usize),
}

/// One scripted provider answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Status(VerificationStatus),
    /// Transport failure
    Error,
    /// Raw status string outside the known vocabulary
    Raw(String),
}

impl Step {
    fn answer(&self) -> Result<VerificationStatus, CheckError> {
        match self {
            Self::Status(status) => Ok(*status),
            Self::Error => Err(CheckError::Transport("simulated transport failure".to_string())),
            Self::Raw(raw) => StatusResponse {
                status: raw.clone(),
            }
            .into_status(),
        }
    }
}

impl FromStr for Step {
    type Err = ScriptError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("error") {
            return Ok(Self::Error);
        }
        Ok(match token.parse::<VerificationStatus>() {
            Ok(status) => Self::Status(status),
            Err(_) => Self::Raw(token.to_string()),
        })
    }
}

/// Status checker that replays a fixed script.
#[derive(Debug)]
pub struct ScriptedChecker {
    steps: Vec<Step>,
    cursor: AtomicUsize,
}

impl ScriptedChecker {
    /// Creates a checker from already parsed steps.
    pub fn new(steps: Vec<Step>) -> Result<Self, ScriptError> {
        if steps.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(Self {
            steps,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Parses a comma-separated script.
    pub fn parse(script: &str) -> Result<Self, ScriptError> {
        if script.trim().is_empty() {
            return Err(ScriptError::Empty);
        }
        let steps = script
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                if token.trim().is_empty() {
                    Err(ScriptError::BlankStep(index + 1))
                } else {
                    token.parse()
                }
            })
            .collect::<Result<Vec<Step>, _>>()?;
        Self::new(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of checks answered so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> &Step {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let last = self.steps.len() - 1;
        &self.steps[index.min(last)]
    }
}

#[async_trait]
impl StatusChecker for ScriptedChecker {
    async fn check_status(&self, subject: &SubjectId) -> Result<VerificationStatus, CheckError> {
        let step = self.next_step();
        tracing::debug!(%subject, ?step, "Scripted status check");
        step.answer()
    }
}
