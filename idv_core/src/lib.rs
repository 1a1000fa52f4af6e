//! IDVKit - Identity-verification polling toolkit
//!
//! This crate provides the core model shared by the runtime and agent layers.
//!
//! # Overview
//!
//! An identity-verification provider answers asynchronously: the client asks
//! for a verdict repeatedly until the provider reports a terminal status. This
//! crate defines what is being asked and how often:
//!
//! - **Types**: statuses, subjects, session generations and results
//! - **Checker**: the [`StatusChecker`] capability callers plug their transport into
//! - **Schedule**: the front-loaded delay schedule and attempt budget
//! - **Config**: YAML configuration for the schedule
//!
//! The polling loop itself lives in the `idv_runtime` crate.
//!
//! # Modules
//!
//! - [`types`]: Core types used across the toolkit
//! - [`error`]: Error types for all operations
//! - [`checker`]: Status checker capability
//! - [`schedule`]: Delay schedule and attempt budget
//! - [`config`]: YAML configuration

pub mod error;
pub mod types;

pub mod checker;
pub mod config;
pub mod schedule;

// Re-export commonly used types
pub use checker::{FnChecker, StatusChecker, StatusResponse};
pub use config::PollerConfig;
pub use error::{CheckError, IdvError, Result};
pub use schedule::{PollSchedule, MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT};
pub use types::{
    PollResult, PollSnapshot, PollerState, SessionId, SubjectId, VerificationStatus,
    MANUAL_REVIEW_MESSAGE, VERIFICATION_FAILED_MESSAGE, VERIFICATION_TIMEOUT_MESSAGE,
};
