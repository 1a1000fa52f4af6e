//! IDVKit agent layer - Command-line driver for verification polling.
//!
//! - [`script`]: a [`ScriptedChecker`] that replays canned provider answers
//! - [`cli`]: the `idv-agent` commands (`simulate`, `schedule`)

pub mod cli;
pub mod script;

pub use cli::{simulate, SimulateArgs, SimulationReport};
pub use script::{ScriptError, ScriptedChecker, Step};
