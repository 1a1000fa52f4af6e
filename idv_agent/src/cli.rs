//! Command-line interface for the IDVKit agent.
//!
//! Runs simulated verification sessions against a scripted provider and
//! shows the effective polling schedule.
//!
//! # Examples
//!
//! Simulate a provider that needs two checks before passing, at 10x speed:
//!
//! ```bash
//! $ idv-agent simulate --subject gbg-42 --script IN_PROGRESS,PASS --time-scale 0.1
//! ```
//!
//! Show the schedule from a config file:
//!
//! ```bash
//! $ idv-agent schedule --config poller.yaml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use idv_core::{PollResult, PollSchedule, PollerConfig, SessionId};
use idv_runtime::{MetricsSummary, VerificationPoller};

use crate::script::ScriptedChecker;

/// CLI arguments for the agent.
#[derive(Parser, Debug)]
#[command(name = "idv-agent", version, about = "Identity-verification polling agent")]
pub struct Cli {
    #[command(subcommand)]
    action: Action,
}

/// Agent actions available via CLI.
#[derive(Subcommand, Debug)]
enum Action {
    /// Run one polling session against a scripted provider
    Simulate(SimulateArgs),

    /// Print the delay before each attempt and the worst-case wait
    Schedule {
        /// YAML poller configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Arguments of `idv-agent simulate`.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Verification instance id to poll
    #[arg(short, long)]
    pub subject: String,

    /// Comma-separated provider answers: IN_PROGRESS, PASS, FAIL, MANUAL, error
    #[arg(long, default_value = "IN_PROGRESS,PASS")]
    pub script: String,

    /// YAML poller configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Multiplier applied to every delay (0.1 runs ten times faster)
    #[arg(long, default_value_t = 1.0)]
    pub time_scale: f64,

    /// Directory to write the session audit log to
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,
}

/// Result of one simulated session.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub session: SessionId,
    pub outcome: PollResult,
    pub attempts: u32,
    pub checks_answered: usize,
    pub metrics: MetricsSummary,
    pub audit_path: Option<PathBuf>,
}

impl SimulationReport {
    /// True if the session ended in `PASS`.
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Loads the poller configuration, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PollerConfig> {
    match path {
        Some(path) => PollerConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load poller config from {}", path.display())),
        None => Ok(PollerConfig::default()),
    }
}

/// Runs one polling session against a [`ScriptedChecker`].
pub async fn simulate(args: &SimulateArgs) -> anyhow::Result<SimulationReport> {
    anyhow::ensure!(
        args.time_scale.is_finite() && args.time_scale >= 0.0,
        "Time scale must be a non-negative number, got {}",
        args.time_scale
    );

    let config = load_config(args.config.as_deref())?;
    let schedule = config.schedule().scaled(args.time_scale)?;
    let checker = Arc::new(ScriptedChecker::parse(&args.script)?);
    let poller = VerificationPoller::with_schedule(checker.clone(), schedule);

    let session = poller.start_polling(args.subject.as_str())?;
    tracing::info!(%session, time_scale = args.time_scale, "Simulation started");

    let outcome = poller
        .wait_for_outcome()
        .await
        .context("Session ended without an outcome")?;

    let audit_path = match &args.audit_dir {
        Some(dir) => Some(poller.audit_log().persist_to(dir).await?),
        None => None,
    };

    Ok(SimulationReport {
        session,
        outcome,
        attempts: poller.attempt_count(),
        checks_answered: checker.calls(),
        metrics: poller.metrics().summary(),
        audit_path,
    })
}

/// Renders the schedule as one line per attempt plus the worst case.
pub fn schedule_lines(schedule: &PollSchedule) -> Vec<String> {
    let mut lines: Vec<String> = (1..=schedule.max_attempts)
        .map(|attempt| {
            format!(
                "attempt {:>2}: +{:>6} ms (at {:>6} ms)",
                attempt,
                schedule.delay_after(attempt - 1).as_millis(),
                schedule.elapsed_before(attempt).as_millis()
            )
        })
        .collect();
    if let Some(limit) = schedule.check_timeout {
        lines.push(format!("per-check timeout: {} ms", limit.as_millis()));
    }
    lines.push(format!(
        "timeout reported at {} ms",
        schedule.worst_case().as_millis()
    ));
    lines
}

fn print_report(report: &SimulationReport) -> anyhow::Result<()> {
    let status = report
        .outcome
        .status
        .map(|status| status.as_str())
        .unwrap_or("NONE");

    if report.succeeded() {
        println!("✅ Verification passed");
    } else {
        println!("❌ Verification did not pass");
    }
    println!("   Session: {}", report.session);
    println!("   Status: {}", status);
    if let Some(message) = &report.outcome.error {
        println!("   Message: {}", message);
    }
    println!("   Attempts: {}", report.attempts);
    if let Some(path) = &report.audit_path {
        println!("   Audit log: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&report.metrics)?);
    Ok(())
}

/// Entry point for the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.action {
        Action::Simulate(args) => {
            let report = simulate(&args).await?;
            print_report(&report)?;
            if !report.succeeded() {
                std::process::exit(1);
            }
            Ok(())
        }

        Action::Schedule { config } => {
            let config = load_config(config.as_deref())?;
            for line in schedule_lines(&config.schedule()) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_args() {
        let cli = Cli::try_parse_from([
            "idv-agent",
            "simulate",
            "--subject",
            "gbg-42",
            "--script",
            "IN_PROGRESS,FAIL",
            "--time-scale",
            "0.5",
        ])
        .unwrap();

        match cli.action {
            Action::Simulate(args) => {
                assert_eq!(args.subject, "gbg-42");
                assert_eq!(args.script, "IN_PROGRESS,FAIL");
                assert_eq!(args.time_scale, 0.5);
                assert!(args.config.is_none());
                assert!(args.audit_dir.is_none());
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_simulate_requires_subject() {
        assert!(Cli::try_parse_from(["idv-agent", "simulate"]).is_err());
    }

    #[test]
    fn test_schedule_lines_default() {
        let lines = schedule_lines(&PollSchedule::new());
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "attempt  1: +  5000 ms (at   5000 ms)");
        assert_eq!(lines[1], "attempt  2: +  3000 ms (at   8000 ms)");
        assert_eq!(lines[14], "attempt 15: +  2000 ms (at  34000 ms)");
        assert_eq!(lines[15], "timeout reported at 36000 ms");
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), PollerConfig::default());
    }

    #[test]
    fn test_load_config_missing_file_has_context() {
        let err = load_config(Some(Path::new("/nonexistent/poller.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/poller.yaml"));
    }
}
