//! # CLI entry point
//!
//! Thin wrapper around [`csp_core`]: parses arguments, runs the clock-sync
//! check, loads a weekend-staged candidate batch from JSON, wires a broker
//! and a persistence port, and drives one [`TwoTierScheduler`] run to
//! completion. No pipeline logic lives here — every decision is made inside
//! `csp-core`; this binary only assembles the pieces and reports the result.

use clap::{Parser, ValueEnum};
use csp_broker::mock::MockBroker;
use csp_core::candidate::{Candidate, StagedFacts};
use csp_core::persistence::InMemoryPersistence;
use csp_core::scheduler::{AutomationMode, UserCommand, UserInteraction};
use csp_core::{Config, ExecutionReport, TwoTierScheduler};
use csp_risk::ClockSyncCheck;
use prettytable::{row, Table};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit codes per the external-interfaces contract: 0 normal, 1 pre-flight
/// failure, 2 user abort, 3 broker connection failure.
const EXIT_OK: u8 = 0;
const EXIT_PREFLIGHT_FAILURE: u8 = 1;
const EXIT_USER_ABORT: u8 = 2;
const EXIT_BROKER_CONNECTION: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AutomationModeArg {
    Hybrid,
    Supervised,
    Autonomous,
}

impl From<AutomationModeArg> for AutomationMode {
    fn from(value: AutomationModeArg) -> Self {
        match value {
            AutomationModeArg::Hybrid => AutomationMode::Hybrid,
            AutomationModeArg::Supervised => AutomationMode::Supervised,
            AutomationModeArg::Autonomous => AutomationMode::Autonomous,
        }
    }
}

/// Weekend-to-Monday cash-secured put execution pipeline.
#[derive(Debug, Parser)]
#[command(name = "csp", version, about)]
struct Args {
    /// Path to a JSON array of weekend-staged candidates.
    #[arg(long, value_name = "FILE")]
    candidates: PathBuf,

    /// How much of the run requires a human in the loop.
    #[arg(long, value_enum, default_value_t = AutomationModeArg::Hybrid)]
    automation_mode: AutomationModeArg,

    /// Run validation and strike selection but skip order submission
    /// entirely.
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON logs instead of human-readable ones.
    #[arg(long)]
    json_logs: bool,

    /// Skip the NTP clock-sync check. Only for environments with no
    /// outbound network access (e.g. CI); never set this in production.
    #[arg(long)]
    skip_clock_sync: bool,
}

/// Reads one line from stdin and maps it to a [`UserCommand`], blocking the
/// current thread. The hybrid gate only ever calls this from within
/// `tokio::task::spawn_blocking`-free async code because stdin on a CLI is
/// always attended interactively; a misread or EOF is treated as an abort
/// rather than silently defaulting to execution.
struct StdinInteraction;

#[async_trait::async_trait]
impl UserInteraction for StdinInteraction {
    async fn prompt_for_command(&self, summary: &str) -> UserCommand {
        println!("{summary}");
        print!("[e]xecute / [w]ait / [a]bort? ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return UserCommand::Abort;
        }
        match line.trim().to_lowercase().as_str() {
            "e" | "execute" => UserCommand::Execute,
            "w" | "wait" => UserCommand::Wait,
            _ => UserCommand::Abort,
        }
    }
}

fn load_candidates(path: &PathBuf) -> Result<Vec<Candidate>, String> {
    let raw = std::fs::read_to_string(path).map_err(|err| format!("reading {}: {err}", path.display()))?;
    let staged: Vec<StagedFacts> = serde_json::from_str(&raw).map_err(|err| format!("parsing {}: {err}", path.display()))?;
    Ok(staged
        .into_iter()
        .enumerate()
        .map(|(index, facts)| Candidate::new(index as u64 + 1, facts))
        .collect())
}

fn print_report(report: &ExecutionReport) {
    println!(
        "staged={} validated={} confirmed={} submitted={} filled={} working={} failed={} skipped={}",
        report.staged,
        report.validated,
        report.confirmed,
        report.submitted.len(),
        report.filled.len(),
        report.working.len(),
        report.failed.len(),
        report.skipped.len(),
    );
    println!("total realized premium: {}", report.total_realized_premium());

    let mut table = Table::new();
    table.add_row(row!["symbol", "strike", "expiration", "contracts", "fill price", "status"]);
    for summary in &report.filled {
        table.add_row(row![
            summary.symbol,
            summary.strike,
            summary.expiration,
            summary.contracts_filled,
            summary.fill_price.map(|p| p.to_string()).unwrap_or_default(),
            "filled",
        ]);
    }
    for summary in &report.working {
        table.add_row(row![summary.symbol, summary.strike, summary.expiration, summary.contracts, "", "working"]);
    }
    for summary in &report.failed {
        let reason = summary.reason.clone().unwrap_or_else(|| "failed".to_string());
        table.add_row(row![summary.symbol, summary.strike, summary.expiration, summary.contracts, "", reason]);
    }
    for summary in &report.skipped {
        let reason = summary.reason.clone().unwrap_or_else(|| "skipped".to_string());
        table.add_row(row![summary.symbol, summary.strike, summary.expiration, summary.contracts, "", reason]);
    }
    table.printstd();

    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.json_logs {
        csp_core::logging::init_json_logging();
    } else {
        csp_core::logging::init_logging();
    }

    if !args.skip_clock_sync {
        let config = Config::from_env();
        let check = ClockSyncCheck {
            threshold_ms: config.clock_sync_threshold_ms as f64,
            ..ClockSyncCheck::default()
        };
        match check.verify().await {
            Ok(result) if result.is_synced => {
                tracing::info!(drift_ms = result.drift_ms, "clock sync confirmed");
            }
            Ok(result) => {
                tracing::error!(drift_ms = result.drift_ms, threshold_ms = result.threshold_ms, "clock drift exceeds threshold, aborting");
                return ExitCode::from(EXIT_PREFLIGHT_FAILURE);
            }
            Err(err) => {
                tracing::error!(%err, "clock sync check failed, aborting");
                return ExitCode::from(EXIT_PREFLIGHT_FAILURE);
            }
        }
    }

    let candidates = match load_candidates(&args.candidates) {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::error!(%err, "failed to load candidates");
            return ExitCode::from(EXIT_PREFLIGHT_FAILURE);
        }
    };
    if candidates.is_empty() {
        tracing::error!("no candidates staged, nothing to do");
        return ExitCode::from(EXIT_PREFLIGHT_FAILURE);
    }

    let config = Config::from_env();
    let automation_mode: AutomationMode = args.automation_mode.into();

    // No live broker client exists in this workspace: the broker port is
    // consumed as an interface only, so the CLI drives it against the same
    // in-memory double the pipeline's own tests use. A real deployment
    // supplies its own `BrokerPort` implementation at this seam.
    let broker = MockBroker::new();
    broker.set_market_data_healthy(true);
    let persistence = InMemoryPersistence::new();

    let mut scheduler = TwoTierScheduler::new(&broker, &persistence, config, automation_mode);
    if automation_mode == AutomationMode::Hybrid {
        scheduler = scheduler.with_interaction(Box::new(StdinInteraction));
    }

    let report = scheduler.run_monday_morning(candidates, args.dry_run).await;
    print_report(&report);

    if report.warnings.iter().any(|w| w.contains("pre-flight validation failed")) {
        return ExitCode::from(EXIT_PREFLIGHT_FAILURE);
    }
    if report
        .warnings
        .iter()
        .any(|w| w.contains("ABORTED by user") || w.contains("aborted while waiting"))
    {
        return ExitCode::from(EXIT_USER_ABORT);
    }
    if report.warnings.iter().any(|w| w.contains("broker connection")) {
        return ExitCode::from(EXIT_BROKER_CONNECTION);
    }
    ExitCode::from(EXIT_OK)
}
