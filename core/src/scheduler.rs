//! # Two-Tier Scheduler
//!
//! The top-level state machine: gates Stage 1, strike selection / Stage 2,
//! Tier 1 submission plus fill monitoring, the Tier 2 conditional retry
//! window, and final reconciliation, driving persistence at every phase
//! boundary. Three automation modes control how much of the run requires a
//! human in the loop.

use crate::candidate::{Candidate, CandidateState};
use crate::config::Config;
use crate::executor::RapidFireExecutor;
use crate::fill_manager;
use crate::market_conditions;
use crate::pending_order::PendingOrder;
use crate::persistence::PersistencePort;
use crate::placer::MarketSession;
use crate::reconciler;
use crate::report::{ExecutionReport, ExecutionSummary};
use crate::reporter::{ConsoleReporter, Reporter};
use crate::shutdown::AsyncShutdown;
use crate::strike_selector;
use crate::trade::Trade;
use crate::validator;
use chrono::{DateTime, NaiveTime, Utc};
use csp_broker::{BrokerPort, OrderId, OrderStatus, Quote, QualifiedContract};
use csp_risk::RiskCheck;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationMode {
    /// Automated prep, manual trigger: after validation and strike
    /// selection the scheduler prints a summary and blocks on a user
    /// command.
    Hybrid,
    /// Automated execution; a failed pre-flight check aborts the run. The
    /// report is presented for review afterward.
    Supervised,
    /// Fully automated, no human in the loop at any point.
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Execute,
    Wait,
    Abort,
}

/// Abstracts the hybrid-mode prompt so tests can script a response instead
/// of reading a terminal.
#[async_trait::async_trait]
pub trait UserInteraction: Send + Sync {
    async fn prompt_for_command(&self, summary: &str) -> UserCommand;
}

/// Never actually prompted — used by Supervised/Autonomous runs, which never
/// call into a [`UserInteraction`].
#[derive(Debug, Default)]
pub struct AutoExecute;

#[async_trait::async_trait]
impl UserInteraction for AutoExecute {
    async fn prompt_for_command(&self, _summary: &str) -> UserCommand {
        UserCommand::Execute
    }
}

/// Abstracts wall-clock time so the phase gates can be driven by a fixed
/// clock in tests instead of real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, for deterministic tests. Every gate
/// target is therefore already in the past and `wait_until_time` returns
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Cooperative cancellation flag checked between wait chunks. Set from
/// outside the scheduler (e.g. a Ctrl-C handler) to unwind a wall-clock
/// wait promptly instead of sleeping it out.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returned when a wall-clock wait or the hybrid-mode prompt is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

const WAIT_CHUNK: Duration = Duration::from_secs(5);
const HYBRID_WAIT_RETRY_DELAY: Duration = Duration::from_secs(300);

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Sleeps in `WAIT_CHUNK`-sized pieces until `clock.now()` reaches `target`,
/// checking `abort` between each chunk. A target already in the past (or
/// unparseable) returns immediately.
async fn wait_until_time(target: &str, clock: &dyn Clock, abort: &AbortFlag) -> Result<(), Aborted> {
    let Some(target_time) = parse_hhmm(target) else {
        return Ok(());
    };
    loop {
        if abort.is_set() {
            return Err(Aborted);
        }
        let now = clock.now();
        if now.time() >= target_time {
            return Ok(());
        }
        let remaining = target_time - now.time();
        let remaining_std = remaining.to_std().unwrap_or(WAIT_CHUNK);
        tokio::time::sleep(remaining_std.min(WAIT_CHUNK)).await;
    }
}

pub struct TwoTierScheduler<'a> {
    broker: &'a dyn BrokerPort,
    persistence: &'a dyn PersistencePort,
    config: Config,
    automation_mode: AutomationMode,
    clock: Box<dyn Clock>,
    interaction: Box<dyn UserInteraction>,
    reporter: Box<dyn Reporter>,
    abort: AbortFlag,
    saved_order_ids: HashSet<OrderId>,
    local_trades: Vec<Trade>,
}

impl<'a> TwoTierScheduler<'a> {
    pub fn new(
        broker: &'a dyn BrokerPort,
        persistence: &'a dyn PersistencePort,
        config: Config,
        automation_mode: AutomationMode,
    ) -> Self {
        Self {
            broker,
            persistence,
            config,
            automation_mode,
            clock: Box::new(SystemClock),
            // Hybrid callers are expected to override this with a real
            // prompt via `with_interaction` — the CLI does so with a
            // stdin-reading implementation.
            interaction: Box::new(AutoExecute),
            reporter: Box::new(ConsoleReporter),
            abort: AbortFlag::new(),
            saved_order_ids: HashSet::new(),
            local_trades: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_interaction(mut self, interaction: Box<dyn UserInteraction>) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Runs the whole weekend batch. `dry_run` skips Tier 1 submission (and
    /// therefore Tier 2 and reconciliation have nothing to act on) while
    /// still running validation and strike selection, so a dry run still
    /// exercises — and reports on — every decision the pipeline would have
    /// made.
    pub async fn run_monday_morning(&mut self, mut candidates: Vec<Candidate>, dry_run: bool) -> ExecutionReport {
        let session_start = self.clock.now();
        let mut report = ExecutionReport::started_now(candidates.len());

        if wait_until_time(&self.config.stage1_time, self.clock.as_ref(), &self.abort)
            .await
            .is_err()
        {
            report.warn("aborted while waiting for stage 1 gate");
            return report;
        }
        validator::validate_stage1(&mut candidates, self.broker, &self.config).await;

        let ready_count = candidates.iter().filter(|c| c.state == CandidateState::Ready).count();
        report.validated = ready_count;
        if ready_count == 0 {
            report.warn("no READY candidates after stage 1 validation");
            return report;
        }
        if self.automation_mode == AutomationMode::Hybrid {
            tracing::info!("{}", self.reporter.format_stage1_table(&candidates));
        }

        if wait_until_time(&self.config.tier1_execution_time, self.clock.as_ref(), &self.abort)
            .await
            .is_err()
        {
            report.warn("aborted while waiting for tier 1 gate");
            return report;
        }

        if self.config.use_live_strike_selector {
            strike_selector::select_strikes(&mut candidates, self.broker, &self.config).await;
        } else {
            validator::validate_stage2(&mut candidates, self.broker, &self.config).await;
        }

        let confirmed_count = candidates
            .iter()
            .filter(|c| c.state == CandidateState::Confirmed)
            .count();
        report.confirmed = confirmed_count;
        if confirmed_count == 0 {
            report.warn("no CONFIRMED candidates after strike selection / stage 2");
            return report;
        }

        let preflight_errors = self.preflight_errors(&candidates).await;
        if !preflight_errors.is_empty() {
            match self.automation_mode {
                AutomationMode::Supervised | AutomationMode::Autonomous => {
                    report.warn("EXECUTION ABORTED - pre-flight validation failed:");
                    for error in preflight_errors {
                        report.warn(error);
                    }
                    return report;
                }
                AutomationMode::Hybrid => {
                    for error in preflight_errors {
                        report.warn(format!("pre-flight warning: {error}"));
                    }
                }
            }
        }

        if self.automation_mode == AutomationMode::Hybrid {
            match self.run_hybrid_gate(&candidates, &mut report).await {
                Some(UserCommand::Execute) => {}
                Some(UserCommand::Abort) | None => {
                    report.warn("EXECUTION ABORTED by user");
                    return report;
                }
                Some(UserCommand::Wait) => unreachable!("run_hybrid_gate resolves Wait internally"),
            }
        }

        if dry_run {
            report.warn("dry run — no orders submitted");
            report.finish_now();
            return report;
        }

        self.execute_tier1_and_tier2(&mut candidates, &mut report).await;

        if wait_until_time(&self.config.reconciliation_time, self.clock.as_ref(), &self.abort)
            .await
            .is_err()
        {
            report.warn("aborted while waiting for reconciliation gate");
            report.finish_now();
            return report;
        }
        let deltas = reconciler::sync_all_orders(self.broker, self.persistence, &self.local_trades, session_start).await;
        report.warn(format!("reconciliation complete: {} order(s) synced", deltas.len()));

        report.finish_now();
        report.check_systematic_failure();
        report
    }

    /// Resolves the hybrid-mode prompt loop: `wait` sleeps and re-prompts,
    /// `execute`/`abort` return directly. Returns `None` if cancelled.
    async fn run_hybrid_gate(&self, candidates: &[Candidate], report: &mut ExecutionReport) -> Option<UserCommand> {
        let confirmed: Vec<&Candidate> = candidates.iter().filter(|c| c.state == CandidateState::Confirmed).collect();
        let summary = self.reporter.format_stage2_table(&confirmed);
        loop {
            if self.abort.is_set() {
                return None;
            }
            match self.interaction.prompt_for_command(&summary).await {
                UserCommand::Wait => {
                    report.warn("user requested wait — retrying in 5 minutes");
                    tokio::time::sleep(HYBRID_WAIT_RETRY_DELAY).await;
                    continue;
                }
                other => return Some(other),
            }
        }
    }

    async fn preflight_errors(&self, candidates: &[Candidate]) -> Vec<String> {
        let mut errors = Vec::new();

        let (healthy, message) = self.broker.check_market_data_health().await;
        if !healthy {
            errors.push(format!(
                "broker market data unhealthy: {}",
                message.unwrap_or_else(|| "no detail".to_string())
            ));
        }

        let facts: Vec<csp_risk::StagedCandidateFacts> = candidates
            .iter()
            .filter(|c| c.state == CandidateState::Confirmed)
            .map(|c| csp_risk::StagedCandidateFacts::new(c.staged.staged_margin, c.staged.staged_contracts, c.effective_limit_price()))
            .collect();

        if let Err(err) = (csp_risk::MaxTotalMarginCheck {
            max_total_margin: self.config.max_total_margin,
        })
        .check(&facts)
        {
            errors.push(err.to_string());
        }
        if let Err(err) = (csp_risk::MaxPositionsCheck {
            max_positions: self.config.max_positions,
        })
        .check(&facts)
        {
            errors.push(err.to_string());
        }
        if let Err(err) = csp_risk::PositiveLimitAndContractsCheck.check(&facts) {
            errors.push(err.to_string());
        }

        errors
    }

    async fn execute_tier1_and_tier2(&mut self, candidates: &mut [Candidate], report: &mut ExecutionReport) {
        let mut executor = RapidFireExecutor::new();
        executor.watch_order_status(self.broker);

        let outcome = executor
            .submit_all(candidates, MarketSession::Regular, self.broker, &self.config)
            .await;
        for warning in &outcome.warnings {
            report.warn(warning.clone());
        }
        for skipped in &outcome.skipped {
            report.add_skipped(skipped.clone());
        }
        for submitted in &outcome.submitted {
            report.add_submitted(submitted.clone());
        }
        self.save_pending(&outcome.submitted, candidates).await;

        let terminal = executor.monitor(self.broker, &self.config).await;
        self.bucket_terminal(terminal, candidates, report).await;

        let mut remaining: HashMap<OrderId, PendingOrder> =
            executor.snapshot().into_iter().map(|o| (o.order_id.clone(), o)).collect();
        executor.shutdown().await;

        if !remaining.is_empty() {
            let fm_outcome = fill_manager::monitor_fills(&mut remaining, self.broker, &self.config).await;
            for warning in fm_outcome.warnings {
                report.warn(warning);
            }
            for filled in &fm_outcome.filled_snapshots {
                let expiration = candidate_expiration(candidates, filled.candidate_id);
                let mut summary = ExecutionSummary::from_pending_order(filled, expiration);
                summary.strike = candidate_strike(candidates, filled.candidate_id);
                self.save_filled(std::slice::from_ref(&summary), candidates).await;
                report.add_filled(summary);
            }
            for drained in fm_outcome.drained {
                if drained.last_status != OrderStatus::Filled {
                    let expiration = candidate_expiration(candidates, drained.candidate_id);
                    let mut summary = ExecutionSummary::from_pending_order(&drained, expiration);
                    summary.strike = candidate_strike(candidates, drained.candidate_id);
                    report.add_failed(summary);
                }
            }
        }

        if self.config.tier2_enabled && !remaining.is_empty() {
            self.execute_tier2_when_ready(&mut remaining, candidates, report).await;
        }

        for order in remaining.values() {
            let expiration = candidate_expiration(candidates, order.candidate_id);
            let mut summary = ExecutionSummary::from_pending_order(order, expiration);
            summary.strike = candidate_strike(candidates, order.candidate_id);
            report.add_working(summary);
        }
    }

    async fn bucket_terminal(&mut self, terminal: Vec<PendingOrder>, candidates: &[Candidate], report: &mut ExecutionReport) {
        for order in terminal {
            let expiration = candidate_expiration(candidates, order.candidate_id);
            let mut summary = ExecutionSummary::from_pending_order(&order, expiration);
            summary.strike = candidate_strike(candidates, order.candidate_id);
            if order.last_status == OrderStatus::Filled {
                self.save_filled(std::slice::from_ref(&summary), candidates).await;
                report.add_filled(summary);
            } else {
                report.add_failed(summary);
            }
        }
    }

    /// Every `tier2_check_interval_seconds`, samples market conditions
    /// until favorable or the window closes; then reprices every
    /// still-open order upward toward `tier2_limit_adjustment` of the base
    /// sell limit, clamped below the live ask.
    async fn execute_tier2_when_ready(
        &mut self,
        remaining: &mut HashMap<OrderId, PendingOrder>,
        candidates: &[Candidate],
        report: &mut ExecutionReport,
    ) {
        let Some(window_end) = parse_hhmm(&self.config.tier2_window_end) else {
            return;
        };
        let check_interval = Duration::from_secs(self.config.tier2_check_interval_seconds.max(1));

        loop {
            if self.abort.is_set() || remaining.is_empty() {
                return;
            }
            if self.clock.now().time() >= window_end {
                report.warn("tier 2 window expired — leaving remaining orders working");
                return;
            }

            let contracts: Vec<QualifiedContract> = remaining.values().take(5).map(|o| o.contract.clone()).collect();
            let condition = market_conditions::sample(self.broker, &contracts, &self.config).await;

            if condition.favorable {
                self.reprice_tier2(remaining, candidates, report).await;
                return;
            }

            tokio::time::sleep(check_interval.min(WAIT_CHUNK * 12)).await;
        }
    }

    async fn reprice_tier2(&mut self, remaining: &mut HashMap<OrderId, PendingOrder>, candidates: &[Candidate], report: &mut ExecutionReport) {
        let quote_timeout = Duration::from_secs_f64(self.config.quote_fetch_timeout_seconds);
        let open: Vec<PendingOrder> = remaining.values().cloned().collect();

        for order in open {
            let Quote::Valid { bid, ask, .. } = self.broker.get_quote(&order.contract, quote_timeout).await else {
                continue;
            };
            let Ok(base_limit) = csp_pricer::sell_limit(bid, ask, self.config.bid_mid_ratio) else {
                continue;
            };
            let boosted = base_limit * self.config.tier2_limit_adjustment;
            let new_limit = boosted.min(ask - rust_decimal::Decimal::new(1, 2));
            if (new_limit - order.current_limit).abs() < rust_decimal::Decimal::new(1, 2) {
                continue;
            }

            if let Ok(ack) = self
                .broker
                .modify_order(&order.order_id, new_limit, None, Some("tier 2 conditional retry"))
                .await
            {
                remaining.remove(&order.order_id);
                let mut replaced = order;
                replaced.order_id = ack.order_id.clone();
                replaced.current_limit = new_limit;
                replaced.last_status = ack.status;
                remaining.insert(ack.order_id, replaced);
            }
        }

        let filled: Vec<OrderId> = remaining
            .iter()
            .filter(|(_, o)| o.last_status == OrderStatus::Filled)
            .map(|(id, _)| id.clone())
            .collect();
        for id in filled {
            if let Some(order) = remaining.remove(&id) {
                let expiration = candidate_expiration(candidates, order.candidate_id);
                let mut summary = ExecutionSummary::from_pending_order(&order, expiration);
                summary.strike = candidate_strike(candidates, order.candidate_id);
                self.save_filled(std::slice::from_ref(&summary), candidates).await;
                report.add_filled(summary);
            }
        }
    }

    /// For every submitted summary not already in `saved_order_ids`, inserts
    /// a PENDING Trade and records the id as saved.
    async fn save_pending(&mut self, submitted: &[ExecutionSummary], candidates: &[Candidate]) {
        for summary in submitted {
            let Some(order_id) = &summary.order_id else { continue };
            if self.saved_order_ids.contains(order_id) {
                continue;
            }
            let candidate = candidates.iter().find(|c| c.id == summary.candidate_id);
            let otm_fraction = candidate.and_then(|c| c.otm_fraction()).unwrap_or_default();
            let dte = candidate
                .map(|c| (c.staged.expiration - Utc::now().date_naive()).num_days())
                .unwrap_or_default();

            let trade = Trade::new_pending(
                order_id.clone(),
                summary.symbol.clone(),
                summary.strike,
                summary.expiration.clone(),
                summary.submitted_limit,
                Utc::now(),
                summary.contracts,
                otm_fraction,
                dte,
            );
            if let Err(err) = self.persistence.insert_trade(&trade).await {
                tracing::warn!(%err, "failed to persist pending trade");
            }
            self.saved_order_ids.insert(order_id.clone());
            self.local_trades.push(trade);
        }
    }

    /// Upserts by `order_id`: mutates the existing Trade if found, else
    /// inserts fresh. Always attempts an entry snapshot and a candidate
    /// state transition; failures there are logged, not propagated.
    async fn save_filled(&mut self, filled: &[ExecutionSummary], candidates: &[Candidate]) {
        for summary in filled {
            let Some(order_id) = &summary.order_id else { continue };
            let fill_price = summary.fill_price.unwrap_or_default();
            let fill_time = summary.fill_time.unwrap_or_else(Utc::now);

            if let Some(existing) = self.local_trades.iter_mut().find(|t| &t.order_id == order_id) {
                existing.mark_filled(fill_price, fill_time);
                if let Err(err) = self.persistence.update_trade(existing).await {
                    tracing::warn!(%err, "failed to persist filled trade update");
                }
            } else {
                let candidate = candidates.iter().find(|c| c.id == summary.candidate_id);
                let otm_fraction = candidate.and_then(|c| c.otm_fraction()).unwrap_or_default();
                let dte = candidate
                    .map(|c| (c.staged.expiration - Utc::now().date_naive()).num_days())
                    .unwrap_or_default();
                let mut trade = Trade::new_pending(
                    order_id.clone(),
                    summary.symbol.clone(),
                    summary.strike,
                    summary.expiration.clone(),
                    summary.submitted_limit,
                    Utc::now(),
                    summary.contracts,
                    otm_fraction,
                    dte,
                );
                trade.mark_filled(fill_price, fill_time);
                if let Err(err) = self.persistence.insert_trade(&trade).await {
                    tracing::warn!(%err, "failed to persist fresh filled trade");
                }
                self.saved_order_ids.insert(order_id.clone());
                self.local_trades.push(trade);
            }

            let candidate_id = summary.candidate_id;
            let mut fields = HashMap::new();
            fields.insert("symbol".to_string(), serde_json::json!(summary.symbol));
            fields.insert("strike".to_string(), serde_json::json!(summary.strike.to_string()));
            fields.insert("fill_price".to_string(), serde_json::json!(fill_price.to_string()));
            let trade_id = crate::trade::trade_id(&summary.symbol, summary.strike, &summary.expiration);
            if let Err(err) = self.persistence.insert_entry_snapshot(&trade_id, fields).await {
                tracing::warn!(%err, "failed to persist entry snapshot");
            }
            if let Err(err) = self
                .persistence
                .update_candidate_state(candidate_id, CandidateState::Executed)
                .await
            {
                tracing::warn!(%err, "failed to persist candidate state transition");
            }
        }
    }
}

fn candidate_expiration(candidates: &[Candidate], candidate_id: u64) -> String {
    candidates
        .iter()
        .find(|c| c.id == candidate_id)
        .map(|c| c.staged.expiration.format("%Y%m%d").to_string())
        .unwrap_or_default()
}

fn candidate_strike(candidates: &[Candidate], candidate_id: u64) -> rust_decimal::Decimal {
    candidates
        .iter()
        .find(|c| c.id == candidate_id)
        .map(|c| c.effective_strike())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::StagedFacts;
    use crate::persistence::InMemoryPersistence;
    use chrono::NaiveDate;
    use csp_broker::mock::MockBroker;
    use csp_broker::{OptionContract, Right};
    use rust_decimal_macros::dec;

    fn staged_candidate(id: u64, symbol: &str, strike: rust_decimal::Decimal) -> Candidate {
        Candidate::new(
            id,
            StagedFacts {
                symbol: symbol.to_string(),
                strike,
                expiration: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
                staged_stock_price: dec!(155),
                staged_limit_price: dec!(0.45),
                staged_contracts: 5,
                staged_margin: dec!(3000),
                otm_fraction: dec!(0.03),
            },
        )
    }

    fn past_clock() -> Box<dyn Clock> {
        Box::new(FixedClock(Utc::now() - chrono::Duration::hours(2)))
    }

    #[tokio::test]
    async fn aborts_early_with_no_ready_candidates() {
        let broker = MockBroker::new();
        // No stock price seeded: stage 1 leaves the candidate STALE.
        let persistence = InMemoryPersistence::new();
        let mut scheduler = TwoTierScheduler::new(&broker, &persistence, Config::default(), AutomationMode::Autonomous)
            .with_clock(past_clock());

        let report = scheduler
            .run_monday_morning(vec![staged_candidate(1, "AAPL", dec!(150))], false)
            .await;

        assert_eq!(report.validated, 0);
        assert!(report.warnings.iter().any(|w| w.contains("no READY")));
    }

    #[tokio::test]
    async fn dry_run_skips_submission_but_still_validates() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(154.5));
        broker.set_quote(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.46), dec!(0.50), None, 10, chrono::Utc::now()),
        );
        let persistence = InMemoryPersistence::new();
        let mut config = Config::default();
        config.use_live_strike_selector = false;
        let mut scheduler = TwoTierScheduler::new(&broker, &persistence, config, AutomationMode::Autonomous)
            .with_clock(past_clock());

        let report = scheduler
            .run_monday_morning(vec![staged_candidate(1, "AAPL", dec!(150))], true)
            .await;

        assert_eq!(report.confirmed, 1);
        assert!(report.submitted.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("dry run")));
    }

    #[tokio::test]
    async fn autonomous_run_submits_and_persists_pending_trade() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(154.5));
        broker.set_quote(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.46), dec!(0.50), None, 10, chrono::Utc::now()),
        );
        let persistence = InMemoryPersistence::new();
        let mut config = Config::default();
        config.use_live_strike_selector = false;
        config.tier2_enabled = false;
        config.rapid_fire_max_wait_seconds = 0;
        let mut scheduler = TwoTierScheduler::new(&broker, &persistence, config, AutomationMode::Autonomous)
            .with_clock(past_clock());

        let report = scheduler
            .run_monday_morning(vec![staged_candidate(1, "AAPL", dec!(150))], false)
            .await;

        assert_eq!(report.submitted.len(), 1);
        assert_eq!(persistence.trades().len(), 1);
    }

    #[tokio::test]
    async fn supervised_mode_aborts_on_preflight_margin_failure() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(154.5));
        broker.set_quote(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.46), dec!(0.50), None, 10, chrono::Utc::now()),
        );
        let persistence = InMemoryPersistence::new();
        let mut config = Config::default();
        config.use_live_strike_selector = false;
        config.max_total_margin = dec!(1);
        let mut scheduler = TwoTierScheduler::new(&broker, &persistence, config, AutomationMode::Supervised)
            .with_clock(past_clock());

        let report = scheduler
            .run_monday_morning(vec![staged_candidate(1, "AAPL", dec!(150))], false)
            .await;

        assert!(report.submitted.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("ABORTED")));
    }
}
