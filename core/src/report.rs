//! # Execution Report
//!
//! The aggregated outcome of one weekend batch: pipeline-stage counts,
//! submission/monitoring durations, total realized premium, warnings, and
//! a per-candidate result list. Built incrementally over the lifetime of
//! one [`crate::scheduler::TwoTierScheduler`] run and emitted once at the
//! end.

use crate::pending_order::{OrderTypeUsed, PendingOrder};
use chrono::{DateTime, Utc};
use csp_broker::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One candidate's outcome, placed into exactly one of the report's five
/// buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub candidate_id: u64,
    pub order_id: Option<OrderId>,
    pub symbol: String,
    pub strike: Decimal,
    pub expiration: String,
    pub contracts: u32,
    pub contracts_filled: u32,
    pub fill_price: Option<Decimal>,
    pub fill_time: Option<DateTime<Utc>>,
    pub submitted_limit: Decimal,
    pub staged_limit: Decimal,
    pub order_type: Option<OrderTypeUsed>,
    pub adjustments_made: u32,
    pub reason: Option<String>,
}

impl ExecutionSummary {
    /// Builds a submitted/working/filled summary from a live
    /// [`PendingOrder`]. `contracts_filled` comes from the order's reported
    /// `filled_qty`, never from a timestamp.
    pub fn from_pending_order(order: &PendingOrder, expiration: String) -> Self {
        Self {
            candidate_id: order.candidate_id,
            order_id: Some(order.order_id.clone()),
            symbol: order.symbol.clone(),
            strike: Decimal::ZERO,
            expiration,
            contracts: order.staged_contracts,
            contracts_filled: order.filled_qty,
            fill_price: order.fill_price,
            fill_time: order.fill_price.map(|_| Utc::now()),
            submitted_limit: order.current_limit,
            staged_limit: order.initial_limit,
            order_type: Some(order.order_type),
            adjustments_made: order.adjustment_count,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub date: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub staged: usize,
    pub validated: usize,
    pub confirmed: usize,

    pub submitted: Vec<ExecutionSummary>,
    pub filled: Vec<ExecutionSummary>,
    pub working: Vec<ExecutionSummary>,
    pub failed: Vec<ExecutionSummary>,
    pub skipped: Vec<ExecutionSummary>,

    pub warnings: Vec<String>,
}

impl ExecutionReport {
    pub fn started_now(staged: usize) -> Self {
        Self {
            date: Some(Utc::now()),
            start_time: Some(Utc::now()),
            staged,
            ..Default::default()
        }
    }

    pub fn add_submitted(&mut self, summary: ExecutionSummary) {
        self.submitted.push(summary);
    }

    pub fn add_filled(&mut self, summary: ExecutionSummary) {
        self.filled.push(summary);
    }

    pub fn add_working(&mut self, summary: ExecutionSummary) {
        self.working.push(summary);
    }

    pub fn add_failed(&mut self, summary: ExecutionSummary) {
        self.failed.push(summary);
    }

    pub fn add_skipped(&mut self, summary: ExecutionSummary) {
        self.skipped.push(summary);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Total realized premium across filled orders:
    /// `sum(fill_price * 100 * contracts_filled)`.
    pub fn total_realized_premium(&self) -> Decimal {
        self.filled
            .iter()
            .filter_map(|s| {
                s.fill_price
                    .map(|price| price * Decimal::from(100) * Decimal::from(s.contracts_filled))
            })
            .sum()
    }

    pub fn finish_now(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// `filled + working + failed + skipped == submitted.len()`, and
    /// `submitted.len() <= confirmed <= validated <= staged`.
    pub fn counts_are_consistent(&self) -> bool {
        let accounted = self.filled.len() + self.working.len() + self.failed.len() + self.skipped.len();
        accounted == self.submitted.len()
            && self.submitted.len() <= self.confirmed
            && self.confirmed <= self.validated
            && self.validated <= self.staged
    }

    /// A "0 orders submitted for N staged" condition is a critical-level
    /// warning.
    pub fn check_systematic_failure(&mut self) {
        if self.staged > 0 && self.submitted.is_empty() {
            self.warn(format!(
                "CRITICAL: 0 orders submitted for {} staged candidates — likely market data unavailable",
                self.staged
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> ExecutionSummary {
        ExecutionSummary {
            candidate_id: id,
            order_id: Some(OrderId::new(format!("o{id}"))),
            symbol: "AAPL".into(),
            strike: Default::default(),
            expiration: "20260214".into(),
            contracts: 5,
            contracts_filled: 0,
            fill_price: None,
            fill_time: None,
            submitted_limit: Default::default(),
            staged_limit: Default::default(),
            order_type: None,
            adjustments_made: 0,
            reason: None,
        }
    }

    #[test]
    fn counts_are_consistent_when_buckets_sum_to_submitted() {
        let mut report = ExecutionReport::started_now(3);
        report.validated = 3;
        report.confirmed = 2;
        report.add_submitted(summary(1));
        report.add_submitted(summary(2));
        report.add_filled(summary(1));
        report.add_working(summary(2));
        assert!(report.counts_are_consistent());
    }

    #[test]
    fn inconsistent_counts_are_detected() {
        let mut report = ExecutionReport::started_now(3);
        report.validated = 3;
        report.confirmed = 3;
        report.add_submitted(summary(1));
        // no bucket entry for summary(1) — inconsistent
        assert!(!report.counts_are_consistent());
    }

    #[test]
    fn systematic_failure_warns_when_nothing_submitted() {
        let mut report = ExecutionReport::started_now(5);
        report.check_systematic_failure();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("CRITICAL"));
    }

    #[test]
    fn total_realized_premium_sums_fill_price_times_contracts() {
        let mut report = ExecutionReport::started_now(2);
        let mut s1 = summary(1);
        s1.fill_price = Some(rust_decimal_macros::dec!(0.46));
        s1.contracts_filled = 5;
        let mut s2 = summary(2);
        s2.fill_price = Some(rust_decimal_macros::dec!(0.51));
        s2.contracts_filled = 3;
        report.add_filled(s1);
        report.add_filled(s2);
        assert_eq!(
            report.total_realized_premium(),
            rust_decimal_macros::dec!(383)
        );
    }
}
