//! # Reporter
//!
//! Formats the two operator-facing summary tables the hybrid-mode gate
//! shows before prompting for `execute`/`wait`/`abort`: one after Stage 1
//! validation, one after strike selection / Stage 2. A trait so the
//! scheduler never talks to a terminal directly — tests inject a capturing
//! implementation instead of asserting against stdout.

use crate::candidate::{Candidate, CandidateState};
use prettytable::{row, Table};

pub trait Reporter: Send + Sync {
    /// Every candidate as it stands right after Stage 1, one row per
    /// candidate, annotated with its resulting lifecycle state.
    fn format_stage1_table(&self, candidates: &[Candidate]) -> String;

    /// The confirmed batch right before Tier 1 submission: strike, limit,
    /// and contract count per candidate.
    fn format_stage2_table(&self, confirmed: &[&Candidate]) -> String;
}

/// Renders both tables with `prettytable-rs`, the same crate the CLI uses
/// for its own final report.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn format_stage1_table(&self, candidates: &[Candidate]) -> String {
        let mut table = Table::new();
        table.add_row(row!["symbol", "strike", "stock price", "state"]);
        for candidate in candidates {
            table.add_row(row![
                candidate.staged.symbol,
                candidate.staged.strike,
                candidate.staged.staged_stock_price,
                state_label(candidate.state),
            ]);
        }
        format!("stage 1 — {} candidate(s)\n{}", candidates.len(), table)
    }

    fn format_stage2_table(&self, confirmed: &[&Candidate]) -> String {
        let mut table = Table::new();
        table.add_row(row!["symbol", "strike", "limit", "contracts"]);
        for candidate in confirmed {
            table.add_row(row![
                candidate.staged.symbol,
                candidate.effective_strike(),
                candidate.effective_limit_price(),
                candidate.staged.staged_contracts,
            ]);
        }
        format!("{} candidate(s) ready for execution\n{}", confirmed.len(), table)
    }
}

fn state_label(state: CandidateState) -> &'static str {
    match state {
        CandidateState::Staged => "staged",
        CandidateState::Ready => "ready",
        CandidateState::Confirmed => "confirmed",
        CandidateState::Executed => "executed",
        CandidateState::Failed => "failed",
        CandidateState::Expired => "expired",
        CandidateState::Rejected => "rejected",
        CandidateState::Stale => "stale",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::StagedFacts;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn staged_candidate(id: u64) -> Candidate {
        Candidate::new(
            id,
            StagedFacts {
                symbol: "AAPL".to_string(),
                strike: dec!(150),
                expiration: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
                staged_stock_price: dec!(155),
                staged_limit_price: dec!(0.45),
                staged_contracts: 5,
                staged_margin: dec!(3000),
                otm_fraction: dec!(0.03),
            },
        )
    }

    #[test]
    fn stage1_table_includes_every_candidate_and_its_state() {
        let mut ready = staged_candidate(1);
        ready.state = CandidateState::Ready;
        let mut stale = staged_candidate(2);
        stale.state = CandidateState::Stale;

        let rendered = ConsoleReporter.format_stage1_table(&[ready, stale]);
        assert!(rendered.contains("2 candidate(s)"));
        assert!(rendered.contains("ready"));
        assert!(rendered.contains("stale"));
    }

    #[test]
    fn stage2_table_uses_effective_strike_and_limit() {
        let mut confirmed = staged_candidate(1);
        confirmed.state = CandidateState::Confirmed;
        confirmed.live.adjusted_strike = Some(dec!(145));
        confirmed.live.adjusted_limit_price = Some(dec!(0.55));

        let rendered = ConsoleReporter.format_stage2_table(&[&confirmed]);
        assert!(rendered.contains("1 candidate(s)"));
        assert!(rendered.contains("145"));
        assert!(rendered.contains("0.55"));
    }
}
