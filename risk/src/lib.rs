#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Pre-flight Risk Checks
//!
//! Small, independently testable gates run against the staged candidate
//! list before the scheduler is allowed to place a single order. Each
//! check inspects the batch as a whole (aggregate margin, position count)
//! rather than one candidate at a time, since the pipeline's risk posture
//! is about the shape of the whole weekend's plan, not any single trade.
//!
//! A failing check does not reject individual candidates — it aborts the
//! run before submission, the same way a human trader would refuse to
//! click "confirm" on a stale or oversized order ticket.

use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod clock_sync;
pub use clock_sync::{ClockSyncCheck, ClockSyncError, ClockSyncResult};

/// A single [`RiskCheck`] evaluated against a batch of staged candidates.
///
/// Mirrors the shape used throughout the pipeline for narrow, composable
/// gates: a name for logging, and a `check` that either passes or returns
/// a reason-carrying error.
pub trait RiskCheck {
    type Input;
    type Error;

    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error>;
}

/// The facts about a staged candidate that risk checks need. Deliberately
/// narrower than the full candidate record — checks here run before
/// qualification or live pricing, so only what is known at staging time
/// is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Constructor, Serialize, Deserialize)]
pub struct StagedCandidateFacts {
    pub margin: Decimal,
    pub contracts: u32,
    pub limit_price: Decimal,
}

/// Rejects the batch if aggregate margin across all candidates exceeds a
/// configured ceiling.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct MaxTotalMarginCheck {
    pub max_total_margin: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("total margin {total} exceeds limit {limit}")]
pub struct MaxTotalMarginError {
    pub total: Decimal,
    pub limit: Decimal,
}

impl RiskCheck for MaxTotalMarginCheck {
    type Input = [StagedCandidateFacts];
    type Error = MaxTotalMarginError;

    fn name(&self) -> &'static str {
        "max_total_margin"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        let total: Decimal = input.iter().map(|c| c.margin).sum();
        if total > self.max_total_margin {
            Err(MaxTotalMarginError {
                total,
                limit: self.max_total_margin,
            })
        } else {
            Ok(())
        }
    }
}

/// Rejects the batch if the number of staged candidates exceeds a
/// configured ceiling.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct MaxPositionsCheck {
    pub max_positions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("{count} staged candidates exceeds limit {limit}")]
pub struct MaxPositionsError {
    pub count: usize,
    pub limit: usize,
}

impl RiskCheck for MaxPositionsCheck {
    type Input = [StagedCandidateFacts];
    type Error = MaxPositionsError;

    fn name(&self) -> &'static str {
        "max_positions"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        if input.len() > self.max_positions {
            Err(MaxPositionsError {
                count: input.len(),
                limit: self.max_positions,
            })
        } else {
            Ok(())
        }
    }
}

/// Sanity gate: every candidate must carry a positive limit price and a
/// positive contract count. Catches staging bugs before they reach the
/// broker rather than relying on the broker to reject a malformed order.
#[derive(Debug, Clone, Copy, Constructor, Default)]
pub struct PositiveLimitAndContractsCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("candidate {index} has non-positive limit_price ({limit_price}) or contracts ({contracts})")]
pub struct PositiveLimitAndContractsError {
    pub index: usize,
    pub limit_price: Decimal,
    pub contracts: u32,
}

impl RiskCheck for PositiveLimitAndContractsCheck {
    type Input = [StagedCandidateFacts];
    type Error = PositiveLimitAndContractsError;

    fn name(&self) -> &'static str {
        "positive_limit_and_contracts"
    }

    fn check(&self, input: &Self::Input) -> Result<(), Self::Error> {
        for (index, candidate) in input.iter().enumerate() {
            if candidate.limit_price <= Decimal::ZERO || candidate.contracts == 0 {
                return Err(PositiveLimitAndContractsError {
                    index,
                    limit_price: candidate.limit_price,
                    contracts: candidate.contracts,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn facts(margin: Decimal, contracts: u32, limit_price: Decimal) -> StagedCandidateFacts {
        StagedCandidateFacts::new(margin, contracts, limit_price)
    }

    #[test]
    fn max_total_margin_check_sums_across_candidates() {
        let batch = vec![
            facts(dec!(1000), 1, dec!(1.50)),
            facts(dec!(2000), 1, dec!(1.50)),
        ];
        let check = MaxTotalMarginCheck::new(dec!(2500));

        let err = check.check(&batch).unwrap_err();
        assert_eq!(err.total, dec!(3000));
        assert_eq!(err.limit, dec!(2500));

        let ok_check = MaxTotalMarginCheck::new(dec!(3000));
        assert!(ok_check.check(&batch).is_ok());
    }

    #[test]
    fn max_positions_check_counts_candidates() {
        let batch = vec![
            facts(dec!(1000), 1, dec!(1.50)),
            facts(dec!(1000), 1, dec!(1.50)),
            facts(dec!(1000), 1, dec!(1.50)),
        ];
        let check = MaxPositionsCheck::new(2);

        let err = check.check(&batch).unwrap_err();
        assert_eq!(err.count, 3);
        assert_eq!(err.limit, 2);

        assert!(MaxPositionsCheck::new(3).check(&batch).is_ok());
    }

    #[test]
    fn positive_limit_and_contracts_catches_zero_contracts() {
        let batch = vec![facts(dec!(1000), 1, dec!(1.50)), facts(dec!(1000), 0, dec!(1.50))];
        let check = PositiveLimitAndContractsCheck;

        let err = check.check(&batch).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.contracts, 0);
    }

    #[test]
    fn positive_limit_and_contracts_catches_non_positive_price() {
        let batch = vec![facts(dec!(1000), 1, dec!(0))];
        let check = PositiveLimitAndContractsCheck;

        assert!(check.check(&batch).is_err());
    }
}
