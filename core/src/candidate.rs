//! # Candidate
//!
//! A weekend-staged cash-secured put the pipeline will attempt to sell,
//! carried through validation, strike selection, submission, and fill
//! monitoring. Fields are grouped into the three layers described in the
//! data model: staged (set by the screener, never mutated by the core),
//! live overrides (populated as the pipeline runs), and lifecycle (the
//! candidate's current state).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a candidate's live strike was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrikeSelectionMethod {
    /// Selected by delta-targeting in the Live Strike Selector.
    Delta,
    /// Selected by the Stage 1 OTM-floor re-selection.
    OtmFraction,
    /// Kept the original staged strike.
    Unchanged,
}

/// A candidate's position in the pipeline. The last five are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateState {
    Staged,
    Ready,
    Confirmed,
    Executed,
    Failed,
    Expired,
    Rejected,
    Stale,
}

impl CandidateState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Executed | Self::Failed | Self::Expired | Self::Rejected | Self::Stale
        )
    }
}

/// Fields set by the weekend screener and never mutated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFacts {
    pub symbol: String,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    pub staged_stock_price: Decimal,
    pub staged_limit_price: Decimal,
    pub staged_contracts: u32,
    pub staged_margin: Decimal,
    pub otm_fraction: Decimal,
}

/// Fields populated as the pipeline runs: live prices, any strike
/// adjustment, and whatever Greeks the Live Strike Selector collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveOverrides {
    pub current_stock_price: Option<Decimal>,
    pub current_bid: Option<Decimal>,
    pub current_ask: Option<Decimal>,
    pub adjusted_strike: Option<Decimal>,
    pub adjusted_limit_price: Option<Decimal>,
    pub live_delta: Option<Decimal>,
    pub live_iv: Option<Decimal>,
    pub live_gamma: Option<Decimal>,
    pub live_theta: Option<Decimal>,
    pub live_volume: Option<i64>,
    pub live_open_interest: Option<i64>,
    pub strike_selection_method: Option<StrikeSelectionMethod>,
}

/// A weekend-staged cash-secured put, identified by an integer id plus the
/// tuple `(symbol, strike, expiration, PUT)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub staged: StagedFacts,
    pub live: LiveOverrides,
    pub state: CandidateState,
}

impl Candidate {
    pub fn new(id: u64, staged: StagedFacts) -> Self {
        Self {
            id,
            staged,
            live: LiveOverrides::default(),
            state: CandidateState::Staged,
        }
    }

    /// The strike downstream components must trade: the adjusted strike if
    /// set, else the staged strike. Once set, `adjusted_strike` replaces
    /// `strike` everywhere downstream.
    pub fn effective_strike(&self) -> Decimal {
        self.live.adjusted_strike.unwrap_or(self.staged.strike)
    }

    /// The limit price downstream components must use: the adjusted limit
    /// if set, else the staged limit.
    pub fn effective_limit_price(&self) -> Decimal {
        self.live
            .adjusted_limit_price
            .unwrap_or(self.staged.staged_limit_price)
    }

    /// `(current_stock_price - effective_strike) / current_stock_price`.
    /// `None` if the current stock price has not been observed yet.
    pub fn otm_fraction(&self) -> Option<Decimal> {
        let current = self.live.current_stock_price?;
        if current <= Decimal::ZERO {
            return None;
        }
        Some((current - self.effective_strike()) / current)
    }

    /// For a put, the effective strike must never be at or above the
    /// current underlying at any live check.
    pub fn respects_otm_invariant(&self) -> bool {
        match self.live.current_stock_price {
            Some(current) => self.effective_strike() < current,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn staged() -> StagedFacts {
        StagedFacts {
            symbol: "AAPL".into(),
            strike: dec!(150),
            expiration: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
            staged_stock_price: dec!(155),
            staged_limit_price: dec!(0.45),
            staged_contracts: 5,
            staged_margin: dec!(3000),
            otm_fraction: dec!(0.032),
        }
    }

    #[test]
    fn effective_strike_prefers_adjustment() {
        let mut c = Candidate::new(1, staged());
        assert_eq!(c.effective_strike(), dec!(150));
        c.live.adjusted_strike = Some(dec!(145));
        assert_eq!(c.effective_strike(), dec!(145));
    }

    #[test]
    fn otm_fraction_matches_formula() {
        let mut c = Candidate::new(1, staged());
        c.live.current_stock_price = Some(dec!(154.5));
        let otm = c.otm_fraction().unwrap();
        assert_eq!(otm, (dec!(154.5) - dec!(150)) / dec!(154.5));
    }

    #[test]
    fn otm_invariant_catches_strike_at_or_above_underlying() {
        let mut c = Candidate::new(1, staged());
        c.live.current_stock_price = Some(dec!(149));
        assert!(!c.respects_otm_invariant());
        c.live.current_stock_price = Some(dec!(151));
        assert!(c.respects_otm_invariant());
    }
}
