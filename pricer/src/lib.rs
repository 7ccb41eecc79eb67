#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Limit Pricer
//!
//! Sell-side limit price math for cash-secured put execution: the initial
//! limit between bid and mid, progressive downward adjustment with a
//! premium floor, and a bid-tolerance check used to decide whether a fresh
//! quote still supports a previously computed limit.
//!
//! All public entry points take and return [`Decimal`] rounded to the cent
//! at the boundary, so callers never need to round again.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a caller of [`sell_limit`] can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Deserialize, Serialize)]
pub enum PricerError {
    /// `bid` was strictly greater than `ask`.
    #[error("invalid spread: bid ({bid}) > ask ({ask})")]
    InvalidSpread { bid: Decimal, ask: Decimal },
}

fn round_cent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the sell-side limit between `bid` and the bid-ask midpoint.
///
/// `limit = bid + (mid - bid) * ratio`, clamped so the result is never below
/// `bid`. A non-positive `bid` returns `Decimal::ZERO` (there is nothing to
/// sell into). `bid > ask` is a caller error.
pub fn sell_limit(bid: Decimal, ask: Decimal, ratio: Decimal) -> Result<Decimal, PricerError> {
    if bid > ask {
        return Err(PricerError::InvalidSpread { bid, ask });
    }
    if bid <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let mid = (bid + ask) / Decimal::TWO;
    let limit = bid + (mid - bid) * ratio;
    Ok(round_cent(limit).max(round_cent(bid)))
}

/// The default position of the limit between bid (0.0) and mid (1.0).
pub const DEFAULT_BID_MID_RATIO: &str = "0.30";

/// Result of attempting to lower an unfilled limit for a better fill chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Adjustment {
    /// A new, lower limit was computed.
    New(Decimal),
    /// No further adjustment is possible (attempts exhausted, or floor hit).
    None,
}

/// Lowers `current_limit` by `increment`, clamped up to `current_bid`,
/// rejected if `attempt` has exceeded `max_adjustments` or the result would
/// fall below `premium_floor`.
///
/// `attempt` is the 1-indexed number of the adjustment being attempted.
pub fn adjust_down(
    current_limit: Decimal,
    current_bid: Decimal,
    increment: Decimal,
    attempt: u32,
    max_adjustments: u32,
    premium_floor: Decimal,
) -> Adjustment {
    if attempt > max_adjustments {
        return Adjustment::None;
    }

    let mut adjusted = round_cent(current_limit - increment);
    if adjusted < round_cent(current_bid) {
        adjusted = round_cent(current_bid);
    }

    if adjusted < premium_floor {
        return Adjustment::None;
    }

    Adjustment::New(adjusted)
}

/// Passes iff `(limit - bid) / bid <= tolerance`. `bid` must be positive;
/// a non-positive bid always fails (there is no meaningful ratio).
pub fn validate_vs_bid(limit: Decimal, bid: Decimal, tolerance: Decimal) -> bool {
    if bid <= Decimal::ZERO {
        return false;
    }
    (limit - bid) / bid <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sell_limit_is_between_bid_and_mid() {
        let limit = sell_limit(dec!(0.45), dec!(0.55), dec!(0.30)).unwrap();
        assert_eq!(limit, dec!(0.47));
        assert!(limit >= dec!(0.45));
        assert!(limit <= dec!(0.50));
    }

    #[test]
    fn sell_limit_rejects_inverted_spread() {
        let err = sell_limit(dec!(0.60), dec!(0.50), dec!(0.30)).unwrap_err();
        assert_eq!(
            err,
            PricerError::InvalidSpread {
                bid: dec!(0.60),
                ask: dec!(0.50)
            }
        );
    }

    #[test]
    fn sell_limit_zero_bid_is_zero() {
        assert_eq!(sell_limit(dec!(0), dec!(0.10), dec!(0.30)).unwrap(), dec!(0));
        assert_eq!(
            sell_limit(dec!(-1), dec!(0.10), dec!(0.30)).unwrap(),
            dec!(0)
        );
    }

    #[test]
    fn sell_limit_result_is_already_rounded() {
        let limit = sell_limit(dec!(0.451), dec!(0.559), dec!(0.30)).unwrap();
        assert_eq!(round_cent(limit), limit);
    }

    #[test]
    fn adjust_down_steps_by_increment_and_floors_at_bid() {
        assert_eq!(
            adjust_down(dec!(0.47), dec!(0.45), dec!(0.01), 1, 2, dec!(0.20)),
            Adjustment::New(dec!(0.46))
        );
        assert_eq!(
            adjust_down(dec!(0.46), dec!(0.45), dec!(0.01), 2, 2, dec!(0.20)),
            Adjustment::New(dec!(0.45))
        );
    }

    #[test]
    fn adjust_down_rejects_past_max_adjustments() {
        assert_eq!(
            adjust_down(dec!(0.45), dec!(0.45), dec!(0.01), 3, 2, dec!(0.20)),
            Adjustment::None
        );
    }

    #[test]
    fn adjust_down_rejects_below_premium_floor() {
        assert_eq!(
            adjust_down(dec!(0.21), dec!(0.10), dec!(0.01), 1, 5, dec!(0.20)),
            Adjustment::None
        );
    }

    #[test]
    fn validate_vs_bid_boundary() {
        // (0.47 - 0.45) / 0.45 ~= 0.0444
        assert!(validate_vs_bid(dec!(0.47), dec!(0.45), dec!(0.05)));
        assert!(!validate_vs_bid(dec!(0.50), dec!(0.45), dec!(0.05)));
    }
}
