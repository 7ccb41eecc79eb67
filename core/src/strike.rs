//! # Strike Interval & Re-selection
//!
//! Shared by the Two-Stage Validator (Stage 1's strike re-selection) and
//! the Live Strike Selector's OTM pre-filter: the strike spacing a symbol
//! actually trades at, learned from its option chain when available.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// The most-common difference among strikes within 30% of `underlying`,
/// or a price-banded fallback when the chain doesn't have at least two
/// such strikes.
pub fn strike_interval(underlying: Decimal, chain: &[Decimal]) -> Decimal {
    let lower = underlying * dec!(0.70);
    let upper = underlying * dec!(1.30);
    let mut nearby: Vec<Decimal> = chain
        .iter()
        .copied()
        .filter(|s| *s >= lower && *s <= upper)
        .collect();
    nearby.sort();
    nearby.dedup();

    if nearby.len() >= 2 {
        let mut counts: HashMap<Decimal, u32> = HashMap::new();
        for window in nearby.windows(2) {
            let diff = window[1] - window[0];
            if diff > Decimal::ZERO {
                *counts.entry(diff).or_insert(0) += 1;
            }
        }
        if let Some((interval, _)) = counts.into_iter().max_by_key(|(_, count)| *count) {
            return interval;
        }
    }

    price_band_fallback(underlying)
}

fn price_band_fallback(underlying: Decimal) -> Decimal {
    if underlying < dec!(25) {
        dec!(0.50)
    } else if underlying < dec!(500) {
        dec!(1.00)
    } else {
        dec!(5.00)
    }
}

/// Computes `underlying * (1 - otm_min)`, rounds to the nearest multiple of
/// `interval`, and nudges down by one more interval if rounding landed at
/// or above `underlying` (a put's strike must be strictly below it).
/// Returns `None` if no candidate strike satisfies the OTM floor even
/// after nudging.
pub fn target_strike(underlying: Decimal, otm_min: Decimal, interval: Decimal) -> Option<Decimal> {
    if interval <= Decimal::ZERO {
        return None;
    }
    let raw_target = underlying * (Decimal::ONE - otm_min);
    let steps = (raw_target / interval).round();
    let mut candidate = steps * interval;

    if candidate >= underlying {
        candidate -= interval;
    }
    if candidate <= Decimal::ZERO {
        return None;
    }

    let otm = (underlying - candidate) / underlying;
    if otm < otm_min {
        return None;
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strike_interval_learns_most_common_diff() {
        let chain = vec![dec!(145), dec!(146), dec!(147), dec!(148), dec!(149), dec!(151)];
        assert_eq!(strike_interval(dec!(150), &chain), dec!(1));
    }

    #[test]
    fn strike_interval_falls_back_by_price_band() {
        assert_eq!(strike_interval(dec!(20), &[]), dec!(0.50));
        assert_eq!(strike_interval(dec!(200), &[]), dec!(1.00));
        assert_eq!(strike_interval(dec!(1000), &[]), dec!(5.00));
    }

    #[test]
    fn target_strike_stays_below_underlying_and_meets_otm_floor() {
        // interval 0.5 divides the raw target (155 * 0.90 = 139.5) exactly,
        // so rounding to the nearest strike doesn't erode the OTM floor.
        let strike = target_strike(dec!(155), dec!(0.10), dec!(0.5)).unwrap();
        assert!(strike < dec!(155));
        assert!((dec!(155) - strike) / dec!(155) >= dec!(0.10));
    }

    #[test]
    fn target_strike_returns_none_when_rounding_erodes_otm_floor() {
        // raw target 155 * 0.90 = 139.5 rounds to the $1 strike 140, whose
        // OTM (15/155 = 9.68%) falls just short of the 10% floor.
        assert_eq!(target_strike(dec!(155), dec!(0.10), dec!(1)), None);
    }
}
