//! # Live Strike Selector
//!
//! Runs once the market is open, replacing Stage 2 of the validator when
//! enabled. For each Stage-1-READY candidate: pulls the option chain,
//! narrows to a bounded OTM candidate set, requests Greeks for all of them
//! with a shared timeout, and picks the strike whose delta is closest to
//! target among those passing the premium/OTM/spread/open-interest gates.

use crate::candidate::{Candidate, CandidateState, StrikeSelectionMethod};
use crate::config::Config;
use csp_broker::{BrokerPort, Greeks, OptionContract, Right};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionResult {
    Selected,
    Unchanged,
    Abandoned,
}

struct ScoredStrike {
    strike: Decimal,
    greeks: Greeks,
}

/// Runs strike selection for every READY candidate, mutating live overrides
/// in place and returning each candidate's result alongside its id.
/// ABANDONED candidates should be dropped from the pipeline by the caller.
pub async fn select_strikes(
    candidates: &mut [Candidate],
    broker: &dyn BrokerPort,
    config: &Config,
) -> Vec<(u64, SelectionResult)> {
    let mut results = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter_mut() {
        if candidate.state != CandidateState::Ready {
            continue;
        }
        let result = select_one(candidate, broker, config).await;
        if result == SelectionResult::Abandoned {
            candidate.state = CandidateState::Stale;
        } else {
            candidate.state = CandidateState::Confirmed;
        }
        results.push((candidate.id, result));
    }
    results
}

async fn select_one(candidate: &mut Candidate, broker: &dyn BrokerPort, config: &Config) -> SelectionResult {
    let Some(underlying) = broker.get_stock_price(&candidate.staged.symbol).await else {
        return fallback(config);
    };
    candidate.live.current_stock_price = Some(underlying);

    let expiration = candidate.staged.expiration.format("%Y%m%d").to_string();
    let chain = match broker.get_option_chain(&candidate.staged.symbol, &expiration).await {
        Ok(chain) => chain,
        Err(_) => return fallback(config),
    };

    let floor = underlying * (Decimal::ONE - config.min_otm_pct);
    let mut otm_strikes: Vec<Decimal> = chain.into_iter().filter(|s| *s <= floor).collect();
    if otm_strikes.is_empty() {
        return fallback(config);
    }

    let reference = candidate.effective_strike();
    otm_strikes.sort_by_key(|s| (*s - reference).abs());
    otm_strikes.truncate(config.strike_max_candidates);
    otm_strikes.sort();

    let contracts: Vec<OptionContract> = otm_strikes
        .iter()
        .map(|strike| OptionContract::new(&candidate.staged.symbol, &expiration, *strike, Right::Put))
        .collect();

    let qualified = broker.qualify_contracts_async(contracts).await;

    let greeks_timeout = Duration::from_secs(config.greeks_wait_timeout_seconds);
    let fetches = qualified.iter().filter_map(|r| r.as_ref().ok()).map(|qc| {
        let qc = qc.clone();
        async move {
            let greeks = tokio::time::timeout(greeks_timeout, broker.get_greeks(&qc))
                .await
                .ok()
                .flatten();
            greeks.map(|g| ScoredStrike {
                strike: qc.contract.strike,
                greeks: g,
            })
        }
    });
    let scored: Vec<ScoredStrike> = join_all(fetches).await.into_iter().flatten().collect();

    match best_strike(&scored, underlying, config) {
        Some(best) => {
            let Ok(new_limit) = csp_pricer::sell_limit(best.greeks.bid, best.greeks.ask, config.bid_mid_ratio) else {
                return fallback(config);
            };
            candidate.live.adjusted_strike = Some(best.strike);
            candidate.live.adjusted_limit_price = Some(new_limit);
            candidate.live.live_delta = Some(best.greeks.delta);
            candidate.live.live_iv = Some(best.greeks.iv);
            candidate.live.live_gamma = Some(best.greeks.gamma);
            candidate.live.live_theta = Some(best.greeks.theta);
            candidate.live.live_volume = Some(best.greeks.volume);
            candidate.live.live_open_interest = Some(best.greeks.open_interest);
            candidate.live.strike_selection_method = Some(StrikeSelectionMethod::Delta);
            SelectionResult::Selected
        }
        None => fallback(config),
    }
}

fn fallback(config: &Config) -> SelectionResult {
    if config.strike_fallback_to_otm {
        SelectionResult::Unchanged
    } else {
        SelectionResult::Abandoned
    }
}

fn best_strike(scored: &[ScoredStrike], underlying: Decimal, config: &Config) -> Option<&ScoredStrike> {
    scored
        .iter()
        .filter(|s| {
            let delta_ok = (s.greeks.delta.abs() - config.strike_target_delta).abs() <= config.strike_delta_tolerance;
            let premium_ok = s.greeks.bid >= config.premium_min;
            let otm = (underlying - s.strike) / underlying;
            let otm_ok = otm >= config.min_otm_pct;
            let spread_ok = s.greeks.bid > Decimal::ZERO
                && (s.greeks.ask - s.greeks.bid) / s.greeks.bid <= config.max_execution_spread;
            let oi_ok = s.greeks.open_interest >= config.strike_min_open_interest;
            delta_ok && premium_ok && otm_ok && spread_ok && oi_ok
        })
        .min_by_key(|s| (s.greeks.delta.abs() - config.strike_target_delta).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::StagedFacts;
    use chrono::NaiveDate;
    use csp_broker::mock::MockBroker;
    use rust_decimal_macros::dec;

    fn candidate() -> Candidate {
        let mut c = Candidate::new(
            1,
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
        );
        c.state = CandidateState::Ready;
        c
    }

    fn greeks(delta: Decimal, bid: Decimal, ask: Decimal, oi: i64) -> Greeks {
        Greeks {
            delta,
            iv: dec!(0.25),
            gamma: dec!(0.01),
            theta: dec!(-0.02),
            bid,
            ask,
            volume: 0,
            open_interest: oi,
        }
    }

    #[tokio::test]
    async fn selects_strike_closest_to_target_delta() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(155));
        broker.set_chain("AAPL", "20260214", vec![dec!(148), dec!(150), dec!(152)]);
        broker.set_greeks(
            OptionContract::new("AAPL", "20260214", dec!(148), Right::Put),
            greeks(dec!(-0.19), dec!(0.46), dec!(0.50), 100),
        );
        broker.set_greeks(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            greeks(dec!(-0.35), dec!(0.60), dec!(0.65), 100),
        );

        let mut candidates = vec![candidate()];
        let config = Config::default();
        let results = select_strikes(&mut candidates, &broker, &config).await;

        assert_eq!(results[0].1, SelectionResult::Selected);
        assert_eq!(candidates[0].live.adjusted_strike, Some(dec!(148)));
        assert_eq!(
            candidates[0].live.strike_selection_method,
            Some(StrikeSelectionMethod::Delta)
        );
    }

    #[tokio::test]
    async fn falls_back_to_unchanged_when_no_strike_passes_gates() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(155));
        broker.set_chain("AAPL", "20260214", vec![dec!(148)]);
        broker.set_greeks(
            OptionContract::new("AAPL", "20260214", dec!(148), Right::Put),
            greeks(dec!(-0.19), dec!(0.46), dec!(0.50), 10),
        );

        let mut candidates = vec![candidate()];
        let mut config = Config::default();
        config.strike_min_open_interest = 50;
        let results = select_strikes(&mut candidates, &broker, &config).await;

        assert_eq!(results[0].1, SelectionResult::Unchanged);
    }

    #[tokio::test]
    async fn abandons_when_fallback_disabled() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(155));
        broker.set_chain("AAPL", "20260214", vec![]);

        let mut candidates = vec![candidate()];
        let mut config = Config::default();
        config.strike_fallback_to_otm = false;
        let results = select_strikes(&mut candidates, &broker, &config).await;

        assert_eq!(results[0].1, SelectionResult::Abandoned);
    }
}
