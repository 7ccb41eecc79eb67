//! # Two-Stage Validator
//!
//! Stage 1 (pre-open): gates each candidate on underlying-price deviation
//! from its staged reference price, with adaptive strike re-selection for
//! moderate deviations. Stage 2 (at open, the fallback path used only when
//! the Live Strike Selector is disabled): gates on premium deviation
//! against a fresh quote, with limit recomputation.

use crate::candidate::{Candidate, CandidateState};
use crate::config::Config;
use crate::strike::{strike_interval, target_strike};
use csp_broker::{BrokerPort, Right};
use rust_decimal::Decimal;
use std::time::Duration;

/// Stage 1 retries PENDING quotes this many times before giving up, with
/// this delay between attempts. Not exposed as configuration — the
/// original's retry count for this path was a hardcoded constant, not a
/// tunable.
const STAGE2_MAX_PENDING_RETRIES: u32 = 3;
const STAGE2_PENDING_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage1Outcome {
    Ready,
    Adjusted { new_strike: Decimal },
    Stale { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage2Outcome {
    Ready { new_limit: Option<Decimal> },
    Adjusted { new_limit: Decimal },
    Stale { reason: String },
    Pending,
}

/// Validates every candidate against the live underlying price. Mutates
/// each candidate's `live.current_stock_price` and, on ADJUSTED, its
/// `live.adjusted_strike`; sets `state` to READY or STALE accordingly.
/// Candidates whose stock price could not be fetched are left STALE with a
/// "no price" reason.
pub async fn validate_stage1(candidates: &mut [Candidate], broker: &dyn BrokerPort, config: &Config) {
    for candidate in candidates.iter_mut() {
        let Some(current) = broker.get_stock_price(&candidate.staged.symbol).await else {
            candidate.state = CandidateState::Stale;
            continue;
        };
        candidate.live.current_stock_price = Some(current);

        let outcome = decide_stage1(candidate, current, broker, config).await;
        match outcome {
            Stage1Outcome::Ready => {
                candidate.state = CandidateState::Ready;
            }
            Stage1Outcome::Adjusted { new_strike } => {
                candidate.live.adjusted_strike = Some(new_strike);
                candidate.state = CandidateState::Ready;
            }
            Stage1Outcome::Stale { .. } => {
                candidate.state = CandidateState::Stale;
            }
        }
    }
}

async fn decide_stage1(
    candidate: &Candidate,
    current: Decimal,
    broker: &dyn BrokerPort,
    config: &Config,
) -> Stage1Outcome {
    let staged = candidate.staged.staged_stock_price;
    if staged <= Decimal::ZERO {
        return Stage1Outcome::Stale {
            reason: "staged stock price is non-positive".to_string(),
        };
    }
    let deviation = ((current - staged) / staged).abs();

    if deviation < config.max_deviation_ready {
        return Stage1Outcome::Ready;
    }

    let expiration = candidate.staged.expiration.format("%Y%m%d").to_string();
    let chain = broker
        .get_option_chain(&candidate.staged.symbol, &expiration)
        .await
        .unwrap_or_default();

    if deviation < config.max_deviation_adjust {
        return reselect_or_stale(current, config.min_otm_pct, &chain, "standard");
    }

    if deviation < config.max_deviation_stale {
        let aggressive_floor = config.min_otm_pct / Decimal::from(2);
        return reselect_or_stale(current, aggressive_floor, &chain, "aggressive");
    }

    Stage1Outcome::Stale {
        reason: format!("deviation {deviation} exceeds stale band"),
    }
}

fn reselect_or_stale(
    underlying: Decimal,
    otm_min: Decimal,
    chain: &[Decimal],
    attempt_kind: &str,
) -> Stage1Outcome {
    let interval = strike_interval(underlying, chain);
    match target_strike(underlying, otm_min, interval) {
        Some(candidate_strike) if chain.is_empty() || chain.contains(&candidate_strike) => {
            Stage1Outcome::Adjusted {
                new_strike: candidate_strike,
            }
        }
        Some(_) => Stage1Outcome::Stale {
            reason: format!("{attempt_kind} re-selection strike not present in chain"),
        },
        None => Stage1Outcome::Stale {
            reason: format!("no viable {attempt_kind} re-selection"),
        },
    }
}

/// Runs only when the Live Strike Selector is disabled. For each
/// Stage-1-READY candidate, fetches a fresh quote and applies the
/// asymmetric premium-deviation decision, retrying PENDING quotes (bid not
/// yet published) a bounded number of times.
pub async fn validate_stage2(candidates: &mut [Candidate], broker: &dyn BrokerPort, config: &Config) {
    for candidate in candidates.iter_mut() {
        if candidate.state != CandidateState::Ready {
            continue;
        }

        let outcome = fetch_and_decide_stage2(candidate, broker, config).await;
        match outcome {
            Stage2Outcome::Ready { new_limit } => {
                if let Some(limit) = new_limit {
                    candidate.live.adjusted_limit_price = Some(limit);
                }
                candidate.state = CandidateState::Confirmed;
            }
            Stage2Outcome::Adjusted { new_limit } => {
                candidate.live.adjusted_limit_price = Some(new_limit);
                candidate.state = CandidateState::Confirmed;
            }
            Stage2Outcome::Stale { .. } | Stage2Outcome::Pending => {
                candidate.state = CandidateState::Stale;
            }
        }
    }
}

async fn fetch_and_decide_stage2(
    candidate: &Candidate,
    broker: &dyn BrokerPort,
    config: &Config,
) -> Stage2Outcome {
    let expiration = candidate.staged.expiration.format("%Y%m%d").to_string();

    for attempt in 0..=STAGE2_MAX_PENDING_RETRIES {
        let quote = broker
            .get_option_quote(
                &candidate.staged.symbol,
                candidate.effective_strike(),
                &expiration,
                Right::Put,
            )
            .await;

        match quote {
            csp_broker::Quote::Invalid { .. } => {
                if attempt == STAGE2_MAX_PENDING_RETRIES {
                    return Stage2Outcome::Stale {
                        reason: "no bid after retries".to_string(),
                    };
                }
                tokio::time::sleep(STAGE2_PENDING_RETRY_DELAY).await;
                continue;
            }
            csp_broker::Quote::Valid { bid, ask, .. } => {
                return decide_stage2(candidate, bid, ask, config);
            }
        }
    }
    Stage2Outcome::Pending
}

fn decide_stage2(candidate: &Candidate, bid: Decimal, ask: Decimal, config: &Config) -> Stage2Outcome {
    let Some(current_underlying) = candidate.live.current_stock_price else {
        return Stage2Outcome::Stale {
            reason: "no underlying price recorded".to_string(),
        };
    };
    if current_underlying <= Decimal::ZERO {
        return Stage2Outcome::Stale {
            reason: "non-positive underlying".to_string(),
        };
    }

    let final_otm = (current_underlying - candidate.effective_strike()) / current_underlying;
    if final_otm < config.min_otm_pct {
        return Stage2Outcome::Stale {
            reason: format!("final OTM {final_otm} below floor"),
        };
    }

    let staged_limit = candidate.staged.staged_limit_price;
    if staged_limit <= Decimal::ZERO {
        return Stage2Outcome::Stale {
            reason: "staged limit is non-positive".to_string(),
        };
    }
    let premium_deviation = (bid - staged_limit) / staged_limit;
    let recomputed = csp_pricer::sell_limit(bid, ask, config.bid_mid_ratio).ok();

    if premium_deviation >= Decimal::ZERO {
        // Premium increased: favorable.
        if premium_deviation.abs() < config.max_premium_deviation_confirmed {
            Stage2Outcome::Ready { new_limit: recomputed }
        } else {
            match recomputed {
                Some(limit) => Stage2Outcome::Adjusted { new_limit: limit },
                None => Stage2Outcome::Stale {
                    reason: "could not recompute limit".to_string(),
                },
            }
        }
    } else if premium_deviation.abs() < config.max_premium_deviation_confirmed {
        Stage2Outcome::Ready { new_limit: None }
    } else if premium_deviation.abs() < config.max_premium_deviation_adjust {
        match recomputed {
            Some(limit) if limit >= config.premium_floor => Stage2Outcome::Adjusted { new_limit: limit },
            _ => Stage2Outcome::Stale {
                reason: "recomputed limit below premium floor".to_string(),
            },
        }
    } else {
        Stage2Outcome::Stale {
            reason: format!("premium deviation {premium_deviation} exceeds adjust band"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::StagedFacts;
    use chrono::NaiveDate;
    use csp_broker::mock::MockBroker;
    use rust_decimal_macros::dec;

    fn candidate(symbol: &str, strike: Decimal, staged_price: Decimal, staged_limit: Decimal) -> Candidate {
        Candidate::new(
            1,
            StagedFacts {
                symbol: symbol.to_string(),
                strike,
                expiration: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
                staged_stock_price: staged_price,
                staged_limit_price: staged_limit,
                staged_contracts: 5,
                staged_margin: dec!(3000),
                otm_fraction: dec!(0.03),
            },
        )
    }

    #[tokio::test]
    async fn stage1_marks_small_deviation_ready() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(154.5));
        let mut candidates = vec![candidate("AAPL", dec!(150), dec!(155), dec!(0.45))];
        let config = Config::default();

        validate_stage1(&mut candidates, &broker, &config).await;

        assert_eq!(candidates[0].state, CandidateState::Ready);
        assert!(candidates[0].live.adjusted_strike.is_none());
    }

    #[tokio::test]
    async fn stage1_marks_large_deviation_stale() {
        let broker = MockBroker::new();
        broker.set_stock_price("XOM", dec!(87));
        let mut candidates = vec![candidate("XOM", dec!(95), dec!(100), dec!(0.45))];
        let config = Config::default();

        validate_stage1(&mut candidates, &broker, &config).await;

        assert_eq!(candidates[0].state, CandidateState::Stale);
    }

    #[tokio::test]
    async fn stage1_reselects_strike_within_adjust_band_when_chain_confirms() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(161));
        broker.set_chain("AAPL", "20260214", vec![dec!(143), dec!(144), dec!(145), dec!(146)]);
        let mut candidates = vec![candidate("AAPL", dec!(150), dec!(155), dec!(0.45))];
        let config = Config::default();

        validate_stage1(&mut candidates, &broker, &config).await;

        assert_eq!(candidates[0].state, CandidateState::Ready);
        assert!(candidates[0].live.adjusted_strike.is_some());
    }

    #[tokio::test]
    async fn stage1_treats_reselection_absent_from_chain_as_stale() {
        let broker = MockBroker::new();
        broker.set_stock_price("AAPL", dec!(161));
        // Chain deliberately excludes any strike near the re-selection target.
        broker.set_chain("AAPL", "20260214", vec![dec!(200), dec!(205)]);
        let mut candidates = vec![candidate("AAPL", dec!(150), dec!(155), dec!(0.45))];
        let config = Config::default();

        validate_stage1(&mut candidates, &broker, &config).await;

        assert_eq!(candidates[0].state, CandidateState::Stale);
    }

    #[tokio::test]
    async fn stage2_pending_on_negative_bid_convention() {
        let broker = MockBroker::new();
        let mut c = candidate("AAPL", dec!(150), dec!(155), dec!(0.45));
        c.state = CandidateState::Ready;
        c.live.current_stock_price = Some(dec!(154.5));
        broker.set_quote(
            csp_broker::OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::invalid("not yet opened"),
        );
        let mut candidates = vec![c];
        let config = Config::default();

        // A persistently invalid (bid <= 0) quote retries as PENDING and
        // ends up STALE once retries are exhausted, never Stale-on-first-try.
        validate_stage2(&mut candidates, &broker, &config).await;
        assert_eq!(candidates[0].state, CandidateState::Stale);
    }

    #[tokio::test]
    async fn stage2_confirms_on_favorable_premium() {
        let broker = MockBroker::new();
        let mut c = candidate("AAPL", dec!(150), dec!(155), dec!(0.45));
        c.state = CandidateState::Ready;
        c.live.current_stock_price = Some(dec!(154.5));
        broker.set_quote(
            csp_broker::OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.46), dec!(0.50), None, 10, chrono::Utc::now()),
        );
        let mut candidates = vec![c];
        let config = Config::default();

        validate_stage2(&mut candidates, &broker, &config).await;

        assert_eq!(candidates[0].state, CandidateState::Confirmed);
    }
}
