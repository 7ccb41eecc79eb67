//! # Market Condition Monitor
//!
//! A point-in-time snapshot consulted during the Tier 2 conditional-retry
//! window: volatility, the SPY proxy, and a sampled average bid-ask spread
//! across at most five contracts. `tier2_vix_low` only changes the reason
//! string's wording — it never affects the favorable flag.

use crate::config::Config;
use csp_broker::{BrokerPort, QualifiedContract};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

const MAX_SAMPLE_CONTRACTS: usize = 5;
const FALLBACK_VIX: Decimal = dec!(20.0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCondition {
    pub vix: Decimal,
    pub spy: Option<Decimal>,
    pub avg_spread: Option<Decimal>,
    pub favorable: bool,
    pub reason: String,
}

/// Samples `vix`, `spy`, and the average spread of up to
/// [`MAX_SAMPLE_CONTRACTS`] contracts, then classifies favorability.
pub async fn sample(broker: &dyn BrokerPort, contracts: &[QualifiedContract], config: &Config) -> MarketCondition {
    let vix = broker.get_stock_price("VIX").await.unwrap_or(FALLBACK_VIX);
    let spy = broker.get_stock_price("SPY").await;

    let sample_set = &contracts[..contracts.len().min(MAX_SAMPLE_CONTRACTS)];
    let quote_timeout = Duration::from_secs_f64(config.quote_fetch_timeout_seconds);
    let quotes = broker.get_quotes_batch(sample_set, quote_timeout).await;
    let spreads: Vec<Decimal> = quotes.iter().filter_map(|q| q.spread_fraction()).collect();
    let avg_spread = if spreads.is_empty() {
        None
    } else {
        Some(spreads.iter().sum::<Decimal>() / Decimal::from(spreads.len()))
    };

    let vix_ok = vix <= config.tier2_vix_high;
    let spread_ok = avg_spread.is_some_and(|s| s <= config.tier2_max_spread);
    let favorable = vix_ok && spread_ok;

    let vix_label = if vix <= config.tier2_vix_low {
        "calm"
    } else if vix_ok {
        "elevated"
    } else {
        "high"
    };
    let reason = match avg_spread {
        Some(spread) => format!(
            "vix {vix} ({vix_label}), avg spread {spread} ({})",
            if spread_ok { "tight" } else { "wide" }
        ),
        None => format!("vix {vix} ({vix_label}), no sample quotes available"),
    };

    MarketCondition {
        vix,
        spy,
        avg_spread,
        favorable,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csp_broker::mock::MockBroker;
    use csp_broker::{OptionContract, Quote, Right};

    fn contract(strike: Decimal) -> QualifiedContract {
        QualifiedContract {
            contract: OptionContract::new("AAPL", "20260214", strike, Right::Put),
            broker_contract_id: 1,
        }
    }

    #[tokio::test]
    async fn favorable_when_vix_and_spread_within_bounds() {
        let broker = MockBroker::new();
        broker.set_stock_price("VIX", dec!(16));
        broker.set_stock_price("SPY", dec!(450));
        broker.set_quote(
            contract(dec!(150)).contract,
            Quote::valid(dec!(0.45), dec!(0.47), None, 10, chrono::Utc::now()),
        );

        let config = Config::default();
        let condition = sample(&broker, &[contract(dec!(150))], &config).await;

        assert!(condition.favorable);
        assert!(condition.reason.contains("calm"));
    }

    #[tokio::test]
    async fn unfavorable_when_vix_exceeds_high_threshold() {
        let broker = MockBroker::new();
        broker.set_stock_price("VIX", dec!(30));

        let config = Config::default();
        let condition = sample(&broker, &[], &config).await;

        assert!(!condition.favorable);
    }

    #[tokio::test]
    async fn falls_back_to_default_vix_when_unavailable() {
        let broker = MockBroker::new();
        let config = Config::default();
        let condition = sample(&broker, &[], &config).await;
        assert_eq!(condition.vix, FALLBACK_VIX);
    }
}
