//! # Configuration
//!
//! Every threshold and timing in the pipeline is a configuration value,
//! never hardcoded. [`Config::default`] reproduces the defaults; individual
//! fields can be overridden from the environment with
//! [`Config::from_env`], mirroring the original's per-module
//! `*Config.from_env()` loaders.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub use_adaptive_algo: bool,
    pub max_execution_spread: Decimal,
    pub adjustment_threshold: Decimal,
    pub rapid_fire_max_wait_seconds: u64,
    pub quote_fetch_timeout_seconds: f64,
    pub execution_quote_timeout_seconds: f64,
    pub execution_quote_retry_timeout_seconds: f64,
    pub premium_min: Decimal,
    pub premium_floor: Decimal,
    pub price_adjustment_increment: Decimal,
    pub max_price_adjustments_fill_manager: u32,
    pub max_price_adjustments_tier1: u32,
    pub bid_mid_ratio: Decimal,
    pub fill_monitor_window_seconds: u64,
    pub fill_check_interval_seconds: u64,
    pub fill_adjustment_interval_seconds: u64,
    pub fill_partial_threshold: Decimal,
    pub fill_leave_working: bool,
    pub strike_target_delta: Decimal,
    pub strike_delta_tolerance: Decimal,
    pub min_otm_pct: Decimal,
    pub strike_min_open_interest: i64,
    pub strike_max_candidates: usize,
    pub greeks_wait_timeout_seconds: u64,
    pub strike_fallback_to_otm: bool,
    pub max_deviation_ready: Decimal,
    pub max_deviation_adjust: Decimal,
    pub max_deviation_stale: Decimal,
    pub max_premium_deviation_confirmed: Decimal,
    pub max_premium_deviation_adjust: Decimal,
    pub max_premium_deviation_stale: Decimal,
    pub tier2_vix_low: Decimal,
    pub tier2_vix_high: Decimal,
    pub tier2_max_spread: Decimal,
    pub tier2_check_interval_seconds: u64,
    pub tier2_limit_adjustment: Decimal,
    pub tier2_enabled: bool,
    pub tier2_window_start: String,
    pub tier2_window_end: String,
    pub stage1_time: String,
    pub tier1_execution_time: String,
    pub reconciliation_time: String,
    pub clock_sync_threshold_ms: i64,
    pub max_total_margin: Decimal,
    pub max_positions: usize,
    /// When set, the Live Strike Selector replaces Stage 2 of the
    /// validator. When unset, Stage 2's premium-deviation check runs
    /// instead.
    pub use_live_strike_selector: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_adaptive_algo: true,
            max_execution_spread: dec!(0.30),
            adjustment_threshold: dec!(0.02),
            rapid_fire_max_wait_seconds: 120,
            quote_fetch_timeout_seconds: 0.5,
            execution_quote_timeout_seconds: 3.0,
            execution_quote_retry_timeout_seconds: 5.0,
            premium_min: dec!(0.30),
            premium_floor: dec!(0.20),
            price_adjustment_increment: dec!(0.01),
            max_price_adjustments_fill_manager: 2,
            max_price_adjustments_tier1: 5,
            bid_mid_ratio: dec!(0.30),
            fill_monitor_window_seconds: 600,
            fill_check_interval_seconds: 2,
            fill_adjustment_interval_seconds: 60,
            fill_partial_threshold: dec!(0.5),
            fill_leave_working: true,
            strike_target_delta: dec!(0.20),
            strike_delta_tolerance: dec!(0.05),
            min_otm_pct: dec!(0.10),
            strike_min_open_interest: 50,
            strike_max_candidates: 5,
            greeks_wait_timeout_seconds: 5,
            strike_fallback_to_otm: true,
            max_deviation_ready: dec!(0.03),
            max_deviation_adjust: dec!(0.05),
            max_deviation_stale: dec!(0.10),
            max_premium_deviation_confirmed: dec!(0.15),
            max_premium_deviation_adjust: dec!(0.50),
            max_premium_deviation_stale: dec!(0.50),
            tier2_vix_low: dec!(18),
            tier2_vix_high: dec!(25),
            tier2_max_spread: dec!(0.08),
            tier2_check_interval_seconds: 300,
            tier2_limit_adjustment: dec!(1.10),
            tier2_enabled: true,
            tier2_window_start: "09:45".to_string(),
            tier2_window_end: "10:30".to_string(),
            stage1_time: "09:15".to_string(),
            tier1_execution_time: "09:30".to_string(),
            reconciliation_time: "10:30".to_string(),
            clock_sync_threshold_ms: 50,
            max_total_margin: dec!(100000),
            max_positions: 15,
            use_live_strike_selector: true,
        }
    }
}

impl Config {
    /// Overrides individual fields from the environment, leaving everything
    /// else at its default. Unparseable values are ignored with a warning
    /// rather than aborting startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        macro_rules! override_decimal {
            ($field:ident, $env:literal) => {
                if let Ok(raw) = std::env::var($env) {
                    match raw.parse() {
                        Ok(value) => config.$field = value,
                        Err(_) => tracing::warn!("ignoring invalid {} = {raw:?}", $env),
                    }
                }
            };
        }
        macro_rules! override_value {
            ($field:ident, $env:literal) => {
                if let Ok(raw) = std::env::var($env) {
                    match raw.parse() {
                        Ok(value) => config.$field = value,
                        Err(_) => tracing::warn!("ignoring invalid {} = {raw:?}", $env),
                    }
                }
            };
        }

        override_value!(use_adaptive_algo, "CSP_USE_ADAPTIVE_ALGO");
        override_decimal!(max_execution_spread, "CSP_MAX_EXECUTION_SPREAD");
        override_decimal!(premium_min, "CSP_PREMIUM_MIN");
        override_decimal!(premium_floor, "CSP_PREMIUM_FLOOR");
        override_decimal!(max_total_margin, "CSP_MAX_TOTAL_MARGIN");
        override_value!(max_positions, "CSP_MAX_POSITIONS");
        override_value!(clock_sync_threshold_ms, "CSP_CLOCK_SYNC_THRESHOLD_MS");

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.bid_mid_ratio, dec!(0.30));
        assert_eq!(config.premium_floor, dec!(0.20));
        assert_eq!(config.tier2_limit_adjustment, dec!(1.10));
        assert_eq!(config.max_price_adjustments_tier1, 5);
        assert_eq!(config.max_price_adjustments_fill_manager, 2);
    }

    #[test]
    fn from_env_overrides_only_set_fields() {
        std::env::set_var("CSP_PREMIUM_FLOOR", "0.25");
        let config = Config::from_env();
        assert_eq!(config.premium_floor, dec!(0.25));
        assert_eq!(config.premium_min, dec!(0.30));
        std::env::remove_var("CSP_PREMIUM_FLOOR");
    }
}
