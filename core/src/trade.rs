//! # Trade
//!
//! A persisted record of one submitted-then-filled cash-secured put.
//! `trade_id` is a stable logical identifier computed once, from the
//! effective strike, at first persistence; `order_id` is the durable
//! de-duplication key within a session (see [`crate::persistence`]).

use chrono::{DateTime, Utc};
use csp_broker::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Pending,
    Filled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub order_id: OrderId,
    pub symbol: String,
    pub strike: Decimal,
    /// Expiration formatted `YYYYMMDD`, matching the broker wire format.
    pub expiration: String,
    pub state: TradeState,
    pub entry_premium: Decimal,
    pub entry_date: DateTime<Utc>,
    pub contracts: u32,
    pub otm_fraction: Decimal,
    pub dte: i64,
    pub reasoning: String,
}

/// `{symbol}_{strike}_{expiration:YYYYMMDD}_{P|C}`, computed once from the
/// effective (possibly adjusted) strike. Never recomputed after a Trade is
/// first persisted, even if the strike is adjusted again later — there is
/// no setter for this field on [`Trade`].
pub fn trade_id(symbol: &str, strike: Decimal, expiration: &str) -> String {
    format!("{symbol}_{strike}_{expiration}_P")
}

#[allow(clippy::too_many_arguments)]
impl Trade {
    pub fn new_pending(
        order_id: OrderId,
        symbol: impl Into<String>,
        strike: Decimal,
        expiration: impl Into<String>,
        entry_premium: Decimal,
        entry_date: DateTime<Utc>,
        contracts: u32,
        otm_fraction: Decimal,
        dte: i64,
    ) -> Self {
        let symbol = symbol.into();
        let expiration = expiration.into();
        let trade_id = trade_id(&symbol, strike, &expiration);
        Self {
            trade_id,
            order_id,
            symbol,
            strike,
            expiration,
            state: TradeState::Pending,
            entry_premium,
            entry_date,
            contracts,
            otm_fraction,
            dte,
            reasoning: "PENDING — awaiting fill".to_string(),
        }
    }

    /// Transitions this trade in place to FILLED. Does not touch
    /// `trade_id`.
    pub fn mark_filled(&mut self, fill_price: Decimal, fill_time: DateTime<Utc>) {
        self.state = TradeState::Filled;
        self.entry_premium = fill_price;
        self.entry_date = fill_time;
        self.reasoning = "Executed".to_string();
    }
}
