//! # Pending Order
//!
//! Per-order bookkeeping during submission and fill monitoring. Owned by
//! the [`crate::executor::RapidFireExecutor`]; the [`crate::fill_manager::FillManager`]
//! receives a borrowed mutable reference to the same map for the duration
//! of one `monitor_fills` call. Identity is the broker-assigned `order_id`;
//! on cancel-and-replace the old id is dropped and a new one inserted.

use chrono::{DateTime, Utc};
use csp_broker::{OrderId, OrderStatus, QualifiedContract};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTypeUsed {
    Adaptive,
    Limit,
    LimitFallback,
}

impl std::fmt::Display for OrderTypeUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adaptive => write!(f, "ADAPTIVE"),
            Self::Limit => write!(f, "LIMIT"),
            Self::LimitFallback => write!(f, "LIMIT (fallback)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: OrderId,
    pub contract: QualifiedContract,
    pub candidate_id: u64,
    pub symbol: String,
    pub staged_contracts: u32,
    pub initial_limit: Decimal,
    pub current_limit: Decimal,
    pub last_bid: Decimal,
    pub last_ask: Decimal,
    pub submitted_at: DateTime<Utc>,
    pub last_status: OrderStatus,
    pub filled_qty: u32,
    pub remaining_qty: u32,
    pub fill_price: Option<Decimal>,
    pub order_type: OrderTypeUsed,
    pub adjustment_count: u32,
}

impl PendingOrder {
    pub fn partial_fill_ratio(&self) -> Decimal {
        if self.staged_contracts == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.filled_qty) / Decimal::from(self.staged_contracts)
    }

    pub fn is_partially_filled(&self) -> bool {
        self.filled_qty > 0 && self.remaining_qty > 0
    }
}
