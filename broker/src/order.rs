use crate::contract::Side;
use derive_more::{Constructor, Display, From};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker-assigned order identifier. Identity of a [`crate::BrokerPort`]
/// order; a cancel-and-replace drops the old id and mints a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    #[default]
    Day,
    GoodTillCancel,
}

/// Adaptive-algo submission priority. The pipeline only ever requests
/// `Urgent`, but the wire type carries the broker's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum AdaptivePriority {
    Urgent,
    Normal,
    Patient,
}

/// Order variant accepted by the broker wire protocol (§6): a plain limit,
/// or an adaptive algo order layered on top of a limit floor.
#[derive(Debug, Clone, PartialEq, Constructor, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: Side,
    pub quantity: u32,
    pub limit_price: Decimal,
    pub time_in_force: TimeInForce,
    pub outside_rth: bool,
    pub kind: OrderKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Adaptive { priority: AdaptivePriority },
}

impl OrderRequest {
    pub fn limit(side: Side, quantity: u32, limit_price: Decimal) -> Self {
        Self {
            side,
            quantity,
            limit_price,
            time_in_force: TimeInForce::Day,
            outside_rth: false,
            kind: OrderKind::Limit,
        }
    }

    pub fn adaptive(side: Side, quantity: u32, limit_price: Decimal) -> Self {
        Self {
            side,
            quantity,
            limit_price,
            time_in_force: TimeInForce::Day,
            outside_rth: false,
            kind: OrderKind::Adaptive {
                priority: AdaptivePriority::Urgent,
            },
        }
    }
}

/// Lifecycle status of a submitted order, as reported by the broker's
/// order-status event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    PreSubmitted,
    Filled,
    PartiallyFilled,
    Cancelled,
    ApiCancelled,
    Rejected,
    /// The broker rejected the adaptive algo itself (not the order); the
    /// placer recovers by cancelling and resubmitting as a plain limit.
    Inactive,
}

impl OrderStatus {
    /// Cancel/reject statuses that end monitoring for this order id.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::ApiCancelled | Self::Rejected | Self::Inactive
        )
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled)
    }
}

/// One order-status update delivered by the broker's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_qty: u32,
    pub remaining_qty: u32,
    pub fill_price: Option<Decimal>,
}
