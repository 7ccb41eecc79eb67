use crate::{
    contract::{OptionContract, QualifiedContract, Right},
    error::BrokerError,
    greeks::Greeks,
    order::{OrderId, OrderRequest, OrderStatus, OrderStatusEvent},
    quote::Quote,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{sync::Arc, time::Duration};

/// Result of a successful [`BrokerPort::place_order`] or
/// [`BrokerPort::modify_order`] call. `order_id` is the id to key a
/// `PendingOrder` on; on a cancel-and-replace `modify_order` it is a new id,
/// distinct from the one passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// A completed execution as reported by the broker, used by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerExecution {
    pub order_id: OrderId,
    pub symbol: String,
    pub strike: Decimal,
    pub expiration: String,
    pub right: Right,
    pub fill_price: Decimal,
    pub fill_time: DateTime<Utc>,
    pub quantity: u32,
}

/// Callback invoked synchronously for every order-status update. Must not
/// re-enter the broker; all it may safely do is mutate pipeline-side state
/// keyed on `order_id`.
pub type OrderStatusHandler = Arc<dyn Fn(OrderStatusEvent) + Send + Sync>;

/// A handle returned by [`BrokerPort::subscribe_order_status`]. Dropping it
/// (or calling [`OrderStatusSubscription::unsubscribe`] explicitly)
/// deregisters the handler. A scheduler run owns exactly one subscription.
#[must_use = "dropping this immediately unsubscribes the handler"]
pub struct OrderStatusSubscription {
    unsubscribe: Box<dyn FnOnce() + Send>,
}

impl OrderStatusSubscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Box::new(unsubscribe),
        }
    }

    pub fn unsubscribe(self) {
        (self.unsubscribe)();
    }
}

impl std::fmt::Debug for OrderStatusSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStatusSubscription").finish()
    }
}

/// Abstract brokerage capability consumed by the execution pipeline:
/// quotes, option chains, contract qualification, order
/// submit/cancel/modify, an order-status event stream, and fill/execution
/// queries for reconciliation.
///
/// Implementations are expected to be cheaply cloneable handles (e.g. an
/// `Arc`-wrapped connection) since the pipeline holds one for the whole
/// scheduler run.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Current or last traded price of the underlying.
    async fn get_stock_price(&self, symbol: &str) -> Option<Decimal>;

    /// Synchronous-shaped quote helper used by Stage 2 of the validator.
    async fn get_option_quote(
        &self,
        symbol: &str,
        strike: Decimal,
        expiration: &str,
        right: Right,
    ) -> Quote;

    /// Event-driven quote fetch for a qualified contract, bounded by
    /// `timeout`.
    async fn get_quote(&self, contract: &QualifiedContract, timeout: Duration) -> Quote;

    /// Parallel quote fetch with independent per-quote timeouts. Order of
    /// the result matches the order of `contracts`.
    async fn get_quotes_batch(
        &self,
        contracts: &[QualifiedContract],
        timeout: Duration,
    ) -> Vec<Quote>;

    /// Constructs an (unqualified) [`OptionContract`] descriptor.
    fn get_option_contract(
        &self,
        symbol: &str,
        expiration: &str,
        strike: Decimal,
        right: Right,
    ) -> OptionContract {
        OptionContract::new(symbol, expiration, strike, right)
    }

    /// Batch contract qualification. One element's failure does not fail
    /// the others.
    async fn qualify_contracts_async(
        &self,
        contracts: Vec<OptionContract>,
    ) -> Vec<Result<QualifiedContract, BrokerError>>;

    /// All strikes available for `symbol` at `expiration`, via the broker's
    /// security-definition-option-params endpoint.
    async fn get_option_chain(
        &self,
        symbol: &str,
        expiration: &str,
    ) -> Result<Vec<Decimal>, BrokerError>;

    /// Time-bounded Greeks read for one contract. Internally subscribes and
    /// unsubscribes; callers should still wrap this in their own timeout
    /// since a slow broker response can otherwise stall a fan-out.
    async fn get_greeks(&self, contract: &QualifiedContract) -> Option<Greeks>;

    /// Submits an order, returning the broker-assigned id and its initial
    /// status.
    async fn place_order(
        &self,
        contract: &QualifiedContract,
        order: OrderRequest,
        reason: Option<&str>,
    ) -> Result<OrderAck, BrokerError>;

    /// Cancels an order. Implementations retry transient failures
    /// internally; the boolean reports whether the order ended up
    /// cancelled.
    async fn cancel_order(&self, order_id: &OrderId, reason: Option<&str>) -> bool;

    /// Modifies an order's limit price in place, or performs a
    /// cancel-and-replace if the broker has no true modify, in which case
    /// the returned `order_id` differs from the one passed in.
    async fn modify_order(
        &self,
        order_id: &OrderId,
        new_limit: Decimal,
        new_quantity: Option<u32>,
        reason: Option<&str>,
    ) -> Result<OrderAck, BrokerError>;

    /// Registers a handler on the order-status event stream. The returned
    /// subscription must be kept alive for as long as updates are wanted;
    /// dropping it unsubscribes.
    fn subscribe_order_status(&self, handler: OrderStatusHandler) -> OrderStatusSubscription;

    /// All trades known to the broker for the current session.
    async fn get_trades(&self) -> Vec<BrokerExecution>;

    /// All fills known to the broker for the current session.
    async fn get_fills(&self) -> Vec<BrokerExecution>;

    /// Executions since `since`, used by the reconciler.
    async fn get_executions(&self, since: DateTime<Utc>) -> Vec<BrokerExecution>;

    /// What-if margin requirement for selling `contracts` of the given put.
    async fn get_margin_requirement(
        &self,
        symbol: &str,
        strike: Decimal,
        expiration: &str,
        right: Right,
        contracts: u32,
    ) -> Result<Decimal, BrokerError>;

    /// Pre-flight market-data connectivity check.
    async fn check_market_data_health(&self) -> (bool, Option<String>);
}
