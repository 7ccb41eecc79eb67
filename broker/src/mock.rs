//! In-memory [`BrokerPort`] test double. Stands in for a live TWS/IBKR
//! connection in unit and scheduler-level tests: quotes, chains, and Greeks
//! are pre-seeded by the test, orders are tracked in memory, and status
//! transitions are driven explicitly via [`MockBroker::push_status`] rather
//! than a real event stream.

use crate::{
    contract::{OptionContract, QualifiedContract, Right},
    error::BrokerError,
    greeks::Greeks,
    order::{OrderId, OrderRequest, OrderStatus, OrderStatusEvent},
    port::{BrokerExecution, BrokerPort, OrderAck, OrderStatusHandler, OrderStatusSubscription},
    quote::Quote,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Debug, Clone)]
struct MockOrder {
    contract: OptionContract,
    request: OrderRequest,
    status: OrderStatus,
}

#[derive(Default)]
struct MockState {
    stock_prices: HashMap<String, Decimal>,
    quotes: HashMap<OptionContract, Quote>,
    chains: HashMap<(String, String), Vec<Decimal>>,
    greeks: HashMap<OptionContract, Greeks>,
    margins: HashMap<OptionContract, Decimal>,
    qualification_failures: std::collections::HashSet<OptionContract>,
    orders: HashMap<OrderId, MockOrder>,
    executions: Vec<BrokerExecution>,
    next_order_seq: u64,
    next_contract_id: i64,
    subscribers: Vec<(u64, OrderStatusHandler)>,
    next_sub_id: u64,
    market_data_healthy: bool,
}

/// A minimal, fully in-process [`BrokerPort`] for tests. Every getter
/// returns whatever was last seeded via the `set_*`/`seed_*` helpers;
/// nothing here simulates real network latency or broker-side rejection
/// logic beyond what a test explicitly asks for.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                market_data_healthy: true,
                ..Default::default()
            })),
        }
    }

    pub fn set_stock_price(&self, symbol: &str, price: Decimal) {
        self.state
            .lock()
            .unwrap()
            .stock_prices
            .insert(symbol.to_string(), price);
    }

    pub fn set_quote(&self, contract: OptionContract, quote: Quote) {
        self.state.lock().unwrap().quotes.insert(contract, quote);
    }

    pub fn set_chain(&self, symbol: &str, expiration: &str, strikes: Vec<Decimal>) {
        self.state
            .lock()
            .unwrap()
            .chains
            .insert((symbol.to_string(), expiration.to_string()), strikes);
    }

    pub fn set_greeks(&self, contract: OptionContract, greeks: Greeks) {
        self.state.lock().unwrap().greeks.insert(contract, greeks);
    }

    pub fn set_margin(&self, contract: OptionContract, margin: Decimal) {
        self.state.lock().unwrap().margins.insert(contract, margin);
    }

    pub fn fail_qualification(&self, contract: OptionContract) {
        self.state
            .lock()
            .unwrap()
            .qualification_failures
            .insert(contract);
    }

    pub fn set_market_data_healthy(&self, healthy: bool) {
        self.state.lock().unwrap().market_data_healthy = healthy;
    }

    pub fn seed_execution(&self, execution: BrokerExecution) {
        self.state.lock().unwrap().executions.push(execution);
    }

    pub fn order_status(&self, order_id: &OrderId) -> Option<OrderStatus> {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(order_id)
            .map(|o| o.status)
    }

    /// Simulates the broker pushing a status update: updates internal
    /// bookkeeping and notifies every subscriber, exactly as a real
    /// order-status event stream would.
    pub fn push_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        filled_qty: u32,
        remaining_qty: u32,
        fill_price: Option<Decimal>,
    ) {
        let handlers = {
            let mut state = self.state.lock().unwrap();
            if let Some(order) = state.orders.get_mut(order_id) {
                order.status = status;
            }
            state.subscribers.iter().map(|(_, h)| h.clone()).collect::<Vec<_>>()
        };
        let event = OrderStatusEvent {
            order_id: order_id.clone(),
            status,
            filled_qty,
            remaining_qty,
            fill_price,
        };
        for handler in handlers {
            handler(event.clone());
        }
    }

    fn next_order_id(state: &mut MockState) -> OrderId {
        state.next_order_seq += 1;
        OrderId::new(format!("mock-{}", state.next_order_seq))
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn get_stock_price(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().unwrap().stock_prices.get(symbol).copied()
    }

    async fn get_option_quote(
        &self,
        symbol: &str,
        strike: Decimal,
        expiration: &str,
        right: Right,
    ) -> Quote {
        let contract = OptionContract::new(symbol, expiration, strike, right);
        self.state
            .lock()
            .unwrap()
            .quotes
            .get(&contract)
            .cloned()
            .unwrap_or_else(|| Quote::invalid("no quote seeded"))
    }

    async fn get_quote(&self, contract: &QualifiedContract, _timeout: Duration) -> Quote {
        self.state
            .lock()
            .unwrap()
            .quotes
            .get(&contract.contract)
            .cloned()
            .unwrap_or_else(|| Quote::invalid("no quote seeded"))
    }

    async fn get_quotes_batch(
        &self,
        contracts: &[QualifiedContract],
        timeout: Duration,
    ) -> Vec<Quote> {
        let mut out = Vec::with_capacity(contracts.len());
        for contract in contracts {
            out.push(self.get_quote(contract, timeout).await);
        }
        out
    }

    async fn qualify_contracts_async(
        &self,
        contracts: Vec<OptionContract>,
    ) -> Vec<Result<QualifiedContract, BrokerError>> {
        let mut state = self.state.lock().unwrap();
        contracts
            .into_iter()
            .map(|contract| {
                if state.qualification_failures.contains(&contract) {
                    Err(BrokerError::QualificationFailed(format!(
                        "{}:{}:{}",
                        contract.symbol, contract.strike, contract.expiration
                    )))
                } else {
                    state.next_contract_id += 1;
                    Ok(QualifiedContract {
                        broker_contract_id: state.next_contract_id,
                        contract,
                    })
                }
            })
            .collect()
    }

    async fn get_option_chain(
        &self,
        symbol: &str,
        expiration: &str,
    ) -> Result<Vec<Decimal>, BrokerError> {
        self.state
            .lock()
            .unwrap()
            .chains
            .get(&(symbol.to_string(), expiration.to_string()))
            .cloned()
            .ok_or_else(|| BrokerError::NoChain {
                symbol: symbol.to_string(),
                expiration: expiration.to_string(),
            })
    }

    async fn get_greeks(&self, contract: &QualifiedContract) -> Option<Greeks> {
        self.state
            .lock()
            .unwrap()
            .greeks
            .get(&contract.contract)
            .copied()
    }

    async fn place_order(
        &self,
        contract: &QualifiedContract,
        order: OrderRequest,
        _reason: Option<&str>,
    ) -> Result<OrderAck, BrokerError> {
        let mut state = self.state.lock().unwrap();
        let order_id = Self::next_order_id(&mut state);
        state.orders.insert(
            order_id.clone(),
            MockOrder {
                contract: contract.contract.clone(),
                request: order,
                status: OrderStatus::Submitted,
            },
        );
        Ok(OrderAck {
            order_id,
            status: OrderStatus::Submitted,
        })
    }

    async fn cancel_order(&self, order_id: &OrderId, _reason: Option<&str>) -> bool {
        let mut state = self.state.lock().unwrap();
        if let Some(order) = state.orders.get_mut(order_id) {
            order.status = OrderStatus::Cancelled;
            true
        } else {
            false
        }
    }

    async fn modify_order(
        &self,
        order_id: &OrderId,
        new_limit: Decimal,
        new_quantity: Option<u32>,
        reason: Option<&str>,
    ) -> Result<OrderAck, BrokerError> {
        // The mock always performs cancel-and-replace, matching brokers with
        // no true in-place modify.
        let mut state = self.state.lock().unwrap();
        let Some(mut order) = state.orders.remove(order_id) else {
            return Err(BrokerError::CancelOrReplaceFailed(format!(
                "unknown order {order_id}"
            )));
        };
        order.status = OrderStatus::Cancelled;
        order.request.limit_price = new_limit;
        if let Some(qty) = new_quantity {
            order.request.quantity = qty;
        }
        order.status = OrderStatus::Submitted;
        let new_id = Self::next_order_id(&mut state);
        let _ = reason;
        state.orders.insert(new_id.clone(), order);
        Ok(OrderAck {
            order_id: new_id,
            status: OrderStatus::Submitted,
        })
    }

    fn subscribe_order_status(&self, handler: OrderStatusHandler) -> OrderStatusSubscription {
        let mut state = self.state.lock().unwrap();
        state.next_sub_id += 1;
        let id = state.next_sub_id;
        state.subscribers.push((id, handler));
        let weak = Arc::downgrade(&self.state);
        OrderStatusSubscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().unwrap().subscribers.retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    async fn get_trades(&self) -> Vec<BrokerExecution> {
        self.state.lock().unwrap().executions.clone()
    }

    async fn get_fills(&self) -> Vec<BrokerExecution> {
        self.state.lock().unwrap().executions.clone()
    }

    async fn get_executions(&self, since: DateTime<Utc>) -> Vec<BrokerExecution> {
        self.state
            .lock()
            .unwrap()
            .executions
            .iter()
            .filter(|e| e.fill_time >= since)
            .cloned()
            .collect()
    }

    async fn get_margin_requirement(
        &self,
        symbol: &str,
        strike: Decimal,
        expiration: &str,
        right: Right,
        _contracts: u32,
    ) -> Result<Decimal, BrokerError> {
        let contract = OptionContract::new(symbol, expiration, strike, right);
        self.state
            .lock()
            .unwrap()
            .margins
            .get(&contract)
            .copied()
            .ok_or_else(|| BrokerError::MarginUnavailable(symbol.to_string()))
    }

    async fn check_market_data_health(&self) -> (bool, Option<String>) {
        let healthy = self.state.lock().unwrap().market_data_healthy;
        if healthy {
            (true, None)
        } else {
            (false, Some("mock market data unhealthy".to_string()))
        }
    }
}
