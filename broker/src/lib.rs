#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Broker Port
//!
//! The abstract brokerage capability the execution pipeline depends on:
//! quotes, option chains, contract qualification, order
//! submit/cancel/modify, an order-status event stream, and fill/execution
//! queries for reconciliation.
//!
//! The pipeline never talks to a concrete broker SDK directly — everything
//! goes through [`BrokerPort`], so a live IBKR/TWS client and the
//! in-process [`mock::MockBroker`] are interchangeable in tests.

pub mod contract;
pub mod error;
pub mod greeks;
pub mod mock;
pub mod order;
pub mod port;
pub mod quote;

pub use contract::{OptionContract, QualifiedContract, Right, Side};
pub use error::BrokerError;
pub use greeks::Greeks;
pub use order::{
    AdaptivePriority, OrderId, OrderKind, OrderRequest, OrderStatus, OrderStatusEvent, TimeInForce,
};
pub use port::{BrokerExecution, BrokerPort, OrderAck, OrderStatusHandler, OrderStatusSubscription};
pub use quote::Quote;
