//! # Fill Manager
//!
//! A finer-grained alternative to the rapid-fire executor's own monitoring
//! loop, used when Tier 1 hands off a still-working pending-order map for a
//! longer watch window. Detects partial fills and cancels-and-replaces the
//! remainder, and steps resting limits down on a slower cadence than the
//! executor's own repricing, bounded by a *per-symbol* adjustment cap since
//! `order_id` changes on every cancel-and-replace.

use crate::config::Config;
use crate::pending_order::PendingOrder;
use csp_broker::{BrokerPort, OrderId, OrderRequest, OrderStatus, Quote, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FillManagerOutcome {
    /// Every order that left the map during this call, keyed by its final
    /// status, for the caller to bucket into the execution report.
    pub drained: Vec<PendingOrder>,
    /// Snapshots of orders at the moment they were observed filled,
    /// captured before removal so persistence can still see them even
    /// though the live map no longer holds them.
    pub filled_snapshots: Vec<PendingOrder>,
    pub warnings: Vec<String>,
}

/// Runs for `fill_monitor_window_seconds`, checking every
/// `fill_check_interval_seconds` and re-pricing every
/// `fill_adjustment_interval_seconds`.
pub async fn monitor_fills(
    pending: &mut HashMap<OrderId, PendingOrder>,
    broker: &dyn BrokerPort,
    config: &Config,
) -> FillManagerOutcome {
    let mut outcome = FillManagerOutcome::default();
    let mut adjustment_counts: HashMap<String, u32> = HashMap::new();

    let window = Duration::from_secs(config.fill_monitor_window_seconds);
    let check_interval = Duration::from_secs(config.fill_check_interval_seconds.max(1));
    let adjustment_interval = Duration::from_secs(config.fill_adjustment_interval_seconds.max(1));

    let start = tokio::time::Instant::now();
    let mut last_adjustment = start;

    loop {
        drain_completed(pending, &mut outcome);

        if pending.is_empty() {
            break;
        }
        if tokio::time::Instant::now().duration_since(start) >= window {
            timeout_remaining(pending, broker, config, &mut outcome).await;
            break;
        }

        tokio::time::sleep(check_interval).await;

        handle_partial_fills(pending, broker, config, &mut outcome).await;

        if tokio::time::Instant::now().duration_since(last_adjustment) >= adjustment_interval {
            step_down_resting_limits(pending, broker, config, &mut adjustment_counts, &mut outcome).await;
            last_adjustment = tokio::time::Instant::now();
        }
    }

    outcome
}

fn drain_completed(pending: &mut HashMap<OrderId, PendingOrder>, outcome: &mut FillManagerOutcome) {
    let completed_ids: Vec<OrderId> = pending
        .values()
        .filter(|o| {
            matches!(
                o.last_status,
                OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Inactive | OrderStatus::ApiCancelled
            )
        })
        .map(|o| o.order_id.clone())
        .collect();

    for id in completed_ids {
        if let Some(order) = pending.remove(&id) {
            if order.last_status == OrderStatus::Filled {
                outcome.filled_snapshots.push(order.clone());
            }
            outcome.drained.push(order);
        }
    }
}

async fn handle_partial_fills(
    pending: &mut HashMap<OrderId, PendingOrder>,
    broker: &dyn BrokerPort,
    config: &Config,
    outcome: &mut FillManagerOutcome,
) {
    let partials: Vec<PendingOrder> = pending
        .values()
        .filter(|o| o.is_partially_filled())
        .cloned()
        .collect();

    for order in partials {
        let ratio = order.partial_fill_ratio();
        if ratio < config.fill_partial_threshold {
            outcome.warnings.push(format!(
                "{} partially filled at {ratio:.2}, below threshold {} — leaving in place",
                order.symbol, config.fill_partial_threshold
            ));
            continue;
        }

        let quote_timeout = Duration::from_secs_f64(config.quote_fetch_timeout_seconds);
        let Quote::Valid { bid, ask, .. } = broker.get_quote(&order.contract, quote_timeout).await else {
            continue;
        };
        let Ok(recomputed) = csp_pricer::sell_limit(bid, ask, config.bid_mid_ratio) else {
            continue;
        };
        let new_limit = recomputed.max(config.premium_floor);

        broker.cancel_order(&order.order_id, Some("partial fill — replacing remainder")).await;
        let remaining_request = OrderRequest::limit(Side::Sell, order.remaining_qty, new_limit);
        if let Ok(ack) = broker
            .place_order(&order.contract, remaining_request, Some("remainder after partial fill"))
            .await
        {
            pending.remove(&order.order_id);
            pending.insert(
                ack.order_id.clone(),
                PendingOrder {
                    order_id: ack.order_id,
                    contract: order.contract.clone(),
                    candidate_id: order.candidate_id,
                    symbol: order.symbol.clone(),
                    staged_contracts: order.remaining_qty,
                    initial_limit: order.initial_limit,
                    current_limit: new_limit,
                    last_bid: bid,
                    last_ask: ask,
                    submitted_at: order.submitted_at,
                    last_status: ack.status,
                    filled_qty: 0,
                    remaining_qty: order.remaining_qty,
                    fill_price: None,
                    order_type: order.order_type,
                    adjustment_count: order.adjustment_count,
                },
            );
        }
    }
}

async fn step_down_resting_limits(
    pending: &mut HashMap<OrderId, PendingOrder>,
    broker: &dyn BrokerPort,
    config: &Config,
    adjustment_counts: &mut HashMap<String, u32>,
    outcome: &mut FillManagerOutcome,
) {
    let open: Vec<PendingOrder> = pending.values().cloned().collect();

    for order in open {
        let count = adjustment_counts.entry(order.symbol.clone()).or_insert(0);
        if *count >= config.max_price_adjustments_fill_manager {
            continue;
        }

        let new_limit = order.current_limit - config.price_adjustment_increment;
        if new_limit < config.premium_floor {
            outcome.warnings.push(format!(
                "{} resting limit would fall below premium floor — skipping adjustment",
                order.symbol
            ));
            continue;
        }

        if let Ok(ack) = broker
            .modify_order(&order.order_id, new_limit, None, Some("fill manager step-down"))
            .await
        {
            pending.remove(&order.order_id);
            let mut replaced = order;
            replaced.order_id = ack.order_id.clone();
            replaced.current_limit = new_limit;
            replaced.last_status = ack.status;
            pending.insert(ack.order_id, replaced);
            *count += 1;
        }
    }
}

async fn timeout_remaining(
    pending: &mut HashMap<OrderId, PendingOrder>,
    broker: &dyn BrokerPort,
    config: &Config,
    outcome: &mut FillManagerOutcome,
) {
    if config.fill_leave_working {
        return;
    }
    let open_ids: Vec<OrderId> = pending.keys().cloned().collect();
    for id in open_ids {
        broker.cancel_order(&id, Some("fill manager window expired")).await;
        if let Some(mut order) = pending.remove(&id) {
            order.last_status = OrderStatus::Cancelled;
            outcome.drained.push(order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use csp_broker::mock::MockBroker;
    use csp_broker::{OptionContract, OrderStatusEvent, QualifiedContract, Right};
    use rust_decimal_macros::dec;

    fn contract() -> QualifiedContract {
        QualifiedContract {
            contract: OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            broker_contract_id: 1,
        }
    }

    fn order(id: &str, status: OrderStatus, filled_qty: u32, remaining_qty: u32) -> PendingOrder {
        PendingOrder {
            order_id: csp_broker::OrderId::new(id),
            contract: contract(),
            candidate_id: 1,
            symbol: "AAPL".to_string(),
            staged_contracts: 5,
            initial_limit: dec!(0.45),
            current_limit: dec!(0.45),
            last_bid: dec!(0.45),
            last_ask: dec!(0.50),
            submitted_at: Utc::now(),
            last_status: status,
            filled_qty,
            remaining_qty,
            fill_price: if status == OrderStatus::Filled { Some(dec!(0.45)) } else { None },
            order_type: crate::pending_order::OrderTypeUsed::Adaptive,
            adjustment_count: 0,
        }
    }

    #[tokio::test]
    async fn drains_filled_order_and_snapshots_it() {
        let broker = MockBroker::new();
        let mut pending = HashMap::new();
        pending.insert(csp_broker::OrderId::new("o1"), order("o1", OrderStatus::Filled, 5, 0));
        let mut config = Config::default();
        config.fill_monitor_window_seconds = 0;

        let outcome = monitor_fills(&mut pending, &broker, &config).await;

        assert_eq!(outcome.filled_snapshots.len(), 1);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn cancels_remaining_orders_on_timeout_when_not_leaving_working() {
        let broker = MockBroker::new();
        let mut pending = HashMap::new();
        pending.insert(
            csp_broker::OrderId::new("o1"),
            order("o1", OrderStatus::Submitted, 0, 5),
        );
        let mut config = Config::default();
        config.fill_monitor_window_seconds = 0;
        config.fill_leave_working = false;

        let outcome = monitor_fills(&mut pending, &broker, &config).await;

        assert!(pending.is_empty());
        assert_eq!(outcome.drained.len(), 1);
    }

    #[test]
    fn event_shape_matches_broker_contract() {
        let event = OrderStatusEvent {
            order_id: csp_broker::OrderId::new("o1"),
            status: OrderStatus::Filled,
            filled_qty: 5,
            remaining_qty: 0,
            fill_price: Some(Decimal::from(1)),
        };
        assert_eq!(event.filled_qty, 5);
    }
}
