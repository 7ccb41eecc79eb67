//! # Reconciler
//!
//! Runs once, at the end of the window: pulls every execution the broker has
//! recorded since session start and compares it against local Trade state.
//! A local Trade still PENDING whose order_id shows up as a broker fill is
//! brought up to date. Records that only exist on one side are logged as
//! deltas, never treated as errors — the broker is the source of truth for
//! what actually happened to an order, but a record existing only locally
//! (never reached the broker) or only at the broker (this process never
//! persisted it) is expected during partial failure, not a bug to surface as
//! a hard error.

use crate::trade::{Trade, TradeState};
use chrono::{DateTime, Utc};
use csp_broker::{BrokerExecution, BrokerPort};

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationDelta {
    /// A local Trade was PENDING but the broker reports it filled; the local
    /// record was updated to match.
    UpdatedFromBrokerFill { order_id: csp_broker::OrderId },
    /// The broker reports an execution with no matching local Trade.
    BrokerOnly { order_id: csp_broker::OrderId },
    /// A local Trade is still PENDING with no corresponding broker
    /// execution found since session start.
    LocalOnly { order_id: csp_broker::OrderId },
}

/// Queries broker executions since `session_start`, matches by `order_id`
/// against every Trade the persistence layer knows about, and upserts any
/// local record that diverges. Returns the deltas observed, for logging.
pub async fn sync_all_orders(
    broker: &dyn BrokerPort,
    persistence: &dyn crate::persistence::PersistencePort,
    local_trades: &[Trade],
    session_start: DateTime<Utc>,
) -> Vec<ReconciliationDelta> {
    let executions = broker.get_executions(session_start).await;
    let mut deltas = Vec::new();

    for execution in &executions {
        match local_trades.iter().find(|t| t.order_id == execution.order_id) {
            Some(trade) if trade.state == TradeState::Pending => {
                let mut updated = trade.clone();
                updated.mark_filled(execution.fill_price, execution.fill_time);
                if let Err(err) = persistence.update_trade(&updated).await {
                    tracing::warn!(order_id = %execution.order_id, %err, "failed to persist reconciliation update");
                }
                deltas.push(ReconciliationDelta::UpdatedFromBrokerFill {
                    order_id: execution.order_id.clone(),
                });
            }
            Some(_) => {}
            None => {
                tracing::info!(order_id = %execution.order_id, "broker execution has no local trade record");
                deltas.push(ReconciliationDelta::BrokerOnly {
                    order_id: execution.order_id.clone(),
                });
            }
        }
    }

    for trade in local_trades.iter().filter(|t| t.state == TradeState::Pending) {
        let seen = executions.iter().any(|e: &BrokerExecution| e.order_id == trade.order_id);
        if !seen {
            tracing::info!(order_id = %trade.order_id, "local trade has no matching broker execution yet");
            deltas.push(ReconciliationDelta::LocalOnly {
                order_id: trade.order_id.clone(),
            });
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use csp_broker::mock::MockBroker;
    use csp_broker::{OrderId, Right};
    use rust_decimal_macros::dec;

    fn pending_trade(order_id: &str) -> Trade {
        Trade::new_pending(
            OrderId::new(order_id),
            "AAPL",
            dec!(150),
            "20260214",
            dec!(0.45),
            Utc::now(),
            5,
            dec!(0.03),
            10,
        )
    }

    #[tokio::test]
    async fn updates_local_pending_trade_when_broker_reports_fill() {
        let broker = MockBroker::new();
        let session_start = Utc::now() - chrono::Duration::hours(1);
        broker.seed_execution(BrokerExecution {
            order_id: OrderId::new("o1"),
            symbol: "AAPL".to_string(),
            strike: dec!(150),
            expiration: "20260214".to_string(),
            right: Right::Put,
            fill_price: dec!(0.46),
            fill_time: Utc::now(),
            quantity: 5,
        });
        let persistence = InMemoryPersistence::new();
        let trades = vec![pending_trade("o1")];

        let deltas = sync_all_orders(&broker, &persistence, &trades, session_start).await;

        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], ReconciliationDelta::UpdatedFromBrokerFill { .. }));
    }

    #[tokio::test]
    async fn local_only_trade_is_reported_without_erroring() {
        let broker = MockBroker::new();
        let persistence = InMemoryPersistence::new();
        let trades = vec![pending_trade("o2")];

        let deltas = sync_all_orders(&broker, &persistence, &trades, Utc::now()).await;

        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], ReconciliationDelta::LocalOnly { .. }));
    }

    #[tokio::test]
    async fn broker_only_execution_is_reported() {
        let broker = MockBroker::new();
        broker.seed_execution(BrokerExecution {
            order_id: OrderId::new("o3"),
            symbol: "AAPL".to_string(),
            strike: dec!(150),
            expiration: "20260214".to_string(),
            right: Right::Put,
            fill_price: dec!(0.46),
            fill_time: Utc::now(),
            quantity: 5,
        });
        let persistence = InMemoryPersistence::new();

        let deltas = sync_all_orders(&broker, &persistence, &[], Utc::now() - chrono::Duration::hours(1)).await;

        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], ReconciliationDelta::BrokerOnly { .. }));
    }
}
