//! # Rapid-Fire Executor
//!
//! Drives the 09:30 submission burst and the monitoring window that
//! follows it: batch-qualifies every CONFIRMED candidate's contract,
//! fetches a quote per contract (one retry at a longer timeout), places
//! each through the [`crate::placer`], and then polls the broker's
//! order-status stream until every order reaches a terminal state or
//! `rapid_fire_max_wait_seconds` elapses — repricing orders that have
//! drifted past `adjustment_threshold` along the way.

use crate::candidate::{Candidate, CandidateState};
use crate::config::Config;
use crate::pending_order::PendingOrder;
use crate::placer::{self, MarketSession};
use crate::report::ExecutionSummary;
use crate::shutdown::AsyncShutdown;
use csp_broker::{
    BrokerPort, OptionContract, OrderId, OrderStatus, OrderStatusEvent, OrderStatusHandler,
    OrderStatusSubscription, Quote, Right,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct SubmissionOutcome {
    pub submitted: Vec<ExecutionSummary>,
    pub skipped: Vec<ExecutionSummary>,
    pub warnings: Vec<String>,
}

/// Owns the order-status subscription and the pending-order bookkeeping
/// map for one scheduler run. Not `Clone` — there is exactly one per run.
#[derive(Default)]
pub struct RapidFireExecutor {
    pending: Arc<Mutex<HashMap<OrderId, PendingOrder>>>,
    subscription: Option<OrderStatusSubscription>,
}

impl RapidFireExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<PendingOrder> {
        self.pending.lock().unwrap().values().cloned().collect()
    }

    /// Registers the order-status handler. The closure only ever mutates
    /// the entry keyed by the event's own `order_id`, so it never races
    /// with another order's bookkeeping.
    pub fn watch_order_status(&mut self, broker: &dyn BrokerPort) {
        let pending = Arc::clone(&self.pending);
        let handler: OrderStatusHandler = Arc::new(move |event: OrderStatusEvent| {
            if let Some(order) = pending.lock().unwrap().get_mut(&event.order_id) {
                order.last_status = event.status;
                order.filled_qty = event.filled_qty;
                order.remaining_qty = event.remaining_qty;
                if let Some(price) = event.fill_price {
                    order.fill_price = Some(price);
                }
            }
        });
        self.subscription = Some(broker.subscribe_order_status(handler));
    }

    /// Submits every CONFIRMED candidate. Candidates left in any other
    /// state are not touched — the caller is expected to have already
    /// dropped non-confirmed candidates from validation or strike
    /// selection.
    pub async fn submit_all(
        &self,
        candidates: &mut [Candidate],
        session: MarketSession,
        broker: &dyn BrokerPort,
        config: &Config,
    ) -> SubmissionOutcome {
        let mut submitted = Vec::new();
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();

        let confirmed: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.state == CandidateState::Confirmed)
            .map(|(i, _)| i)
            .collect();
        if confirmed.is_empty() {
            return SubmissionOutcome {
                submitted,
                skipped,
                warnings,
            };
        }

        let contracts: Vec<OptionContract> = confirmed
            .iter()
            .map(|&i| {
                let c = &candidates[i];
                OptionContract::new(
                    c.staged.symbol.clone(),
                    c.staged.expiration.format("%Y%m%d").to_string(),
                    c.effective_strike(),
                    Right::Put,
                )
            })
            .collect();
        let qualified = broker.qualify_contracts_async(contracts).await;

        let quote_timeout = Duration::from_secs_f64(config.execution_quote_timeout_seconds);
        let retry_timeout = Duration::from_secs_f64(config.execution_quote_retry_timeout_seconds);

        for (slot, &idx) in confirmed.iter().enumerate() {
            let qc = match &qualified[slot] {
                Ok(qc) => qc.clone(),
                Err(e) => {
                    candidates[idx].state = CandidateState::Failed;
                    skipped.push(skip_summary(
                        &candidates[idx],
                        &format!("contract qualification failed: {e}"),
                    ));
                    continue;
                }
            };

            let mut quote = broker.get_quote(&qc, quote_timeout).await;
            if !quote.is_valid() {
                quote = broker.get_quote(&qc, retry_timeout).await;
            }
            if !quote.is_valid() {
                candidates[idx].state = CandidateState::Failed;
                skipped.push(skip_summary(&candidates[idx], "no tradeable quote after retry"));
                continue;
            }

            match placer::place(&candidates[idx], &qc, &quote, session, broker, config).await {
                Ok(placement) => {
                    let expiration = candidates[idx].staged.expiration.format("%Y%m%d").to_string();
                    let order = PendingOrder {
                        order_id: placement.order_id.clone(),
                        contract: qc,
                        candidate_id: candidates[idx].id,
                        symbol: candidates[idx].staged.symbol.clone(),
                        staged_contracts: candidates[idx].staged.staged_contracts,
                        initial_limit: placement.computed_limit,
                        current_limit: placement.computed_limit,
                        last_bid: placement.live_bid,
                        last_ask: placement.live_ask,
                        submitted_at: chrono::Utc::now(),
                        last_status: OrderStatus::Submitted,
                        filled_qty: 0,
                        remaining_qty: candidates[idx].staged.staged_contracts,
                        fill_price: None,
                        order_type: placement.order_type,
                        adjustment_count: 0,
                    };
                    let mut summary = ExecutionSummary::from_pending_order(&order, expiration);
                    summary.strike = candidates[idx].effective_strike();
                    self.pending.lock().unwrap().insert(placement.order_id, order);
                    if let Some(w) = placement.warning {
                        warnings.push(w);
                    }
                    submitted.push(summary);
                }
                Err(rejection) => {
                    candidates[idx].state = CandidateState::Failed;
                    skipped.push(skip_summary(&candidates[idx], &rejection.reason));
                }
            }
        }

        if submitted.is_empty() {
            warnings.push(format!(
                "CRITICAL: 0 of {} confirmed candidates were submitted",
                confirmed.len()
            ));
        }

        SubmissionOutcome {
            submitted,
            skipped,
            warnings,
        }
    }

    /// Polls every `fill_check_interval_seconds`, repricing orders that
    /// have drifted past `adjustment_threshold`, until every order reaches
    /// a terminal status or `rapid_fire_max_wait_seconds` elapses. Returns
    /// every order that reached a terminal status during this call — the
    /// caller should treat whatever is still in [`RapidFireExecutor::snapshot`]
    /// afterward as "left working" and hand it to the fill manager.
    pub async fn monitor(&self, broker: &dyn BrokerPort, config: &Config) -> Vec<PendingOrder> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(config.rapid_fire_max_wait_seconds);
        let interval = Duration::from_secs(config.fill_check_interval_seconds.max(1));
        let mut drained = Vec::new();

        loop {
            drained.extend(self.drain_terminal());
            if self.pending.lock().unwrap().is_empty() || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(interval).await;
            self.reprice_drifted_orders(broker, config).await;
        }

        drained
    }

    fn drain_terminal(&self) -> Vec<PendingOrder> {
        let mut pending = self.pending.lock().unwrap();
        let terminal_ids: Vec<OrderId> = pending
            .values()
            .filter(|o| o.last_status.is_terminal_failure() || o.last_status.is_filled())
            .map(|o| o.order_id.clone())
            .collect();
        terminal_ids
            .into_iter()
            .filter_map(|id| pending.remove(&id))
            .collect()
    }

    /// Implements step 3 of the monitoring loop: a fresh short-timeout
    /// quote per still-open order, and a cancel-and-replace whenever
    /// `current_limit - ask` has drifted past `adjustment_threshold`. The
    /// new limit is never set below `premium_min`.
    async fn reprice_drifted_orders(&self, broker: &dyn BrokerPort, config: &Config) {
        let quote_timeout = Duration::from_secs_f64(config.quote_fetch_timeout_seconds);
        let working: Vec<PendingOrder> = {
            let pending = self.pending.lock().unwrap();
            pending
                .values()
                .filter(|o| {
                    !o.last_status.is_terminal_failure()
                        && !o.last_status.is_filled()
                        && o.adjustment_count < config.max_price_adjustments_tier1
                })
                .cloned()
                .collect()
        };

        for order in working {
            let Quote::Valid { bid, ask, .. } = broker.get_quote(&order.contract, quote_timeout).await else {
                continue;
            };
            if order.current_limit - ask <= config.adjustment_threshold {
                continue;
            }
            let Ok(recomputed) = csp_pricer::sell_limit(bid, ask, config.bid_mid_ratio) else {
                continue;
            };
            let new_limit = recomputed.max(config.premium_min);

            if let Ok(ack) = broker
                .modify_order(&order.order_id, new_limit, None, Some("rapid-fire repricing"))
                .await
            {
                let mut pending = self.pending.lock().unwrap();
                if let Some(mut existing) = pending.remove(&order.order_id) {
                    existing.order_id = ack.order_id.clone();
                    existing.current_limit = new_limit;
                    existing.last_status = ack.status;
                    existing.last_bid = bid;
                    existing.last_ask = ask;
                    existing.adjustment_count += 1;
                    pending.insert(ack.order_id, existing);
                }
            }
        }
    }
}

impl AsyncShutdown for RapidFireExecutor {
    type Result = ();

    async fn shutdown(&mut self) -> Self::Result {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.pending.lock().unwrap().clear();
    }
}

fn skip_summary(candidate: &Candidate, reason: &str) -> ExecutionSummary {
    ExecutionSummary {
        candidate_id: candidate.id,
        order_id: None,
        symbol: candidate.staged.symbol.clone(),
        strike: candidate.effective_strike(),
        expiration: candidate.staged.expiration.format("%Y%m%d").to_string(),
        contracts: candidate.staged.staged_contracts,
        contracts_filled: 0,
        fill_price: None,
        fill_time: None,
        submitted_limit: Decimal::ZERO,
        staged_limit: candidate.effective_limit_price(),
        order_type: None,
        adjustments_made: 0,
        reason: Some(reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::StagedFacts;
    use chrono::NaiveDate;
    use csp_broker::mock::MockBroker;
    use csp_broker::{OptionContract, Right};
    use rust_decimal_macros::dec;

    fn confirmed_candidate(id: u64, symbol: &str, strike: Decimal) -> Candidate {
        let mut c = Candidate::new(
            id,
            StagedFacts {
                symbol: symbol.to_string(),
                strike,
                expiration: NaiveDate::from_ymd_opt(2026, 2, 14).unwrap(),
                staged_stock_price: dec!(155),
                staged_limit_price: dec!(0.45),
                staged_contracts: 5,
                staged_margin: dec!(3000),
                otm_fraction: dec!(0.03),
            },
        );
        c.state = CandidateState::Confirmed;
        c
    }

    #[tokio::test]
    async fn submits_every_confirmed_candidate_and_tracks_it_as_pending() {
        let broker = MockBroker::new();
        broker.set_quote(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.45), dec!(0.50), None, 10, chrono::Utc::now()),
        );

        let mut candidates = vec![confirmed_candidate(1, "AAPL", dec!(150))];
        let executor = RapidFireExecutor::new();
        let config = Config::default();

        let outcome = executor
            .submit_all(&mut candidates, MarketSession::Regular, &broker, &config)
            .await;

        assert_eq!(outcome.submitted.len(), 1);
        assert!(outcome.skipped.is_empty());
        assert_eq!(executor.pending_count(), 1);
    }

    #[tokio::test]
    async fn skips_candidate_with_no_tradeable_quote() {
        let broker = MockBroker::new();
        // No quote seeded for this contract: MockBroker defaults to an
        // invalid quote, so this candidate should be skipped, not submitted.
        let mut candidates = vec![confirmed_candidate(1, "MSFT", dec!(300))];
        let executor = RapidFireExecutor::new();
        let config = Config::default();

        let outcome = executor
            .submit_all(&mut candidates, MarketSession::Regular, &broker, &config)
            .await;

        assert!(outcome.submitted.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(candidates[0].state, CandidateState::Failed);
    }

    #[tokio::test]
    async fn shutdown_clears_pending_map() {
        let broker = MockBroker::new();
        broker.set_quote(
            OptionContract::new("AAPL", "20260214", dec!(150), Right::Put),
            csp_broker::Quote::valid(dec!(0.45), dec!(0.50), None, 10, chrono::Utc::now()),
        );
        let mut candidates = vec![confirmed_candidate(1, "AAPL", dec!(150))];
        let mut executor = RapidFireExecutor::new();
        executor.watch_order_status(&broker);
        let config = Config::default();
        executor
            .submit_all(&mut candidates, MarketSession::Regular, &broker, &config)
            .await;
        assert_eq!(executor.pending_count(), 1);

        executor.shutdown().await;
        assert_eq!(executor.pending_count(), 0);
    }
}
