//! # Persistence Port
//!
//! The durable store the scheduler writes through at every phase boundary.
//! The core never interprets what is stored beyond what it needs to
//! de-duplicate and upsert; schema and storage engine are out of scope.

use crate::trade::Trade;
use async_trait::async_trait;
use csp_broker::OrderId;
use serde_json::Value;
use thiserror::Error;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("persistence failed for order {order_id}: {reason}")]
    Failed { order_id: OrderId, reason: String },
}

/// Durable store the scheduler writes through. Implementations should
/// treat every call as independent — a failure for one trade must not
/// prevent persistence of another.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Inserts a new Trade row.
    async fn insert_trade(&self, trade: &Trade) -> Result<(), PersistenceError>;

    /// Looks up a Trade by its durable de-duplication key.
    async fn find_trade_by_order_id(&self, order_id: &OrderId) -> Option<Trade>;

    /// Updates an existing Trade row in place.
    async fn update_trade(&self, trade: &Trade) -> Result<(), PersistenceError>;

    /// Inserts a rich, flat feature record keyed by `trade_id`. Opaque to
    /// the core — it only gathers the fields it already has on hand at
    /// fill time and hands them off for a downstream learning component to
    /// interpret.
    async fn insert_entry_snapshot(
        &self,
        trade_id: &str,
        fields: HashMap<String, Value>,
    ) -> Result<(), PersistenceError>;

    /// Transitions a candidate's persisted lifecycle state (e.g. STAGED to
    /// EXECUTED at fill time).
    async fn update_candidate_state(
        &self,
        candidate_id: u64,
        state: crate::candidate::CandidateState,
    ) -> Result<(), PersistenceError>;
}

/// An in-memory [`PersistencePort`] for tests: no I/O, just a `Vec` of
/// whatever was written, inspectable after the call under test.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    inner: std::sync::Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    trades: Vec<Trade>,
    snapshots: Vec<(String, HashMap<String, Value>)>,
    candidate_states: Vec<(u64, crate::candidate::CandidateState)>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.inner.lock().unwrap().trades.clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().unwrap().snapshots.len()
    }

    pub fn candidate_state_transitions(&self) -> Vec<(u64, crate::candidate::CandidateState)> {
        self.inner.lock().unwrap().candidate_states.clone()
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn insert_trade(&self, trade: &Trade) -> Result<(), PersistenceError> {
        self.inner.lock().unwrap().trades.push(trade.clone());
        Ok(())
    }

    async fn find_trade_by_order_id(&self, order_id: &OrderId) -> Option<Trade> {
        self.inner
            .lock()
            .unwrap()
            .trades
            .iter()
            .find(|t| &t.order_id == order_id)
            .cloned()
    }

    async fn update_trade(&self, trade: &Trade) -> Result<(), PersistenceError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state
            .trades
            .iter_mut()
            .find(|t| t.order_id == trade.order_id)
        {
            *existing = trade.clone();
        }
        Ok(())
    }

    async fn insert_entry_snapshot(
        &self,
        trade_id: &str,
        fields: HashMap<String, Value>,
    ) -> Result<(), PersistenceError> {
        self.inner
            .lock()
            .unwrap()
            .snapshots
            .push((trade_id.to_string(), fields));
        Ok(())
    }

    async fn update_candidate_state(
        &self,
        candidate_id: u64,
        state: crate::candidate::CandidateState,
    ) -> Result<(), PersistenceError> {
        self.inner
            .lock()
            .unwrap()
            .candidate_states
            .push((candidate_id, state));
        Ok(())
    }
}
