//! # Pipeline Error
//!
//! Per the error-handling design, almost everything the pipeline encounters
//! is recoverable and is recorded on the [`crate::report::ExecutionReport`]
//! rather than propagated. Exactly two conditions unwind the scheduler:
//! a clock-sync failure (never touched the broker, so it is safe to abort
//! before any side effect) and a broker-connection failure (orders already
//! placed remain with the broker for the next run's reconciliation).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("clock drift {drift_ms}ms exceeds threshold {threshold_ms}ms")]
    ClockUnsynced { drift_ms: i64, threshold_ms: i64 },

    #[error("broker connection failed: {0}")]
    BrokerConnection(String),
}
