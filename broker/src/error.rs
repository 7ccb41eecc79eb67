use thiserror::Error;

/// Errors a [`crate::BrokerPort`] implementation can surface.
///
/// Per the pipeline's error-handling design, only [`BrokerError::Connection`]
/// is fatal to a scheduler run; every other variant is handled at the call
/// site (retried, recorded per-candidate, or treated as "not yet available").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connection(String),

    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no option chain for {symbol} at {expiration}")]
    NoChain { symbol: String, expiration: String },

    #[error("contract qualification failed: {0}")]
    QualificationFailed(String),

    #[error("order placement rejected: {0}")]
    OrderRejected(String),

    #[error("cancel/replace failed: {0}")]
    CancelOrReplaceFailed(String),

    #[error("margin lookup failed: {0}")]
    MarginUnavailable(String),
}
