use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bid/ask/last snapshot from the broker, or the reason none was
/// available.
///
/// A quote is [`Quote::Valid`] iff `(bid > 0 and ask > 0)` or `last > 0`
/// (NaN is impossible by construction since the fields are [`Decimal`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quote {
    Valid {
        bid: Decimal,
        ask: Decimal,
        last: Option<Decimal>,
        volume: i64,
        timestamp: DateTime<Utc>,
    },
    Invalid {
        reason: String,
    },
}

impl Quote {
    pub fn valid(bid: Decimal, ask: Decimal, last: Option<Decimal>, volume: i64, timestamp: DateTime<Utc>) -> Self {
        if (bid > Decimal::ZERO && ask > Decimal::ZERO) || last.is_some_and(|l| l > Decimal::ZERO) {
            Self::Valid {
                bid,
                ask,
                last,
                volume,
                timestamp,
            }
        } else {
            Self::Invalid {
                reason: "bid/ask/last all non-positive".to_string(),
            }
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn bid(&self) -> Option<Decimal> {
        match self {
            Self::Valid { bid, .. } => Some(*bid),
            Self::Invalid { .. } => None,
        }
    }

    pub fn ask(&self) -> Option<Decimal> {
        match self {
            Self::Valid { ask, .. } => Some(*ask),
            Self::Invalid { .. } => None,
        }
    }

    /// Spread as a fraction of bid: `(ask - bid) / bid`. `None` if invalid
    /// or bid is non-positive.
    pub fn spread_fraction(&self) -> Option<Decimal> {
        match self {
            Self::Valid { bid, ask, .. } if *bid > Decimal::ZERO => Some((*ask - *bid) / *bid),
            _ => None,
        }
    }
}
