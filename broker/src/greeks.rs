use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A Greeks + market snapshot for one strike, as reported by the broker's
/// option computation subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: Decimal,
    pub iv: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: i64,
    pub open_interest: i64,
}
