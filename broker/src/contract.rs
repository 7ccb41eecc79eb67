use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Put or call. The pipeline only ever trades puts, but the wire type is
/// general because the broker's chain/quote endpoints are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Right {
    #[display("P")]
    Put,
    #[display("C")]
    Call,
}

/// Buy or sell side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// An option contract as constructed by [`crate::BrokerPort::get_option_contract`],
/// before broker-side qualification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    /// Expiration date formatted `YYYYMMDD`, matching the broker wire format.
    pub expiration: String,
    pub strike: rust_decimal::Decimal,
    pub right: Right,
}

impl OptionContract {
    pub fn new(
        symbol: impl Into<String>,
        expiration: impl Into<String>,
        strike: rust_decimal::Decimal,
        right: Right,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            expiration: expiration.into(),
            strike,
            right,
        }
    }
}

/// An [`OptionContract`] that the broker has confirmed exists and is
/// tradeable, carrying whatever broker-internal id it assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedContract {
    pub contract: OptionContract,
    pub broker_contract_id: i64,
}
