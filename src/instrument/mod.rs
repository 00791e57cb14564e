//! Instrument data model and registry
//!
//! Canonical in-memory quote state for the fixed instrument universe,
//! plus the append-only tick point model used for price history.

mod registry;

pub use registry::{Registry, RegistryError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tradable instrument with live quote state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique instrument identifier
    pub id: String,
    /// Ticker symbol
    pub symbol: String,
    /// Human-readable display name
    pub name: String,
    /// Listing market code (e.g. "NASDAQ")
    pub market: String,
    /// Quote currency
    pub currency: String,
    /// Most recent price
    pub last_price: Decimal,
    /// Close of the previous session; fixed at seed/bootstrap, never
    /// mutated intra-tick
    pub previous_close: Decimal,
    /// last_price - previous_close
    pub change_amount: Decimal,
    /// change_amount / previous_close * 100
    pub change_percentage: Decimal,
    /// Highest price observed in the current session
    pub day_high: Decimal,
    /// Lowest price observed in the current session
    pub day_low: Decimal,
    /// Cumulative traded volume for the session
    pub volume: u64,
    /// Market capitalization
    pub market_cap: Decimal,
    /// Timestamp of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Create a freshly seeded instrument
    ///
    /// Derived fields start from the seed price: day bounds collapse to
    /// the price itself, change stats are zero, previous_close equals the
    /// seed price so the first tick computes change against a fixed base.
    #[allow(clippy::too_many_arguments)]
    pub fn seeded(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        market: impl Into<String>,
        currency: impl Into<String>,
        price: Decimal,
        volume: u64,
        market_cap: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            market: market.into(),
            currency: currency.into(),
            last_price: price,
            previous_close: price,
            change_amount: Decimal::ZERO,
            change_percentage: Decimal::ZERO,
            day_high: price,
            day_low: price,
            volume,
            market_cap,
            updated_at: Utc::now(),
        }
    }

    /// Check the per-instrument price invariant
    pub fn bounds_ok(&self) -> bool {
        self.last_price > Decimal::ZERO
            && self.day_low <= self.last_price
            && self.last_price <= self.day_high
    }
}

/// A single historical price observation, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickPoint {
    /// Instrument the observation belongs to
    pub instrument_id: String,
    /// Observed price
    pub price: Decimal,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_seeded_instrument_derived_fields() {
        let inst = Instrument::seeded(
            "aapl",
            "AAPL",
            "Apple Inc.",
            "NASDAQ",
            "USD",
            dec!(178.50),
            0,
            dec!(2800000000000),
        );

        assert_eq!(inst.last_price, dec!(178.50));
        assert_eq!(inst.previous_close, dec!(178.50));
        assert_eq!(inst.day_high, dec!(178.50));
        assert_eq!(inst.day_low, dec!(178.50));
        assert_eq!(inst.change_amount, Decimal::ZERO);
        assert_eq!(inst.change_percentage, Decimal::ZERO);
        assert!(inst.bounds_ok());
    }

    #[test]
    fn test_bounds_ok_rejects_inverted_bounds() {
        let mut inst = Instrument::seeded(
            "x",
            "X",
            "X Corp",
            "NYSE",
            "USD",
            dec!(10),
            0,
            dec!(1000),
        );
        inst.day_low = dec!(11);
        assert!(!inst.bounds_ok());
    }

    #[test]
    fn test_instrument_serde_round_trip() {
        let inst = Instrument::seeded(
            "msft",
            "MSFT",
            "Microsoft Corporation",
            "NASDAQ",
            "USD",
            dec!(410.20),
            1200,
            dec!(3100000000000),
        );

        let json = serde_json::to_string(&inst).unwrap();
        let back: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, inst.id);
        assert_eq!(back.last_price, inst.last_price);
        assert_eq!(back.volume, inst.volume);
    }
}
