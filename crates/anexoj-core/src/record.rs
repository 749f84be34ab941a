//! A single normalized trade event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::nature::{Nature, NatureCell};
use crate::side::Side;

/// One normalized trade event from a broker statement.
///
/// Records are immutable once constructed. Quantity and price are
/// non-negative by contract; adapters enforce this when parsing.
/// Jurisdictions are ISO 3166-1 numeric codes (0 when unknown).
///
/// The tax nature is deliberately not a plain field: it comes from an
/// external classification service, so the record carries a [`NatureCell`]
/// that resolves it at most once, only if read.
#[derive(Debug)]
pub struct Record {
    /// Security identifier (ISIN for the bundled adapters).
    pub symbol: String,
    /// Buy, sell, or unknown.
    pub side: Side,
    /// Number of units traded, non-negative.
    pub quantity: Decimal,
    /// Price per unit, non-negative.
    pub price: Decimal,
    /// When the trade executed.
    pub timestamp: DateTime<Utc>,
    /// Fees charged on this trade.
    pub fees: Decimal,
    /// Taxes withheld on this trade.
    pub taxes: Decimal,
    /// ISO numeric code of the broker's jurisdiction.
    pub broker_country: u32,
    /// ISO numeric code of the security's jurisdiction.
    pub asset_country: u32,

    nature: NatureCell,
}

impl Record {
    /// Create a record with zero fees/taxes, no jurisdictions and an
    /// unknown nature. Use the `with_*` builders to fill in the rest.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        price: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            timestamp,
            fees: Decimal::ZERO,
            taxes: Decimal::ZERO,
            broker_country: 0,
            asset_country: 0,
            nature: NatureCell::default(),
        }
    }

    /// Set the fees charged on this trade.
    #[must_use]
    pub fn with_fees(mut self, fees: Decimal) -> Self {
        self.fees = fees;
        self
    }

    /// Set the taxes withheld on this trade.
    #[must_use]
    pub fn with_taxes(mut self, taxes: Decimal) -> Self {
        self.taxes = taxes;
        self
    }

    /// Set the broker and asset jurisdiction codes.
    #[must_use]
    pub fn with_countries(mut self, broker: u32, asset: u32) -> Self {
        self.broker_country = broker;
        self.asset_country = asset;
        self
    }

    /// Attach the nature accessor for this record.
    #[must_use]
    pub fn with_nature(mut self, nature: NatureCell) -> Self {
        self.nature = nature;
        self
    }

    /// Resolve the tax nature of this record's security.
    ///
    /// The underlying lookup runs at most once; failures surface as
    /// [`Nature::Unknown`] and are never retried.
    pub async fn nature(&self) -> Nature {
        self.nature.get().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_builder_defaults() {
        let rec = Record::new("US0378331005", Side::Buy, dec!(10), dec!(20), Utc::now());

        assert_eq!(rec.fees, Decimal::ZERO);
        assert_eq!(rec.taxes, Decimal::ZERO);
        assert_eq!(rec.broker_country, 0);
        assert_eq!(rec.asset_country, 0);
        assert_eq!(rec.nature().await, Nature::Unknown);
    }

    #[tokio::test]
    async fn test_builder_fills_fields() {
        let rec = Record::new("IE00B4L5Y983", Side::Sell, dec!(3), dec!(80.5), Utc::now())
            .with_fees(dec!(0.15))
            .with_taxes(dec!(1.20))
            .with_countries(826, 372)
            .with_nature(NatureCell::known(Nature::G20));

        assert_eq!(rec.fees, dec!(0.15));
        assert_eq!(rec.taxes, dec!(1.20));
        assert_eq!(rec.broker_country, 826);
        assert_eq!(rec.asset_country, 372);
        assert_eq!(rec.nature().await, Nature::G20);
    }
}
