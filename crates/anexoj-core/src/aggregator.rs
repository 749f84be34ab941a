//! Concurrency-safe sink that keeps report items and running totals.

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio_util::sync::CancellationToken;

use crate::report::{ReportItem, ReportSink};

/// Money values in the annex carry two decimal places, rounded half away
/// from zero at accumulation time.
fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A [`ReportSink`] that accumulates items and totals in memory.
///
/// Writes are serialized under an exclusive lock; totals fold in each
/// item's 2-decimal-rounded values at write time, so readers never see a
/// partially-applied item. Reads take the shared lock and return copies.
#[derive(Debug, Default)]
pub struct Aggregator {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    items: Vec<ReportItem>,
    total_earned: Decimal,
    total_spent: Decimal,
    total_fees: Decimal,
    total_taxes: Decimal,
}

impl Aggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every item written so far, in write order.
    ///
    /// The snapshot is detached: writes that land after this call do not
    /// show up in the returned vector.
    #[must_use]
    pub fn items(&self) -> Vec<ReportItem> {
        self.inner.read().items.clone()
    }

    /// Sum of rounded sell values.
    #[must_use]
    pub fn total_earned(&self) -> Decimal {
        self.inner.read().total_earned
    }

    /// Sum of rounded buy values.
    #[must_use]
    pub fn total_spent(&self) -> Decimal {
        self.inner.read().total_spent
    }

    /// Sum of rounded fees.
    #[must_use]
    pub fn total_fees(&self) -> Decimal {
        self.inner.read().total_fees
    }

    /// Sum of rounded taxes.
    #[must_use]
    pub fn total_taxes(&self) -> Decimal {
        self.inner.read().total_taxes
    }
}

#[async_trait]
impl ReportSink for Aggregator {
    /// Append the item and fold it into the totals.
    ///
    /// Never fails; the error return only satisfies the sink contract.
    async fn write(&self, _token: &CancellationToken, item: ReportItem) -> anyhow::Result<()> {
        let mut inner = self.inner.write();

        inner.total_earned += round_money(item.sell_value);
        inner.total_spent += round_money(item.buy_value);
        inner.total_fees += round_money(item.fees);
        inner.total_taxes += round_money(item.taxes);
        inner.items.push(item);

        Ok(())
    }
}
