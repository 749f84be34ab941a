//! Property-based tests for the lot, queue and matching invariants.

use anexoj_core::{build_report, Aggregator, FeePolicy, Lot, LotQueue, Record, Side, VecSource};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

fn arb_quantity() -> impl Strategy<Value = Decimal> {
    // Two decimal places, strictly positive.
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_fill_requests() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((0i64..1_000_000i64).prop_map(|n| Decimal::new(n, 2)), 0..16)
}

fn record(side: Side, quantity: Decimal) -> Record {
    Record::new(
        "US0378331005",
        side,
        quantity,
        Decimal::ONE,
        Utc.timestamp_opt(0, 0).unwrap(),
    )
}

proptest! {
    /// Filling never accrues more than requested or more than the lot
    /// holds, and the filled counter never leaves `[0, quantity]`.
    #[test]
    fn fill_accrual_is_bounded(quantity in arb_quantity(), requests in arb_fill_requests()) {
        let mut lot = Lot::new(record(Side::Buy, quantity));
        let mut accrued_total = Decimal::ZERO;

        for request in requests {
            let (accrued, now_filled) = lot.fill(request);

            prop_assert!(accrued >= Decimal::ZERO);
            prop_assert!(accrued <= request);
            accrued_total += accrued;

            prop_assert!(accrued_total <= quantity);
            prop_assert_eq!(now_filled, accrued_total == quantity);
            prop_assert_eq!(lot.filled(), accrued_total);
        }
    }

    /// Lots come out of the queue in the order they went in.
    #[test]
    fn queue_preserves_push_order(quantities in prop::collection::vec(arb_quantity(), 0..16)) {
        let mut queue = LotQueue::new();
        for &quantity in &quantities {
            queue.push(Lot::new(record(Side::Buy, quantity)));
        }

        prop_assert_eq!(queue.len(), quantities.len());
        for &quantity in &quantities {
            let lot = queue.pop().expect("queue shorter than what was pushed");
            prop_assert_eq!(lot.record().quantity, quantity);
        }
        prop_assert!(queue.is_empty());
    }

    /// Sells that sum exactly to the bought quantity always conserve it:
    /// the matched quantities across all report items add back up to the
    /// buy, however the sell is split.
    #[test]
    fn matching_conserves_quantity(splits in prop::collection::vec(arb_quantity(), 1..8)) {
        let total: Decimal = splits.iter().copied().sum();

        // Price 1 makes each item's buy_value equal its matched quantity.
        let mut records = vec![record(Side::Buy, total)];
        records.extend(splits.iter().map(|&q| record(Side::Sell, q)));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("build runtime");

        let matched_total = runtime.block_on(async {
            let mut source = VecSource::from(records);
            let sink = Aggregator::new();
            let token = CancellationToken::new();

            build_report(&token, &mut source, &sink, FeePolicy::default())
                .await
                .expect("exact consumption must succeed");

            sink.items()
                .iter()
                .map(|item| item.buy_value)
                .sum::<Decimal>()
        });

        prop_assert_eq!(matched_total, total);
    }
}
