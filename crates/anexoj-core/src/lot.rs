//! Open buy lots and the per-symbol FIFO queue that holds them.

use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::record::Record;

/// A buy record together with how much of its quantity has already been
/// matched against sells.
///
/// Invariant: `0 <= filled <= record.quantity` at all times. Fullness is
/// decided by exact decimal equality.
#[derive(Debug)]
pub struct Lot {
    record: Record,
    filled: Decimal,
}

impl Lot {
    /// Wrap a buy record in a fresh, unfilled lot.
    #[must_use]
    pub fn new(record: Record) -> Self {
        Self {
            record,
            filled: Decimal::ZERO,
        }
    }

    /// The wrapped buy record.
    #[must_use]
    pub const fn record(&self) -> &Record {
        &self.record
    }

    /// How much of the lot has been matched so far.
    #[must_use]
    pub const fn filled(&self) -> Decimal {
        self.filled
    }

    /// Accrue up to `requested` units against this lot.
    ///
    /// Returns how much was actually accrued (`min(unfilled, requested)`)
    /// and whether the lot is now full. Filling an already-full lot
    /// accrues nothing and reports full. Callers guarantee
    /// `requested >= 0`.
    pub fn fill(&mut self, requested: Decimal) -> (Decimal, bool) {
        let unfilled = self.record.quantity - self.filled;
        let accrued = unfilled.min(requested);
        self.filled += accrued;
        (accrued, self.is_filled())
    }

    /// Whether the fill equals the record quantity exactly.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.filled == self.record.quantity
    }
}

/// FIFO queue of open lots for one symbol.
///
/// Lots enter at the tail as buys arrive and leave from the head only
/// once fully filled, so iteration order is buy arrival order. An empty
/// queue is always safe to read. There is no "absent" queue state at this
/// level: the orchestrator obtains a handle through map get-or-create
/// before ever pushing, so mutation of a nonexistent queue cannot be
/// expressed.
#[derive(Debug, Default)]
pub struct LotQueue {
    lots: VecDeque<Lot>,
}

impl LotQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lot at the tail.
    pub fn push(&mut self, lot: Lot) {
        self.lots.push_back(lot);
    }

    /// Remove and return the head lot, or `None` when empty.
    pub fn pop(&mut self) -> Option<Lot> {
        self.lots.pop_front()
    }

    /// The head lot without removing it, or `None` when empty.
    #[must_use]
    pub fn peek(&self) -> Option<&Lot> {
        self.lots.front()
    }

    /// Mutable access to the head lot, or `None` when empty.
    pub fn peek_mut(&mut self) -> Option<&mut Lot> {
        self.lots.front_mut()
    }

    /// Number of open lots in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Whether the queue holds no lots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::Side;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn buy(quantity: Decimal) -> Record {
        Record::new("US0378331005", Side::Buy, quantity, dec!(20), Utc::now())
    }

    #[test]
    fn test_fill_partial() {
        let mut lot = Lot::new(buy(dec!(10)));

        let (accrued, full) = lot.fill(dec!(4));
        assert_eq!(accrued, dec!(4));
        assert!(!full);
        assert_eq!(lot.filled(), dec!(4));
    }

    #[test]
    fn test_fill_clamps_to_unfilled() {
        let mut lot = Lot::new(buy(dec!(10)));

        let (accrued, full) = lot.fill(dec!(25));
        assert_eq!(accrued, dec!(10));
        assert!(full);
    }

    #[test]
    fn test_fill_exact_boundary() {
        let mut lot = Lot::new(buy(dec!(10)));

        let (accrued, full) = lot.fill(dec!(10));
        assert_eq!(accrued, dec!(10));
        assert!(full);
        assert!(lot.is_filled());
    }

    #[test]
    fn test_fill_already_full() {
        let mut lot = Lot::new(buy(dec!(10)));
        lot.fill(dec!(10));

        let (accrued, full) = lot.fill(dec!(5));
        assert_eq!(accrued, Decimal::ZERO);
        assert!(full);
    }

    #[test]
    fn test_fill_accumulates_across_calls() {
        let mut lot = Lot::new(buy(dec!(100)));

        let (first, full) = lot.fill(dec!(30));
        assert_eq!(first, dec!(30));
        assert!(!full);

        let (second, full) = lot.fill(dec!(70));
        assert_eq!(second, dec!(70));
        assert!(full);
    }

    #[test]
    fn test_fill_exact_decimal_equality() {
        // 0.1 + 0.2 == 0.3 must hold exactly for decimals.
        let mut lot = Lot::new(buy(dec!(0.3)));
        lot.fill(dec!(0.1));
        let (_, full) = lot.fill(dec!(0.2));
        assert!(full);
    }

    #[test]
    fn test_queue_empty_reads() {
        let mut queue = LotQueue::new();

        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_queue_fifo_order() {
        let mut queue = LotQueue::new();
        queue.push(Lot::new(buy(dec!(1))));
        queue.push(Lot::new(buy(dec!(2))));
        assert_eq!(queue.len(), 2);

        let head = queue.peek().expect("head after two pushes");
        assert_eq!(head.record().quantity, dec!(1));
        // Peek must not consume.
        assert_eq!(queue.len(), 2);

        let first = queue.pop().expect("pop after two pushes");
        assert_eq!(first.record().quantity, dec!(1));
        let second = queue.pop().expect("second pop");
        assert_eq!(second.record().quantity, dec!(2));
        assert!(queue.pop().is_none());
    }
}
