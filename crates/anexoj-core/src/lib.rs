//! Core types and the FIFO disposal-matching engine for anexoj.
//!
//! This crate turns a chronological stream of brokerage trade [`Record`]s
//! into disposal report lines for a capital-gains tax annex. Buys are
//! queued as [`Lot`]s per symbol; each sell is matched against the oldest
//! open lots first, splitting across lots where needed, and every
//! (sub-)match produces one [`ReportItem`].
//!
//! The entry point is [`build_report`], which drives a [`RecordSource`]
//! to exhaustion and forwards every report item to a [`ReportSink`].
//! [`Aggregator`] is the bundled sink that keeps the items plus running
//! totals for rendering.
//!
//! # Example
//!
//! ```
//! use anexoj_core::{build_report, Aggregator, FeePolicy, Record, Side};
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let records = vec![
//!     Record::new("US0378331005", Side::Buy, dec!(10), dec!(20), Utc::now()),
//!     Record::new("US0378331005", Side::Sell, dec!(10), dec!(25), Utc::now()),
//! ];
//! let mut source = anexoj_core::VecSource::from(records);
//! let sink = Aggregator::new();
//!
//! let token = CancellationToken::new();
//! build_report(&token, &mut source, &sink, FeePolicy::default())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(sink.items().len(), 1);
//! assert_eq!(sink.total_earned(), dec!(250.00));
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod aggregator;
mod lot;
mod nature;
mod record;
mod report;
mod side;

pub use aggregator::Aggregator;
pub use lot::{Lot, LotQueue};
pub use nature::{Nature, NatureCell, NatureFuture};
pub use record::Record;
pub use report::{
    build_report, FeePolicy, RecordSource, ReportError, ReportItem, ReportSink, VecSource,
};
pub use side::Side;
