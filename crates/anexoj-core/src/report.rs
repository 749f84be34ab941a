//! Report generation: source/sink contracts, the FIFO matching engine and
//! the orchestration loop that drives a record stream to exhaustion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::lot::{Lot, LotQueue};
use crate::nature::Nature;
use crate::record::Record;
use crate::side::Side;

/// Yields records in chronological order until the stream ends.
///
/// Per-symbol chronological order is a contract: the FIFO matcher assumes
/// buys arrive before the sells that consume them.
#[async_trait]
pub trait RecordSource: Send {
    /// Return the next record, `Ok(None)` on clean end-of-stream, or an
    /// error. Errors other than end-of-stream abort the report.
    async fn next_record(&mut self, token: &CancellationToken) -> anyhow::Result<Option<Record>>;
}

/// Accepts report items as the engine emits them.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Accept one report item. An error aborts the report.
    async fn write(&self, token: &CancellationToken, item: ReportItem) -> anyhow::Result<()>;
}

/// One disposal line: a (sub-)match of a sell against a single buy lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Security identifier the match belongs to.
    pub symbol: String,
    /// Tax nature of the matched lot's security.
    pub nature: Nature,
    /// ISO numeric jurisdiction of the security, from the sell record.
    pub asset_country: u32,
    /// ISO numeric jurisdiction of the broker, from the sell record.
    pub broker_country: u32,
    /// Matched quantity times the lot's buy price.
    pub buy_value: Decimal,
    /// When the matched lot was bought.
    pub buy_timestamp: DateTime<Utc>,
    /// Matched quantity times the sell price.
    pub sell_value: Decimal,
    /// When the disposal happened.
    pub sell_timestamp: DateTime<Utc>,
    /// Fees attributed to this match.
    pub fees: Decimal,
    /// Taxes attributed to this match.
    pub taxes: Decimal,
}

impl ReportItem {
    /// Realised profit or loss of this match: sell value minus buy value.
    #[must_use]
    pub fn realised_pnl(&self) -> Decimal {
        self.sell_value - self.buy_value
    }
}

/// How fees and taxes are attributed when one sell splits across lots.
///
/// The historical behavior attributes the whole fee and tax of both the
/// sell record and the matched lot to every (sub-)match, so a sell split
/// over three lots counts its fee three times in the annex. That is
/// surprising enough to be a policy rather than a hardcoded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePolicy {
    /// Attribute the full lot fee/tax plus the full sell fee/tax to every
    /// match. Matches the historical output.
    #[default]
    DuplicatePerMatch,
    /// Scale the lot fee/tax by the matched share of the lot's quantity
    /// and the sell fee/tax by the matched share of the sell's quantity,
    /// so each fee is counted exactly once across a full consumption.
    ApportionByQuantity,
}

impl FeePolicy {
    fn attribute(self, buy: &Record, sell: &Record, matched: Decimal) -> (Decimal, Decimal) {
        match self {
            Self::DuplicatePerMatch => (buy.fees + sell.fees, buy.taxes + sell.taxes),
            Self::ApportionByQuantity => (
                apportion(buy.fees, matched, buy.quantity)
                    + apportion(sell.fees, matched, sell.quantity),
                apportion(buy.taxes, matched, buy.quantity)
                    + apportion(sell.taxes, matched, sell.quantity),
            ),
        }
    }
}

// Multiplying before dividing keeps exact results for exact shares,
// e.g. 3 * 10 / 15 == 2 while 3 * (10 / 15) does not terminate.
fn apportion(amount: Decimal, matched: Decimal, quantity: Decimal) -> Decimal {
    if quantity.is_zero() {
        Decimal::ZERO
    } else {
        amount * matched / quantity
    }
}

/// Why a report run stopped before the stream ended.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A sell could not be explained by known inventory: its symbol's lot
    /// queue ran empty. The data is inconsistent, the run cannot continue.
    #[error("insufficient bought volume for {symbol}")]
    InsufficientBoughtVolume {
        /// Symbol of the offending sell record.
        symbol: String,
    },
    /// A record carried a side the engine does not understand.
    #[error("unrecognized side on record for {symbol}")]
    UnrecognizedSide {
        /// Symbol of the offending record.
        symbol: String,
    },
    /// The cancellation signal fired.
    #[error("report cancelled")]
    Cancelled,
    /// The record source failed; the underlying error is carried verbatim.
    #[error("read record: {0:#}")]
    Source(anyhow::Error),
    /// The report sink failed; the underlying error is carried verbatim.
    #[error("write report item: {0:#}")]
    Sink(anyhow::Error),
}

/// Drive `source` to exhaustion, matching each record against per-symbol
/// FIFO lot queues and forwarding every emitted [`ReportItem`] to `sink`.
///
/// Queues are created lazily on first sight of a symbol and live for the
/// whole run. The loop checks `token` once per record and exits with
/// [`ReportError::Cancelled`] when tripped. A clean end-of-stream
/// (`Ok(None)` from the source) ends the run successfully; every other
/// error is terminal.
pub async fn build_report<S, W>(
    token: &CancellationToken,
    source: &mut S,
    sink: &W,
    policy: FeePolicy,
) -> Result<(), ReportError>
where
    S: RecordSource + ?Sized,
    W: ReportSink + ?Sized,
{
    let mut buys: HashMap<String, LotQueue> = HashMap::new();

    loop {
        if token.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let record = match source.next_record(token).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(err) => return Err(ReportError::Source(err)),
        };

        let queue = buys.entry(record.symbol.clone()).or_default();
        process_record(token, queue, record, sink, policy).await?;
    }
}

/// Match one record against its symbol's queue, emitting zero or more
/// report items to `sink`.
async fn process_record<W>(
    token: &CancellationToken,
    queue: &mut LotQueue,
    record: Record,
    sink: &W,
    policy: FeePolicy,
) -> Result<(), ReportError>
where
    W: ReportSink + ?Sized,
{
    match record.side {
        Side::Buy => {
            queue.push(Lot::new(record));
            Ok(())
        }

        Side::Sell => {
            let mut unmatched = record.quantity;

            while unmatched > Decimal::ZERO {
                let Some(lot) = queue.peek_mut() else {
                    return Err(ReportError::InsufficientBoughtVolume {
                        symbol: record.symbol.clone(),
                    });
                };

                let (matched, now_filled) = lot.fill(unmatched);
                unmatched -= matched;

                let buy = lot.record();
                let nature = buy.nature().await;
                let (fees, taxes) = policy.attribute(buy, &record, matched);

                let item = ReportItem {
                    symbol: record.symbol.clone(),
                    nature,
                    asset_country: record.asset_country,
                    broker_country: record.broker_country,
                    buy_value: matched * buy.price,
                    buy_timestamp: buy.timestamp,
                    sell_value: matched * record.price,
                    sell_timestamp: record.timestamp,
                    fees,
                    taxes,
                };

                if now_filled {
                    // Peek just returned this lot; a missing head here means
                    // the queue state is corrupt and continuing would emit
                    // bogus financial data.
                    queue.pop().expect("lot queue head vanished after peek");
                }

                debug!(
                    symbol = %item.symbol,
                    pnl = %item.realised_pnl(),
                    sell_timestamp = %item.sell_timestamp,
                    "realised disposal"
                );

                sink.write(token, item).await.map_err(ReportError::Sink)?;
            }

            Ok(())
        }

        Side::Unknown => Err(ReportError::UnrecognizedSide {
            symbol: record.symbol.clone(),
        }),
    }
}

/// In-memory record source, mainly for tests and examples.
#[derive(Debug, Default)]
pub struct VecSource {
    records: VecDeque<Record>,
}

impl From<Vec<Record>> for VecSource {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next_record(&mut self, _token: &CancellationToken) -> anyhow::Result<Option<Record>> {
        Ok(self.records.pop_front())
    }
}
