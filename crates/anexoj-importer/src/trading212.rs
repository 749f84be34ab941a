//! Trading 212 CSV statement adapter.

use anexoj_core::{Nature, NatureCell, NatureFuture, Record, RecordSource, Side};
use anexoj_figi::OpenFigi;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use isocountry::CountryCode;
use rust_decimal::Decimal;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Trading 212 runs its brokerage out of the United Kingdom.
const BROKER_COUNTRY: CountryCode = CountryCode::GBR;

const ACTION_MARKET_BUY: &str = "market buy";
const ACTION_LIMIT_BUY: &str = "limit buy";
const ACTION_MARKET_SELL: &str = "market sell";
const ACTION_LIMIT_SELL: &str = "limit sell";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const COL_ACTION: &str = "Action";
const COL_TIME: &str = "Time";
const COL_ISIN: &str = "ISIN";
const COL_SHARES: &str = "No. of shares";
const COL_PRICE: &str = "Price / share";
const COL_STAMP_DUTY: &str = "Stamp duty reserve tax";
const COL_CONVERSION_FEE: &str = "Currency conversion fee";
const COL_FRENCH_TAX: &str = "French transaction tax";

/// Record source over a Trading 212 CSV statement export.
///
/// Columns are located by header name, so extra or reordered columns in
/// the export are harmless. Trade rows become [`Record`]s; stock-split
/// rows are skipped; any other action is a data-quality error.
pub struct Trading212Source<R: Read + Send> {
    rows: csv::StringRecordsIntoIter<R>,
    columns: Columns,
    figi: Arc<OpenFigi>,
}

impl<R: Read + Send> Trading212Source<R> {
    /// Create a source over `reader`, resolving security types through
    /// `figi`. Fails if the statement header is missing a required column.
    pub fn new(reader: R, figi: Arc<OpenFigi>) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let columns = Columns::from_headers(
            csv_reader.headers().context("read statement header")?,
        )?;

        Ok(Self {
            rows: csv_reader.into_records(),
            columns,
            figi,
        })
    }
}

#[async_trait]
impl<R: Read + Send> RecordSource for Trading212Source<R> {
    async fn next_record(&mut self, token: &CancellationToken) -> Result<Option<Record>> {
        loop {
            let Some(row) = self.rows.next() else {
                return Ok(None);
            };
            let row = row.context("read statement row")?;

            let action = self.columns.required(&row, COL_ACTION)?.to_lowercase();
            let side = match action.as_str() {
                ACTION_MARKET_BUY | ACTION_LIMIT_BUY => Side::Buy,
                ACTION_MARKET_SELL | ACTION_LIMIT_SELL => Side::Sell,
                "stock split open" | "stock split close" => continue,
                other => bail!("unhandled statement action: {other}"),
            };

            let isin = self.columns.required(&row, COL_ISIN)?.to_string();

            let quantity = parse_decimal(self.columns.required(&row, COL_SHARES)?)
                .context("parse record quantity")?;
            let price = parse_decimal(self.columns.required(&row, COL_PRICE)?)
                .context("parse record price")?;

            let timestamp = NaiveDateTime::parse_from_str(
                self.columns.required(&row, COL_TIME)?,
                TIME_FORMAT,
            )
            .context("parse record timestamp")?
            .and_utc();

            let conversion_fee = parse_optional_decimal(self.columns.optional(&row, COL_CONVERSION_FEE))
                .context("parse record conversion fee")?;
            let stamp_duty = parse_optional_decimal(self.columns.optional(&row, COL_STAMP_DUTY))
                .context("parse record stamp duty tax")?;
            let french_tax = parse_optional_decimal(self.columns.optional(&row, COL_FRENCH_TAX))
                .context("parse record french transaction tax")?;

            let nature = deferred_nature(self.figi.clone(), isin.clone(), token.clone());
            let record = Record::new(isin.clone(), side, quantity, price, timestamp)
                .with_fees(conversion_fee)
                .with_taxes(stamp_duty + french_tax)
                .with_countries(BROKER_COUNTRY.numeric_id(), asset_country(&isin))
                .with_nature(nature);

            return Ok(Some(record));
        }
    }
}

/// Column positions resolved from the statement header.
struct Columns {
    action: usize,
    time: usize,
    isin: usize,
    shares: usize,
    price: usize,
    stamp_duty: Option<usize>,
    conversion_fee: Option<usize>,
    french_tax: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let require = |name: &str| {
            position(headers, name)
                .with_context(|| format!("statement is missing the {name:?} column"))
        };

        Ok(Self {
            action: require(COL_ACTION)?,
            time: require(COL_TIME)?,
            isin: require(COL_ISIN)?,
            shares: require(COL_SHARES)?,
            price: require(COL_PRICE)?,
            // Tax and fee columns only appear on statements that have them.
            stamp_duty: position(headers, COL_STAMP_DUTY),
            conversion_fee: position(headers, COL_CONVERSION_FEE),
            french_tax: position(headers, COL_FRENCH_TAX),
        })
    }

    fn required<'a>(&self, row: &'a csv::StringRecord, name: &str) -> Result<&'a str> {
        let index = match name {
            COL_ACTION => self.action,
            COL_TIME => self.time,
            COL_ISIN => self.isin,
            COL_SHARES => self.shares,
            COL_PRICE => self.price,
            other => bail!("not a required column: {other}"),
        };

        row.get(index)
            .with_context(|| format!("statement row is missing the {name:?} cell"))
    }

    fn optional<'a>(&self, row: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
        let index = match name {
            COL_STAMP_DUTY => self.stamp_duty,
            COL_CONVERSION_FEE => self.conversion_fee,
            COL_FRENCH_TAX => self.french_tax,
            _ => None,
        }?;

        row.get(index)
    }
}

fn position(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Ok(Decimal::from_str(s)?)
}

/// Like [`parse_decimal`] but an absent or empty cell parses as zero.
fn parse_optional_decimal(s: Option<&str>) -> Result<Decimal> {
    match s {
        None | Some("") => Ok(Decimal::ZERO),
        Some(s) => parse_decimal(s),
    }
}

fn asset_country(isin: &str) -> u32 {
    isin.get(..2)
        .and_then(|prefix| CountryCode::for_alpha2(prefix).ok())
        .map_or(0, |country| country.numeric_id())
}

/// Defer the security-type lookup until the nature is actually read.
///
/// The cancellation token is captured at read time so an in-flight lookup
/// stops with the run. Lookup failures degrade to [`Nature::Unknown`]; a
/// classification problem must never abort matching.
fn deferred_nature(figi: Arc<OpenFigi>, isin: String, token: CancellationToken) -> NatureCell {
    NatureCell::deferred(move || {
        let figi = figi.clone();
        let isin = isin.clone();
        let token = token.clone();

        let future: NatureFuture = Box::pin(async move {
            match figi.security_type_by_isin(&token, &isin).await {
                Ok(security_type) => nature_from_security_type(&isin, &security_type),
                Err(err) => {
                    error!(%isin, %err, "failed to get security type by ISIN");
                    Nature::Unknown
                }
            }
        });
        future
    })
}

fn nature_from_security_type(isin: &str, security_type: &str) -> Nature {
    match security_type {
        "Common Stock" => Nature::G01,
        "ETP" => Nature::G20,
        other => {
            warn!(%isin, security_type = %other, "got unsupported security type for ISIN");
            Nature::Unknown
        }
    }
}
