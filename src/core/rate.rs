//! Rate records and the dates they are requested for

use crate::core::currency::CurrencyCode;
use crate::core::error::{FxError, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| FxError::InvalidDate(format!("{s} is not in the format YYYY-MM-DD")))
}

fn ensure_not_future(date: NaiveDate) -> Result<NaiveDate> {
    if date > today() {
        return Err(FxError::InvalidDate(format!("{date} is in the future")));
    }
    Ok(date)
}

/// The date a rate is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RateDate {
    /// Most recent rate the provider has published.
    #[default]
    Latest,
    On(NaiveDate),
}

impl RateDate {
    pub fn on(date: NaiveDate) -> Result<Self> {
        ensure_not_future(date).map(RateDate::On)
    }

    /// Re-checks a date that may have been built directly as `RateDate::On`.
    pub fn validate(&self) -> Result<()> {
        match self {
            RateDate::Latest => Ok(()),
            RateDate::On(date) => ensure_not_future(*date).map(|_| ()),
        }
    }

    /// Path segment used by the provider API.
    pub fn as_path(&self) -> String {
        self.to_string()
    }
}

impl FromStr for RateDate {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("latest") {
            return Ok(RateDate::Latest);
        }
        RateDate::on(parse_date(s)?)
    }
}

impl TryFrom<String> for RateDate {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RateDate> for String {
    fn from(date: RateDate) -> Self {
        date.to_string()
    }
}

impl Display for RateDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateDate::Latest => f.write_str("latest"),
            RateDate::On(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

/// Inclusive range of dates for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let start = ensure_not_future(start)?;
        let end = ensure_not_future(end)?;
        if start > end {
            return Err(FxError::InvalidDate(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(DateRange { start, end })
    }

    pub fn parse(start_at: &str, end_at: &str) -> Result<Self> {
        Self::new(parse_date(start_at)?, parse_date(end_at)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A single normalised rate, as confirmed by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub base_currency: CurrencyCode,
    pub quote_currency: CurrencyCode,
    /// What the caller asked for.
    pub requested_date: RateDate,
    /// Date the provider says the rate applies to.
    pub date: NaiveDate,
    pub rate: Decimal,
}

impl RateRecord {
    /// True when the provider answered with a different date than the one
    /// requested, e.g. a weekend request served with Friday's rate.
    pub fn is_substituted(&self) -> bool {
        matches!(self.requested_date, RateDate::On(requested) if requested != self.date)
    }

    /// The same rate seen from the quote currency.
    pub fn inverse(&self) -> RateRecord {
        RateRecord {
            base_currency: self.quote_currency.clone(),
            quote_currency: self.base_currency.clone(),
            requested_date: self.requested_date,
            date: self.date,
            rate: Decimal::ONE / self.rate,
        }
    }
}

/// Turns a JSON number from the provider into a strictly positive decimal.
pub(crate) fn decimal_rate(value: f64) -> Result<Decimal> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FxError::MalformedResponse(format!(
            "rate {value} is not a positive number"
        )));
    }
    // Display yields the shortest representation that round-trips, so 0.73
    // stays 0.73 instead of its binary expansion.
    Decimal::from_str(&value.to_string())
        .map_err(|e| FxError::MalformedResponse(format!("rate {value} out of range: {e}")))
}

/// One row of a flattened rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub date: NaiveDate,
    pub source_currency: CurrencyCode,
    pub target_currency: CurrencyCode,
    pub exchange_rate_to_target: Decimal,
}

impl From<RateRecord> for RateRow {
    fn from(record: RateRecord) -> Self {
        RateRow {
            date: record.date,
            source_currency: record.base_currency,
            target_currency: record.quote_currency,
            exchange_rate_to_target: record.rate,
        }
    }
}

/// Rows ordered by date, then source, then target currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    rows: Vec<RateRow>,
}

impl RateTable {
    pub fn from_records(records: impl IntoIterator<Item = RateRecord>) -> Self {
        let mut rows: Vec<RateRow> = records.into_iter().map(RateRow::from).collect();
        rows.sort_by(|a, b| {
            (a.date, &a.source_currency, &a.target_currency).cmp(&(
                b.date,
                &b.source_currency,
                &b.target_currency,
            ))
        });
        RateTable { rows }
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct dates present in the table, in ascending order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();
        dates.dedup();
        dates
    }

    pub fn find(
        &self,
        date: NaiveDate,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Option<&RateRow> {
        self.rows.iter().find(|r| {
            r.date == date && &r.source_currency == source && &r.target_currency == target
        })
    }
}

impl IntoIterator for RateTable {
    type Item = RateRow;
    type IntoIter = std::vec::IntoIter<RateRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
