//! Multi-currency rate tables: latest, on a date, or over a date range.

use crate::core::currency::{CurrencyCode, RateProvider};
use crate::core::error::Result;
use crate::core::rate::{DateRange, RateDate, RateRecord, RateTable};
use tracing::debug;

pub const DEFAULT_SOURCE: &str = "GBP";

/// Builds rate tables for one or more source currencies against an optional
/// set of targets. The provider takes a single base per request, so sources
/// are queried one after the other.
pub struct FxQuery<'a, P: RateProvider> {
    provider: &'a P,
    sources: Vec<CurrencyCode>,
    targets: Option<Vec<CurrencyCode>>,
}

impl<'a, P: RateProvider> FxQuery<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        FxQuery {
            provider,
            sources: vec![CurrencyCode(DEFAULT_SOURCE.to_string())],
            targets: None,
        }
    }

    /// Replaces the source currencies. Codes are validated up front.
    pub fn sources<S: AsRef<str>>(mut self, sources: &[S]) -> Result<Self> {
        self.sources = parse_codes(sources)?;
        Ok(self)
    }

    /// Restricts the targets. An empty list means every published currency.
    pub fn targets<S: AsRef<str>>(mut self, targets: &[S]) -> Result<Self> {
        let targets = parse_codes(targets)?;
        self.targets = (!targets.is_empty()).then_some(targets);
        Ok(self)
    }

    pub fn source_currencies(&self) -> &[CurrencyCode] {
        &self.sources
    }

    pub fn target_currencies(&self) -> Option<&[CurrencyCode]> {
        self.targets.as_deref()
    }

    pub async fn latest(&self) -> Result<RateTable> {
        self.collect_day(&RateDate::Latest).await
    }

    /// Accepts `YYYY-MM-DD`.
    pub async fn on_date(&self, date: &str) -> Result<RateTable> {
        let date: RateDate = date.parse()?;
        self.collect_day(&date).await
    }

    /// Accepts `YYYY-MM-DD` bounds, both inclusive.
    pub async fn date_range(&self, start_at: &str, end_at: &str) -> Result<RateTable> {
        let range = DateRange::parse(start_at, end_at)?;
        debug!(
            "Fetching rate history {} to {} for {} source(s)",
            range.start(),
            range.end(),
            self.sources.len()
        );

        let mut records: Vec<RateRecord> = Vec::new();
        for source in &self.sources {
            let batch = self
                .provider
                .get_history(source, self.targets.as_deref(), &range)
                .await?;
            debug!("Received {} history records for {}", batch.len(), source);
            records.extend(batch);
        }
        Ok(RateTable::from_records(records))
    }

    async fn collect_day(&self, date: &RateDate) -> Result<RateTable> {
        let mut records: Vec<RateRecord> = Vec::new();
        for source in &self.sources {
            let batch = self
                .provider
                .get_rates(source, self.targets.as_deref(), date)
                .await?;
            debug!("Received {} rates for {} on {}", batch.len(), source, date);
            records.extend(batch);
        }
        Ok(RateTable::from_records(records))
    }
}

fn parse_codes<S: AsRef<str>>(codes: &[S]) -> Result<Vec<CurrencyCode>> {
    codes.iter().map(|c| c.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FxError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    // Records every request it receives and answers with fixed rates
    #[derive(Default)]
    struct RecordingProvider {
        requests: Mutex<Vec<String>>,
        fail_for: Option<String>,
    }

    impl RecordingProvider {
        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn answer(
            &self,
            base: &CurrencyCode,
            symbols: Option<&[CurrencyCode]>,
            date: NaiveDate,
        ) -> Result<Vec<RateRecord>> {
            if self.fail_for.as_deref() == Some(base.as_str()) {
                return Err(FxError::ProviderUnavailable("boom".into()));
            }
            let all: Vec<CurrencyCode> = ["EUR", "USD", "GBP"]
                .iter()
                .map(|c| c.parse().unwrap())
                .filter(|c| c != base)
                .collect();
            let quotes = symbols.map(<[CurrencyCode]>::to_vec).unwrap_or(all);
            Ok(quotes
                .into_iter()
                .map(|quote| RateRecord {
                    base_currency: base.clone(),
                    quote_currency: quote,
                    requested_date: RateDate::On(date),
                    date,
                    rate: dec!(1.5),
                })
                .collect())
        }
    }

    #[async_trait]
    impl RateProvider for RecordingProvider {
        async fn get_rate(
            &self,
            _base: &CurrencyCode,
            _quote: &CurrencyCode,
            _date: &RateDate,
        ) -> Result<RateRecord> {
            unimplemented!("not used by queries")
        }

        async fn get_rates(
            &self,
            base: &CurrencyCode,
            symbols: Option<&[CurrencyCode]>,
            date: &RateDate,
        ) -> Result<Vec<RateRecord>> {
            self.requests.lock().unwrap().push(format!("day:{base}:{date}"));
            let date = match date {
                RateDate::Latest => NaiveDate::from_ymd_opt(2021, 3, 5).unwrap(),
                RateDate::On(d) => *d,
            };
            self.answer(base, symbols, date)
        }

        async fn get_history(
            &self,
            base: &CurrencyCode,
            symbols: Option<&[CurrencyCode]>,
            range: &DateRange,
        ) -> Result<Vec<RateRecord>> {
            self.requests
                .lock()
                .unwrap()
                .push(format!("history:{base}:{}:{}", range.start(), range.end()));
            let mut records = self.answer(base, symbols, range.end())?;
            records.extend(self.answer(base, symbols, range.start())?);
            Ok(records)
        }
    }

    #[test]
    fn test_default_query() {
        let provider = RecordingProvider::default();
        let query = FxQuery::new(&provider);
        assert_eq!(query.source_currencies()[0].as_str(), "GBP");
        assert!(query.target_currencies().is_none());
    }

    #[test]
    fn test_invalid_codes_rejected() {
        let provider = RecordingProvider::default();
        assert!(matches!(
            FxQuery::new(&provider).sources(&["USD", "GB"]),
            Err(FxError::InvalidCurrency { .. })
        ));
        assert!(matches!(
            FxQuery::new(&provider).targets(&["JPY", "C4D"]),
            Err(FxError::InvalidCurrency { .. })
        ));
    }

    #[tokio::test]
    async fn test_latest_one_request_per_source() {
        let provider = RecordingProvider::default();
        let table = FxQuery::new(&provider)
            .sources(&["USD", "GBP"])
            .unwrap()
            .latest()
            .await
            .unwrap();

        assert_eq!(
            provider.requests(),
            vec!["day:USD:latest".to_string(), "day:GBP:latest".to_string()]
        );
        assert_eq!(table.len(), 4);
        let first = &table.rows()[0];
        assert_eq!(first.source_currency.as_str(), "GBP");
        assert_eq!(first.target_currency.as_str(), "EUR");
        assert_eq!(first.exchange_rate_to_target, dec!(1.5));
    }

    #[tokio::test]
    async fn test_on_date_with_targets() {
        let provider = RecordingProvider::default();
        let table = FxQuery::new(&provider)
            .targets(&["usd"])
            .unwrap()
            .on_date("2020-03-13")
            .await
            .unwrap();

        assert_eq!(provider.requests(), vec!["day:GBP:2020-03-13".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.rows()[0].date,
            NaiveDate::from_ymd_opt(2020, 3, 13).unwrap()
        );
        assert_eq!(table.rows()[0].target_currency.as_str(), "USD");
    }

    #[tokio::test]
    async fn test_bad_dates_make_no_requests() {
        let provider = RecordingProvider::default();
        let query = FxQuery::new(&provider);

        assert!(matches!(
            query.on_date("2019-07-63").await,
            Err(FxError::InvalidDate(_))
        ));
        assert!(matches!(
            query.date_range("2020-032-01", "2020-03-17").await,
            Err(FxError::InvalidDate(_))
        ));
        assert!(matches!(
            query.date_range("2020-03-17", "2020-03-01").await,
            Err(FxError::InvalidDate(_))
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_date_range_sorted_across_sources() {
        let provider = RecordingProvider::default();
        let table = FxQuery::new(&provider)
            .sources(&["USD", "EUR"])
            .unwrap()
            .targets(&["GBP"])
            .unwrap()
            .date_range("2020-03-14", "2020-03-17")
            .await
            .unwrap();

        let rows: Vec<(String, &str)> = table
            .rows()
            .iter()
            .map(|r| (r.date.to_string(), r.source_currency.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("2020-03-14".to_string(), "EUR"),
                ("2020-03-14".to_string(), "USD"),
                ("2020-03-17".to_string(), "EUR"),
                ("2020-03-17".to_string(), "USD"),
            ]
        );
        assert!(
            table
                .rows()
                .iter()
                .all(|r| r.exchange_rate_to_target > Decimal::ZERO)
        );
    }

    #[tokio::test]
    async fn test_first_failure_aborts_query() {
        let provider = RecordingProvider {
            fail_for: Some("USD".to_string()),
            ..Default::default()
        };
        let result = FxQuery::new(&provider)
            .sources(&["USD", "EUR"])
            .unwrap()
            .latest()
            .await;
        assert!(matches!(result, Err(FxError::ProviderUnavailable(_))));
        assert_eq!(provider.requests(), vec!["day:USD:latest".to_string()]);
    }
}
