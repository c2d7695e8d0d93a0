use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use super::throttle::RateLimiter;
use crate::core::config::{FxConfig, ProviderConfig};
use crate::core::currency::{CurrencyCode, RateProvider};
use crate::core::error::{FxError, Result};
use crate::core::rate::{DATE_FORMAT, DateRange, RateDate, RateRecord, decimal_rate, today};

// Provider-side error codes of the keyed exchangeratesapi.io API.
const INVALID_BASE_CURRENCY: i64 = 201;
const INVALID_CURRENCY_CODES: i64 = 202;
const INVALID_DATE: i64 = 302;

/// Client for exchangeratesapi.io and compatible APIs (e.g. frankfurter).
pub struct ExchangeRatesApiProvider {
    base_url: String,
    access_key: Option<String>,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl ExchangeRatesApiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fx-api/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| FxError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(ExchangeRatesApiProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
            client,
            limiter: RateLimiter::new(&config.rate_limit),
        })
    }

    pub fn from_config(config: &FxConfig) -> Result<Self> {
        Self::new(&config.provider)
    }

    fn build_url(&self, endpoint: &str, mut params: Vec<(&'static str, String)>) -> Result<Url> {
        if let Some(key) = &self.access_key {
            params.push(("access_key", key.clone()));
        }
        Url::parse_with_params(&format!("{}/{}", self.base_url, endpoint), &params)
            .map_err(|e| FxError::Config(format!("Invalid base_url {}: {e}", self.base_url)))
    }

    /// Issues one GET and returns the body of a successful response. `subject`
    /// names the currencies involved for error reporting.
    async fn fetch(&self, url: Url, subject: &str) -> Result<String> {
        self.limiter.acquire().await;
        debug!("Requesting rates from {}", redact(&url));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FxError::ProviderUnavailable(format!("Request timed out for {subject}"))
            } else {
                FxError::ProviderUnavailable(format!("Request error: {e} for {subject}"))
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            FxError::ProviderUnavailable(format!("Failed to read response for {subject}: {e}"))
        })?;

        if !status.is_success() {
            let message = error_message(&text).unwrap_or_else(|| status.to_string());
            debug!(%status, %message, "Provider returned an error");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                    client_error(status, &text, subject)
                }
                _ => FxError::ProviderUnavailable(format!(
                    "HTTP error: {status} for {subject}: {message}"
                )),
            });
        }

        check_envelope(&text, subject)?;
        Ok(text)
    }
}

fn redact(url: &Url) -> String {
    let mut url = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_key" { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

fn symbols_param(symbols: Option<&[CurrencyCode]>) -> Option<String> {
    symbols.filter(|s| !s.is_empty()).map(|s| {
        s.iter()
            .map(CurrencyCode::as_str)
            .collect::<Vec<_>>()
            .join(",")
    })
}

fn subject(base: &CurrencyCode, symbols: Option<&[CurrencyCode]>) -> String {
    match symbols_param(symbols) {
        Some(symbols) => format!("{base}->{symbols}"),
        None => base.to_string(),
    }
}

/// Pulls a human readable message out of an error body. Providers use either
/// `{"error": "..."}`, `{"error": {"info": "..."}}` or `{"message": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error").or_else(|| value.get("message"))? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("info")
            .or_else(|| obj.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        other => Some(other.to_string()),
    }
}

/// Classifies a rejected request by what the provider's message is about.
/// Bodies without a recognisable message (an HTML 404 from a wrong
/// `base_url`, say) are not blamed on the currencies.
fn client_error(status: StatusCode, body: &str, subject: &str) -> FxError {
    let Some(message) = error_message(body) else {
        return FxError::ProviderUnavailable(format!("HTTP error: {status} for {subject}"));
    };
    let lower = message.to_ascii_lowercase();
    if ["currenc", "base", "symbol"].iter().any(|k| lower.contains(k)) {
        FxError::invalid_currency(subject, message)
    } else if lower.contains("date") {
        FxError::InvalidDate(message)
    } else {
        FxError::ProviderUnavailable(format!("HTTP error: {status} for {subject}: {message}"))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: Option<bool>,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    code: Option<i64>,
    info: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// The keyed API answers 200 with `"success": false` on errors.
fn check_envelope(body: &str, subject: &str) -> Result<()> {
    let Ok(envelope) = serde_json::from_str::<Envelope>(body) else {
        // Not an object at all; left to the typed parse to report.
        return Ok(());
    };
    if envelope.success != Some(false) {
        return Ok(());
    }

    let error = envelope.error.unwrap_or(EnvelopeError {
        code: None,
        info: None,
        kind: None,
    });
    let message = error
        .info
        .or(error.kind)
        .unwrap_or_else(|| "request was not successful".to_string());
    match error.code {
        Some(INVALID_BASE_CURRENCY) | Some(INVALID_CURRENCY_CODES) => {
            Err(FxError::invalid_currency(subject, message))
        }
        Some(INVALID_DATE) => Err(FxError::InvalidDate(message)),
        code => Err(FxError::ProviderUnavailable(format!(
            "Provider error {} for {subject}: {message}",
            code.map_or("unknown".to_string(), |c| c.to_string())
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct DayRatesResponse {
    base: Option<String>,
    date: String,
    rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    base: Option<String>,
    rates: BTreeMap<String, HashMap<String, f64>>,
}

fn parse_response_date(date: &str) -> Result<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| FxError::MalformedResponse(format!("unexpected date {date:?}")))?;
    if parsed > today() {
        return Err(FxError::MalformedResponse(format!(
            "provider confirmed future date {date}"
        )));
    }
    Ok(parsed)
}

fn check_base(requested: &CurrencyCode, returned: Option<&str>) -> Result<()> {
    match returned {
        Some(base) if !base.eq_ignore_ascii_case(requested.as_str()) => {
            Err(FxError::MalformedResponse(format!(
                "asked for base {requested}, provider answered for {base}"
            )))
        }
        _ => Ok(()),
    }
}

/// Maps one day's `{ccy: rate}` object onto records, keeping only the
/// requested symbols when there are any.
fn day_records(
    base: &CurrencyCode,
    symbols: Option<&[CurrencyCode]>,
    requested_date: RateDate,
    date: NaiveDate,
    rates: HashMap<String, f64>,
) -> Result<Vec<RateRecord>> {
    let mut records = Vec::with_capacity(rates.len());
    for (quote, rate) in rates {
        let quote: CurrencyCode = quote.parse().map_err(|_| {
            FxError::MalformedResponse(format!("unexpected currency key {quote:?}"))
        })?;
        if symbols.is_some_and(|s| !s.is_empty() && !s.contains(&quote)) {
            continue;
        }
        records.push(RateRecord {
            base_currency: base.clone(),
            quote_currency: quote,
            requested_date,
            date,
            rate: decimal_rate(rate)?,
        });
    }
    records.sort_by(|a, b| a.quote_currency.cmp(&b.quote_currency));
    Ok(records)
}

fn parse_day(
    body: &str,
    base: &CurrencyCode,
    symbols: Option<&[CurrencyCode]>,
    requested_date: RateDate,
) -> Result<Vec<RateRecord>> {
    let data: DayRatesResponse = serde_json::from_str(body).map_err(|e| {
        FxError::MalformedResponse(format!("Failed to parse JSON response for {base}: {e}"))
    })?;
    check_base(base, data.base.as_deref())?;
    let date = parse_response_date(&data.date)?;
    day_records(base, symbols, requested_date, date, data.rates)
}

fn parse_history(
    body: &str,
    base: &CurrencyCode,
    symbols: Option<&[CurrencyCode]>,
) -> Result<Vec<RateRecord>> {
    let data: HistoryResponse = serde_json::from_str(body).map_err(|e| {
        FxError::MalformedResponse(format!("Failed to parse JSON response for {base}: {e}"))
    })?;
    check_base(base, data.base.as_deref())?;

    let mut records = Vec::new();
    // BTreeMap keys are ISO dates, so iteration is already chronological.
    for (date, rates) in data.rates {
        let date = parse_response_date(&date)?;
        records.extend(day_records(
            base,
            symbols,
            RateDate::On(date),
            date,
            rates,
        )?);
    }
    Ok(records)
}

#[async_trait]
impl RateProvider for ExchangeRatesApiProvider {
    #[instrument(
        name = "ExchangeRateFetch",
        skip(self),
        fields(base = %base, quote = %quote, date = %date)
    )]
    async fn get_rate(
        &self,
        base: &CurrencyCode,
        quote: &CurrencyCode,
        date: &RateDate,
    ) -> Result<RateRecord> {
        let symbols = [quote.clone()];
        let records = self.get_rates(base, Some(&symbols), date).await?;
        let record = records
            .into_iter()
            .find(|r| &r.quote_currency == quote)
            .ok_or_else(|| {
                FxError::invalid_currency(quote.as_str(), format!("no rate published for {base}"))
            })?;

        if record.is_substituted() {
            debug!(
                "Provider returned rate for {} instead of requested {}",
                record.date, date
            );
        }
        Ok(record)
    }

    async fn get_rates(
        &self,
        base: &CurrencyCode,
        symbols: Option<&[CurrencyCode]>,
        date: &RateDate,
    ) -> Result<Vec<RateRecord>> {
        date.validate()?;
        let mut params = vec![("base", base.to_string())];
        if let Some(symbols) = symbols_param(symbols) {
            params.push(("symbols", symbols));
        }
        let url = self.build_url(&date.as_path(), params)?;
        let subject = subject(base, symbols);

        let body = self.fetch(url, &subject).await?;
        parse_day(&body, base, symbols, *date)
    }

    #[instrument(
        name = "ExchangeRateHistory",
        skip(self, range),
        fields(base = %base, start = %range.start(), end = %range.end())
    )]
    async fn get_history(
        &self,
        base: &CurrencyCode,
        symbols: Option<&[CurrencyCode]>,
        range: &DateRange,
    ) -> Result<Vec<RateRecord>> {
        let mut params = vec![
            ("start_at", range.start().format(DATE_FORMAT).to_string()),
            ("end_at", range.end().format(DATE_FORMAT).to_string()),
            ("base", base.to_string()),
        ];
        if let Some(symbols) = symbols_param(symbols) {
            params.push(("symbols", symbols));
        }
        let url = self.build_url("history", params)?;
        let subject = subject(base, symbols);

        let body = self.fetch(url, &subject).await?;
        parse_history(&body, base, symbols)
    }
}
