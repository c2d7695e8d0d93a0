//! Converts amounts between currencies using a [`RateProvider`].
use crate::core::currency::{CurrencyCode, RateProvider};
use crate::core::error::{FxError, Result};
use crate::core::rate::RateDate;
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_PRECISION: u32 = 2;

/// Outcome of a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub input_amount: Decimal,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    pub rate_used: Decimal,
    pub output_amount: Decimal,
    pub requested_date: RateDate,
    /// Date of the rate actually applied. `None` when no rate was needed.
    pub date: Option<NaiveDate>,
}

impl ConversionResult {
    /// True when the provider applied a rate from another date than requested.
    pub fn is_substituted(&self) -> bool {
        match (self.requested_date, self.date) {
            (RateDate::On(requested), Some(used)) => requested != used,
            _ => false,
        }
    }
}

/// Parses a user supplied amount. Anything that is not a finite,
/// non-negative number is rejected.
pub fn parse_amount(amount: &str) -> Result<Decimal> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| FxError::InvalidAmount(format!("{amount:?} is not a number")))?;
    ensure_non_negative(value)
}

pub fn amount_from_f64(amount: f64) -> Result<Decimal> {
    if !amount.is_finite() {
        return Err(FxError::InvalidAmount(format!("{amount} is not a finite number")));
    }
    let value = Decimal::from_f64(amount)
        .ok_or_else(|| FxError::InvalidAmount(format!("{amount} is out of range")))?;
    ensure_non_negative(value)
}

fn ensure_non_negative(amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FxError::InvalidAmount(format!("{amount} is negative")));
    }
    Ok(amount)
}

pub struct Converter<P> {
    provider: P,
    precision: u32,
}

impl<P: RateProvider> Converter<P> {
    pub fn new(provider: P) -> Self {
        Converter {
            provider,
            precision: DEFAULT_PRECISION,
        }
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Converts `amount` of `from` into `to` at the rate published for `date`.
    ///
    /// Same-currency conversions return the amount unchanged without asking
    /// the provider. Provider failures are returned as is.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: &RateDate,
    ) -> Result<ConversionResult> {
        let amount = ensure_non_negative(amount)?;
        date.validate()?;

        if from == to {
            debug!("No currency conversion needed ({from} -> {to})");
            return Ok(ConversionResult {
                input_amount: amount,
                from_currency: from.clone(),
                to_currency: to.clone(),
                rate_used: Decimal::ONE,
                output_amount: amount,
                requested_date: *date,
                date: None,
            });
        }

        debug!("Attempting currency conversion ({from} -> {to}) for {date}");
        let record = self.provider.get_rate(from, to, date).await?;

        let output_amount = amount
            .checked_mul(record.rate)
            .ok_or_else(|| FxError::InvalidAmount(format!("{amount} {from} is too large")))?
            .round_dp_with_strategy(self.precision, RoundingStrategy::MidpointAwayFromZero);
        debug!(
            "Converted {amount} from {from} to {to} at rate {} ({}): {output_amount}",
            record.rate, record.date
        );

        Ok(ConversionResult {
            input_amount: amount,
            from_currency: record.base_currency,
            to_currency: record.quote_currency,
            rate_used: record.rate,
            output_amount,
            requested_date: record.requested_date,
            date: Some(record.date),
        })
    }

    /// String based entry point. Every argument is validated before the
    /// provider is called: amount, then currencies, then date.
    pub async fn convert_str(
        &self,
        amount: &str,
        from: &str,
        to: &str,
        date: &str,
    ) -> Result<ConversionResult> {
        let amount = parse_amount(amount)?;
        let from: CurrencyCode = from.parse()?;
        let to: CurrencyCode = to.parse()?;
        let date: RateDate = date.parse()?;
        self.convert(amount, &from, &to, &date).await
    }
}
