//! Currency codes and the rate provider abstraction

use crate::core::error::{FxError, Result};
use crate::core::rate::{DateRange, RateDate, RateRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A three letter, upper-case currency code such as `USD`.
///
/// Only the shape is checked here. Whether the provider actually publishes
/// rates for the code is decided by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(pub(crate) String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = FxError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FxError::invalid_currency(s, "expected three ASCII letters"));
        }
        Ok(CurrencyCode(trimmed.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = FxError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of exchange rates. Every call is an independent request, nothing is
/// cached or retried.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Rate to convert one unit of `base` into `quote` on `date`.
    async fn get_rate(
        &self,
        base: &CurrencyCode,
        quote: &CurrencyCode,
        date: &RateDate,
    ) -> Result<RateRecord>;

    /// Rates from `base` into each of `symbols`, or into every published
    /// currency when `symbols` is `None`.
    async fn get_rates(
        &self,
        base: &CurrencyCode,
        symbols: Option<&[CurrencyCode]>,
        date: &RateDate,
    ) -> Result<Vec<RateRecord>>;

    /// Rates for every published date within `range`.
    async fn get_history(
        &self,
        base: &CurrencyCode,
        symbols: Option<&[CurrencyCode]>,
        range: &DateRange,
    ) -> Result<Vec<RateRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency_code() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap().as_str(), "USD");
        assert_eq!("gbp".parse::<CurrencyCode>().unwrap().as_str(), "GBP");
        assert_eq!(" eur ".parse::<CurrencyCode>().unwrap().as_str(), "EUR");
    }

    #[test]
    fn test_reject_malformed_codes() {
        for bad in ["", "US", "USDX", "U5D", "€UR", "ads1"] {
            let result = bad.parse::<CurrencyCode>();
            assert!(
                matches!(result, Err(FxError::InvalidCurrency { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_currency_code_serde() {
        let code: CurrencyCode = serde_json::from_str(r#""jpy""#).unwrap();
        assert_eq!(code.to_string(), "JPY");
        assert_eq!(serde_json::to_string(&code).unwrap(), r#""JPY""#);
        assert!(serde_json::from_str::<CurrencyCode>(r#""JP""#).is_err());
    }
}
