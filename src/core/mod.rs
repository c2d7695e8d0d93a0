//! Core business logic abstractions

pub mod config;
pub mod conversion;
pub mod currency;
pub mod error;
pub mod log;
pub mod query;
pub mod rate;

// Re-export main types for cleaner imports
pub use config::{FxConfig, ProviderConfig, RateLimitConfig};
pub use conversion::{ConversionResult, Converter, amount_from_f64, parse_amount};
pub use currency::{CurrencyCode, RateProvider};
pub use error::{FxError, Result};
pub use query::FxQuery;
pub use rate::{DateRange, RateDate, RateRecord, RateRow, RateTable};
