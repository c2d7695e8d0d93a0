//! Foreign-exchange rates and currency conversion over an
//! exchangeratesapi.io compatible HTTP API.
//!
//! ```no_run
//! # async fn demo() -> fx_api::Result<()> {
//! let converter = fx_api::converter(&fx_api::FxConfig::default().with_env_overrides())?;
//! let result = converter.convert_str("100", "USD", "GBP", "2021-01-01").await?;
//! println!("{} GBP at {}", result.output_amount, result.rate_used);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod providers;

pub use crate::core::{
    ConversionResult, Converter, CurrencyCode, DateRange, FxConfig, FxError, FxQuery,
    ProviderConfig, RateDate, RateProvider, RateRecord, RateRow, RateTable, Result,
};
pub use crate::core::log::init_logging;
pub use providers::ExchangeRatesApiProvider;

use tracing::debug;

/// Builds a converter backed by the HTTP provider described in `config`.
pub fn converter(config: &FxConfig) -> Result<Converter<ExchangeRatesApiProvider>> {
    debug!("Using rate provider at {}", config.provider.base_url);
    let provider = ExchangeRatesApiProvider::from_config(config)?;
    Ok(Converter::new(provider).with_precision(config.precision))
}
