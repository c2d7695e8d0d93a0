pub mod exchange_rates_api;
pub mod throttle;

pub use exchange_rates_api::ExchangeRatesApiProvider;
pub use throttle::RateLimiter;
