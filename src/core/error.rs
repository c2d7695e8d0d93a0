//! Error taxonomy shared by providers and the converter

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("invalid currency code: {code} ({reason})")]
    InvalidCurrency { code: String, reason: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("rate provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FxError {
    pub fn invalid_currency(code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCurrency {
            code: code.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = FxError::invalid_currency("ZZZ", "not supported by provider");
        assert_eq!(
            err.to_string(),
            "invalid currency code: ZZZ (not supported by provider)"
        );
        assert_eq!(
            FxError::InvalidAmount("-1".to_string()).to_string(),
            "invalid amount: -1"
        );
        assert_eq!(
            FxError::ProviderUnavailable("timed out".to_string()).to_string(),
            "rate provider unavailable: timed out"
        );
    }
}
