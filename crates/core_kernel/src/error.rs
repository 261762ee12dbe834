//! Core error types used across the system

use thiserror::Error;
use crate::money::MoneyError;
use crate::temporal::TemporalError;

/// Core error type for the kernel
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        CoreError::InvalidIdentifier(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_error_converts() {
        let err: CoreError = MoneyError::UnknownCurrency("XYZ".into()).into();
        assert!(matches!(err, CoreError::Money(_)));
        assert!(err.to_string().contains("XYZ"));
    }

    #[test]
    fn test_temporal_error_converts() {
        let err: CoreError = TemporalError::UnknownTimezone("Mars/Olympus".into()).into();
        assert!(err.to_string().starts_with("Temporal error"));
    }
}
