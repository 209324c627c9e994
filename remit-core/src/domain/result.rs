//! Result and error types for the core library

use rust_decimal::Decimal;
use thiserror::Error;

/// Core library error type
///
/// Ledger failures are discriminated so callers can react differently:
/// an `InsufficientFunds` should be surfaced to the user as-is, while a
/// `Storage` error rolled back cleanly and the whole operation is safe to
/// retry. The engine itself never retries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Insufficient funds: balance is {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Storage error: {0}")]
    Storage(#[from] duckdb::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid recipient error
    pub fn invalid_recipient(msg: impl Into<String>) -> Self {
        Self::InvalidRecipient(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message_names_both_amounts() {
        let err = Error::InsufficientFunds {
            available: Decimal::new(75000, 2),
            requested: Decimal::new(80000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("750.00"), "message was: {}", msg);
        assert!(msg.contains("800.00"), "message was: {}", msg);
    }

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let err = Error::invalid_recipient("account does not exist");
        assert!(matches!(err, Error::InvalidRecipient(_)));

        let err = Error::not_found("no account for user");
        assert!(matches!(err, Error::NotFound(_)));
    }
}
