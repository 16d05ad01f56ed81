//! Error types for ledger operations.

use crate::{AccountToken, Currency, Money};
use thiserror::Error;

/// Main error type for ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No ledger exists for the token.
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountToken),

    /// Debit would drive the balance negative.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// Amount currency differs from the account's established currency.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Bootstrap feed malformed or inconsistent.
    #[error("Seed error{}: {reason}", .token.as_ref().map(|t| format!(" for {}", t)).unwrap_or_default())]
    SeedError {
        token: Option<AccountToken>,
        reason: String,
    },

    /// Empty account token.
    #[error("Account token must not be empty")]
    InvalidToken,

    /// Zero amount.
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    /// Empty transaction reference.
    #[error("Transaction reference must not be empty")]
    InvalidReference,

    /// Credit would overflow the balance.
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Caller deadline expired.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl LedgerError {
    /// Build a seed error scoped to a token.
    pub fn seed(token: &AccountToken, reason: impl Into<String>) -> Self {
        LedgerError::SeedError {
            token: Some(token.clone()),
            reason: reason.into(),
        }
    }

    /// Build a seed error for the feed as a whole.
    pub fn feed(reason: impl Into<String>) -> Self {
        LedgerError::SeedError {
            token: None,
            reason: reason.into(),
        }
    }

    /// Check if the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::DeadlineExceeded)
    }

    /// Get the stable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::SeedError { .. } => "SEED_ERROR",
            LedgerError::InvalidToken => "INVALID_TOKEN",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::InvalidReference => "INVALID_REFERENCE",
            LedgerError::BalanceOverflow => "BALANCE_OVERFLOW",
            LedgerError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
