//! Monetary types for txledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// A monetary amount in integer minor units with its currency.
///
/// Amounts are unsigned, so a `Money` used as a balance can never be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (cents for USD).
    pub amount: u64,
    /// ISO 4217 currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(amount: u64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        Ok(Money::new(amount, self.currency))
    }

    /// Subtract `other` from `self`, failing rather than going below zero.
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let amount =
            self.amount
                .checked_sub(other.amount)
                .ok_or(LedgerError::InsufficientFunds {
                    required: *other,
                    available: *self,
                })?;
        Ok(Money::new(amount, self.currency))
    }

    /// Amount in major units, scaled by the currency's decimal places.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.amount as i128, self.currency.decimal_places())
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

/// ISO 4217 currency supported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Chf,
    Cad,
    Aud,
}

impl Currency {
    /// Get the currency code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Chf => "CHF",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnknownCurrencyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            "CHF" => Ok(Currency::Chf),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            _ => Err(UnknownCurrencyError(s.to_string())),
        }
    }
}

/// Error when parsing an unsupported currency code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCurrencyError(pub String);

impl fmt::Display for UnknownCurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown currency code: {}", self.0)
    }
}

impl std::error::Error for UnknownCurrencyError {}
