//! Identifier types for txledger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;

/// Opaque identifier of an account.
///
/// Never empty; equality is an exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountToken(String);

impl AccountToken {
    /// Parse a token, rejecting the empty string.
    pub fn parse(id: impl Into<String>) -> Result<Self, LedgerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(LedgerError::InvalidToken);
        }
        Ok(Self(id))
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountToken {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for AccountToken {
    type Error = LedgerError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<AccountToken> for String {
    fn from(token: AccountToken) -> Self {
        token.0
    }
}
