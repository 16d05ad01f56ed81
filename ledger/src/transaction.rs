//! Transaction record types.

use serde::{Deserialize, Serialize};

use txledger_common::{AccountToken, Money, Timestamp};

/// Direction of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    /// Decreases the balance.
    Debit,
    /// Increases the balance.
    Credit,
}

/// A debit or credit requested by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Debit or credit.
    pub kind: ActionKind,
    /// Amount to move.
    pub amount: Money,
    /// Caller reference, unique per token once applied.
    pub reference: String,
    /// Caller-supplied time. Metadata only.
    pub timestamp: Timestamp,
}

impl Action {
    /// Create a debit action.
    pub fn debit(amount: Money, reference: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind: ActionKind::Debit,
            amount,
            reference: reference.into(),
            timestamp,
        }
    }

    /// Create a credit action.
    pub fn credit(amount: Money, reference: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind: ActionKind::Credit,
            amount,
            reference: reference.into(),
            timestamp,
        }
    }
}

/// Outcome of processing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ReactionStatus {
    /// The action moved the balance.
    Applied,
    /// The action was refused; the balance did not move.
    Rejected { reason: String },
}

/// The engine's response to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Applied or rejected.
    #[serde(flatten)]
    pub status: ReactionStatus,
    /// Balance before the action.
    pub previous_balance: Money,
    /// Balance after the action.
    pub new_balance: Money,
}

impl Reaction {
    /// Check if the action was applied.
    pub fn is_applied(&self) -> bool {
        self.status == ReactionStatus::Applied
    }
}

/// Durable key of a transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub token: AccountToken,
    pub sequence: u64,
}

/// An immutable entry in an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Account the record belongs to.
    pub token: AccountToken,
    /// Position in the account history, starting at 1.
    pub sequence: u64,
    /// What the caller asked for.
    pub action: Action,
    /// What the engine did.
    pub reaction: Reaction,
}

impl TransactionRecord {
    /// Get the durable key of this record.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            token: self.token.clone(),
            sequence: self.sequence,
        }
    }

    /// Check if the record moved the balance.
    pub fn is_applied(&self) -> bool {
        self.reaction.is_applied()
    }
}
