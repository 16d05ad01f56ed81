//! Balance summaries.

use serde::{Deserialize, Serialize};

use txledger_common::Money;

use crate::transaction::TransactionRecord;

/// Balance of an account together with its latest record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Running balance.
    pub balance: Money,
    /// Record with the highest sequence.
    pub last_transaction: TransactionRecord,
}
