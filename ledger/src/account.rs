//! Per-account ledger state.

use std::collections::HashMap;

use txledger_common::{AccountToken, Currency, LedgerError, Money, Result};

use crate::transaction::{Action, ActionKind, Reaction, ReactionStatus, TransactionRecord};

/// Result of applying an action to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new record was appended.
    Applied(TransactionRecord),
    /// The reference was already applied; the original record is returned.
    Replayed(TransactionRecord),
}

impl ApplyOutcome {
    /// Get the record, new or replayed.
    pub fn record(&self) -> &TransactionRecord {
        match self {
            ApplyOutcome::Applied(record) | ApplyOutcome::Replayed(record) => record,
        }
    }

    /// Take the record, new or replayed.
    pub fn into_record(self) -> TransactionRecord {
        match self {
            ApplyOutcome::Applied(record) | ApplyOutcome::Replayed(record) => record,
        }
    }
}

/// Ordered history and running balance of one account.
///
/// `current_balance` always equals the `new_balance` of the last record, and
/// record sequences run 1..=n without gaps.
#[derive(Debug, Clone)]
pub struct AccountLedger {
    token: AccountToken,
    currency: Currency,
    history: Vec<TransactionRecord>,
    current_balance: Money,
    /// Applied reference -> sequence.
    applied: HashMap<String, u64>,
}

impl AccountLedger {
    /// Open an empty account in the given currency.
    pub fn open(token: AccountToken, currency: Currency) -> Self {
        Self {
            token,
            currency,
            history: Vec::new(),
            current_balance: Money::zero(currency),
            applied: HashMap::new(),
        }
    }

    /// Rebuild an account from pre-existing records.
    ///
    /// Records may arrive in any order; they are sorted by sequence and then
    /// checked for gaps, duplicates, currency drift, broken balance chains and
    /// reused references before anything is accepted.
    pub fn from_history(token: AccountToken, mut records: Vec<TransactionRecord>) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| LedgerError::seed(&token, "no transactions"))?;
        let mut ledger = Self::open(token.clone(), first.action.amount.currency);

        records.sort_by_key(|r| r.sequence);

        for (index, record) in records.into_iter().enumerate() {
            let expected = index as u64 + 1;
            if record.sequence != expected {
                let reason = if record.sequence < expected {
                    format!("duplicate sequence {}", record.sequence)
                } else {
                    format!("sequence gap: expected {}, found {}", expected, record.sequence)
                };
                return Err(LedgerError::seed(&token, reason));
            }
            ledger.check_seed_record(&record)?;
            ledger.push(record);
        }

        Ok(ledger)
    }

    /// Get the account token.
    pub fn token(&self) -> &AccountToken {
        &self.token
    }

    /// Get the established currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Get the running balance.
    pub fn current_balance(&self) -> Money {
        self.current_balance
    }

    /// Get the record with the highest sequence.
    pub fn last_transaction(&self) -> Option<&TransactionRecord> {
        self.history.last()
    }

    /// Get the full ordered history.
    pub fn history(&self) -> &[TransactionRecord] {
        &self.history
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if the account has no records.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Find the applied record for a reference.
    pub fn find_applied(&self, reference: &str) -> Option<&TransactionRecord> {
        self.applied
            .get(reference)
            .and_then(|sequence| self.history.get(*sequence as usize - 1))
    }

    /// Apply an action: replay check, currency check, funds check, append.
    pub fn apply(&mut self, action: Action) -> Result<ApplyOutcome> {
        if let Some(record) = self.find_applied(&action.reference) {
            return Ok(ApplyOutcome::Replayed(record.clone()));
        }

        if action.amount.currency != self.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.currency,
                actual: action.amount.currency,
            });
        }

        let previous_balance = self.current_balance;
        let new_balance = match action.kind {
            ActionKind::Debit => previous_balance.checked_sub(&action.amount)?,
            ActionKind::Credit => previous_balance.checked_add(&action.amount)?,
        };

        let record = TransactionRecord {
            token: self.token.clone(),
            sequence: self.history.len() as u64 + 1,
            action,
            reaction: Reaction {
                status: ReactionStatus::Applied,
                previous_balance,
                new_balance,
            },
        };
        self.push(record.clone());

        Ok(ApplyOutcome::Applied(record))
    }

    fn push(&mut self, record: TransactionRecord) {
        if record.is_applied() {
            self.applied
                .insert(record.action.reference.clone(), record.sequence);
        }
        self.current_balance = record.reaction.new_balance;
        self.history.push(record);
    }

    fn check_seed_record(&self, record: &TransactionRecord) -> Result<()> {
        let fail = |reason: String| {
            Err(LedgerError::seed(
                &self.token,
                format!("sequence {}: {}", record.sequence, reason),
            ))
        };

        if record.token != self.token {
            return fail(format!("belongs to token {}", record.token));
        }
        if record.action.reference.is_empty() {
            return fail("empty reference".to_string());
        }

        let reaction = &record.reaction;
        for currency in [
            record.action.amount.currency,
            reaction.previous_balance.currency,
            reaction.new_balance.currency,
        ] {
            if currency != self.currency {
                return fail(format!(
                    "currency {} differs from account currency {}",
                    currency, self.currency
                ));
            }
        }

        if reaction.previous_balance != self.current_balance {
            return fail(format!(
                "previous balance {} does not follow balance {}",
                reaction.previous_balance, self.current_balance
            ));
        }

        match &reaction.status {
            ReactionStatus::Applied => {
                if record.action.amount.is_zero() {
                    return fail("zero amount".to_string());
                }
                if self.applied.contains_key(&record.action.reference) {
                    return fail(format!(
                        "reference {} applied twice",
                        record.action.reference
                    ));
                }
                let expected = match record.action.kind {
                    ActionKind::Debit => reaction.previous_balance.checked_sub(&record.action.amount),
                    ActionKind::Credit => reaction.previous_balance.checked_add(&record.action.amount),
                };
                match expected {
                    Ok(balance) if balance == reaction.new_balance => Ok(()),
                    Ok(balance) => fail(format!(
                        "new balance {} should be {}",
                        reaction.new_balance, balance
                    )),
                    Err(e) => fail(e.to_string()),
                }
            }
            ReactionStatus::Rejected { .. } => {
                if reaction.new_balance != reaction.previous_balance {
                    return fail("rejected action moved the balance".to_string());
                }
                Ok(())
            }
        }
    }
}
