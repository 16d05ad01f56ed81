//! Append-only record sink.
//!
//! The engine hands every newly applied record to the configured journal after
//! the account lock is released. Records are keyed by `(token, sequence)`;
//! feeding them back through [`LedgerEngine::seed`](crate::LedgerEngine::seed)
//! rebuilds every account.

use parking_lot::Mutex;

use crate::transaction::TransactionRecord;

/// Receiver of applied transaction records.
pub trait Journal: Send + Sync {
    /// Append a record. Called once per applied record, never for replays.
    fn append(&self, record: &TransactionRecord);
}

/// Journal that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<TransactionRecord>>,
}

impl MemoryJournal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all appended records.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records.lock().clone()
    }

    /// Number of appended records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Journal for MemoryJournal {
    fn append(&self, record: &TransactionRecord) {
        self.records.lock().push(record.clone());
    }
}
