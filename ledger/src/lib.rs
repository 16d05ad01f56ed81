//! txledger Ledger Engine
//!
//! Per-account transaction ledger: append-only history, engine-assigned
//! sequences, running balances and idempotent debit/credit application under
//! per-account locking.

pub mod engine;
pub mod account;
pub mod transaction;
pub mod balance;
pub mod journal;
pub mod feed;

pub use engine::{LedgerEngine, SeedReport};
pub use account::{AccountLedger, ApplyOutcome};
pub use transaction::{Action, ActionKind, Reaction, ReactionStatus, RecordKey, TransactionRecord};
pub use balance::Summary;
pub use journal::{Journal, MemoryJournal};
pub use feed::{load_feed, parse_feed};
