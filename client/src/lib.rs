//! txledger Client
//!
//! Async client for the txledger gateway: debit, credit and balance queries
//! over the newline-delimited JSON protocol.

pub mod client;
pub mod config;

pub use client::{ClientError, LedgerClient};
pub use config::ClientConfig;
