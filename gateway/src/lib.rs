//! txledger Gateway
//!
//! Exposes the ledger engine's debit, credit and balance operations over a
//! newline-delimited JSON protocol on TCP, and seeds the engine from a
//! bootstrap feed at startup.

pub mod gateway;
pub mod config;
pub mod bootstrap;
pub mod metrics;
pub mod state;

pub use gateway::{status_for, Gateway};
pub use config::GatewayConfig;
pub use bootstrap::bootstrap;
