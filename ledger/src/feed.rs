//! Bootstrap feed loading.
//!
//! A feed is a JSON array of transaction records, the same shape the engine
//! produces. Decoding problems surface as `SeedError`; consistency checks
//! happen later in [`LedgerEngine::seed`](crate::LedgerEngine::seed).

use std::path::Path;

use tracing::info;

use txledger_common::{LedgerError, Result};

use crate::transaction::TransactionRecord;

/// Read and decode a feed file.
pub fn load_feed(path: impl AsRef<Path>) -> Result<Vec<TransactionRecord>> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(LedgerError::feed("feed path is empty"));
    }

    let data = std::fs::read_to_string(path).map_err(|e| {
        LedgerError::feed(format!("failed to read feed {}: {}", path.display(), e))
    })?;

    let records = parse_feed(&data)?;
    info!(path = %path.display(), records = records.len(), "Feed loaded");
    Ok(records)
}

/// Decode feed contents.
pub fn parse_feed(data: &str) -> Result<Vec<TransactionRecord>> {
    let records: Vec<TransactionRecord> = serde_json::from_str(data)
        .map_err(|e| LedgerError::feed(format!("failed to decode feed: {}", e)))?;

    if records.is_empty() {
        return Err(LedgerError::feed("feed contains no transactions"));
    }
    Ok(records)
}
