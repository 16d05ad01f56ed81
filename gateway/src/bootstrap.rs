//! Startup seeding from the bootstrap feed.

use std::path::Path;

use tracing::{info, warn};

use txledger_common::{LedgerError, Result};
use txledger_ledger::{load_feed, LedgerEngine, SeedReport};

/// Seed `engine` from the feed at `path`, if one is configured.
///
/// A feed that cannot be read or decoded, or that yields no account at all,
/// is an error. Accounts rejected individually are logged and skipped.
pub fn bootstrap(engine: &LedgerEngine, path: Option<&Path>) -> Result<Option<SeedReport>> {
    let Some(path) = path else {
        info!("No bootstrap feed configured, starting with an empty ledger");
        return Ok(None);
    };

    let records = load_feed(path)?;
    let report = engine.seed(records);

    for error in &report.rejected {
        warn!(error = %error, "Feed account rejected");
    }

    if report.loaded.is_empty() {
        return Err(LedgerError::feed(format!(
            "no account could be seeded from {} ({} rejected)",
            path.display(),
            report.rejected.len()
        )));
    }

    info!(
        accounts = report.loaded.len(),
        records = report.records,
        complete = report.is_complete(),
        "Bootstrap complete"
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use txledger_common::{now, AccountToken, Currency, Money};

    fn feed_file(records: &[txledger_ledger::TransactionRecord]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(records).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[test]
    fn test_no_feed() {
        let engine = LedgerEngine::new();
        assert!(bootstrap(&engine, None).unwrap().is_none());
        assert_eq!(engine.account_count(), 0);
    }

    #[test]
    fn test_partial_feed_loads_good_accounts() {
        let source = LedgerEngine::new();
        let good = AccountToken::parse("zambam").unwrap();
        let bad = AccountToken::parse("broken").unwrap();
        source
            .apply_credit(&good, Money::new(2_500, Currency::Usd), "s1", now())
            .unwrap();
        source
            .apply_credit(&bad, Money::new(100, Currency::Usd), "s1", now())
            .unwrap();

        let mut records = source.history(&good).unwrap();
        let mut broken = source.history(&bad).unwrap();
        broken[0].reaction.new_balance = Money::new(999, Currency::Usd);
        records.extend(broken);

        let file = feed_file(&records);
        let engine = LedgerEngine::new();
        let report = bootstrap(&engine, Some(file.path())).unwrap().unwrap();

        assert_eq!(report.loaded, vec![good.clone()]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(
            engine.get_balance(&good).unwrap().balance,
            Money::new(2_500, Currency::Usd)
        );
    }

    #[test]
    fn test_feed_with_no_valid_account_fails() {
        let source = LedgerEngine::new();
        let token = AccountToken::parse("broken").unwrap();
        source
            .apply_credit(&token, Money::new(100, Currency::Usd), "s1", now())
            .unwrap();
        let mut records = source.history(&token).unwrap();
        records[0].sequence = 2;

        let file = feed_file(&records);
        let engine = LedgerEngine::new();
        let err = bootstrap(&engine, Some(file.path())).unwrap_err();

        assert_eq!(err.error_code(), "SEED_ERROR");
        assert_eq!(engine.account_count(), 0);
    }

    #[test]
    fn test_empty_path_fails() {
        let engine = LedgerEngine::new();
        assert!(bootstrap(&engine, Some(Path::new(""))).is_err());
    }
}
