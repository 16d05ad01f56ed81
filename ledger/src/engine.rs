//! Core ledger engine implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use txledger_common::{AccountToken, Deadline, LedgerError, Money, Result, Timestamp};

use crate::account::{AccountLedger, ApplyOutcome};
use crate::balance::Summary;
use crate::journal::Journal;
use crate::transaction::{Action, ActionKind, TransactionRecord};

type SharedLedger = Arc<Mutex<AccountLedger>>;

/// Outcome of seeding the engine from pre-existing records.
#[derive(Debug, Default)]
pub struct SeedReport {
    /// Accounts that were loaded.
    pub loaded: Vec<AccountToken>,
    /// Records accepted across all loaded accounts.
    pub records: usize,
    /// Per-account failures; these accounts were not loaded.
    pub rejected: Vec<LedgerError>,
}

impl SeedReport {
    /// Check if every account in the feed was loaded.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// The ledger engine owns every account and serializes work per account.
///
/// The account map is sharded, so lookups of existing accounts never block
/// each other; each account carries its own mutex around
/// check-validate-append.
pub struct LedgerEngine {
    accounts: DashMap<AccountToken, SharedLedger>,
    journal: Option<Arc<dyn Journal>>,
}

impl LedgerEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            journal: None,
        }
    }

    /// Create an engine that reports applied records to `journal`.
    pub fn with_journal(journal: Arc<dyn Journal>) -> Self {
        Self {
            accounts: DashMap::new(),
            journal: Some(journal),
        }
    }

    /// Debit an account. Debits never open accounts.
    pub fn apply_debit(
        &self,
        token: &AccountToken,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<TransactionRecord> {
        self.apply(token, Action::debit(amount, reference, timestamp), None)
    }

    /// Credit an account, opening it on first use.
    pub fn apply_credit(
        &self,
        token: &AccountToken,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<TransactionRecord> {
        self.apply(token, Action::credit(amount, reference, timestamp), None)
    }

    /// Debit bounded by a caller deadline.
    pub fn apply_debit_within(
        &self,
        token: &AccountToken,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Timestamp,
        deadline: &Deadline,
    ) -> Result<TransactionRecord> {
        self.apply(token, Action::debit(amount, reference, timestamp), Some(deadline))
    }

    /// Credit bounded by a caller deadline.
    pub fn apply_credit_within(
        &self,
        token: &AccountToken,
        amount: Money,
        reference: impl Into<String>,
        timestamp: Timestamp,
        deadline: &Deadline,
    ) -> Result<TransactionRecord> {
        self.apply(token, Action::credit(amount, reference, timestamp), Some(deadline))
    }

    /// Get the running balance and latest record of an account.
    pub fn get_balance(&self, token: &AccountToken) -> Result<Summary> {
        self.balance(token, None)
    }

    /// Balance query bounded by a caller deadline.
    pub fn get_balance_within(&self, token: &AccountToken, deadline: &Deadline) -> Result<Summary> {
        self.balance(token, Some(deadline))
    }

    /// Get the ordered history of an account.
    pub fn history(&self, token: &AccountToken) -> Result<Vec<TransactionRecord>> {
        let ledger = self.lookup(token)?;
        let guard = ledger.lock();
        Ok(guard.history().to_vec())
    }

    /// Number of open accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Tokens of all open accounts, sorted.
    pub fn tokens(&self) -> Vec<AccountToken> {
        let mut tokens: Vec<AccountToken> =
            self.accounts.iter().map(|e| e.key().clone()).collect();
        tokens.sort();
        tokens
    }

    /// Load pre-existing records, one account at a time.
    ///
    /// An account is inserted only after its whole history validates; a bad
    /// account is reported and skipped without touching the others. Accounts
    /// that already exist are refused.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn seed(&self, records: Vec<TransactionRecord>) -> SeedReport {
        let mut by_token: BTreeMap<AccountToken, Vec<TransactionRecord>> = BTreeMap::new();
        for record in records {
            by_token.entry(record.token.clone()).or_default().push(record);
        }

        let mut report = SeedReport::default();
        for (token, records) in by_token {
            match self.seed_account(token.clone(), records) {
                Ok(count) => {
                    report.records += count;
                    report.loaded.push(token);
                }
                Err(e) => {
                    warn!(token = %token, error = %e, "Account not seeded");
                    report.rejected.push(e);
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            records = report.records,
            rejected = report.rejected.len(),
            "Seeding finished"
        );
        report
    }

    // --- Private methods ---

    fn seed_account(&self, token: AccountToken, records: Vec<TransactionRecord>) -> Result<usize> {
        if self.accounts.contains_key(&token) {
            return Err(LedgerError::seed(&token, "account already exists"));
        }
        let ledger = AccountLedger::from_history(token.clone(), records)?;
        let count = ledger.len();

        match self.accounts.entry(token) {
            Entry::Occupied(entry) => Err(LedgerError::seed(entry.key(), "account already exists")),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(ledger)));
                Ok(count)
            }
        }
    }

    #[instrument(
        skip_all,
        fields(token = %token, kind = ?action.kind, reference = %action.reference)
    )]
    fn apply(
        &self,
        token: &AccountToken,
        action: Action,
        deadline: Option<&Deadline>,
    ) -> Result<TransactionRecord> {
        validate_action(&action)?;
        check_deadline(deadline)?;

        let outcome = match action.kind {
            ActionKind::Debit => {
                let ledger = self.lookup(token)?;
                let mut guard = lock_within(&ledger, deadline)?;
                guard.apply(action)
            }
            ActionKind::Credit => self.credit(token, action, deadline),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Action rejected");
                return Err(e);
            }
        };

        match &outcome {
            ApplyOutcome::Applied(record) => {
                if let Some(journal) = &self.journal {
                    journal.append(record);
                }
                info!(
                    sequence = record.sequence,
                    balance = %record.reaction.new_balance,
                    "Action applied"
                );
            }
            ApplyOutcome::Replayed(record) => {
                debug!(sequence = record.sequence, "Reference already applied, replaying");
            }
        }

        // The mutation stands; only the answer is dropped.
        if deadline.map_or(false, Deadline::is_expired) {
            warn!("Deadline expired while applying");
            return Err(LedgerError::DeadlineExceeded);
        }

        Ok(outcome.into_record())
    }

    fn credit(
        &self,
        token: &AccountToken,
        action: Action,
        deadline: Option<&Deadline>,
    ) -> Result<ApplyOutcome> {
        let ledger = match self.get(token) {
            Some(ledger) => ledger,
            // The shard write lock is not deadline-bounded. Holders only do
            // an insert or an in-memory first apply under it.
            None => match self.accounts.entry(token.clone()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    // Nobody else can see this account until it is inserted.
                    let mut ledger = AccountLedger::open(token.clone(), action.amount.currency);
                    let outcome = ledger.apply(action)?;
                    entry.insert(Arc::new(Mutex::new(ledger)));
                    info!(token = %token, "Account opened");
                    return Ok(outcome);
                }
            },
        };

        let mut guard = lock_within(&ledger, deadline)?;
        guard.apply(action)
    }

    fn balance(&self, token: &AccountToken, deadline: Option<&Deadline>) -> Result<Summary> {
        check_deadline(deadline)?;
        let ledger = self.lookup(token)?;
        let guard = lock_within(&ledger, deadline)?;

        let last_transaction = guard
            .last_transaction()
            .cloned()
            .ok_or_else(|| LedgerError::UnknownAccount(token.clone()))?;

        Ok(Summary {
            balance: guard.current_balance(),
            last_transaction,
        })
    }

    /// Clone the account handle out so the map shard is released before the
    /// account mutex is taken.
    fn get(&self, token: &AccountToken) -> Option<SharedLedger> {
        self.accounts.get(token).map(|entry| entry.value().clone())
    }

    fn lookup(&self, token: &AccountToken) -> Result<SharedLedger> {
        self.get(token)
            .ok_or_else(|| LedgerError::UnknownAccount(token.clone()))
    }
}

impl Default for LedgerEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_action(action: &Action) -> Result<()> {
    if action.amount.is_zero() {
        return Err(LedgerError::InvalidAmount);
    }
    if action.reference.is_empty() {
        return Err(LedgerError::InvalidReference);
    }
    Ok(())
}

fn check_deadline(deadline: Option<&Deadline>) -> Result<()> {
    match deadline {
        Some(deadline) if deadline.is_expired() => Err(LedgerError::DeadlineExceeded),
        _ => Ok(()),
    }
}

fn lock_within<'a>(
    ledger: &'a Mutex<AccountLedger>,
    deadline: Option<&Deadline>,
) -> Result<MutexGuard<'a, AccountLedger>> {
    match deadline {
        None => Ok(ledger.lock()),
        Some(deadline) => ledger
            .try_lock_for(deadline.remaining())
            .ok_or(LedgerError::DeadlineExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use proptest::prelude::*;
    use txledger_common::{now, Currency};

    use crate::journal::MemoryJournal;
    use crate::transaction::ReactionStatus;

    fn usd(amount: u64) -> Money {
        Money::new(amount, Currency::Usd)
    }

    fn token(id: &str) -> AccountToken {
        AccountToken::parse(id).unwrap()
    }

    #[test]
    fn test_credit_debit_balance_scenario() {
        let engine = LedgerEngine::new();
        let t1 = token("T1");

        let credit = engine.apply_credit(&t1, usd(100), "r1", now()).unwrap();
        assert_eq!(credit.reaction.status, ReactionStatus::Applied);
        assert_eq!(credit.reaction.new_balance, usd(100));

        let debit = engine.apply_debit(&t1, usd(40), "r2", now()).unwrap();
        assert_eq!(debit.reaction.new_balance, usd(60));

        let err = engine.apply_debit(&t1, usd(100), "r3", now()).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let summary = engine.get_balance(&t1).unwrap();
        assert_eq!(summary.balance, usd(60));
        assert_eq!(summary.last_transaction, debit);
        assert_eq!(summary.last_transaction.action.reference, "r2");

        // Replaying the first credit returns the original reaction untouched.
        let replay = engine.apply_credit(&t1, usd(100), "r1", now()).unwrap();
        assert_eq!(replay, credit);
        assert_eq!(engine.get_balance(&t1).unwrap().balance, usd(60));
    }

    #[test]
    fn test_unknown_account() {
        let engine = LedgerEngine::new();
        let unknown = token("unknown-token");

        assert_eq!(
            engine.get_balance(&unknown).unwrap_err(),
            LedgerError::UnknownAccount(unknown.clone())
        );
        assert_eq!(
            engine.apply_debit(&unknown, usd(1), "r1", now()).unwrap_err(),
            LedgerError::UnknownAccount(unknown.clone())
        );
        // A rejected debit must not open the account.
        assert_eq!(engine.account_count(), 0);
    }

    #[test]
    fn test_debit_boundary() {
        let engine = LedgerEngine::new();
        let t = token("T2");
        engine.apply_credit(&t, usd(500), "c1", now()).unwrap();

        let err = engine.apply_debit(&t, usd(501), "d1", now()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                required: usd(501),
                available: usd(500),
            }
        );

        let exact = engine.apply_debit(&t, usd(500), "d2", now()).unwrap();
        assert!(exact.reaction.new_balance.is_zero());
        assert_eq!(engine.get_balance(&t).unwrap().balance, usd(0));
    }

    #[test]
    fn test_rejected_reference_can_be_reused() {
        let engine = LedgerEngine::new();
        let t = token("T3");
        engine.apply_credit(&t, usd(10), "c1", now()).unwrap();

        assert!(engine.apply_debit(&t, usd(20), "d1", now()).is_err());
        engine.apply_credit(&t, usd(10), "c2", now()).unwrap();

        let debit = engine.apply_debit(&t, usd(20), "d1", now()).unwrap();
        assert_eq!(debit.sequence, 3);
        assert!(debit.reaction.new_balance.is_zero());
    }

    #[test]
    fn test_currency_is_fixed_by_first_credit() {
        let engine = LedgerEngine::new();
        let t = token("T4");
        engine.apply_credit(&t, usd(10), "c1", now()).unwrap();

        let err = engine
            .apply_credit(&t, Money::new(10, Currency::Eur), "c2", now())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::CurrencyMismatch {
                expected: Currency::Usd,
                actual: Currency::Eur,
            }
        );
        assert_eq!(engine.history(&t).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_requests() {
        let engine = LedgerEngine::new();
        let t = token("T5");

        assert_eq!(
            engine.apply_credit(&t, usd(0), "c1", now()).unwrap_err(),
            LedgerError::InvalidAmount
        );
        assert_eq!(
            engine.apply_credit(&t, usd(1), "", now()).unwrap_err(),
            LedgerError::InvalidReference
        );
        assert_eq!(engine.account_count(), 0);
    }

    #[test]
    fn test_credit_overflow() {
        let engine = LedgerEngine::new();
        let t = token("T6");
        engine.apply_credit(&t, usd(u64::MAX), "c1", now()).unwrap();

        assert_eq!(
            engine.apply_credit(&t, usd(1), "c2", now()).unwrap_err(),
            LedgerError::BalanceOverflow
        );
        assert_eq!(engine.get_balance(&t).unwrap().balance, usd(u64::MAX));
    }

    #[test]
    fn test_expired_deadline_has_no_side_effects() {
        let engine = LedgerEngine::new();
        let t = token("T7");
        let expired = Deadline::at(Instant::now() - Duration::from_millis(1));

        let err = engine
            .apply_credit_within(&t, usd(10), "c1", now(), &expired)
            .unwrap_err();
        assert_eq!(err, LedgerError::DeadlineExceeded);
        assert_eq!(engine.account_count(), 0);

        engine.apply_credit(&t, usd(10), "c1", now()).unwrap();
        assert_eq!(
            engine.get_balance_within(&t, &expired).unwrap_err(),
            LedgerError::DeadlineExceeded
        );
    }

    #[test]
    fn test_deadline_while_waiting_for_lock() {
        let engine = LedgerEngine::new();
        let t = token("T8");
        engine.apply_credit(&t, usd(10), "c1", now()).unwrap();

        let ledger = engine.lookup(&t).unwrap();
        let _held = ledger.lock();

        let deadline = Deadline::after(Duration::from_millis(20));
        let err = engine
            .apply_debit_within(&t, usd(5), "d1", now(), &deadline)
            .unwrap_err();
        assert_eq!(err, LedgerError::DeadlineExceeded);
        drop(_held);

        assert_eq!(engine.get_balance(&t).unwrap().balance, usd(10));
    }

    #[test]
    fn test_deadline_within_budget() {
        let engine = LedgerEngine::new();
        let t = token("T9");
        let deadline = Deadline::after(Duration::from_secs(5));

        engine
            .apply_credit_within(&t, usd(10), "c1", now(), &deadline)
            .unwrap();
        engine
            .apply_debit_within(&t, usd(4), "d1", now(), &deadline)
            .unwrap();
        assert_eq!(
            engine.get_balance_within(&t, &deadline).unwrap().balance,
            usd(6)
        );
    }

    #[test]
    fn test_concurrent_credits_same_token() {
        const THREADS: u64 = 16;
        const AMOUNT: u64 = 25;

        let engine = LedgerEngine::new();
        let t = token("shared");

        std::thread::scope(|s| {
            for i in 0..THREADS {
                let engine = &engine;
                let t = &t;
                s.spawn(move || {
                    engine
                        .apply_credit(t, usd(AMOUNT), format!("ref-{}", i), now())
                        .unwrap();
                });
            }
        });

        let history = engine.history(&t).unwrap();
        let sequences: Vec<u64> = history.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (1..=THREADS).collect::<Vec<_>>());
        assert_eq!(engine.get_balance(&t).unwrap().balance, usd(THREADS * AMOUNT));

        // Each record starts where the previous one ended.
        for pair in history.windows(2) {
            assert_eq!(pair[0].reaction.new_balance, pair[1].reaction.previous_balance);
        }
    }

    #[test]
    fn test_concurrent_mixed_tokens() {
        let engine = LedgerEngine::new();
        let tokens: Vec<AccountToken> = (0..8).map(|i| token(&format!("acct-{}", i))).collect();

        std::thread::scope(|s| {
            for t in &tokens {
                let engine = &engine;
                s.spawn(move || {
                    for i in 0..50 {
                        engine.apply_credit(t, usd(2), format!("c{}", i), now()).unwrap();
                        engine.apply_debit(t, usd(1), format!("d{}", i), now()).unwrap();
                        engine.get_balance(t).unwrap();
                    }
                });
            }
        });

        assert_eq!(engine.tokens(), tokens);
        for t in &tokens {
            assert_eq!(engine.get_balance(t).unwrap().balance, usd(50));
            assert_eq!(engine.history(t).unwrap().len(), 100);
        }
    }

    #[test]
    fn test_concurrent_replays_apply_once() {
        let engine = LedgerEngine::new();
        let t = token("replayed");

        std::thread::scope(|s| {
            for _ in 0..8 {
                let engine = &engine;
                let t = &t;
                s.spawn(move || {
                    let record = engine.apply_credit(t, usd(7), "same-ref", now()).unwrap();
                    assert_eq!(record.sequence, 1);
                });
            }
        });

        assert_eq!(engine.get_balance(&t).unwrap().balance, usd(7));
        assert_eq!(engine.history(&t).unwrap().len(), 1);
    }

    #[test]
    fn test_journal_receives_applied_records_only() {
        let journal = Arc::new(MemoryJournal::new());
        let engine = LedgerEngine::with_journal(journal.clone());
        let t = token("J1");

        engine.apply_credit(&t, usd(100), "r1", now()).unwrap();
        engine.apply_credit(&t, usd(100), "r1", now()).unwrap();
        engine.apply_debit(&t, usd(40), "r2", now()).unwrap();
        let _ = engine.apply_debit(&t, usd(400), "r3", now());

        assert_eq!(journal.len(), 2);

        // Replaying the journal into a fresh engine rebuilds the account.
        let rebuilt = LedgerEngine::new();
        let report = rebuilt.seed(journal.records());
        assert!(report.is_complete());
        assert_eq!(rebuilt.get_balance(&t).unwrap(), engine.get_balance(&t).unwrap());
    }

    #[test]
    fn test_seed_isolates_bad_accounts() {
        let source = LedgerEngine::new();
        let good = token("good");
        let bad = token("bad");
        source.apply_credit(&good, usd(100), "g1", now()).unwrap();
        source.apply_debit(&good, usd(30), "g2", now()).unwrap();
        source.apply_credit(&bad, usd(100), "b1", now()).unwrap();
        source.apply_credit(&bad, usd(100), "b2", now()).unwrap();

        let mut records = source.history(&good).unwrap();
        let mut bad_records = source.history(&bad).unwrap();
        bad_records[1].sequence = 3;
        records.extend(bad_records);
        records.reverse();

        let engine = LedgerEngine::new();
        let report = engine.seed(records);

        assert_eq!(report.loaded, vec![good.clone()]);
        assert_eq!(report.records, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(engine.get_balance(&good).unwrap().balance, usd(70));
        assert!(matches!(
            engine.get_balance(&bad),
            Err(LedgerError::UnknownAccount(_))
        ));

        // Seeded history keeps its sequences and references.
        let next = engine.apply_debit(&good, usd(70), "g3", now()).unwrap();
        assert_eq!(next.sequence, 3);
        let replay = engine.apply_credit(&good, usd(100), "g1", now()).unwrap();
        assert_eq!(replay.sequence, 1);
    }

    #[test]
    fn test_seed_refuses_existing_account() {
        let engine = LedgerEngine::new();
        let t = token("live");
        engine.apply_credit(&t, usd(5), "c1", now()).unwrap();

        let report = engine.seed(engine.history(&t).unwrap());
        assert!(report.loaded.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(engine.history(&t).unwrap().len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Credit(u64),
        Debit(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..1_000).prop_map(Op::Credit),
            (1u64..1_000).prop_map(Op::Debit),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_equals_applied_credits_minus_debits(
            ops in proptest::collection::vec(op_strategy(), 1..60)
        ) {
            let engine = LedgerEngine::new();
            let t = token("prop");
            let mut expected: Option<u64> = None;

            for (i, op) in ops.iter().enumerate() {
                let reference = format!("ref-{}", i);
                match op {
                    Op::Credit(amount) => {
                        engine.apply_credit(&t, usd(*amount), reference, now()).unwrap();
                        expected = Some(expected.unwrap_or(0) + amount);
                    }
                    Op::Debit(amount) => {
                        let result = engine.apply_debit(&t, usd(*amount), reference, now());
                        match expected {
                            Some(balance) if balance >= *amount => {
                                prop_assert!(result.is_ok());
                                expected = Some(balance - amount);
                            }
                            Some(_) => prop_assert!(
                                matches!(result, Err(LedgerError::InsufficientFunds { .. })),
                                "expected InsufficientFunds, got {:?}",
                                result
                            ),
                            None => prop_assert!(
                                matches!(result, Err(LedgerError::UnknownAccount(_))),
                                "expected UnknownAccount, got {:?}",
                                result
                            ),
                        }
                    }
                }
            }

            match expected {
                Some(balance) => {
                    prop_assert_eq!(engine.get_balance(&t).unwrap().balance, usd(balance));
                    let history = engine.history(&t).unwrap();
                    for (i, record) in history.iter().enumerate() {
                        prop_assert_eq!(record.sequence, i as u64 + 1);
                    }
                    prop_assert_eq!(
                        history.last().map(|r| r.reaction.new_balance),
                        Some(usd(balance))
                    );
                }
                None => prop_assert_eq!(engine.account_count(), 0),
            }
        }
    }
}
