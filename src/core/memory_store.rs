//! Thread-safe in-memory ledger store
//!
//! This module provides [`MemoryStore`], a [`TransactionStore`] that keeps
//! every account's ledger in process memory.
//!
//! # Design
//!
//! Each account owns two things, both kept in a `DashMap` keyed by account id:
//!
//! - a writer lock (`tokio::sync::Mutex`) held by at most one unit of work at a
//!   time, which serializes all writers of that account;
//! - the last committed ledger, an immutable `Arc<AccountLedger>`.
//!
//! A unit of work keeps a handle on the committed ledgers of its accounts and
//! stages only what it changes: the rows it inserts and the rows whose
//! snapshot it shifts. On commit those rows are written into the committed
//! ledger through [`Arc::make_mut`], which copies the ledger only while a
//! reader still holds the previous snapshot. A chronological append therefore
//! stages one row and touches nothing else.
//!
//! Readers only ever clone an `Arc`, so they never wait for writers and always
//! see either the state before a commit or the state after it.
//!
//! # Thread Safety
//!
//! Operations on different accounts never contend. DashMap guards are never
//! held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use super::pagination::{select_page, PageRequest};
use super::traits::{TransactionStore, UnitOfWork};
use crate::types::{
    Account, AccountId, AccountWithTransactions, CurrencyCode, LedgerError, LedgerResult,
    Transaction, TransactionId, TransactionKey,
};

/// Committed state of one account
#[derive(Debug, Clone)]
struct AccountLedger {
    account: Account,
    /// Transactions in ascending total order
    transactions: BTreeMap<TransactionKey, Transaction>,
    /// Transaction id to position, for cursor lookups
    keys: HashMap<TransactionId, TransactionKey>,
}

impl AccountLedger {
    fn new(account: Account) -> Self {
        Self {
            account,
            transactions: BTreeMap::new(),
            keys: HashMap::new(),
        }
    }

    fn after(&self, key: TransactionKey) -> impl Iterator<Item = &Transaction> + '_ {
        after(&self.transactions, key)
    }
}

fn after(
    rows: &BTreeMap<TransactionKey, Transaction>,
    key: TransactionKey,
) -> impl Iterator<Item = &Transaction> + '_ {
    rows.range((Bound::Excluded(key), Bound::Unbounded))
        .map(|(_, tx)| tx)
}

/// Pending changes of one account inside a unit of work
#[derive(Debug)]
struct StagedLedger {
    base: Arc<AccountLedger>,
    account: Account,
    /// Inserted rows and rewritten copies of shifted base rows
    rows: BTreeMap<TransactionKey, Transaction>,
}

impl StagedLedger {
    fn new(base: Arc<AccountLedger>) -> Self {
        Self {
            account: base.account.clone(),
            base,
            rows: BTreeMap::new(),
        }
    }

    fn is_inserted(&self, key: &TransactionKey) -> bool {
        !self.base.transactions.contains_key(key)
    }

    /// Fold the staged rows into the committed ledger
    fn publish(self, committed: &mut Arc<AccountLedger>) {
        let Self { base, account, rows } = self;
        // Release our handle first so make_mut can write in place
        drop(base);

        let ledger = Arc::make_mut(committed);
        ledger.account = account;
        for (key, tx) in rows {
            ledger.keys.insert(tx.id, key);
            ledger.transactions.insert(key, tx);
        }
    }
}

/// Per-account slot in the store
#[derive(Debug)]
struct LedgerSlot {
    writer: Arc<Mutex<()>>,
    committed: Arc<AccountLedger>,
}

#[derive(Debug, Default)]
struct Shared {
    ledgers: DashMap<AccountId, LedgerSlot>,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn ensure_open(&self) -> LedgerResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LedgerError::StoreClosed);
        }
        Ok(())
    }

    fn committed(&self, account: AccountId) -> Option<Arc<AccountLedger>> {
        self.ledgers
            .get(&account)
            .map(|slot| Arc::clone(&slot.committed))
    }
}

/// In-memory [`TransactionStore`]
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    #[instrument(skip(self, currency), fields(currency = %currency))]
    async fn create_account(&self, name: &str, currency: CurrencyCode) -> LedgerResult<Account> {
        self.shared.ensure_open()?;

        let account = Account::new(name, currency);
        self.shared.ledgers.insert(
            account.id,
            LedgerSlot {
                writer: Arc::new(Mutex::new(())),
                committed: Arc::new(AccountLedger::new(account.clone())),
            },
        );
        debug!(account = %account.id, "Account created");
        Ok(account)
    }

    #[instrument(skip(self, accounts), fields(accounts = accounts.len()))]
    async fn begin(
        &self,
        accounts: &[AccountId],
        lock_timeout: Duration,
    ) -> LedgerResult<Box<dyn UnitOfWork>> {
        self.shared.ensure_open()?;

        // Ascending id order so overlapping multi-account units cannot deadlock
        let mut ids = accounts.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let started = Instant::now();
        let deadline = started + lock_timeout;
        let mut guards = Vec::with_capacity(ids.len());
        let mut staged = HashMap::with_capacity(ids.len());

        for id in ids {
            let writer = self
                .shared
                .ledgers
                .get(&id)
                .map(|slot| Arc::clone(&slot.writer))
                .ok_or_else(|| LedgerError::account_not_found(id))?;

            let guard = tokio::time::timeout_at(deadline, writer.lock_owned())
                .await
                .map_err(|_| LedgerError::LockTimeout {
                    account: id,
                    waited_ms: started.elapsed().as_millis() as u64,
                })?;

            // Read the committed state only once the lock is held
            let committed = self
                .shared
                .committed(id)
                .ok_or_else(|| LedgerError::account_not_found(id))?;
            guards.push(guard);
            staged.insert(id, StagedLedger::new(committed));
        }

        trace!(waited_us = started.elapsed().as_micros() as u64, "Unit of work opened");
        Ok(Box::new(MemoryUnit {
            shared: Arc::clone(&self.shared),
            staged,
            _guards: guards,
            committed: false,
        }))
    }

    async fn load_account(&self, account: AccountId) -> LedgerResult<Option<Account>> {
        self.shared.ensure_open()?;
        Ok(self
            .shared
            .committed(account)
            .map(|ledger| ledger.account.clone()))
    }

    #[instrument(skip(self, request))]
    async fn load_page(
        &self,
        account: AccountId,
        request: &PageRequest,
    ) -> LedgerResult<Option<AccountWithTransactions>> {
        self.shared.ensure_open()?;

        let Some(ledger) = self.shared.committed(account) else {
            return Ok(None);
        };
        let page = select_page(account, &ledger.transactions, &ledger.keys, request)?;
        Ok(Some(AccountWithTransactions {
            account: ledger.account.clone(),
            transactions: page.transactions,
            next_cursor: page.next_cursor,
        }))
    }

    async fn load_ledger(
        &self,
        account: AccountId,
    ) -> LedgerResult<Option<(Account, Vec<Transaction>)>> {
        self.shared.ensure_open()?;
        Ok(self.shared.committed(account).map(|ledger| {
            (
                ledger.account.clone(),
                ledger.transactions.values().cloned().collect(),
            )
        }))
    }

    async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        debug!("Store closed");
    }
}

/// Unit of work staging the changes to its locked accounts
struct MemoryUnit {
    shared: Arc<Shared>,
    staged: HashMap<AccountId, StagedLedger>,
    _guards: Vec<OwnedMutexGuard<()>>,
    committed: bool,
}

impl MemoryUnit {
    fn ledger(&self, account: AccountId) -> LedgerResult<&StagedLedger> {
        self.staged
            .get(&account)
            .ok_or_else(|| out_of_scope(account))
    }

    fn ledger_mut(&mut self, account: AccountId) -> LedgerResult<&mut StagedLedger> {
        self.staged
            .get_mut(&account)
            .ok_or_else(|| out_of_scope(account))
    }
}

fn out_of_scope(account: AccountId) -> LedgerError {
    LedgerError::storage(format!("account {} is not part of this unit of work", account))
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn account(&mut self, account: AccountId) -> LedgerResult<Account> {
        Ok(self.ledger(account)?.account.clone())
    }

    async fn signed_sum_after(
        &mut self,
        account: AccountId,
        key: TransactionKey,
    ) -> LedgerResult<i64> {
        let staged = self.ledger(account)?;
        // Shifts never change a signed amount, so only inserted rows add to the base
        let inserted = after(&staged.rows, key).filter(|tx| staged.is_inserted(&tx.key()));
        staged
            .base
            .after(key)
            .chain(inserted)
            .try_fold(0i64, |sum, tx| sum.checked_add(tx.signed_amount()))
            .ok_or_else(|| LedgerError::arithmetic_overflow("future sum", account))
    }

    fn next_sequence(&mut self) -> u64 {
        self.shared.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    async fn insert(&mut self, transaction: Transaction) -> LedgerResult<()> {
        let staged = self.ledger_mut(transaction.account_id)?;
        let key = transaction.key();
        let duplicate = staged.rows.contains_key(&key)
            || staged.base.transactions.contains_key(&key)
            || staged.base.keys.contains_key(&transaction.id)
            || staged.rows.values().any(|tx| tx.id == transaction.id);
        if duplicate {
            return Err(LedgerError::storage(format!(
                "duplicate transaction {}",
                transaction.id
            )));
        }
        staged.rows.insert(key, transaction);
        Ok(())
    }

    async fn shift_after(
        &mut self,
        account: AccountId,
        key: TransactionKey,
        delta: i64,
    ) -> LedgerResult<usize> {
        let staged = self.ledger_mut(account)?;
        let shift = |tx: &Transaction| -> LedgerResult<Transaction> {
            let balance_after_minor = tx
                .balance_after_minor
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow("snapshot shift", account))?;
            Ok(Transaction {
                balance_after_minor,
                ..tx.clone()
            })
        };

        // Everything is computed before anything is staged
        let mut shifted = Vec::new();
        for tx in staged.base.after(key) {
            shifted.push(shift(staged.rows.get(&tx.key()).unwrap_or(tx))?);
        }
        for tx in after(&staged.rows, key) {
            if staged.is_inserted(&tx.key()) {
                shifted.push(shift(tx)?);
            }
        }

        let count = shifted.len();
        for tx in shifted {
            staged.rows.insert(tx.key(), tx);
        }
        Ok(count)
    }

    async fn adjust_balance(&mut self, account: AccountId, delta: i64) -> LedgerResult<i64> {
        let staged = self.ledger_mut(account)?;
        staged.account.balance_minor = staged
            .account
            .balance_minor
            .checked_add(delta)
            .ok_or_else(|| LedgerError::arithmetic_overflow("account balance", account))?;
        Ok(staged.account.balance_minor)
    }

    async fn commit(mut self: Box<Self>) -> LedgerResult<()> {
        self.shared.ensure_open()?;

        if let Some(missing) = self
            .staged
            .keys()
            .find(|id| !self.shared.ledgers.contains_key(*id))
        {
            return Err(LedgerError::account_not_found(*missing));
        }

        // No await between here and the end: commit cannot be cancelled halfway
        for (id, staged) in self.staged.drain() {
            match self.shared.ledgers.get_mut(&id) {
                Some(mut slot) => staged.publish(&mut slot.committed),
                None => return Err(LedgerError::account_not_found(id)),
            }
        }
        self.committed = true;
        trace!("Unit of work committed");
        Ok(())
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        if !self.committed {
            debug!(accounts = self.staged.len(), "Unit of work rolled back");
        }
    }
}
