//! Storage seam for the ledger
//!
//! This module defines the trait abstractions the ledger service is written
//! against, so the in-memory store and a database-backed one can be used
//! interchangeably.
//!
//! Writes always go through a [`UnitOfWork`]: a value that owns exclusive
//! access to a fixed set of accounts, stages every read-modify-write, and
//! either commits all of it or none of it. Dropping a unit without calling
//! [`UnitOfWork::commit`] rolls it back, which makes every early return,
//! error and cancelled future safe by construction.

use std::time::Duration;

use async_trait::async_trait;

use super::pagination::PageRequest;
use crate::types::{
    Account, AccountId, AccountWithTransactions, CurrencyCode, LedgerResult, Transaction,
    TransactionKey,
};

/// Persistence abstraction over accounts and transactions
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Create an empty account
    async fn create_account(&self, name: &str, currency: CurrencyCode) -> LedgerResult<Account>;

    /// Open a unit of work holding exclusive write access to `accounts`
    ///
    /// Waits at most `lock_timeout` for contended accounts and fails with
    /// `LockTimeout` after that. Fails with `AccountNotFound` if any account
    /// does not exist.
    async fn begin(
        &self,
        accounts: &[AccountId],
        lock_timeout: Duration,
    ) -> LedgerResult<Box<dyn UnitOfWork>>;

    /// Point read of the last committed account state
    async fn load_account(&self, account: AccountId) -> LedgerResult<Option<Account>>;

    /// One page of an account's transactions, read from a single committed state
    async fn load_page(
        &self,
        account: AccountId,
        request: &PageRequest,
    ) -> LedgerResult<Option<AccountWithTransactions>>;

    /// Every transaction of an account in ascending total order
    async fn load_ledger(&self, account: AccountId)
        -> LedgerResult<Option<(Account, Vec<Transaction>)>>;

    /// Release the store; later operations fail with `StoreClosed`
    async fn close(&self);
}

/// Scoped, atomic set of ledger reads and writes
///
/// Reads observe the unit's own staged writes. Nothing becomes visible to
/// other callers before `commit` returns successfully.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Current (staged) state of an account in scope
    async fn account(&mut self, account: AccountId) -> LedgerResult<Account>;

    /// Sum of signed amounts of transactions strictly after `key`
    async fn signed_sum_after(&mut self, account: AccountId, key: TransactionKey)
        -> LedgerResult<i64>;

    /// Next value of the store-wide insertion sequence
    fn next_sequence(&mut self) -> u64;

    /// Stage a new transaction row
    async fn insert(&mut self, transaction: Transaction) -> LedgerResult<()>;

    /// Add `delta` to the snapshot of every transaction strictly after `key`
    ///
    /// Returns the number of rows shifted.
    async fn shift_after(
        &mut self,
        account: AccountId,
        key: TransactionKey,
        delta: i64,
    ) -> LedgerResult<usize>;

    /// Add `delta` to the cached account balance, returning the new balance
    async fn adjust_balance(&mut self, account: AccountId, delta: i64) -> LedgerResult<i64>;

    /// Publish every staged write atomically
    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
