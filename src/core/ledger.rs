//! Ledger orchestration
//!
//! This module provides [`LedgerService`], the public entry point for writing
//! and reading account ledgers.
//!
//! # Architecture
//!
//! ```text
//! LedgerService
//!     ├── Arc<S: TransactionStore>  (explicitly constructed store handle)
//!     └── LedgerConfig              (lock timeout, retry policy)
//! ```
//!
//! Every write runs inside one [`UnitOfWork`]:
//!
//! 1. read the account balance
//! 2. read the signed sum of everything strictly after the insertion key
//! 3. plan the snapshot and shift with the recalculator
//! 4. insert, shift later snapshots, adjust the account balance
//! 5. commit
//!
//! A failure at any step drops the unit, which discards every staged write.
//! Lock timeouts are retried with exponential backoff; anything else is
//! returned to the caller unchanged.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::pagination::PageRequest;
use super::recalculator;
use super::traits::{TransactionStore, UnitOfWork};
use crate::config::LedgerConfig;
use crate::types::{
    Account, AccountId, AccountWithTransactions, CurrencyCode, LedgerAudit, LedgerError,
    LedgerResult, NewTransaction, Transaction, TransactionKey,
};

/// Public entry point for recording and reading ledgers
///
/// Cheap to clone; clones share the store.
#[derive(Debug)]
pub struct LedgerService<S> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: TransactionStore> LedgerService<S> {
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Open an empty account
    #[instrument(skip(self, currency), fields(currency = %currency))]
    pub async fn create_account(
        &self,
        name: &str,
        currency: CurrencyCode,
    ) -> LedgerResult<Account> {
        let account = self.store.create_account(name, currency).await?;
        info!(account = %account.id, "Account opened");
        Ok(account)
    }

    /// Record a transaction, recomputing every later snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(Transaction)` - the created record with its final `balance_after_minor`
    /// * `Err(LedgerError::InvalidAmount)` - amount is not strictly positive
    /// * `Err(LedgerError::AccountNotFound)` - the account does not exist
    /// * `Err(LedgerError::CurrencyMismatch)` - currency differs from the account's
    /// * `Err(LedgerError::Conflict)` - the account stayed contended through every retry
    #[instrument(
        skip(self, new),
        fields(direction = ?new.direction, amount = new.amount_minor, booked_at = %new.booked_at)
    )]
    pub async fn record_transaction(
        &self,
        account: AccountId,
        new: NewTransaction,
    ) -> LedgerResult<Transaction> {
        new.validate()?;

        let created = self
            .with_retry(account, || {
                let new = new.clone();
                async move {
                    let mut unit = self.store.begin(&[account], self.config.lock_timeout).await?;
                    let created = apply(unit.as_mut(), account, new).await?;
                    unit.commit().await?;
                    Ok(created)
                }
            })
            .await?;

        info!(
            transaction = %created.id,
            balance_after = created.balance_after_minor,
            "Transaction recorded"
        );
        Ok(created)
    }

    /// Read an account with one page of its transactions, newest first
    ///
    /// Returns `Ok(None)` when the account does not exist.
    #[instrument(skip(self, request))]
    pub async fn get_account_with_transactions(
        &self,
        account: AccountId,
        request: &PageRequest,
    ) -> LedgerResult<Option<AccountWithTransactions>> {
        request.validate()?;
        self.store.load_page(account, request).await
    }

    /// Verify the running-balance and aggregate invariants of an account
    #[instrument(skip(self))]
    pub async fn audit(&self, account: AccountId) -> LedgerResult<LedgerAudit> {
        let (account_state, transactions) = self
            .store
            .load_ledger(account)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(account))?;

        let mut running = 0i64;
        let mut previous: Option<TransactionKey> = None;
        for tx in &transactions {
            if previous.is_some_and(|key| key >= tx.key()) {
                return Err(LedgerError::invariant_violation(
                    account,
                    format!("transaction {} is out of order", tx.id),
                ));
            }
            running = running
                .checked_add(tx.signed_amount())
                .ok_or_else(|| LedgerError::arithmetic_overflow("audit", account))?;
            if tx.balance_after_minor != running {
                return Err(LedgerError::invariant_violation(
                    account,
                    format!(
                        "transaction {} has snapshot {}, expected {}",
                        tx.id, tx.balance_after_minor, running
                    ),
                ));
            }
            previous = Some(tx.key());
        }

        if account_state.balance_minor != running {
            return Err(LedgerError::invariant_violation(
                account,
                format!(
                    "account balance {} does not match ledger total {}",
                    account_state.balance_minor, running
                ),
            ));
        }

        debug!(transactions = transactions.len(), "Ledger consistent");
        Ok(LedgerAudit {
            account,
            transactions_checked: transactions.len(),
            balance_minor: running,
        })
    }

    /// Run `attempt` until it succeeds, fails permanently, or runs out of retries
    ///
    /// The surfaced `Conflict` names the account whose lock timed out, falling
    /// back to `account`.
    pub(crate) async fn with_retry<T, F, Fut>(
        &self,
        account: AccountId,
        mut attempt: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        for n in 1..=attempts {
            match attempt().await {
                Err(err) if err.is_retryable() && n < attempts => {
                    let backoff = self.config.backoff_for(n);
                    warn!(
                        %err,
                        attempt = n,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying after conflict"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) if err.is_retryable() => {
                    warn!(%err, attempts, "Giving up after repeated conflicts");
                    let account = match err {
                        LedgerError::LockTimeout { account, .. } => account,
                        _ => account,
                    };
                    return Err(LedgerError::Conflict { account, attempts });
                }
                other => return other,
            }
        }
        Err(LedgerError::Conflict { account, attempts })
    }
}

/// Insert one transaction into `account` inside an open unit of work
///
/// Validation of `new` is the caller's job. Nothing is visible outside the unit
/// until it is committed.
pub(crate) async fn apply(
    unit: &mut dyn UnitOfWork,
    account: AccountId,
    new: NewTransaction,
) -> LedgerResult<Transaction> {
    let state = unit.account(account).await?;
    if state.currency_code != new.currency_code {
        return Err(LedgerError::CurrencyMismatch {
            account,
            expected: state.currency_code.to_string(),
            actual: new.currency_code.to_string(),
        });
    }

    let key = TransactionKey {
        booked_at: new.booked_at,
        sequence: unit.next_sequence(),
    };
    let future_sum = unit.signed_sum_after(account, key).await?;
    let plan = recalculator::plan(account, state.balance_minor, future_sum, new.signed_amount())?;

    let transaction = new.into_transaction(account, key.sequence, plan.snapshot);
    unit.insert(transaction.clone()).await?;
    let shifted = unit.shift_after(account, key, plan.shift).await?;
    let balance = unit.adjust_balance(account, plan.shift).await?;
    if balance != plan.account_balance {
        return Err(LedgerError::invariant_violation(
            account,
            format!(
                "balance {} after insert, planned {}",
                balance, plan.account_balance
            ),
        ));
    }

    debug!(
        sequence = key.sequence,
        future_sum,
        shifted,
        balance,
        "Balance plan applied"
    );
    Ok(transaction)
}
