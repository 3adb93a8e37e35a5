//! Account-related types for the ledger engine
//!
//! This module defines the Account structure and the read view that pairs an
//! account with one page of its transactions.

use super::currency::CurrencyCode;
use super::transaction::{Transaction, TransactionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account identifier
pub type AccountId = Uuid;

/// A ledger account
///
/// Accounts are created administratively and never hold transactions in a
/// currency other than their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub id: AccountId,

    /// Display name chosen at creation
    pub name: String,

    /// Currency every transaction on this account is booked in
    pub currency_code: CurrencyCode,

    /// Cached aggregate balance in minor units
    ///
    /// Always equal to the `balance_after_minor` of the chronologically last
    /// transaction, or 0 when the account has none. Only transaction writes
    /// change it.
    pub balance_minor: i64,
}

impl Account {
    /// Create a new empty account with a fresh id
    pub fn new(name: impl Into<String>, currency_code: CurrencyCode) -> Self {
        Account {
            id: Uuid::now_v7(),
            name: name.into(),
            currency_code,
            balance_minor: 0,
        }
    }
}

/// An account together with one page of its transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountWithTransactions {
    pub account: Account,

    /// Most recent first, in descending total order
    pub transactions: Vec<Transaction>,

    /// Cursor to pass for the next page, `None` once the filtered set is exhausted
    pub next_cursor: Option<TransactionId>,
}

/// Outcome of a successful ledger audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAudit {
    pub account: AccountId,
    pub transactions_checked: usize,
    pub balance_minor: i64,
}
