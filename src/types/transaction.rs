//! Transaction-related types for the ledger engine
//!
//! This module defines the stored transaction record, the input used to create
//! one, and the key that totally orders an account's transactions.

use super::account::AccountId;
use super::currency::CurrencyCode;
use super::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Correlation id shared by the two legs of an internal transfer
pub type TransferGroup = Uuid;

/// Money movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money in; positive signed amount
    Credit,

    /// Money out; negative signed amount
    Debit,
}

impl Direction {
    /// Apply this direction's sign to a positive amount
    pub fn signed(self, amount_minor: i64) -> i64 {
        match self {
            Direction::Credit => amount_minor,
            Direction::Debit => -amount_minor,
        }
    }
}

/// Position of a transaction in its account's total order
///
/// Ordered by `booked_at` first and by the store-wide insertion `sequence`
/// second. Because a new transaction always receives the highest sequence
/// issued so far, it sorts after every existing transaction sharing its
/// timestamp, so those are never treated as "after" it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey {
    pub booked_at: DateTime<Utc>,
    pub sequence: u64,
}

/// Receipt line attached to a transaction
///
/// Purely descriptive: receipt lines play no part in the running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub line_no: u32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
}

/// A booked transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,

    /// Insertion sequence, the tie-break for equal `booked_at`
    pub sequence: u64,

    /// Economic event time
    pub booked_at: DateTime<Utc>,
    pub direction: Direction,

    /// Strictly positive amount in minor units; `direction` supplies the sign
    pub amount_minor: i64,
    pub currency_code: CurrencyCode,

    /// Account balance immediately after this transaction
    ///
    /// The only field changed after creation, and only when an earlier
    /// transaction is inserted later.
    pub balance_after_minor: i64,
    pub description: String,
    pub merchant_name: Option<String>,
    pub is_internal_transfer: bool,
    pub transfer_group: Option<TransferGroup>,
    pub receipt_items: Vec<ReceiptItem>,
}

impl Transaction {
    pub fn key(&self) -> TransactionKey {
        TransactionKey {
            booked_at: self.booked_at,
            sequence: self.sequence,
        }
    }

    pub fn signed_amount(&self) -> i64 {
        self.direction.signed(self.amount_minor)
    }
}

/// Input for recording a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub direction: Direction,
    pub amount_minor: i64,
    pub booked_at: DateTime<Utc>,
    pub currency_code: CurrencyCode,
    pub description: Option<String>,
    pub merchant_name: Option<String>,
    pub is_internal_transfer: bool,
    pub transfer_group: Option<TransferGroup>,
    pub receipt_items: Vec<ReceiptItem>,
}

impl NewTransaction {
    pub fn new(
        direction: Direction,
        amount_minor: i64,
        booked_at: DateTime<Utc>,
        currency_code: CurrencyCode,
    ) -> Self {
        NewTransaction {
            direction,
            amount_minor,
            booked_at,
            currency_code,
            description: None,
            merchant_name: None,
            is_internal_transfer: false,
            transfer_group: None,
            receipt_items: Vec::new(),
        }
    }

    /// Shorthand for a credit
    pub fn credit(amount_minor: i64, booked_at: DateTime<Utc>, currency: CurrencyCode) -> Self {
        Self::new(Direction::Credit, amount_minor, booked_at, currency)
    }

    /// Shorthand for a debit
    pub fn debit(amount_minor: i64, booked_at: DateTime<Utc>, currency: CurrencyCode) -> Self {
        Self::new(Direction::Debit, amount_minor, booked_at, currency)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_merchant(mut self, merchant_name: impl Into<String>) -> Self {
        self.merchant_name = Some(merchant_name.into());
        self
    }

    pub fn with_receipt_items(mut self, items: Vec<ReceiptItem>) -> Self {
        self.receipt_items = items;
        self
    }

    /// Mark as one leg of an internal transfer
    pub fn in_transfer_group(mut self, group: TransferGroup) -> Self {
        self.is_internal_transfer = true;
        self.transfer_group = Some(group);
        self
    }

    /// Reject input that must never reach the store
    pub fn validate(&self) -> LedgerResult<()> {
        if self.amount_minor <= 0 {
            return Err(LedgerError::invalid_amount(
                self.amount_minor,
                "must be strictly positive",
            ));
        }
        Ok(())
    }

    pub fn signed_amount(&self) -> i64 {
        self.direction.signed(self.amount_minor)
    }

    /// Materialize the stored record once its position and snapshot are known
    pub(crate) fn into_transaction(
        self,
        account_id: AccountId,
        sequence: u64,
        balance_after_minor: i64,
    ) -> Transaction {
        Transaction {
            id: Uuid::now_v7(),
            account_id,
            sequence,
            booked_at: self.booked_at,
            direction: self.direction,
            amount_minor: self.amount_minor,
            currency_code: self.currency_code,
            balance_after_minor,
            description: self.description.unwrap_or_default(),
            merchant_name: self.merchant_name,
            is_internal_transfer: self.is_internal_transfer,
            transfer_group: self.transfer_group,
            receipt_items: self.receipt_items,
        }
    }
}
