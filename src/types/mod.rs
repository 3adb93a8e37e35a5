//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account-related types and read views
//! - `currency`: Validated ISO 4217 currency codes
//! - `transaction`: Transaction records, inputs and the total-order key
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod currency;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountId, AccountWithTransactions, LedgerAudit};
pub use currency::CurrencyCode;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use transaction::{
    Direction, NewTransaction, ReceiptItem, Transaction, TransactionId, TransactionKey,
    TransferGroup,
};
