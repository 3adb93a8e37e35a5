//! Error types for the ledger engine
//!
//! Every fallible operation returns [`LedgerError`]. Callers that only need to
//! know *how* to react (retry, report to the user, give up) match on
//! [`LedgerError::kind`] instead of on individual variants.
//!
//! # Error Categories
//!
//! - **NotFound**: the referenced account does not exist
//! - **InvalidArgument**: malformed input, rejected before any write
//! - **Conflict**: per-account writers collided; retried internally
//! - **Integrity**: arithmetic overflow or a broken ledger invariant
//! - **Storage**: backing-store failures, propagated unchanged

use crate::types::{AccountId, TransactionId};
use thiserror::Error;

/// Result alias used throughout the crate
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    Integrity,
    Storage,
}

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The account does not exist in the store
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The account that was looked up
        account: AccountId,
    },

    /// A caller-side account key could not be resolved to an account id
    #[error("No account registered under key '{key}'")]
    UnknownAccountKey {
        /// The unresolved key, rendered for display
        key: String,
    },

    /// Amount is zero, negative or not representable in minor units
    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount {
        /// The offending amount as given
        amount: String,
        /// Why it was rejected
        reason: String,
    },

    /// Currency code is not a three-letter ISO 4217 code
    #[error("Invalid currency code '{code}'")]
    InvalidCurrency {
        /// The offending code as given
        code: String,
    },

    /// Timestamp could not be parsed
    #[error("Invalid timestamp '{value}'")]
    InvalidTimestamp {
        /// The offending timestamp as given
        value: String,
    },

    /// Transaction currency differs from the account currency
    #[error("Currency mismatch on account {account}: account holds {expected}, got {actual}")]
    CurrencyMismatch {
        /// The account the transaction targets
        account: AccountId,
        /// The account's currency
        expected: String,
        /// The transaction's currency
        actual: String,
    },

    /// Pagination cursor is not a transaction of the account
    #[error("Cursor {cursor} does not belong to account {account}")]
    UnknownCursor {
        /// The account being paged
        account: AccountId,
        /// The cursor that was given
        cursor: TransactionId,
    },

    /// Any other rejected argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem
        message: String,
    },

    /// Waiting for an account's writer lock exceeded the configured bound
    #[error("Timed out after {waited_ms}ms waiting for account {account}")]
    LockTimeout {
        /// The contended account
        account: AccountId,
        /// How long the unit waited
        waited_ms: u64,
    },

    /// Conflicts persisted after every retry
    #[error("Conflict on account {account} not resolved after {attempts} attempts")]
    Conflict {
        /// The contended account
        account: AccountId,
        /// Number of attempts made
        attempts: u32,
    },

    /// A balance computation would overflow i64 minor units
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Step that would overflow
        operation: String,
        /// The account being updated
        account: AccountId,
    },

    /// A stored ledger no longer satisfies its running-balance invariants
    #[error("Ledger invariant violated on account {account}: {message}")]
    InvariantViolation {
        /// The inconsistent account
        account: AccountId,
        /// What was found
        message: String,
    },

    /// The store has been closed
    #[error("Store is closed")]
    StoreClosed,

    /// Any other backing-store failure
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
    },
}

impl LedgerError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound { .. } | LedgerError::UnknownAccountKey { .. } => {
                ErrorKind::NotFound
            }
            LedgerError::InvalidAmount { .. }
            | LedgerError::InvalidCurrency { .. }
            | LedgerError::InvalidTimestamp { .. }
            | LedgerError::CurrencyMismatch { .. }
            | LedgerError::UnknownCursor { .. }
            | LedgerError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            LedgerError::LockTimeout { .. } | LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::ArithmeticOverflow { .. } | LedgerError::InvariantViolation { .. } => {
                ErrorKind::Integrity
            }
            LedgerError::StoreClosed | LedgerError::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// Whether the operation may succeed if attempted again unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::LockTimeout { .. })
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: impl ToString, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidCurrency error
    pub fn invalid_currency(code: &str) -> Self {
        LedgerError::InvalidCurrency {
            code: code.to_string(),
        }
    }

    /// Create an InvalidTimestamp error
    pub fn invalid_timestamp(value: &str) -> Self {
        LedgerError::InvalidTimestamp {
            value: value.to_string(),
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        LedgerError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create an InvariantViolation error
    pub fn invariant_violation(account: AccountId, message: impl Into<String>) -> Self {
        LedgerError::InvariantViolation {
            account,
            message: message.into(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::storage(error.to_string())
    }
}
