//! Running-balance ledger engine
//!
//! # Overview
//!
//! Every transaction stores the account balance immediately after it
//! (`balance_after_minor`). Transactions may arrive in any order: inserting a
//! back-dated entry recomputes its own snapshot from everything before it and
//! shifts every later snapshot, all inside one atomic unit of work.
//!
//! # Architecture
//!
//! - [`types`] - Accounts, transactions, currency codes and errors
//! - [`core`] - Ledger logic:
//!   - [`core::recalculator`] - Snapshot and shift arithmetic
//!   - [`core::ledger`] - `LedgerService` (record, page, audit)
//!   - [`core::transfer`] - Atomic two-leg internal transfers
//!   - [`core::memory_store`] - In-memory `TransactionStore`
//!   - [`core::pagination`] - Keyset pages, newest first
//! - [`config`] - Lock timeout, retry and replay settings
//! - [`io`] - CSV input records and account summary output
//! - [`replay`] - Batched, concurrent CSV replay
//! - [`cli`] / [`telemetry`] - Binary plumbing
//!
//! # Ordering
//!
//! Transactions of an account are totally ordered by `(booked_at, sequence)`,
//! where `sequence` is a store-wide insertion counter. A transaction booked at
//! the same instant as existing ones therefore sorts after them.
//!
//! # Invariants
//!
//! For every account, walking its transactions in that order:
//! - each `balance_after_minor` equals the previous snapshot plus the signed
//!   amount (credits positive, debits negative), starting from zero;
//! - the account's `balance_minor` equals the signed sum of all transactions.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod replay;
pub mod telemetry;
pub mod types;

pub use config::{LedgerConfig, ReplayConfig};
pub use core::{
    InternalTransferRecorder, LedgerService, MemoryStore, PageRequest, TransactionStore,
    TransferReceipt, TransferRequest, UnitOfWork,
};
pub use types::{
    Account, AccountId, AccountWithTransactions, CurrencyCode, Direction, ErrorKind, LedgerAudit,
    LedgerError, LedgerResult, NewTransaction, ReceiptItem, Transaction, TransactionId,
};
