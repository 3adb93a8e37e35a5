//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Storage seam (`TransactionStore`, `UnitOfWork`)
//! - `memory_store` - In-memory store with per-account writer locks
//! - `recalculator` - Running-balance arithmetic for out-of-order inserts
//! - `pagination` - Keyset pages over an account's total order
//! - `ledger` - `LedgerService`, the write/read orchestration
//! - `transfer` - Atomic internal transfers between two accounts

pub mod ledger;
pub mod memory_store;
pub mod pagination;
pub mod recalculator;
pub mod traits;
pub mod transfer;

pub use ledger::LedgerService;
pub use memory_store::MemoryStore;
pub use pagination::{Page, PageRequest};
pub use recalculator::BalancePlan;
pub use traits::{TransactionStore, UnitOfWork};
pub use transfer::{InternalTransferRecorder, TransferReceipt, TransferRequest};
