//! Benchmark suite for ledger inserts
//!
//! Compares appending in chronological order with inserting back-dated
//! entries, which shift every later snapshot, and checks that appending to a
//! long history stays cheap.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```

use chrono::{Duration, TimeZone, Utc};
use running_ledger::{
    AccountId, CurrencyCode, LedgerConfig, LedgerService, MemoryStore, NewTransaction,
    TransactionStore,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn main() {
    divan::main();
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Record `count` credits, visiting minutes in the order given by `minute`
fn record_all(count: i64, minute: impl Fn(i64) -> i64) {
    let runtime = runtime();
    runtime.block_on(async {
        let store = Arc::new(MemoryStore::new());
        let dkk = CurrencyCode::parse("DKK").expect("valid code");
        let account: AccountId = store
            .create_account("Bench", dkk)
            .await
            .expect("account created")
            .id;
        let ledger = LedgerService::new(store, LedgerConfig::default());
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        for i in 0..count {
            ledger
                .record_transaction(
                    account,
                    NewTransaction::credit(100, start + Duration::minutes(minute(i)), dkk),
                )
                .await
                .expect("insert succeeded");
        }
    });
}

/// Chronological inserts: every entry is appended
#[divan::bench(args = [100, 1_000])]
fn append_in_order(count: i64) {
    record_all(count, |i| i);
}

/// Reverse-chronological inserts: every entry shifts all earlier-inserted ones
#[divan::bench(args = [100, 1_000])]
fn insert_back_dated(count: i64) {
    record_all(count, |i| count - i);
}

/// Interleaved inserts landing in the middle of the ledger
#[divan::bench(args = [100, 1_000])]
fn insert_interleaved(count: i64) {
    record_all(count, |i| if i % 2 == 0 { i } else { count - i });
}

/// One hundred appends onto an account that already holds `history` rows
///
/// History is built outside the measured section; the cost per append should
/// not grow with it.
#[divan::bench(args = [1_000, 10_000, 50_000])]
fn append_to_long_history(bencher: divan::Bencher, history: i64) {
    bencher
        .with_inputs(|| {
            let runtime = runtime();
            let dkk = CurrencyCode::parse("DKK").expect("valid code");
            let (ledger, account) = runtime.block_on(async {
                let store = Arc::new(MemoryStore::new());
                let account = store
                    .create_account("Bench", dkk)
                    .await
                    .expect("account created")
                    .id;
                let ledger = LedgerService::new(store, LedgerConfig::default());
                for i in 0..history {
                    ledger
                        .record_transaction(account, NewTransaction::credit(100, minute(i), dkk))
                        .await
                        .expect("insert succeeded");
                }
                (ledger, account)
            });
            (runtime, ledger, account, dkk)
        })
        .bench_values(|(runtime, ledger, account, dkk)| {
            runtime.block_on(async {
                for i in history..history + 100 {
                    ledger
                        .record_transaction(account, NewTransaction::credit(100, minute(i), dkk))
                        .await
                        .expect("insert succeeded");
                }
            });
        });
}

fn minute(i: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i)
}
