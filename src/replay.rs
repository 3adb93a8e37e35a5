//! CSV replay into an in-memory ledger
//!
//! # Architecture
//!
//! ```text
//! replay_file
//!     ├── ReplayConfig  (batch_size, max_concurrent)
//!     ├── AsyncReader   (batch CSV reading)
//!     ├── name → AccountId map (accounts opened on first reference)
//!     └── LedgerService + InternalTransferRecorder over a MemoryStore
//! ```
//!
//! Batches are read one after another. Within a batch, accounts are resolved
//! first (sequentially, so each name is opened exactly once) and the rows are
//! then applied with at most `max_concurrent` in flight. Because every insert
//! recomputes the snapshots after it, the final ledgers do not depend on the
//! order rows finish in.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use futures::io::AsyncRead;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::config::{LedgerConfig, ReplayConfig};
use crate::core::{
    InternalTransferRecorder, LedgerService, MemoryStore, TransactionStore, TransferRequest,
};
use crate::io::{write_accounts_csv, AccountSummary, AsyncReader, LedgerCommand};
use crate::types::{AccountId, LedgerError, LedgerResult};

/// Totals of one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Account ids by name
    pub accounts: BTreeMap<String, AccountId>,
    /// Rows applied to the ledger
    pub applied: usize,
    /// Rows skipped as malformed or rejected by the ledger
    pub rejected: usize,
}

/// Replays ledger commands against one store
pub struct Replayer<S> {
    ledger: LedgerService<S>,
    transfers: InternalTransferRecorder<S>,
    config: ReplayConfig,
}

impl<S: TransactionStore> Replayer<S> {
    pub fn new(ledger: LedgerService<S>, config: ReplayConfig) -> Self {
        Self {
            transfers: InternalTransferRecorder::new(ledger.clone()),
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> &LedgerService<S> {
        &self.ledger
    }

    /// Read every batch from `reader` and apply it
    #[instrument(
        skip_all,
        fields(batch_size = self.config.batch_size, max_concurrent = self.config.max_concurrent)
    )]
    pub async fn replay<R>(&self, reader: R) -> LedgerResult<ReplayReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let mut reader = AsyncReader::new(reader);
        let mut report = ReplayReport::default();

        loop {
            let batch = reader.read_batch(self.config.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for command in &batch {
                for (name, currency) in command.accounts() {
                    if !report.accounts.contains_key(name) {
                        let account = self.ledger.create_account(name, currency).await?;
                        report.accounts.insert(name.to_string(), account.id);
                    }
                }
            }

            let accounts = &report.accounts;
            let results: Vec<LedgerResult<()>> = stream::iter(batch)
                .map(|command| self.apply(accounts, command))
                .buffer_unordered(self.config.max_concurrent)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(()) => report.applied += 1,
                    Err(err @ LedgerError::StoreClosed) => return Err(err),
                    Err(err) => {
                        report.rejected += 1;
                        warn!(error = %err, kind = ?err.kind(), "Row rejected");
                    }
                }
            }
        }

        report.rejected += reader.rejected();
        info!(
            accounts = report.accounts.len(),
            applied = report.applied,
            rejected = report.rejected,
            "Replay finished"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        accounts: &BTreeMap<String, AccountId>,
        command: LedgerCommand,
    ) -> LedgerResult<()> {
        match command {
            LedgerCommand::Entry {
                account,
                transaction,
            } => {
                let id = lookup(accounts, &account)?;
                self.ledger.record_transaction(id, transaction).await?;
            }
            LedgerCommand::Transfer {
                from,
                to,
                amount_minor,
                booked_at,
                description,
                ..
            } => {
                let mut request =
                    TransferRequest::between(accounts, &from, &to, amount_minor, booked_at)?;
                request.description = description;
                self.transfers.transfer(request).await?;
            }
        }
        Ok(())
    }

    /// Audit every replayed account, returning how many failed
    pub async fn verify(&self, report: &ReplayReport) -> usize {
        let mut failures = 0;
        for (name, id) in &report.accounts {
            if let Err(err) = self.ledger.audit(*id).await {
                failures += 1;
                warn!(account = %name, error = %err, "Audit failed");
            }
        }
        failures
    }

    /// Final state of every replayed account
    pub async fn summaries(&self, report: &ReplayReport) -> LedgerResult<Vec<AccountSummary>> {
        let mut summaries = Vec::with_capacity(report.accounts.len());
        for (name, id) in &report.accounts {
            let (account, transactions) = self
                .ledger
                .store()
                .load_ledger(*id)
                .await?
                .ok_or_else(|| LedgerError::account_not_found(*id))?;
            summaries.push(AccountSummary {
                name: name.clone(),
                currency: account.currency_code,
                balance_minor: account.balance_minor,
                transactions: transactions.len(),
            });
        }
        Ok(summaries)
    }
}

fn lookup(accounts: &BTreeMap<String, AccountId>, name: &str) -> LedgerResult<AccountId> {
    accounts
        .get(name)
        .copied()
        .ok_or_else(|| LedgerError::UnknownAccountKey {
            key: name.to_string(),
        })
}

/// Outcome of [`replay_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub report: ReplayReport,
    /// Accounts failing their audit; always zero unless verification was requested
    pub audit_failures: usize,
}

/// Replay a CSV file and write account summaries to `output`
///
/// Builds its own multi-threaded runtime sized by `max_concurrent`. Fatal
/// errors (unreadable input, closed store, output failures) are returned;
/// individual rows that fail are logged and counted.
pub fn replay_file(
    input_path: &Path,
    ledger_config: LedgerConfig,
    replay_config: ReplayConfig,
    verify: bool,
    output: &mut dyn Write,
) -> LedgerResult<ReplayOutcome> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(replay_config.max_concurrent)
        .enable_all()
        .build()
        .map_err(|e| LedgerError::storage(format!("Failed to create tokio runtime: {}", e)))?;

    runtime.block_on(async {
        let store = Arc::new(MemoryStore::new());
        let replayer = Replayer::new(
            LedgerService::new(Arc::clone(&store), ledger_config),
            replay_config,
        );

        let file = tokio::fs::File::open(input_path).await.map_err(|e| {
            LedgerError::storage(format!(
                "Failed to open file '{}': {}",
                input_path.display(),
                e
            ))
        })?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);

        let report = replayer.replay(compat_file).await?;
        let audit_failures = if verify {
            replayer.verify(&report).await
        } else {
            0
        };

        let summaries = replayer.summaries(&report).await?;
        write_accounts_csv(&summaries, output)?;
        store.close().await;

        Ok(ReplayOutcome {
            report,
            audit_failures,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    const HEADER: &str = "type,account,counterparty,booked_at,amount,currency,description,merchant\n";

    fn replayer(max_concurrent: usize) -> Replayer<MemoryStore> {
        Replayer::new(
            LedgerService::new(Arc::new(MemoryStore::new()), LedgerConfig::default()),
            ReplayConfig::new(2, max_concurrent),
        )
    }

    fn input(rows: &str) -> Cursor<Vec<u8>> {
        Cursor::new(format!("{}{}", HEADER, rows).into_bytes())
    }

    #[tokio::test]
    async fn test_replay_out_of_order_rows() {
        let replayer = replayer(4);
        let report = replayer
            .replay(input(
                "credit,Budget,,2025-01-02,10.00,DKK,,\n\
                 debit,Budget,,2025-01-01,3.00,DKK,,Netto\n\
                 credit,Budget,,2025-01-03,1.50,DKK,,\n",
            ))
            .await
            .unwrap();

        assert_eq!(report.applied, 3);
        assert_eq!(report.rejected, 0);
        let summaries = replayer.summaries(&report).await.unwrap();
        assert_eq!(summaries[0].balance_minor, 850);
        assert_eq!(summaries[0].transactions, 3);
        assert_eq!(replayer.verify(&report).await, 0);
    }

    #[tokio::test]
    async fn test_replay_transfer_opens_counterparty() {
        let replayer = replayer(2);
        let report = replayer
            .replay(input(
                "credit,X,,2025-01-01,10.00,DKK,,\n\
                 transfer,X,Y,2025-01-02,5.00,DKK,rent,\n",
            ))
            .await
            .unwrap();

        assert_eq!(report.accounts.len(), 2);
        let summaries = replayer.summaries(&report).await.unwrap();
        let balances: Vec<_> = summaries
            .iter()
            .map(|s| (s.name.as_str(), s.balance_minor))
            .collect();
        assert_eq!(balances, vec![("X", 500), ("Y", 500)]);
    }

    #[tokio::test]
    async fn test_replay_counts_rejected_rows() {
        let replayer = replayer(2);
        let report = replayer
            .replay(input(
                "credit,A,,2025-01-01,1.00,DKK,,\n\
                 credit,A,,2025-01-01,1.00,EUR,,\n\
                 credit,A,,garbage,1.00,DKK,,\n\
                 transfer,A,A,2025-01-02,1.00,DKK,,\n",
            ))
            .await
            .unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(report.rejected, 3);
    }
}
