//! Internal transfers between two accounts
//!
//! A transfer is a debit on the source and a credit on the destination that
//! share one fresh transfer group. Both legs run inside a single unit of work
//! scoped to both accounts, so either both are committed or neither is.

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use super::ledger::{apply, LedgerService};
use super::traits::TransactionStore;
use crate::types::{
    AccountId, CurrencyCode, Direction, LedgerError, LedgerResult, NewTransaction, Transaction,
    TransferGroup,
};

/// Move `amount_minor` from one account to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: AccountId,
    pub to: AccountId,
    pub amount_minor: i64,
    pub booked_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl TransferRequest {
    pub fn new(
        from: AccountId,
        to: AccountId,
        amount_minor: i64,
        booked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from,
            to,
            amount_minor,
            booked_at,
            description: None,
        }
    }

    /// Resolve both legs through a caller-held map of account keys
    ///
    /// Fails with `UnknownAccountKey` when either key is missing.
    pub fn between<K>(
        accounts: &BTreeMap<K, AccountId>,
        from: &K,
        to: &K,
        amount_minor: i64,
        booked_at: DateTime<Utc>,
    ) -> LedgerResult<Self>
    where
        K: Ord + Display,
    {
        let resolve = |key: &K| {
            accounts
                .get(key)
                .copied()
                .ok_or_else(|| LedgerError::UnknownAccountKey {
                    key: key.to_string(),
                })
        };
        Ok(Self::new(resolve(from)?, resolve(to)?, amount_minor, booked_at))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.from == self.to {
            return Err(LedgerError::invalid_argument(
                "transfer source and destination must differ",
            ));
        }
        if self.amount_minor <= 0 {
            return Err(LedgerError::invalid_amount(
                self.amount_minor,
                "must be strictly positive",
            ));
        }
        Ok(())
    }

    fn leg(
        &self,
        direction: Direction,
        currency: CurrencyCode,
        group: TransferGroup,
    ) -> NewTransaction {
        let mut leg = NewTransaction::new(direction, self.amount_minor, self.booked_at, currency)
            .in_transfer_group(group);
        leg.description = self.description.clone();
        leg
    }
}

/// Both legs of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_group: TransferGroup,
    pub debit: Transaction,
    pub credit: Transaction,
}

/// Records internal transfers on top of a [`LedgerService`]
#[derive(Debug, Clone)]
pub struct InternalTransferRecorder<S> {
    ledger: LedgerService<S>,
}

impl<S: TransactionStore> InternalTransferRecorder<S> {
    pub fn new(ledger: LedgerService<S>) -> Self {
        Self { ledger }
    }

    /// Record both legs of a transfer atomically
    ///
    /// The legs are denominated in the source account's currency; a
    /// destination holding another currency fails with `CurrencyMismatch` and
    /// leaves both accounts untouched.
    #[instrument(
        skip(self, request),
        fields(from = %request.from, to = %request.to, amount = request.amount_minor)
    )]
    pub async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferReceipt> {
        request.validate()?;

        let store = self.ledger.store();
        let lock_timeout = self.ledger.config().lock_timeout;
        let group = Uuid::now_v7();

        let receipt = self
            .ledger
            .with_retry(request.from, || {
                let request = &request;
                async move {
                    let mut unit = store.begin(&[request.from, request.to], lock_timeout).await?;
                    let currency = unit.account(request.from).await?.currency_code;

                    let debit = apply(
                        unit.as_mut(),
                        request.from,
                        request.leg(Direction::Debit, currency, group),
                    )
                    .await?;
                    let credit = apply(
                        unit.as_mut(),
                        request.to,
                        request.leg(Direction::Credit, currency, group),
                    )
                    .await?;
                    unit.commit().await?;

                    Ok(TransferReceipt {
                        transfer_group: group,
                        debit,
                        credit,
                    })
                }
            })
            .await?;

        info!(transfer_group = %group, "Transfer recorded");
        Ok(receipt)
    }
}
