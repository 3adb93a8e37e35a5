//! Keyset pagination over an account's total order
//!
//! Pages run newest first. A cursor is the id of the last transaction the
//! caller has seen; the next page starts strictly after that transaction in
//! descending order. Because the cursor resolves to a [`TransactionKey`] and
//! the page is a key range, pages never overlap and never skip rows as long as
//! the filtered set does not change between requests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};

use crate::types::{
    AccountId, LedgerError, LedgerResult, Transaction, TransactionId, TransactionKey,
};

/// Filter and position for one page of transactions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Earliest `booked_at` to include (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Latest `booked_at` to include (inclusive)
    pub to: Option<DateTime<Utc>>,
    /// Id of the last transaction of the previous page
    pub cursor: Option<TransactionId>,
    /// Maximum page size; `None` returns the whole filtered set
    pub take: Option<usize>,
}

impl PageRequest {
    /// First page of at most `take` transactions
    pub fn first(take: usize) -> Self {
        PageRequest {
            take: Some(take),
            ..Default::default()
        }
    }

    /// Page following `cursor`
    pub fn after(mut self, cursor: TransactionId) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Restrict to `booked_at` within `[from, to]`
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(LedgerError::invalid_argument(format!(
                    "range start {} is after range end {}",
                    from, to
                )));
            }
        }
        if self.take == Some(0) {
            return Err(LedgerError::invalid_argument("take must be at least 1"));
        }
        Ok(())
    }
}

/// Transactions of one page plus the cursor for the following one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub transactions: Vec<Transaction>,
    pub next_cursor: Option<TransactionId>,
}

/// Select one page from an ordered ledger
///
/// `ordered` holds the account's transactions keyed by total order and `keys`
/// resolves transaction ids to their key.
pub fn select_page(
    account: AccountId,
    ordered: &BTreeMap<TransactionKey, Transaction>,
    keys: &HashMap<TransactionId, TransactionKey>,
    request: &PageRequest,
) -> LedgerResult<Page> {
    request.validate()?;

    let lower = match request.from {
        Some(from) => Bound::Included(TransactionKey {
            booked_at: from,
            sequence: 0,
        }),
        None => Bound::Unbounded,
    };

    let to_bound = request.to.map(|to| TransactionKey {
        booked_at: to,
        sequence: u64::MAX,
    });
    let cursor_bound = match request.cursor {
        Some(cursor) => Some(*keys.get(&cursor).ok_or(LedgerError::UnknownCursor {
            account,
            cursor,
        })?),
        None => None,
    };
    let upper = match (to_bound, cursor_bound) {
        (Some(to), Some(cursor)) if cursor <= to => Bound::Excluded(cursor),
        (Some(to), _) => Bound::Included(to),
        (None, Some(cursor)) => Bound::Excluded(cursor),
        (None, None) => Bound::Unbounded,
    };

    if range_is_empty(&lower, &upper) {
        return Ok(Page {
            transactions: Vec::new(),
            next_cursor: None,
        });
    }

    let mut rows = ordered.range((lower, upper)).rev().map(|(_, tx)| tx);
    let transactions: Vec<Transaction> = match request.take {
        Some(take) => rows.by_ref().take(take).cloned().collect(),
        None => rows.by_ref().cloned().collect(),
    };
    let next_cursor = if rows.next().is_some() {
        transactions.last().map(|tx| tx.id)
    } else {
        None
    };

    Ok(Page {
        transactions,
        next_cursor,
    })
}

/// Whether `lower..upper` selects nothing; `BTreeMap::range` panics on inverted bounds
fn range_is_empty(lower: &Bound<TransactionKey>, upper: &Bound<TransactionKey>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurrencyCode, NewTransaction};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    /// Ledger with one credit per day, two on day 2 sharing a timestamp
    fn ledger() -> (
        AccountId,
        BTreeMap<TransactionKey, Transaction>,
        HashMap<TransactionId, TransactionKey>,
    ) {
        let account = Uuid::now_v7();
        let dkk = CurrencyCode::parse("DKK").unwrap();
        let days = [0, 1, 2, 2, 3, 4];

        let mut ordered = BTreeMap::new();
        let mut keys = HashMap::new();
        let mut balance = 0;
        for (seq, day) in days.into_iter().enumerate() {
            balance += 100;
            let tx = NewTransaction::credit(100, base() + Duration::days(day), dkk)
                .into_transaction(account, seq as u64 + 1, balance);
            keys.insert(tx.id, tx.key());
            ordered.insert(tx.key(), tx);
        }
        (account, ordered, keys)
    }

    fn sequences(page: &Page) -> Vec<u64> {
        page.transactions.iter().map(|tx| tx.sequence).collect()
    }

    #[test]
    fn test_unbounded_page_is_descending() {
        let (account, ordered, keys) = ledger();
        let page = select_page(account, &ordered, &keys, &PageRequest::default()).unwrap();
        assert_eq!(sequences(&page), vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_cursor_walk_covers_everything_once() {
        let (account, ordered, keys) = ledger();
        let mut request = PageRequest::first(4);
        let mut seen = Vec::new();

        loop {
            let page = select_page(account, &ordered, &keys, &request).unwrap();
            seen.extend(sequences(&page));
            match page.next_cursor {
                Some(cursor) => request = request.after(cursor),
                None => break,
            }
        }
        assert_eq!(seen, vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_exact_fit_page_has_no_next_cursor() {
        let (account, ordered, keys) = ledger();
        let page = select_page(account, &ordered, &keys, &PageRequest::first(6)).unwrap();
        assert_eq!(page.transactions.len(), 6);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_range_is_inclusive_on_both_ends() {
        let (account, ordered, keys) = ledger();
        let request =
            PageRequest::default().between(base() + Duration::days(1), base() + Duration::days(3));
        let page = select_page(account, &ordered, &keys, &request).unwrap();
        assert_eq!(sequences(&page), vec![5, 4, 3, 2]);
    }

    #[test]
    fn test_cursor_within_range_splits_equal_timestamps() {
        let (account, ordered, keys) = ledger();
        let request = PageRequest::first(2)
            .between(base() + Duration::days(1), base() + Duration::days(3));
        let first = select_page(account, &ordered, &keys, &request).unwrap();
        assert_eq!(sequences(&first), vec![5, 4]);

        let second = select_page(
            account,
            &ordered,
            &keys,
            &request.clone().after(first.next_cursor.unwrap()),
        )
        .unwrap();
        assert_eq!(sequences(&second), vec![3, 2]);
        assert_eq!(second.next_cursor, None);
    }

    #[test]
    fn test_cursor_before_range_start_yields_empty_page() {
        let (account, ordered, keys) = ledger();
        let oldest = ordered.values().next().unwrap().id;
        let request = PageRequest::default()
            .between(base() + Duration::days(2), base() + Duration::days(4))
            .after(oldest);
        let page = select_page(account, &ordered, &keys, &request).unwrap();
        assert!(page.transactions.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_unknown_cursor_is_rejected() {
        let (account, ordered, keys) = ledger();
        let cursor = Uuid::now_v7();
        let err = select_page(account, &ordered, &keys, &PageRequest::first(2).after(cursor))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownCursor { account, cursor });
    }

    #[test]
    fn test_invalid_requests_are_rejected() {
        let (account, ordered, keys) = ledger();
        let inverted = PageRequest::default().between(base() + Duration::days(2), base());
        assert!(select_page(account, &ordered, &keys, &inverted).is_err());
        assert!(select_page(account, &ordered, &keys, &PageRequest::first(0)).is_err());
    }
}
