//! Running-balance recalculation for out-of-order inserts
//!
//! The account aggregate already contains every transaction, including those
//! booked after the one being inserted. Subtracting the signed sum of those
//! later transactions recovers the balance at the insertion point, which is all
//! that is needed to place the new snapshot and to know how far every later
//! snapshot moves.
//!
//! ```text
//! balance_before = account_balance - future_signed_sum
//! snapshot       = balance_before + new_signed_amount
//! later rows    += new_signed_amount
//! account       += new_signed_amount
//! ```
//!
//! Appending the newest transaction is the degenerate case `future_signed_sum = 0`.

use crate::types::{AccountId, LedgerError, LedgerResult};

/// Writes required to insert one transaction into an account's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancePlan {
    /// Balance immediately before the insertion point
    pub balance_before: i64,

    /// `balance_after_minor` of the new transaction
    pub snapshot: i64,

    /// Amount added to every snapshot strictly after the insertion point
    pub shift: i64,

    /// New cached account balance
    pub account_balance: i64,
}

/// Compute the [`BalancePlan`] for inserting a transaction
///
/// All arithmetic is checked; an overflow of `i64` minor units fails with
/// [`LedgerError::ArithmeticOverflow`] instead of wrapping.
pub fn plan(
    account: AccountId,
    account_balance: i64,
    future_signed_sum: i64,
    new_signed_amount: i64,
) -> LedgerResult<BalancePlan> {
    let balance_before = account_balance
        .checked_sub(future_signed_sum)
        .ok_or_else(|| LedgerError::arithmetic_overflow("balance before insertion", account))?;

    let snapshot = balance_before
        .checked_add(new_signed_amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("snapshot", account))?;

    let account_balance = account_balance
        .checked_add(new_signed_amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("account balance", account))?;

    Ok(BalancePlan {
        balance_before,
        snapshot,
        shift: new_signed_amount,
        account_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    // Credit 1000 into an empty account
    #[case::first_credit(0, 0, 1000, 0, 1000, 1000)]
    // Debit 300 back-dated before that credit
    #[case::back_dated_debit(1000, 1000, -300, 0, -300, 700)]
    // Plain append after existing history
    #[case::append(700, 0, 50, 700, 750, 750)]
    // Insert between -300 and +1000
    #[case::middle(700, 1000, 200, -300, -100, 900)]
    fn test_plan(
        #[case] account_balance: i64,
        #[case] future_sum: i64,
        #[case] amount: i64,
        #[case] before: i64,
        #[case] snapshot: i64,
        #[case] after: i64,
    ) {
        let plan = plan(Uuid::nil(), account_balance, future_sum, amount).unwrap();
        assert_eq!(plan.balance_before, before);
        assert_eq!(plan.snapshot, snapshot);
        assert_eq!(plan.shift, amount);
        assert_eq!(plan.account_balance, after);
    }

    #[rstest]
    #[case::balance_before(i64::MIN, 1, 1)]
    #[case::snapshot(i64::MAX - 5, 0, 10)]
    #[case::account(i64::MAX - 1, 5, 3)]
    fn test_plan_overflow(#[case] balance: i64, #[case] future_sum: i64, #[case] amount: i64) {
        let err = plan(Uuid::nil(), balance, future_sum, amount).unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticOverflow { .. }));
    }

    /// Reference model: replay a ledger held as (key, signed) pairs, inserting
    /// each entry with `plan` exactly as the store does.
    fn replay(entries: &[(u32, i64)]) -> (Vec<(u32, usize, i64)>, i64) {
        // (timestamp, arrival index, snapshot)
        let mut ledger: Vec<(u32, usize, i64, i64)> = Vec::new();
        let mut balance = 0i64;

        for (arrival, &(ts, signed)) in entries.iter().enumerate() {
            let future: i64 = ledger
                .iter()
                .filter(|(t, ..)| *t > ts)
                .map(|(_, _, amount, _)| *amount)
                .sum();
            let plan = plan(Uuid::nil(), balance, future, signed).unwrap();
            for row in ledger.iter_mut().filter(|(t, ..)| *t > ts) {
                row.3 += plan.shift;
            }
            ledger.push((ts, arrival, signed, plan.snapshot));
            balance = plan.account_balance;
        }

        ledger.sort_by_key(|(t, arrival, ..)| (*t, *arrival));
        let rows = ledger
            .into_iter()
            .map(|(t, arrival, _, snapshot)| (t, arrival, snapshot))
            .collect();
        (rows, balance)
    }

    proptest! {
        #[test]
        fn prop_replay_keeps_running_balance(
            entries in prop::collection::vec((0u32..20, -10_000i64..10_000), 1..40)
        ) {
            let (rows, balance) = replay(&entries);

            let mut running = 0i64;
            for (_, arrival, snapshot) in &rows {
                running += entries[*arrival].1;
                prop_assert_eq!(*snapshot, running);
            }
            prop_assert_eq!(balance, running);
        }
    }
}
