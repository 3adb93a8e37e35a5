//! CSV format handling for ledger entries and account output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to [`LedgerCommand`]s
//! - Account summary serialization
//!
//! All functions are pure (no I/O beyond the given writer) for easy testing.

use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::{CurrencyCode, Direction, LedgerError, LedgerResult, NewTransaction};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns:
/// type, account, counterparty, booked_at, amount, currency, description, merchant
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub account: String,
    pub counterparty: Option<String>,
    pub booked_at: String,
    pub amount: String,
    pub currency: String,
    pub description: Option<String>,
    pub merchant: Option<String>,
}

/// One replayable row, with accounts still referenced by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    /// A credit or debit on a single account
    Entry {
        account: String,
        transaction: NewTransaction,
    },
    /// An internal transfer from `from` to `to`
    Transfer {
        from: String,
        to: String,
        currency: CurrencyCode,
        amount_minor: i64,
        booked_at: DateTime<Utc>,
        description: Option<String>,
    },
}

impl LedgerCommand {
    /// Account names this command touches, with the currency they are opened in
    pub fn accounts(&self) -> Vec<(&str, CurrencyCode)> {
        match self {
            LedgerCommand::Entry {
                account,
                transaction,
            } => vec![(account.as_str(), transaction.currency_code)],
            LedgerCommand::Transfer {
                from, to, currency, ..
            } => vec![(from.as_str(), *currency), (to.as_str(), *currency)],
        }
    }
}

/// Convert a CsvRecord to a LedgerCommand
///
/// # Returns
///
/// * `Ok(LedgerCommand)` - Successfully converted record
/// * `Err(LedgerError)` - Unknown type, bad timestamp, amount, or currency,
///   or a transfer without counterparty
pub fn convert_csv_record(record: CsvRecord) -> LedgerResult<LedgerCommand> {
    let currency = CurrencyCode::parse(record.currency.trim())?;
    let booked_at = parse_booked_at(&record.booked_at)?;
    let amount_minor = parse_amount(&record.amount, currency)?;
    let description = non_empty(record.description);

    let direction = match record.entry_type.trim().to_lowercase().as_str() {
        "credit" => Direction::Credit,
        "debit" => Direction::Debit,
        "transfer" => {
            let to = non_empty(record.counterparty).ok_or_else(|| {
                LedgerError::invalid_argument(format!(
                    "transfer from '{}' requires a counterparty",
                    record.account
                ))
            })?;
            return Ok(LedgerCommand::Transfer {
                from: record.account,
                to,
                currency,
                amount_minor,
                booked_at,
                description,
            });
        }
        other => {
            return Err(LedgerError::invalid_argument(format!(
                "Invalid entry type: '{}'",
                other
            )))
        }
    };

    let mut transaction = NewTransaction::new(direction, amount_minor, booked_at, currency);
    transaction.description = description;
    transaction.merchant_name = non_empty(record.merchant);

    Ok(LedgerCommand::Entry {
        account: record.account,
        transaction,
    })
}

/// Parse an RFC 3339 timestamp, or a `YYYY-MM-DD[ HH:MM:SS]` one taken as UTC
pub fn parse_booked_at(raw: &str) -> LedgerResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| LedgerError::invalid_timestamp(raw))
}

/// Parse a positive major-unit amount into exact minor units
pub fn parse_amount(raw: &str, currency: CurrencyCode) -> LedgerResult<i64> {
    let raw = raw.trim();
    let amount = Decimal::from_str(raw)
        .map_err(|_| LedgerError::invalid_amount(raw, "not a decimal number"))?;
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(raw, "must be strictly positive"));
    }
    currency.to_minor_units(amount)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Final state of one replayed account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub name: String,
    pub currency: CurrencyCode,
    pub balance_minor: i64,
    pub transactions: usize,
}

/// Write account summaries to CSV format
///
/// Writes columns: account, currency, balance_minor, transactions.
/// Summaries are sorted by account name for deterministic output.
pub fn write_accounts_csv(
    summaries: &[AccountSummary],
    output: &mut dyn Write,
) -> LedgerResult<()> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "currency", "balance_minor", "transactions"])
        .map_err(|e| LedgerError::storage(format!("Failed to write CSV header: {}", e)))?;

    let mut sorted = summaries.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for summary in sorted {
        writer
            .write_record(&[
                summary.name,
                summary.currency.to_string(),
                summary.balance_minor.to_string(),
                summary.transactions.to_string(),
            ])
            .map_err(|e| LedgerError::storage(format!("Failed to write account record: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| LedgerError::storage(format!("Failed to flush output: {}", e)))?;

    Ok(())
}
