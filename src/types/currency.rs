//! ISO 4217 currency codes
//!
//! The ledger never converts between currencies; a code is only validated,
//! compared against the owning account, and used by the CSV front end to
//! turn major-unit amounts into minor units.

use super::error::{LedgerError, LedgerResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three-letter uppercase ISO 4217 code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

/// Codes whose minor unit is the major unit itself
const ZERO_DECIMAL: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Codes divided into thousandths
const THREE_DECIMAL: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

impl CurrencyCode {
    /// Parse and validate a currency code
    ///
    /// Only exactly three ASCII uppercase letters are accepted; no case folding
    /// or trimming is applied.
    pub fn parse(code: &str) -> LedgerResult<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(LedgerError::invalid_currency(code));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Number of decimal places between the major and the minor unit
    pub fn minor_unit_exponent(&self) -> u32 {
        let code = self.as_str();
        if ZERO_DECIMAL.contains(&code) {
            0
        } else if THREE_DECIMAL.contains(&code) {
            3
        } else {
            2
        }
    }

    /// Convert a major-unit decimal amount into integer minor units
    ///
    /// Fails when the amount carries more fractional digits than the currency's
    /// minor unit can represent, or does not fit in an `i64`. No rounding is
    /// ever applied.
    pub fn to_minor_units(&self, amount: Decimal) -> LedgerResult<i64> {
        let scaled = amount
            .checked_mul(Decimal::from(10i64.pow(self.minor_unit_exponent())))
            .ok_or_else(|| LedgerError::invalid_amount(amount, "out of range"))?;
        if scaled.fract() != Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                amount,
                &format!("too many decimal places for {}", self),
            ));
        }
        scaled
            .trunc()
            .to_i64()
            .ok_or_else(|| LedgerError::invalid_amount(amount, "out of range"))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("DKK")]
    #[case("USD")]
    #[case("JPY")]
    fn test_parse_valid(#[case] code: &str) {
        let parsed = CurrencyCode::parse(code).unwrap();
        assert_eq!(parsed.as_str(), code);
        assert_eq!(parsed.to_string(), code);
    }

    #[rstest]
    #[case::lowercase("dkk")]
    #[case::too_short("DK")]
    #[case::too_long("DKKK")]
    #[case::digits("D1K")]
    #[case::padded(" DKK")]
    #[case::empty("")]
    #[case::non_ascii("ÆØÅ")]
    fn test_parse_invalid(#[case] code: &str) {
        assert_eq!(
            CurrencyCode::parse(code),
            Err(LedgerError::invalid_currency(code))
        );
    }

    #[rstest]
    #[case("DKK", 2)]
    #[case("JPY", 0)]
    #[case("KWD", 3)]
    fn test_minor_unit_exponent(#[case] code: &str, #[case] expected: u32) {
        assert_eq!(
            CurrencyCode::parse(code).unwrap().minor_unit_exponent(),
            expected
        );
    }

    #[rstest]
    #[case("DKK", Decimal::new(1250, 2), 1250)]
    #[case("DKK", Decimal::new(3, 0), 300)]
    #[case("DKK", Decimal::new(5, 1), 50)]
    #[case("JPY", Decimal::new(1500, 0), 1500)]
    #[case("KWD", Decimal::new(1234, 3), 1234)]
    fn test_to_minor_units(#[case] code: &str, #[case] amount: Decimal, #[case] expected: i64) {
        let currency = CurrencyCode::parse(code).unwrap();
        assert_eq!(currency.to_minor_units(amount), Ok(expected));
    }

    #[test]
    fn test_to_minor_units_rejects_sub_minor_precision() {
        let dkk = CurrencyCode::parse("DKK").unwrap();
        let err = dkk.to_minor_units(Decimal::new(12345, 3)).unwrap_err();
        assert!(err.to_string().contains("too many decimal places for DKK"));

        let jpy = CurrencyCode::parse("JPY").unwrap();
        assert!(jpy.to_minor_units(Decimal::new(15, 1)).is_err());
    }

    #[test]
    fn test_to_minor_units_rejects_out_of_range() {
        let dkk = CurrencyCode::parse("DKK").unwrap();
        assert!(dkk.to_minor_units(Decimal::MAX).is_err());
    }
}
