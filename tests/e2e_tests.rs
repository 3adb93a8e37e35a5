//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! test fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays every row through the ledger
//! 3. Generates output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path scenarios
//! - Back-dated entries
//! - Transfers, including accounts opened by a transfer
//! - Currency mismatches and currency-specific minor units
//! - Malformed and rejected rows
//!
//! Each fixture is replayed with several batch sizes and concurrency levels;
//! the output must not depend on them.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use running_ledger::replay::replay_file;
    use running_ledger::{LedgerConfig, ReplayConfig};
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Replay tests/fixtures/{fixture_name}/input.csv and compare with expected.csv
    fn run_test_fixture(fixture_name: &str, batch_size: usize, max_concurrent: usize) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );
        assert!(
            Path::new(&expected_path).exists(),
            "Expected file not found: {}",
            expected_path
        );

        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        let outcome = replay_file(
            Path::new(&input_path),
            LedgerConfig::default(),
            ReplayConfig::new(batch_size, max_concurrent),
            true,
            &mut temp_output,
        )
        .unwrap_or_else(|e| panic!("Failed to replay entries: {}", e));
        assert_eq!(outcome.audit_failures, 0, "audit failed for {}", fixture_name);

        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (batch {}, concurrency {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, batch_size, max_concurrent, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("out_of_order")]
    #[case("transfers")]
    #[case("currency_mismatch")]
    #[case("minor_unit_exponents")]
    #[case("malformed_data")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values((1, 1), (2, 4), (1000, 8))] sizing: (usize, usize),
    ) {
        run_test_fixture(fixture, sizing.0, sizing.1);
    }

    #[test]
    fn test_missing_input_file_is_an_error() {
        let mut output = Vec::new();
        let result = replay_file(
            Path::new("tests/fixtures/does_not_exist.csv"),
            LedgerConfig::default(),
            ReplayConfig::default(),
            false,
            &mut output,
        );
        assert!(result.is_err());
        assert!(output.is_empty());
    }

    #[test]
    fn test_report_counts_rows() {
        let mut output = Vec::new();
        let outcome = replay_file(
            Path::new("tests/fixtures/malformed_data/input.csv"),
            LedgerConfig::default(),
            ReplayConfig::new(3, 2),
            false,
            &mut output,
        )
        .unwrap();
        assert_eq!(outcome.report.applied, 2);
        assert_eq!(outcome.report.rejected, 7);
        assert_eq!(outcome.report.accounts.len(), 1);
    }
}
