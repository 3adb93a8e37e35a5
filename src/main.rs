//! Running ledger CLI
//!
//! Replays credits, debits and transfers from a CSV file into an in-memory
//! ledger and prints each account's final state.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- entries.csv > accounts.csv
//! cargo run -- --verify entries.csv > accounts.csv
//! cargo run -- --batch-size 2000 --max-concurrent 8 entries.csv > accounts.csv
//! RUST_LOG=debug cargo run -- --json-logs entries.csv
//! ```
//!
//! Logs go to stderr; the account summary goes to stdout.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, unreadable input, or a failed `--verify` audit)

use running_ledger::config::LedgerConfig;
use running_ledger::{cli, replay, telemetry};
use std::process;
use tracing::error;

fn main() {
    let args = cli::parse_args();
    telemetry::init(args.json_logs);

    let ledger_config = LedgerConfig::from_env();
    let replay_config = args.to_replay_config();

    let mut output = std::io::stdout();
    match replay::replay_file(
        &args.input_file,
        ledger_config,
        replay_config,
        args.verify,
        &mut output,
    ) {
        Ok(outcome) if outcome.audit_failures > 0 => {
            error!(failures = outcome.audit_failures, "Ledger audit failed");
            process::exit(1);
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "Replay failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
