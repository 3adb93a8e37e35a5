use crate::config::ReplayConfig;
use clap::Parser;
use std::path::PathBuf;

/// Replay ledger entries and report running balances
#[derive(Parser, Debug)]
#[command(name = "running-ledger")]
#[command(about = "Replay ledger entries and report running balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger entries
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Number of rows per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of rows read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of rows applied concurrently
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of rows applied concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Audit every account after the replay
    #[arg(long, help = "Audit every account after the replay and fail on violations")]
    pub verify: bool,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,
}

impl CliArgs {
    /// Create a ReplayConfig from CLI arguments
    ///
    /// Missing values take the defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_replay_config(&self) -> ReplayConfig {
        if self.batch_size.is_some() || self.max_concurrent.is_some() {
            let default = ReplayConfig::default();
            ReplayConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent.unwrap_or(default.max_concurrent),
            )
        } else {
            ReplayConfig::default()
        }
    }
}
