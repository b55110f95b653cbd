//! CLI argument parsing for runledger

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `list` and `stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "runledger")]
#[command(version)]
#[command(about = "Inspect and maintain the run-once invocation ledger", long_about = None)]
pub struct Cli {
    /// Config file (default: ./runledger.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Ledger file, overriding config and environment
    #[arg(short, long, value_name = "FILE", global = true)]
    pub ledger: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print every recorded fingerprint
    List {
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Exit 0 if the fingerprint is recorded, 1 otherwise
    Check {
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
    },
    /// Record a fingerprint (no-op if already present)
    Record {
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
    },
    /// Entry counts per callee
    Stats {
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Delete the ledger file
    Reset,
}
