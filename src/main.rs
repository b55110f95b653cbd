use anyhow::{Context, Result};
use clap::Parser;
use runledger::cli::{Cli, Command, OutputFormat};
use runledger::config::Settings;
use runledger::fingerprint::Fingerprint;
use runledger::ledger::{FileLedger, InvocationLedger};
use runledger::summary::{self, JsonEntry, LedgerSummary};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn parse_fingerprint(text: &str) -> Result<Fingerprint> {
    Fingerprint::parse(text).with_context(|| {
        format!(
            "Invalid fingerprint {:?}: expected FILE-CLASS-FUNCTION-CALLEE_CLASS-CALLEE_METHOD-LINE",
            text
        )
    })
}

fn run(command: Command, ledger: &FileLedger) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::List { format } => {
            let entries = ledger.entries()?;
            match format {
                OutputFormat::Text => summary::write_entries_text(&entries, &mut out)?,
                OutputFormat::Json => {
                    let json: Vec<JsonEntry> = entries.iter().map(JsonEntry::from).collect();
                    serde_json::to_writer_pretty(&mut out, &json)?;
                    writeln!(out)?;
                }
            }
        }
        Command::Check { fingerprint } => {
            let fingerprint = parse_fingerprint(&fingerprint)?;
            if !ledger.has_recorded(&fingerprint)? {
                writeln!(out, "not recorded")?;
                return Ok(ExitCode::FAILURE);
            }
            writeln!(out, "recorded")?;
        }
        Command::Record { fingerprint } => {
            let fingerprint = parse_fingerprint(&fingerprint)?;
            if ledger.claim(&fingerprint)? {
                writeln!(out, "recorded {}", summary::short_id(&fingerprint))?;
            } else {
                writeln!(out, "already recorded {}", summary::short_id(&fingerprint))?;
            }
        }
        Command::Stats { format } => {
            let stats = LedgerSummary::from_entries(&ledger.entries()?);
            match format {
                OutputFormat::Text => stats.write_text(&mut out)?,
                OutputFormat::Json => {
                    serde_json::to_writer_pretty(&mut out, &stats)?;
                    writeln!(out)?;
                }
            }
        }
        Command::Reset => {
            if ledger.reset()? {
                writeln!(out, "Removed {}", ledger.path().display())?;
            } else {
                writeln!(out, "No ledger at {}", ledger.path().display())?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let settings = Settings::load(args.config.as_deref())?;
    let ledger = match &args.ledger {
        Some(path) => FileLedger::new(path),
        None => FileLedger::new(settings.ledger_path()),
    };
    tracing::debug!("Using ledger {}", ledger.path().display());

    run(args.command, &ledger)
}
