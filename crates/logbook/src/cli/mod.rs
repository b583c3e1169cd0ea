//! Command-line interface for logbook.
//!
//! This module provides the CLI structure for the `logbook` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CertificatesCommand, ConfigCommand, CurrencyCommand, ImportCommand, NoticesCommand,
    StatusCommand,
};

use crate::logging::Verbosity;

/// logbook - Currency and certificate checks for your pilot logbook
///
/// Evaluates 90-day currency per aircraft and certificate validity,
/// including renewal chains and upcoming expiries.
#[derive(Debug, Parser)]
#[command(name = "logbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import records from a JSON snapshot
    Import(ImportCommand),

    /// Show database statistics
    Status(StatusCommand),

    /// Show 90-day currency per aircraft
    Currency(CurrencyCommand),

    /// Show certificate validity
    Certificates(CertificatesCommand),

    /// Show certificate expiry warnings and errors
    Notices(NoticesCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
