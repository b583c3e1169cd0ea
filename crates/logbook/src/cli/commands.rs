//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};

use crate::notice::ExpiryHorizon;

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file with `aircraft`, `pilots`, `flights` and `certificates`
    pub file: PathBuf,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Currency command arguments.
#[derive(Debug, Args)]
pub struct CurrencyCommand {
    /// Evaluate at this instant instead of now (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub at: Option<DateTime<Utc>>,

    /// Pilot to evaluate; defaults to the pilot marked as logbook owner
    #[arg(short, long, value_name = "ID")]
    pub pilot: Option<i64>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Certificates command arguments.
#[derive(Debug, Args)]
pub struct CertificatesCommand {
    /// Evaluate validity on this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Show the renewal lineage of one certificate, newest first
    #[arg(long, value_name = "ID")]
    pub history: Option<i64>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Notices command arguments.
#[derive(Debug, Args)]
pub struct NoticesCommand {
    /// Evaluate expiry on this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// Warning horizon, e.g. "30 days" or "3 months"; overrides the configuration
    #[arg(long, value_name = "HORIZON")]
    pub horizon: Option<ExpiryHorizon>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
