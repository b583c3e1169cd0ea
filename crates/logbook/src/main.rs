//! `logbook` - CLI for the logbook currency and certificate engine
//!
//! This binary loads records from the configured database and prints
//! currency, certificate validity and expiry notices.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde_json::json;

use logbook::cli::{
    CertificatesCommand, Cli, Command, ConfigCommand, CurrencyCommand, ImportCommand,
    NoticesCommand,
};
use logbook::{
    evaluate_fleet, init_logging, notify, CertificateId, CertificateIndex, Config, PilotId, Snapshot,
    Storage,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command {
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Currency(cmd) => handle_currency(&config, &cmd),
        Command::Certificates(cmd) => handle_certificates(&config, &cmd),
        Command::Notices(cmd) => handle_notices(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn load_snapshot(config: &Config) -> Result<Snapshot> {
    open_storage(config)?
        .snapshot()
        .context("Failed to read records from database")
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> Result<()> {
    let snapshot = Snapshot::load(&cmd.file)
        .with_context(|| format!("Failed to load {}", cmd.file.display()))?;

    let mut storage = open_storage(config)?;
    let stats = storage
        .import(&snapshot)
        .with_context(|| format!("Failed to import {}", cmd.file.display()))?;

    println!(
        "Imported {} aircraft, {} pilots, {} flights, {} certificates.",
        snapshot.aircraft.len(),
        snapshot.pilots.len(),
        snapshot.flights.len(),
        snapshot.certificates.len()
    );
    println!(
        "Database now holds {} flights and {} certificates.",
        stats.flights, stats.certificates
    );
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats().context("Failed to read database statistics")?;

    if json {
        let status = json!({
            "database_path": storage.path(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("logbook status");
        println!("--------------");
        println!("Database:      {}", storage.path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Aircraft:      {}", stats.aircraft);
        println!("Pilots:        {}", stats.pilots);
        println!("Flights:       {}", stats.flights);
        println!("Certificates:  {}", stats.certificates);
    }
    Ok(())
}

fn handle_currency(config: &Config, cmd: &CurrencyCommand) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let now = cmd.at.unwrap_or_else(Utc::now);

    let pilot = match cmd.pilot {
        Some(id) => snapshot
            .pilots
            .iter()
            .find(|p| p.id == PilotId(id))
            .with_context(|| format!("Unknown pilot {id}"))?,
        None => snapshot
            .self_pilot()
            .context("No single pilot is marked as logbook owner; pass --pilot")?,
    };

    let results = evaluate_fleet(&snapshot.aircraft, pilot.id, &snapshot.flights, now);

    if cmd.json {
        let rows: Vec<_> = results
            .iter()
            .map(|r| match &r.status {
                Ok(status) => json!({
                    "aircraft_id": r.aircraft_id,
                    "registration": r.registration,
                    "status": status,
                }),
                Err(err) => json!({
                    "aircraft_id": r.aircraft_id,
                    "registration": r.registration,
                    "error": err.to_string(),
                }),
            })
            .collect();
        let report = json!({
            "pilot_id": pilot.id,
            "evaluated_at": now,
            "aircraft": rows,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Currency for {pilot} at {}", now.format("%Y-%m-%d %H:%M UTC"));
    if results.is_empty() {
        println!("No aircraft require currency.");
        return Ok(());
    }
    println!();
    println!(
        "{:<12} {:<12} {:>8}  {:<12}  {}",
        "AIRCRAFT", "STATUS", "LANDINGS", "LAST PIC", "CURRENT UNTIL"
    );
    for result in &results {
        match &result.status {
            Ok(status) => println!(
                "{:<12} {:<12} {:>8}  {:<12}  {}",
                result.registration,
                if status.current { "current" } else { "not current" },
                status.landings_in_window,
                status
                    .last_pic_landing_date
                    .map_or_else(|| "-".to_string(), |d| d.to_string()),
                status
                    .current_until
                    .map_or_else(|| "-".to_string(), |t| t.date_naive().to_string()),
            ),
            Err(err) => println!("{:<12} error: {err}", result.registration),
        }
    }
    Ok(())
}

fn handle_certificates(config: &Config, cmd: &CertificatesCommand) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let today = today_or(cmd.today);
    let index = CertificateIndex::build(&snapshot.certificates);

    if let Some(id) = cmd.history {
        let lineage = index
            .history(CertificateId(id))
            .with_context(|| format!("Cannot trace renewals of certificate {id}"))?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&lineage)?);
        } else {
            for (depth, certificate) in lineage.iter().enumerate() {
                let marker = if depth == 0 { "" } else { "renews " };
                println!("{:>5}  {marker}{certificate}", certificate.id);
            }
        }
        return Ok(());
    }

    let resolved = index.resolve_all(today);

    if cmd.json {
        let rows: Vec<_> = resolved
            .iter()
            .map(|r| match &r.status {
                Ok(status) => json!({
                    "certificate": r.certificate,
                    "status": status,
                }),
                Err(err) => json!({
                    "certificate": r.certificate,
                    "error": err.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if resolved.is_empty() {
        println!("No certificates recorded.");
        return Ok(());
    }
    println!("Certificates on {today}");
    println!();
    for r in &resolved {
        let state = match &r.status {
            Ok(status) if status.valid => match status.days_until_expiry {
                Some(days) => format!("valid, {days} days left"),
                None => "valid, no expiry".to_string(),
            },
            Ok(status) => match status.superseded_by_active_chain_head {
                Some(head) => format!("superseded by {head}"),
                None => "expired".to_string(),
            },
            Err(err) => format!("error: {err}"),
        };
        println!("{:>5}  {:<40}  {state}", r.certificate.id, r.certificate.to_string());
    }
    Ok(())
}

fn handle_notices(config: &Config, cmd: &NoticesCommand) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let today = today_or(cmd.today);
    let horizon = cmd.horizon.unwrap_or_else(|| config.horizon());
    if horizon.is_zero() {
        bail!("Horizon must be greater than 0");
    }

    let index = CertificateIndex::build(&snapshot.certificates);
    let report = notify(&index, today, horizon);

    if cmd.json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|f| json!({ "certificate_id": f.certificate_id, "error": f.error.to_string() }))
            .collect();
        let out = json!({
            "today": today,
            "horizon": horizon.to_string(),
            "notices": report.notices,
            "failures": failures,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if report.notices.is_empty() && report.failures.is_empty() {
        println!("No certificates expire within {horizon}.");
        return Ok(());
    }
    for notice in &report.notices {
        if notice.is_expired() {
            println!(
                "[{}] {} expired on {} ({} days ago)",
                notice.severity,
                notice.subject,
                notice.valid_until,
                -notice.days_until_expiry
            );
        } else {
            println!(
                "[{}] {} expires on {} (in {} days)",
                notice.severity, notice.subject, notice.valid_until, notice.days_until_expiry
            );
        }
    }
    for failure in &report.failures {
        println!(
            "[error] certificate {} could not be checked: {}",
            failure.certificate_id, failure.error
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Notices]");
                println!("  Horizon:            {}", config.horizon());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("Configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
