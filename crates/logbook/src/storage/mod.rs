//! Storage layer for logbook.
//!
//! This module provides `SQLite`-based persistent storage for aircraft,
//! pilots, log entries and certificates, and hands out consistent
//! [`Snapshot`]s for the evaluators.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    AircraftId, AircraftRef, Certificate, CertificateId, FlightRecord, Pilot, PilotId, Snapshot,
    TimeFunction,
};

const FLIGHT_COLUMNS: &str = "id, aircraft_id, pilot_id, copilot_id, departure_time, \
     arrival_time, time_function, landings, remarks";

const CERTIFICATE_COLUMNS: &str =
    "id, name, number, issue_date, valid_until, authority, supersedes_id";

/// Storage engine for logbook records.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets snapshot reads proceed while an import is running
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        prepare_connection(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        prepare_connection(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert an aircraft under its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or registration is already taken.
    pub fn insert_aircraft(&self, aircraft: &AircraftRef) -> Result<AircraftId> {
        insert_aircraft(&self.conn, aircraft)
    }

    /// Insert a pilot under its own id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or the name pair is already taken.
    pub fn insert_pilot(&self, pilot: &Pilot) -> Result<PilotId> {
        insert_pilot(&self.conn, pilot)
    }

    /// Insert a log entry and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] if the entry breaks a log entry
    /// rule, or a database error.
    pub fn insert_flight(&self, flight: &FlightRecord) -> Result<i64> {
        insert_flight(&self.conn, flight)
    }

    /// Insert a certificate under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] for self-supersession or a validity
    /// date not after the issue date, and a database error if another
    /// certificate already supersedes the same target.
    pub fn insert_certificate(&self, certificate: &Certificate) -> Result<CertificateId> {
        insert_certificate(&self.conn, certificate)
    }

    /// Import a whole snapshot atomically.
    ///
    /// Either every record is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns the first insert error; the transaction is rolled back.
    pub fn import(&mut self, snapshot: &Snapshot) -> Result<StorageStats> {
        let tx = self.conn.transaction()?;

        for aircraft in &snapshot.aircraft {
            insert_aircraft(&tx, aircraft)?;
        }
        for pilot in &snapshot.pilots {
            insert_pilot(&tx, pilot)?;
        }
        for flight in &snapshot.flights {
            insert_flight(&tx, flight)?;
        }
        for certificate in &snapshot.certificates {
            insert_certificate(&tx, certificate)?;
        }

        tx.commit()?;
        info!(
            aircraft = snapshot.aircraft.len(),
            pilots = snapshot.pilots.len(),
            flights = snapshot.flights.len(),
            certificates = snapshot.certificates.len(),
            "Imported snapshot"
        );
        self.stats()
    }

    /// Read every record inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails or a stored value cannot be parsed.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let tx = self.conn.unchecked_transaction()?;

        let aircraft = tx
            .prepare("SELECT id, registration, currency_required FROM aircraft ORDER BY registration")?
            .query_map([], |row| {
                Ok(AircraftRef {
                    id: AircraftId(row.get(0)?),
                    registration: row.get(1)?,
                    currency_required: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let pilots = tx
            .prepare("SELECT id, first_name, last_name, is_self FROM pilots ORDER BY last_name")?
            .query_map([], |row| {
                Ok(Pilot {
                    id: PilotId(row.get(0)?),
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    is_self: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let flights = tx
            .prepare(&format!(
                "SELECT {FLIGHT_COLUMNS} FROM log_entries ORDER BY arrival_time"
            ))?
            .query_map([], row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let certificates = tx
            .prepare(&format!(
                "SELECT {CERTIFICATE_COLUMNS} FROM certificates ORDER BY id"
            ))?
            .query_map([], row_to_certificate)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tx.commit()?;

        debug!(
            flights = flights.len(),
            certificates = certificates.len(),
            "Read snapshot"
        );
        Ok(Snapshot {
            aircraft,
            pilots,
            flights,
            certificates,
        })
    }

    /// Flight history of one pilot/aircraft pair, oldest arrival first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flights_for(&self, pilot: PilotId, aircraft: AircraftId) -> Result<Vec<FlightRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM log_entries \
             WHERE pilot_id = ?1 AND aircraft_id = ?2 ORDER BY arrival_time"
        ))?;

        let flights = stmt
            .query_map(params![pilot.0, aircraft.0], row_to_flight)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(flights)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let count: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(count)
        };

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            aircraft: count("aircraft")?,
            pilots: count("pilots")?,
            flights: count("log_entries")?,
            certificates: count("certificates")?,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of aircraft.
    pub aircraft: i64,
    /// Number of pilots.
    pub pilots: i64,
    /// Number of log entries.
    pub flights: i64,
    /// Number of certificates.
    pub certificates: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// References are declared for documentation only. Records may arrive in any
/// order, and broken supersession links must be storable so the certificate
/// resolver can report them.
fn prepare_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=OFF;")?;
    migrations::initialize_schema(conn)
}

fn insert_aircraft(conn: &Connection, aircraft: &AircraftRef) -> Result<AircraftId> {
    conn.execute(
        "INSERT INTO aircraft (id, registration, currency_required) VALUES (?1, ?2, ?3)",
        params![aircraft.id.0, aircraft.registration, aircraft.currency_required],
    )?;
    debug!("Inserted aircraft {}", aircraft.registration);
    Ok(aircraft.id)
}

fn insert_pilot(conn: &Connection, pilot: &Pilot) -> Result<PilotId> {
    conn.execute(
        "INSERT INTO pilots (id, first_name, last_name, is_self) VALUES (?1, ?2, ?3, ?4)",
        params![pilot.id.0, pilot.first_name, pilot.last_name, pilot.is_self],
    )?;
    Ok(pilot.id)
}

fn insert_flight(conn: &Connection, flight: &FlightRecord) -> Result<i64> {
    validate_flight(flight)?;

    conn.execute(
        r"
        INSERT INTO log_entries (aircraft_id, pilot_id, copilot_id, departure_time,
                                 arrival_time, time_function, landings, remarks)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            flight.aircraft_id.0,
            flight.pilot_id.0,
            flight.copilot_id.map(|p| p.0),
            format_timestamp(flight.departure_time),
            format_timestamp(flight.arrival_time),
            flight.time_function.to_string(),
            flight.landings,
            flight.remarks,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!("Inserted log entry with id {}", id);
    Ok(id)
}

fn insert_certificate(conn: &Connection, certificate: &Certificate) -> Result<CertificateId> {
    validate_certificate(certificate)?;

    conn.execute(
        &format!(
            "INSERT INTO certificates ({CERTIFICATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            certificate.id.0,
            certificate.name,
            certificate.number,
            certificate.issue_date.to_string(),
            certificate.valid_until.map(|d| d.to_string()),
            certificate.authority,
            certificate.supersedes_id.map(|c| c.0),
        ],
    )?;
    debug!("Inserted certificate {}", certificate.id);
    Ok(certificate.id)
}

fn validate_flight(flight: &FlightRecord) -> Result<()> {
    if flight.arrival_time <= flight.departure_time {
        return Err(Error::invalid_record(format!(
            "arrival {} is not after departure {}",
            flight.arrival_time, flight.departure_time
        )));
    }
    if flight.landings == 0 {
        return Err(Error::invalid_record("a flight needs at least one landing"));
    }
    if flight.copilot_id == Some(flight.pilot_id) {
        return Err(Error::invalid_record(format!(
            "pilot {} cannot be their own copilot",
            flight.pilot_id
        )));
    }
    Ok(())
}

fn validate_certificate(certificate: &Certificate) -> Result<()> {
    if certificate.supersedes_id == Some(certificate.id) {
        return Err(Error::invalid_record(format!(
            "certificate {} cannot supersede itself",
            certificate.id
        )));
    }
    if let Some(until) = certificate.valid_until {
        if until <= certificate.issue_date {
            return Err(Error::invalid_record(format!(
                "certificate {} is valid until {until}, not after its issue date {}",
                certificate.id, certificate.issue_date
            )));
        }
    }
    Ok(())
}

/// Fixed-width UTC representation, so text order equals time order.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    index: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

fn parse_timestamp(row: &rusqlite::Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn parse_date(row: &rusqlite::Row, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(index)?;
    text.map(|t| t.parse::<NaiveDate>().map_err(|e| conversion_error(index, e)))
        .transpose()
}

fn row_to_flight(row: &rusqlite::Row) -> rusqlite::Result<FlightRecord> {
    let time_function: String = row.get(6)?;
    let time_function = time_function
        .parse::<TimeFunction>()
        .map_err(|e| conversion_error(6, e))?;

    Ok(FlightRecord {
        id: Some(row.get(0)?),
        aircraft_id: AircraftId(row.get(1)?),
        pilot_id: PilotId(row.get(2)?),
        copilot_id: row.get::<_, Option<i64>>(3)?.map(PilotId),
        departure_time: parse_timestamp(row, 4)?,
        arrival_time: parse_timestamp(row, 5)?,
        time_function,
        landings: row.get(7)?,
        remarks: row.get(8)?,
    })
}

fn row_to_certificate(row: &rusqlite::Row) -> rusqlite::Result<Certificate> {
    let issue_date = parse_date(row, 3)?.ok_or(rusqlite::Error::InvalidColumnType(
        3,
        "issue_date".to_string(),
        Type::Null,
    ))?;

    Ok(Certificate {
        id: CertificateId(row.get(0)?),
        name: row.get(1)?,
        number: row.get(2)?,
        issue_date,
        valid_until: parse_date(row, 4)?,
        authority: row.get(5)?,
        supersedes_id: row.get::<_, Option<i64>>(6)?.map(CertificateId),
    })
}
