//! Core record types for logbook.
//!
//! These are read-only snapshots of what the logbook store holds. The
//! evaluators never mutate them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

record_id!(
    /// Identifier of an aircraft.
    AircraftId
);
record_id!(
    /// Identifier of a pilot.
    PilotId
);
record_id!(
    /// Identifier of a certificate.
    CertificateId
);

/// The role in which a flight was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeFunction {
    /// Pilot-in-command.
    Pic,
    /// Dual instruction time.
    Dual,
}

impl fmt::Display for TimeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pic => write!(f, "PIC"),
            Self::Dual => write!(f, "DUAL"),
        }
    }
}

impl FromStr for TimeFunction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PIC" => Ok(Self::Pic),
            "DUAL" => Ok(Self::Dual),
            other => Err(format!("unknown time function: {other}")),
        }
    }
}

/// An aircraft as seen by the currency evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftRef {
    /// Aircraft identifier.
    pub id: AircraftId,
    /// Registration (tail number).
    pub registration: String,
    /// Whether 90-day currency is tracked for this aircraft.
    #[serde(default)]
    pub currency_required: bool,
}

impl AircraftRef {
    /// Create a new aircraft reference.
    #[must_use]
    pub fn new(id: AircraftId, registration: impl Into<String>, currency_required: bool) -> Self {
        Self {
            id,
            registration: registration.into(),
            currency_required,
        }
    }
}

/// A pilot appearing in the logbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pilot {
    /// Pilot identifier.
    pub id: PilotId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Marks the logbook owner.
    #[serde(default)]
    pub is_self: bool,
}

impl fmt::Display for Pilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// A single logbook entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Identifier assigned by the storage layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The aircraft flown.
    pub aircraft_id: AircraftId,
    /// The pilot the entry is logged for.
    pub pilot_id: PilotId,
    /// Second pilot, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copilot_id: Option<PilotId>,
    /// Off-block / launch time.
    pub departure_time: DateTime<Utc>,
    /// On-block / landing time.
    pub arrival_time: DateTime<Utc>,
    /// Role in which the time is logged.
    pub time_function: TimeFunction,
    /// Number of landings, at least one.
    pub landings: u32,
    /// Free-form remarks.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remarks: String,
}

impl FlightRecord {
    /// Create a flight with a single landing and no copilot.
    #[must_use]
    pub fn new(
        aircraft_id: AircraftId,
        pilot_id: PilotId,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        time_function: TimeFunction,
    ) -> Self {
        Self {
            id: None,
            aircraft_id,
            pilot_id,
            copilot_id: None,
            departure_time,
            arrival_time,
            time_function,
            landings: 1,
            remarks: String::new(),
        }
    }

    /// Set the number of landings.
    #[must_use]
    pub fn with_landings(mut self, landings: u32) -> Self {
        self.landings = landings;
        self
    }

    /// Set the copilot.
    #[must_use]
    pub fn with_copilot(mut self, copilot_id: PilotId) -> Self {
        self.copilot_id = Some(copilot_id);
        self
    }

    /// Whether the flight was logged as pilot-in-command.
    #[must_use]
    pub fn is_pic(&self) -> bool {
        self.time_function == TimeFunction::Pic
    }

    /// Block time of the flight.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.arrival_time - self.departure_time
    }

    /// The calendar date of the arrival.
    #[must_use]
    pub fn arrival_date(&self) -> NaiveDate {
        self.arrival_time.date_naive()
    }
}

/// A licence, rating or medical held by the pilot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Certificate identifier.
    pub id: CertificateId,
    /// Human-readable name, e.g. "SPL" or "Class 2 Medical".
    pub name: String,
    /// Certificate number, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Date of issue.
    pub issue_date: NaiveDate,
    /// Last day of validity; open-ended when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
    /// Issuing authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    /// The certificate this one renews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes_id: Option<CertificateId>,
}

impl Certificate {
    /// Create an open-ended certificate that supersedes nothing.
    #[must_use]
    pub fn new(id: CertificateId, name: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            id,
            name: name.into(),
            number: None,
            issue_date,
            valid_until: None,
            authority: None,
            supersedes_id: None,
        }
    }

    /// Set the last day of validity.
    #[must_use]
    pub fn valid_until(mut self, date: NaiveDate) -> Self {
        self.valid_until = Some(date);
        self
    }

    /// Mark this certificate as the renewal of `previous`.
    #[must_use]
    pub fn supersedes(mut self, previous: CertificateId) -> Self {
        self.supersedes_id = Some(previous);
        self
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(number) = &self.number {
            write!(f, " / {number}")?;
        }
        write!(f, " ({})", self.issue_date)
    }
}

/// A consistent read of every record the evaluators consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// All aircraft.
    pub aircraft: Vec<AircraftRef>,
    /// All pilots.
    pub pilots: Vec<Pilot>,
    /// All log entries.
    pub flights: Vec<FlightRecord>,
    /// All certificates.
    pub certificates: Vec<Certificate>,
}

impl Snapshot {
    /// The pilot marked as logbook owner, if exactly one is marked.
    #[must_use]
    pub fn self_pilot(&self) -> Option<&Pilot> {
        let mut owners = self.pilots.iter().filter(|p| p.is_self);
        match (owners.next(), owners.next()) {
            (Some(owner), None) => Some(owner),
            _ => None,
        }
    }

    /// Look up an aircraft by id.
    #[must_use]
    pub fn aircraft(&self, id: AircraftId) -> Option<&AircraftRef> {
        self.aircraft.iter().find(|a| a.id == id)
    }

    /// Flights of one pilot/aircraft pair, oldest arrival first.
    #[must_use]
    pub fn flights_for(&self, pilot: PilotId, aircraft: AircraftId) -> Vec<&FlightRecord> {
        let mut flights: Vec<_> = self
            .flights
            .iter()
            .filter(|f| f.pilot_id == pilot && f.aircraft_id == aircraft)
            .collect();
        flights.sort_by_key(|f| f.arrival_time);
        flights
    }

    /// Parse a snapshot from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::error::Error::Json) if the text is not a valid snapshot.
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::error::Error::Io) if the file cannot be read and [`Error::Json`](crate::error::Error::Json)
    /// if its content is not a valid snapshot.
    pub fn load(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
