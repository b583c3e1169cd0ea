//! `logbook` - Currency and certificate validity engine for a pilot logbook
//!
//! This library answers two questions about a logbook: is the pilot current
//! on each aircraft (three PIC landings in the last 90 days), and which
//! certificates are in force once renewals are taken into account. It also
//! produces the expiry notices shown ahead of a certificate running out.
//!
//! The evaluators in [`currency`], [`certificate`] and [`notice`] are pure
//! functions over a [`Snapshot`] and an explicit clock value. [`storage`]
//! persists records in `SQLite` and hands out snapshots.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod certificate;
pub mod cli;
pub mod config;
pub mod currency;
pub mod error;
pub mod logging;
pub mod model;
pub mod notice;
pub mod storage;

pub use certificate::{CertificateIndex, CertificateStatus, ResolvedCertificate};
pub use config::Config;
pub use currency::{evaluate, evaluate_aircraft, evaluate_fleet, AircraftCurrency, CurrencyStatus};
pub use error::{Error, IntegrityError, Result};
pub use logging::init_logging;
pub use model::{
    AircraftId, AircraftRef, Certificate, CertificateId, FlightRecord, Pilot, PilotId, Snapshot,
    TimeFunction,
};
pub use notice::{notify, ExpiryHorizon, Notice, NoticeReport, Severity};
pub use storage::{Storage, StorageStats};
