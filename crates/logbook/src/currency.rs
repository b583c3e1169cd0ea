//! 90-day currency evaluation.
//!
//! A pilot is current on an aircraft when they logged at least
//! [`REQUIRED_LANDINGS`] landings as pilot-in-command within the trailing
//! [`WINDOW_DAYS`] days. Both bounds of the window are inclusive.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{AircraftId, AircraftRef, FlightRecord, PilotId};

/// Length of the trailing experience window in days.
pub const WINDOW_DAYS: i64 = 90;

/// Landings as pilot-in-command needed within the window.
pub const REQUIRED_LANDINGS: u32 = 3;

/// Outcome of a currency evaluation for one pilot/aircraft pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyStatus {
    /// Whether the pair is current.
    pub current: bool,
    /// Landings as pilot-in-command within the window.
    pub landings_in_window: u32,
    /// Landings still missing to become current. Zero when current.
    pub landings_needed: u32,
    /// Arrival date of the most recent qualifying flight.
    pub last_pic_landing_date: Option<NaiveDate>,
    /// Instant at which currency lapses unless more flights are logged.
    pub current_until: Option<DateTime<Utc>>,
    /// First day of the window.
    pub window_start: NaiveDate,
    /// Last day of the window.
    pub window_end: NaiveDate,
}

/// Currency of one aircraft in a fleet evaluation.
#[derive(Debug)]
pub struct AircraftCurrency {
    /// The aircraft evaluated.
    pub aircraft_id: AircraftId,
    /// Its registration.
    pub registration: String,
    /// The evaluation result; failures only affect this aircraft.
    pub status: Result<CurrencyStatus>,
}

fn window() -> Duration {
    Duration::days(WINDOW_DAYS)
}

/// Evaluate currency from the flights of a single pilot/aircraft pair.
///
/// Input order does not matter. Dual flights and flights arriving outside
/// `[now - 90 days, now]` are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidInvocation`] if the flights span more than one
/// pilot/aircraft pair or if `now` is too early to hold a full window.
pub fn evaluate<'a, I>(flights: I, now: DateTime<Utc>) -> Result<CurrencyStatus>
where
    I: IntoIterator<Item = &'a FlightRecord>,
{
    let window_start = now.checked_sub_signed(window()).ok_or_else(|| {
        Error::invalid_invocation(format!(
            "evaluation instant {now} is too early for a {WINDOW_DAYS}-day window"
        ))
    })?;

    let mut pair: Option<(PilotId, AircraftId)> = None;
    let mut qualifying: Vec<&FlightRecord> = Vec::new();

    for flight in flights {
        let key = (flight.pilot_id, flight.aircraft_id);
        match pair {
            None => pair = Some(key),
            Some(expected) if expected != key => {
                return Err(Error::invalid_invocation(format!(
                    "flights span several pilot/aircraft pairs: pilot {} on aircraft {} and pilot {} on aircraft {}",
                    expected.0, expected.1, key.0, key.1
                )));
            }
            Some(_) => {}
        }

        if flight.is_pic() && flight.arrival_time >= window_start && flight.arrival_time <= now {
            qualifying.push(flight);
        }
    }

    // Newest first; ties keep input order.
    qualifying.sort_by(|a, b| b.arrival_time.cmp(&a.arrival_time));

    let landings_in_window = qualifying
        .iter()
        .fold(0u32, |total, flight| total.saturating_add(flight.landings));
    let current = landings_in_window >= REQUIRED_LANDINGS;

    let current_until = if current {
        let mut running = 0u32;
        qualifying
            .iter()
            .find(|flight| {
                running = running.saturating_add(flight.landings);
                running >= REQUIRED_LANDINGS
            })
            .and_then(|flight| flight.arrival_time.checked_add_signed(window()))
    } else {
        None
    };

    let status = CurrencyStatus {
        current,
        landings_in_window,
        landings_needed: REQUIRED_LANDINGS.saturating_sub(landings_in_window),
        last_pic_landing_date: qualifying.first().map(|flight| flight.arrival_date()),
        current_until,
        window_start: window_start.date_naive(),
        window_end: now.date_naive(),
    };

    if let Some((pilot, aircraft)) = pair {
        debug!(
            %pilot,
            %aircraft,
            landings = status.landings_in_window,
            current = status.current,
            "Evaluated currency"
        );
    }

    Ok(status)
}

/// Evaluate currency for a specific aircraft.
///
/// # Errors
///
/// Returns [`Error::CurrencyNotApplicable`] if the aircraft does not track
/// currency, and [`Error::InvalidInvocation`] if any flight belongs to
/// another aircraft or [`evaluate`] rejects the input.
pub fn evaluate_aircraft(
    aircraft: &AircraftRef,
    flights: &[FlightRecord],
    now: DateTime<Utc>,
) -> Result<CurrencyStatus> {
    if !aircraft.currency_required {
        return Err(Error::CurrencyNotApplicable {
            aircraft: aircraft.id,
        });
    }

    if let Some(other) = flights.iter().find(|f| f.aircraft_id != aircraft.id) {
        return Err(Error::invalid_invocation(format!(
            "flight on aircraft {} passed for aircraft {}",
            other.aircraft_id, aircraft.id
        )));
    }

    evaluate(flights, now)
}

/// Evaluate a pilot's currency on every aircraft that tracks it.
///
/// Aircraft without currency tracking are skipped. Each aircraft is
/// evaluated independently from the pilot's flights on it, so a failure
/// on one never hides the result for another.
#[must_use]
pub fn evaluate_fleet(
    aircraft: &[AircraftRef],
    pilot: PilotId,
    flights: &[FlightRecord],
    now: DateTime<Utc>,
) -> Vec<AircraftCurrency> {
    aircraft
        .iter()
        .filter(|a| a.currency_required)
        .map(|a| {
            let status = evaluate(
                flights
                    .iter()
                    .filter(|f| f.aircraft_id == a.id && f.pilot_id == pilot),
                now,
            );
            if let Err(err) = &status {
                warn!(aircraft = %a.id, %pilot, "Currency evaluation failed: {err}");
            }
            AircraftCurrency {
                aircraft_id: a.id,
                registration: a.registration.clone(),
                status,
            }
        })
        .collect()
}
