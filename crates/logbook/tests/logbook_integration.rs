//! Integration tests for logbook.
//!
//! Records go through the `SQLite` store and come back as a snapshot before
//! they reach the evaluators, the way the CLI uses them.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use logbook::{
    evaluate, evaluate_fleet, notify, AircraftId, AircraftRef, Certificate, CertificateId,
    CertificateIndex, Error, ExpiryHorizon, FlightRecord, IntegrityError, Pilot, PilotId,
    Severity, Snapshot, Storage, TimeFunction,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn now() -> DateTime<Utc> {
    at(2024, 6, 1, 12, 0)
}

fn pilot(id: i64, first: &str, last: &str, is_self: bool) -> Pilot {
    Pilot {
        id: PilotId(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
        is_self,
    }
}

fn flight(aircraft: i64, pilot: i64, arrival: DateTime<Utc>, function: TimeFunction) -> FlightRecord {
    FlightRecord::new(
        AircraftId(aircraft),
        PilotId(pilot),
        arrival - Duration::minutes(45),
        arrival,
        function,
    )
}

fn fleet_snapshot() -> Snapshot {
    Snapshot {
        aircraft: vec![
            AircraftRef::new(AircraftId(1), "D-KABC", true),
            AircraftRef::new(AircraftId(2), "D-EFGH", false),
            AircraftRef::new(AircraftId(3), "D-MXYZ", true),
        ],
        pilots: vec![
            pilot(1, "Ada", "Example", true),
            pilot(2, "Bert", "Sample", false),
        ],
        flights: vec![
            flight(1, 1, at(2024, 5, 20, 10, 0), TimeFunction::Pic),
            flight(1, 1, at(2024, 4, 10, 10, 0), TimeFunction::Pic),
            flight(1, 1, at(2024, 5, 25, 10, 0), TimeFunction::Dual).with_landings(3),
            flight(1, 1, at(2024, 2, 1, 10, 0), TimeFunction::Pic).with_landings(5),
            flight(1, 2, at(2024, 5, 28, 10, 0), TimeFunction::Pic)
                .with_landings(3)
                .with_copilot(PilotId(1)),
            flight(2, 1, at(2024, 5, 29, 10, 0), TimeFunction::Pic).with_landings(4),
        ],
        certificates: Vec::new(),
    }
}

fn certificate_snapshot() -> Snapshot {
    Snapshot {
        certificates: vec![
            Certificate::new(CertificateId(1), "SPL", date(2018, 1, 1)).valid_until(date(2022, 1, 1)),
            Certificate::new(CertificateId(2), "SPL", date(2021, 12, 1))
                .valid_until(date(2024, 1, 10))
                .supersedes(CertificateId(1)),
            Certificate::new(CertificateId(3), "SPL", date(2023, 12, 15))
                .valid_until(date(2026, 1, 10))
                .supersedes(CertificateId(2)),
            Certificate::new(CertificateId(4), "Class 2 Medical", date(2022, 2, 1))
                .valid_until(date(2024, 2, 1)),
            Certificate::new(CertificateId(5), "Radio", date(2020, 12, 1))
                .valid_until(date(2023, 12, 1)),
            Certificate::new(CertificateId(6), "Night rating", date(2019, 5, 1)),
            Certificate::new(CertificateId(7), "FI", date(2021, 6, 1)).valid_until(date(2024, 6, 1)),
        ],
        ..Snapshot::default()
    }
}

fn stored(snapshot: &Snapshot) -> Snapshot {
    let mut storage = Storage::open_in_memory().unwrap();
    storage.import(snapshot).unwrap();
    storage.snapshot().unwrap()
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

#[test]
fn fleet_currency_from_storage() {
    let snapshot = stored(&fleet_snapshot());
    let owner = snapshot.self_pilot().unwrap().id;

    let results = evaluate_fleet(&snapshot.aircraft, owner, &snapshot.flights, now());

    // Aircraft without currency tracking are left out.
    let ids: Vec<_> = results.iter().map(|r| r.aircraft_id).collect();
    assert_eq!(ids, vec![AircraftId(1), AircraftId(3)]);

    let kabc = results[0].status.as_ref().unwrap();
    assert!(!kabc.current);
    assert_eq!(kabc.landings_in_window, 2);
    assert_eq!(kabc.landings_needed, 1);
    assert_eq!(kabc.last_pic_landing_date, Some(date(2024, 5, 20)));
    assert_eq!(kabc.current_until, None);
    assert_eq!(kabc.window_start, date(2024, 3, 3));
    assert_eq!(kabc.window_end, date(2024, 6, 1));

    let mxyz = results[1].status.as_ref().unwrap();
    assert!(!mxyz.current);
    assert_eq!(mxyz.landings_in_window, 0);
    assert_eq!(mxyz.landings_needed, 3);
    assert_eq!(mxyz.last_pic_landing_date, None);
}

#[test]
fn third_landing_makes_pilot_current() {
    let mut records = fleet_snapshot();
    records
        .flights
        .push(flight(1, 1, at(2024, 5, 30, 9, 0), TimeFunction::Pic));
    let snapshot = stored(&records);

    let results = evaluate_fleet(&snapshot.aircraft, PilotId(1), &snapshot.flights, now());
    let kabc = results[0].status.as_ref().unwrap();

    assert!(kabc.current);
    assert_eq!(kabc.landings_in_window, 3);
    assert_eq!(kabc.landings_needed, 0);
    assert_eq!(kabc.last_pic_landing_date, Some(date(2024, 5, 30)));
    // The oldest of the three counted landings expires first.
    assert_eq!(kabc.current_until, Some(at(2024, 7, 9, 10, 0)));
}

#[test]
fn window_start_is_inclusive_after_round_trip() {
    let start = now() - Duration::days(90);
    let records = Snapshot {
        aircraft: vec![AircraftRef::new(AircraftId(1), "D-KABC", true)],
        pilots: vec![pilot(1, "Ada", "Example", true)],
        flights: vec![
            flight(1, 1, start, TimeFunction::Pic).with_landings(3),
            flight(1, 1, start - Duration::seconds(1), TimeFunction::Pic).with_landings(3),
        ],
        certificates: Vec::new(),
    };
    let snapshot = stored(&records);

    let flights = snapshot.flights_for(PilotId(1), AircraftId(1));
    assert_eq!(flights.len(), 2);

    let status = evaluate(flights, now()).unwrap();
    assert!(status.current);
    assert_eq!(status.landings_in_window, 3);
    assert_eq!(status.current_until, Some(now()));

    let later = evaluate(snapshot.flights_for(PilotId(1), AircraftId(1)), now() + Duration::seconds(1))
        .unwrap();
    assert!(!later.current);
}

#[test]
fn sub_millisecond_window_start_survives_storage() {
    let start = now() - Duration::days(90) + Duration::microseconds(500);
    let records = Snapshot {
        aircraft: vec![AircraftRef::new(AircraftId(1), "D-KABC", true)],
        pilots: vec![pilot(1, "Ada", "Example", true)],
        flights: vec![flight(1, 1, start, TimeFunction::Pic).with_landings(3)],
        certificates: Vec::new(),
    };
    let at_boundary = now() + Duration::microseconds(500);

    let direct = evaluate(&records.flights, at_boundary).unwrap();
    let snapshot = stored(&records);
    let round_tripped = evaluate(&snapshot.flights, at_boundary).unwrap();

    assert!(direct.current);
    assert_eq!(round_tripped, direct);
    assert_eq!(snapshot.flights[0].arrival_time, start);
}

#[test]
fn storage_lookup_matches_snapshot_filter() {
    let mut storage = Storage::open_in_memory().unwrap();
    storage.import(&fleet_snapshot()).unwrap();

    let from_query = storage.flights_for(PilotId(1), AircraftId(1)).unwrap();
    let snapshot = storage.snapshot().unwrap();
    let from_snapshot: Vec<FlightRecord> = snapshot
        .flights_for(PilotId(1), AircraftId(1))
        .into_iter()
        .cloned()
        .collect();

    assert_eq!(from_query.len(), 4);
    assert_eq!(
        evaluate(&from_query, now()).unwrap(),
        evaluate(&from_snapshot, now()).unwrap()
    );
}

#[test]
fn evaluation_is_repeatable() {
    let snapshot = stored(&fleet_snapshot());
    let first = evaluate_fleet(&snapshot.aircraft, PilotId(1), &snapshot.flights, now());
    let second = evaluate_fleet(&snapshot.aircraft, PilotId(1), &snapshot.flights, now());

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.status.as_ref().unwrap(), b.status.as_ref().unwrap());
    }
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[test]
fn renewal_chain_resolves_to_head() {
    let snapshot = stored(&certificate_snapshot());
    let index = CertificateIndex::build(&snapshot.certificates);
    let today = date(2024, 1, 1);

    for id in [1, 2] {
        let status = index.resolve(CertificateId(id), today).unwrap();
        assert!(!status.valid);
        assert_eq!(status.superseded_by_active_chain_head, Some(CertificateId(3)));
        assert_eq!(status.days_until_expiry, None);
    }

    let head = index.resolve(CertificateId(3), today).unwrap();
    assert!(head.valid);
    assert!(!head.is_superseded());
    assert!(head.days_until_expiry.unwrap() > 0);

    let history: Vec<_> = index
        .history(CertificateId(3))
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(history, vec![CertificateId(3), CertificateId(2), CertificateId(1)]);
}

#[test]
fn expiry_notices_from_storage() {
    let snapshot = stored(&certificate_snapshot());
    let index = CertificateIndex::build(&snapshot.certificates);

    let report = notify(&index, date(2024, 1, 1), ExpiryHorizon::Days(90));
    assert!(report.failures.is_empty());

    let summary: Vec<_> = report
        .notices
        .iter()
        .map(|n| (n.severity, n.certificate_id, n.days_until_expiry))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Severity::Error, CertificateId(5), -31),
            (Severity::Warning, CertificateId(4), 31),
        ]
    );
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.warning_count(), 1);
}

#[test]
fn longer_horizon_picks_up_later_expiry() {
    let snapshot = stored(&certificate_snapshot());
    let index = CertificateIndex::build(&snapshot.certificates);

    let report = notify(&index, date(2024, 1, 1), ExpiryHorizon::Months(6));
    let ids: Vec<_> = report.notices.iter().map(|n| n.certificate_id).collect();
    assert_eq!(ids, vec![CertificateId(5), CertificateId(4), CertificateId(7)]);
}

#[test]
fn stored_cycle_is_isolated() {
    let records = Snapshot {
        certificates: vec![
            Certificate::new(CertificateId(10), "LAPL", date(2020, 1, 1))
                .valid_until(date(2024, 1, 15))
                .supersedes(CertificateId(11)),
            Certificate::new(CertificateId(11), "LAPL", date(2021, 1, 1))
                .valid_until(date(2024, 1, 20))
                .supersedes(CertificateId(10)),
            Certificate::new(CertificateId(12), "Medical", date(2022, 1, 1))
                .valid_until(date(2024, 1, 5)),
        ],
        ..Snapshot::default()
    };
    let snapshot = stored(&records);
    let index = CertificateIndex::build(&snapshot.certificates);
    let today = date(2024, 1, 1);

    assert!(matches!(
        index.resolve(CertificateId(10), today),
        Err(IntegrityError::SupersessionCycle { .. })
    ));

    let resolved = index.resolve_all(today);
    assert_eq!(resolved.len(), 3);
    assert!(resolved[0].status.is_err());
    assert!(resolved[1].status.is_err());
    assert!(resolved[2].status.as_ref().unwrap().valid);

    let report = notify(&index, today, ExpiryHorizon::default());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].certificate_id, CertificateId(12));
    assert_eq!(report.notices[0].days_until_expiry, 4);
}

// ---------------------------------------------------------------------------
// Storage constraints
// ---------------------------------------------------------------------------

#[test]
fn storage_rejects_second_superseder() {
    let storage = Storage::open_in_memory().unwrap();
    storage
        .insert_certificate(&Certificate::new(CertificateId(1), "SPL", date(2020, 1, 1)))
        .unwrap();
    storage
        .insert_certificate(
            &Certificate::new(CertificateId(2), "SPL", date(2021, 1, 1)).supersedes(CertificateId(1)),
        )
        .unwrap();

    let err = storage
        .insert_certificate(
            &Certificate::new(CertificateId(3), "SPL", date(2022, 1, 1)).supersedes(CertificateId(1)),
        )
        .unwrap_err();
    assert!(matches!(err, Error::DatabaseQuery(_)));

    let snapshot = storage.snapshot().unwrap();
    let index = CertificateIndex::build(&snapshot.certificates);
    assert_eq!(
        index.superseded_by(CertificateId(1)).unwrap().map(|c| c.id),
        Some(CertificateId(2))
    );
}

#[test]
fn renewal_imported_before_original_resolves() {
    let records = Snapshot {
        certificates: vec![
            Certificate::new(CertificateId(2), "SPL", date(2023, 1, 1))
                .valid_until(date(2025, 1, 1))
                .supersedes(CertificateId(1)),
            Certificate::new(CertificateId(1), "SPL", date(2020, 1, 1)).valid_until(date(2023, 1, 1)),
        ],
        ..Snapshot::default()
    };
    let snapshot = stored(&records);
    let index = CertificateIndex::build(&snapshot.certificates);

    let status = index.resolve(CertificateId(1), date(2024, 1, 1)).unwrap();
    assert_eq!(status.superseded_by_active_chain_head, Some(CertificateId(2)));
    assert!(index.resolve(CertificateId(2), date(2024, 1, 1)).unwrap().valid);
}

#[test]
fn stored_dangling_link_only_breaks_history() {
    let records = Snapshot {
        certificates: vec![Certificate::new(CertificateId(5), "LAPL", date(2022, 1, 1))
            .valid_until(date(2026, 1, 1))
            .supersedes(CertificateId(99))],
        ..Snapshot::default()
    };
    let snapshot = stored(&records);
    let index = CertificateIndex::build(&snapshot.certificates);

    assert!(index.resolve(CertificateId(5), date(2024, 1, 1)).unwrap().valid);
    assert_eq!(
        index.history(CertificateId(5)).unwrap_err(),
        IntegrityError::DanglingSupersedes {
            certificate: CertificateId(5),
            target: CertificateId(99),
        }
    );
}

#[test]
fn failed_import_leaves_store_untouched() {
    let mut records = fleet_snapshot();
    records
        .flights
        .push(flight(1, 1, at(2024, 5, 1, 10, 0), TimeFunction::Pic).with_landings(0));

    let mut storage = Storage::open_in_memory().unwrap();
    let err = storage.import(&records).unwrap_err();
    assert!(matches!(err, Error::InvalidRecord { .. }));

    let stats = storage.stats().unwrap();
    assert_eq!(stats.aircraft, 0);
    assert_eq!(stats.flights, 0);
}

#[test]
fn json_import_persists_across_reopen() {
    let json = r#"{
        "aircraft": [{ "id": 1, "registration": "D-KABC", "currency_required": true }],
        "pilots": [{ "id": 1, "first_name": "Ada", "last_name": "Example", "is_self": true }],
        "flights": [
            { "aircraft_id": 1, "pilot_id": 1, "departure_time": "2024-05-20T09:00:00Z",
              "arrival_time": "2024-05-20T10:00:00Z", "time_function": "PIC", "landings": 3 }
        ],
        "certificates": [
            { "id": 1, "name": "SPL", "issue_date": "2023-01-01", "valid_until": "2025-01-01" }
        ]
    }"#;
    let records: Snapshot = serde_json::from_str(json).unwrap();

    let path = std::env::temp_dir().join(format!("logbook_it_{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    {
        let mut storage = Storage::open(&path).unwrap();
        storage.import(&records).unwrap();
    }

    let snapshot = Storage::open(&path).unwrap().snapshot().unwrap();
    assert_eq!(snapshot.self_pilot().map(|p| p.id), Some(PilotId(1)));
    assert_eq!(snapshot.certificates, records.certificates);

    let results = evaluate_fleet(&snapshot.aircraft, PilotId(1), &snapshot.flights, now());
    assert!(results[0].status.as_ref().unwrap().current);

    let _ = std::fs::remove_file(&path);
}
