//! `SQLite` schema definitions for logbook.
//!
//! The CHECK constraints and the partial unique index mirror the record
//! invariants the evaluators rely on. The evaluators still verify them.

/// SQL statement to create the aircraft table.
pub const CREATE_AIRCRAFT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft (
    id INTEGER PRIMARY KEY,
    registration TEXT NOT NULL UNIQUE,
    currency_required INTEGER NOT NULL DEFAULT 0
)
";

/// SQL statement to create the pilots table.
pub const CREATE_PILOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS pilots (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    is_self INTEGER NOT NULL DEFAULT 0,
    UNIQUE (first_name, last_name)
)
";

/// SQL statement to create the log entries table.
///
/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that text
/// comparison orders them chronologically.
pub const CREATE_LOG_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS log_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id),
    pilot_id INTEGER NOT NULL REFERENCES pilots(id),
    copilot_id INTEGER REFERENCES pilots(id),
    departure_time TEXT NOT NULL UNIQUE,
    arrival_time TEXT NOT NULL UNIQUE,
    time_function TEXT NOT NULL CHECK (time_function IN ('PIC', 'DUAL')),
    landings INTEGER NOT NULL DEFAULT 1 CHECK (landings >= 1),
    remarks TEXT NOT NULL DEFAULT '',
    CHECK (arrival_time > departure_time),
    CHECK (copilot_id IS NULL OR copilot_id <> pilot_id)
)
";

/// SQL statement to create an index for per-pair flight history lookups.
pub const CREATE_LOG_ENTRIES_PAIR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_log_entries_pair
ON log_entries(pilot_id, aircraft_id, arrival_time)
";

/// SQL statement to create the certificates table.
pub const CREATE_CERTIFICATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    number TEXT,
    issue_date TEXT NOT NULL,
    valid_until TEXT,
    authority TEXT,
    supersedes_id INTEGER REFERENCES certificates(id),
    CHECK (valid_until IS NULL OR valid_until > issue_date),
    CHECK (supersedes_id IS NULL OR supersedes_id <> id)
)
";

/// SQL statement enforcing a single superseder per certificate.
pub const CREATE_SUPERSEDES_UNIQUE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_certificates_supersedes
ON certificates(supersedes_id) WHERE supersedes_id IS NOT NULL
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_AIRCRAFT_TABLE,
    CREATE_PILOTS_TABLE,
    CREATE_LOG_ENTRIES_TABLE,
    CREATE_LOG_ENTRIES_PAIR_INDEX,
    CREATE_CERTIFICATES_TABLE,
    CREATE_SUPERSEDES_UNIQUE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_log_entries_constraints() {
        assert!(CREATE_LOG_ENTRIES_TABLE.contains("CHECK (arrival_time > departure_time)"));
        assert!(CREATE_LOG_ENTRIES_TABLE.contains("landings >= 1"));
        assert!(CREATE_LOG_ENTRIES_TABLE.contains("copilot_id <> pilot_id"));
        assert!(CREATE_LOG_ENTRIES_TABLE.contains("arrival_time TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_certificates_constraints() {
        assert!(CREATE_CERTIFICATES_TABLE.contains("supersedes_id <> id"));
        assert!(CREATE_CERTIFICATES_TABLE.contains("valid_until > issue_date"));
        assert!(CREATE_SUPERSEDES_UNIQUE_INDEX.contains("UNIQUE INDEX"));
    }
}
