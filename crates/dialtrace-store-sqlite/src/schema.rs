//! SQL schema for the dialtrace SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per completed investigation. Append-only; rows leave only
-- through retention cleanup.
CREATE TABLE IF NOT EXISTS investigations (
    record_id        TEXT PRIMARY KEY,
    identifier_hash  TEXT NOT NULL,   -- SHA-256 hex, never the number
    recorded_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond width
    carrier          TEXT,
    location         TEXT,
    number_type      TEXT,
    is_valid         INTEGER,
    is_mobile        INTEGER,
    country_code     TEXT,
    reputation_score REAL,
    social_presence  TEXT NOT NULL DEFAULT '{}',   -- JSON object
    domains          TEXT NOT NULL DEFAULT '[]',   -- JSON array
    sources_used     TEXT NOT NULL DEFAULT '[]',   -- JSON array
    confidence       REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS changes (
    change_id       TEXT PRIMARY KEY,
    identifier_hash TEXT NOT NULL,
    change_type     TEXT NOT NULL,   -- 'carrier_change' | 'location_change' | ...
    field           TEXT NOT NULL,
    old_value       TEXT NOT NULL,
    new_value       TEXT NOT NULL,
    detected_at     TEXT NOT NULL,
    confidence      REAL NOT NULL,
    source          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS carrier_transitions (
    transition_id    TEXT PRIMARY KEY,
    identifier_hash  TEXT NOT NULL,
    from_carrier     TEXT NOT NULL,
    to_carrier       TEXT NOT NULL,
    transitioned_at  TEXT NOT NULL,
    confidence       REAL NOT NULL,
    porting_detected INTEGER NOT NULL,
    CHECK (from_carrier != to_carrier)
);

CREATE TABLE IF NOT EXISTS metadata (
    identifier_hash      TEXT PRIMARY KEY,
    first_seen           TEXT NOT NULL,
    last_seen            TEXT NOT NULL,
    total_investigations INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS investigations_hash_idx
    ON investigations(identifier_hash, recorded_at);
CREATE INDEX IF NOT EXISTS changes_hash_idx
    ON changes(identifier_hash, detected_at);
CREATE INDEX IF NOT EXISTS transitions_hash_idx
    ON carrier_transitions(identifier_hash, transitioned_at);

PRAGMA user_version = 1;
";
