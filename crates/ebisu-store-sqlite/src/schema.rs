//! SQL schema for the Ebisu SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS countries (
    alpha3   TEXT PRIMARY KEY,
    alpha2   TEXT NOT NULL,
    numeric  TEXT NOT NULL,
    name     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sources (
    source_id   TEXT PRIMARY KEY,
    short_name  TEXT NOT NULL UNIQUE,
    full_name   TEXT NOT NULL,
    type_tags   TEXT NOT NULL DEFAULT '[]',   -- JSON array
    status      TEXT NOT NULL DEFAULT 'ACTIVE'
);

-- One row per batch id; re-runs keep the original row.
CREATE TABLE IF NOT EXISTS batches (
    batch_id     TEXT PRIMARY KEY,
    loaded_at    TEXT NOT NULL,
    source_label TEXT NOT NULL,
    checksum     TEXT,
    notes        TEXT
);

-- One row per processing run.
CREATE TABLE IF NOT EXISTS batch_audits (
    audit_id              INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id              TEXT NOT NULL REFERENCES batches(batch_id),
    run_at                TEXT NOT NULL,
    row_count             INTEGER NOT NULL,
    inserted_count        INTEGER NOT NULL,
    updated_count         INTEGER NOT NULL,
    history_count         INTEGER NOT NULL,
    source_record_count   INTEGER NOT NULL,
    quarantined_count     INTEGER NOT NULL,
    masked_mmsi_count     INTEGER NOT NULL,
    masked_ircs_count     INTEGER NOT NULL,
    unresolved_flag_count INTEGER NOT NULL,
    collision_count       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS quarantined_rows (
    batch_id       TEXT NOT NULL REFERENCES batches(batch_id),
    row_index      INTEGER NOT NULL,
    reason         TEXT NOT NULL,
    row_json       TEXT NOT NULL,
    quarantined_at TEXT NOT NULL,
    PRIMARY KEY (batch_id, row_index)
);

CREATE TABLE IF NOT EXISTS entities (
    entity_id            TEXT PRIMARY KEY,
    vessel_name          TEXT,
    imo                  TEXT,
    mmsi                 TEXT,
    ircs                 TEXT,
    flag_country_id      TEXT REFERENCES countries(alpha3),
    national_registry_id TEXT,
    eu_registry_id       TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
);

-- IMO is the strong identifier: unique whenever present.
CREATE UNIQUE INDEX IF NOT EXISTS entities_imo_uniq
    ON entities(imo) WHERE imo IS NOT NULL;
CREATE INDEX IF NOT EXISTS entities_mmsi_idx ON entities(mmsi);

-- Name, IMO and MMSI as first written. Never updated.
CREATE TABLE IF NOT EXISTS entity_origins (
    entity_id   TEXT PRIMARY KEY REFERENCES entities(entity_id),
    vessel_name TEXT,
    imo         TEXT,
    mmsi        TEXT
);

-- History is strictly append-only.
CREATE TABLE IF NOT EXISTS entity_history (
    history_id  TEXT PRIMARY KEY,
    entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    source_id   TEXT NOT NULL REFERENCES sources(source_id),
    change_type TEXT NOT NULL,   -- NAME | IMO | MMSI | IRCS | FLAG
    new_value   TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS entity_history_entity_idx ON entity_history(entity_id);

CREATE TABLE IF NOT EXISTS source_links (
    entity_id       TEXT NOT NULL REFERENCES entities(entity_id),
    source_id       TEXT NOT NULL REFERENCES sources(source_id),
    first_seen_date TEXT NOT NULL,
    last_seen_date  TEXT NOT NULL,
    is_active       INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (entity_id, source_id)
);

CREATE TABLE IF NOT EXISTS source_identifiers (
    entity_id        TEXT NOT NULL REFERENCES entities(entity_id),
    source_id        TEXT NOT NULL REFERENCES sources(source_id),
    identifier_type  TEXT NOT NULL,
    identifier_value TEXT NOT NULL,
    PRIMARY KEY (entity_id, source_id, identifier_type, identifier_value)
);

CREATE TABLE IF NOT EXISTS collisions (
    batch_id         TEXT NOT NULL REFERENCES batches(batch_id),
    identifier_type  TEXT NOT NULL,   -- imo | mmsi
    identifier_value TEXT NOT NULL,
    entity_id        TEXT NOT NULL REFERENCES entities(entity_id),
    other_entity_id  TEXT NOT NULL REFERENCES entities(entity_id),
    detected_at      TEXT NOT NULL,
    PRIMARY KEY (batch_id, identifier_type, identifier_value, entity_id, other_entity_id)
);
CREATE INDEX IF NOT EXISTS collisions_identifier_idx
    ON collisions(identifier_type, identifier_value);

-- The single current decision per identifier; triage overwrites it.
CREATE TABLE IF NOT EXISTS review_entries (
    identifier_type  TEXT NOT NULL,
    identifier_value TEXT NOT NULL,
    status           TEXT NOT NULL,
    resolution       TEXT,
    reviewer         TEXT,
    notes            TEXT,
    updated_at       TEXT NOT NULL,
    PRIMARY KEY (identifier_type, identifier_value)
);

PRAGMA user_version = 1;
";
