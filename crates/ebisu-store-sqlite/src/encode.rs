//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and calendar dates as ISO 8601
//! `YYYY-MM-DD`. Enums are stored as their upper- or snake-case names.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use ebisu_core::{
  batch::{Batch, BatchAudit, QuarantinedRow},
  collision::CollisionRecord,
  entity::{CanonicalEntity, HistoryRecord},
  reference::Country,
  review::ReviewEntry,
  source::{Source, SourceIdentifier, SourceLink},
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

/// Column text for any enum deriving `strum::IntoStaticStr`.
pub fn encode_enum<T: Into<&'static str>>(value: T) -> &'static str { value.into() }

pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(ebisu_core::Error::UnknownDiscriminant { kind, value: s.to_owned() })
  })
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const ENTITY_COLUMNS: &str = "entity_id, vessel_name, imo, mmsi, ircs, flag_country_id,
   national_registry_id, eu_registry_id, created_at, updated_at";

pub const HISTORY_COLUMNS: &str =
  "history_id, entity_id, source_id, change_type, new_value, recorded_at";

pub const SOURCE_COLUMNS: &str = "source_id, short_name, full_name, type_tags, status";

pub const COLLISION_COLUMNS: &str =
  "batch_id, identifier_type, identifier_value, entity_id, other_entity_id, detected_at";

pub const REVIEW_COLUMNS: &str =
  "identifier_type, identifier_value, status, resolution, reviewer, notes, updated_at";

pub const BATCH_COLUMNS: &str = "batch_id, loaded_at, source_label, checksum, notes";

pub const AUDIT_COLUMNS: &str = "batch_id, run_at, row_count, inserted_count, updated_count,
   history_count, source_record_count, quarantined_count, masked_mmsi_count,
   masked_ircs_count, unresolved_flag_count, collision_count";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id:            String,
  pub vessel_name:          Option<String>,
  pub imo:                  Option<String>,
  pub mmsi:                 Option<String>,
  pub ircs:                 Option<String>,
  pub flag_country_id:      Option<String>,
  pub national_registry_id: Option<String>,
  pub eu_registry_id:       Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawEntity {
  /// Map a row selected with [`ENTITY_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:            row.get(0)?,
      vessel_name:          row.get(1)?,
      imo:                  row.get(2)?,
      mmsi:                 row.get(3)?,
      ircs:                 row.get(4)?,
      flag_country_id:      row.get(5)?,
      national_registry_id: row.get(6)?,
      eu_registry_id:       row.get(7)?,
      created_at:           row.get(8)?,
      updated_at:           row.get(9)?,
    })
  }

  pub fn into_entity(self) -> Result<CanonicalEntity> {
    Ok(CanonicalEntity {
      entity_id:            decode_uuid(&self.entity_id)?,
      vessel_name:          self.vessel_name,
      imo:                  self.imo,
      mmsi:                 self.mmsi,
      ircs:                 self.ircs,
      flag_country_id:      self.flag_country_id,
      national_registry_id: self.national_registry_id,
      eu_registry_id:       self.eu_registry_id,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `entity_history` row.
pub struct RawHistory {
  pub history_id:  String,
  pub entity_id:   String,
  pub source_id:   String,
  pub change_type: String,
  pub new_value:   String,
  pub recorded_at: String,
}

impl RawHistory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id:  row.get(0)?,
      entity_id:   row.get(1)?,
      source_id:   row.get(2)?,
      change_type: row.get(3)?,
      new_value:   row.get(4)?,
      recorded_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<HistoryRecord> {
    Ok(HistoryRecord {
      history_id:  decode_uuid(&self.history_id)?,
      entity_id:   decode_uuid(&self.entity_id)?,
      source_id:   decode_uuid(&self.source_id)?,
      change_type: decode_enum("change type", &self.change_type)?,
      new_value:   self.new_value,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `sources` row.
pub struct RawSource {
  pub source_id:  String,
  pub short_name: String,
  pub full_name:  String,
  pub type_tags:  String,
  pub status:     String,
}

impl RawSource {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      source_id:  row.get(0)?,
      short_name: row.get(1)?,
      full_name:  row.get(2)?,
      type_tags:  row.get(3)?,
      status:     row.get(4)?,
    })
  }

  pub fn into_source(self) -> Result<Source> {
    Ok(Source {
      source_id:  decode_uuid(&self.source_id)?,
      short_name: self.short_name,
      full_name:  self.full_name,
      type_tags:  serde_json::from_str(&self.type_tags)?,
      status:     decode_enum("source status", &self.status)?,
    })
  }
}

/// Raw strings read directly from a `source_links` row.
pub struct RawLink {
  pub entity_id:       String,
  pub source_id:       String,
  pub first_seen_date: String,
  pub last_seen_date:  String,
  pub is_active:       bool,
}

impl RawLink {
  pub fn into_link(self) -> Result<SourceLink> {
    Ok(SourceLink {
      entity_id:       decode_uuid(&self.entity_id)?,
      source_id:       decode_uuid(&self.source_id)?,
      first_seen_date: decode_date(&self.first_seen_date)?,
      last_seen_date:  decode_date(&self.last_seen_date)?,
      is_active:       self.is_active,
    })
  }
}

/// Raw strings read directly from a `source_identifiers` row.
pub struct RawIdentifier {
  pub entity_id:        String,
  pub source_id:        String,
  pub identifier_type:  String,
  pub identifier_value: String,
}

impl RawIdentifier {
  pub fn into_identifier(self) -> Result<SourceIdentifier> {
    Ok(SourceIdentifier {
      entity_id:        decode_uuid(&self.entity_id)?,
      source_id:        decode_uuid(&self.source_id)?,
      identifier_type:  decode_enum("identifier type", &self.identifier_type)?,
      identifier_value: self.identifier_value,
    })
  }
}

/// Raw strings read directly from a `collisions` row.
pub struct RawCollision {
  pub batch_id:         String,
  pub identifier_type:  String,
  pub identifier_value: String,
  pub entity_id:        String,
  pub other_entity_id:  String,
  pub detected_at:      String,
}

impl RawCollision {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      batch_id:         row.get(0)?,
      identifier_type:  row.get(1)?,
      identifier_value: row.get(2)?,
      entity_id:        row.get(3)?,
      other_entity_id:  row.get(4)?,
      detected_at:      row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<CollisionRecord> {
    Ok(CollisionRecord {
      batch_id:         decode_uuid(&self.batch_id)?,
      identifier_type:  decode_enum("collision type", &self.identifier_type)?,
      identifier_value: self.identifier_value,
      entity_id:        decode_uuid(&self.entity_id)?,
      other_entity_id:  decode_uuid(&self.other_entity_id)?,
      detected_at:      decode_dt(&self.detected_at)?,
    })
  }
}

/// Raw strings read directly from a `review_entries` row.
pub struct RawReviewEntry {
  pub identifier_type:  String,
  pub identifier_value: String,
  pub status:           String,
  pub resolution:       Option<String>,
  pub reviewer:         Option<String>,
  pub notes:            Option<String>,
  pub updated_at:       String,
}

impl RawReviewEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identifier_type:  row.get(0)?,
      identifier_value: row.get(1)?,
      status:           row.get(2)?,
      resolution:       row.get(3)?,
      reviewer:         row.get(4)?,
      notes:            row.get(5)?,
      updated_at:       row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ReviewEntry> {
    Ok(ReviewEntry {
      identifier_type:  decode_enum("collision type", &self.identifier_type)?,
      identifier_value: self.identifier_value,
      status:           decode_enum("review status", &self.status)?,
      resolution:       self
        .resolution
        .as_deref()
        .map(|r| decode_enum("resolution", r))
        .transpose()?,
      reviewer:         self.reviewer,
      notes:            self.notes,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `batches` row.
pub struct RawBatch {
  pub batch_id:     String,
  pub loaded_at:    String,
  pub source_label: String,
  pub checksum:     Option<String>,
  pub notes:        Option<String>,
}

impl RawBatch {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      batch_id:     row.get(0)?,
      loaded_at:    row.get(1)?,
      source_label: row.get(2)?,
      checksum:     row.get(3)?,
      notes:        row.get(4)?,
    })
  }

  pub fn into_batch(self) -> Result<Batch> {
    Ok(Batch {
      batch_id:     decode_uuid(&self.batch_id)?,
      loaded_at:    decode_dt(&self.loaded_at)?,
      source_label: self.source_label,
      checksum:     self.checksum,
      notes:        self.notes,
    })
  }
}

/// Raw values read directly from a `batch_audits` row.
pub struct RawAudit {
  pub batch_id: String,
  pub run_at:   String,
  /// Counters in [`AUDIT_COLUMNS`] order, starting at `row_count`.
  pub counts:   [i64; 10],
}

impl RawAudit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let mut counts = [0_i64; 10];
    for (i, slot) in counts.iter_mut().enumerate() {
      *slot = row.get(i + 2)?;
    }
    Ok(Self { batch_id: row.get(0)?, run_at: row.get(1)?, counts })
  }

  pub fn into_audit(self) -> Result<BatchAudit> {
    let [
      row_count,
      inserted_count,
      updated_count,
      history_count,
      source_record_count,
      quarantined_count,
      masked_mmsi_count,
      masked_ircs_count,
      unresolved_flag_count,
      collision_count,
    ] = self.counts.map(|n| n.max(0) as u64);

    Ok(BatchAudit {
      batch_id: decode_uuid(&self.batch_id)?,
      run_at: decode_dt(&self.run_at)?,
      row_count,
      inserted_count,
      updated_count,
      history_count,
      source_record_count,
      quarantined_count,
      masked_mmsi_count,
      masked_ircs_count,
      unresolved_flag_count,
      collision_count,
    })
  }
}

/// Raw strings read directly from a `quarantined_rows` row.
pub struct RawQuarantined {
  pub batch_id:       String,
  pub row_index:      i64,
  pub reason:         String,
  pub row_json:       String,
  pub quarantined_at: String,
}

impl RawQuarantined {
  pub fn into_row(self) -> Result<QuarantinedRow> {
    Ok(QuarantinedRow {
      batch_id:       decode_uuid(&self.batch_id)?,
      row_index:      self.row_index.max(0) as u64,
      reason:         decode_enum("quarantine reason", &self.reason)?,
      row:            serde_json::from_str(&self.row_json)?,
      quarantined_at: decode_dt(&self.quarantined_at)?,
    })
  }
}

pub fn country_from_row(row: &Row<'_>) -> rusqlite::Result<Country> {
  Ok(Country {
    alpha3:  row.get(0)?,
    alpha2:  row.get(1)?,
    numeric: row.get(2)?,
    name:    row.get(3)?,
  })
}
