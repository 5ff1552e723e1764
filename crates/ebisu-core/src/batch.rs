//! Batch input and ledger types.
//!
//! A batch is one ingestion run: a sequence of raw rows already flattened to
//! a fixed column set by an upstream collaborator. Raw rows live only for the
//! duration of processing; the ledger keeps one [`Batch`] per batch id and
//! one [`BatchAudit`] per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::Result;

/// Source label used when no row in a batch names its source.
pub const UNKNOWN_SOURCE: &str = "UNKNOWN";

/// Treat empty and whitespace-only strings as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ─── RawRow ──────────────────────────────────────────────────────────────────

/// One row as reported by a registry. Every column is optional; an empty
/// string is the same as a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRow {
  pub entity_hint_id:       Option<String>,
  pub imo:                  Option<String>,
  pub mmsi:                 Option<String>,
  pub ircs:                 Option<String>,
  pub vessel_name:          Option<String>,
  pub vessel_name_alt:      Option<String>,
  pub national_registry_id: Option<String>,
  pub eu_registry_id:       Option<String>,
  pub flag_text:            Option<String>,
  pub source_label:         Option<String>,
}

impl RawRow {
  pub fn imo(&self) -> Option<&str> { present(&self.imo) }

  pub fn mmsi(&self) -> Option<&str> { present(&self.mmsi) }

  pub fn ircs(&self) -> Option<&str> { present(&self.ircs) }

  pub fn vessel_name(&self) -> Option<&str> { present(&self.vessel_name) }

  pub fn vessel_name_alt(&self) -> Option<&str> { present(&self.vessel_name_alt) }

  pub fn national_registry_id(&self) -> Option<&str> {
    present(&self.national_registry_id)
  }

  pub fn eu_registry_id(&self) -> Option<&str> { present(&self.eu_registry_id) }

  pub fn flag_text(&self) -> Option<&str> { present(&self.flag_text) }

  pub fn source_label(&self) -> Option<&str> { present(&self.source_label) }
}

// ─── NewBatch ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::RegistryStore::ingest_batch`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBatch {
  /// Caller-supplied batch id. Re-running a batch with the same id and the
  /// same rows is idempotent; a fresh id is generated when absent.
  #[serde(default)]
  pub batch_id: Option<Uuid>,
  #[serde(default)]
  pub notes:    Option<String>,
  pub rows:     Vec<RawRow>,
}

impl NewBatch {
  pub fn new(rows: Vec<RawRow>) -> Self {
    Self { batch_id: None, notes: None, rows }
  }

  /// The batch's nominal source: the first non-empty row label, or
  /// [`UNKNOWN_SOURCE`].
  pub fn source_label(&self) -> &str {
    self
      .rows
      .iter()
      .find_map(RawRow::source_label)
      .unwrap_or(UNKNOWN_SOURCE)
  }

  /// Hex SHA-256 over the JSON encoding of the rows. Used to reject a batch
  /// id that is reused for different content.
  pub fn checksum(&self) -> Result<String> {
    let encoded = serde_json::to_vec(&self.rows)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
  }
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// One ledger row per batch id. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
  pub batch_id:     Uuid,
  pub loaded_at:    DateTime<Utc>,
  pub source_label: String,
  pub checksum:     Option<String>,
  pub notes:        Option<String>,
}

/// Counts produced by one processing run of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAudit {
  pub batch_id:              Uuid,
  pub run_at:                DateTime<Utc>,
  pub row_count:             u64,
  /// Canonical entities created.
  pub inserted_count:        u64,
  /// Canonical entities matched and updated.
  pub updated_count:         u64,
  pub history_count:         u64,
  /// Source identifier tuples newly recorded.
  pub source_record_count:   u64,
  pub quarantined_count:     u64,
  /// Rows whose MMSI was masked by the pre-filter.
  pub masked_mmsi_count:     u64,
  /// Rows whose IRCS was masked by the pre-filter.
  pub masked_ircs_count:     u64,
  pub unresolved_flag_count: u64,
  /// Collision records newly written.
  pub collision_count:       u64,
}

// ─── Quarantine ──────────────────────────────────────────────────────────────

/// Why a row could not be matched to or create an entity.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QuarantineReason {
  /// Neither IMO nor MMSI was reported.
  NoMatchKey,
  /// The row's only key was an MMSI masked as contended.
  MaskedMmsiOnly,
}

/// A row set aside during processing, kept verbatim for data-quality review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedRow {
  pub batch_id:       Uuid,
  /// Zero-based position of the row within its batch.
  pub row_index:      u64,
  pub reason:         QuarantineReason,
  pub row:            RawRow,
  pub quarantined_at: DateTime<Utc>,
}
