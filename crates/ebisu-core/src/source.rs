//! Data providers and the provenance they leave on entities.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::batch::RawRow;

// ─── Source ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum SourceStatus {
  #[default]
  Active,
  Inactive,
}

/// A registry that reports vessel data. Created lazily the first time a
/// batch names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
  pub source_id:  Uuid,
  /// Unique label as it appears in batch rows, e.g. `"ICCAT"`.
  pub short_name: String,
  pub full_name:  String,
  pub type_tags:  Vec<String>,
  pub status:     SourceStatus,
}

impl Source {
  /// A source first seen in a batch; only the short name is known.
  pub fn discovered(short_name: &str) -> Self {
    Self {
      source_id:  Uuid::new_v4(),
      short_name: short_name.to_owned(),
      full_name:  short_name.to_owned(),
      type_tags:  Vec::new(),
      status:     SourceStatus::Active,
    }
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Ties an entity to a source that has reported it. One row per pair,
/// refreshed on every sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
  pub entity_id:       Uuid,
  pub source_id:       Uuid,
  pub first_seen_date: NaiveDate,
  pub last_seen_date:  NaiveDate,
  pub is_active:       bool,
}

/// Which reported column a [`SourceIdentifier`] came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IdentifierType {
  Name,
  NameAlt,
  Imo,
  Mmsi,
  Ircs,
  NationalRegistryId,
  EuRegistryId,
}

/// "Source S reported value V for field T on entity E." Append-only and
/// unique on the whole tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceIdentifier {
  pub entity_id:        Uuid,
  pub source_id:        Uuid,
  pub identifier_type:  IdentifierType,
  pub identifier_value: String,
}

/// Everything the provenance tables hold for one entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityProvenance {
  pub links:       Vec<SourceLink>,
  pub identifiers: Vec<SourceIdentifier>,
}

/// Every non-empty identifier a row reports, as the source sent it. Masking
/// by the pre-filter does not apply here.
pub fn reported_identifiers(row: &RawRow) -> Vec<(IdentifierType, &str)> {
  [
    (IdentifierType::Name, row.vessel_name()),
    (IdentifierType::NameAlt, row.vessel_name_alt()),
    (IdentifierType::Imo, row.imo()),
    (IdentifierType::Mmsi, row.mmsi()),
    (IdentifierType::Ircs, row.ircs()),
    (IdentifierType::NationalRegistryId, row.national_registry_id()),
    (IdentifierType::EuRegistryId, row.eu_registry_id()),
  ]
  .into_iter()
  .filter_map(|(kind, value)| value.map(|v| (kind, v)))
  .collect()
}
