//! Canonical vessel entities, their change history, and the report view.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::source::Source;

// ─── CanonicalEntity ─────────────────────────────────────────────────────────

/// The single deduplicated record for one real vessel.
///
/// `imo`, when set, is unique across all entities. `mmsi` and `ircs` are weak
/// identifiers and may be shared; sharing is reported as a collision rather
/// than prevented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEntity {
  pub entity_id:            Uuid,
  pub vessel_name:          Option<String>,
  pub imo:                  Option<String>,
  pub mmsi:                 Option<String>,
  pub ircs:                 Option<String>,
  /// Canonical (alpha-3) code of the flag state.
  pub flag_country_id:      Option<String>,
  pub national_registry_id: Option<String>,
  pub eu_registry_id:       Option<String>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

// ─── History ─────────────────────────────────────────────────────────────────

/// The tracked field a [`HistoryRecord`] refers to.
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeType {
  Name,
  Imo,
  Mmsi,
  Ircs,
  Flag,
}

/// A field took on a new value. Records carry only the new value; the
/// previous one is the preceding record of the same type (or the value the
/// entity was created with).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub history_id:  Uuid,
  pub entity_id:   Uuid,
  pub source_id:   Uuid,
  pub change_type: ChangeType,
  pub new_value:   String,
  pub recorded_at: DateTime<Utc>,
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// A fuzzy name-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
  pub entity: CanonicalEntity,
  /// Ranking score in `[0, 2]`; substring hits score above 1.
  pub score:  f64,
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// A source that has reported on an entity, with the link's dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySource {
  pub source:          Source,
  pub first_seen_date: NaiveDate,
  pub last_seen_date:  NaiveDate,
  pub is_active:       bool,
}

/// The name, IMO, and MMSI an entity was created with. Creation writes no
/// history, so these are kept separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialValues {
  pub vessel_name: Option<String>,
  pub imo:         Option<String>,
  pub mmsi:        Option<String>,
}

impl InitialValues {
  pub fn of(entity: &CanonicalEntity) -> Self {
    Self {
      vessel_name: entity.vessel_name.clone(),
      imo:         entity.imo.clone(),
      mmsi:        entity.mmsi.clone(),
    }
  }
}

/// Current state plus every value the entity's name, IMO, and MMSI have ever
/// held. Never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
  pub entity:        CanonicalEntity,
  pub names:         Vec<String>,
  pub imos:          Vec<String>,
  pub mmsis:         Vec<String>,
  pub sources:       Vec<EntitySource>,
  pub imo_conflict:  bool,
  pub mmsi_conflict: bool,
}

impl EntityReport {
  /// Fold an entity's initial values and history into a report.
  pub fn build(
    entity: CanonicalEntity,
    initial: &InitialValues,
    history: &[HistoryRecord],
    sources: Vec<EntitySource>,
  ) -> Self {
    let collect = |kind: ChangeType, first: &Option<String>, current: &Option<String>| {
      first
        .iter()
        .cloned()
        .chain(
          history
            .iter()
            .filter(|h| h.change_type == kind)
            .map(|h| h.new_value.clone()),
        )
        .chain(current.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
    };

    let names = collect(ChangeType::Name, &initial.vessel_name, &entity.vessel_name);
    let imos = collect(ChangeType::Imo, &initial.imo, &entity.imo);
    let mmsis = collect(ChangeType::Mmsi, &initial.mmsi, &entity.mmsi);

    Self {
      imo_conflict: imos.len() > 1,
      mmsi_conflict: mmsis.len() > 1,
      entity,
      names,
      imos,
      mmsis,
      sources,
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn entity() -> CanonicalEntity {
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    CanonicalEntity {
      entity_id:            Uuid::new_v4(),
      vessel_name:          Some("GAMMA".into()),
      imo:                  Some("1234567".into()),
      mmsi:                 Some("222".into()),
      ircs:                 None,
      flag_country_id:      None,
      national_registry_id: None,
      eu_registry_id:       None,
      created_at:           ts,
      updated_at:           ts,
    }
  }

  fn record(e: &CanonicalEntity, kind: ChangeType, value: &str) -> HistoryRecord {
    HistoryRecord {
      history_id:  Uuid::new_v4(),
      entity_id:   e.entity_id,
      source_id:   Uuid::nil(),
      change_type: kind,
      new_value:   value.into(),
      recorded_at: e.updated_at,
    }
  }

  #[test]
  fn report_unions_history_with_current_values() {
    let e = entity();
    let history = vec![
      record(&e, ChangeType::Name, "ALPHA"),
      record(&e, ChangeType::Name, "GAMMA"),
      record(&e, ChangeType::Mmsi, "111"),
      record(&e, ChangeType::Mmsi, "222"),
      record(&e, ChangeType::Flag, "ESP"),
    ];

    let report = EntityReport::build(e, &InitialValues::default(), &history, vec![]);
    assert_eq!(report.names, vec!["ALPHA", "GAMMA"]);
    assert_eq!(report.imos, vec!["1234567"]);
    assert_eq!(report.mmsis, vec!["111", "222"]);
    assert!(report.mmsi_conflict);
    assert!(!report.imo_conflict);
  }

  #[test]
  fn fresh_entity_has_no_conflicts() {
    let e = entity();
    let report = EntityReport::build(e.clone(), &InitialValues::of(&e), &[], vec![]);
    assert_eq!(report.mmsis, vec!["222"]);
    assert!(!report.mmsi_conflict);
  }

  #[test]
  fn report_keeps_values_from_creation() {
    let e = entity();
    let initial = InitialValues {
      vessel_name: Some("ALPHA".into()),
      imo:         Some("1234567".into()),
      mmsi:        Some("111".into()),
    };
    let history = vec![record(&e, ChangeType::Name, "GAMMA"), record(&e, ChangeType::Mmsi, "222")];

    let report = EntityReport::build(e, &initial, &history, vec![]);
    assert_eq!(report.names, vec!["ALPHA", "GAMMA"]);
    assert_eq!(report.mmsis, vec!["111", "222"]);
    assert!(report.mmsi_conflict);
    assert!(!report.imo_conflict);
  }

  #[test]
  fn change_type_round_trips_through_strings() {
    assert_eq!(ChangeType::Mmsi.to_string(), "MMSI");
    assert_eq!("FLAG".parse::<ChangeType>().unwrap(), ChangeType::Flag);
  }
}
