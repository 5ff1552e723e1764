//! Field-level merge of an incoming row into a canonical entity.
//!
//! The rule is *incoming wins if present*: a reported value replaces the
//! current one, a missing value never erases it. Every replacement of a
//! tracked field yields a [`FieldChange`] that the store persists as a
//! history record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  entity::{CanonicalEntity, ChangeType},
  prefilter::MaskedRow,
};

/// A tracked field took a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
  pub change_type: ChangeType,
  pub new_value:   String,
}

/// The outcome of merging one row into an existing entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
  /// The entity after the merge.
  pub entity:  CanonicalEntity,
  /// Changes in field order: name, IMO, MMSI, IRCS, flag.
  pub changes: Vec<FieldChange>,
}

impl MergePlan {
  pub fn is_unchanged(&self) -> bool { self.changes.is_empty() }
}

/// A new entity built from a row that matched nothing. `flag` is the already
/// resolved country code.
pub fn plan_create(
  entity_id: Uuid,
  row: &MaskedRow<'_>,
  flag: Option<&str>,
  now: DateTime<Utc>,
) -> CanonicalEntity {
  let own = |v: Option<&str>| v.map(str::to_owned);
  CanonicalEntity {
    entity_id,
    vessel_name: own(row.vessel_name),
    imo: own(row.imo),
    mmsi: own(row.mmsi),
    ircs: own(row.ircs),
    flag_country_id: own(flag),
    national_registry_id: own(row.national_registry_id),
    eu_registry_id: own(row.eu_registry_id),
    created_at: now,
    updated_at: now,
  }
}

/// Merge `row` into `current`. `updated_at` always advances to `now`.
pub fn plan_update(
  current: &CanonicalEntity,
  row: &MaskedRow<'_>,
  flag: Option<&str>,
  now: DateTime<Utc>,
) -> MergePlan {
  let mut entity = current.clone();
  let mut changes = Vec::new();

  let tracked = [
    (ChangeType::Name, &mut entity.vessel_name, row.vessel_name),
    (ChangeType::Imo, &mut entity.imo, row.imo),
    (ChangeType::Mmsi, &mut entity.mmsi, row.mmsi),
    (ChangeType::Ircs, &mut entity.ircs, row.ircs),
    (ChangeType::Flag, &mut entity.flag_country_id, flag),
  ];
  for (change_type, slot, incoming) in tracked {
    if let Some(new_value) = apply(slot, incoming) {
      changes.push(FieldChange { change_type, new_value });
    }
  }

  // Registry ids merge the same way but carry no history type.
  apply(&mut entity.national_registry_id, row.national_registry_id);
  apply(&mut entity.eu_registry_id, row.eu_registry_id);

  entity.updated_at = now;
  MergePlan { entity, changes }
}

/// Overwrite `slot` when `incoming` is present and differs. Returns the new
/// value on change.
fn apply(slot: &mut Option<String>, incoming: Option<&str>) -> Option<String> {
  let incoming = incoming?;
  let current = slot.as_deref().map(str::trim).filter(|v| !v.is_empty());
  if current == Some(incoming) {
    return None;
  }
  *slot = Some(incoming.to_owned());
  Some(incoming.to_owned())
}
