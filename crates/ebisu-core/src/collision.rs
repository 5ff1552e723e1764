//! Cross-entity identifier collisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// The identifier two entities were found to share.
///
/// IMO collisions cannot be recorded: the store treats one as a broken
/// uniqueness invariant and fails the batch instead.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CollisionType {
  Imo,
  Mmsi,
}

/// While processing `batch_id`, `entity_id` was found holding the same
/// identifier as `other_entity_id`.
///
/// Unique on (batch_id, identifier_type, identifier_value, entity_id,
/// other_entity_id), so re-running a batch never duplicates a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionRecord {
  pub batch_id:         Uuid,
  pub identifier_type:  CollisionType,
  pub identifier_value: String,
  pub entity_id:        Uuid,
  pub other_entity_id:  Uuid,
  pub detected_at:      DateTime<Utc>,
}
