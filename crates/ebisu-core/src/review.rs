//! The collision review queue.
//!
//! The queue is never stored. It is derived on read by grouping collision
//! records per identifier and joining the single current review entry for
//! each group. Review entries are advisory: triage records a decision and
//! nothing else.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result, collision::{CollisionRecord, CollisionType}};

// ─── Status & resolution ─────────────────────────────────────────────────────

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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
  #[default]
  New,
  Acknowledged,
  Resolved,
  Dismissed,
}

impl ReviewStatus {
  /// Still waiting on a decision.
  pub fn is_open(self) -> bool { matches!(self, Self::New | Self::Acknowledged) }

  pub fn is_closed(self) -> bool { !self.is_open() }
}

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
pub enum Resolution {
  ChooseExisting,
  ReassignId,
  MergeEntities,
  DataError,
}

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewAction {
  Acknowledge,
  Resolve,
  Dismiss,
  Reopen,
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// The operator-supplied part of a triage action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRequest {
  pub reviewer:   Option<String>,
  pub notes:      Option<String>,
  pub resolution: Option<Resolution>,
}

/// The current review decision for one identifier. Each triage action
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
  pub identifier_type:  CollisionType,
  pub identifier_value: String,
  pub status:           ReviewStatus,
  pub resolution:       Option<Resolution>,
  pub reviewer:         Option<String>,
  pub notes:            Option<String>,
  pub updated_at:       DateTime<Utc>,
}

/// Apply `action` to the current entry for an identifier (`None` means the
/// identifier has never been triaged and is implicitly NEW).
pub fn transition(
  identifier_type: CollisionType,
  identifier_value: &str,
  current: Option<&ReviewEntry>,
  action: ReviewAction,
  request: TriageRequest,
  now: DateTime<Utc>,
) -> Result<ReviewEntry> {
  use ReviewAction as A;
  use ReviewStatus as S;

  let from = current.map(|e| e.status).unwrap_or_default();
  let (status, resolution) = match (from, action) {
    (S::New | S::Acknowledged, A::Acknowledge) => (S::Acknowledged, None),
    (S::New | S::Acknowledged | S::Resolved, A::Resolve) => (
      S::Resolved,
      Some(request.resolution.ok_or(Error::MissingResolution)?),
    ),
    (S::New | S::Acknowledged | S::Dismissed, A::Dismiss) => (
      S::Dismissed,
      Some(request.resolution.unwrap_or(Resolution::DataError)),
    ),
    (S::Resolved | S::Dismissed | S::New, A::Reopen) => (S::New, None),
    (from, action) => return Err(Error::InvalidTransition { from, action }),
  };

  // A closed decision only changes through reopen. Repeating it is a no-op.
  if let Some(current) = current.filter(|c| c.status.is_closed() && c.status == status) {
    if current.resolution != resolution {
      return Err(Error::InvalidTransition { from, action });
    }
    return Ok(current.clone());
  }

  Ok(ReviewEntry {
    identifier_type,
    identifier_value: identifier_value.to_owned(),
    status,
    resolution,
    reviewer: request.reviewer,
    notes: request.notes,
    updated_at: now,
  })
}

// ─── Queue ───────────────────────────────────────────────────────────────────

/// One identifier's collisions, aggregated, with its review decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
  pub identifier_type:   CollisionType,
  pub identifier_value:  String,
  pub collision_count:   u64,
  pub first_detected_at: DateTime<Utc>,
  pub last_detected_at:  DateTime<Utc>,
  /// Distinct union of both sides of every collision in the group.
  pub entity_ids:        Vec<Uuid>,
  pub status:            ReviewStatus,
  pub resolution:        Option<Resolution>,
  pub reviewer:          Option<String>,
  pub notes:             Option<String>,
  pub reviewed_at:       Option<DateTime<Utc>>,
}

/// Restrictions on [`crate::store::RegistryStore::review_queue`]. All set
/// fields must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueFilter {
  /// Only NEW and ACKNOWLEDGED entries.
  #[serde(default)]
  pub unresolved_only: bool,
  /// Only groups involving this entity.
  pub entity_id:       Option<Uuid>,
  /// Only groups with a collision detected at or after this instant.
  pub detected_since:  Option<DateTime<Utc>>,
}

impl QueueFilter {
  pub fn matches(&self, entry: &QueueEntry) -> bool {
    (!self.unresolved_only || entry.status.is_open())
      && self.entity_id.is_none_or(|id| entry.entity_ids.contains(&id))
      && self.detected_since.is_none_or(|t| entry.last_detected_at >= t)
  }
}

/// Group collisions by identifier and join review entries. Ordered by most
/// recent detection first.
pub fn aggregate(
  collisions: &[CollisionRecord],
  entries: &[ReviewEntry],
) -> Vec<QueueEntry> {
  struct Group {
    count:    u64,
    first:    DateTime<Utc>,
    last:     DateTime<Utc>,
    entities: BTreeSet<Uuid>,
  }

  let mut groups: BTreeMap<(CollisionType, &str), Group> = BTreeMap::new();
  for c in collisions {
    let group = groups
      .entry((c.identifier_type, c.identifier_value.as_str()))
      .or_insert_with(|| Group {
        count:    0,
        first:    c.detected_at,
        last:     c.detected_at,
        entities: BTreeSet::new(),
      });
    group.count += 1;
    group.first = group.first.min(c.detected_at);
    group.last = group.last.max(c.detected_at);
    group.entities.insert(c.entity_id);
    group.entities.insert(c.other_entity_id);
  }

  let decisions: HashMap<(CollisionType, &str), &ReviewEntry> = entries
    .iter()
    .map(|e| ((e.identifier_type, e.identifier_value.as_str()), e))
    .collect();

  let mut queue: Vec<QueueEntry> = groups
    .into_iter()
    .map(|(key, group)| {
      let decision = decisions.get(&key);
      QueueEntry {
        identifier_type:   key.0,
        identifier_value:  key.1.to_owned(),
        collision_count:   group.count,
        first_detected_at: group.first,
        last_detected_at:  group.last,
        entity_ids:        group.entities.into_iter().collect(),
        status:            decision.map(|d| d.status).unwrap_or_default(),
        resolution:        decision.and_then(|d| d.resolution),
        reviewer:          decision.and_then(|d| d.reviewer.clone()),
        notes:             decision.and_then(|d| d.notes.clone()),
        reviewed_at:       decision.map(|d| d.updated_at),
      }
    })
    .collect();

  queue.sort_by(|a, b| {
    b.last_detected_at
      .cmp(&a.last_detected_at)
      .then_with(|| a.identifier_value.cmp(&b.identifier_value))
  });
  queue
}
