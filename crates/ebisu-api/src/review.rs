//! Handlers for the collision review queue.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/review` | Optional `unresolved`, `entity_id`, `since` |
//! | `POST` | `/review/:type/:value/:action` | `action` ∈ acknowledge, resolve, dismiss, reopen; body: [`TriageRequest`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use ebisu_core::{
  collision::CollisionType,
  review::{QueueEntry, QueueFilter, ReviewAction, TriageRequest},
  store::RegistryStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
pub struct QueueParams {
  /// Only NEW and ACKNOWLEDGED entries.
  #[serde(default)]
  pub unresolved: bool,
  pub entity_id:  Option<Uuid>,
  /// Only groups detected at or after this instant.
  pub since:      Option<DateTime<Utc>>,
}

/// `GET /review[?unresolved=true][&entity_id=<id>][&since=<rfc3339>]`
pub async fn queue<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<QueueParams>,
) -> Result<Json<Vec<QueueEntry>>, ApiError>
where
  S: RegistryStore,
{
  let filter = QueueFilter {
    unresolved_only: params.unresolved,
    entity_id:       params.entity_id,
    detected_since:  params.since,
  };
  let queue = store.review_queue(&filter).await.map_err(ApiError::from_store)?;
  Ok(Json(queue))
}

/// `POST /review/:type/:value/:action`
pub async fn triage<S>(
  State(store): State<Arc<S>>,
  Path((identifier_type, identifier_value, action)): Path<(CollisionType, String, ReviewAction)>,
  body: Option<Json<TriageRequest>>,
) -> Result<Json<QueueEntry>, ApiError>
where
  S: RegistryStore,
{
  let request = body.map(|Json(r)| r).unwrap_or_default();
  let entry = store
    .triage(identifier_type, identifier_value, action, request)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(entry))
}
