//! Handlers for `/entities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entities` | `?name` required; optional `limit` |
//! | `GET`  | `/entities/:id` | 404 if not found |
//! | `GET`  | `/entities/:id/report` | Current state plus historical values |
//! | `GET`  | `/entities/:id/history` | Oldest first |
//! | `GET`  | `/entities/:id/provenance` | Source links and reported identifiers |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ebisu_core::{
  entity::{CanonicalEntity, EntityMatch, EntityReport, HistoryRecord},
  source::EntityProvenance,
  store::{EntityQuery, RegistryStore},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Search ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub name:  String,
  pub limit: Option<usize>,
}

/// `GET /entities?name=<name>[&limit=<n>]`
pub async fn search<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<EntityMatch>>, ApiError>
where
  S: RegistryStore,
{
  if params.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  let query = EntityQuery { name: params.name, limit: params.limit };
  let hits = store
    .search_entities(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(hits))
}

// ─── Single entity ───────────────────────────────────────────────────────────

/// `GET /entities/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CanonicalEntity>, ApiError>
where
  S: RegistryStore,
{
  let entity = store
    .get_entity(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  Ok(Json(entity))
}

/// `GET /entities/:id/report`
pub async fn report<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EntityReport>, ApiError>
where
  S: RegistryStore,
{
  let report = store
    .entity_report(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  Ok(Json(report))
}

/// `GET /entities/:id/history`
pub async fn history<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError>
where
  S: RegistryStore,
{
  ensure_exists(&*store, id).await?;
  let history = store.entity_history(id).await.map_err(ApiError::from_store)?;
  Ok(Json(history))
}

/// `GET /entities/:id/provenance`
pub async fn provenance<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EntityProvenance>, ApiError>
where
  S: RegistryStore,
{
  ensure_exists(&*store, id).await?;
  let provenance = store
    .entity_provenance(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(provenance))
}

async fn ensure_exists<S: RegistryStore>(store: &S, id: Uuid) -> Result<(), ApiError> {
  match store.get_entity(id).await.map_err(ApiError::from_store)? {
    Some(_) => Ok(()),
    None => Err(ApiError::NotFound(format!("entity {id} not found"))),
  }
}
