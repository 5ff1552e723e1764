//! Handlers for `/batches` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/batches` | Most recent first |
//! | `POST` | `/batches` | Body: [`NewBatch`]; returns 201 + the run's audit |
//! | `GET`  | `/batches/:id` | 404 if not found |
//! | `GET`  | `/batches/:id/audits` | One audit per run, oldest first |
//! | `GET`  | `/batches/:id/quarantine` | Rows set aside for lacking a match key |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ebisu_core::{
  batch::{Batch, BatchAudit, NewBatch, QuarantinedRow},
  store::RegistryStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /batches`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Batch>>, ApiError>
where
  S: RegistryStore,
{
  let batches = store.list_batches().await.map_err(ApiError::from_store)?;
  Ok(Json(batches))
}

/// `POST /batches`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(batch): Json<NewBatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  if batch.rows.is_empty() {
    return Err(ApiError::BadRequest("batch has no rows".into()));
  }
  let audit = store.ingest_batch(batch).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(audit)))
}

/// `GET /batches/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Batch>, ApiError>
where
  S: RegistryStore,
{
  let batch = store
    .get_batch(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("batch {id} not found")))?;
  Ok(Json(batch))
}

/// `GET /batches/:id/audits`
pub async fn audits<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<BatchAudit>>, ApiError>
where
  S: RegistryStore,
{
  let audits = store.batch_audits(id).await.map_err(ApiError::from_store)?;
  if audits.is_empty() {
    return Err(ApiError::NotFound(format!("batch {id} not found")));
  }
  Ok(Json(audits))
}

/// `GET /batches/:id/quarantine`
pub async fn quarantine<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<QuarantinedRow>>, ApiError>
where
  S: RegistryStore,
{
  let rows = store.quarantined_rows(id).await.map_err(ApiError::from_store)?;
  Ok(Json(rows))
}
