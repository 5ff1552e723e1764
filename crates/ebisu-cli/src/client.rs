//! Async HTTP client wrapping the Ebisu JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use ebisu_core::{
  batch::{Batch, BatchAudit, NewBatch, QuarantinedRow},
  collision::CollisionType,
  entity::{CanonicalEntity, EntityMatch, EntityReport, HistoryRecord},
  review::{QueueEntry, ReviewAction, TriageRequest},
  source::Source,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Connection settings for the Ebisu API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
}

/// Async HTTP client for the Ebisu JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(300))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let resp = self
      .client
      .get(self.url(path))
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;
    decode(resp, "GET", path).await
  }

  // ── Batches ───────────────────────────────────────────────────────────────

  /// `POST /api/batches`
  pub async fn ingest(&self, batch: &NewBatch) -> Result<BatchAudit> {
    let resp = self
      .client
      .post(self.url("/batches"))
      .json(batch)
      .send()
      .await
      .context("POST /batches failed")?;
    decode(resp, "POST", "/batches").await
  }

  /// `GET /api/batches`
  pub async fn list_batches(&self) -> Result<Vec<Batch>> { self.get("/batches").await }

  /// `GET /api/batches/<id>`
  pub async fn get_batch(&self, id: Uuid) -> Result<Batch> {
    self.get(&format!("/batches/{id}")).await
  }

  /// `GET /api/batches/<id>/audits`
  pub async fn batch_audits(&self, id: Uuid) -> Result<Vec<BatchAudit>> {
    self.get(&format!("/batches/{id}/audits")).await
  }

  /// `GET /api/batches/<id>/quarantine`
  pub async fn quarantined_rows(&self, id: Uuid) -> Result<Vec<QuarantinedRow>> {
    self.get(&format!("/batches/{id}/quarantine")).await
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  /// `GET /api/entities/<id>`
  pub async fn get_entity(&self, id: Uuid) -> Result<CanonicalEntity> {
    self.get(&format!("/entities/{id}")).await
  }

  /// `GET /api/entities/<id>/report`
  pub async fn entity_report(&self, id: Uuid) -> Result<EntityReport> {
    self.get(&format!("/entities/{id}/report")).await
  }

  /// `GET /api/entities/<id>/history`
  pub async fn entity_history(&self, id: Uuid) -> Result<Vec<HistoryRecord>> {
    self.get(&format!("/entities/{id}/history")).await
  }

  /// `GET /api/entities?name=<name>[&limit=<n>]`
  pub async fn search(&self, name: &str, limit: Option<usize>) -> Result<Vec<EntityMatch>> {
    let mut query = vec![("name", name.to_owned())];
    if let Some(limit) = limit {
      query.push(("limit", limit.to_string()));
    }
    let resp = self
      .client
      .get(self.url("/entities"))
      .query(&query)
      .send()
      .await
      .context("GET /entities failed")?;
    decode(resp, "GET", "/entities").await
  }

  /// `GET /api/sources`
  pub async fn list_sources(&self) -> Result<Vec<Source>> { self.get("/sources").await }

  // ── Review ────────────────────────────────────────────────────────────────

  /// `GET /api/review[?unresolved=true][&entity_id=..][&since=..]`
  pub async fn review_queue(
    &self,
    unresolved: bool,
    entity_id: Option<Uuid>,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<QueueEntry>> {
    let mut query = vec![("unresolved", unresolved.to_string())];
    if let Some(id) = entity_id {
      query.push(("entity_id", id.to_string()));
    }
    if let Some(since) = since {
      query.push(("since", since.to_rfc3339()));
    }
    let resp = self
      .client
      .get(self.url("/review"))
      .query(&query)
      .send()
      .await
      .context("GET /review failed")?;
    decode(resp, "GET", "/review").await
  }

  /// `POST /api/review/<type>/<value>/<action>`
  pub async fn triage(
    &self,
    identifier_type: CollisionType,
    identifier_value: &str,
    action: ReviewAction,
    request: &TriageRequest,
  ) -> Result<QueueEntry> {
    let path = format!("/review/{identifier_type}/{identifier_value}/{action}");
    let resp = self
      .client
      .post(self.url(&path))
      .json(request)
      .send()
      .await
      .with_context(|| format!("POST {path} failed"))?;
    decode(resp, "POST", &path).await
  }
}

/// Deserialize a success body, or turn the API's `{"error": ...}` body into
/// an error message.
async fn decode<T: DeserializeOwned>(resp: Response, method: &str, path: &str) -> Result<T> {
  let status = resp.status();
  if !status.is_success() {
    let message = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
      .unwrap_or_default();
    return Err(anyhow!("{method} {path} → {status}: {message}"));
  }
  resp
    .json()
    .await
    .with_context(|| format!("deserialising {method} {path} response"))
}
