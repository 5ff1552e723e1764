//! The `RegistryStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `ebisu-store-sqlite`).
//! Higher layers (`ebisu-api`, `ebisu-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  ErrorKind,
  batch::{Batch, BatchAudit, NewBatch, QuarantinedRow},
  collision::CollisionType,
  entity::{CanonicalEntity, EntityMatch, EntityReport, HistoryRecord},
  reference::Country,
  review::{QueueEntry, QueueFilter, ReviewAction, TriageRequest},
  source::{EntityProvenance, Source},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RegistryStore::search_entities`].
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
  /// Vessel name to match, case- and accent-insensitively.
  pub name:  String,
  /// Defaults to [`crate::search::DEFAULT_LIMIT`].
  pub limit: Option<usize>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors expose a [`ErrorKind`] so transports can report them
/// without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an Ebisu registry backend.
///
/// A batch is processed as one unit: every mutation it causes is applied or
/// none is, and implementations must serialize batch runs so two runs never
/// both create an entity for the same IMO.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait RegistryStore: Send + Sync {
  type Error: StoreError;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Run a batch through pre-filtering, matching, provenance, and collision
  /// detection, and return the audit for this run.
  fn ingest_batch(
    &self,
    batch: NewBatch,
  ) -> impl Future<Output = Result<BatchAudit, Self::Error>> + Send + '_;

  fn get_batch(
    &self,
    batch_id: Uuid,
  ) -> impl Future<Output = Result<Option<Batch>, Self::Error>> + Send + '_;

  /// Ledger rows, most recent first.
  fn list_batches(
    &self,
  ) -> impl Future<Output = Result<Vec<Batch>, Self::Error>> + Send + '_;

  /// Audits of every run of a batch, oldest first.
  fn batch_audits(
    &self,
    batch_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BatchAudit>, Self::Error>> + Send + '_;

  fn quarantined_rows(
    &self,
    batch_id: Uuid,
  ) -> impl Future<Output = Result<Vec<QuarantinedRow>, Self::Error>> + Send + '_;

  // ── Entities ──────────────────────────────────────────────────────────

  fn get_entity(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Option<CanonicalEntity>, Self::Error>> + Send + '_;

  /// Similarity-ranked name search.
  fn search_entities<'a>(
    &'a self,
    query: &'a EntityQuery,
  ) -> impl Future<Output = Result<Vec<EntityMatch>, Self::Error>> + Send + 'a;

  /// History records for an entity, oldest first.
  fn entity_history(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<HistoryRecord>, Self::Error>> + Send + '_;

  /// Current state plus historical values and sources. `None` if the entity
  /// does not exist.
  fn entity_report(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Option<EntityReport>, Self::Error>> + Send + '_;

  fn entity_provenance(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<EntityProvenance, Self::Error>> + Send + '_;

  // ── Reference data ────────────────────────────────────────────────────

  fn list_sources(
    &self,
  ) -> impl Future<Output = Result<Vec<Source>, Self::Error>> + Send + '_;

  fn list_countries(
    &self,
  ) -> impl Future<Output = Result<Vec<Country>, Self::Error>> + Send + '_;

  // ── Review queue ──────────────────────────────────────────────────────

  fn review_queue<'a>(
    &'a self,
    filter: &'a QueueFilter,
  ) -> impl Future<Output = Result<Vec<QueueEntry>, Self::Error>> + Send + 'a;

  /// Record a triage decision for an identifier and return its updated
  /// queue entry. Never modifies entities, history, or provenance.
  fn triage(
    &self,
    identifier_type: CollisionType,
    identifier_value: String,
    action: ReviewAction,
    request: TriageRequest,
  ) -> impl Future<Output = Result<QueueEntry, Self::Error>> + Send + '_;
}
