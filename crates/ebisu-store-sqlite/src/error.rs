//! Error type for `ebisu-store-sqlite`.

use ebisu_core::{ErrorKind, collision::CollisionType, store::StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ebisu_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Two entities hold the same IMO. The unique index should make this
  /// impossible; seeing it means the store is corrupt.
  #[error("integrity violation: IMO {imo} is held by entities {entity_id} and {other_entity_id}")]
  IntegrityViolation {
    imo:             String,
    entity_id:       Uuid,
    other_entity_id: Uuid,
  },

  /// An entity insert was rejected by the IMO index, yet no entity holds
  /// that IMO.
  #[error("integrity violation: insert of entity {entity_id} rejected but IMO {imo:?} has no holder")]
  LostInsert {
    entity_id: Uuid,
    imo:       Option<String>,
  },

  /// A batch id was reused for different rows.
  #[error("batch {batch_id} was already loaded with checksum {existing}, got {incoming}")]
  BatchConflict {
    batch_id: Uuid,
    existing: String,
    incoming: String,
  },

  #[error("no collisions recorded for {identifier_type} {identifier_value:?}")]
  CollisionNotFound {
    identifier_type:  CollisionType,
    identifier_value: String,
  },
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::BatchConflict { .. } => ErrorKind::Conflict,
      Error::CollisionNotFound { .. } => ErrorKind::NotFound,
      Error::IntegrityViolation { .. } | Error::LostInsert { .. } => ErrorKind::Integrity,
      _ => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
