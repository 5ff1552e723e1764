//! Error types for `ebisu-core`.

use thiserror::Error;

use crate::review::{ReviewAction, ReviewStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot {action} a review entry in status {from}")]
  InvalidTransition {
    from:   ReviewStatus,
    action: ReviewAction,
  },

  #[error("resolving a review entry requires a resolution")]
  MissingResolution,

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidTransition { .. } => ErrorKind::Conflict,
      Self::MissingResolution => ErrorKind::InvalidInput,
      Self::UnknownDiscriminant { .. } | Self::Serialization(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of a failure, for callers that map errors onto
/// transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The request conflicts with the current state.
  Conflict,
  InvalidInput,
  NotFound,
  /// Stored data breaks an invariant the store is meant to guarantee.
  Integrity,
  Internal,
}
