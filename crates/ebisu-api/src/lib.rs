//! JSON REST API for Ebisu.
//!
//! Exposes an axum [`Router`] backed by any [`ebisu_core::store::RegistryStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ebisu_api::api_router(store.clone()))
//! ```

pub mod batches;
pub mod entities;
pub mod error;
pub mod reference;
pub mod review;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use ebisu_core::store::RegistryStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: RegistryStore + 'static,
{
  Router::new()
    // Batches
    .route("/batches", get(batches::list::<S>).post(batches::create::<S>))
    .route("/batches/{id}", get(batches::get_one::<S>))
    .route("/batches/{id}/audits", get(batches::audits::<S>))
    .route("/batches/{id}/quarantine", get(batches::quarantine::<S>))
    // Entities
    .route("/entities", get(entities::search::<S>))
    .route("/entities/{id}", get(entities::get_one::<S>))
    .route("/entities/{id}/report", get(entities::report::<S>))
    .route("/entities/{id}/history", get(entities::history::<S>))
    .route("/entities/{id}/provenance", get(entities::provenance::<S>))
    // Reference data
    .route("/sources", get(reference::sources::<S>))
    .route("/countries", get(reference::countries::<S>))
    .route("/countries/resolve", get(reference::resolve_country::<S>))
    // Review queue
    .route("/review", get(review::queue::<S>))
    .route("/review/{type}/{value}/{action}", post(review::triage::<S>))
    .with_state(store)
}
