//! Handlers for sources and country reference data.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use ebisu_core::{
  reference::{Country, CountryResolver},
  source::Source,
  store::RegistryStore,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `GET /sources`
pub async fn sources<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Source>>, ApiError>
where
  S: RegistryStore,
{
  let sources = store.list_sources().await.map_err(ApiError::from_store)?;
  Ok(Json(sources))
}

/// `GET /countries`
pub async fn countries<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Country>>, ApiError>
where
  S: RegistryStore,
{
  let countries = store.list_countries().await.map_err(ApiError::from_store)?;
  Ok(Json(countries))
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
  /// Free-text flag: alpha-2, alpha-3, numeric code, or name.
  pub q: String,
}

/// `GET /countries/resolve?q=<text>`
pub async fn resolve_country<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ResolveParams>,
) -> Result<Json<Country>, ApiError>
where
  S: RegistryStore,
{
  let resolver = CountryResolver::new(
    store.list_countries().await.map_err(ApiError::from_store)?,
  );
  let country = resolver
    .resolve(&params.q)
    .cloned()
    .ok_or_else(|| ApiError::NotFound(format!("no country matches {:?}", params.q)))?;
  Ok(Json(country))
}
