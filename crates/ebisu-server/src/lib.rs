//! HTTP server wiring for Ebisu.
//!
//! Mounts the [`ebisu_api`] router under `/api`, adds a `/health` probe, and
//! wraps everything in request tracing.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, routing::get};
use ebisu_core::store::RegistryStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EBISU_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/ebisu/ebisu.db"),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router for `store`.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: RegistryStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", ebisu_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str { "ok" }

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use ebisu_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_router() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    router(Arc::new(store))
  }

  async fn get_status(uri: &str) -> StatusCode {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    make_router().await.oneshot(req).await.unwrap().status()
  }

  #[tokio::test]
  async fn health_returns_ok() {
    assert_eq!(get_status("/health").await, StatusCode::OK);
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    assert_eq!(get_status("/api/countries").await, StatusCode::OK);
    assert_eq!(get_status("/countries").await, StatusCode::NOT_FOUND);
  }

  #[test]
  fn config_falls_back_to_defaults() {
    let cfg: ServerConfig = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.address(), "127.0.0.1:9000");
  }

  #[test]
  fn expand_tilde_leaves_plain_paths() {
    assert_eq!(expand_tilde(Path::new("/var/lib/ebisu.db")), PathBuf::from("/var/lib/ebisu.db"));
    assert_eq!(expand_tilde(Path::new("ebisu.db")), PathBuf::from("ebisu.db"));
  }
}
