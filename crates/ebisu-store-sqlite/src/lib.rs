//! SQLite backend for the Ebisu registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each batch is processed inside
//! a single `BEGIN IMMEDIATE` transaction on that connection.

mod encode;
mod ingest;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
