//! Core types, resolution algorithms, and the store trait for Ebisu.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! pre-filter, merge planner, reference resolver, and review-queue logic are
//! pure functions over the types defined here; storage backends drive them
//! inside their own transactions.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod batch;
pub mod collision;
pub mod entity;
pub mod error;
pub mod merge;
pub mod prefilter;
pub mod reference;
pub mod review;
pub mod search;
pub mod source;
pub mod store;

pub use error::{Error, ErrorKind, Result};
