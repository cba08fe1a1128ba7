//! In-memory document storage backend for querylayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. Collections can be seeded at build time, which makes
//! the backend suitable for tests, demos and small datasets.
//!
//! # Features
//!
//! - **Filtering, sorting and pagination** evaluated directly over BSON
//! - **Aggregation pipelines** with group, sort, skip, limit, match and project stages
//! - **Index catalogue** with idempotent creation and conflict detection
//! - **Explain simulation** reporting `IXSCAN` or `COLLSCAN` plans
//!
//! # Quick Start
//!
//! ```ignore
//! use querylayer_core::{backend::StoreBackendBuilder, collection::QueryRunner, store::DocumentStore};
//! use querylayer_memory::InMemoryStore;
//!
//! let backend = InMemoryStore::builder().seed("books", books).build().await?;
//! let store = DocumentStore::new(backend);
//!
//! let total = store.collection("books").count(None).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as querylayer_memory;

mod aggregate;
mod evaluator;
mod index;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
