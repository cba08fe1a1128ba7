//! Main querylayer crate providing a unified interface for querying document collections.
//!
//! This crate is the primary entry point for users of querylayer. It re-exports
//! the core types from the sub-crates, gives access to the storage backends and
//! ships the bookstore demonstration used by the `bookstore` binary.
//!
//! # Features
//!
//! - **Declarative queries** - Filters, projections, compound sorts and pagination
//! - **Aggregation pipelines** - Group, match, sort, skip, limit and project stages
//! - **Index management** - Idempotent index creation and plan inspection via explain
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use querylayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let backend = InMemoryStore::builder()
//!         .seed("books", querylayer::bookstore::catalogue()?)
//!         .build()
//!         .await?;
//!
//!     DocumentStore::new(backend)
//!         .session(async |store| {
//!             let books = store.collection("books");
//!
//!             let recent = books
//!                 .find(
//!                     Query::builder()
//!                         .filter(Filter::and([
//!                             Filter::eq("in_stock", true),
//!                             Filter::gt("published_year", 2010),
//!                         ]))
//!                         .build(),
//!                 )
//!                 .await?;
//!
//!             println!("{} recent books in stock", recent.len());
//!             Ok(())
//!         })
//!         .await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! When the backend is only known at runtime (for example from the command
//! line), convert the store with `into_dyn`. Collection handles of a
//! [`DynDocumentStore`](store::DynDocumentStore) implement the same
//! [`QueryRunner`](collection::QueryRunner) trait.
//!
//! ```ignore
//! use querylayer::{prelude::*, memory::InMemoryStore};
//!
//! let store = DocumentStore::new(InMemoryStore::new()).into_dyn();
//! let stats = store.collection("books").explain(Some(Filter::eq("title", "1984"))).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Deterministic in-memory storage for development and testing
//! - [`mongodb`] - MongoDB server backend (requires `mongodb` feature)

pub mod bookstore;
pub mod config;
pub mod prelude;
pub mod report;

pub use querylayer_core::{backend, collection, document, error, index, page, pipeline, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use querylayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use querylayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
