//! MongoDB backend implementation for querylayer.
//!
//! This crate provides a MongoDB implementation of the `StoreBackend` trait.
//! Filters and pipelines are translated into MongoDB syntax and executed by
//! the server; driver errors are classified into `DocumentStoreError`
//! variants without being retried.
//!
//! To use this backend, enable the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! querylayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use querylayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! let store = MongoDbStore::builder("mongodb://localhost:27017", "plp_bookstore")
//!     .build()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as querylayer_mongodb;

mod error;
mod pipeline;
mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
