//! Declarative query, aggregation and index execution over document collections.
//!
//! This crate is the core of the querylayer project and provides:
//!
//! - **Document traits** ([`document`]) - Typed records and their BSON/JSON conversions
//! - **Store backend abstraction** ([`backend`]) - Traits implemented by concrete document stores
//! - **Query and filtering API** ([`query`]) - Filters, projections, sorting and pagination
//! - **Aggregation pipelines** ([`pipeline`]) - Ordered stage lists with grouping and arithmetic
//! - **Indexes and plans** ([`index`]) - Index directives and execution statistics
//! - **Collections interface** ([`collection`]) - The [`QueryRunner`](collection::QueryRunner) handles
//! - **Document store** ([`store`]) - Owning stores and scoped sessions
//! - **Error handling** ([`error`]) - Error taxonomy and result alias
//! - **Pagination** ([`page`]) - Page numbers and result pages
//!
//! # Example
//!
//! ```ignore
//! use querylayer_core::{query::{Filter, Query}, collection::QueryRunner};
//!
//! let store = DocumentStore::new(backend);
//! let books = store.collection("books");
//!
//! let recent = books
//!     .find(
//!         Query::builder()
//!             .filter(Filter::eq("in_stock", true).and(Filter::gt("published_year", 2010)))
//!             .build(),
//!     )
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as querylayer_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod index;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod store;
