//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over concrete document stores
//! (in-memory, MongoDB, ...). A backend executes already-built declarative
//! specifications; it never retries and reports failures through
//! [`DocumentStoreError`](crate::error::DocumentStoreError) without masking them.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating (connecting) backend instances
//!
//! # Examples
//!
//! ```ignore
//! use querylayer_core::{backend::StoreBackend, query::{Filter, Query}};
//!
//! let backend = MyBackendImpl::new();
//! let docs = backend
//!     .find(Query::builder().filter(Filter::eq("genre", "Fiction")).build(), "books")
//!     .await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    index::{ExecutionStats, IndexAck, IndexSpec},
    pipeline::Pipeline,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe (`Send + Sync`). The concurrency model
/// is implementation-specific.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Reading a collection that does not exist is not an error: it behaves as an
/// empty collection.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents of `collection` selected by `query`.
    ///
    /// Filtering happens first, then sorting, then `skip` and `limit`. The
    /// projection, if any, is applied to the returned window.
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>>;

    /// Runs an aggregation pipeline over `collection`.
    ///
    /// Either every stage succeeds and the final sequence is returned, or an
    /// error is returned and no documents are.
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the documents matching `filter` (all documents when `None`).
    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;

    /// Requests an index.
    ///
    /// Requesting an index identical to an existing one succeeds without creating
    /// anything. A conflicting definition fails with
    /// [`IndexConflict`](crate::error::DocumentStoreError::IndexConflict).
    async fn create_index(
        &self,
        spec: IndexSpec,
        collection: &str,
    ) -> DocumentStoreResult<IndexAck>;

    /// Removes an index by name.
    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()>;

    /// Lists the indexes of a collection, excluding the implicit store-key index.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>>;

    /// Reports how a filter would be executed. Has no side effects.
    async fn explain(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<ExecutionStats>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external
    /// connections should override this.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::find(*self, query, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::aggregate(*self, pipeline, collection).await
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count(*self, filter, collection).await
    }

    async fn create_index(
        &self,
        spec: IndexSpec,
        collection: &str,
    ) -> DocumentStoreResult<IndexAck> {
        StoreBackend::create_index(*self, spec, collection).await
    }

    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_index(*self, name, collection).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        StoreBackend::list_indexes(*self, collection).await
    }

    async fn explain(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<ExecutionStats> {
        StoreBackend::explain(*self, filter, collection).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(*self).await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>>;
    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64>;
    async fn create_index(
        &self,
        spec: IndexSpec,
        collection: &str,
    ) -> DocumentStoreResult<IndexAck>;
    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()>;
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>>;
    async fn explain(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<ExecutionStats>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::find(self, query, collection).await
    }

    async fn aggregate(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::aggregate(self, pipeline, collection).await
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count(self, filter, collection).await
    }

    async fn create_index(
        &self,
        spec: IndexSpec,
        collection: &str,
    ) -> DocumentStoreResult<IndexAck> {
        StoreBackend::create_index(self, spec, collection).await
    }

    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_index(self, name, collection).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        StoreBackend::list_indexes(self, collection).await
    }

    async fn explain(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<ExecutionStats> {
        StoreBackend::explain(self, filter, collection).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    /// Creates the backend, connecting to the store if it has one.
    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
