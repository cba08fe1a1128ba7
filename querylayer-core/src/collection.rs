//! Collection handles and the [`QueryRunner`] interface.
//!
//! A collection handle binds a collection name to a backend reference and
//! executes declarative operations against it. Handles are cheap and borrowed
//! from a [`DocumentStore`](crate::store::DocumentStore).
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped handle returning BSON documents, generic over the backend
//! - [`DynCollection`] - The same handle over a type-erased backend
//! - [`TypedCollection`] - Decodes results into a [`Document`] type
//!
//! # Example
//!
//! ```ignore
//! use querylayer_core::{collection::QueryRunner, query::{Query, SortDirection}};
//!
//! let books = store.collection("books");
//! let cheapest_first = books
//!     .find(Query::builder().sort("price", SortDirection::Asc).build())
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::marker::PhantomData;
use tracing::{debug, info};

use crate::{
    backend::DynStoreBackend,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    index::{ExecutionStats, IndexAck, IndexSpec},
    page::{Page, PaginationParams},
    pipeline::Pipeline,
    query::{Expr, Query, Sort},
};

/// Executes declarative operations against one collection.
///
/// Every operation is a single round trip to the store. Failures are returned
/// as-is; nothing is retried, and an operation either fully succeeds or fails
/// without partial results.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// The collection this runner targets.
    fn name(&self) -> &str;

    /// Returns the documents selected by `query`. No match yields an empty vector.
    async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Bson>>;

    /// Runs an aggregation pipeline.
    async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts documents matching `filter`.
    async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64>;

    /// Requests an index. Identical requests are idempotent.
    async fn create_index(&self, spec: IndexSpec) -> DocumentStoreResult<IndexAck>;

    /// Removes an index by name.
    async fn drop_index(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the collection's indexes.
    async fn list_indexes(&self) -> DocumentStoreResult<Vec<IndexSpec>>;

    /// Reports execution statistics for a filter without side effects.
    async fn explain(&self, filter: Option<Expr>) -> DocumentStoreResult<ExecutionStats>;

    /// Fetches one page of the (sorted) matching documents together with the total count.
    async fn find_page(
        &self,
        filter: Option<Expr>,
        sort: Vec<Sort>,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<Bson>> {
        let total = self.count(filter.clone()).await?;

        let mut builder = Query::builder().page(&params);
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }
        for key in sort {
            builder = builder.sort(key.field, key.direction);
        }

        let items = self.find(builder.build()).await?;

        Ok(params.page_of(items, total as usize))
    }
}

/// An untyped collection handle.
///
/// `B` is either a concrete backend or `dyn DynStoreBackend` (see [`DynCollection`]).
#[derive(Debug)]
pub struct Collection<'a, B: ?Sized> {
    name: String,
    backend: &'a B,
}

/// A collection handle over a type-erased backend.
pub type DynCollection<'a> = Collection<'a, dyn DynStoreBackend>;

impl<'a, B: ?Sized> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }
}

#[async_trait]
impl<'a, B> QueryRunner for Collection<'a, B>
where
    B: DynStoreBackend + ?Sized,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        debug!(collection = %self.name, ?query, "find");

        let documents = self.backend.find(query, &self.name).await?;

        debug!(collection = %self.name, returned = documents.len(), "find complete");
        Ok(documents)
    }

    async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>> {
        debug!(collection = %self.name, stages = pipeline.stages().len(), "aggregate");

        let documents = self.backend.aggregate(pipeline, &self.name).await?;

        debug!(collection = %self.name, returned = documents.len(), "aggregate complete");
        Ok(documents)
    }

    async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend.count(filter, &self.name).await
    }

    async fn create_index(&self, spec: IndexSpec) -> DocumentStoreResult<IndexAck> {
        let ack = self.backend.create_index(spec, &self.name).await?;

        if ack.created {
            info!(collection = %self.name, index = %ack.name, "index created");
        } else {
            debug!(collection = %self.name, index = %ack.name, "index already present");
        }
        Ok(ack)
    }

    async fn drop_index(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_index(name, &self.name).await?;

        info!(collection = %self.name, index = %name, "index dropped");
        Ok(())
    }

    async fn list_indexes(&self) -> DocumentStoreResult<Vec<IndexSpec>> {
        self.backend.list_indexes(&self.name).await
    }

    async fn explain(&self, filter: Option<Expr>) -> DocumentStoreResult<ExecutionStats> {
        let stats = self.backend.explain(filter, &self.name).await?;

        debug!(
            collection = %self.name,
            stage = %stats.stage,
            docs_examined = stats.total_docs_examined,
            keys_examined = stats.total_keys_examined,
            "explain"
        );
        Ok(stats)
    }
}

/// A collection handle that decodes documents into `D`.
#[derive(Debug)]
pub struct TypedCollection<'a, B: ?Sized, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B, D> TypedCollection<'a, B, D>
where
    B: DynStoreBackend + ?Sized,
    D: Document,
{
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// The untyped handle, for aggregations and index management.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Finds and decodes documents.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a document does not decode into `D`,
    /// for example because a projection removed a required field.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .find(query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Fetches and decodes one page of documents.
    pub async fn find_page(
        &self,
        filter: Option<Expr>,
        sort: Vec<Sort>,
        params: PaginationParams,
    ) -> DocumentStoreResult<Page<D>> {
        let page = self.inner.find_page(filter, sort, params).await?;

        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(D::from_bson)
                .collect::<DocumentStoreResult<Vec<D>>>()?,
            count: page.count,
            next_page: page.next_page,
            previous_page: page.previous_page,
        })
    }
}
