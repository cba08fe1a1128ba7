//! In-memory storage implementation for document stores.
//!
//! Collections are ordered vectors of BSON documents kept behind an
//! async-aware read-write lock, each with its own index catalogue.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use querylayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{ExecutionStats, IndexAck, IndexSpec},
    pipeline::Pipeline,
    query::{Expr, Projection, Query},
};

use crate::{
    aggregate::PipelineExecutor,
    evaluator::{DocumentEvaluator, lookup, sort_documents},
    index::IndexCatalog,
};

#[derive(Debug, Default)]
struct CollectionState {
    /// Documents in insertion order.
    documents: Vec<Bson>,
    indexes: IndexCatalog,
}

type StoreMap = HashMap<String, CollectionState>;


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same underlying data. Reading a collection that was never
/// seeded behaves as reading an empty one.
///
/// Without a sort, documents come back in insertion order.
///
/// # Example
///
/// ```ignore
/// use querylayer_memory::InMemoryStore;
/// use querylayer_core::backend::StoreBackendBuilder;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::builder()
///     .seed("books", vec![Bson::Document(doc! { "title": "Dune", "price": 9.99 })])
///     .build()
///     .await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder that can seed collections before the store is used.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let state = match store.get(collection) {
            Some(state) => state,
            None => return Ok(vec![]),
        };

        let mut documents = DocumentEvaluator::filter_documents(&state.documents, query.filter.as_ref())?;
        sort_documents(&mut documents, &query.sort);

        let window = documents
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.effective_limit().unwrap_or(usize::MAX));

        Ok(match &query.projection {
            Some(projection) => window.map(|document| project(&document, projection)).collect(),
            None => window.collect(),
        })
    }

    async fn aggregate(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let documents = match self.store.read().await.get(collection) {
            Some(state) => state.documents.clone(),
            None => vec![],
        };

        PipelineExecutor::run(pipeline, documents)
    }

    async fn count(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let state = match store.get(collection) {
            Some(state) => state,
            None => return Ok(0),
        };

        let mut count = 0;
        for document in &state.documents {
            if DocumentEvaluator::matches(document, filter.as_ref())? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn create_index(&self, spec: IndexSpec, collection: &str) -> DocumentStoreResult<IndexAck> {
        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        state.indexes.register(spec, &state.documents)
    }

    async fn drop_index(&self, name: &str, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        match store.get_mut(collection) {
            Some(state) => state.indexes.remove(name),
            None => Err(DocumentStoreError::QuerySpec(format!("index not found with name [{name}]"))),
        }
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .map(|state| state.indexes.specs())
                .unwrap_or_default()
        )
    }

    async fn explain(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<ExecutionStats> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(state) => state.indexes.explain(filter.as_ref(), &state.documents),
            None => IndexCatalog::default().explain(filter.as_ref(), &[]),
        }
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        Ok(names)
    }
}

// Keeps the named fields in document order; `_id` only when requested.
fn project(document: &Bson, projection: &Projection) -> Bson {
    let Some(source) = document.as_document() else {
        return document.clone();
    };

    // No named fields keeps everything but the store key, as the server does.
    if projection.fields.is_empty() {
        let mut output = source.clone();
        if !projection.include_id {
            output.remove("_id");
        }
        return Bson::Document(output);
    }

    let mut output = Document::new();

    if projection.include_id {
        if let Some(id) = source.get("_id") {
            output.insert("_id", id.clone());
        }
    }

    for (key, value) in source {
        if key != "_id" && projection.fields.iter().any(|field| field == key) {
            output.insert(key.clone(), value.clone());
        }
    }

    // Dotted paths are copied under their full path.
    for field in projection.fields.iter().filter(|field| field.contains('.')) {
        if let Some(value) = lookup(source, field) {
            output.insert(field.clone(), value.clone());
        }
    }

    Bson::Document(output)
}


/// Builder for constructing [`InMemoryStore`] instances, optionally seeded
/// with documents.
///
/// # Example
///
/// ```ignore
/// use querylayer_memory::InMemoryStore;
/// use querylayer_core::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    seeds: Vec<(String, Vec<Bson>)>,
}

impl InMemoryStoreBuilder {
    /// Appends documents to a collection. Documents without an `_id` get a
    /// fresh ObjectId when the store is built.
    pub fn seed(mut self, collection: impl Into<String>, documents: Vec<Bson>) -> Self {
        self.seeds.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store and loads the seeded collections.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if a seed is not a document.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut collections = StoreMap::new();

        for (collection, documents) in self.seeds {
            let state = collections.entry(collection.clone()).or_default();

            for document in documents {
                let Bson::Document(mut document) = document else {
                    return Err(DocumentStoreError::Initialization(format!(
                        "seed for collection {collection} is not a document"
                    )));
                };

                if !document.contains_key("_id") {
                    let mut keyed = Document::new();
                    keyed.insert("_id", ObjectId::new());
                    for (key, value) in document {
                        keyed.insert(key, value);
                    }
                    document = keyed;
                }

                state.documents.push(Bson::Document(document));
            }

            debug!(collection = %collection, documents = state.documents.len(), "seeded collection");
        }

        Ok(InMemoryStore { store: Arc::new(RwLock::new(collections)) })
    }
}
