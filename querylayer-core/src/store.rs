//! Document store interface: owning wrappers around a backend.
//!
//! - [`DocumentStore`] - Store bound to a concrete backend type
//! - [`DynDocumentStore`] - Store over a boxed backend chosen at runtime
//!
//! A store owns the connection for one batch of operations. Use `session` to
//! run the batch and release the connection on every exit path:
//!
//! ```ignore
//! use querylayer_core::{collection::QueryRunner, query::Query};
//!
//! let store = DocumentStore::new(backend);
//! let total = store
//!     .session(async |store| {
//!         store.collection("books").count(None).await
//!     })
//!     .await?;
//! ```

use tracing::{debug, warn};

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, DynCollection, TypedCollection},
    document::Document,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Gets an untyped collection handle with the given name.
    pub fn collection(&self, name: &str) -> Collection<'_, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Gets a typed collection handle named after `D::collection_name()`.
    pub fn typed_collection<D: Document>(&self) -> TypedCollection<'_, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(&self.backend).await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }

    /// Runs `f` against the store, then shuts the store down whatever `f` returned.
    ///
    /// # Errors
    ///
    /// Returns the error of `f` if it failed, otherwise the shutdown error if
    /// releasing the backend failed.
    pub async fn session<T, F>(self, f: F) -> DocumentStoreResult<T>
    where
        F: AsyncFnOnce(&Self) -> DocumentStoreResult<T>,
    {
        let outcome = f(&self).await;
        let closed = self.shutdown().await;

        settle(outcome, closed)
    }
}

#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend trait object.
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets an untyped collection handle with the given name.
    pub fn collection(&self, name: &str) -> DynCollection<'_> {
        Collection::new(name.to_string(), &*self.backend)
    }

    /// Gets a typed collection handle named after `D::collection_name()`.
    pub fn typed_collection<D: Document>(&self) -> TypedCollection<'_, dyn DynStoreBackend, D> {
        TypedCollection::new(D::collection_name().to_string(), &*self.backend)
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await
    }

    /// Runs `f` against the store, then shuts the store down whatever `f` returned.
    ///
    /// See [`DocumentStore::session`].
    pub async fn session<T, F>(self, f: F) -> DocumentStoreResult<T>
    where
        F: AsyncFnOnce(&Self) -> DocumentStoreResult<T>,
    {
        let outcome = f(&self).await;
        let closed = self.shutdown().await;

        settle(outcome, closed)
    }
}

/// Conversion trait for converting a document store into a dynamic owned store.
pub trait IntoDynDocumentStore {
    /// Converts this store into a dynamic owned store.
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::new(Box::new(self.backend))
    }
}

impl IntoDynDocumentStore for DynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore {
        self
    }
}

// The session body's error takes precedence over the shutdown error.
fn settle<T>(
    outcome: DocumentStoreResult<T>,
    closed: DocumentStoreResult<()>,
) -> DocumentStoreResult<T> {
    match (outcome, closed) {
        (Ok(value), Ok(())) => {
            debug!("session closed");
            Ok(value)
        }
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(shutdown_err)) => {
            warn!(error = %shutdown_err, "shutdown failed after session error");
            Err(err)
        }
    }
}
