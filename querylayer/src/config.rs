//! Startup configuration for the `bookstore` binary.
//!
//! Every flag falls back to an environment variable where one is listed, then
//! to the defaults of the original bookstore deployment.

use clap::{Parser, ValueEnum};
use tracing::info;

use querylayer_core::{
    backend::StoreBackendBuilder,
    error::{DocumentStoreError, DocumentStoreResult},
    page::PaginationParams,
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};
use querylayer_memory::InMemoryStore;

use crate::bookstore;

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// In-memory store seeded with the bundled catalogue
    Memory,
    /// MongoDB server at `--uri`
    Mongodb,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "bookstore", about = "Runs the bookstore queries, aggregations and index checks")]
pub struct Config {
    /// Store backend
    #[arg(long, value_enum, env = "QUERYLAYER_BACKEND", default_value_t = BackendKind::Memory)]
    pub backend: BackendKind,

    /// MongoDB connection string
    #[arg(long, env = "MONGODB_URI", default_value = DEFAULT_URI)]
    pub uri: String,

    /// Database holding the collection
    #[arg(long, env = "QUERYLAYER_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// Collection to query
    #[arg(long, default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    /// Page shown by the pagination query (1-indexed)
    #[arg(long, default_value_t = 2)]
    pub page: usize,

    /// Documents per page
    #[arg(long, default_value_t = 5)]
    pub page_size: usize,
}

impl Config {
    /// The pagination window of the report.
    ///
    /// # Errors
    ///
    /// Page numbers and sizes start at 1; zero is an `Initialization` error.
    pub fn pagination(&self) -> DocumentStoreResult<PaginationParams> {
        if self.page == 0 || self.page_size == 0 {
            return Err(DocumentStoreError::Initialization(format!(
                "page and page size must be at least 1 (got page {} of size {})",
                self.page, self.page_size
            )));
        }

        Ok(PaginationParams::new(self.page, self.page_size))
    }

    /// Connects the configured backend.
    pub async fn open_store(&self) -> DocumentStoreResult<DynDocumentStore> {
        match self.backend {
            BackendKind::Memory => {
                let backend = InMemoryStore::builder()
                    .seed(self.collection.clone(), bookstore::catalogue()?)
                    .build()
                    .await?;

                info!(collection = %self.collection, "using in-memory store");
                Ok(DocumentStore::new(backend).into_dyn())
            }
            BackendKind::Mongodb => self.open_mongodb().await,
        }
    }

    #[cfg(feature = "mongodb")]
    async fn open_mongodb(&self) -> DocumentStoreResult<DynDocumentStore> {
        let backend = querylayer_mongodb::MongoDbStore::builder(&self.uri, &self.database)
            .build()
            .await?;

        Ok(DocumentStore::new(backend).into_dyn())
    }

    #[cfg(not(feature = "mongodb"))]
    async fn open_mongodb(&self) -> DocumentStoreResult<DynDocumentStore> {
        Err(DocumentStoreError::Initialization(
            "the mongodb backend is not compiled in; rebuild with `--features mongodb`".to_string(),
        ))
    }
}
