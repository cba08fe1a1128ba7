//! Error types and result types for document store operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//! Finding nothing is never an error: queries that match no documents return
//! an empty sequence.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// Backends classify their native failures into these variants and otherwise pass the
/// store's message through untouched.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The store connection could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A filter, pipeline or index specification was rejected by the store.
    #[error("Invalid query specification: {0}")]
    QuerySpec(String),
    /// An index with the same name or keys already exists with a different definition.
    #[error("Index conflict: {0}")]
    IndexConflict(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or configuration.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
