//! Convenient re-exports of commonly used types from querylayer.
//!
//! ```ignore
//! use querylayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits
//! - Store backends, builders and stores
//! - Query, pipeline and index construction
//! - Collection interfaces
//! - Error types

pub use querylayer_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{Collection, DynCollection, QueryRunner, TypedCollection},
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{ExecutionStats, IndexAck, IndexSpec, PlanStage},
    page::{Page, PaginationParams},
    pipeline::{Accumulator, Expression, GroupSpec, Pipeline, ProjectField, Stage},
    query::{Expr, FieldOp, Filter, Projection, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};
