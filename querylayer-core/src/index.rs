//! Index directives and query execution statistics.
//!
//! An [`IndexSpec`] only *requests* an index; the persistent structure is
//! owned and maintained by the store. [`ExecutionStats`] reports how the store
//! executed a filter, mirroring the fields of MongoDB's `executionStats`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::SortDirection;

/// A request for a single- or multi-field index.
///
/// # Example
///
/// ```ignore
/// use querylayer_core::{index::IndexSpec, query::SortDirection};
///
/// let by_title = IndexSpec::on("title");
/// let by_author_year = IndexSpec::on("author").key("published_year", SortDirection::Asc);
///
/// assert_eq!(by_author_year.name(), "author_1_published_year_1");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Indexed fields in key order.
    pub keys: Vec<(String, SortDirection)>,
    /// Whether the index rejects duplicate keys.
    pub unique: bool,
    /// Explicit index name. Generated from the keys when absent.
    pub name: Option<String>,
}

impl IndexSpec {
    /// An ascending index on a single field.
    pub fn on(field: impl Into<String>) -> Self {
        IndexSpec {
            keys: vec![(field.into(), SortDirection::Asc)],
            unique: false,
            name: None,
        }
    }

    /// An ascending compound index over the fields, in order.
    pub fn ascending<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexSpec {
            keys: fields
                .into_iter()
                .map(|field| (field.into(), SortDirection::Asc))
                .collect(),
            unique: false,
            name: None,
        }
    }

    /// Appends a key.
    pub fn key(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The index name: the explicit one, or `field_direction` pairs joined by `_`.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .keys
                .iter()
                .map(|(field, direction)| format!("{}_{}", field, direction.signum()))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// The first key field, which is the only one usable for a single-field lookup.
    pub fn leading_field(&self) -> Option<&str> {
        self.keys.first().map(|(field, _)| field.as_str())
    }

    /// Whether both specs describe the same index structure, ignoring the name.
    pub fn same_definition(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys && self.unique == other.unique
    }
}

/// Acknowledgment of an index request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAck {
    /// Name of the (new or existing) index.
    pub name: String,
    /// False when an identical index already existed.
    pub created: bool,
}

/// The access path chosen for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanStage {
    /// Every document was scanned.
    CollScan,
    /// An index was walked.
    IxScan,
    /// Any other store-specific stage.
    Other(String),
}

impl From<String> for PlanStage {
    fn from(value: String) -> Self {
        match value.as_str() {
            "COLLSCAN" => PlanStage::CollScan,
            "IXSCAN" => PlanStage::IxScan,
            _ => PlanStage::Other(value),
        }
    }
}

impl From<PlanStage> for String {
    fn from(value: PlanStage) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStage::CollScan => f.write_str("COLLSCAN"),
            PlanStage::IxScan => f.write_str("IXSCAN"),
            PlanStage::Other(stage) => f.write_str(stage),
        }
    }
}

/// How the store executed a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub n_returned: u64,
    pub total_docs_examined: u64,
    pub total_keys_examined: u64,
    pub execution_time_millis: u64,
    pub stage: PlanStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
}
