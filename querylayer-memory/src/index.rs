//! Per-collection index catalogue and the explain planner.
//!
//! The in-memory store keeps no index structures: an index is a catalogued
//! definition that the planner consults when simulating an execution plan.

use std::{cmp::Ordering, time::Instant};
use bson::Bson;

use querylayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    index::{ExecutionStats, IndexAck, IndexSpec, PlanStage},
    query::{Expr, FieldOp},
};

use crate::evaluator::{DocumentEvaluator, compare_values, lookup};


#[derive(Debug, Default, Clone)]
pub(crate) struct IndexCatalog {
    indexes: Vec<IndexSpec>,
}

impl IndexCatalog {
    /// Adds `spec` to the catalogue, validating it against existing indexes
    /// and, for unique indexes, against the stored documents.
    pub fn register(&mut self, spec: IndexSpec, documents: &[Bson]) -> DocumentStoreResult<IndexAck> {
        if spec.keys.is_empty() {
            return Err(DocumentStoreError::QuerySpec(
                "an index needs at least one key".to_string(),
            ));
        }

        let name = spec.name();

        if let Some(existing) = self.find(&name) {
            if existing.same_definition(&spec) {
                return Ok(IndexAck { name, created: false });
            }

            return Err(DocumentStoreError::IndexConflict(format!(
                "an index named {name} already exists with different options"
            )));
        }

        if let Some(existing) = self.indexes.iter().find(|existing| existing.keys == spec.keys) {
            return Err(DocumentStoreError::IndexConflict(format!(
                "index {} already covers the keys requested for {name}",
                existing.name()
            )));
        }

        if spec.unique {
            check_unique(&spec, documents)?;
        }

        self.indexes.push(IndexSpec { name: Some(name.clone()), ..spec });

        Ok(IndexAck { name, created: true })
    }

    pub fn remove(&mut self, name: &str) -> DocumentStoreResult<()> {
        match self.indexes.iter().position(|index| index.name() == name) {
            Some(position) => {
                self.indexes.remove(position);
                Ok(())
            },
            None => Err(DocumentStoreError::QuerySpec(format!("index not found with name [{name}]"))),
        }
    }

    pub fn specs(&self) -> Vec<IndexSpec> {
        self.indexes.clone()
    }

    fn find(&self, name: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|index| index.name() == name)
    }

    /// The first catalogued index whose leading key is constrained by a
    /// top-level equality, range or membership predicate of `filter`.
    fn plan<'a>(&'a self, filter: Option<&'a Expr>) -> Option<(&'a IndexSpec, &'a Expr)> {
        let conjuncts = filter.map(Expr::conjuncts).unwrap_or_default();

        conjuncts.into_iter().find_map(|conjunct| match conjunct {
            Expr::Field { field, op, .. } if seekable(op) => self
                .indexes
                .iter()
                .find(|index| index.leading_field() == Some(field.as_str()))
                .map(|index| (index, conjunct)),
            _ => None,
        })
    }

    /// Simulates the winning plan for `filter` over `documents`.
    pub fn explain(&self, filter: Option<&Expr>, documents: &[Bson]) -> DocumentStoreResult<ExecutionStats> {
        let started = Instant::now();

        let mut n_returned = 0u64;
        for document in documents {
            if DocumentEvaluator::matches(document, filter)? {
                n_returned += 1;
            }
        }

        let stats = match self.plan(filter) {
            Some((index, predicate)) => {
                let mut keys_examined = 0u64;
                for document in documents {
                    if DocumentEvaluator::matches(document, Some(predicate))? {
                        keys_examined += 1;
                    }
                }

                ExecutionStats {
                    n_returned,
                    total_docs_examined: keys_examined,
                    total_keys_examined: keys_examined,
                    execution_time_millis: 0,
                    stage: PlanStage::IxScan,
                    index_name: Some(index.name()),
                }
            },
            None => ExecutionStats {
                n_returned,
                total_docs_examined: documents.len() as u64,
                total_keys_examined: 0,
                execution_time_millis: 0,
                stage: PlanStage::CollScan,
                index_name: None,
            },
        };

        Ok(ExecutionStats {
            execution_time_millis: started.elapsed().as_millis() as u64,
            ..stats
        })
    }
}

fn seekable(op: &FieldOp) -> bool {
    matches!(
        op,
        FieldOp::Eq | FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte | FieldOp::AnyOf
    )
}

fn check_unique(spec: &IndexSpec, documents: &[Bson]) -> DocumentStoreResult<()> {
    let mut keys = documents
        .iter()
        .map(|document| {
            spec.keys
                .iter()
                .map(|(field, _)| document.as_document().and_then(|doc| lookup(doc, field)))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    keys.sort_by(|a, b| compare_keys(a, b));

    match keys.windows(2).find(|pair| compare_keys(&pair[0], &pair[1]) == Ordering::Equal) {
        Some(pair) => Err(DocumentStoreError::Backend(format!(
            "E11000 duplicate key error building index {}: {:?}",
            spec.name(),
            pair[0]
        ))),
        None => Ok(()),
    }
}

fn compare_keys(left: &[Option<&Bson>], right: &[Option<&Bson>]) -> Ordering {
    left.iter()
        .zip(right)
        .map(|(a, b)| compare_values(*a, *b))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use querylayer_core::query::{Filter, SortDirection};

    fn books() -> Vec<Bson> {
        vec![
            Bson::Document(doc! { "title": "Dune", "author": "Herbert", "published_year": 1965 }),
            Bson::Document(doc! { "title": "Emma", "author": "Austen", "published_year": 1815 }),
            Bson::Document(doc! { "title": "Persuasion", "author": "Austen", "published_year": 1817 }),
        ]
    }

    #[test]
    fn identical_requests_are_acknowledged_once() {
        let mut catalog = IndexCatalog::default();

        let first = catalog.register(IndexSpec::on("title"), &books()).unwrap();
        let second = catalog.register(IndexSpec::on("title"), &books()).unwrap();

        assert_eq!(first, IndexAck { name: "title_1".into(), created: true });
        assert_eq!(second, IndexAck { name: "title_1".into(), created: false });
        assert_eq!(catalog.specs().len(), 1);
    }

    #[test]
    fn conflicting_definitions_are_rejected() {
        let mut catalog = IndexCatalog::default();
        catalog.register(IndexSpec::on("title"), &books()).unwrap();

        assert!(matches!(
            catalog.register(IndexSpec::on("title").unique().named("title_1"), &books()),
            Err(DocumentStoreError::IndexConflict(_))
        ));
        assert!(matches!(
            catalog.register(IndexSpec::on("title").named("by_title"), &books()),
            Err(DocumentStoreError::IndexConflict(_))
        ));
    }

    #[test]
    fn unique_index_rejects_existing_duplicates() {
        let mut catalog = IndexCatalog::default();

        assert!(catalog.register(IndexSpec::on("title").unique(), &books()).is_ok());
        assert!(matches!(
            catalog.register(IndexSpec::on("author").unique(), &books()),
            Err(DocumentStoreError::Backend(_))
        ));
    }

    #[test]
    fn empty_keys_are_a_spec_error() {
        let spec = IndexSpec { keys: vec![], unique: false, name: None };

        assert!(matches!(
            IndexCatalog::default().register(spec, &[]),
            Err(DocumentStoreError::QuerySpec(_))
        ));
    }

    #[test]
    fn only_the_leading_key_drives_index_selection() {
        let mut catalog = IndexCatalog::default();
        catalog
            .register(IndexSpec::on("author").key("published_year", SortDirection::Asc), &books())
            .unwrap();

        let by_author = catalog.explain(Some(&Filter::eq("author", "Austen")), &books()).unwrap();
        assert_eq!(by_author.stage, PlanStage::IxScan);
        assert_eq!(by_author.index_name.as_deref(), Some("author_1_published_year_1"));
        assert_eq!(by_author.total_keys_examined, 2);
        assert_eq!(by_author.n_returned, 2);

        let by_year = catalog.explain(Some(&Filter::gt("published_year", 1816)), &books()).unwrap();
        assert_eq!(by_year.stage, PlanStage::CollScan);
        assert_eq!(by_year.total_docs_examined, 3);
        assert_eq!(by_year.total_keys_examined, 0);
    }

    #[test]
    fn removing_an_unknown_index_fails() {
        assert!(IndexCatalog::default().remove("title_1").is_err());
    }
}
