//! Filter evaluation and value ordering for in-memory documents.
//!
//! [`DocumentEvaluator`] walks a filter expression against one document.
//! [`compare_values`] defines the total order used for sorting and min/max:
//! missing and null values first, then numbers, strings, documents, arrays,
//! object ids, booleans and datetimes.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use querylayer_core::{
    query::{QueryVisitor, Expr, FieldOp, Sort, SortDirection},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Integers compare exactly as `i64`; an integer meets a float as `f64`, so
/// `Int32(10)`, `Int64(10)` and `Double(10.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Integer(*value as i64),
            Bson::Int64(value) => Comparable::Integer(*value),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Integer(a), Comparable::Integer(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::Integer(a), Comparable::Number(b)) => *a as f64 == *b,
            (Comparable::Number(a), Comparable::Integer(b)) => *a == *b as f64,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Integer(b)) => Some(a.cmp(b)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::Integer(a), Comparable::Number(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Number(a), Comparable::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path (`"publisher.country"`) inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Numeric-aware equality: `Int32(1) == Double(1.0)`.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 1,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::ObjectId(_)) => 5,
        Some(Bson::Boolean(_)) => 6,
        Some(Bson::DateTime(_)) => 7,
        Some(_) => 8,
    }
}

/// Total order over optional BSON values used for sorting.
pub(crate) fn compare_values(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let rank = type_rank(left).cmp(&type_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Some(Bson::ObjectId(a)), Some(Bson::ObjectId(b))) => a.bytes().cmp(&b.bytes()),
        (Some(a), Some(b)) => Comparable::from(a)
            .partial_cmp(&Comparable::from(b))
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Stable sort by the keys in priority order.
pub(crate) fn sort_documents(documents: &mut [Bson], keys: &[Sort]) {
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let left = a.as_document().and_then(|doc| lookup(doc, &key.field));
                let right = b.as_document().and_then(|doc| lookup(doc, &key.field));

                match key.direction {
                    SortDirection::Asc => compare_values(left, right),
                    SortDirection::Desc => compare_values(right, left),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Evaluates `expr` against a document, treating a missing filter as match-all.
    pub fn matches(document: &Bson, expr: Option<&Expr>) -> DocumentStoreResult<bool> {
        match expr {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Bson>,
        expr: Option<&Expr>,
    ) -> DocumentStoreResult<Vec<Bson>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::matches(document, expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn field_value(&self, field: &str) -> Option<&'a Bson> {
        self.document
            .as_document()
            .and_then(|doc| lookup(doc, field))
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.field_value(field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = match self.field_value(field) {
            Some(field_value) => field_value,
            // A missing field satisfies only the negative operators.
            None => return Ok(matches!(op, FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf)),
        };

        match op {
            FieldOp::Eq => Ok(equals(field_value, value)),
            FieldOp::Ne => Ok(!equals(field_value, value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match Comparable::from(field_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    }),
                    None => Ok(false),
                }
            },
            FieldOp::Contains => Ok(contains(field_value, value)),
            FieldOp::NotContains => Ok(!contains(field_value, value)),
            FieldOp::StartsWith => match (field_value, value) {
                (Bson::String(left), Bson::String(right)) => Ok(left.starts_with(right.as_str())),
                _ => Ok(false),
            },
            FieldOp::EndsWith => match (field_value, value) {
                (Bson::String(left), Bson::String(right)) => Ok(left.ends_with(right.as_str())),
                _ => Ok(false),
            },
            FieldOp::AnyOf => Ok(any_of(field_value, value)),
            FieldOp::NoneOf => Ok(!any_of(field_value, value)),
        }
    }
}

// An array field equals a value when the whole array or one of its elements does.
fn equals(field_value: &Bson, value: &Bson) -> bool {
    let needle = Comparable::from(value);

    match Comparable::from(field_value) {
        Comparable::Array(items) => {
            items.iter().any(|item| item == &needle) || Comparable::Array(items) == needle
        },
        whole => whole == needle,
    }
}

fn contains(field_value: &Bson, value: &Bson) -> bool {
    match (Comparable::from(field_value), Comparable::from(value)) {
        (Comparable::Array(array), Comparable::Array(needles)) => needles
            .iter()
            .all(|needle| array.contains(needle)),
        (Comparable::Array(array), needle) => array.iter().any(|item| item == &needle),
        (Comparable::String(left), Comparable::String(right)) => left.contains(right),
        _ => false,
    }
}

fn any_of(field_value: &Bson, value: &Bson) -> bool {
    match (Comparable::from(field_value), Comparable::from(value)) {
        (Comparable::Array(array), Comparable::Array(values)) => values
            .iter()
            .any(|val| array.iter().any(|item| item == val)),
        (Comparable::Array(array), single_value) => array.iter().any(|item| item == &single_value),
        (single_value, Comparable::Array(values)) => values.iter().any(|val| val == &single_value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use querylayer_core::query::Filter;

    fn book() -> Bson {
        Bson::Document(doc! {
            "title": "Dune",
            "published_year": 1965,
            "price": 9.99,
            "in_stock": true,
            "tags": ["classic", "space"],
            "publisher": { "country": "US" },
        })
    }

    fn eval(expr: Expr) -> bool {
        DocumentEvaluator::new(&book()).evaluate(&expr).unwrap()
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(eval(Filter::eq("published_year", 1965.0)));
        assert!(eval(Filter::gt("published_year", 1960i64)));
        assert!(!eval(Filter::lt("price", 9)));
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        assert!(eval(Filter::eq("publisher.country", "US")));
        assert!(!eval(Filter::exists("publisher.city")));
    }

    #[test]
    fn missing_fields_only_satisfy_negations() {
        assert!(!eval(Filter::eq("genre", "Fiction")));
        assert!(eval(Filter::ne("genre", "Fiction")));
        assert!(eval(Filter::none_of("genre", vec!["Fiction"])));
    }

    #[test]
    fn arrays_support_membership() {
        assert!(eval(Filter::contains("tags", "space")));
        assert!(eval(Filter::contains("tags", vec!["space", "classic"])));
        assert!(!eval(Filter::contains("tags", vec!["space", "poetry"])));
        assert!(eval(Filter::any_of("tags", vec!["poetry", "classic"])));
        assert!(eval(Filter::any_of("title", vec!["Emma", "Dune"])));
        assert!(!eval(Filter::none_of("tags", vec!["classic"])));
    }

    #[test]
    fn equality_reaches_into_arrays() {
        assert!(eval(Filter::eq("tags", "space")));
        assert!(eval(Filter::eq("tags", vec!["classic", "space"])));
        assert!(!eval(Filter::eq("tags", vec!["space", "classic"])));
        assert!(!eval(Filter::ne("tags", "classic")));
        assert!(eval(Filter::ne("tags", "poetry")));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let big = Bson::Int64(1 << 62);
        let next = Bson::Int64((1 << 62) + 1);

        assert!(!values_equal(&big, &next));
        assert_eq!(compare_values(Some(&big), Some(&next)), Ordering::Less);
        assert!(values_equal(&Bson::Int32(10), &Bson::Double(10.0)));
    }

    #[test]
    fn mismatched_types_never_order() {
        assert!(!eval(Filter::gt("title", 5)));
        assert!(!eval(Filter::lt("title", 5)));
    }

    #[test]
    fn sort_order_puts_missing_first_then_numbers_then_strings() {
        let number = Bson::Int32(3);
        let string = Bson::String("a".into());

        assert_eq!(compare_values(None, Some(&number)), Ordering::Less);
        assert_eq!(compare_values(Some(&number), Some(&string)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&Bson::Double(2.5)), Some(&Bson::Int64(3))),
            Ordering::Less
        );
    }
}
