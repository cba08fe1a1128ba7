//! Filter translation from querylayer expressions to MongoDB query syntax.
//!
//! String operators translate to anchored, escaped regular expressions so
//! that matching is literal and case-sensitive, like the in-memory backend.

use bson::{Document, Bson, doc};

use querylayer_core::{
    query::{QueryVisitor, Expr, FieldOp, Projection, Sort},
    error::DocumentStoreError,
};


/// Translates query expressions into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter; `None` selects every document.
    pub fn filter(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape(s) } },
                    Bson::Array(arr) => doc! { "$not": { "$all": arr } },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape(s)) },
                    _ => return Err(DocumentStoreError::QuerySpec("StartsWith operator requires a string value".to_string())),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape(s)) },
                    _ => return Err(DocumentStoreError::QuerySpec("EndsWith operator requires a string value".to_string())),
                },
                FieldOp::AnyOf => doc! { "$in": as_array(value) },
                FieldOp::NoneOf => doc! { "$nin": as_array(value) },
            }
        })
    }
}

// `$in` and `$nin` require an array operand.
fn as_array(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        other => Bson::Array(vec![other.clone()]),
    }
}

fn escape(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());

    for c in pattern.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// `{ field: 1 | -1 }` in priority order.
pub(crate) fn sort_document(keys: &[Sort]) -> Document {
    keys.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.signum())))
        .collect()
}

/// An inclusion projection that hides `_id` unless it was requested.
pub(crate) fn projection_document(projection: &Projection) -> Document {
    let mut document = projection
        .fields
        .iter()
        .map(|field| (field.clone(), Bson::Int32(1)))
        .collect::<Document>();

    if !projection.include_id {
        document.insert("_id", 0);
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use querylayer_core::query::Filter;

    #[test]
    fn conjunctions_translate_to_and() {
        let filter = Filter::and([Filter::eq("in_stock", true), Filter::gt("published_year", 2010)]);

        assert_eq!(
            MongoQueryTranslator::filter(Some(&filter)).unwrap(),
            doc! {
                "$and": [
                    { "in_stock": { "$eq": true } },
                    { "published_year": { "$gt": 2010 } },
                ]
            }
        );
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(None).unwrap(), doc! {});
    }

    #[test]
    fn string_operators_are_escaped_literals() {
        assert_eq!(
            MongoQueryTranslator::filter(Some(&Filter::starts_with("title", "C++ (2nd"))).unwrap(),
            doc! { "title": { "$regex": "^C\\+\\+ \\(2nd" } }
        );
    }

    #[test]
    fn membership_wraps_scalars() {
        assert_eq!(
            MongoQueryTranslator::filter(Some(&Filter::any_of("genre", "Fiction"))).unwrap(),
            doc! { "genre": { "$in": ["Fiction"] } }
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            MongoQueryTranslator::filter(Some(&Filter::eq("genre", "Fiction").not())).unwrap(),
            doc! { "$nor": [{ "genre": { "$eq": "Fiction" } }] }
        );
    }

    #[test]
    fn projections_hide_the_store_key_by_default() {
        assert_eq!(
            projection_document(&Projection::fields(["title", "author"])),
            doc! { "title": 1, "author": 1, "_id": 0 }
        );
        assert_eq!(
            projection_document(&Projection::fields(["title"]).with_id()),
            doc! { "title": 1 }
        );
    }

    #[test]
    fn listed_store_key_is_not_hidden() {
        assert_eq!(
            projection_document(&Projection::fields(["_id", "title"])),
            doc! { "_id": 1, "title": 1 }
        );
    }

    #[test]
    fn sorts_keep_priority_order() {
        assert_eq!(
            sort_document(&[Sort::asc("author"), Sort::desc("published_year")]),
            doc! { "author": 1, "published_year": -1 }
        );
    }
}
