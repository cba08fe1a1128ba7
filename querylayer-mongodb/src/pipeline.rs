//! Aggregation pipeline translation to MongoDB stage documents.

use bson::{Bson, Document, doc};

use querylayer_core::{
    error::DocumentStoreResult,
    pipeline::{Accumulator, Expression, GroupSpec, Pipeline, ProjectField, Stage},
};

use crate::query::{MongoQueryTranslator, sort_document};


pub(crate) struct MongoPipelineTranslator;

impl MongoPipelineTranslator {
    pub fn translate(pipeline: &Pipeline) -> DocumentStoreResult<Vec<Document>> {
        pipeline
            .stages()
            .iter()
            .map(Self::stage)
            .collect()
    }

    fn stage(stage: &Stage) -> DocumentStoreResult<Document> {
        Ok(match stage {
            Stage::Match(expr) => doc! { "$match": MongoQueryTranslator::filter(Some(expr))? },
            Stage::Group(spec) => doc! { "$group": group(spec) },
            Stage::Sort(keys) => doc! { "$sort": sort_document(keys) },
            Stage::Skip(count) => doc! { "$skip": *count as i64 },
            Stage::Limit(count) => doc! { "$limit": *count as i64 },
            Stage::Project(fields) => doc! {
                "$project": fields
                    .iter()
                    .map(|(name, field)| {
                        let value = match field {
                            ProjectField::Include => Bson::Int32(1),
                            ProjectField::Exclude => Bson::Int32(0),
                            ProjectField::Computed(expr) => expression(expr),
                        };
                        (name.clone(), value)
                    })
                    .collect::<Document>(),
            },
        })
    }
}

fn group(spec: &GroupSpec) -> Document {
    let mut group = doc! { "_id": expression(&spec.key) };

    for (name, accumulator) in &spec.accumulators {
        let reduced = match accumulator {
            // An Int64 addend makes the server tally as Int64.
            Accumulator::Count => doc! { "$sum": 1i64 },
            Accumulator::Sum(expr) => doc! { "$sum": expression(expr) },
            Accumulator::Avg(expr) => doc! { "$avg": expression(expr) },
            Accumulator::Min(expr) => doc! { "$min": expression(expr) },
            Accumulator::Max(expr) => doc! { "$max": expression(expr) },
        };
        group.insert(name.clone(), reduced);
    }

    group
}

/// Translates an expression into MongoDB aggregation expression syntax.
///
/// Literals are wrapped in `$literal` so that values such as `1` or `"$x"`
/// are never read as projection flags or field paths.
pub(crate) fn expression(expr: &Expression) -> Bson {
    match expr {
        Expression::Field(path) => Bson::String(format!("${path}")),
        Expression::Literal(value) => Bson::Document(doc! { "$literal": value.clone() }),
        Expression::Add(operands) => operator("$add", operands.iter()),
        Expression::Multiply(operands) => operator("$multiply", operands.iter()),
        Expression::Subtract(left, right) => operator("$subtract", [&**left, &**right]),
        Expression::Divide(left, right) => operator("$divide", [&**left, &**right]),
        Expression::Mod(left, right) => operator("$mod", [&**left, &**right]),
        Expression::FloorDiv(left, right) => Bson::Document(doc! {
            "$toLong": { "$floor": operator("$divide", [&**left, &**right]) },
        }),
        Expression::Floor(operand) => Bson::Document(doc! { "$floor": expression(operand) }),
        Expression::Document(fields) => Bson::Document(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), expression(field)))
                .collect(),
        ),
    }
}

fn operator<'a>(name: &str, operands: impl IntoIterator<Item = &'a Expression>) -> Bson {
    let operands = operands
        .into_iter()
        .map(expression)
        .collect::<Vec<_>>();

    Bson::Document(doc! { name: operands })
}
