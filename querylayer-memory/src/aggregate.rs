//! Aggregation pipeline execution over in-memory documents.
//!
//! Stages run in order, each consuming the output of the previous one. A
//! failing stage aborts the whole pipeline; no partial output is returned.

use bson::{Bson, Document};

use querylayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::{Accumulator, Expression, GroupSpec, Pipeline, ProjectField, Stage},
};

use crate::evaluator::{DocumentEvaluator, compare_values, lookup, sort_documents, values_equal};


pub(crate) struct PipelineExecutor;

impl PipelineExecutor {
    pub fn run(pipeline: Pipeline, documents: Vec<Bson>) -> DocumentStoreResult<Vec<Bson>> {
        pipeline
            .into_iter()
            .try_fold(documents, |documents, stage| Self::apply(stage, documents))
    }

    fn apply(stage: Stage, documents: Vec<Bson>) -> DocumentStoreResult<Vec<Bson>> {
        match stage {
            Stage::Match(expr) => DocumentEvaluator::filter_documents(&documents, Some(&expr)),
            Stage::Group(spec) => group(&spec, &documents),
            Stage::Sort(keys) => {
                let mut documents = documents;
                sort_documents(&mut documents, &keys);
                Ok(documents)
            },
            Stage::Skip(count) => Ok(documents.into_iter().skip(count).collect()),
            Stage::Limit(0) => Err(DocumentStoreError::QuerySpec(
                "the limit must be positive".to_string(),
            )),
            Stage::Limit(count) => Ok(documents.into_iter().take(count).collect()),
            Stage::Project(fields) => project(&fields, documents),
        }
    }
}

fn group(spec: &GroupSpec, documents: &[Bson]) -> DocumentStoreResult<Vec<Bson>> {
    // Partitions keep first-appearance order.
    let mut partitions: Vec<(Bson, Vec<&Bson>)> = Vec::new();

    for document in documents {
        let key = evaluate(&spec.key, document)?;

        match partitions.iter().position(|(existing, _)| values_equal(existing, &key)) {
            Some(position) => partitions[position].1.push(document),
            None => partitions.push((key, vec![document])),
        }
    }

    partitions
        .into_iter()
        .map(|(key, members)| {
            let mut output = Document::new();
            output.insert("_id", key);

            for (name, accumulator) in &spec.accumulators {
                output.insert(name.clone(), accumulate(accumulator, &members)?);
            }

            Ok(Bson::Document(output))
        })
        .collect()
}

fn accumulate(accumulator: &Accumulator, members: &[&Bson]) -> DocumentStoreResult<Bson> {
    match accumulator {
        Accumulator::Count => Ok(Bson::Int64(members.len() as i64)),
        Accumulator::Sum(expr) => {
            let mut total = Number::Int32(0);

            for member in members {
                if let Some(value) = Number::from_bson(&evaluate(expr, member)?) {
                    total = total.add(value);
                }
            }

            Ok(total.into())
        },
        Accumulator::Avg(expr) => {
            let mut sum = 0.0;
            let mut count = 0usize;

            for member in members {
                if let Some(value) = Number::from_bson(&evaluate(expr, member)?) {
                    sum += value.as_f64();
                    count += 1;
                }
            }

            Ok(match count {
                0 => Bson::Null,
                _ => Bson::Double(sum / count as f64),
            })
        },
        Accumulator::Min(expr) => extreme(expr, members, std::cmp::Ordering::Less),
        Accumulator::Max(expr) => extreme(expr, members, std::cmp::Ordering::Greater),
    }
}

// Nulls and missing values are ignored; an all-null partition yields null.
fn extreme(
    expr: &Expression,
    members: &[&Bson],
    wanted: std::cmp::Ordering,
) -> DocumentStoreResult<Bson> {
    let mut best: Option<Bson> = None;

    for member in members {
        let value = evaluate(expr, member)?;
        if matches!(value, Bson::Null) {
            continue;
        }

        let replace = match &best {
            Some(current) => compare_values(Some(&value), Some(current)) == wanted,
            None => true,
        };
        if replace {
            best = Some(value);
        }
    }

    Ok(best.unwrap_or(Bson::Null))
}

fn project(fields: &[(String, ProjectField)], documents: Vec<Bson>) -> DocumentStoreResult<Vec<Bson>> {
    if fields.is_empty() {
        return Err(DocumentStoreError::QuerySpec(
            "a projection must name at least one field".to_string(),
        ));
    }

    let includes = fields
        .iter()
        .any(|(name, field)| name != "_id" && !matches!(field, ProjectField::Exclude));
    let excludes = fields
        .iter()
        .any(|(name, field)| name != "_id" && matches!(field, ProjectField::Exclude));

    if includes && excludes {
        return Err(DocumentStoreError::QuerySpec(
            "a projection cannot mix included and excluded fields".to_string(),
        ));
    }

    let inclusive = includes
        || fields
            .iter()
            .any(|(_, field)| !matches!(field, ProjectField::Exclude));

    documents
        .into_iter()
        .map(|document| {
            if inclusive {
                include_fields(fields, &document)
            } else {
                Ok(exclude_fields(fields, document))
            }
        })
        .collect()
}

fn include_fields(fields: &[(String, ProjectField)], document: &Bson) -> DocumentStoreResult<Bson> {
    let mut output = Document::new();

    let keep_id = !fields
        .iter()
        .any(|(name, field)| name == "_id" && matches!(field, ProjectField::Exclude));
    let id_specified = fields.iter().any(|(name, _)| name == "_id");

    if keep_id && !id_specified {
        if let Some(id) = document.as_document().and_then(|doc| doc.get("_id")) {
            output.insert("_id", id.clone());
        }
    }

    for (name, field) in fields {
        match field {
            ProjectField::Include => {
                if let Some(value) = document.as_document().and_then(|doc| lookup(doc, name)) {
                    output.insert(name.clone(), value.clone());
                }
            },
            ProjectField::Computed(expr) => {
                output.insert(name.clone(), evaluate(expr, document)?);
            },
            ProjectField::Exclude => {},
        }
    }

    Ok(Bson::Document(output))
}

fn exclude_fields(fields: &[(String, ProjectField)], document: Bson) -> Bson {
    match document {
        Bson::Document(mut doc) => {
            for (name, _) in fields {
                doc.remove(name);
            }
            Bson::Document(doc)
        },
        other => other,
    }
}

/// Evaluates an expression against one document. Missing fields and null
/// operands evaluate to null.
fn evaluate(expr: &Expression, document: &Bson) -> DocumentStoreResult<Bson> {
    match expr {
        Expression::Field(path) => Ok(document
            .as_document()
            .and_then(|doc| lookup(doc, path))
            .cloned()
            .unwrap_or(Bson::Null)),
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Document(fields) => {
            let mut output = Document::new();
            for (name, field) in fields {
                output.insert(name.clone(), evaluate(field, document)?);
            }
            Ok(Bson::Document(output))
        },
        Expression::Add(operands) => fold(operands, document, Number::add),
        Expression::Multiply(operands) => fold(operands, document, Number::mul),
        Expression::Subtract(left, right) => binary(left, right, document, |a, b| Ok(a.sub(b))),
        Expression::Divide(left, right) => binary(left, right, document, Number::div),
        Expression::Mod(left, right) => binary(left, right, document, Number::rem),
        Expression::FloorDiv(left, right) => binary(left, right, document, Number::floor_div),
        Expression::Floor(operand) => match evaluate(operand, document)? {
            Bson::Null => Ok(Bson::Null),
            value => Ok(numeric(&value)?.floor().into()),
        },
    }
}

fn fold(
    operands: &[Expression],
    document: &Bson,
    op: fn(Number, Number) -> Number,
) -> DocumentStoreResult<Bson> {
    let mut acc: Option<Number> = None;

    for operand in operands {
        let value = evaluate(operand, document)?;
        if matches!(value, Bson::Null) {
            return Ok(Bson::Null);
        }

        let value = numeric(&value)?;
        acc = Some(match acc {
            Some(acc) => op(acc, value),
            None => value,
        });
    }

    Ok(acc.map(Bson::from).unwrap_or(Bson::Null))
}

fn binary(
    left: &Expression,
    right: &Expression,
    document: &Bson,
    op: fn(Number, Number) -> DocumentStoreResult<Number>,
) -> DocumentStoreResult<Bson> {
    let left = evaluate(left, document)?;
    let right = evaluate(right, document)?;

    if matches!(left, Bson::Null) || matches!(right, Bson::Null) {
        return Ok(Bson::Null);
    }

    Ok(op(numeric(&left)?, numeric(&right)?)?.into())
}

fn numeric(value: &Bson) -> DocumentStoreResult<Number> {
    Number::from_bson(value).ok_or_else(|| {
        DocumentStoreError::QuerySpec(format!(
            "arithmetic operand must be numeric, found {:?}",
            value.element_type()
        ))
    })
}

/// A numeric BSON value. Integer arithmetic stays integral and widens to
/// `Int64` when a result leaves the `Int32` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int32(i32),
    Int64(i64),
    Double(f64),
}

impl Number {
    pub fn from_bson(value: &Bson) -> Option<Number> {
        match value {
            Bson::Int32(value) => Some(Number::Int32(*value)),
            Bson::Int64(value) => Some(Number::Int64(*value)),
            Bson::Double(value) => Some(Number::Double(*value)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int32(value) => value as f64,
            Number::Int64(value) => value as f64,
            Number::Double(value) => value,
        }
    }

    fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int32(value) => Some(value as i64),
            Number::Int64(value) => Some(value),
            Number::Double(_) => None,
        }
    }

    fn narrow(self, other: Number) -> bool {
        matches!((self, other), (Number::Int32(_), Number::Int32(_)))
    }

    fn integer(value: i64, narrow: bool) -> Number {
        match i32::try_from(value) {
            Ok(small) if narrow => Number::Int32(small),
            _ => Number::Int64(value),
        }
    }

    // Integer overflow falls back to floating point.
    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => match int_op(a, b) {
                Some(value) => Number::integer(value, self.narrow(other)),
                None => Number::Double(float_op(a as f64, b as f64)),
            },
            _ => Number::Double(float_op(self.as_f64(), other.as_f64())),
        }
    }

    pub fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    pub fn div(self, other: Number) -> DocumentStoreResult<Number> {
        if other.as_f64() == 0.0 {
            return Err(division_by_zero());
        }

        Ok(Number::Double(self.as_f64() / other.as_f64()))
    }

    pub fn rem(self, other: Number) -> DocumentStoreResult<Number> {
        if other.as_f64() == 0.0 {
            return Err(division_by_zero());
        }

        Ok(self.combine(other, i64::checked_rem, |a, b| a % b))
    }

    /// Division rounded toward negative infinity, always yielding an integer.
    pub fn floor_div(self, other: Number) -> DocumentStoreResult<Number> {
        if other.as_f64() == 0.0 {
            return Err(division_by_zero());
        }

        match (self.as_i64(), other.as_i64()) {
            (Some(a), Some(b)) => {
                let quotient = match a.checked_div(b) {
                    Some(quotient) => quotient,
                    None => return Ok(Number::Double((a as f64 / b as f64).floor())),
                };
                let quotient = if a % b != 0 && ((a < 0) != (b < 0)) {
                    quotient - 1
                } else {
                    quotient
                };

                Ok(Number::integer(quotient, self.narrow(other)))
            },
            _ => {
                let quotient = (self.as_f64() / other.as_f64()).floor();

                if quotient.is_finite() && quotient.abs() < i64::MAX as f64 {
                    Ok(Number::Int64(quotient as i64))
                } else {
                    Ok(Number::Double(quotient))
                }
            },
        }
    }

    pub fn floor(self) -> Number {
        match self {
            Number::Double(value) => Number::Double(value.floor()),
            integral => integral,
        }
    }
}

impl From<Number> for Bson {
    fn from(number: Number) -> Self {
        match number {
            Number::Int32(value) => Bson::Int32(value),
            Number::Int64(value) => Bson::Int64(value),
            Number::Double(value) => Bson::Double(value),
        }
    }
}

fn division_by_zero() -> DocumentStoreError {
    DocumentStoreError::QuerySpec("division by zero".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use querylayer_core::query::{Filter, Sort};

    fn books() -> Vec<Bson> {
        vec![
            Bson::Document(doc! { "genre": "Fiction", "price": 10, "published_year": 1949 }),
            Bson::Document(doc! { "genre": "Fiction", "price": 20, "published_year": 1950 }),
            Bson::Document(doc! { "genre": "SciFi", "price": 30.5, "published_year": 1959 }),
        ]
    }

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        let floor_div = |a: i64, b: i64| Number::Int64(a).floor_div(Number::Int64(b)).unwrap();

        assert_eq!(floor_div(1949, 10), Number::Int64(194));
        assert_eq!(floor_div(-5, 10), Number::Int64(-1));
        assert_eq!(floor_div(5, -10), Number::Int64(-1));
        assert_eq!(floor_div(-20, 10), Number::Int64(-2));
        assert_eq!(
            Number::Double(19.5).floor_div(Number::Int32(10)).unwrap(),
            Number::Int64(1)
        );
    }

    #[test]
    fn integer_results_stay_narrow_when_they_fit() {
        assert_eq!(Number::Int32(2).add(Number::Int32(3)), Number::Int32(5));
        assert_eq!(Number::Int32(2).add(Number::Int64(3)), Number::Int64(5));
        assert_eq!(Number::Int32(i32::MAX).add(Number::Int32(1)), Number::Int64(i32::MAX as i64 + 1));
        assert_eq!(Number::Int32(2).add(Number::Double(0.5)), Number::Double(2.5));
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let pipeline = Pipeline::new().project([(
            "ratio",
            ProjectField::Computed(Expression::field("price").divide(0)),
        )]);

        assert!(matches!(
            PipelineExecutor::run(pipeline, books()),
            Err(DocumentStoreError::QuerySpec(_))
        ));
    }

    #[test]
    fn sum_stays_integral_until_a_double_appears() {
        let pipeline = Pipeline::new()
            .filter(Filter::eq("genre", "Fiction"))
            .group(GroupSpec::all().sum("total", Expression::field("price")));

        let output = PipelineExecutor::run(pipeline, books()).unwrap();
        assert_eq!(output, vec![Bson::Document(doc! { "_id": Bson::Null, "total": 30 })]);

        let pipeline = Pipeline::new()
            .group(GroupSpec::all().sum("total", Expression::field("price")));

        let output = PipelineExecutor::run(pipeline, books()).unwrap();
        assert_eq!(output, vec![Bson::Document(doc! { "_id": Bson::Null, "total": 60.5 })]);
    }

    #[test]
    fn min_and_max_ignore_missing_values() {
        let mut documents = books();
        documents.push(Bson::Document(doc! { "genre": "Poetry" }));

        let pipeline = Pipeline::new().group(
            GroupSpec::all()
                .min("cheapest", Expression::field("price"))
                .max("priciest", Expression::field("price")),
        );

        let output = PipelineExecutor::run(pipeline, documents).unwrap();
        assert_eq!(
            output,
            vec![Bson::Document(doc! { "_id": Bson::Null, "cheapest": 10, "priciest": 30.5 })]
        );
    }

    #[test]
    fn decades_bucket_with_integer_floor_division() {
        let output = PipelineExecutor::run(Pipeline::decade_counts("published_year"), books()).unwrap();

        assert_eq!(
            output,
            vec![
                Bson::Document(doc! { "decade": 1940i64, "count": 1i64 }),
                Bson::Document(doc! { "decade": 1950i64, "count": 2i64 }),
            ]
        );
    }

    #[test]
    fn projections_cannot_mix_modes() {
        let pipeline = Pipeline::new().project([
            ("genre", ProjectField::Include),
            ("price", ProjectField::Exclude),
        ]);

        assert!(matches!(
            PipelineExecutor::run(pipeline, books()),
            Err(DocumentStoreError::QuerySpec(_))
        ));
    }

    #[test]
    fn exclusion_projection_removes_fields() {
        let pipeline = Pipeline::new()
            .project([("published_year", ProjectField::Exclude), ("price", ProjectField::Exclude)])
            .limit(1);

        let output = PipelineExecutor::run(pipeline, books()).unwrap();
        assert_eq!(output, vec![Bson::Document(doc! { "genre": "Fiction" })]);
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(PipelineExecutor::run(Pipeline::new().limit(0), books()).is_err());
    }

    #[test]
    fn sort_after_group_orders_the_grouped_output() {
        let pipeline = Pipeline::new()
            .group(GroupSpec::by(Expression::field("genre")).count("count"))
            .sort([Sort::asc("count")]);

        let output = PipelineExecutor::run(pipeline, books()).unwrap();
        assert_eq!(
            output,
            vec![
                Bson::Document(doc! { "_id": "SciFi", "count": 1i64 }),
                Bson::Document(doc! { "_id": "Fiction", "count": 2i64 }),
            ]
        );
    }
}
