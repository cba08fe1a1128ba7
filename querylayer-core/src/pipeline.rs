//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Each stage consumes the
//! documents produced by the stage before it, so stage order defines the data
//! flow: a `Sort` after a `Group` sorts the grouped documents, not the inputs.
//!
//! ```ignore
//! use querylayer_core::pipeline::{Pipeline, GroupSpec, Expression};
//! use querylayer_core::query::Sort;
//!
//! // Author with the most books.
//! let pipeline = Pipeline::new()
//!     .group(GroupSpec::by(Expression::field("author")).count("count"))
//!     .sort([Sort::desc("count")])
//!     .limit(1);
//! ```

use bson::Bson;

use crate::query::{Expr, Sort};

/// A computed value over a single input document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Value at a field path (`"price"`, `"publisher.country"`). Missing fields evaluate to null.
    Field(String),
    /// A constant.
    Literal(Bson),
    /// Sum of all operands.
    Add(Vec<Expression>),
    /// Left operand minus right operand.
    Subtract(Box<Expression>, Box<Expression>),
    /// Product of all operands.
    Multiply(Vec<Expression>),
    /// Floating point division.
    Divide(Box<Expression>, Box<Expression>),
    /// Remainder of the division, with the sign of the dividend.
    Mod(Box<Expression>, Box<Expression>),
    /// Integer division rounded toward negative infinity. Produces an integer.
    FloorDiv(Box<Expression>, Box<Expression>),
    /// Largest integer not greater than the operand.
    Floor(Box<Expression>),
    /// A nested document of expressions, used for compound group keys.
    Document(Vec<(String, Expression)>),
}

impl Expression {
    /// References a field. A leading `$` is accepted and stripped.
    pub fn field(path: impl Into<String>) -> Self {
        let path = path.into();

        match path.strip_prefix('$') {
            Some(stripped) => Expression::Field(stripped.to_string()),
            None => Expression::Field(path),
        }
    }

    pub fn literal(value: impl Into<Bson>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn add(self, other: impl Into<Expression>) -> Self {
        Expression::Add(vec![self, other.into()])
    }

    pub fn subtract(self, other: impl Into<Expression>) -> Self {
        Expression::Subtract(Box::new(self), Box::new(other.into()))
    }

    pub fn multiply(self, other: impl Into<Expression>) -> Self {
        Expression::Multiply(vec![self, other.into()])
    }

    pub fn divide(self, other: impl Into<Expression>) -> Self {
        Expression::Divide(Box::new(self), Box::new(other.into()))
    }

    pub fn modulo(self, other: impl Into<Expression>) -> Self {
        Expression::Mod(Box::new(self), Box::new(other.into()))
    }

    pub fn floor_div(self, other: impl Into<Expression>) -> Self {
        Expression::FloorDiv(Box::new(self), Box::new(other.into()))
    }

    pub fn floor(self) -> Self {
        Expression::Floor(Box::new(self))
    }

    /// Maps an integer field to the start of its bucket: `width * floor(value / width)`.
    ///
    /// With a width of 10, 1949 maps to 1940 and 1950 to 1950.
    pub fn bucket(path: impl Into<String>, width: i64) -> Self {
        Expression::field(path)
            .floor_div(width)
            .multiply(width)
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        Expression::Literal(Bson::Int32(value))
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::Literal(Bson::Int64(value))
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::Literal(Bson::Double(value))
    }
}

/// Reduction applied to every partition of a `Group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of documents in the partition, as an `Int64`.
    Count,
    /// Sum of numeric values; non-numeric values are ignored.
    Sum(Expression),
    /// Arithmetic mean of numeric values, or null when there are none.
    Avg(Expression),
    /// Smallest value.
    Min(Expression),
    /// Largest value.
    Max(Expression),
}

/// Partitioning key and reductions for a `Group` stage.
///
/// Each output document carries the partition key under `_id` and one field per accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub key: Expression,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    /// Groups by the given key expression.
    pub fn by(key: Expression) -> Self {
        GroupSpec { key, accumulators: Vec::new() }
    }

    /// Groups every input into a single partition keyed by null.
    pub fn all() -> Self {
        GroupSpec::by(Expression::Literal(Bson::Null))
    }

    pub fn accumulate(mut self, output: impl Into<String>, accumulator: Accumulator) -> Self {
        self.accumulators.push((output.into(), accumulator));
        self
    }

    pub fn count(self, output: impl Into<String>) -> Self {
        self.accumulate(output, Accumulator::Count)
    }

    pub fn sum(self, output: impl Into<String>, expr: Expression) -> Self {
        self.accumulate(output, Accumulator::Sum(expr))
    }

    pub fn avg(self, output: impl Into<String>, expr: Expression) -> Self {
        self.accumulate(output, Accumulator::Avg(expr))
    }

    pub fn min(self, output: impl Into<String>, expr: Expression) -> Self {
        self.accumulate(output, Accumulator::Min(expr))
    }

    pub fn max(self, output: impl Into<String>, expr: Expression) -> Self {
        self.accumulate(output, Accumulator::Max(expr))
    }
}

/// How a `Project` stage treats one output field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    /// Copy the field from the input.
    Include,
    /// Drop the field.
    Exclude,
    /// Set the field to a computed value.
    Computed(Expression),
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the filter.
    Match(Expr),
    /// Partition and reduce.
    Group(GroupSpec),
    /// Reorder by result fields.
    Sort(Vec<Sort>),
    /// Drop a prefix.
    Skip(usize),
    /// Truncate.
    Limit(usize),
    /// Reshape each document.
    Project(Vec<(String, ProjectField)>),
}

/// An ordered sequence of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn filter(self, expr: Expr) -> Self {
        self.stage(Stage::Match(expr))
    }

    pub fn group(self, spec: GroupSpec) -> Self {
        self.stage(Stage::Group(spec))
    }

    pub fn sort(self, keys: impl IntoIterator<Item = Sort>) -> Self {
        self.stage(Stage::Sort(keys.into_iter().collect()))
    }

    pub fn skip(self, count: usize) -> Self {
        self.stage(Stage::Skip(count))
    }

    pub fn limit(self, count: usize) -> Self {
        self.stage(Stage::Limit(count))
    }

    pub fn project<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, ProjectField)>,
        S: Into<String>,
    {
        self.stage(Stage::Project(
            fields
                .into_iter()
                .map(|(name, field)| (name.into(), field))
                .collect(),
        ))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Average of `value` per distinct `key`, stored under `output`.
    pub fn average_by(key: &str, value: &str, output: &str) -> Self {
        Pipeline::new().group(
            GroupSpec::by(Expression::field(key)).avg(output, Expression::field(value)),
        )
    }

    /// The `n` most frequent values of `key`, with their tallies under `count`.
    pub fn most_frequent(key: &str, n: usize) -> Self {
        Pipeline::new()
            .group(GroupSpec::by(Expression::field(key)).count("count"))
            .sort([Sort::desc("count")])
            .limit(n)
    }

    /// Document counts per decade of an integer year field, ascending by `decade`.
    ///
    /// Output documents have the shape `{ decade, count }`.
    pub fn decade_counts(year: &str) -> Self {
        Pipeline::new()
            .group(GroupSpec::by(Expression::bucket(year, 10)).count("count"))
            .project([
                ("decade", ProjectField::Computed(Expression::field("_id"))),
                ("count", ProjectField::Include),
                ("_id", ProjectField::Exclude),
            ])
            .sort([Sort::asc("decade")])
    }
}

impl IntoIterator for Pipeline {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}

impl FromIterator<Stage> for Pipeline {
    fn from_iter<T: IntoIterator<Item = Stage>>(iter: T) -> Self {
        Pipeline { stages: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_strips_dollar_prefix() {
        assert_eq!(Expression::field("$price"), Expression::Field("price".into()));
        assert_eq!(Expression::field("price"), Expression::Field("price".into()));
    }

    #[test]
    fn bucket_is_floor_div_then_multiply() {
        assert_eq!(
            Expression::bucket("published_year", 10),
            Expression::Multiply(vec![
                Expression::FloorDiv(
                    Box::new(Expression::Field("published_year".into())),
                    Box::new(Expression::Literal(Bson::Int64(10))),
                ),
                Expression::Literal(Bson::Int64(10)),
            ])
        );
    }

    #[test]
    fn decade_counts_groups_projects_then_sorts() {
        let pipeline = Pipeline::decade_counts("published_year");

        assert!(matches!(
            pipeline.stages(),
            [Stage::Group(_), Stage::Project(_), Stage::Sort(keys)] if keys == &vec![Sort::asc("decade")]
        ));
    }

    #[test]
    fn most_frequent_limits_after_sorting() {
        let stages = Pipeline::most_frequent("author", 1).into_iter().collect::<Vec<_>>();

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2], Stage::Limit(1));
    }
}
