//! The bookstore demonstration: advanced queries, aggregation pipelines and
//! indexing, run in that order against one collection.
//!
//! Each section returns its results as data; the `Display` impls render the
//! human-readable report printed by the `bookstore` binary.

use std::fmt;

use bson::Bson;
use tracing::info;

use querylayer_core::{
    collection::QueryRunner,
    document::DocumentExt,
    error::DocumentStoreResult,
    index::{ExecutionStats, IndexAck, IndexSpec},
    page::{Page, PaginationParams},
    pipeline::Pipeline,
    query::{Filter, Projection, Query, SortDirection},
};

use crate::bookstore::Book;

#[derive(Debug, Clone)]
pub struct AdvancedQueries {
    pub recent_in_stock: Vec<Book>,
    pub projected: Vec<Bson>,
    pub by_price_asc: Vec<Book>,
    pub by_price_desc: Vec<Book>,
    pub page: Page<Book>,
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone)]
pub struct Aggregations {
    pub average_price_by_genre: Vec<Bson>,
    pub top_author: Vec<Bson>,
    pub by_decade: Vec<Bson>,
}

#[derive(Debug, Clone)]
pub struct Indexing {
    pub title: IndexAck,
    pub author_year: IndexAck,
    pub title_lookup: ExecutionStats,
}

#[derive(Debug, Clone)]
pub struct BookstoreReport {
    pub advanced: AdvancedQueries,
    pub aggregations: Aggregations,
    pub indexing: Indexing,
}

/// Runs every section; the first failure aborts the rest.
pub async fn run<R>(books: &R, pagination: PaginationParams) -> DocumentStoreResult<BookstoreReport>
where
    R: QueryRunner + ?Sized,
{
    Ok(BookstoreReport {
        advanced: advanced_queries(books, pagination).await?,
        aggregations: aggregations(books).await?,
        indexing: indexing(books).await?,
    })
}

pub async fn advanced_queries<R>(books: &R, pagination: PaginationParams) -> DocumentStoreResult<AdvancedQueries>
where
    R: QueryRunner + ?Sized,
{
    info!(collection = books.name(), "running advanced queries");

    let recent_in_stock = decode(
        books
            .find(
                Query::builder()
                    .filter(Filter::and([
                        Filter::eq("in_stock", true),
                        Filter::gt("published_year", 2010),
                    ]))
                    .build(),
            )
            .await?,
    )?;

    let projected = books
        .find(
            Query::builder()
                .project(Projection::fields(["title", "author", "price"]))
                .build(),
        )
        .await?;

    let by_price_asc = decode(
        books
            .find(Query::builder().sort("price", SortDirection::Asc).build())
            .await?,
    )?;
    let by_price_desc = decode(
        books
            .find(Query::builder().sort("price", SortDirection::Desc).build())
            .await?,
    )?;

    let page = books.find_page(None, vec![], pagination.clone()).await?;

    Ok(AdvancedQueries {
        recent_in_stock,
        projected,
        by_price_asc,
        by_price_desc,
        page: Page {
            items: decode(page.items)?,
            count: page.count,
            next_page: page.next_page,
            previous_page: page.previous_page,
        },
        pagination,
    })
}

pub async fn aggregations<R>(books: &R) -> DocumentStoreResult<Aggregations>
where
    R: QueryRunner + ?Sized,
{
    info!(collection = books.name(), "running aggregation pipelines");

    Ok(Aggregations {
        average_price_by_genre: books
            .aggregate(Pipeline::average_by("genre", "price", "averagePrice"))
            .await?,
        top_author: books.aggregate(Pipeline::most_frequent("author", 1)).await?,
        by_decade: books.aggregate(Pipeline::decade_counts("published_year")).await?,
    })
}

pub async fn indexing<R>(books: &R) -> DocumentStoreResult<Indexing>
where
    R: QueryRunner + ?Sized,
{
    info!(collection = books.name(), "creating indexes");

    let title = books.create_index(IndexSpec::on("title")).await?;
    let author_year = books
        .create_index(IndexSpec::ascending(["author", "published_year"]))
        .await?;
    let title_lookup = books.explain(Some(Filter::eq("title", "1984"))).await?;

    Ok(Indexing { title, author_year, title_lookup })
}

fn decode(documents: Vec<Bson>) -> DocumentStoreResult<Vec<Book>> {
    documents.into_iter().map(Book::from_bson).collect()
}

fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    if items.is_empty() {
        return writeln!(f, "  (none)");
    }
    for item in items {
        writeln!(f, "  {item}")?;
    }
    Ok(())
}

impl fmt::Display for AdvancedQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Advanced Queries")?;
        writeln!(f)?;
        writeln!(f, "Books in stock and published after 2010:")?;
        list(f, &self.recent_in_stock)?;
        writeln!(f)?;
        writeln!(f, "Books with only title, author, and price:")?;
        list(f, &self.projected)?;
        writeln!(f)?;
        writeln!(f, "Books sorted by price (ascending):")?;
        list(f, &self.by_price_asc)?;
        writeln!(f)?;
        writeln!(f, "Books sorted by price (descending):")?;
        list(f, &self.by_price_desc)?;
        writeln!(f)?;
        writeln!(
            f,
            "Books on page {} ({} per page, {} in total):",
            self.pagination.page, self.pagination.per_page, self.page.count
        )?;
        list(f, &self.page.items)
    }
}

impl fmt::Display for Aggregations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Aggregation Pipelines")?;
        writeln!(f)?;
        writeln!(f, "Average price by genre:")?;
        list(f, &self.average_price_by_genre)?;
        writeln!(f)?;
        writeln!(f, "Author with most books:")?;
        list(f, &self.top_author)?;
        writeln!(f)?;
        writeln!(f, "Books grouped by publication decade:")?;
        list(f, &self.by_decade)
    }
}

impl fmt::Display for Indexing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = |ack: &IndexAck| if ack.created { "created" } else { "already present" };

        writeln!(f, "Indexing")?;
        writeln!(f)?;
        writeln!(f, "Index {} on title: {}", self.title.name, outcome(&self.title))?;
        writeln!(
            f,
            "Compound index {} on author + published_year: {}",
            self.author_year.name,
            outcome(&self.author_year)
        )?;
        writeln!(f)?;
        writeln!(f, "Explain output for query by title:")?;
        writeln!(
            f,
            "{}",
            serde_json::to_string_pretty(&self.title_lookup).map_err(|_| fmt::Error)?
        )
    }
}

impl fmt::Display for BookstoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.advanced)?;
        writeln!(f, "{}", self.aggregations)?;
        write!(f, "{}", self.indexing)
    }
}
