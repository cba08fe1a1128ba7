//! The `books` record type and the bundled catalogue.

use std::fmt;

use bson::Bson;
use serde::{Deserialize, Serialize};

use querylayer_core::{
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
};

const CATALOGUE: &str = include_str!("../data/books.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub price: f64,
    pub in_stock: bool,
}

impl Document for Book {
    fn collection_name() -> &'static str {
        "books"
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} ({}, {}) ${:.2}{}",
            self.title,
            self.author,
            self.genre,
            self.published_year,
            self.price,
            if self.in_stock { "" } else { " [out of stock]" },
        )
    }
}

/// Parses the bundled catalogue.
pub fn books() -> DocumentStoreResult<Vec<Book>> {
    Ok(serde_json::from_str(CATALOGUE)?)
}

/// The bundled catalogue as documents ready for seeding a store.
pub fn catalogue() -> DocumentStoreResult<Vec<Bson>> {
    books()?.iter().map(Book::to_bson).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_parses() {
        let books = books().unwrap();

        assert_eq!(books.len(), 14);
        assert_eq!(books[1].title, "1984");
        assert_eq!(books[1].published_year, 1949);
    }

    #[test]
    fn catalogue_documents_carry_every_field() {
        let documents = catalogue().unwrap();
        let first = documents[0].as_document().unwrap();

        for field in ["title", "author", "genre", "published_year", "price", "in_stock"] {
            assert!(first.contains_key(field), "missing {field}");
        }
        assert_eq!(first.get_i32("published_year").unwrap(), 1960);
    }

    #[test]
    fn display_marks_missing_stock() {
        let book = Book {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            genre: "Science Fiction".into(),
            published_year: 1965,
            price: 18.0,
            in_stock: false,
        };

        assert_eq!(book.to_string(), "Dune by Frank Herbert (Science Fiction, 1965) $18.00 [out of stock]");
    }
}
