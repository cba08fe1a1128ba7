#![allow(dead_code)]

use bson::{Bson, doc};

use querylayer_core::{backend::StoreBackendBuilder, store::DocumentStore};
use querylayer_memory::InMemoryStore;

pub fn book(title: &str, author: &str, genre: &str, year: i32, price: f64, in_stock: bool) -> Bson {
    Bson::Document(doc! {
        "title": title,
        "author": author,
        "genre": genre,
        "published_year": year,
        "price": price,
        "in_stock": in_stock,
    })
}

/// Ten books with distinct prices.
pub fn library() -> Vec<Bson> {
    vec![
        book("1984", "George Orwell", "Dystopian", 1949, 10.99, true),
        book("Animal Farm", "George Orwell", "Political Satire", 1945, 8.5, false),
        book("Brave New World", "Aldous Huxley", "Dystopian", 1932, 12.0, true),
        book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true),
        book("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 25.0, true),
        book("Fahrenheit 451", "Ray Bradbury", "Dystopian", 1953, 9.99, false),
        book("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 11.25, true),
        book("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 13.5, true),
        book("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, true),
        book("Dune", "Frank Herbert", "Science Fiction", 1965, 18.0, false),
    ]
}

pub async fn store_with(collection: &str, documents: Vec<Bson>) -> DocumentStore<InMemoryStore> {
    let backend = InMemoryStore::builder()
        .seed(collection, documents)
        .build()
        .await
        .unwrap();

    DocumentStore::new(backend)
}

pub async fn bookstore() -> DocumentStore<InMemoryStore> {
    store_with("books", library()).await
}

pub fn titles(documents: &[Bson]) -> Vec<String> {
    documents
        .iter()
        .map(|document| {
            document
                .as_document()
                .and_then(|doc| doc.get_str("title").ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
