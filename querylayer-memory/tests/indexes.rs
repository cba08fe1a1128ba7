mod common;

use querylayer_core::{
    collection::QueryRunner,
    error::DocumentStoreError,
    index::{IndexAck, IndexSpec, PlanStage},
    query::{Filter, Query},
};

use common::{bookstore, store_with};

#[tokio::test]
async fn identical_index_requests_are_idempotent() {
    let store = bookstore().await;
    let books = store.collection("books");

    let first = books.create_index(IndexSpec::on("title")).await.unwrap();
    let second = books.create_index(IndexSpec::on("title")).await.unwrap();

    assert_eq!(first, IndexAck { name: "title_1".into(), created: true });
    assert_eq!(second, IndexAck { name: "title_1".into(), created: false });
    assert_eq!(books.list_indexes().await.unwrap().len(), 1);
}

#[tokio::test]
async fn indexes_can_be_created_on_empty_or_missing_collections() {
    let store = store_with("books", vec![]).await;

    assert!(store.collection("books").create_index(IndexSpec::on("title")).await.is_ok());
    assert!(store.collection("magazines").create_index(IndexSpec::on("title")).await.is_ok());
    assert_eq!(store.list_collections().await.unwrap(), ["books", "magazines"]);
}

#[tokio::test]
async fn conflicting_indexes_surface_as_conflicts() {
    let store = bookstore().await;
    let books = store.collection("books");

    books.create_index(IndexSpec::on("title")).await.unwrap();

    let result = books.create_index(IndexSpec::on("title").unique().named("title_1")).await;
    assert!(matches!(result, Err(DocumentStoreError::IndexConflict(_))));
}

#[tokio::test]
async fn explain_uses_an_index_on_the_filtered_field() {
    let store = bookstore().await;
    let books = store.collection("books");

    books.create_index(IndexSpec::on("title")).await.unwrap();

    let stats = books.explain(Some(Filter::eq("title", "1984"))).await.unwrap();

    assert_eq!(stats.stage, PlanStage::IxScan);
    assert_eq!(stats.index_name.as_deref(), Some("title_1"));
    assert_eq!(stats.n_returned, 1);
    assert_eq!(stats.total_keys_examined, 1);
    assert_eq!(stats.total_docs_examined, 1);
}

#[tokio::test]
async fn explain_scans_the_collection_without_a_usable_index() {
    let store = bookstore().await;
    let books = store.collection("books");

    books.create_index(IndexSpec::on("title")).await.unwrap();

    let stats = books.explain(Some(Filter::eq("genre", "Fantasy"))).await.unwrap();

    assert_eq!(stats.stage, PlanStage::CollScan);
    assert_eq!(stats.index_name, None);
    assert_eq!(stats.n_returned, 2);
    assert_eq!(stats.total_docs_examined, 10);
    assert_eq!(stats.total_keys_examined, 0);
}

#[tokio::test]
async fn compound_index_serves_its_leading_field() {
    let store = bookstore().await;
    let books = store.collection("books");

    let ack = books
        .create_index(IndexSpec::ascending(["author", "published_year"]))
        .await
        .unwrap();
    assert_eq!(ack.name, "author_1_published_year_1");

    let stats = books
        .explain(Some(Filter::and([
            Filter::eq("author", "George Orwell"),
            Filter::gt("published_year", 1946),
        ])))
        .await
        .unwrap();

    assert_eq!(stats.stage, PlanStage::IxScan);
    assert_eq!(stats.total_keys_examined, 2);
    assert_eq!(stats.n_returned, 1);
}

#[tokio::test]
async fn dropped_indexes_are_no_longer_used() {
    let store = bookstore().await;
    let books = store.collection("books");

    books.create_index(IndexSpec::on("title")).await.unwrap();
    books.drop_index("title_1").await.unwrap();

    let stats = books.explain(Some(Filter::eq("title", "1984"))).await.unwrap();

    assert_eq!(stats.stage, PlanStage::CollScan);
    assert!(books.list_indexes().await.unwrap().is_empty());
    assert!(matches!(
        books.drop_index("title_1").await,
        Err(DocumentStoreError::QuerySpec(_))
    ));
}

#[tokio::test]
async fn explain_has_no_side_effects() {
    let store = bookstore().await;
    let books = store.collection("books");

    let before = books.find(Query::new()).await.unwrap();
    books.explain(Some(Filter::eq("title", "1984"))).await.unwrap();
    books.explain(None).await.unwrap();

    assert_eq!(books.find(Query::new()).await.unwrap(), before);
    assert!(books.list_indexes().await.unwrap().is_empty());
}
